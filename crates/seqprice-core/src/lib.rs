//! seqprice core library: request pricing for biological sequence models.
//!
//! Prices a single embedding, fill-mask, promoter-activity, tracks-prediction
//! or diffusion request from its transform, model and payload shape. The
//! computation is pure; rate cards are immutable once an engine owns them.
//!
//! With the `python` feature the crate also builds the `_seqprice_core`
//! extension module via PyO3.

pub mod errors;
pub mod features;
pub mod models;
pub mod pricing;
#[cfg(feature = "python")]
pub mod python;

pub use errors::{PricingError, PricingResult};
pub use models::{Model, Price, Request, Transform};
pub use pricing::{compute_price, PricingEngine, RateCard, RuleSet};

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::wrap_pyfunction;

// ---------------------------------------------------------------------------
// Top-level Python module: _seqprice_core
// ---------------------------------------------------------------------------

#[cfg(feature = "python")]
#[pymodule]
fn _seqprice_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // -- Feature extraction -------------------------------------------------
    m.add(
        "RESIDUE_ALPHABET",
        features::tokenizer::RESIDUE_ALPHABET,
    )?;
    m.add("MASK_TOKEN", features::tokenizer::MASK_TOKEN)?;
    m.add_function(wrap_pyfunction!(features::tokenizer::count_tokens, m)?)?;
    m.add_function(wrap_pyfunction!(
        features::tokenizer::count_masked_tokens,
        m
    )?)?;
    m.add_function(wrap_pyfunction!(
        features::tokenizer::count_track_markers,
        m
    )?)?;

    // -- Pricing ------------------------------------------------------------
    m.add_function(wrap_pyfunction!(python::compute_price_json, m)?)?;
    m.add_class::<python::PyPricingEngine>()?;

    Ok(())
}
