//! Python-facing wrappers. Requests and rate cards cross the boundary as JSON
//! strings and are validated on the Rust side.

use pyo3::prelude::*;

use crate::models::Request;
use crate::pricing::{default_engine, PricingEngine, RateCard};

/// Price a JSON-encoded request with the built-in rate card.
#[pyfunction]
#[pyo3(name = "compute_price")]
pub fn compute_price_json(request_json: &str) -> PyResult<f64> {
    let request = Request::from_json(request_json)?;
    Ok(default_engine().price(&request)?)
}

#[pyclass(frozen, name = "PricingEngine")]
pub struct PyPricingEngine {
    inner: PricingEngine,
}

#[pymethods]
impl PyPricingEngine {
    #[new]
    #[pyo3(signature = (rate_card_json=None))]
    fn new(rate_card_json: Option<&str>) -> PyResult<Self> {
        let rate_card = match rate_card_json {
            Some(json) => RateCard::from_json_str(json)?,
            None => RateCard::default(),
        };
        Ok(Self {
            inner: PricingEngine::new(rate_card)?,
        })
    }

    #[staticmethod]
    fn from_path(path: &str) -> PyResult<Self> {
        Ok(Self {
            inner: PricingEngine::new(RateCard::from_path(path)?)?,
        })
    }

    fn price(&self, request_json: &str) -> PyResult<f64> {
        let request = Request::from_json(request_json)?;
        Ok(self.inner.price(&request)?)
    }

    /// Price many requests off the GIL. Fails on the first invalid request.
    fn price_batch(&self, py: Python<'_>, requests_json: Vec<String>) -> PyResult<Vec<f64>> {
        let requests = requests_json
            .iter()
            .map(|json| Request::from_json(json))
            .collect::<Result<Vec<_>, _>>()?;
        let engine = &self.inner;
        let priced = py.allow_threads(|| engine.price_batch(&requests));
        Ok(priced.into_iter().collect::<Result<Vec<_>, _>>()?)
    }

    fn fingerprint(&self) -> PyResult<String> {
        Ok(self.inner.rate_card().fingerprint()?)
    }

    fn __repr__(&self) -> String {
        format!(
            "PricingEngine(rule_set={:?}, per_token_models={}, per_pass_models={})",
            self.inner.rate_card().rule_set,
            self.inner.rate_card().per_token_cost.len(),
            self.inner.rate_card().per_pass_cost.len(),
        )
    }
}
