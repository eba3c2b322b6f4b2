//! Error types for the seqprice core library.

#[cfg(feature = "python")]
use pyo3::exceptions::{PyIOError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;

use crate::models::Transform;

/// Top-level error enum for the seqprice core library.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    /// The model has no entry in the cost table the dispatched rule reads.
    #[error("Unrecognized model `{model}` for transform {transform}")]
    UnrecognizedModel { model: String, transform: Transform },

    #[error("Invalid request shape: {0}")]
    InvalidRequestShape(String),

    #[error("Rate card error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PricingError {
    pub(crate) fn unrecognized(model: impl Into<String>, transform: Transform) -> Self {
        PricingError::UnrecognizedModel {
            model: model.into(),
            transform,
        }
    }

    pub(crate) fn shape(message: impl Into<String>) -> Self {
        PricingError::InvalidRequestShape(message.into())
    }
}

#[cfg(feature = "python")]
impl From<PricingError> for PyErr {
    fn from(err: PricingError) -> PyErr {
        match &err {
            PricingError::Io(_) => PyIOError::new_err(err.to_string()),
            PricingError::UnrecognizedModel { .. }
            | PricingError::InvalidRequestShape(_)
            | PricingError::Config(_)
            | PricingError::Json(_) => PyValueError::new_err(err.to_string()),
        }
    }
}

pub type PricingResult<T> = Result<T, PricingError>;
