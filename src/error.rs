//! Error types for the housing model server

use thiserror::Error;

/// Result type alias for data loading and model fitting
pub type Result<T> = std::result::Result<T, HousingError>;

/// Main error type for data loading and model fitting
#[derive(Error, Debug)]
pub enum HousingError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl From<polars::error::PolarsError> for HousingError {
    fn from(err: polars::error::PolarsError) -> Self {
        HousingError::DataError(err.to_string())
    }
}
