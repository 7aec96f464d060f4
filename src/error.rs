//! Error types for the model-selection engine

use thiserror::Error;

/// Result type alias for selection operations
pub type Result<T> = std::result::Result<T, SelectionError>;

/// Main error type for the selection engine
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    /// Raised only when the evaluation deadline expires
    #[error("Time limit exceeded")]
    TimeLimitExceeded,

    #[error("No meta-model found for candidate {candidate}")]
    MissingMetaModel { candidate: String },

    #[error("Unsupported problem class: {0}")]
    UnsupportedProblemClass(String),

    #[error("No candidate has been evaluated")]
    NoEvaluatedCandidates,

    #[error("Run log schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl SelectionError {
    /// Whether this error was produced by deadline expiry
    pub fn is_time_limit(&self) -> bool {
        matches!(self, SelectionError::TimeLimitExceeded)
    }
}

impl From<polars::error::PolarsError> for SelectionError {
    fn from(err: polars::error::PolarsError) -> Self {
        SelectionError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for SelectionError {
    fn from(err: serde_json::Error) -> Self {
        SelectionError::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for SelectionError {
    fn from(err: csv::Error) -> Self {
        SelectionError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SelectionError {
    fn from(err: ndarray::ShapeError) -> Self {
        SelectionError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
