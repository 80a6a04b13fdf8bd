//! Error types for the WQI pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, WqiError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum WqiError {
    /// Required canonical feature or target columns are absent
    #[error("Missing required columns: {}", .missing.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("No valid rows remain after removing rows with missing values")]
    NoValidRows,

    /// A model's fit or predict step failed; the whole run is aborted
    #[error("Training failed for {model}: {message}")]
    TrainingFailure { model: String, message: String },

    #[error("No trained artifact found for model '{0}'")]
    ModelNotFound(String),

    #[error("Feature mismatch: artifact expects [{}], data provides [{}]", .expected.join(", "), .actual.join(", "))]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("A training run is already in progress")]
    RunInProgress,

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl WqiError {
    /// Wrap any error raised while fitting or scoring `model`.
    pub fn training_failure(model: impl Into<String>, err: impl std::fmt::Display) -> Self {
        WqiError::TrainingFailure {
            model: model.into(),
            message: err.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for WqiError {
    fn from(err: polars::error::PolarsError) -> Self {
        WqiError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for WqiError {
    fn from(err: serde_json::Error) -> Self {
        WqiError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for WqiError {
    fn from(err: ndarray::ShapeError) -> Self {
        WqiError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_lists_every_name() {
        let err = WqiError::MissingColumns {
            missing: vec!["Fluoride".to_string(), "WQI".to_string()],
            available: vec!["pH".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required columns: Fluoride, WQI");
    }

    #[test]
    fn test_training_failure_carries_model() {
        let err = WqiError::training_failure("SVR", "singular kernel");
        assert_eq!(err.to_string(), "Training failed for SVR: singular kernel");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WqiError = io_err.into();
        assert!(matches!(err, WqiError::IoError(_)));
    }
}
