//! Prediction on unlabeled water quality tables
//!
//! Loads the latest published artifact for a model, applies it to freshly
//! engineered features, classifies every prediction and records summary
//! statistics for the dashboard.

mod predictor;

pub use predictor::{
    class_distribution, prediction_stats, PredictionOutcome, Predictor, CLASS_COLUMN, DEFAULT_SAMPLE_SIZE,
    PREDICTION_COLUMN,
};
