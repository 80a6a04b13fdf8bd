//! WQI AutoML - Water Quality Index regression pipeline
//!
//! Turns tabular water quality measurements into a tuned regressor and
//! applies it to new samples:
//! - Feature engineering over eight canonical measurements
//! - A registry of five regressors with their hyperparameter spaces
//! - Cross-validated random search, held-out evaluation and selection
//! - Run-scoped artifact publishing with a single current pointer
//! - Batch prediction with WQI classification
//!
//! # Modules
//!
//! ## Core
//! - [`feature_engineering`] - Canonical columns, imputation, derived features
//! - [`preprocessing`] - Standardization inside model pipelines
//! - [`training`] - Regressors, search, trainer and selector
//! - [`inference`] - Batch prediction with published artifacts
//! - [`quality`] - WQI class boundaries
//!
//! ## Persistence
//! - [`export`] - Model artifacts and run publishing
//! - [`tracking`] - Training history and prediction metadata
//!
//! ## Services
//! - [`cli`] - Command-line interface
//! - [`config`] - Profiles and environment configuration

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod quality;
pub mod feature_engineering;
pub mod preprocessing;
pub mod training;
pub mod inference;

// Persistence
pub mod export;
pub mod tracking;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, WqiError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling and configuration
    pub use crate::config::{PipelineConfig, Profile};
    pub use crate::error::{Result, WqiError};

    // Feature engineering
    pub use crate::feature_engineering::{analyze, engineer, DatasetAnalysis, FEATURES, TARGET};

    // Training
    pub use crate::training::{
        ModelKind, ModelRegistry, Pipeline, RandomizedSearch, RegressionMetrics, RunHandle, RunPhase,
        RunStatus, SearchSpace, Trainer,
    };

    // Inference
    pub use crate::inference::{PredictionOutcome, Predictor};
    pub use crate::quality::{classify, WqiClass};

    // Persistence
    pub use crate::export::{ArtifactStore, LocalArtifactStore, ModelArtifact};
    pub use crate::tracking::{JsonRunStore, PredictionMeta, ResultRecord, RunStore, TrainingRun};
}
