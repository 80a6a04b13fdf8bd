//! Persisted run and prediction records
//!
//! Field names are part of the JSON contract read by dashboard consumers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON has no NaN or infinity; serde_json would write them as `null` and
/// the record could no longer be read back. Refuse them instead.
mod finite {
    use serde::ser::{Error, SerializeSeq};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if !value.is_finite() {
            return Err(S::Error::custom(format!("non-finite value {}", value)));
        }
        serializer.serialize_f64(*value)
    }

    pub fn serialize_vec<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            if !value.is_finite() {
                return Err(S::Error::custom(format!("non-finite value {}", value)));
            }
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

/// Per-feature importances aligned with the training column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub features: Vec<String>,
    #[serde(serialize_with = "finite::serialize_vec")]
    pub importances: Vec<f64>,
}

/// Outcome of one model in one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub model_name: String,
    /// Mean cross-validated RMSE on the training split
    #[serde(serialize_with = "finite::serialize")]
    pub cv_rmse: f64,
    #[serde(serialize_with = "finite::serialize")]
    pub test_r2: f64,
    #[serde(serialize_with = "finite::serialize")]
    pub test_mae: f64,
    #[serde(serialize_with = "finite::serialize")]
    pub test_rmse: f64,
    /// Percentage in [0, 100]
    #[serde(serialize_with = "finite::serialize")]
    pub test_mape: f64,
    /// Display strings only
    pub best_params: BTreeMap<String, String>,
    pub model_file: String,
    pub feature_importance: Option<FeatureImportance>,
}

/// Immutable summary of a completed training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub timestamp: String,
    pub dataset_file: Option<String>,
    /// `[rows, columns]` of the engineered frame
    pub dataset_shape: (usize, usize),
    pub features_used: Vec<String>,
    pub train_size: usize,
    pub test_size: usize,
    /// Ranked by ascending test RMSE
    pub models_trained: Vec<ResultRecord>,
    pub best_model: String,
}

impl TrainingRun {
    pub fn result(&self, model_name: &str) -> Option<&ResultRecord> {
        self.models_trained.iter().find(|r| r.model_name == model_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionStats {
    #[serde(serialize_with = "finite::serialize")]
    pub mean_wqi: f64,
    #[serde(serialize_with = "finite::serialize")]
    pub median_wqi: f64,
    #[serde(serialize_with = "finite::serialize")]
    pub min_wqi: f64,
    #[serde(serialize_with = "finite::serialize")]
    pub max_wqi: f64,
    /// Population standard deviation
    #[serde(serialize_with = "finite::serialize")]
    pub std_wqi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionMeta {
    pub timestamp: String,
    pub model_used: String,
    pub total_predictions: usize,
    pub statistics: PredictionStats,
    pub class_distribution: BTreeMap<String, usize>,
    pub output_file: String,
}
