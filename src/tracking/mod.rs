//! Run history and prediction metadata
//!
//! Records are plain serde structs; [`RunStore`] hides where they live.

mod records;
mod storage;

pub use records::{FeatureImportance, PredictionMeta, PredictionStats, ResultRecord, TrainingRun};
pub use storage::{JsonRunStore, RunStore};
pub(crate) use storage::write_json;

use crate::error::Result;
use crate::export::ArtifactStore;
use serde::{Deserialize, Serialize};

/// Overview of what has been trained and predicted so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub has_training_data: bool,
    pub has_prediction_data: bool,
    pub total_models: usize,
    pub total_training_sessions: usize,
    pub latest_training: Option<TrainingRun>,
    pub latest_prediction: Option<PredictionMeta>,
}

pub fn dashboard_summary(runs: &dyn RunStore, artifacts: &dyn ArtifactStore) -> Result<DashboardSummary> {
    let latest_training = runs.latest_run()?;
    let latest_prediction = runs.latest_prediction_meta()?;
    Ok(DashboardSummary {
        has_training_data: latest_training.is_some(),
        has_prediction_data: latest_prediction.is_some(),
        total_models: artifacts.list()?.len(),
        total_training_sessions: runs.history()?.len(),
        latest_training,
        latest_prediction,
    })
}
