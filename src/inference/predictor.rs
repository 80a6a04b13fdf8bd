//! Batch prediction with a published artifact

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, WqiError};
use crate::export::{ArtifactStore, LocalArtifactStore, ModelArtifact};
use crate::feature_engineering::{engineer, median, prediction_feature_columns, TARGET};
use crate::quality::{classify, WqiClass};
use crate::tracking::{JsonRunStore, PredictionMeta, PredictionStats, RunStore};
use crate::utils::{columns_to_array2, save_csv, timestamp_now};

pub const PREDICTION_COLUMN: &str = "Predicted_WQI";
pub const CLASS_COLUMN: &str = "WQI_Class";
/// Rows returned by [`PredictionOutcome::sample`] by default
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// Everything produced by one prediction request
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub meta: PredictionMeta,
    pub predictions: Array1<f64>,
    pub classes: Vec<WqiClass>,
    /// Input table with the prediction and class columns appended
    pub frame: DataFrame,
    pub output_path: PathBuf,
}

impl PredictionOutcome {
    /// First `n` rows of the augmented table, without the target column
    pub fn sample(&self, n: usize) -> Result<DataFrame> {
        let frame = if self.frame.get_column_index(TARGET).is_some() {
            self.frame.drop(TARGET)?
        } else {
            self.frame.clone()
        };
        Ok(frame.head(Some(n)))
    }
}

/// Applies published artifacts to unlabeled tables
pub struct Predictor {
    config: PipelineConfig,
    artifacts: Arc<dyn ArtifactStore>,
    runs: Arc<dyn RunStore>,
}

impl Predictor {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let artifacts = Arc::new(LocalArtifactStore::open(&config.model_dir)?);
        let runs = Arc::new(JsonRunStore::open(&config.results_dir, config.history_limit)?);
        Ok(Self::with_stores(config, artifacts, runs))
    }

    pub fn with_stores(config: PipelineConfig, artifacts: Arc<dyn ArtifactStore>, runs: Arc<dyn RunStore>) -> Self {
        Self {
            config,
            artifacts,
            runs,
        }
    }

    /// Predict a WQI for every row of `df` with the latest artifact of
    /// `model_name`, classify each value and record the request.
    pub fn predict(&self, df: &DataFrame, model_name: &str) -> Result<PredictionOutcome> {
        let engineered = engineer(df, false)?;
        let available = prediction_feature_columns(&engineered);
        let artifact = self.artifacts.load_latest_by_prefix(model_name)?;
        let columns = resolve_columns(&artifact, available)?;

        let x = columns_to_array2(&engineered, &columns)?;
        check_finite_rows(&x, &columns)?;
        let predictions = artifact.pipeline.predict(&x)?;
        if predictions.is_empty() {
            return Err(WqiError::NoValidRows);
        }
        if let Some(row) = predictions.iter().position(|v| !v.is_finite()) {
            return Err(WqiError::ComputationError(format!(
                "{} produced a non-finite prediction for row {}",
                artifact.model_name, row
            )));
        }
        let classes: Vec<WqiClass> = predictions.iter().map(|&v| classify(v)).collect();

        let mut frame = df.clone();
        frame.with_column(Series::new(PREDICTION_COLUMN.into(), predictions.to_vec()))?;
        let labels: Vec<&str> = classes.iter().map(|c| c.label()).collect();
        frame.with_column(Series::new(CLASS_COLUMN.into(), labels))?;

        let timestamp = timestamp_now();
        let output_file = format!("predictions_{}_{}.csv", artifact.model_name, timestamp);
        std::fs::create_dir_all(&self.config.results_dir)?;
        let output_path = self.config.results_dir.join(&output_file);
        save_csv(&mut frame, &output_path)?;

        let meta = PredictionMeta {
            timestamp,
            model_used: artifact.model_name.clone(),
            total_predictions: predictions.len(),
            statistics: prediction_stats(&predictions)?,
            class_distribution: class_distribution(&classes),
            output_file,
        };
        self.runs.save_prediction_meta(&meta)?;
        info!(
            model = %meta.model_used,
            rows = meta.total_predictions,
            mean = meta.statistics.mean_wqi,
            "predictions written"
        );

        Ok(PredictionOutcome {
            meta,
            predictions,
            classes,
            frame,
            output_path,
        })
    }
}

/// Columns in the order the artifact was fit on. A reordering of the same
/// set is accepted; any other difference is a mismatch.
fn resolve_columns(artifact: &ModelArtifact, available: Vec<String>) -> Result<Vec<String>> {
    let expected = artifact.feature_names();
    if expected.is_empty() {
        warn!(model = %artifact.model_name, "artifact has no recorded feature names");
        return Ok(available);
    }
    if expected == available.as_slice() {
        return Ok(available);
    }
    let mut a: Vec<&String> = expected.iter().collect();
    let mut b: Vec<&String> = available.iter().collect();
    a.sort();
    b.sort();
    if a == b {
        return Ok(expected.to_vec());
    }
    Err(WqiError::FeatureMismatch {
        expected: expected.to_vec(),
        actual: available,
    })
}

/// Rows the estimator cannot score: NaN or infinite values left after
/// imputation, e.g. a log feature of a value below -1.
fn check_finite_rows(x: &Array2<f64>, columns: &[String]) -> Result<()> {
    let bad: Vec<usize> = x
        .outer_iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|v| !v.is_finite()))
        .map(|(i, _)| i)
        .collect();
    if bad.is_empty() {
        return Ok(());
    }
    let first = x.row(bad[0]);
    let offending: Vec<&str> = columns
        .iter()
        .zip(first.iter())
        .filter(|(_, v)| !v.is_finite())
        .map(|(c, _)| c.as_str())
        .collect();
    Err(WqiError::DataError(format!(
        "Input contains NaN or infinity in rows {:?} (row {}: {})",
        bad,
        bad[0],
        offending.join(", ")
    )))
}

/// Mean, median, extrema and population standard deviation
pub fn prediction_stats(predictions: &Array1<f64>) -> Result<PredictionStats> {
    let mean = predictions.mean().ok_or(WqiError::NoValidRows)?;
    let mut values = predictions.to_vec();
    let median_wqi = median(&mut values).ok_or(WqiError::NoValidRows)?;
    Ok(PredictionStats {
        mean_wqi: mean,
        median_wqi,
        min_wqi: predictions.iter().copied().fold(f64::INFINITY, f64::min),
        max_wqi: predictions.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_wqi: predictions.std(0.0),
    })
}

/// Count per class label; absent classes are omitted
pub fn class_distribution(classes: &[WqiClass]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for class in classes {
        *counts.entry(class.label().to_string()).or_insert(0) += 1;
    }
    counts
}
