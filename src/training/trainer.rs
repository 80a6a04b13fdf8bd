//! Training run orchestration
//!
//! A run engineers the uploaded table, holds out a test split, tunes and
//! refits every registered model, ranks the results and publishes the
//! artifacts. Runs either complete for all models or leave no trace.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ndarray::{Array1, Array2, Axis};
use parking_lot::RwLock;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::cross_validation::{train_test_split, KFold};
use super::metrics::RegressionMetrics;
use super::registry::{ModelRegistry, RegistryEntry};
use super::search::RandomizedSearch;
use super::selector;
use crate::config::PipelineConfig;
use crate::error::{Result, WqiError};
use crate::export::{ArtifactStore, LocalArtifactStore, ModelArtifact};
use crate::feature_engineering::{engineer, training_feature_columns, TARGET};
use crate::tracking::{write_json, FeatureImportance, JsonRunStore, ResultRecord, RunStore, TrainingRun};
use crate::utils::{column_to_array1, columns_to_array2, timestamp_now};

/// Lifecycle of a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Pending,
    Preparing,
    Tuning,
    Finished,
    Failed,
}

/// Snapshot of a run's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub phase: RunPhase,
    /// 0 to 100
    pub progress: u8,
    pub current_model: Option<String>,
    pub models_trained: Vec<String>,
    pub error: Option<String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            phase: RunPhase::Pending,
            progress: 0,
            current_model: None,
            models_trained: Vec::new(),
            error: None,
        }
    }
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        matches!(self.phase, RunPhase::Pending | RunPhase::Preparing | RunPhase::Tuning)
    }
}

type StatusCell = Arc<RwLock<RunStatus>>;

/// Handle to a run executing on a worker thread
pub struct RunHandle {
    status: StatusCell,
    worker: JoinHandle<Result<TrainingRun>>,
}

impl RunHandle {
    pub fn status(&self) -> RunStatus {
        self.status.read().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Block until the run completes
    pub fn wait(self) -> Result<TrainingRun> {
        self.worker
            .join()
            .map_err(|_| WqiError::ComputationError("training worker panicked".to_string()))?
    }
}

/// Clears the in-flight flag when a run ends, however it ends.
struct ActiveRun(Arc<AtomicBool>);

impl ActiveRun {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WqiError::RunInProgress)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct TrainerInner {
    config: PipelineConfig,
    registry: ModelRegistry,
    artifacts: Arc<dyn ArtifactStore>,
    runs: Arc<dyn RunStore>,
}

/// Trains every registered model on a labeled table; one run at a time.
#[derive(Clone)]
pub struct Trainer {
    inner: Arc<TrainerInner>,
    active: Arc<AtomicBool>,
}

impl Trainer {
    /// Trainer backed by the model and results directories of `config`
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let artifacts = Arc::new(LocalArtifactStore::open(&config.model_dir)?);
        let runs = Arc::new(JsonRunStore::open(&config.results_dir, config.history_limit)?);
        Self::with_stores(config, artifacts, runs)
    }

    pub fn with_stores(
        config: PipelineConfig,
        artifacts: Arc<dyn ArtifactStore>,
        runs: Arc<dyn RunStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(TrainerInner {
                config,
                registry: ModelRegistry::default(),
                artifacts,
                runs,
            }),
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Swap the registry, e.g. to narrow the search spaces.
    pub fn with_registry(self, registry: ModelRegistry) -> Self {
        let inner = TrainerInner {
            config: self.inner.config.clone(),
            registry,
            artifacts: Arc::clone(&self.inner.artifacts),
            runs: Arc::clone(&self.inner.runs),
        };
        Self {
            inner: Arc::new(inner),
            active: self.active,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run training on the calling thread.
    pub fn train(&self, df: &DataFrame, dataset_file: Option<&str>) -> Result<TrainingRun> {
        let _guard = ActiveRun::acquire(&self.active)?;
        let status = StatusCell::default();
        self.inner.run(df, dataset_file, &status)
    }

    /// Run training on a worker thread. Fails fast with
    /// [`WqiError::RunInProgress`] if this trainer is already busy.
    pub fn spawn(&self, df: DataFrame, dataset_file: Option<String>) -> Result<RunHandle> {
        let guard = ActiveRun::acquire(&self.active)?;
        let status = StatusCell::default();
        let inner = Arc::clone(&self.inner);
        let worker_status = Arc::clone(&status);

        let worker = thread::Builder::new()
            .name("wqi-train".to_string())
            .spawn(move || {
                let _guard = guard;
                inner.run(&df, dataset_file.as_deref(), &worker_status)
            })?;

        Ok(RunHandle { status, worker })
    }
}

/// Held-out split of the design matrix
struct SplitData {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<f64>,
}

impl TrainerInner {
    fn run(&self, df: &DataFrame, dataset_file: Option<&str>, status: &StatusCell) -> Result<TrainingRun> {
        let outcome = self.execute(df, dataset_file, status);
        let mut s = status.write();
        match &outcome {
            Ok(_) => {
                s.phase = RunPhase::Finished;
                s.progress = 100;
                s.current_model = None;
            }
            Err(e) => {
                error!(error = %e, "training run failed");
                s.phase = RunPhase::Failed;
                s.error = Some(e.to_string());
            }
        }
        outcome
    }

    fn execute(&self, df: &DataFrame, dataset_file: Option<&str>, status: &StatusCell) -> Result<TrainingRun> {
        status.write().phase = RunPhase::Preparing;
        let config = &self.config;

        let engineered = engineer(df, true)?;
        let features = training_feature_columns(&engineered);
        let x_all = columns_to_array2(&engineered, &features)?;
        let y_all = column_to_array1(&engineered, TARGET)?;

        let valid: Vec<usize> = (0..x_all.nrows())
            .filter(|&i| y_all[i].is_finite() && x_all.row(i).iter().all(|v| v.is_finite()))
            .collect();
        if valid.is_empty() {
            return Err(WqiError::NoValidRows);
        }
        if valid.len() < x_all.nrows() {
            warn!(dropped = x_all.nrows() - valid.len(), "dropped rows with missing values");
        }
        let x = x_all.select(Axis(0), &valid);
        let y = y_all.select(Axis(0), &valid);
        info!(features = features.len(), samples = x.nrows(), "design matrix ready");

        let (train_idx, test_idx) = train_test_split(x.nrows(), config.test_size, config.random_state)?;
        let data = SplitData {
            x_train: x.select(Axis(0), &train_idx),
            y_train: y.select(Axis(0), &train_idx),
            x_test: x.select(Axis(0), &test_idx),
            y_test: y.select(Axis(0), &test_idx),
        };
        info!(train = train_idx.len(), test = test_idx.len(), "train/test split");

        let run_id = self.artifacts.stage_run(&timestamp_now())?;
        let results = match self.train_all(&data, &features, &run_id, status) {
            Ok(results) => results,
            Err(e) => {
                self.artifacts.discard(&run_id);
                return Err(e);
            }
        };

        let mut ranked = results;
        selector::rank(&mut ranked);
        let best_model = selector::select(&ranked)
            .map(|r| r.model_name.clone())
            .ok_or_else(|| WqiError::ComputationError("registry is empty".to_string()))?;

        let run = TrainingRun {
            timestamp: run_id.clone(),
            dataset_file: dataset_file.map(str::to_string),
            dataset_shape: (engineered.height(), engineered.width()),
            features_used: features,
            train_size: data.x_train.nrows(),
            test_size: data.x_test.nrows(),
            models_trained: ranked,
            best_model,
        };

        let replaced = match self.artifacts.publish(&run_id) {
            Ok(replaced) => replaced,
            Err(e) => {
                self.artifacts.discard(&run_id);
                return Err(e);
            }
        };
        let summary_name = format!("training_summary_{}.json", run_id);
        if let Err(e) = self.record(&run, &summary_name) {
            if let Err(undo) = self.artifacts.unpublish(&run_id, replaced.as_deref()) {
                error!(error = %undo, run = %run_id, "could not withdraw unrecorded run");
            }
            return Err(e);
        }
        self.artifacts.collect_superseded(&run_id, replaced.as_deref());
        purge_result_files(&config.results_dir, &summary_name);

        info!(best = %run.best_model, run = %run.timestamp, "training run complete");
        Ok(run)
    }

    /// Write the run summary and append the run to history. On failure the
    /// summary file is removed again.
    fn record(&self, run: &TrainingRun, summary_name: &str) -> Result<()> {
        let results_dir = &self.config.results_dir;
        fs::create_dir_all(results_dir)?;
        let summary_path = results_dir.join(summary_name);
        let saved = write_json(&summary_path, run).and_then(|()| self.runs.save_run(run));
        if saved.is_err() && summary_path.exists() {
            let _ = fs::remove_file(&summary_path);
        }
        saved
    }

    fn train_all(
        &self,
        data: &SplitData,
        features: &[String],
        run_id: &str,
        status: &StatusCell,
    ) -> Result<Vec<ResultRecord>> {
        let entries = self.registry.entries();
        let mut results = Vec::with_capacity(entries.len());

        for (idx, entry) in entries.iter().enumerate() {
            let name = entry.kind.name();
            {
                let mut s = status.write();
                s.phase = RunPhase::Tuning;
                s.current_model = Some(name.to_string());
                s.progress = (idx * 100 / entries.len()) as u8;
            }
            info!("Tuning {} ({}/{})", name, idx + 1, entries.len());

            let record = self
                .train_one(entry, data, features, run_id)
                .map_err(|e| match e {
                    WqiError::TrainingFailure { .. } => e,
                    other => WqiError::training_failure(name, other),
                })?;
            info!(
                model = name,
                cv_rmse = record.cv_rmse,
                test_r2 = record.test_r2,
                "model trained"
            );

            status.write().models_trained.push(name.to_string());
            results.push(record);
        }
        Ok(results)
    }

    fn train_one(
        &self,
        entry: &RegistryEntry,
        data: &SplitData,
        features: &[String],
        run_id: &str,
    ) -> Result<ResultRecord> {
        let kind = entry.kind;
        let seed = self.config.random_state;
        let cv = KFold::new(self.config.cv_folds)
            .with_shuffle(true)
            .with_random_state(seed);
        let search = RandomizedSearch::new(self.config.tuning_iterations, cv, seed);

        let outcome = search.run(&entry.search_space, &data.x_train, &data.y_train, |params| {
            kind.build(params, seed)
        })?;
        debug!(model = kind.name(), candidates = outcome.candidates.len(), "search scored");
        if !outcome.best_cv_rmse.is_finite() {
            return Err(WqiError::ComputationError(
                "no candidate reached a finite cross-validation score".to_string(),
            ));
        }

        let mut pipeline = kind.build(&outcome.best_params, seed)?;
        pipeline.fit(&data.x_train, &data.y_train)?;
        let preds = pipeline.predict(&data.x_test)?;
        let metrics = RegressionMetrics::compute(&data.y_test, &preds)?;
        if ![metrics.r2, metrics.mae, metrics.rmse, metrics.mape].iter().all(|v| v.is_finite()) {
            return Err(WqiError::ComputationError(format!(
                "held-out metrics are not finite: {:?}",
                metrics
            )));
        }
        let pipeline = pipeline.with_feature_names(features.to_vec());

        let feature_importance = if kind.supports_importances() {
            match pipeline.feature_importances() {
                Some(imp) if imp.len() == features.len() => Some(FeatureImportance {
                    features: features.to_vec(),
                    importances: imp.to_vec(),
                }),
                _ => {
                    debug!(model = kind.name(), "feature importances unavailable");
                    None
                }
            }
        } else {
            None
        };

        let best_params = outcome.best_params.display_map();
        let artifact = ModelArtifact {
            model_name: kind.name().to_string(),
            timestamp: run_id.to_string(),
            best_params: best_params.clone(),
            pipeline,
        };
        let model_file = self.artifacts.save(run_id, &artifact)?;

        Ok(ResultRecord {
            model_name: kind.name().to_string(),
            cv_rmse: outcome.best_cv_rmse,
            test_r2: metrics.r2,
            test_mae: metrics.mae,
            test_rmse: metrics.rmse,
            test_mape: metrics.mape,
            best_params,
            model_file,
            feature_importance,
        })
    }
}

/// Remove summaries and prediction outputs of earlier runs. History files
/// and `keep` are kept; failures are logged and skipped.
fn purge_result_files(results_dir: &Path, keep: &str) {
    let Ok(entries) = fs::read_dir(results_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let stale = (name.starts_with("training_summary_") && name.ends_with(".json"))
            || (name.starts_with("predictions_") && name.ends_with(".csv"));
        if !stale || name == keep {
            continue;
        }
        if let Err(e) = fs::remove_file(entry.path()) {
            warn!(file = %name, error = %e, "failed to remove stale result file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_active_run_guard() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = ActiveRun::acquire(&flag).unwrap();
        assert!(matches!(ActiveRun::acquire(&flag), Err(WqiError::RunInProgress)));
        drop(guard);
        assert!(ActiveRun::acquire(&flag).is_ok());
    }

    #[test]
    fn test_purge_keeps_history_files() {
        let dir = tempdir().unwrap();
        for name in [
            "training_summary_20240101_000000.json",
            "training_summary_20240102_000000.json",
            "predictions_Ridge_20240101_000000.csv",
            "training_history.json",
            "latest_training.json",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        purge_result_files(dir.path(), "training_summary_20240102_000000.json");
        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "latest_training.json",
                "training_history.json",
                "training_summary_20240102_000000.json"
            ]
        );
    }

    #[test]
    fn test_status_default_is_pending() {
        let status = RunStatus::default();
        assert_eq!(status.phase, RunPhase::Pending);
        assert!(status.is_running());
    }
}
