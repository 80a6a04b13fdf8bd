//! Storage backends for run history and prediction metadata

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::records::{PredictionMeta, TrainingRun};
use crate::error::{Result, WqiError};

const LATEST_TRAINING_FILE: &str = "latest_training.json";
const TRAINING_HISTORY_FILE: &str = "training_history.json";
const LATEST_PREDICTION_FILE: &str = "latest_prediction.json";

/// Persistence of training runs and prediction metadata
pub trait RunStore: Send + Sync {
    /// Record a finished run as the latest and append it to the history
    fn save_run(&self, run: &TrainingRun) -> Result<()>;

    fn latest_run(&self) -> Result<Option<TrainingRun>>;

    /// Oldest first, capped at the store's history limit
    fn history(&self) -> Result<Vec<TrainingRun>>;

    fn save_prediction_meta(&self, meta: &PredictionMeta) -> Result<()>;

    fn latest_prediction_meta(&self) -> Result<Option<PredictionMeta>>;
}

/// JSON files in a results directory
pub struct JsonRunStore {
    base_dir: PathBuf,
    history_limit: usize,
}

impl JsonRunStore {
    pub fn open(base_dir: impl AsRef<Path>, history_limit: usize) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            history_limit: history_limit.max(1),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }
}

/// Pretty JSON written to a sibling temp file, then renamed into place.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let written = File::create(&tmp).map_err(WqiError::from).and_then(|file| {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|e| WqiError::SerializationError(format!("{}: {}", path.display(), e)))
}

impl RunStore for JsonRunStore {
    fn save_run(&self, run: &TrainingRun) -> Result<()> {
        write_json(&self.path(LATEST_TRAINING_FILE), run)?;

        let mut history = self.history()?;
        history.push(run.clone());
        if history.len() > self.history_limit {
            let excess = history.len() - self.history_limit;
            history.drain(..excess);
        }
        write_json(&self.path(TRAINING_HISTORY_FILE), &history)?;
        debug!(timestamp = %run.timestamp, sessions = history.len(), "run recorded");
        Ok(())
    }

    fn latest_run(&self) -> Result<Option<TrainingRun>> {
        read_json(&self.path(LATEST_TRAINING_FILE))
    }

    fn history(&self) -> Result<Vec<TrainingRun>> {
        Ok(read_json(&self.path(TRAINING_HISTORY_FILE))?.unwrap_or_default())
    }

    fn save_prediction_meta(&self, meta: &PredictionMeta) -> Result<()> {
        write_json(&self.path(LATEST_PREDICTION_FILE), meta)
    }

    fn latest_prediction_meta(&self) -> Result<Option<PredictionMeta>> {
        read_json(&self.path(LATEST_PREDICTION_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::PredictionStats;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn run(ts: &str) -> TrainingRun {
        TrainingRun {
            timestamp: ts.to_string(),
            dataset_file: None,
            dataset_shape: (10, 3),
            features_used: vec!["pH".to_string()],
            train_size: 8,
            test_size: 2,
            models_trained: Vec::new(),
            best_model: "Ridge".to_string(),
        }
    }

    fn meta(mean: f64) -> PredictionMeta {
        PredictionMeta {
            timestamp: "t".to_string(),
            model_used: "Ridge".to_string(),
            total_predictions: 2,
            statistics: PredictionStats {
                mean_wqi: mean,
                median_wqi: 40.0,
                min_wqi: 30.0,
                max_wqi: 50.0,
                std_wqi: 10.0,
            },
            class_distribution: BTreeMap::from([("Good".to_string(), 2)]),
            output_file: "predictions_Ridge_t.csv".to_string(),
        }
    }

    #[test]
    fn test_empty_store() {
        let dir = tempdir().unwrap();
        let store = JsonRunStore::open(dir.path(), 50).unwrap();
        assert!(store.latest_run().unwrap().is_none());
        assert!(store.history().unwrap().is_empty());
        assert!(store.latest_prediction_meta().unwrap().is_none());
    }

    #[test]
    fn test_history_evicts_oldest() {
        let dir = tempdir().unwrap();
        let store = JsonRunStore::open(dir.path(), 3).unwrap();
        for i in 0..5 {
            store.save_run(&run(&format!("t{}", i))).unwrap();
        }
        let history = store.history().unwrap();
        let stamps: Vec<&str> = history.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(stamps, vec!["t2", "t3", "t4"]);
        assert_eq!(store.latest_run().unwrap().unwrap().timestamp, "t4");
        assert!(!dir.path().join("training_history.json.tmp").exists());
    }

    #[test]
    fn test_non_finite_record_keeps_previous_file() {
        let dir = tempdir().unwrap();
        let store = JsonRunStore::open(dir.path(), 50).unwrap();
        store.save_prediction_meta(&meta(40.0)).unwrap();

        let err = store.save_prediction_meta(&meta(f64::NAN)).unwrap_err();
        assert!(matches!(err, WqiError::SerializationError(_)));
        assert!(!dir.path().join("latest_prediction.json.tmp").exists());
        let latest = store.latest_prediction_meta().unwrap().unwrap();
        assert_eq!(latest.statistics.mean_wqi, 40.0);
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(LATEST_TRAINING_FILE), "{not json").unwrap();
        let store = JsonRunStore::open(dir.path(), 50).unwrap();
        assert!(matches!(store.latest_run(), Err(WqiError::SerializationError(_))));
    }
}
