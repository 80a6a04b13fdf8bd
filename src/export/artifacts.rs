//! Fitted-pipeline persistence with run-scoped publishing
//!
//! Each training run writes its artifacts into `runs/<run id>/`. The run only
//! becomes visible once the `CURRENT` pointer file is swapped to name it, so
//! readers resolve artifacts either from the previous run or from the new one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, WqiError};
use crate::training::Pipeline;

const RUNS_DIR: &str = "runs";
const POINTER_FILE: &str = "CURRENT";
const ARTIFACT_EXT: &str = "json";

/// A fitted pipeline plus what is needed to apply it later
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_name: String,
    pub timestamp: String,
    pub best_params: BTreeMap<String, String>,
    pub pipeline: Pipeline,
}

impl ModelArtifact {
    pub fn file_name(model_name: &str, timestamp: &str) -> String {
        format!("{}_model_{}.{}", model_name, timestamp, ARTIFACT_EXT)
    }

    /// Column order the pipeline was fit on
    pub fn feature_names(&self) -> &[String] {
        self.pipeline.feature_names()
    }
}

/// Listing entry for a published artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub filename: String,
    pub timestamp: String,
    pub path: PathBuf,
}

impl ArtifactInfo {
    fn parse(path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        let stem = filename.strip_suffix(&format!(".{}", ARTIFACT_EXT))?;
        let (name, timestamp) = stem.split_once("_model_")?;
        Some(Self {
            name: name.to_string(),
            timestamp: timestamp.to_string(),
            filename,
            path: path.to_path_buf(),
        })
    }
}

/// Storage of fitted pipelines
pub trait ArtifactStore: Send + Sync {
    /// Open a staging namespace for a run; returns the run id actually used,
    /// which differs from `timestamp` only on collision.
    fn stage_run(&self, timestamp: &str) -> Result<String>;

    /// Write an artifact into a staged run and return its file name
    fn save(&self, run_id: &str, artifact: &ModelArtifact) -> Result<String>;

    /// Make a staged run the current one; returns the run it replaced
    fn publish(&self, run_id: &str) -> Result<Option<String>>;

    /// Point back at `previous` (or at nothing) and drop `run_id`
    fn unpublish(&self, run_id: &str, previous: Option<&str>) -> Result<()>;

    /// Drop the replaced run and every run staged before `published`.
    /// Runs staged later belong to trainers still in flight and are kept.
    fn collect_superseded(&self, published: &str, replaced: Option<&str>);

    /// Remove a staged run that will never be published
    fn discard(&self, run_id: &str);

    fn load_latest_by_prefix(&self, model_name: &str) -> Result<ModelArtifact>;

    fn delete_all(&self) -> Result<()>;

    /// Published artifacts, newest first
    fn list(&self) -> Result<Vec<ArtifactInfo>>;
}

/// Artifacts as JSON files under a local model directory
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(RUNS_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(RUNS_DIR).join(run_id)
    }

    /// Run id named by the pointer, if it still resolves to a directory
    pub fn current_run(&self) -> Result<Option<String>> {
        let pointer = self.root.join(POINTER_FILE);
        if !pointer.exists() {
            return Ok(None);
        }
        let run_id = fs::read_to_string(pointer)?.trim().to_string();
        if run_id.is_empty() || !self.run_dir(&run_id).is_dir() {
            return Ok(None);
        }
        Ok(Some(run_id))
    }

    fn write_pointer(&self, run_id: &str) -> Result<()> {
        let pointer = self.root.join(POINTER_FILE);
        let tmp = self.root.join(format!("{}.tmp", POINTER_FILE));
        fs::write(&tmp, run_id)?;
        fs::rename(&tmp, &pointer)?;
        Ok(())
    }

    /// Remove every entry under `runs/` for which `stale` holds
    fn collect_garbage(&self, stale: impl Fn(&str) -> bool) {
        let entries = match fs::read_dir(self.root.join(RUNS_DIR)) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "could not scan run directories");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !stale(&name) {
                continue;
            }
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => debug!(path = %path.display(), "removed superseded run"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove superseded run"),
            }
        }
    }
}

/// Sort key for run ids: the timestamp, then the collision suffix
fn run_order(run_id: &str) -> (&str, u32) {
    match run_id.rsplit_once('_') {
        Some((base, suffix)) if base.contains('_') => (base, suffix.parse().unwrap_or(0)),
        _ => (run_id, 1),
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn stage_run(&self, timestamp: &str) -> Result<String> {
        let mut run_id = timestamp.to_string();
        let mut suffix = 2;
        while self.run_dir(&run_id).exists() {
            run_id = format!("{}_{}", timestamp, suffix);
            suffix += 1;
        }
        fs::create_dir_all(self.run_dir(&run_id))?;
        Ok(run_id)
    }

    fn save(&self, run_id: &str, artifact: &ModelArtifact) -> Result<String> {
        let dir = self.run_dir(run_id);
        if !dir.is_dir() {
            return Err(WqiError::DataError(format!("run '{}' is not staged", run_id)));
        }
        let filename = ModelArtifact::file_name(&artifact.model_name, &artifact.timestamp);
        let file = File::create(dir.join(&filename))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, artifact)?;
        writer.flush()?;
        Ok(filename)
    }

    fn publish(&self, run_id: &str) -> Result<Option<String>> {
        if !self.run_dir(run_id).is_dir() {
            return Err(WqiError::DataError(format!("run '{}' is not staged", run_id)));
        }
        let previous = self.current_run()?;
        self.write_pointer(run_id)?;
        info!(run = run_id, "published model run");
        Ok(previous)
    }

    fn unpublish(&self, run_id: &str, previous: Option<&str>) -> Result<()> {
        match previous {
            Some(previous) => self.write_pointer(previous)?,
            None => {
                let pointer = self.root.join(POINTER_FILE);
                if pointer.exists() {
                    fs::remove_file(&pointer)?;
                }
            }
        }
        warn!(run = run_id, restored = ?previous, "withdrew published run");
        self.discard(run_id);
        Ok(())
    }

    fn collect_superseded(&self, published: &str, replaced: Option<&str>) {
        let published = run_order(published);
        self.collect_garbage(|name| Some(name) == replaced || run_order(name) < published);
    }

    fn discard(&self, run_id: &str) {
        let dir = self.run_dir(run_id);
        if let Err(e) = fs::remove_dir_all(&dir) {
            warn!(path = %dir.display(), error = %e, "failed to remove staged run");
        }
    }

    fn load_latest_by_prefix(&self, model_name: &str) -> Result<ModelArtifact> {
        let prefix = format!("{}_model_", model_name);
        let info = self
            .list()?
            .into_iter()
            .find(|a| a.filename.starts_with(&prefix))
            .ok_or_else(|| WqiError::ModelNotFound(model_name.to_string()))?;

        let file = File::open(&info.path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| WqiError::SerializationError(format!("{}: {}", info.filename, e)))
    }

    fn delete_all(&self) -> Result<()> {
        let pointer = self.root.join(POINTER_FILE);
        if pointer.exists() {
            fs::remove_file(&pointer)?;
        }
        self.collect_garbage(|_| true);
        Ok(())
    }

    fn list(&self) -> Result<Vec<ArtifactInfo>> {
        let Some(run_id) = self.current_run()? else {
            return Ok(Vec::new());
        };
        let mut artifacts: Vec<ArtifactInfo> = fs::read_dir(self.run_dir(&run_id))?
            .flatten()
            .filter_map(|entry| ArtifactInfo::parse(&entry.path()))
            .collect();
        artifacts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.filename.cmp(&b.filename)));
        Ok(artifacts)
    }
}
