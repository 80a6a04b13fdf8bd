//! Pipeline configuration
//!
//! Defaults reproduce the reference training setup (80/20 split, 5 shuffled
//! folds, 30 search samples, seed 42). Values can be overlaid from the
//! environment with [`PipelineConfig::from_env`].

use crate::error::{Result, WqiError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Deployment profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    Development,
    Production,
    /// Smaller search budget for fast test runs
    Testing,
}

impl FromStr for Profile {
    type Err = WqiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" | "default" => Ok(Profile::Development),
            "production" | "prod" => Ok(Profile::Production),
            "testing" | "test" => Ok(Profile::Testing),
            other => Err(WqiError::ConfigError(format!("unknown profile '{}'", other))),
        }
    }
}

/// Configuration shared by the trainer, predictor and stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub profile: Profile,
    /// Fraction of rows held out for the final evaluation
    pub test_size: f64,
    pub cv_folds: usize,
    /// Seed applied to the split, the folds, the search sampler and every model
    pub random_state: u64,
    /// Maximum random-search samples per model
    pub tuning_iterations: usize,
    pub model_dir: PathBuf,
    pub results_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub default_model: String,
    /// Upper bound on accepted upload size in bytes
    pub max_content_length: u64,
    /// Number of run records kept in the history file
    pub history_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Development,
            test_size: 0.2,
            cv_folds: 5,
            random_state: 42,
            tuning_iterations: 30,
            model_dir: PathBuf::from("models"),
            results_dir: PathBuf::from("results"),
            upload_dir: PathBuf::from("uploads"),
            default_model: "XGBoost".to_string(),
            max_content_length: 50 * 1024 * 1024,
            history_limit: 50,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for the given profile
    pub fn for_profile(profile: Profile) -> Self {
        let mut config = Self {
            profile,
            ..Self::default()
        };
        if profile == Profile::Testing {
            config.tuning_iterations = 5;
        }
        config
    }

    /// Build a config from `WQI_PROFILE` and the folder/tuning variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let profile = match lookup("WQI_PROFILE") {
            Some(p) => p.parse()?,
            None => Profile::Development,
        };
        let mut config = Self::for_profile(profile);

        if let Some(dir) = lookup("MODEL_FOLDER") {
            config.model_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("RESULTS_FOLDER") {
            config.results_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("UPLOAD_FOLDER") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(model) = lookup("DEFAULT_MODEL") {
            config.default_model = model;
        }
        if let Some(v) = parse_var(&lookup, "CV_FOLDS")? {
            config.cv_folds = v;
        }
        if let Some(v) = parse_var(&lookup, "RANDOM_STATE")? {
            config.random_state = v;
        }
        if let Some(v) = parse_var(&lookup, "TEST_SIZE")? {
            config.test_size = v;
        }
        if let Some(v) = parse_var(&lookup, "TUNING_ITERATIONS")? {
            config.tuning_iterations = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_CONTENT_LENGTH")? {
            config.max_content_length = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_tuning_iterations(mut self, n_iter: usize) -> Self {
        self.tuning_iterations = n_iter;
        self
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Reject settings the trainer cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(WqiError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if self.cv_folds < 2 {
            return Err(WqiError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: self.cv_folds.to_string(),
                reason: "at least 2 folds are required".to_string(),
            });
        }
        if self.tuning_iterations == 0 {
            return Err(WqiError::InvalidParameter {
                name: "tuning_iterations".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| WqiError::ConfigError(format!("{} has invalid value '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.random_state, 42);
        assert_eq!(config.tuning_iterations, 30);
        assert_eq!(config.default_model, "XGBoost");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_profile_lowers_budget() {
        let config = PipelineConfig::from_lookup(lookup_from(&[("WQI_PROFILE", "testing")])).unwrap();
        assert_eq!(config.profile, Profile::Testing);
        assert_eq!(config.tuning_iterations, 5);
    }

    #[test]
    fn test_env_overlay() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("MODEL_FOLDER", "/tmp/m"),
            ("CV_FOLDS", "3"),
            ("TEST_SIZE", "0.25"),
        ]))
        .unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/tmp/m"));
        assert_eq!(config.cv_folds, 3);
        assert!((config.test_size - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_value_is_config_error() {
        let err = PipelineConfig::from_lookup(lookup_from(&[("CV_FOLDS", "five")])).unwrap_err();
        assert!(matches!(err, WqiError::ConfigError(_)));
    }

    #[test]
    fn test_validate_rejects_bad_split() {
        let config = PipelineConfig::default().with_test_size(1.0);
        assert!(config.validate().is_err());
    }
}
