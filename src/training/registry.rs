//! The fixed set of regressor families and their search spaces

use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::linear_models::RidgeRegression;
use super::pipeline::{Estimator, Pipeline};
use super::random_forest::{MaxFeatures, RandomForestRegressor};
use super::search::{ParamDomain, ParamSet, ParamValue, SearchSpace};
use super::svm::{Gamma, SvrConfig, SvrRegressor};
use super::xgboost::{XGBoostConfig, XGBoostRegressor};
use crate::error::{Result, WqiError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registered model families, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Ridge,
    #[serde(rename = "SVR")]
    Svr,
    RandomForest,
    GradientBoosting,
    XGBoost,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Ridge,
        ModelKind::Svr,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::XGBoost,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Ridge => "Ridge",
            ModelKind::Svr => "SVR",
            ModelKind::RandomForest => "RandomForest",
            ModelKind::GradientBoosting => "GradientBoosting",
            ModelKind::XGBoost => "XGBoost",
        }
    }

    /// Ridge and SVR see standardized inputs; tree splits are scale-invariant.
    pub fn uses_scaler(&self) -> bool {
        matches!(self, ModelKind::Ridge | ModelKind::Svr)
    }

    pub fn supports_importances(&self) -> bool {
        matches!(
            self,
            ModelKind::RandomForest | ModelKind::GradientBoosting | ModelKind::XGBoost
        )
    }

    pub fn default_search_space(&self) -> SearchSpace {
        match self {
            ModelKind::Ridge => {
                SearchSpace::new().with("alpha", ParamDomain::LogSpace { start: -3.0, stop: 2.0, num: 20 })
            }
            ModelKind::Svr => SearchSpace::new()
                .with("C", ParamDomain::LogSpace { start: -2.0, stop: 3.0, num: 15 })
                .with("epsilon", ParamDomain::LogSpace { start: -3.0, stop: 0.0, num: 8 })
                .with("gamma", ParamDomain::choice(["scale", "auto"])),
            ModelKind::RandomForest => SearchSpace::new()
                .with("n_estimators", ParamDomain::choice([200usize, 400, 600]))
                .with(
                    "max_depth",
                    ParamDomain::Choice(vec![
                        ParamValue::Unset,
                        ParamValue::Int(6),
                        ParamValue::Int(8),
                        ParamValue::Int(10),
                    ]),
                )
                .with("min_samples_split", ParamDomain::choice([2usize, 5, 10]))
                .with("min_samples_leaf", ParamDomain::choice([1usize, 2, 4]))
                .with(
                    "max_features",
                    ParamDomain::Choice(vec!["sqrt".into(), 0.7.into(), 0.9.into()]),
                ),
            ModelKind::GradientBoosting => SearchSpace::new()
                .with("n_estimators", ParamDomain::choice([200usize, 400, 600]))
                .with("learning_rate", ParamDomain::choice([0.01, 0.03, 0.05, 0.1]))
                .with("max_depth", ParamDomain::choice([3usize, 4, 5]))
                .with("subsample", ParamDomain::choice([0.8, 1.0]))
                .with("min_samples_split", ParamDomain::choice([2usize, 5]))
                .with("min_samples_leaf", ParamDomain::choice([1usize, 2])),
            ModelKind::XGBoost => SearchSpace::new()
                .with("n_estimators", ParamDomain::choice([300usize, 500, 800]))
                .with("learning_rate", ParamDomain::choice([0.01, 0.03, 0.05, 0.1]))
                .with("max_depth", ParamDomain::choice([4usize, 6, 8]))
                .with("subsample", ParamDomain::choice([0.7, 0.8, 1.0]))
                .with("colsample_bytree", ParamDomain::choice([0.6, 0.8, 1.0]))
                .with("reg_lambda", ParamDomain::choice([0.0, 0.5, 1.0]))
                .with("reg_alpha", ParamDomain::choice([0.0, 0.1, 0.5])),
        }
    }

    /// Untrained pipeline for `params`; parameters absent from the set keep
    /// the family's defaults.
    pub fn build(&self, params: &ParamSet, seed: u64) -> Result<Pipeline> {
        let estimator = match self {
            ModelKind::Ridge => Estimator::Ridge(RidgeRegression::new(params.f64_or("alpha", 1.0)?)),
            ModelKind::Svr => Estimator::Svr(SvrRegressor::new(SvrConfig {
                c: params.f64_or("C", 1.0)?,
                epsilon: params.f64_or("epsilon", 0.1)?,
                gamma: parse_gamma(params.get("gamma"))?,
                random_state: Some(seed),
                ..SvrConfig::default()
            })),
            ModelKind::RandomForest => Estimator::RandomForest(
                RandomForestRegressor::new(params.usize_or("n_estimators", 100)?)
                    .with_max_depth(params.opt_usize_or("max_depth", None)?)
                    .with_min_samples_split(params.usize_or("min_samples_split", 2)?)
                    .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?)
                    .with_max_features(parse_max_features(params.get("max_features"))?)
                    .with_random_state(seed),
            ),
            ModelKind::GradientBoosting => {
                let defaults = GradientBoostingConfig::default();
                Estimator::GradientBoosting(GradientBoostingRegressor::new(GradientBoostingConfig {
                    n_estimators: params.usize_or("n_estimators", defaults.n_estimators)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    max_depth: params.usize_or("max_depth", defaults.max_depth)?,
                    min_samples_split: params.usize_or("min_samples_split", defaults.min_samples_split)?,
                    min_samples_leaf: params.usize_or("min_samples_leaf", defaults.min_samples_leaf)?,
                    subsample: params.f64_or("subsample", defaults.subsample)?,
                    random_state: Some(seed),
                }))
            }
            ModelKind::XGBoost => Estimator::XGBoost(XGBoostRegressor::new(XGBoostConfig {
                n_estimators: params.usize_or("n_estimators", 300)?,
                learning_rate: params.f64_or("learning_rate", 0.05)?,
                max_depth: params.usize_or("max_depth", 6)?,
                subsample: params.f64_or("subsample", 0.8)?,
                colsample_bytree: params.f64_or("colsample_bytree", 0.8)?,
                reg_lambda: params.f64_or("reg_lambda", 1.0)?,
                reg_alpha: params.f64_or("reg_alpha", 0.0)?,
                random_state: Some(seed),
                ..XGBoostConfig::default()
            })),
        };
        Ok(Pipeline::new(estimator, self.uses_scaler()))
    }
}

fn parse_gamma(value: Option<&ParamValue>) -> Result<Gamma> {
    match value {
        None => Ok(Gamma::Scale),
        Some(ParamValue::Text(s)) if s == "scale" => Ok(Gamma::Scale),
        Some(ParamValue::Text(s)) if s == "auto" => Ok(Gamma::Auto),
        Some(ParamValue::Float(g)) if *g > 0.0 => Ok(Gamma::Value(*g)),
        Some(other) => Err(WqiError::InvalidParameter {
            name: "gamma".to_string(),
            value: other.to_string(),
            reason: "expected 'scale', 'auto' or a positive number".to_string(),
        }),
    }
}

fn parse_max_features(value: Option<&ParamValue>) -> Result<MaxFeatures> {
    match value {
        None | Some(ParamValue::Unset) => Ok(MaxFeatures::All),
        Some(ParamValue::Text(s)) if s == "sqrt" => Ok(MaxFeatures::Sqrt),
        Some(ParamValue::Float(f)) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
        Some(other) => Err(WqiError::InvalidParameter {
            name: "max_features".to_string(),
            value: other.to_string(),
            reason: "expected 'sqrt' or a fraction in (0, 1]".to_string(),
        }),
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = WqiError;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| WqiError::ModelNotFound(s.to_string()))
    }
}

/// One registry slot: a family and the space searched for it
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub kind: ModelKind,
    pub search_space: SearchSpace,
}

/// Enumerates every family exactly once, in [`ModelKind::ALL`] order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            entries: ModelKind::ALL
                .into_iter()
                .map(|kind| RegistryEntry {
                    kind,
                    search_space: kind.default_search_space(),
                })
                .collect(),
        }
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the space searched for one family (an empty space means a
    /// single cross-validated fit of the defaults).
    pub fn with_search_space(mut self, kind: ModelKind, space: SearchSpace) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.kind == kind) {
            entry.search_space = space;
        }
        self
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.kind.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_is_fixed() {
        let registry = ModelRegistry::default();
        assert_eq!(
            registry.names(),
            vec!["Ridge", "SVR", "RandomForest", "GradientBoosting", "XGBoost"]
        );
    }

    #[test]
    fn test_capabilities() {
        assert!(ModelKind::Ridge.uses_scaler());
        assert!(ModelKind::Svr.uses_scaler());
        assert!(!ModelKind::XGBoost.uses_scaler());
        assert!(!ModelKind::Ridge.supports_importances());
        assert!(ModelKind::RandomForest.supports_importances());
    }

    #[test]
    fn test_grid_sizes() {
        assert_eq!(ModelKind::Ridge.default_search_space().grid_size(), 20);
        assert_eq!(ModelKind::Svr.default_search_space().grid_size(), 240);
        assert_eq!(ModelKind::RandomForest.default_search_space().grid_size(), 324);
        assert_eq!(ModelKind::GradientBoosting.default_search_space().grid_size(), 288);
        assert_eq!(ModelKind::XGBoost.default_search_space().grid_size(), 2916);
    }

    #[test]
    fn test_build_every_sampled_point() {
        for kind in ModelKind::ALL {
            for params in kind.default_search_space().sample(10, 42) {
                let pipeline = kind.build(&params, 42).unwrap();
                assert_eq!(pipeline.is_standardized(), kind.uses_scaler());
            }
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("svr".parse::<ModelKind>().unwrap(), ModelKind::Svr);
        assert_eq!("XGBoost".parse::<ModelKind>().unwrap(), ModelKind::XGBoost);
        assert!(matches!("Lasso".parse::<ModelKind>(), Err(WqiError::ModelNotFound(_))));
    }

    #[test]
    fn test_override_search_space() {
        let registry = ModelRegistry::default().with_search_space(ModelKind::Ridge, SearchSpace::new());
        assert!(registry.entries()[0].search_space.is_empty());
        assert_eq!(registry.len(), 5);
    }
}
