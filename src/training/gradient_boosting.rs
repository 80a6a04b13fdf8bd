//! Gradient boosted regression trees (squared loss)

use super::decision_tree::DecisionTreeRegressor;
use crate::error::{Result, WqiError};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand::seq::index::sample;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Row fraction drawn without replacement per round
    pub subsample: f64,
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    feature_importances: Option<Array1<f64>>,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: None,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    fn subsample_indices(&self, n_samples: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n_samples).collect();
        }
        let k = ((n_samples as f64 * self.config.subsample).round() as usize).clamp(1, n_samples);
        let mut picked = sample(rng, n_samples, k).into_vec();
        picked.sort_unstable();
        picked
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(WqiError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(WqiError::ComputationError("cannot boost on zero rows".to_string()));
        }
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(WqiError::InvalidParameter {
                name: "subsample".to_string(),
                value: self.config.subsample.to_string(),
                reason: "must lie in (0, 1]".to_string(),
            });
        }

        self.initial_prediction = y.sum() / n_samples as f64;
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let mut importances = vec![0.0; n_features];
        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y - &predictions;
            let rows = self.subsample_indices(n_samples, &mut rng);

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(Some(self.config.max_depth))
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(rng.gen());
            tree.fit_indices(x, &residuals, &rows)?;

            // every row moves, not only the sampled ones
            let update = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &update);

            if let Some(imp) = tree.feature_importances() {
                for (acc, v) in importances.iter_mut().zip(imp.iter()) {
                    *acc += v;
                }
            }
            self.trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() && self.config.n_estimators > 0 {
            return Err(WqiError::ModelNotFitted);
        }
        let mut preds = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            preds.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(preds)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}
