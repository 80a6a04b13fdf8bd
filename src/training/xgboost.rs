//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Leaf weights w* = -T(G, α) / (H + λ), T the L1 soft-threshold
//! - Split gain = ½ [T(G_L)²/(H_L+λ) + T(G_R)²/(H_R+λ) - T(G)²/(H+λ)] - γ
//! - Row subsampling per round and column subsampling per tree

use crate::error::{Result, WqiError};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand::seq::index::sample;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                XGBNode::Leaf { weight } => return *weight,
                XGBNode::Split { feature, threshold, left, right } => {
                    node = if sample[*feature] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }
}

/// L1 soft-threshold of a gradient sum
fn soft_threshold(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

fn leaf_weight(g: f64, h: f64, config: &XGBoostConfig) -> f64 {
    -soft_threshold(g, config.reg_alpha) / (h + config.reg_lambda)
}

fn score(g: f64, h: f64, config: &XGBoostConfig) -> f64 {
    let t = soft_threshold(g, config.reg_alpha);
    t * t / (h + config.reg_lambda)
}

/// Shared state for growing one tree
struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
    features: &'a [usize],
    config: &'a XGBoostConfig,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: &[usize], depth: usize, gains: &mut [f64]) -> XGBNode {
        let g_sum: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h_sum: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let weight = leaf_weight(g_sum, h_sum, self.config);

        if depth >= self.config.max_depth || indices.len() < 2 || h_sum < 2.0 * self.config.min_child_weight {
            return XGBNode::Leaf { weight };
        }

        let best = self
            .features
            .par_iter()
            .filter_map(|&f| self.best_split_for_feature(indices, f, g_sum, h_sum))
            .collect::<Vec<_>>()
            .into_iter()
            .fold(None, |acc: Option<(usize, f64, f64)>, cand| match acc {
                Some(a) if a.2 >= cand.2 => Some(a),
                _ => Some(cand),
            });

        match best {
            Some((feature, threshold, gain)) if gain > self.config.gamma => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| self.x[[i, feature]] <= threshold);
                if left_idx.is_empty() || right_idx.is_empty() {
                    return XGBNode::Leaf { weight };
                }
                gains[feature] += gain;
                let left = self.build(&left_idx, depth + 1, gains);
                let right = self.build(&right_idx, depth + 1, gains);
                XGBNode::Split {
                    feature,
                    threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            _ => XGBNode::Leaf { weight },
        }
    }

    /// Exact greedy scan over one feature; returns (feature, threshold, gain)
    fn best_split_for_feature(&self, indices: &[usize], feature: usize, g_total: f64, h_total: f64) -> Option<(usize, f64, f64)> {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

        let parent = score(g_total, h_total, self.config);
        let mut g_left = 0.0;
        let mut h_left = 0.0;
        let mut best: Option<(usize, f64, f64)> = None;

        for pos in 0..sorted.len() - 1 {
            let idx = sorted[pos];
            g_left += self.grad[idx];
            h_left += self.hess[idx];

            let value = self.x[[idx, feature]];
            let next_value = self.x[[sorted[pos + 1], feature]];
            if next_value <= value {
                continue;
            }
            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                continue;
            }

            let gain = 0.5 * (score(g_left, h_left, self.config) + score(g_right, h_right, self.config) - parent);
            if best.map_or(true, |b| gain > b.2) {
                best = Some((feature, value + (next_value - value) / 2.0, gain));
            }
        }
        best
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64 * ratio).round() as usize).clamp(1, n);
    let mut picked = sample(rng, n, k).into_vec();
    picked.sort_unstable();
    picked
}

/// XGBoost regressor with squared-error objective
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [("subsample", self.config.subsample), ("colsample_bytree", self.config.colsample_bytree)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(WqiError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must lie in (0, 1]".to_string(),
                });
            }
        }
        if self.config.reg_lambda < 0.0 || self.config.reg_alpha < 0.0 {
            return Err(WqiError::InvalidParameter {
                name: "reg_lambda/reg_alpha".to_string(),
                value: format!("{}/{}", self.config.reg_lambda, self.config.reg_alpha),
                reason: "regularization must be non-negative".to_string(),
            });
        }
        Ok(())
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
        self.validate()?;

        self.n_features = n_features;
        self.base_score = y.sum() / n_samples as f64;
        let mut preds = Array1::from_elem(n_samples, self.base_score);
        let hess = Array1::from_elem(n_samples, 1.0);
        let mut gains = vec![0.0; n_features];

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        for _ in 0..self.config.n_estimators {
            // squared error: grad = pred - y, hess = 1
            let grad: Array1<f64> = &preds - y;
            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let cols = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let builder = TreeBuilder {
                x,
                grad: &grad,
                hess: &hess,
                features: &cols,
                config: &self.config,
            };
            let tree = builder.build(&rows, 0, &mut gains);

            for (i, row) in x.outer_iter().enumerate() {
                let step = match row.as_slice() {
                    Some(s) => tree.predict(s),
                    None => tree.predict(&row.to_vec()),
                };
                preds[i] += self.config.learning_rate * step;
            }
            self.trees.push(tree);
        }

        let total: f64 = gains.iter().sum();
        if total > 0.0 {
            gains.iter_mut().for_each(|g| *g /= total);
        }
        self.feature_importances = Some(Array1::from_vec(gains));
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.feature_importances.is_none() {
            return Err(WqiError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(WqiError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let preds: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i).to_vec();
                self.base_score
                    + self.config.learning_rate * self.trees.iter().map(|t| t.predict(&row)).sum::<f64>()
            })
            .collect();
        Ok(Array1::from_vec(preds))
    }

    /// Total split gain per feature, normalized
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::metrics::r2_score;
    use rand_chacha::ChaCha8Rng;

    fn data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let x = Array2::from_shape_fn((n, 3), |_| rng.gen_range(-1.0..1.0));
        let y = x.outer_iter().map(|r| 3.0 * r[0] + (2.0_f64 * r[1]).sin()).collect();
        (x, y)
    }

    #[test]
    fn test_fit_predict() {
        let (x, y) = data(200);
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 4,
            subsample: 0.8,
            colsample_bytree: 0.8,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        assert!(r2_score(&y, &preds) > 0.9);

        let imp = model.feature_importances().unwrap();
        assert!(imp[0] > imp[2]);
    }

    #[test]
    fn test_leaf_weight_soft_threshold() {
        let config = XGBoostConfig { reg_lambda: 1.0, reg_alpha: 0.5, ..Default::default() };
        assert_eq!(leaf_weight(0.3, 4.0, &config), 0.0);
        assert!((leaf_weight(-2.5, 3.0, &config) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_colsample() {
        let (x, y) = data(20);
        let mut model = XGBoostRegressor::new(XGBoostConfig { colsample_bytree: 1.5, ..Default::default() });
        assert!(model.fit(&x, &y).is_err());
    }
}
