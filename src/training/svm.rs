//! Epsilon-insensitive support vector regression with an RBF kernel
//!
//! Solved in the dual by randomized coordinate descent. The bias is absorbed
//! into the kernel (K + 1), which removes the equality constraint so every
//! coordinate update is a closed-form soft-threshold followed by a box clip.

use crate::error::{Result, WqiError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// RBF kernel width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// 1 / (n_features · Var(X))
    Scale,
    /// 1 / n_features
    Auto,
    Value(f64),
}

impl Gamma {
    fn resolve(&self, x: &Array2<f64>) -> f64 {
        let n_features = x.ncols().max(1) as f64;
        match self {
            Gamma::Scale => {
                let var = x.var(0.0);
                if var > 0.0 && var.is_finite() {
                    1.0 / (n_features * var)
                } else {
                    1.0
                }
            }
            Gamma::Auto => 1.0 / n_features,
            Gamma::Value(g) => *g,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrConfig {
    /// Box constraint on the dual coefficients
    pub c: f64,
    /// Half-width of the insensitive tube
    pub epsilon: f64,
    pub gamma: Gamma,
    pub tol: f64,
    /// Maximum passes over the coordinates
    pub max_iter: usize,
    pub random_state: Option<u64>,
}

impl Default for SvrConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 500,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrRegressor {
    config: SvrConfig,
    support_vectors: Option<Array2<f64>>,
    dual_coef: Option<Array1<f64>>,
    gamma_value: f64,
    bias: f64,
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (-gamma * sq).exp()
}

impl SvrRegressor {
    pub fn new(config: SvrConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            gamma_value: 0.0,
            bias: 0.0,
        }
    }

    pub fn config(&self) -> &SvrConfig {
        &self.config
    }

    fn kernel_matrix(x: &Array2<f64>, gamma: f64) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| rbf(x.row(i), x.row(j), gamma) + 1.0).collect())
            .collect();
        Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n != y.len() {
            return Err(WqiError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n == 0 {
            return Err(WqiError::ComputationError("cannot fit SVR on zero rows".to_string()));
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(WqiError::ComputationError(format!(
                "{} samples exceed the SVR kernel matrix limit of {}",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        if self.config.c <= 0.0 {
            return Err(WqiError::InvalidParameter {
                name: "C".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let gamma = self.config.gamma.resolve(x);
        let k = Self::kernel_matrix(x, gamma);
        let c = self.config.c;
        let eps = self.config.epsilon;

        let mut beta: Array1<f64> = Array1::zeros(n);
        // K·β maintained incrementally
        let mut k_beta: Array1<f64> = Array1::zeros(n);
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        for _ in 0..self.config.max_iter {
            order.shuffle(&mut rng);
            let mut max_delta = 0.0f64;

            for &i in &order {
                let kii = k[[i, i]];
                let grad = k_beta[i] - y[i];
                let z = beta[i] - grad / kii;
                let threshold = eps / kii;
                let shrunk = if z > threshold {
                    z - threshold
                } else if z < -threshold {
                    z + threshold
                } else {
                    0.0
                };
                let updated = shrunk.clamp(-c, c);
                let delta = updated - beta[i];
                if delta != 0.0 {
                    k_beta.scaled_add(delta, &k.column(i));
                    beta[i] = updated;
                    max_delta = max_delta.max(delta.abs());
                }
            }

            if max_delta < self.config.tol {
                break;
            }
        }

        let support: Vec<usize> = (0..n).filter(|&i| beta[i].abs() > 1e-12).collect();
        self.bias = beta.sum();
        self.support_vectors = Some(x.select(Axis(0), &support));
        self.dual_coef = Some(support.iter().map(|&i| beta[i]).collect());
        self.gamma_value = gamma;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(WqiError::ModelNotFitted),
        };
        if sv.nrows() > 0 && x.ncols() != sv.ncols() {
            return Err(WqiError::ShapeError {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let preds: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.bias
                    + sv.outer_iter()
                        .zip(coef.iter())
                        .map(|(s, a)| a * rbf(s, row, self.gamma_value))
                        .sum::<f64>()
            })
            .collect();
        Ok(Array1::from_vec(preds))
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::metrics::root_mean_squared_error;

    fn sine_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 1), |(i, _)| i as f64 / 10.0 - 3.0);
        let y = x.column(0).mapv(|v| v.sin());
        (x, y)
    }

    #[test]
    fn test_svr_fits_nonlinear_curve() {
        let (x, y) = sine_data();
        let mut model = SvrRegressor::new(SvrConfig {
            c: 10.0,
            epsilon: 0.01,
            gamma: Gamma::Value(1.0),
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        assert!(root_mean_squared_error(&y, &preds) < 0.1);
    }

    #[test]
    fn test_wide_tube_has_no_support_vectors() {
        let (x, y) = sine_data();
        let mut model = SvrRegressor::new(SvrConfig {
            epsilon: 5.0,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_support_vectors(), 0);
        let preds = model.predict(&x).unwrap();
        assert!(preds.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_gamma_resolution() {
        let x = Array2::from_shape_fn((4, 2), |(i, j)| (i + j) as f64);
        assert!((Gamma::Auto.resolve(&x) - 0.5).abs() < 1e-12);
        let expected = 1.0 / (2.0 * x.var(0.0));
        assert!((Gamma::Scale.resolve(&x) - expected).abs() < 1e-12);
    }
}
