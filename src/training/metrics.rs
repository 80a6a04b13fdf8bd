//! Regression metrics used for tuning and held-out evaluation

use crate::error::{Result, WqiError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Stabilizes MAPE denominators near zero
pub const MAPE_EPSILON: f64 = 1e-10;
/// Upper bound reported for MAPE, in percent
pub const MAPE_CAP: f64 = 100.0;

/// Held-out evaluation of a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error in percent, clipped to [0, 100]
    pub mape: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        Ok(Self {
            r2: r2_score(y_true, y_pred),
            mae: mean_absolute_error(y_true, y_pred),
            rmse: root_mean_squared_error(y_true, y_pred),
            mape: mape(y_true, y_pred),
        })
    }
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() || y_true.is_empty() {
        return Err(WqiError::ShapeError {
            expected: format!("{} non-empty predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    Ok(())
}

pub fn root_mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    let mse = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n;
    mse.sqrt()
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).abs()).sum::<f64>() / n
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// mean(|(y - p) / (y + ε)|) · 100, clipped to [0, 100]
pub fn mape(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    let raw = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| ((t - p) / (t + MAPE_EPSILON)).abs())
        .sum::<f64>()
        / n
        * 100.0;
    if raw.is_nan() {
        MAPE_CAP
    } else {
        raw.clamp(0.0, MAPE_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y = array![10.0, 20.0, 30.0, 40.0];
        let p = array![12.0, 18.0, 30.0, 44.0];
        let m = RegressionMetrics::compute(&y, &p).unwrap();

        assert!((m.mae - 2.0).abs() < 1e-12);
        assert!((m.rmse - 6.0f64.sqrt()).abs() < 1e-12);
        assert!((m.r2 - (1.0 - 24.0 / 500.0)).abs() < 1e-12);
        let expected_mape = (0.2 + 0.1 + 0.0 + 0.1) / 4.0 * 100.0;
        assert!((m.mape - expected_mape).abs() < 1e-6);
    }

    #[test]
    fn test_mape_clipped() {
        let y = array![0.0, 1.0];
        let p = array![5.0, 1.0];
        assert_eq!(mape(&y, &p), MAPE_CAP);

        // negative targets still give a positive error
        let y = array![-10.0, -10.0];
        let p = array![-5.0, -5.0];
        assert!((mape(&y, &p) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(RegressionMetrics::compute(&array![1.0, 2.0], &array![1.0]).is_err());
    }
}
