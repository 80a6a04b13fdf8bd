//! Ranking of per-model results by held-out error

use crate::tracking::ResultRecord;
use std::cmp::Ordering;

/// Sort ascending by test RMSE. The sort is stable, so tied records keep
/// registry order.
pub fn rank(results: &mut [ResultRecord]) {
    results.sort_by(|a, b| a.test_rmse.total_cmp(&b.test_rmse));
}

/// Lowest test RMSE; the earliest record wins a tie.
pub fn select(results: &[ResultRecord]) -> Option<&ResultRecord> {
    results.iter().fold(None, |best: Option<&ResultRecord>, r| match best {
        Some(b) if r.test_rmse.total_cmp(&b.test_rmse) != Ordering::Less => Some(b),
        _ => Some(r),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(name: &str, rmse: f64) -> ResultRecord {
        ResultRecord {
            model_name: name.to_string(),
            cv_rmse: rmse,
            test_r2: 0.0,
            test_mae: 0.0,
            test_rmse: rmse,
            test_mape: 0.0,
            best_params: BTreeMap::new(),
            model_file: String::new(),
            feature_importance: None,
        }
    }

    fn five() -> Vec<ResultRecord> {
        ["Ridge", "SVR", "RandomForest", "GradientBoosting", "XGBoost"]
            .iter()
            .zip([3.1, 2.9, 4.0, 2.9, 3.5])
            .map(|(n, r)| record(n, r))
            .collect()
    }

    #[test]
    fn test_tie_goes_to_registry_order() {
        let results = five();
        assert_eq!(select(&results).unwrap().model_name, "SVR");
    }

    #[test]
    fn test_rank_is_stable() {
        let mut results = five();
        rank(&mut results);
        let names: Vec<&str> = results.iter().map(|r| r.model_name.as_str()).collect();
        assert_eq!(names, vec!["SVR", "GradientBoosting", "Ridge", "XGBoost", "RandomForest"]);
        assert_eq!(select(&results).unwrap().model_name, results[0].model_name);
    }

    #[test]
    fn test_empty() {
        assert!(select(&[]).is_none());
    }
}
