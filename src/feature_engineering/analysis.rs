//! Dataset inspection ahead of training or prediction

use super::engineer::{is_numeric, normalize_columns, FEATURES, TARGET};
use crate::error::Result;
use crate::utils::column_to_array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Describe-style statistics for a numeric column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (ddof = 1)
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    pub missing: usize,
    pub stats: Option<ColumnStats>,
}

/// Readiness of a dataset after alias renaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetValidation {
    pub has_all_features: bool,
    pub has_target: bool,
    pub missing_features: Vec<String>,
    pub ready_for_training: bool,
    pub ready_for_prediction: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetAnalysis {
    pub shape: (usize, usize),
    pub columns: Vec<ColumnSummary>,
    pub validation: DatasetValidation,
}

fn column_stats(df: &DataFrame, name: &str) -> Result<Option<ColumnStats>> {
    let values: Vec<f64> = column_to_array1(df, name)?
        .into_iter()
        .filter(|v| !v.is_nan())
        .collect();
    if values.is_empty() {
        return Ok(None);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = if values.len() > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        f64::NAN
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(Some(ColumnStats { count: values.len(), mean, std, min, max }))
}

/// Summarize shape, types, missing values and readiness of a raw table.
pub fn analyze(df: &DataFrame) -> Result<DatasetAnalysis> {
    let columns = df
        .get_columns()
        .iter()
        .map(|col| {
            let name = col.name().to_string();
            let stats = if is_numeric(col.dtype()) {
                column_stats(df, &name)?
            } else {
                None
            };
            let nan_count = stats
                .as_ref()
                .map(|s| df.height() - col.null_count() - s.count)
                .unwrap_or(0);
            Ok(ColumnSummary {
                dtype: col.dtype().to_string(),
                missing: col.null_count() + nan_count,
                stats,
                name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let renamed = normalize_columns(df)?;
    let missing_features: Vec<String> = FEATURES
        .iter()
        .filter(|name| renamed.column(name).is_err())
        .map(|s| s.to_string())
        .collect();
    let has_all_features = missing_features.is_empty();
    let has_target = renamed.column(TARGET).is_ok();

    Ok(DatasetAnalysis {
        shape: df.shape(),
        columns,
        validation: DatasetValidation {
            has_all_features,
            has_target,
            missing_features,
            ready_for_training: has_all_features && has_target,
            ready_for_prediction: has_all_features,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_reports_missing_and_readiness() {
        let df = df!(
            "Temperature" => &[Some(20.0), None, Some(22.0)],
            "pH" => &[7.0, 7.1, 7.2],
            "Location" => &["a", "b", "c"]
        )
        .unwrap();

        let analysis = analyze(&df).unwrap();
        assert_eq!(analysis.shape, (3, 3));

        let temp = &analysis.columns[0];
        assert_eq!(temp.missing, 1);
        let stats = temp.stats.as_ref().unwrap();
        assert_eq!(stats.count, 2);
        assert!((stats.mean - 21.0).abs() < 1e-12);
        assert!(analysis.columns[2].stats.is_none());

        let v = &analysis.validation;
        assert!(!v.has_all_features);
        assert!(!v.has_target);
        assert!(!v.missing_features.contains(&"Temp".to_string()));
        assert_eq!(v.missing_features.len(), 6);
        assert!(!v.ready_for_prediction);
    }
}
