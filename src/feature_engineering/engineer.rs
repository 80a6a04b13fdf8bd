//! Column normalization, validation and median imputation

use super::derived::{append_derived_features, DERIVED_MARKERS};
use crate::error::{Result, WqiError};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Canonical measurement columns, in display order
pub const FEATURES: [&str; 8] = [
    "Temp",
    "pH",
    "Conductivity",
    "Nitrate",
    "Fecal_Coliform",
    "Total_Coliform",
    "TDS",
    "Fluoride",
];

/// Regression target
pub const TARGET: &str = "WQI";

/// Alias to canonical name. Earlier entries win when two aliases of the same
/// canonical column are present.
pub const COLUMN_ALIASES: [(&str, &str); 10] = [
    ("Temperature ⁰C", "Temp"),
    ("Temperature", "Temp"),
    ("Conductivity (μmhos/cm)", "Conductivity"),
    ("Nitrate N (mg/L)", "Nitrate"),
    ("Nitrate", "Nitrate"),
    ("Faecal Coliform (MPN/100ml)", "Fecal_Coliform"),
    ("Fecal Coliform (MPN/100ml)", "Fecal_Coliform"),
    ("Total Coliform (MPN/100ml)", "Total_Coliform"),
    ("Total Dissolved Solids (mg/L)", "TDS"),
    ("Fluoride (mg/L)", "Fluoride"),
];

/// Known categorical columns removed before the generic non-numeric sweep
pub const CATEGORICAL_COLUMNS: [&str; 12] = [
    "State Name",
    "State",
    "Location",
    "Station",
    "Date",
    "Monitoring Location",
    "Station Code",
    "District",
    "Block",
    "WQI_Classification",
    "WQI_Class",
    "WQI_Class_Encoded",
];

/// Label columns never used as model inputs
pub const LABEL_COLUMNS: [&str; 3] = ["WQI_Class", "WQI_Class_Encoded", "WQI_Classification"];

pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Rename alias columns to their canonical names.
///
/// An alias whose canonical column already exists is dropped instead, so the
/// frame never carries duplicate names.
pub fn normalize_columns(df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();
    for (alias, canonical) in COLUMN_ALIASES.iter() {
        if alias == canonical || out.column(alias).is_err() {
            continue;
        }
        if out.column(canonical).is_ok() {
            warn!(alias = *alias, canonical = *canonical, "alias collides with an existing column, dropping it");
            out.drop_in_place(alias)?;
        } else {
            out.rename(alias, (*canonical).into())?;
        }
    }
    Ok(out)
}

/// Drop the categorical block-list, then every column that is not integer or float.
/// Surviving columns are cast to `Float64`.
fn drop_non_numeric(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;
    for name in CATEGORICAL_COLUMNS.iter() {
        if df.column(name).is_ok() {
            debug!(column = *name, "dropping categorical column");
            df.drop_in_place(name)?;
        }
    }

    let non_numeric: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| !is_numeric(c.dtype()))
        .map(|c| c.name().to_string())
        .collect();
    for name in &non_numeric {
        warn!(column = %name, "dropping non-numeric column");
        df.drop_in_place(name)?;
    }

    let casts: Vec<Column> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype() != &DataType::Float64)
        .map(|c| c.cast(&DataType::Float64))
        .collect::<PolarsResult<Vec<_>>>()?;
    for column in casts {
        df.with_column(column)?;
    }
    Ok(df)
}

fn validate_required(df: &DataFrame, require_target: bool) -> Result<()> {
    let mut required: Vec<&str> = FEATURES.to_vec();
    if require_target {
        required.push(TARGET);
    }
    let missing: Vec<String> = required
        .into_iter()
        .filter(|name| df.column(name).is_err())
        .map(String::from)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(WqiError::MissingColumns {
            missing,
            available: df.get_column_names().iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Median of the finite values, averaging the two middle values for even counts
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Fill nulls and NaNs in `name` with the column median. Returns the fill
/// value when anything was imputed.
fn impute_median(df: &mut DataFrame, name: &str) -> Result<Option<f64>> {
    let series = df.column(name)?.as_materialized_series().clone();
    let ca = series.f64()?;
    let n_missing = ca.into_iter().filter(|v| v.map_or(true, f64::is_nan)).count();
    if n_missing == 0 {
        return Ok(None);
    }

    let mut present: Vec<f64> = ca.into_iter().flatten().filter(|v| !v.is_nan()).collect();
    let Some(fill) = median(&mut present) else {
        warn!(column = name, "column has no observed values, leaving it unimputed");
        return Ok(None);
    };

    let filled: Float64Chunked = ca
        .into_iter()
        .map(|v| match v {
            Some(x) if !x.is_nan() => Some(x),
            _ => Some(fill),
        })
        .collect();
    df.with_column(filled.with_name(name.into()).into_series())?;
    debug!(column = name, missing = n_missing, fill, "imputed missing values with median");
    Ok(Some(fill))
}

/// Normalize, clean, validate, impute and extend a raw table.
///
/// With `require_target` the target column must be present and is imputed
/// alongside the features. Fails with [`WqiError::MissingColumns`] naming every
/// absent required column.
pub fn engineer(df: &DataFrame, require_target: bool) -> Result<DataFrame> {
    let renamed = normalize_columns(df)?;
    let mut out = drop_non_numeric(renamed)?;
    validate_required(&out, require_target)?;

    for name in FEATURES.iter() {
        impute_median(&mut out, name)?;
    }
    if require_target {
        impute_median(&mut out, TARGET)?;
    }

    let derived = append_derived_features(&mut out)?;
    info!(
        rows = out.height(),
        columns = out.width(),
        derived = derived.len(),
        "feature engineering complete"
    );
    Ok(out)
}

/// Model inputs for training: every column except the target and label columns.
pub fn training_feature_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric(c.dtype()))
        .map(|c| c.name().to_string())
        .filter(|name| name != TARGET && !LABEL_COLUMNS.contains(&name.as_str()))
        .collect()
}

/// Model inputs for prediction: canonical features plus any derived column.
pub fn prediction_feature_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|name| {
            FEATURES.contains(&name.as_str()) || DERIVED_MARKERS.iter().any(|m| name.contains(m))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame() -> DataFrame {
        df!(
            "State Name" => &["A", "B", "C", "D"],
            "Temperature ⁰C" => &[Some(20.0), None, Some(24.0), Some(22.0)],
            "pH" => &[7.0, 7.2, 6.9, 7.4],
            "Conductivity (μmhos/cm)" => &[300.0, 320.0, 310.0, 305.0],
            "Nitrate N (mg/L)" => &[1.0, 2.0, 1.5, 1.2],
            "Faecal Coliform (MPN/100ml)" => &[5i64, 8, 2, 0],
            "Total Coliform (MPN/100ml)" => &[10i64, 20, 15, 11],
            "Total Dissolved Solids (mg/L)" => &[150.0, 160.0, 155.0, 152.0],
            "Fluoride (mg/L)" => &[0.4, 0.5, 0.45, 0.3],
            "WQI" => &[Some(40.0), Some(55.0), None, Some(30.0)]
        )
        .unwrap()
    }

    #[test]
    fn test_rename_drop_impute() {
        let out = engineer(&raw_frame(), true).unwrap();
        assert!(out.column("State Name").is_err());
        for name in FEATURES.iter() {
            let col = out.column(name).unwrap();
            assert_eq!(col.dtype(), &DataType::Float64);
            assert_eq!(col.null_count(), 0, "{}", name);
        }
        let temp = out.column("Temp").unwrap().as_materialized_series().f64().unwrap().get(1);
        assert_eq!(temp, Some(22.0));
        let wqi = out.column(TARGET).unwrap().as_materialized_series().f64().unwrap().get(2);
        assert_eq!(wqi, Some(40.0));
    }

    #[test]
    fn test_missing_columns_enumerates_all() {
        let df = raw_frame().drop("Fluoride (mg/L)").unwrap().drop("pH").unwrap();
        match engineer(&df, true) {
            Err(WqiError::MissingColumns { missing, .. }) => {
                assert_eq!(missing, vec!["pH".to_string(), "Fluoride".to_string()]);
            }
            other => panic!("expected MissingColumns, got {:?}", other.map(|d| d.shape())),
        }
    }

    #[test]
    fn test_target_optional_without_requirement() {
        let df = raw_frame().drop("WQI").unwrap();
        assert!(engineer(&df, false).is_ok());
        assert!(matches!(engineer(&df, true), Err(WqiError::MissingColumns { .. })));
    }

    #[test]
    fn test_text_canonical_column_is_dropped() {
        let mut df = raw_frame();
        df.with_column(Series::new("pH".into(), &["7", "x", "7", "7"])).unwrap();
        match engineer(&df, true) {
            Err(WqiError::MissingColumns { missing, .. }) => assert_eq!(missing, vec!["pH".to_string()]),
            _ => panic!("text pH column should be dropped"),
        }
    }

    #[test]
    fn test_alias_collision_keeps_first() {
        let df = df!("Temperature ⁰C" => &[1.0], "Temperature" => &[2.0]).unwrap();
        let out = normalize_columns(&df).unwrap();
        assert_eq!(out.width(), 1);
        let temp = out.column("Temp").unwrap().as_materialized_series().f64().unwrap().get(0);
        assert_eq!(temp, Some(1.0));
    }

    #[test]
    fn test_feature_column_selection() {
        let mut out = engineer(&raw_frame(), true).unwrap();
        out.with_column(Series::new("Year".into(), &[2020.0, 2021.0, 2022.0, 2023.0])).unwrap();

        let train = training_feature_columns(&out);
        assert!(train.contains(&"Year".to_string()));
        assert!(!train.contains(&TARGET.to_string()));

        let predict = prediction_feature_columns(&out);
        assert!(!predict.contains(&"Year".to_string()));
        assert_eq!(predict.len(), 16);
    }

    #[test]
    fn test_median_even_count() {
        let mut v = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut v), Some(2.5));
        assert_eq!(median(&mut []), None);
    }
}
