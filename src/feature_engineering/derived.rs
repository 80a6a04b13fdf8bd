//! Derived interaction, ratio, log and polynomial columns

use crate::error::Result;
use crate::utils::column_to_array1;
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Operation used to build a derived column from one or two inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivedOp {
    /// a * b
    Product,
    /// a / (b + 1)
    OffsetRatio,
    /// ln(1 + a)
    Log1p,
    /// a²
    Square,
}

impl DerivedOp {
    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            DerivedOp::Product => a * b,
            DerivedOp::OffsetRatio => a / (b + 1.0),
            DerivedOp::Log1p => a.ln_1p(),
            DerivedOp::Square => a * a,
        }
    }
}

/// A derived column and the canonical inputs it needs
#[derive(Debug, Clone, Copy)]
pub struct DerivedFeature {
    pub name: &'static str,
    pub op: DerivedOp,
    pub left: &'static str,
    /// Second operand; unary ops leave this `None`
    pub right: Option<&'static str>,
}

impl DerivedFeature {
    const fn binary(name: &'static str, op: DerivedOp, left: &'static str, right: &'static str) -> Self {
        Self { name, op, left, right: Some(right) }
    }

    const fn unary(name: &'static str, op: DerivedOp, input: &'static str) -> Self {
        Self { name, op, left: input, right: None }
    }

    /// Input column names this feature depends on
    pub fn inputs(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.left).chain(self.right)
    }

    fn is_available(&self, df: &DataFrame) -> bool {
        self.inputs().all(|name| df.column(name).is_ok())
    }

    fn compute(&self, df: &DataFrame) -> Result<Series> {
        let a = column_to_array1(df, self.left)?;
        let values: Array1<f64> = match self.right {
            Some(right) => {
                let b = column_to_array1(df, right)?;
                ndarray::Zip::from(&a).and(&b).map_collect(|&x, &y| self.op.apply(x, y))
            }
            None => a.mapv(|x| self.op.apply(x, 0.0)),
        };
        Ok(Series::new(self.name.into(), values.to_vec()))
    }
}

/// Derived columns in the order they are appended
pub const DERIVED_FEATURES: [DerivedFeature; 8] = [
    DerivedFeature::binary("pH_Temp_interaction", DerivedOp::Product, "pH", "Temp"),
    DerivedFeature::binary("TDS_Conductivity_ratio", DerivedOp::OffsetRatio, "TDS", "Conductivity"),
    DerivedFeature::binary("Coliform_ratio", DerivedOp::OffsetRatio, "Fecal_Coliform", "Total_Coliform"),
    DerivedFeature::unary("Fecal_Coliform_log", DerivedOp::Log1p, "Fecal_Coliform"),
    DerivedFeature::unary("Total_Coliform_log", DerivedOp::Log1p, "Total_Coliform"),
    DerivedFeature::unary("TDS_log", DerivedOp::Log1p, "TDS"),
    DerivedFeature::unary("pH_squared", DerivedOp::Square, "pH"),
    DerivedFeature::unary("Temp_squared", DerivedOp::Square, "Temp"),
];

/// Substrings that mark a column as derived when resolving prediction features
pub const DERIVED_MARKERS: [&str; 4] = ["interaction", "ratio", "log", "squared"];

/// Append every derived column whose inputs are present; returns the names added.
pub fn append_derived_features(df: &mut DataFrame) -> Result<Vec<String>> {
    let mut added = Vec::new();
    for feature in DERIVED_FEATURES.iter() {
        if !feature.is_available(df) {
            tracing::debug!(feature = feature.name, "skipping derived feature, inputs absent");
            continue;
        }
        let series = feature.compute(df)?;
        df.with_column(series)?;
        added.push(feature.name.to_string());
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_row() -> DataFrame {
        df!(
            "Temp" => &[20.0],
            "pH" => &[7.0],
            "Conductivity" => &[499.0],
            "Nitrate" => &[1.0],
            "Fecal_Coliform" => &[0.0],
            "Total_Coliform" => &[9.0],
            "TDS" => &[250.0],
            "Fluoride" => &[0.5]
        )
        .unwrap()
    }

    fn value(df: &DataFrame, name: &str) -> f64 {
        df.column(name).unwrap().as_materialized_series().f64().unwrap().get(0).unwrap()
    }

    #[test]
    fn test_all_derived_values() {
        let mut df = canonical_row();
        let added = append_derived_features(&mut df).unwrap();
        assert_eq!(added.len(), 8);

        assert!((value(&df, "pH_Temp_interaction") - 140.0).abs() < 1e-12);
        assert!((value(&df, "TDS_Conductivity_ratio") - 0.5).abs() < 1e-12);
        assert_eq!(value(&df, "Coliform_ratio"), 0.0);
        assert_eq!(value(&df, "Fecal_Coliform_log"), 0.0);
        assert!((value(&df, "Total_Coliform_log") - 10f64.ln()).abs() < 1e-12);
        assert!((value(&df, "pH_squared") - 49.0).abs() < 1e-12);
        assert!((value(&df, "Temp_squared") - 400.0).abs() < 1e-12);
    }

    #[test]
    fn test_removing_input_removes_only_dependents() {
        let mut full = canonical_row();
        let all = append_derived_features(&mut full).unwrap();

        let mut partial = canonical_row().drop("TDS").unwrap();
        let some = append_derived_features(&mut partial).unwrap();

        let removed: Vec<&String> = all.iter().filter(|n| !some.contains(n)).collect();
        assert_eq!(removed, vec!["TDS_Conductivity_ratio", "TDS_log"]);
    }

    #[test]
    fn test_every_derived_name_carries_a_marker() {
        for feature in DERIVED_FEATURES.iter() {
            assert!(DERIVED_MARKERS.iter().any(|m| feature.name.contains(m)), "{}", feature.name);
        }
    }
}
