//! CSV ingestion and polars/ndarray conversion helpers

use crate::error::{Result, WqiError};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Rows used to infer column types when reading CSV files
const INFER_SCHEMA_ROWS: usize = 1000;

/// Whether `path` carries a `.csv` extension (case-insensitive)
pub fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Load a CSV file with a header row
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    if !is_csv_path(path) {
        return Err(WqiError::DataError(format!(
            "Invalid file type for {}: only CSV files are accepted",
            path.display()
        )));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(df)
}

/// Write a frame as CSV with a header row
pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| WqiError::DataError(e.to_string()))
}

/// Copy one column into an `Array1<f64>`, mapping nulls to NaN.
pub fn column_to_array1(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let column = df
        .column(name)
        .map_err(|_| WqiError::DataError(format!("column '{}' not found", name)))?;
    let casted = column.cast(&DataType::Float64)?;
    let values: Vec<f64> = casted
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    Ok(Array1::from_vec(values))
}

/// Extract named columns into a row-major `Array2<f64>`, nulls as NaN.
pub fn columns_to_array2(df: &DataFrame, names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Array1<f64>> = names
        .iter()
        .map(|name| column_to_array1(df, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((n_rows, names.len()), |(r, c)| col_data[c][r]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "pH,Temp,Location").unwrap();
        writeln!(file, "7.1,25.0,North").unwrap();
        writeln!(file, "6.8,,South").unwrap();
        file.flush().unwrap();

        let df = load_csv(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("Temp").unwrap().null_count(), 1);
    }

    #[test]
    fn test_rejects_non_csv_extension() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        assert!(load_csv(file.path()).is_err());
    }

    #[test]
    fn test_columns_to_array2_maps_nulls_to_nan() {
        let df = df!(
            "a" => &[Some(1.0), None, Some(3.0)],
            "b" => &[4i64, 5, 6]
        )
        .unwrap();
        let x = columns_to_array2(&df, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(x.dim(), (3, 2));
        assert!(x[[1, 0]].is_nan());
        assert_eq!(x[[2, 1]], 6.0);
    }

    #[test]
    fn test_save_csv_round_trip() {
        let mut df = df!("a" => &[1.5, 2.5], "b" => &["x", "y"]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        save_csv(&mut df, &path).unwrap();

        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded.shape(), (2, 2));
    }
}
