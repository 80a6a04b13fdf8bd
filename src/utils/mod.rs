//! Utility functions and types

pub mod data_loader;

pub use data_loader::{columns_to_array2, column_to_array1, is_csv_path, load_csv, save_csv};

use chrono::Local;

/// Run timestamp in the `YYYYmmdd_HHMMSS` form used in artifact and result file names
pub fn timestamp_now() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}
