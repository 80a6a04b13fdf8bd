//! Feature engineering for raw water quality tables
//!
//! - Alias renaming to the eight canonical measurement names
//! - Removal of categorical and other non-numeric columns
//! - Median imputation of canonical features (and target for training)
//! - Derived interaction, ratio, log and squared columns
//! - Dataset analysis for upload validation

mod analysis;
mod derived;
mod engineer;

pub use analysis::{analyze, ColumnStats, ColumnSummary, DatasetAnalysis, DatasetValidation};
pub use derived::{append_derived_features, DerivedFeature, DerivedOp, DERIVED_FEATURES, DERIVED_MARKERS};
pub use engineer::{
    engineer, normalize_columns, prediction_feature_columns, training_feature_columns,
    CATEGORICAL_COLUMNS, COLUMN_ALIASES, FEATURES, LABEL_COLUMNS, TARGET,
};
pub(crate) use engineer::median;
