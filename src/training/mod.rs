//! Model training module
//!
//! Provides the regressors behind the model registry and the run machinery:
//! - Ridge regression and epsilon-SVR (standardized inputs)
//! - Random forest, gradient boosting and XGBoost-style boosting
//! - K-fold cross-validation and cross-validated random search
//! - Held-out regression metrics
//! - The trainer, which tunes, refits, evaluates and publishes every model
//! - The selector, which ranks results by held-out RMSE

pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod metrics;
mod pipeline;
pub mod random_forest;
mod registry;
mod search;
pub mod selector;
pub mod svm;
mod trainer;
pub mod xgboost;

pub use cross_validation::{train_test_split, CVSplit, KFold};
pub use decision_tree::{DecisionTreeRegressor, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use linear_models::RidgeRegression;
pub use metrics::RegressionMetrics;
pub use pipeline::{Estimator, Pipeline};
pub use random_forest::{MaxFeatures, RandomForestRegressor};
pub use registry::{ModelKind, ModelRegistry, RegistryEntry};
pub use search::{
    logspace, CandidateScore, ParamDomain, ParamSet, ParamValue, RandomizedSearch, SearchOutcome, SearchSpace,
};
pub use selector::{rank, select};
pub use svm::{Gamma, SvrConfig, SvrRegressor};
pub use trainer::{RunHandle, RunPhase, RunStatus, Trainer};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
