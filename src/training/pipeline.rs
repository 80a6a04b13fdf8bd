//! Optional standardization followed by a regressor

use super::gradient_boosting::GradientBoostingRegressor;
use super::linear_models::RidgeRegression;
use super::random_forest::RandomForestRegressor;
use super::svm::SvrRegressor;
use super::xgboost::XGBoostRegressor;
use crate::error::{Result, WqiError};
use crate::preprocessing::StandardScaler;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// A fitted or unfitted regressor of one of the registered families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    Ridge(RidgeRegression),
    Svr(SvrRegressor),
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
    XGBoost(XGBoostRegressor),
}

impl Estimator {
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::Ridge(m) => m.fit(x, y).map(|_| ()),
            Estimator::Svr(m) => m.fit(x, y),
            Estimator::RandomForest(m) => m.fit(x, y).map(|_| ()),
            Estimator::GradientBoosting(m) => m.fit(x, y),
            Estimator::XGBoost(m) => m.fit(x, y),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::Ridge(m) => m.predict(x),
            Estimator::Svr(m) => m.predict(x),
            Estimator::RandomForest(m) => m.predict(x),
            Estimator::GradientBoosting(m) => m.predict(x),
            Estimator::XGBoost(m) => m.predict(x),
        }
    }

    /// Tree ensembles only; linear and kernel models report nothing.
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        match self {
            Estimator::Ridge(_) | Estimator::Svr(_) => None,
            Estimator::RandomForest(m) => m.feature_importances(),
            Estimator::GradientBoosting(m) => m.feature_importances(),
            Estimator::XGBoost(m) => m.feature_importances(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    scaler: Option<StandardScaler>,
    estimator: Estimator,
    n_features: Option<usize>,
    /// Column order the pipeline was fit on
    #[serde(default)]
    feature_names: Vec<String>,
}

impl Pipeline {
    pub fn new(estimator: Estimator, standardize: bool) -> Self {
        Self {
            scaler: standardize.then(StandardScaler::new),
            estimator,
            n_features: None,
            feature_names: Vec::new(),
        }
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn is_standardized(&self) -> bool {
        self.scaler.is_some()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self.scaler.as_mut() {
            Some(scaler) => {
                let scaled = scaler.fit_transform(x)?;
                self.estimator.fit(&scaled, y)?;
            }
            None => self.estimator.fit(x, y)?,
        }
        self.n_features = Some(x.ncols());
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let expected = self.n_features.ok_or(WqiError::ModelNotFitted)?;
        if x.ncols() != expected {
            return Err(WqiError::ShapeError {
                expected: format!("{} features", expected),
                actual: format!("{} features", x.ncols()),
            });
        }
        match &self.scaler {
            Some(scaler) => self.estimator.predict(&scaler.transform(x)?),
            None => self.estimator.predict(x),
        }
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.estimator.feature_importances()
    }
}
