//! Hyperparameter spaces and cross-validated random search
//!
//! Every space is a finite grid (explicit lists or log-spaced ranges), so the
//! search draws distinct grid points without replacement. When the grid holds
//! fewer points than the iteration budget, every point is evaluated.

use super::cross_validation::{CVSplit, KFold};
use super::metrics::root_mean_squared_error;
use super::pipeline::Pipeline;
use crate::error::{Result, WqiError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(usize),
    Float(f64),
    Text(String),
    /// Unbounded (for example `max_depth = None`)
    Unset,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) if v.fract() == 0.0 && v.abs() < 1e16 => write!(f, "{:.1}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Unset => f.write_str("None"),
        }
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Candidate values for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamDomain {
    Choice(Vec<ParamValue>),
    /// `num` points evenly spaced in log10 between 10^start and 10^stop, inclusive
    LogSpace { start: f64, stop: f64, num: usize },
}

impl ParamDomain {
    pub fn choice<T: Into<ParamValue>>(values: impl IntoIterator<Item = T>) -> Self {
        ParamDomain::Choice(values.into_iter().map(Into::into).collect())
    }

    pub fn values(&self) -> Vec<ParamValue> {
        match self {
            ParamDomain::Choice(values) => values.clone(),
            ParamDomain::LogSpace { start, stop, num } => logspace(*start, *stop, *num)
                .into_iter()
                .map(ParamValue::Float)
                .collect(),
        }
    }
}

/// Same spacing rule as `numpy.logspace(start, stop, num)`
pub fn logspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![10f64.powf(start)],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num).map(|i| 10f64.powf(start + step * i as f64)).collect()
        }
    }
}

/// Ordered mapping of parameter name to domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    params: Vec<(String, ParamDomain)>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, domain: ParamDomain) -> Self {
        self.params.retain(|(n, _)| n != name);
        self.params.push((name.to_string(), domain));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(n, _)| n.as_str())
    }

    fn expanded(&self) -> Vec<(String, Vec<ParamValue>)> {
        self.params.iter().map(|(n, d)| (n.clone(), d.values())).collect()
    }

    /// Number of grid points; an empty space has exactly one (all defaults)
    pub fn grid_size(&self) -> usize {
        self.expanded().iter().map(|(_, v)| v.len()).product()
    }

    /// Decode a mixed-radix grid index; the last parameter varies fastest.
    pub fn point(&self, mut index: usize) -> ParamSet {
        let expanded = self.expanded();
        let mut values = vec![ParamValue::Unset; expanded.len()];
        for (slot, (_, domain)) in values.iter_mut().zip(expanded.iter()).rev() {
            let radix = domain.len();
            *slot = domain[index % radix].clone();
            index /= radix;
        }
        ParamSet {
            values: expanded.into_iter().map(|(n, _)| n).zip(values).collect(),
        }
    }

    /// Draw `min(n_iter, grid_size)` distinct grid points in sampling order.
    pub fn sample(&self, n_iter: usize, seed: u64) -> Vec<ParamSet> {
        let size = self.grid_size();
        if size == 0 {
            return Vec::new();
        }
        if n_iter >= size {
            return (0..size).map(|i| self.point(i)).collect();
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        sample(&mut rng, size, n_iter).into_iter().map(|i| self.point(i)).collect()
    }
}

/// Concrete parameter assignment for one candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn invalid(name: &str, value: &ParamValue, reason: &str) -> WqiError {
        WqiError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(Self::invalid(name, other, "expected a number")),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) => Ok(*v),
            Some(ParamValue::Float(v)) if v.fract() == 0.0 && *v >= 0.0 => Ok(*v as usize),
            Some(other) => Err(Self::invalid(name, other, "expected a non-negative integer")),
        }
    }

    /// Integer parameter where `Unset` means unbounded
    pub fn opt_usize_or(&self, name: &str, default: Option<usize>) -> Result<Option<usize>> {
        match self.get(name) {
            Some(ParamValue::Unset) => Ok(None),
            Some(_) => self.usize_or(name, 0).map(Some),
            None => Ok(default),
        }
    }

    /// Display strings keyed the way result records expose them (`model__<name>`)
    pub fn display_map(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (format!("model__{}", k), v.to_string()))
            .collect()
    }
}

/// Mean cross-validated RMSE of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub mean_rmse: f64,
    pub fold_rmse: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best_params: ParamSet,
    pub best_cv_rmse: f64,
    pub candidates: Vec<CandidateScore>,
}

/// Random search scored by RMSE under K-fold cross-validation
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    pub n_iter: usize,
    pub cv: KFold,
    pub random_state: u64,
}

impl RandomizedSearch {
    pub fn new(n_iter: usize, cv: KFold, random_state: u64) -> Self {
        Self { n_iter, cv, random_state }
    }

    /// Evaluate sampled candidates (all folds in parallel) and keep the first
    /// candidate with the lowest mean RMSE.
    pub fn run<F>(&self, space: &SearchSpace, x: &Array2<f64>, y: &Array1<f64>, build: F) -> Result<SearchOutcome>
    where
        F: Fn(&ParamSet) -> Result<Pipeline> + Sync,
    {
        let candidates = space.sample(self.n_iter.max(1), self.random_state);
        if candidates.is_empty() {
            return Err(WqiError::InvalidParameter {
                name: "search_space".to_string(),
                value: "empty domain".to_string(),
                reason: "every parameter needs at least one candidate value".to_string(),
            });
        }
        let folds = self.cv.split(x.nrows())?;

        let jobs: Vec<(usize, &CVSplit)> = (0..candidates.len())
            .flat_map(|c| folds.iter().map(move |f| (c, f)))
            .collect();
        let fold_scores: Vec<(usize, f64)> = jobs
            .par_iter()
            .map(|&(c, fold)| {
                let x_train = x.select(Axis(0), &fold.train_indices);
                let y_train = y.select(Axis(0), &fold.train_indices);
                let x_test = x.select(Axis(0), &fold.test_indices);
                let y_test = y.select(Axis(0), &fold.test_indices);

                let mut pipeline = build(&candidates[c])?;
                pipeline.fit(&x_train, &y_train)?;
                let preds = pipeline.predict(&x_test)?;
                Ok((c, root_mean_squared_error(&y_test, &preds)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut per_candidate: Vec<Vec<f64>> = vec![Vec::with_capacity(folds.len()); candidates.len()];
        for (c, score) in fold_scores {
            per_candidate[c].push(score);
        }

        let scored: Vec<CandidateScore> = candidates
            .into_iter()
            .zip(per_candidate)
            .map(|(params, fold_rmse)| {
                let mean = fold_rmse.iter().sum::<f64>() / fold_rmse.len() as f64;
                CandidateScore {
                    params,
                    mean_rmse: if mean.is_nan() { f64::INFINITY } else { mean },
                    fold_rmse,
                }
            })
            .collect();

        let best_idx = scored
            .iter()
            .enumerate()
            .fold(0, |best, (i, c)| if c.mean_rmse < scored[best].mean_rmse { i } else { best });
        let best = &scored[best_idx];
        debug!(evaluated = scored.len(), best_rmse = best.mean_rmse, "search finished");

        Ok(SearchOutcome {
            best_params: best.params.clone(),
            best_cv_rmse: best.mean_rmse,
            candidates: scored,
        })
    }
}
