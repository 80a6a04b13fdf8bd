//! Shared fixtures for the integration tests

#![allow(dead_code)]

use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;
use wqi_automl::config::{PipelineConfig, Profile};
use wqi_automl::training::{ModelKind, ModelRegistry, ParamDomain, SearchSpace};

/// Synthetic measurements with a WQI that depends mostly on coliform, TDS and pH.
pub fn water_quality_df(n: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut temp = Vec::with_capacity(n);
    let mut ph = Vec::with_capacity(n);
    let mut conductivity = Vec::with_capacity(n);
    let mut nitrate = Vec::with_capacity(n);
    let mut fecal = Vec::with_capacity(n);
    let mut total = Vec::with_capacity(n);
    let mut tds = Vec::with_capacity(n);
    let mut fluoride = Vec::with_capacity(n);
    let mut wqi = Vec::with_capacity(n);

    for _ in 0..n {
        let t: f64 = rng.gen_range(10.0..35.0);
        let p: f64 = rng.gen_range(6.0..9.0);
        let c: f64 = rng.gen_range(100.0..1500.0);
        let no3: f64 = rng.gen_range(0.0..10.0);
        let fc: f64 = rng.gen_range(0.0..500.0);
        let tc: f64 = fc + rng.gen_range(0.0..1000.0);
        let d: f64 = c * rng.gen_range(0.5..0.7);
        let f: f64 = rng.gen_range(0.1..1.5);
        let noise: f64 = rng.gen_range(-2.0..2.0);

        temp.push(t);
        ph.push(p);
        conductivity.push(c);
        nitrate.push(no3);
        fecal.push(fc);
        total.push(tc);
        tds.push(d);
        fluoride.push(f);
        wqi.push(10.0 + 8.0 * (p - 7.0).abs() + 0.02 * d + 6.0 * fc.ln_1p() + 2.0 * no3 + 5.0 * f + noise);
    }

    df!(
        "Temp" => &temp,
        "pH" => &ph,
        "Conductivity" => &conductivity,
        "Nitrate" => &nitrate,
        "Fecal_Coliform" => &fecal,
        "Total_Coliform" => &total,
        "TDS" => &tds,
        "Fluoride" => &fluoride,
        "WQI" => &wqi
    )
    .unwrap()
}

/// Testing-profile config rooted in a temporary directory
pub fn test_config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig::for_profile(Profile::Testing)
        .with_model_dir(dir.path().join("models"))
        .with_results_dir(dir.path().join("results"))
        .with_tuning_iterations(2)
        .with_cv_folds(3)
}

/// Every model kind with a small search space
pub fn small_registry() -> ModelRegistry {
    ModelRegistry::default()
        .with_search_space(
            ModelKind::Svr,
            SearchSpace::new().with("C", ParamDomain::choice([1.0, 10.0])),
        )
        .with_search_space(
            ModelKind::RandomForest,
            SearchSpace::new()
                .with("n_estimators", ParamDomain::choice([10usize, 20]))
                .with("max_depth", ParamDomain::choice([4usize, 6])),
        )
        .with_search_space(
            ModelKind::GradientBoosting,
            SearchSpace::new()
                .with("n_estimators", ParamDomain::choice([20usize, 40]))
                .with("max_depth", ParamDomain::choice([2usize, 3])),
        )
        .with_search_space(
            ModelKind::XGBoost,
            SearchSpace::new()
                .with("n_estimators", ParamDomain::choice([20usize, 40]))
                .with("max_depth", ParamDomain::choice([3usize])),
        )
}
