use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use wqi_automl::feature_engineering::{engineer, FEATURES};
use wqi_automl::training::{
    KFold, ModelKind, RandomForestRegressor, RandomizedSearch, XGBoostConfig, XGBoostRegressor,
};

fn create_water_data(n_rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let values: Vec<Vec<f64>> = FEATURES
        .iter()
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 100.0).collect())
        .collect();

    // WQI as a noisy mean of the measurements
    let target: Vec<f64> = (0..n_rows)
        .map(|i| values.iter().map(|v| v[i]).sum::<f64>() / 8.0 + rng.gen::<f64>())
        .collect();

    let mut columns: Vec<Column> = FEATURES
        .iter()
        .zip(values)
        .map(|(name, v)| Column::new((*name).into(), v))
        .collect();
    columns.push(Column::new("WQI".into(), target));

    DataFrame::new(columns).unwrap()
}

fn create_matrix(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y = x.rows().into_iter().map(|r| r.sum() + rng.gen::<f64>() * 0.1).collect();
    (x, y)
}

fn bench_feature_engineering(c: &mut Criterion) {
    let mut group = c.benchmark_group("engineer");

    for n_rows in [1000, 10000].iter() {
        let df = create_water_data(*n_rows);
        group.bench_with_input(BenchmarkId::new("training", n_rows), &df, |b, df| {
            b.iter(|| engineer(black_box(df), true).unwrap())
        });
    }

    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [500, 2000].iter() {
        let (x, y) = create_matrix(*n_rows, 16);

        group.bench_with_input(BenchmarkId::new("random_forest", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = RandomForestRegressor::new(50).with_max_depth(Some(8)).with_random_state(42);
                model.fit(black_box(x), black_box(y)).unwrap();
            })
        });

        group.bench_with_input(BenchmarkId::new("xgboost", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = XGBoostRegressor::new(XGBoostConfig {
                    n_estimators: 100,
                    random_state: Some(42),
                    ..XGBoostConfig::default()
                });
                model.fit(black_box(x), black_box(y)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    let (x, y) = create_matrix(1000, 16);
    let space = ModelKind::Ridge.default_search_space();
    group.bench_function("ridge_20x5", |b| {
        b.iter(|| {
            let search = RandomizedSearch::new(20, KFold::new(5).with_shuffle(true).with_random_state(42), 42);
            search
                .run(&space, black_box(&x), black_box(&y), |params| ModelKind::Ridge.build(params, 42))
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_feature_engineering, bench_fit, bench_search);
criterion_main!(benches);
