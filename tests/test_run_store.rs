//! Integration test: run history, prediction metadata and the dashboard summary

use std::collections::BTreeMap;

use wqi_automl::export::LocalArtifactStore;
use wqi_automl::tracking::{
    dashboard_summary, JsonRunStore, PredictionMeta, PredictionStats, ResultRecord, RunStore, TrainingRun,
};

fn record(name: &str, rmse: f64) -> ResultRecord {
    ResultRecord {
        model_name: name.to_string(),
        cv_rmse: rmse + 0.25,
        test_r2: 0.9,
        test_mae: rmse / 2.0,
        test_rmse: rmse,
        test_mape: 4.5,
        best_params: BTreeMap::from([("model__alpha".to_string(), "0.5".to_string())]),
        model_file: format!("{}_model_20240101_120000.json", name),
        feature_importance: None,
    }
}

fn training_run(ts: &str) -> TrainingRun {
    TrainingRun {
        timestamp: ts.to_string(),
        dataset_file: Some("water.csv".to_string()),
        dataset_shape: (200, 17),
        features_used: vec!["pH".to_string(), "TDS".to_string()],
        train_size: 160,
        test_size: 40,
        models_trained: vec![record("SVR", 2.5), record("Ridge", 3.0)],
        best_model: "SVR".to_string(),
    }
}

fn prediction_meta() -> PredictionMeta {
    PredictionMeta {
        timestamp: "20240101_130000".to_string(),
        model_used: "SVR".to_string(),
        total_predictions: 3,
        statistics: PredictionStats {
            mean_wqi: 40.0,
            median_wqi: 40.0,
            min_wqi: 20.0,
            max_wqi: 60.0,
            std_wqi: 16.5,
        },
        class_distribution: BTreeMap::from([
            ("Excellent".to_string(), 1),
            ("Good".to_string(), 1),
            ("Poor".to_string(), 1),
        ]),
        output_file: "predictions_SVR_20240101_130000.csv".to_string(),
    }
}

#[test]
fn test_dashboard_summary_empty() {
    let dir = tempfile::tempdir().unwrap();
    let runs = JsonRunStore::open(dir.path().join("results"), 50).unwrap();
    let artifacts = LocalArtifactStore::open(dir.path().join("models")).unwrap();

    let summary = dashboard_summary(&runs, &artifacts).unwrap();
    assert!(!summary.has_training_data);
    assert!(!summary.has_prediction_data);
    assert_eq!(summary.total_models, 0);
    assert_eq!(summary.total_training_sessions, 0);
}

#[test]
fn test_dashboard_summary_after_runs() {
    let dir = tempfile::tempdir().unwrap();
    let runs = JsonRunStore::open(dir.path().join("results"), 50).unwrap();
    let artifacts = LocalArtifactStore::open(dir.path().join("models")).unwrap();

    runs.save_run(&training_run("20240101_120000")).unwrap();
    runs.save_run(&training_run("20240102_120000")).unwrap();
    runs.save_prediction_meta(&prediction_meta()).unwrap();

    let summary = dashboard_summary(&runs, &artifacts).unwrap();
    assert!(summary.has_training_data);
    assert!(summary.has_prediction_data);
    assert_eq!(summary.total_training_sessions, 2);
    let latest = summary.latest_training.unwrap();
    assert_eq!(latest.timestamp, "20240102_120000");
    assert_eq!(latest.best_model, "SVR");
    assert_eq!(summary.latest_prediction.unwrap().output_file, "predictions_SVR_20240101_130000.csv");
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let runs = JsonRunStore::open(dir.path(), 2).unwrap();
        for ts in ["a", "b", "c"] {
            runs.save_run(&training_run(ts)).unwrap();
        }
    }

    let runs = JsonRunStore::open(dir.path(), 2).unwrap();
    let history = runs.history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].timestamp, "b");
    assert_eq!(history[1].models_trained[0].model_name, "SVR");
    assert_eq!(history[1].result("Ridge").unwrap().best_params["model__alpha"], "0.5");
}

#[test]
fn test_record_json_field_names() {
    let json = serde_json::to_value(training_run("t")).unwrap();
    assert_eq!(json["dataset_shape"], serde_json::json!([200, 17]));
    assert_eq!(json["models_trained"][0]["model_name"], "SVR");
    assert!(json["models_trained"][0]["feature_importance"].is_null());
    assert_eq!(json["best_model"], "SVR");
}
