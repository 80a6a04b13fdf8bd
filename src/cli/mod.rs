//! WQI AutoML CLI Module
//!
//! Command-line interface for training, prediction and dataset inspection.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{PipelineConfig, Profile};
use crate::export::{ArtifactStore, LocalArtifactStore};
use crate::feature_engineering::analyze;
use crate::inference::{Predictor, DEFAULT_SAMPLE_SIZE};
use crate::tracking::{dashboard_summary, JsonRunStore, RunStore, TrainingRun};
use crate::training::{RunPhase, Trainer};
use crate::utils::{is_csv_path, load_csv, timestamp_now};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "wqi")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Water Quality Index model training and prediction")]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration profile (development, production, testing)
    #[arg(long, global = true, env = "WQI_PROFILE")]
    pub profile: Option<String>,

    /// Directory holding published model artifacts
    #[arg(long, global = true)]
    pub model_dir: Option<PathBuf>,

    /// Directory for summaries, predictions and history
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train and compare every registered model on a labeled CSV
    Train {
        /// Training data (CSV with a WQI column)
        #[arg(short, long)]
        data: PathBuf,

        /// Random-search samples per model
        #[arg(long)]
        tuning_iterations: Option<usize>,

        /// Number of cross-validation folds
        #[arg(long)]
        cv_folds: Option<usize>,
    },

    /// Predict WQI values with a trained model
    Predict {
        /// Input data (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Model name (Ridge, SVR, RandomForest, GradientBoosting, XGBoost)
        #[arg(short, long)]
        model: Option<String>,

        /// Number of rows to print
        #[arg(long, default_value = "10")]
        sample: usize,
    },

    /// Show columns, statistics and readiness of a dataset
    Analyze {
        #[arg(short, long)]
        data: PathBuf,
    },

    /// List published model artifacts
    Models,

    /// Show past training runs
    History,

    /// Show the dashboard summary
    Summary {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

// ─── Configuration & data loading ──────────────────────────────────────────────

pub fn build_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(profile) = &cli.profile {
        let profile: Profile = profile.parse()?;
        config = PipelineConfig {
            profile,
            tuning_iterations: PipelineConfig::for_profile(profile).tuning_iterations,
            ..config
        };
    }
    if let Some(dir) = &cli.model_dir {
        config = config.with_model_dir(dir.clone());
    }
    if let Some(dir) = &cli.results_dir {
        config = config.with_results_dir(dir.clone());
    }
    Ok(config)
}

/// Reject anything that is not a CSV within the size limit.
pub fn check_upload(path: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    if !is_csv_path(path) {
        anyhow::bail!("Invalid file type. Only CSV files allowed: {}", path.display());
    }
    let size = std::fs::metadata(path)?.len();
    if size > config.max_content_length {
        anyhow::bail!(
            "File is {} bytes, above the {} byte limit",
            size,
            config.max_content_length
        );
    }
    Ok(())
}

/// Validate and load a CSV upload, keeping a stamped copy in the upload folder.
pub fn load_upload(path: &Path, config: &PipelineConfig, kind: &str) -> anyhow::Result<DataFrame> {
    check_upload(path, config)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.csv".to_string());
    std::fs::create_dir_all(&config.upload_dir)?;
    let stored = config
        .upload_dir
        .join(format!("{}_{}_{}", kind, timestamp_now(), file_name));
    std::fs::copy(path, &stored)?;

    Ok(load_csv(&stored)?)
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;
    match cli.command {
        Commands::Train { data, tuning_iterations, cv_folds } => {
            let mut config = config;
            if let Some(n) = tuning_iterations {
                config = config.with_tuning_iterations(n);
            }
            if let Some(k) = cv_folds {
                config = config.with_cv_folds(k);
            }
            cmd_train(&data, config)
        }
        Commands::Predict { data, model, sample } => {
            let model = model.unwrap_or_else(|| config.default_model.clone());
            cmd_predict(&data, &model, sample, config)
        }
        Commands::Analyze { data } => cmd_analyze(&data, &config),
        Commands::Models => cmd_models(&config),
        Commands::History => cmd_history(&config),
        Commands::Summary { json } => cmd_summary(&config, json),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(data_path: &Path, config: PipelineConfig) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let df = load_upload(data_path, &config, "train")?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let dataset_file = data_path.file_name().map(|n| n.to_string_lossy().into_owned());
    let trainer = Trainer::new(config)?;
    let handle = trainer.spawn(df, dataset_file)?;

    let start = Instant::now();
    let mut reported = 0;
    let mut current: Option<String> = None;
    loop {
        let status = handle.status();
        while reported < status.models_trained.len() {
            step_ok(&status.models_trained[reported]);
            reported += 1;
        }
        if status.phase == RunPhase::Tuning && status.current_model != current {
            if let Some(model) = &status.current_model {
                println!("  {} tuning {} {}", accent("›"), model, dim(&format!("{}%", status.progress)));
            }
            current = status.current_model.clone();
        }
        if handle.is_finished() {
            break;
        }
        thread::sleep(Duration::from_millis(200));
    }
    for name in handle.status().models_trained.iter().skip(reported) {
        step_ok(name);
    }
    let run = handle.wait()?;
    step_ok(&format!("finished in {:.1?}", start.elapsed()));

    print_run(&run);
    Ok(())
}

fn print_run(run: &TrainingRun) {
    section(&format!("Run {}", run.timestamp));
    kv("Features", &run.features_used.len().to_string());
    kv("Train / test", &format!("{} / {}", run.train_size, run.test_size));
    println!();
    println!(
        "  {:<18} {:>9} {:>9} {:>9} {:>9}",
        muted("Model"),
        muted("CV RMSE"),
        muted("Test R²"),
        muted("RMSE"),
        muted("MAPE %")
    );
    for r in &run.models_trained {
        let name = if r.model_name == run.best_model {
            r.model_name.green().bold()
        } else {
            r.model_name.white()
        };
        println!(
            "  {:<18} {:>9.3} {:>9.3} {:>9.3} {:>9.2}",
            name, r.cv_rmse, r.test_r2, r.test_rmse, r.test_mape
        );
    }
    println!();
    kv("Best model", &run.best_model);
    println!();
}

pub fn cmd_predict(data_path: &Path, model: &str, sample: usize, config: PipelineConfig) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading data");
    let df = load_upload(data_path, &config, "predict")?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run(&format!("Predicting with {}", model.cyan()));
    let predictor = Predictor::new(config)?;
    let outcome = predictor.predict(&df, model)?;
    step_done(&outcome.meta.output_file);

    let stats = &outcome.meta.statistics;
    println!();
    kv("Predictions", &outcome.meta.total_predictions.to_string());
    kv("Mean WQI", &format!("{:.2}", stats.mean_wqi));
    kv("Median WQI", &format!("{:.2}", stats.median_wqi));
    kv("Range", &format!("{:.2} – {:.2}", stats.min_wqi, stats.max_wqi));
    kv("Std", &format!("{:.2}", stats.std_wqi));

    section("Classes");
    for (label, count) in &outcome.meta.class_distribution {
        kv(label, &count.to_string());
    }

    if sample > 0 {
        section("Sample");
        println!("{}", outcome.sample(sample.min(DEFAULT_SAMPLE_SIZE))?);
    }
    kv("Output", &outcome.output_path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_analyze(data_path: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    section("Analyze");
    check_upload(data_path, config)?;
    let df = load_csv(data_path)?;
    let analysis = analyze(&df)?;

    kv("Shape", &format!("{} × {}", analysis.shape.0, analysis.shape.1));
    println!();
    for col in &analysis.columns {
        let stats = col
            .stats
            .as_ref()
            .map(|s| format!("mean {:.3}  std {:.3}  [{:.3}, {:.3}]", s.mean, s.std, s.min, s.max))
            .unwrap_or_default();
        println!(
            "  {:<24} {:<8} {:>6} {}",
            col.name.white(),
            muted(&col.dtype),
            if col.missing > 0 { col.missing.to_string().yellow() } else { dim("0") },
            dim(&stats)
        );
    }

    let v = &analysis.validation;
    section("Validation");
    kv("All features", &v.has_all_features.to_string());
    kv("Target", &v.has_target.to_string());
    if !v.missing_features.is_empty() {
        kv("Missing", &v.missing_features.join(", "));
    }
    kv("Ready to train", &v.ready_for_training.to_string());
    kv("Ready to predict", &v.ready_for_prediction.to_string());
    println!();
    Ok(())
}

pub fn cmd_models(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Models");
    let store = LocalArtifactStore::open(&config.model_dir)?;
    let models = store.list()?;
    if models.is_empty() {
        println!("  {}", dim("no published models"));
    }
    for m in &models {
        println!("  {:<18} {}  {}", m.name.white(), muted(&m.timestamp), dim(&m.filename));
    }
    println!();
    kv("Total", &models.len().to_string());
    println!();
    Ok(())
}

pub fn cmd_history(config: &PipelineConfig) -> anyhow::Result<()> {
    section("History");
    let store = JsonRunStore::open(&config.results_dir, config.history_limit)?;
    let history = store.history()?;
    for run in history.iter().rev() {
        let best = run.result(&run.best_model).map(|r| r.test_rmse).unwrap_or(f64::NAN);
        println!(
            "  {}  {:<18} {}",
            muted(&run.timestamp),
            run.best_model.white(),
            dim(&format!("rmse {:.3}  rows {}", best, run.dataset_shape.0))
        );
    }
    println!();
    kv("Sessions", &history.len().to_string());
    println!();
    Ok(())
}

pub fn cmd_summary(config: &PipelineConfig, json: bool) -> anyhow::Result<()> {
    let runs = JsonRunStore::open(&config.results_dir, config.history_limit)?;
    let artifacts = LocalArtifactStore::open(&config.model_dir)?;
    let summary = dashboard_summary(&runs, &artifacts)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    section("Summary");
    kv("Models", &summary.total_models.to_string());
    kv("Training sessions", &summary.total_training_sessions.to_string());
    match &summary.latest_training {
        Some(run) => kv("Latest training", &format!("{} (best {})", run.timestamp, run.best_model)),
        None => kv("Latest training", "none"),
    }
    match &summary.latest_prediction {
        Some(p) => kv(
            "Latest prediction",
            &format!("{} ({} rows, {})", p.timestamp, p.total_predictions, p.model_used),
        ),
        None => kv("Latest prediction", "none"),
    }
    println!();
    Ok(())
}
