//! Sales Forecaster - next-month sales forecasting
//!
//! Trains a Tweedie boosted-tree model on monthly aggregates, reports its
//! cross-validated accuracy, persists it, and serves forecasts from the
//! saved artifact.

mod config;
mod report;
mod samples;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crate::config::{ForecasterConfig, LogFormat, Overrides, SchemaKind};
use forecast_lib::{
    cross_validate, fit_pipeline, ingest, store, ForecastEngine, Observation, Parallelism,
    PipelineMetrics, ProductRecord, StructuredLogger,
};
use report::{LabelTransform, OutputFormat, PredictionLine};
use samples::Sample;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Next-month sales forecaster
#[derive(Parser)]
#[command(name = "sales-forecaster")]
#[command(
    author,
    version,
    about = "Train and query next-month sales forecasting models",
    long_about = None
)]
pub struct Cli {
    /// Configuration file (defaults to ./forecaster.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Record schema of the data
    #[arg(long, global = true, value_enum)]
    pub schema: Option<SchemaKind>,

    /// Model artifact path
    #[arg(long, global = true, env = "FORECAST_MODEL_PATH")]
    pub model: Option<PathBuf>,

    /// Seed for fold shuffling and row sampling
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Inverse label transform for display: identity or power:<exponent>
    #[arg(long, global = true)]
    pub label_transform: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Write Prometheus metrics to this file on exit
    #[arg(long, global = true)]
    pub metrics_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cross-validate, fit on all rows and save the model
    Train(TrainArgs),

    /// Load the saved model and forecast records
    Predict(PredictArgs),

    /// Train, then forecast the built-in sample records
    Run(TrainArgs),
}

#[derive(clap::Args, Clone)]
pub struct TrainArgs {
    /// Training data CSV with a header row
    #[arg(long, env = "FORECAST_DATA_PATH")]
    pub data: Option<PathBuf>,

    /// Number of cross-validation folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Fit folds one after another instead of in parallel
    #[arg(long)]
    pub sequential: bool,
}

#[derive(clap::Args, Clone)]
pub struct PredictArgs {
    /// CSV of records to forecast (built-in samples when omitted)
    #[arg(long)]
    pub input: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match ForecasterConfig::load(&overrides(&cli)) {
        Ok(config) => config,
        Err(e) => {
            report::print_error(&format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);

    info!(
        schema = config.schema.as_str(),
        model = %config.model_path.display(),
        "Starting sales-forecaster"
    );

    let result = execute(&cli, &config);
    if let Some(path) = &config.metrics_path {
        if let Err(e) = write_metrics(path) {
            error!(error = %e, "Failed to write metrics");
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "sales-forecaster failed");
            report::print_error(&message);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}

fn overrides(cli: &Cli) -> Overrides {
    let mut overrides = Overrides {
        config_file: cli.config.clone(),
        model_path: cli.model.clone(),
        schema: cli.schema,
        seed: cli.seed,
        label_transform: cli.label_transform.clone(),
        log_format: cli.log_format,
        metrics_path: cli.metrics_path.clone(),
        ..Default::default()
    };
    if let Commands::Train(args) | Commands::Run(args) = &cli.command {
        overrides.data_path = args.data.clone();
        overrides.folds = args.folds;
        overrides.sequential = args.sequential;
    }
    overrides
}

fn execute(cli: &Cli, config: &ForecasterConfig) -> Result<()> {
    let transform: LabelTransform = config.label_transform.parse()?;
    match config.schema {
        SchemaKind::Country => {
            execute_for(cli, config, transform, samples::country_samples())
        }
        SchemaKind::Product => execute_for::<ProductRecord>(cli, config, transform, Vec::new()),
    }
}

fn execute_for<R>(
    cli: &Cli,
    config: &ForecasterConfig,
    transform: LabelTransform,
    built_in: Vec<Sample<R>>,
) -> Result<()>
where
    R: Observation + DeserializeOwned + Clone,
{
    match &cli.command {
        Commands::Train(_) => train::<R>(config, cli.format),
        Commands::Predict(args) => {
            let samples = match &args.input {
                Some(path) => read_samples::<R>(path)?,
                None => built_in,
            };
            predict(config, &samples, transform, cli.format)
        }
        Commands::Run(_) => {
            train::<R>(config, cli.format)?;
            predict(config, &built_in, transform, cli.format)
        }
    }
}

/// Cross-validate, fit on the whole data set and save the artifact
fn train<R>(config: &ForecasterConfig, format: OutputFormat) -> Result<()>
where
    R: Observation + DeserializeOwned + Clone,
{
    let data_path = config.require_data_path()?;
    let records: Vec<R> = ingest::read_training_records(data_path)
        .with_context(|| format!("Failed to load training data from {}", data_path.display()))?;

    let logger = StructuredLogger::new(R::SCHEMA);
    let params = config.trainer_params();
    let parallelism = if config.parallel_folds {
        Parallelism::Parallel
    } else {
        Parallelism::Sequential
    };
    logger.log_training_started(records.len(), config.folds, config.seed);

    let start = Instant::now();
    let cv = cross_validate(&records, config.folds, &params, config.seed, parallelism)
        .context("Cross-validation failed")?;
    for fold in &cv.folds {
        logger.log_fold_evaluated(
            fold.fold,
            fold.n_test,
            fold.metrics.rmse,
            fold.metrics.mae,
            fold.metrics.loss,
        );
    }
    logger.log_cross_validation(cv.n_folds(), cv.rmse.mean, cv.rmse.std_dev, cv.r_squared.mean);
    report::print_cross_validation(&cv, format)?;

    let pipeline =
        fit_pipeline(&records, &params, config.seed).context("Failed to fit the final model")?;
    store::save(&pipeline, &config.model_path).with_context(|| {
        format!("Failed to save model to {}", config.model_path.display())
    })?;

    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        rows = records.len(),
        "Training completed"
    );
    if matches!(format, OutputFormat::Table) {
        report::print_success(&format!(
            "Model trained on {} rows and saved to {}",
            records.len(),
            config.model_path.display()
        ));
    }
    Ok(())
}

/// Load the saved artifact and forecast every sample
fn predict<R: Observation>(
    config: &ForecasterConfig,
    samples: &[Sample<R>],
    transform: LabelTransform,
    format: OutputFormat,
) -> Result<()> {
    let engine = ForecastEngine::<R>::load(&config.model_path).with_context(|| {
        format!("Failed to load model from {}", config.model_path.display())
    })?;
    let logger = StructuredLogger::new(R::SCHEMA);

    let lines: Vec<PredictionLine> = samples
        .iter()
        .map(|sample| {
            let start = Instant::now();
            let predicted = engine.predict(&sample.record);
            logger.log_prediction(
                sample.record.unit_key(),
                predicted,
                start.elapsed().as_micros() as u64,
            );
            let month = sample.record.month().unwrap_or(0.0);
            PredictionLine {
                unit_key: sample.record.unit_key().to_string(),
                year: year_of(&sample.record),
                target_month: month + 1.0,
                predicted,
                actual: sample.actual,
            }
        })
        .collect();

    report::print_predictions(&lines, transform, format)?;
    let stats = engine.stats();
    info!(
        total = stats.total_inferences,
        slow = stats.slow_inferences,
        "Forecasts generated"
    );
    Ok(())
}

fn read_samples<R>(path: &Path) -> Result<Vec<Sample<R>>>
where
    R: Observation + DeserializeOwned,
{
    let records: Vec<R> = ingest::read_records(path)
        .with_context(|| format!("Failed to load records from {}", path.display()))?;
    Ok(records.into_iter().map(Sample::new).collect())
}

fn year_of<R: Observation>(record: &R) -> f64 {
    R::NUMERIC_FIELDS
        .iter()
        .find(|f| f.name == "year")
        .map(|f| (f.value)(record))
        .unwrap_or(0.0)
}

fn write_metrics(path: &Path) -> Result<()> {
    let text = PipelineMetrics::new()
        .render()
        .context("Failed to encode metrics")?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_train_overrides() {
        let cli = Cli::parse_from([
            "sales-forecaster",
            "--seed",
            "7",
            "train",
            "--data",
            "country.csv",
            "--folds",
            "4",
            "--sequential",
        ]);
        let overrides = overrides(&cli);
        assert_eq!(overrides.seed, Some(7));
        assert_eq!(overrides.data_path, Some(PathBuf::from("country.csv")));
        assert_eq!(overrides.folds, Some(4));
        assert!(overrides.sequential);
    }

    #[test]
    fn test_predict_ignores_training_flags() {
        let cli = Cli::parse_from(["sales-forecaster", "predict", "--schema", "product"]);
        let overrides = overrides(&cli);
        assert_eq!(overrides.schema, Some(SchemaKind::Product));
        assert_eq!(overrides.folds, None);
    }
}
