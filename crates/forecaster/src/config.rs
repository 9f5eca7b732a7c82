//! Forecaster configuration
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! `FORECAST_*` environment variables, then command-line flags.

use anyhow::{Context, Result};
use clap::ValueEnum;
use forecast_lib::store::DEFAULT_MODEL_PATH;
use forecast_lib::{TrainerParams, DEFAULT_LEARNING_RATE, DEFAULT_VARIANCE_POWER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given and the file exists
pub const DEFAULT_CONFIG_FILE: &str = "forecaster.toml";

/// Record schema of the data set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Country,
    Product,
}

impl SchemaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaKind::Country => "country",
            SchemaKind::Product => "product",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Forecaster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecasterConfig {
    /// Training data (CSV with a header row)
    pub data_path: Option<PathBuf>,
    pub model_path: PathBuf,
    pub schema: SchemaKind,
    pub seed: u64,
    pub folds: usize,
    pub parallel_folds: bool,
    pub learning_rate: f64,
    pub n_trees: usize,
    pub max_leaves: usize,
    pub min_samples_leaf: usize,
    pub variance_power: f64,
    /// Display transform for predictions: `identity` or `power:<exponent>`
    pub label_transform: String,
    pub log_format: LogFormat,
    /// Where to write the Prometheus text exposition after a run
    pub metrics_path: Option<PathBuf>,
}

/// Values taken from the command line; `None` leaves lower layers in charge
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub schema: Option<SchemaKind>,
    pub seed: Option<u64>,
    pub folds: Option<usize>,
    pub sequential: bool,
    pub label_transform: Option<String>,
    pub log_format: Option<LogFormat>,
    pub metrics_path: Option<PathBuf>,
}

impl ForecasterConfig {
    /// Load configuration from defaults, file, environment and flags
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let defaults = TrainerParams::default();
        let mut builder = config::Config::builder()
            .set_default("model_path", DEFAULT_MODEL_PATH)?
            .set_default("schema", SchemaKind::Country.as_str())?
            .set_default("seed", 2_u64)?
            .set_default("folds", 6_u64)?
            .set_default("parallel_folds", true)?
            .set_default("learning_rate", DEFAULT_LEARNING_RATE)?
            .set_default("n_trees", defaults.n_trees as u64)?
            .set_default("max_leaves", defaults.max_leaves as u64)?
            .set_default("min_samples_leaf", defaults.min_samples_leaf as u64)?
            .set_default("variance_power", DEFAULT_VARIANCE_POWER)?
            .set_default("label_transform", "identity")?
            .set_default("log_format", "json")?;

        builder = match &overrides.config_file {
            Some(path) => builder.add_source(config::File::from(path.as_path()).required(true)),
            None => {
                builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false))
            }
        };

        builder = builder
            .add_source(config::Environment::with_prefix("FORECAST").try_parsing(true))
            .set_override_option("data_path", overrides.data_path.as_deref().map(path_str))?
            .set_override_option("model_path", overrides.model_path.as_deref().map(path_str))?
            .set_override_option("schema", overrides.schema.map(SchemaKind::as_str))?
            .set_override_option("seed", overrides.seed)?
            .set_override_option("folds", overrides.folds.map(|k| k as u64))?
            .set_override_option("label_transform", overrides.label_transform.clone())?
            .set_override_option(
                "log_format",
                overrides.log_format.map(|f| match f {
                    LogFormat::Json => "json",
                    LogFormat::Pretty => "pretty",
                }),
            )?
            .set_override_option("metrics_path", overrides.metrics_path.as_deref().map(path_str))?;
        if overrides.sequential {
            builder = builder.set_override("parallel_folds", false)?;
        }

        builder
            .build()
            .context("Failed to read forecaster configuration")?
            .try_deserialize()
            .context("Invalid forecaster configuration")
    }

    /// Trainer hyperparameters; fields not configurable here keep their defaults
    pub fn trainer_params(&self) -> TrainerParams {
        TrainerParams {
            learning_rate: self.learning_rate,
            n_trees: self.n_trees,
            max_leaves: self.max_leaves,
            min_samples_leaf: self.min_samples_leaf,
            variance_power: self.variance_power,
            ..TrainerParams::default()
        }
    }

    pub fn require_data_path(&self) -> Result<&Path> {
        self.data_path
            .as_deref()
            .context("No training data configured (use --data or FORECAST_DATA_PATH)")
    }
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}
