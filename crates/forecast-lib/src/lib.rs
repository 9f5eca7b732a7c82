//! Library for next-month sales forecasting
//!
//! This crate provides the core functionality for:
//! - Record schemas and CSV ingestion
//! - One-hot feature construction
//! - Tweedie gradient-boosted tree training
//! - k-fold cross-validation
//! - Model artifact persistence and inference
//! - Metrics and structured logging

pub mod error;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod store;
pub mod training;
pub mod utils;
pub mod validation;

pub use error::{ForecastError, Result};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use predictor::{
    fit_encoding, predict, transform, FittedEncoding, FittedPipeline, ForecastEngine,
    InferenceStats, PipelineInfo, Predictor,
};
pub use training::{
    fit_model, fit_pipeline, FittedModel, Trainer, TrainerParams, DEFAULT_LEARNING_RATE,
    DEFAULT_VARIANCE_POWER,
};
pub use utils::Parallelism;
pub use validation::{cross_validate, CrossValidationReport, FoldResult};
