//! Feature pipeline and prediction engine

mod features;
mod inference;

pub use features::{fit_encoding, transform, FittedEncoding};
pub use inference::{ForecastEngine, InferenceStats, MAX_INFERENCE_MS};

use crate::models::Observation;
use crate::training::FittedModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait for prediction implementations
pub trait Predictor<R: Observation>: Send + Sync {
    /// Forecast the label for one record, on the trained label scale
    fn predict(&self, record: &R) -> f64;
}

/// Provenance of a fitted pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub trained_at: DateTime<Utc>,
    pub trained_rows: usize,
    pub seed: u64,
}

impl PipelineInfo {
    pub(crate) fn new(trained_rows: usize, seed: u64) -> Self {
        Self {
            trained_at: Utc::now(),
            trained_rows,
            seed,
        }
    }
}

/// Encoding plus model, fit together on one dataset
///
/// Immutable once built; re-training produces a new value.
pub struct FittedPipeline<R> {
    encoding: FittedEncoding<R>,
    model: FittedModel,
    info: PipelineInfo,
}

impl<R: Observation> FittedPipeline<R> {
    pub(crate) fn new(encoding: FittedEncoding<R>, model: FittedModel, info: PipelineInfo) -> Self {
        debug_assert_eq!(encoding.feature_len(), model.n_features());
        Self {
            encoding,
            model,
            info,
        }
    }

    pub fn encoding(&self) -> &FittedEncoding<R> {
        &self.encoding
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    pub fn info(&self) -> &PipelineInfo {
        &self.info
    }

    /// Transform then score one record
    pub fn predict(&self, record: &R) -> f64 {
        self.model.predict(&self.encoding.transform(record))
    }
}

impl<R: Observation> Predictor<R> for FittedPipeline<R> {
    fn predict(&self, record: &R) -> f64 {
        FittedPipeline::predict(self, record)
    }
}

impl<R> Clone for FittedPipeline<R> {
    fn clone(&self) -> Self {
        Self {
            encoding: self.encoding.clone(),
            model: self.model.clone(),
            info: self.info.clone(),
        }
    }
}

impl<R> fmt::Debug for FittedPipeline<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedPipeline")
            .field("encoding", &self.encoding)
            .field("trees", &self.model.trees().len())
            .field("info", &self.info)
            .finish()
    }
}

/// Forecast one record with a fitted pipeline
pub fn predict<R: Observation>(pipeline: &FittedPipeline<R>, record: &R) -> f64 {
    pipeline.predict(record)
}
