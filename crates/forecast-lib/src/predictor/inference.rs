//! Shared, read-only inference over a fitted pipeline

use super::{FittedPipeline, Predictor};
use crate::error::Result;
use crate::models::Observation;
use crate::observability::PipelineMetrics;
use crate::store;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum latency of a single prediction before warning
pub const MAX_INFERENCE_MS: u128 = 5;

/// Prediction engine over an immutable pipeline
///
/// `Send + Sync`; clones share the pipeline and the statistics.
pub struct ForecastEngine<R> {
    pipeline: Arc<FittedPipeline<R>>,
    stats: Arc<Counters>,
    metrics: PipelineMetrics,
}

#[derive(Default)]
struct Counters {
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl<R: Observation> ForecastEngine<R> {
    pub fn new(pipeline: FittedPipeline<R>) -> Self {
        Self::from_shared(Arc::new(pipeline))
    }

    pub fn from_shared(pipeline: Arc<FittedPipeline<R>>) -> Self {
        Self {
            pipeline,
            stats: Arc::new(Counters::default()),
            metrics: PipelineMetrics::new(),
        }
    }

    /// Load a pipeline artifact and wrap it in an engine
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(store::load(path)?))
    }

    pub fn pipeline(&self) -> &Arc<FittedPipeline<R>> {
        &self.pipeline
    }

    /// Forecast one record
    pub fn predict(&self, record: &R) -> f64 {
        let start = Instant::now();
        let score = self.pipeline.predict(record);

        let elapsed = start.elapsed();
        self.stats.inference_count.fetch_add(1, Ordering::Relaxed);
        self.metrics.observe_prediction(elapsed.as_secs_f64());

        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.stats
                .slow_inference_count
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                unit_key = %record.unit_key(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }

        score
    }

    /// Forecast every record, in input order
    pub fn predict_batch(&self, records: &[R]) -> Vec<f64> {
        records.iter().map(|r| self.predict(r)).collect()
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.stats.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.stats.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}

impl<R: Observation> Predictor<R> for ForecastEngine<R> {
    fn predict(&self, record: &R) -> f64 {
        ForecastEngine::predict(self, record)
    }
}

impl<R> Clone for ForecastEngine<R> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            stats: Arc::clone(&self.stats),
            metrics: self.metrics.clone(),
        }
    }
}

/// Inference statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}
