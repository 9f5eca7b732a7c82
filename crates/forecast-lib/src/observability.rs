//! Observability infrastructure for the forecasting pipeline
//!
//! Provides:
//! - Prometheus metrics (training duration, prediction latency, cross-validation results)
//! - Structured logging of pipeline events with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Encoder, Gauge,
    Histogram, IntCounter, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::info;

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Histogram buckets for training duration (in seconds)
const TRAINING_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    training_duration_seconds: Histogram,
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    folds_evaluated_total: IntCounter,
    cross_validation_rmse: Gauge,
    artifact_size_bytes: IntGauge,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            training_duration_seconds: register_histogram!(
                "sales_forecaster_training_duration_seconds",
                "Time spent fitting a feature pipeline and tree ensemble",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            prediction_latency_seconds: register_histogram!(
                "sales_forecaster_prediction_latency_seconds",
                "Time spent scoring one record",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "sales_forecaster_predictions_total",
                "Total number of predictions generated"
            )
            .expect("Failed to register predictions_total"),

            folds_evaluated_total: register_int_counter!(
                "sales_forecaster_folds_evaluated_total",
                "Total number of cross-validation folds evaluated"
            )
            .expect("Failed to register folds_evaluated_total"),

            cross_validation_rmse: register_gauge!(
                "sales_forecaster_cross_validation_rmse",
                "Mean RMSE of the most recent cross-validation run"
            )
            .expect("Failed to register cross_validation_rmse"),

            artifact_size_bytes: register_int_gauge!(
                "sales_forecaster_artifact_size_bytes",
                "Size of the most recently saved or loaded model artifact"
            )
            .expect("Failed to register artifact_size_bytes"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Create a metrics handle (registers global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_training_duration(&self, duration_secs: f64) {
        self.inner().training_duration_seconds.observe(duration_secs);
    }

    /// Record one prediction and its latency
    pub fn observe_prediction(&self, duration_secs: f64) {
        let inner = self.inner();
        inner.prediction_latency_seconds.observe(duration_secs);
        inner.predictions_total.inc();
    }

    pub fn inc_folds_evaluated(&self) {
        self.inner().folds_evaluated_total.inc();
    }

    pub fn set_cross_validation_rmse(&self, rmse: f64) {
        self.inner().cross_validation_rmse.set(rmse);
    }

    pub fn set_artifact_size(&self, bytes: u64) {
        self.inner()
            .artifact_size_bytes
            .set(i64::try_from(bytes).unwrap_or(i64::MAX));
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for pipeline events
///
/// Every event carries an `event` field and the record schema it concerns.
#[derive(Clone)]
pub struct StructuredLogger {
    schema: String,
}

impl StructuredLogger {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn log_training_started(&self, rows: usize, folds: usize, seed: u64) {
        info!(
            event = "training_started",
            schema = %self.schema,
            rows = rows,
            folds = folds,
            seed = seed,
            "Training started"
        );
    }

    pub fn log_fold_evaluated(&self, fold: usize, n_test: usize, rmse: f64, mae: f64, loss: f64) {
        info!(
            event = "fold_evaluated",
            schema = %self.schema,
            fold = fold,
            n_test = n_test,
            rmse = rmse,
            mae = mae,
            loss = loss,
            "Fold evaluated"
        );
    }

    pub fn log_cross_validation(
        &self,
        folds: usize,
        rmse_mean: f64,
        rmse_std: f64,
        r_squared: f64,
    ) {
        info!(
            event = "cross_validation_completed",
            schema = %self.schema,
            folds = folds,
            rmse_mean = rmse_mean,
            rmse_std = rmse_std,
            r_squared = r_squared,
            "Cross-validation completed"
        );
    }

    pub fn log_model_saved(&self, path: &str, bytes: u64, vocabulary: usize) {
        info!(
            event = "model_saved",
            schema = %self.schema,
            path = %path,
            bytes = bytes,
            vocabulary = vocabulary,
            "Model artifact saved"
        );
    }

    pub fn log_model_loaded(&self, path: &str, trained_rows: usize, trained_at: &str) {
        info!(
            event = "model_loaded",
            schema = %self.schema,
            path = %path,
            trained_rows = trained_rows,
            trained_at = %trained_at,
            "Model artifact loaded"
        );
    }

    pub fn log_prediction(&self, unit_key: &str, score: f64, elapsed_us: u64) {
        info!(
            event = "prediction_generated",
            schema = %self.schema,
            unit_key = %unit_key,
            score = score,
            elapsed_us = elapsed_us,
            "Generated forecast"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_metrics_creation() {
        let metrics = PipelineMetrics::new();
        metrics.observe_training_duration(0.5);
        metrics.observe_prediction(0.0001);
        metrics.inc_folds_evaluated();
        metrics.set_cross_validation_rmse(12.5);
        metrics.set_artifact_size(2048);

        let text = metrics.render().unwrap();
        assert!(text.contains("sales_forecaster_predictions_total"));
        assert!(text.contains("sales_forecaster_artifact_size_bytes"));
    }

    #[test]
    fn test_handles_share_metrics() {
        let a = PipelineMetrics::new();
        let b = a.clone();
        let before = a.inner().predictions_total.get();
        b.observe_prediction(0.001);
        assert!(a.inner().predictions_total.get() > before);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("country");
        assert_eq!(logger.schema, "country");
        logger.log_training_started(120, 6, 2);
    }
}
