//! k-fold cross-validation
//!
//! Rows are shuffled with the seed and dealt round-robin into `k` folds, so
//! the folds form a true partition and their sizes differ by at most one.
//! Every fold refits the encoding and the model on the remaining rows.

use crate::error::{ForecastError, Result};
use crate::models::Observation;
use crate::observability::PipelineMetrics;
use crate::training::{fit_pipeline, MetricStats, RegressionMetrics, TrainerParams};
use crate::utils::Parallelism;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Held-out evaluation of one fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub metrics: RegressionMetrics,
}

/// Per-fold metrics and their aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldResult>,
    pub rmse: MetricStats,
    pub mae: MetricStats,
    /// Mean Tweedie deviance
    pub loss: MetricStats,
    pub r_squared: MetricStats,
}

impl CrossValidationReport {
    fn from_folds(folds: Vec<FoldResult>) -> Self {
        let collect = |f: fn(&RegressionMetrics) -> f64| -> MetricStats {
            let values: Vec<f64> = folds.iter().map(|r| f(&r.metrics)).collect();
            MetricStats::from_values(&values)
        };
        Self {
            rmse: collect(|m| m.rmse),
            mae: collect(|m| m.mae),
            loss: collect(|m| m.loss),
            r_squared: collect(|m| m.r_squared),
            folds,
        }
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }
}

/// Fold index of every row: shuffle with `seed`, then deal round-robin
pub fn fold_assignments(n_rows: usize, k: usize, seed: u64) -> Result<Vec<usize>> {
    if k < 2 || k > n_rows {
        return Err(ForecastError::InvalidFoldCount {
            folds: k,
            rows: n_rows,
        });
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut assignment = vec![0; n_rows];
    for (position, row) in order.into_iter().enumerate() {
        assignment[row] = position % k;
    }
    Ok(assignment)
}

/// Estimate generalization error with k-fold cross-validation
///
/// Diagnostic only: nothing fit here is kept.
pub fn cross_validate<R>(
    records: &[R],
    k: usize,
    params: &TrainerParams,
    seed: u64,
    parallelism: Parallelism,
) -> Result<CrossValidationReport>
where
    R: Observation + Clone,
{
    let assignment = fold_assignments(records.len(), k, seed)?;
    params.validate()?;
    info!(
        schema = R::SCHEMA,
        rows = records.len(),
        folds = k,
        parallel = parallelism.is_parallel(),
        "Starting cross-validation"
    );

    let metrics = PipelineMetrics::new();
    let results = parallelism.maybe_par_map((0..k).collect(), |fold| {
        evaluate_fold(records, &assignment, fold, params, seed)
    });
    let folds = results.into_iter().collect::<Result<Vec<_>>>()?;
    for _ in &folds {
        metrics.inc_folds_evaluated();
    }

    let report = CrossValidationReport::from_folds(folds);
    metrics.set_cross_validation_rmse(report.rmse.mean);
    info!(
        rmse = report.rmse.mean,
        rmse_std = report.rmse.std_dev,
        mae = report.mae.mean,
        loss = report.loss.mean,
        r_squared = report.r_squared.mean,
        "Cross-validation finished"
    );
    Ok(report)
}

fn evaluate_fold<R>(
    records: &[R],
    assignment: &[usize],
    fold: usize,
    params: &TrainerParams,
    seed: u64,
) -> Result<FoldResult>
where
    R: Observation + Clone,
{
    let (test, train): (Vec<(usize, &R)>, Vec<(usize, &R)>) = records
        .iter()
        .enumerate()
        .partition(|(i, _)| assignment[*i] == fold);
    let train: Vec<R> = train.into_iter().map(|(_, r)| r.clone()).collect();

    let pipeline = fit_pipeline(&train, params, seed)?;
    let predictions: Vec<f64> = test.iter().map(|(_, r)| pipeline.predict(r)).collect();
    let labels: Vec<f64> = test.iter().map(|(_, r)| r.label()).collect();
    let metrics = RegressionMetrics::compute(&predictions, &labels, pipeline.model().objective());

    debug!(fold, n_train = train.len(), n_test = test.len(), rmse = metrics.rmse, "Fold evaluated");
    Ok(FoldResult {
        fold,
        n_train: train.len(),
        n_test: test.len(),
        metrics,
    })
}
