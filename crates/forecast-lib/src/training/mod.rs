//! Gradient-boosted tree training with a Tweedie objective
//!
//! [`Trainer`] owns fixed hyperparameters and fits a [`FittedModel`] from
//! records transformed by a [`FittedEncoding`]. [`fit_pipeline`] does both
//! steps on one dataset and is what production training and every
//! cross-validation fold call.

mod binning;
mod metrics;
mod objective;
mod params;
mod tree;

#[cfg(test)]
mod tests;

pub use metrics::{MetricStats, RegressionMetrics};
pub use objective::Tweedie;
pub use params::{TrainerParams, DEFAULT_LEARNING_RATE, DEFAULT_VARIANCE_POWER};
pub use tree::{Node, Tree};

use crate::error::{ForecastError, Result};
use crate::models::{FeatureVector, Observation};
use crate::observability::PipelineMetrics;
use crate::predictor::{fit_encoding, FittedEncoding, FittedPipeline, PipelineInfo};
use binning::BinnedMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};
use tree::TreeGrower;

/// Trained additive tree ensemble
///
/// Raw score = `base_score + Σ tree(x)`; predictions are on the label scale
/// through the Tweedie log link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    objective: Tweedie,
    base_score: f64,
    n_features: usize,
    trees: Vec<Tree>,
    params: TrainerParams,
}

impl FittedModel {
    /// Margin before the inverse link
    pub fn predict_raw(&self, features: &[f64]) -> f64 {
        debug_assert_eq!(features.len(), self.n_features);
        self.base_score + self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    /// Prediction on the trained label scale
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.objective.transform(self.predict_raw(features.as_slice()))
    }

    pub fn objective(&self) -> &Tweedie {
        &self.objective
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn params(&self) -> &TrainerParams {
        &self.params
    }

    /// Structural check used when a model is restored from disk
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if !self.base_score.is_finite() {
            return Err("non-finite base score".to_string());
        }
        if !(self.objective.variance_power > 1.0 && self.objective.variance_power < 2.0) {
            return Err(format!(
                "variance power {} outside (1, 2)",
                self.objective.variance_power
            ));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("tree {idx}: {e}"))?;
        }
        Ok(())
    }
}

/// Boosted-tree trainer with hyperparameters fixed at construction
#[derive(Debug, Clone)]
pub struct Trainer {
    params: TrainerParams,
}

impl Trainer {
    /// Create a trainer; invalid hyperparameters are a fit error
    pub fn new(params: TrainerParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &TrainerParams {
        &self.params
    }

    /// Fit a model on records transformed by `encoding`.
    ///
    /// `seed` drives row subsampling; with `subsample = 1.0` the fit does not
    /// depend on it. Same seed, records and encoding give an identical model.
    pub fn fit<R: Observation>(
        &self,
        records: &[R],
        encoding: &FittedEncoding<R>,
        seed: u64,
    ) -> Result<FittedModel> {
        if records.is_empty() {
            return Err(ForecastError::Fit(
                "cannot fit a model on an empty dataset".to_string(),
            ));
        }
        let rows: Vec<FeatureVector> = records.iter().map(|r| encoding.transform(r)).collect();
        let labels: Vec<f64> = records.iter().map(Observation::label).collect();
        self.fit_rows(&rows, &labels, encoding.feature_len(), seed)
    }

    fn fit_rows(
        &self,
        rows: &[FeatureVector],
        labels: &[f64],
        n_features: usize,
        seed: u64,
    ) -> Result<FittedModel> {
        if let Some((idx, y)) = labels
            .iter()
            .enumerate()
            .find(|(_, y)| !(y.is_finite() && **y >= 0.0))
        {
            return Err(ForecastError::Fit(format!(
                "Tweedie objective needs finite non-negative labels, row {idx} has {y}"
            )));
        }

        let params = &self.params;
        let objective = Tweedie::new(params.variance_power);
        let base_score = objective.base_score(labels)?;
        let matrix = BinnedMatrix::build(rows, n_features, params.max_bins);

        let n_rows = rows.len();
        let sample_size = ((n_rows as f64 * params.subsample).ceil() as usize).clamp(1, n_rows);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut raw_scores = vec![base_score; n_rows];
        let mut grad_hess = vec![(0.0, 0.0); n_rows];
        let mut grower = TreeGrower::new(&matrix, params);
        let mut trees = Vec::with_capacity(params.n_trees);

        for round in 0..params.n_trees {
            objective.compute_gradients_into(&raw_scores, labels, &mut grad_hess);
            if grad_hess.iter().any(|(g, h)| !g.is_finite() || !h.is_finite()) {
                return Err(ForecastError::Fit(format!(
                    "non-finite gradients at boosting round {round}"
                )));
            }

            let sampled: Vec<u32> = if sample_size < n_rows {
                let mut idx: Vec<u32> = rand::seq::index::sample(&mut rng, n_rows, sample_size)
                    .into_iter()
                    .map(|i| i as u32)
                    .collect();
                idx.sort_unstable();
                idx
            } else {
                (0..n_rows as u32).collect()
            };

            let tree = grower.grow(sampled, &grad_hess);
            tree.validate(n_features)
                .map_err(|e| ForecastError::Fit(format!("boosting round {round}: {e}")))?;

            for (score, row) in raw_scores.iter_mut().zip(rows) {
                *score += tree.predict(row.as_slice());
            }

            if round % 20 == 0 {
                debug!(round, leaves = tree.n_leaves(), "Boosting round completed");
            }
            trees.push(tree);
        }

        Ok(FittedModel {
            objective,
            base_score,
            n_features,
            trees,
            params: params.clone(),
        })
    }
}

/// Fit a model on records under an already fitted encoding
pub fn fit_model<R: Observation>(
    records: &[R],
    encoding: &FittedEncoding<R>,
    params: &TrainerParams,
    seed: u64,
) -> Result<FittedModel> {
    Trainer::new(params.clone())?.fit(records, encoding, seed)
}

/// Fit the encoding and the model on the whole dataset
pub fn fit_pipeline<R: Observation>(
    records: &[R],
    params: &TrainerParams,
    seed: u64,
) -> Result<FittedPipeline<R>> {
    let start = Instant::now();
    let trainer = Trainer::new(params.clone())?;
    let encoding = fit_encoding(records)?;
    let model = trainer.fit(records, &encoding, seed)?;

    let elapsed = start.elapsed();
    PipelineMetrics::new().observe_training_duration(elapsed.as_secs_f64());
    info!(
        schema = R::SCHEMA,
        rows = records.len(),
        vocabulary = encoding.vocabulary().len(),
        trees = model.trees().len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Pipeline fitted"
    );

    let info = PipelineInfo::new(records.len(), seed);
    Ok(FittedPipeline::new(encoding, model, info))
}
