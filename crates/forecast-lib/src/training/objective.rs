//! Tweedie regression objective (log link).
//!
//! With raw score `f` and mean `μ = exp(f)`, for variance power `p ∈ (1, 2)`:
//!
//! - Loss: `-y·exp((1-p)f)/(1-p) + exp((2-p)f)/(2-p)`
//! - Gradient: `-y·exp((1-p)f) + exp((2-p)f)`
//! - Hessian: `-y·(1-p)·exp((1-p)f) + (2-p)·exp((2-p)f)`
//!
//! The hessian is strictly positive for non-negative labels.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tweedie {
    pub variance_power: f64,
}

impl Tweedie {
    pub fn new(variance_power: f64) -> Self {
        Self { variance_power }
    }

    /// Gradient and hessian of the loss at each raw score
    pub(crate) fn compute_gradients_into(
        &self,
        raw_scores: &[f64],
        labels: &[f64],
        grad_hess: &mut [(f64, f64)],
    ) {
        let rho = self.variance_power;
        for ((gh, &f), &y) in grad_hess.iter_mut().zip(raw_scores).zip(labels) {
            let a = ((1.0 - rho) * f).exp();
            let b = ((2.0 - rho) * f).exp();
            gh.0 = -y * a + b;
            gh.1 = -y * (1.0 - rho) * a + (2.0 - rho) * b;
        }
    }

    /// Initial raw score: log of the mean label
    pub(crate) fn base_score(&self, labels: &[f64]) -> Result<f64> {
        if labels.is_empty() {
            return Err(ForecastError::Fit("no labels to fit".to_string()));
        }
        let mean = labels.iter().sum::<f64>() / labels.len() as f64;
        if !(mean > 0.0) {
            return Err(ForecastError::Fit(format!(
                "Tweedie objective needs a positive mean label, got {mean}"
            )));
        }
        Ok(mean.ln())
    }

    /// Map a raw score to the label scale
    #[inline]
    pub fn transform(&self, raw_score: f64) -> f64 {
        raw_score.exp()
    }

    /// Unit deviance `d(y, μ)`, the native loss reported by evaluation
    pub fn deviance(&self, label: f64, mean: f64) -> f64 {
        let rho = self.variance_power;
        let mu = mean.max(f64::MIN_POSITIVE);
        let y = label.max(0.0);
        let term_y = if y > 0.0 {
            y.powf(2.0 - rho) / ((1.0 - rho) * (2.0 - rho))
        } else {
            0.0
        };
        2.0 * (term_y - y * mu.powf(1.0 - rho) / (1.0 - rho) + mu.powf(2.0 - rho) / (2.0 - rho))
    }
}

impl Default for Tweedie {
    fn default() -> Self {
        Self::new(super::params::DEFAULT_VARIANCE_POWER)
    }
}
