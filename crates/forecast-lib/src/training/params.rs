//! Training hyperparameters

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Fixed learning rate of the boosted-tree regressor
pub const DEFAULT_LEARNING_RATE: f64 = 0.2;

/// Default Tweedie variance power (compound Poisson-gamma)
pub const DEFAULT_VARIANCE_POWER: f64 = 1.5;

/// Hyperparameters for the Tweedie boosted-tree trainer.
///
/// Fixed once the trainer is constructed; fitting never adjusts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerParams {
    // --- Boosting ---
    /// Number of boosting rounds (trees).
    pub n_trees: usize,
    /// Shrinkage applied to every leaf value.
    pub learning_rate: f64,

    // --- Tree structure ---
    /// Maximum leaves per tree (leaf-wise growth).
    pub max_leaves: usize,
    /// Minimum training rows in each leaf.
    pub min_samples_leaf: usize,
    /// Maximum histogram bins per feature (at most 256).
    pub max_bins: usize,

    // --- Regularization ---
    /// L2 regularization on leaf values (lambda).
    pub reg_lambda: f64,
    /// Minimum gain for a split to be kept (gamma).
    pub min_split_gain: f64,
    /// Minimum hessian sum in each child.
    pub min_child_weight: f64,

    // --- Objective ---
    /// Tweedie variance power, in (1, 2).
    pub variance_power: f64,

    // --- Sampling ---
    /// Fraction of rows drawn (without replacement) for each tree.
    pub subsample: f64,
}

impl Default for TrainerParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            learning_rate: DEFAULT_LEARNING_RATE,
            max_leaves: 20,
            min_samples_leaf: 10,
            max_bins: 255,
            reg_lambda: 1.0,
            min_split_gain: 0.0,
            min_child_weight: 1e-3,
            variance_power: DEFAULT_VARIANCE_POWER,
            subsample: 1.0,
        }
    }
}

impl TrainerParams {
    /// Reject hyperparameters the trainer cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ForecastError::Fit(msg));

        if self.n_trees == 0 {
            return invalid("n_trees must be at least 1".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if self.max_leaves < 2 {
            return invalid(format!("max_leaves must be at least 2, got {}", self.max_leaves));
        }
        if self.min_samples_leaf == 0 {
            return invalid("min_samples_leaf must be at least 1".to_string());
        }
        if !(2..=256).contains(&self.max_bins) {
            return invalid(format!("max_bins must be in 2..=256, got {}", self.max_bins));
        }
        if !(self.reg_lambda >= 0.0 && self.reg_lambda.is_finite()) {
            return invalid(format!("reg_lambda must be non-negative, got {}", self.reg_lambda));
        }
        if !(self.min_split_gain >= 0.0) {
            return invalid(format!(
                "min_split_gain must be non-negative, got {}",
                self.min_split_gain
            ));
        }
        if !(self.min_child_weight >= 0.0) {
            return invalid(format!(
                "min_child_weight must be non-negative, got {}",
                self.min_child_weight
            ));
        }
        if !(self.variance_power > 1.0 && self.variance_power < 2.0) {
            return invalid(format!(
                "variance_power must be in (1, 2), got {}",
                self.variance_power
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return invalid(format!("subsample must be in (0, 1], got {}", self.subsample));
        }
        Ok(())
    }

    /// Split gain, XGBoost form:
    /// `0.5 * [G_L²/(H_L+λ) + G_R²/(H_R+λ) - G_P²/(H_P+λ)] - γ`
    #[inline]
    pub(crate) fn split_gain(
        &self,
        grad_left: f64,
        hess_left: f64,
        grad_right: f64,
        hess_right: f64,
    ) -> f64 {
        let lambda = self.reg_lambda;
        let grad_parent = grad_left + grad_right;
        let hess_parent = hess_left + hess_right;
        let score_left = grad_left * grad_left / (hess_left + lambda);
        let score_right = grad_right * grad_right / (hess_right + lambda);
        let score_parent = grad_parent * grad_parent / (hess_parent + lambda);
        0.5 * (score_left + score_right - score_parent) - self.min_split_gain
    }

    /// Shrunk Newton step for a leaf: `-η·G/(H+λ)`
    #[inline]
    pub(crate) fn leaf_value(&self, grad_sum: f64, hess_sum: f64) -> f64 {
        -self.learning_rate * grad_sum / (hess_sum + self.reg_lambda)
    }

    #[inline]
    pub(crate) fn is_valid_split(
        &self,
        hess_left: f64,
        hess_right: f64,
        count_left: usize,
        count_right: usize,
    ) -> bool {
        hess_left >= self.min_child_weight
            && hess_right >= self.min_child_weight
            && count_left >= self.min_samples_leaf
            && count_right >= self.min_samples_leaf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_default() {
        let params = TrainerParams::default();
        assert_eq!(params.learning_rate, 0.2);
        assert_eq!(params.n_trees, 100);
        assert_eq!(params.max_leaves, 20);
        assert_eq!(params.min_samples_leaf, 10);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let cases = [
            TrainerParams {
                learning_rate: 0.0,
                ..Default::default()
            },
            TrainerParams {
                learning_rate: f64::NAN,
                ..Default::default()
            },
            TrainerParams {
                n_trees: 0,
                ..Default::default()
            },
            TrainerParams {
                max_leaves: 1,
                ..Default::default()
            },
            TrainerParams {
                max_bins: 1000,
                ..Default::default()
            },
            TrainerParams {
                variance_power: 2.0,
                ..Default::default()
            },
            TrainerParams {
                subsample: 0.0,
                ..Default::default()
            },
        ];
        for params in cases {
            assert!(
                matches!(params.validate(), Err(ForecastError::Fit(_))),
                "{params:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_gain_computation() {
        let params = TrainerParams {
            reg_lambda: 1.0,
            ..Default::default()
        };
        // score_left = 100/6, score_right = 100/6, parent = 0
        let gain = params.split_gain(10.0, 5.0, -10.0, 5.0);
        assert!((gain - 16.666).abs() < 0.01);
    }

    #[test]
    fn test_leaf_value() {
        let params = TrainerParams {
            learning_rate: 0.5,
            reg_lambda: 0.0,
            ..Default::default()
        };
        assert!((params.leaf_value(4.0, 2.0) + 1.0).abs() < 1e-12);
    }
}
