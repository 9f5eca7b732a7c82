//! Regression metrics for held-out evaluation

use super::objective::Tweedie;
use serde::{Deserialize, Serialize};

/// Metrics of one model over one evaluation set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Mean Tweedie deviance (the objective's native loss)
    pub loss: f64,
    /// Coefficient of determination; 0 when the labels are constant
    pub r_squared: f64,
    pub n_rows: usize,
}

impl RegressionMetrics {
    /// Evaluate label-scale predictions against labels
    pub fn compute(predictions: &[f64], labels: &[f64], objective: &Tweedie) -> Self {
        let n = predictions.len().min(labels.len());
        if n == 0 {
            return Self {
                rmse: 0.0,
                mae: 0.0,
                loss: 0.0,
                r_squared: 0.0,
                n_rows: 0,
            };
        }

        let (sum_sq, sum_abs, sum_dev) = predictions
            .iter()
            .zip(labels)
            .fold((0.0, 0.0, 0.0), |(sq, ab, dev), (&p, &y)| {
                let diff = p - y;
                (sq + diff * diff, ab + diff.abs(), dev + objective.deviance(y, p))
            });

        let mean_label = labels[..n].iter().sum::<f64>() / n as f64;
        let total_sq: f64 = labels[..n].iter().map(|y| (y - mean_label).powi(2)).sum();
        let r_squared = if total_sq > 0.0 {
            1.0 - sum_sq / total_sq
        } else {
            0.0
        };

        Self {
            rmse: (sum_sq / n as f64).sqrt(),
            mae: sum_abs / n as f64,
            loss: sum_dev / n as f64,
            r_squared,
            n_rows: n,
        }
    }
}

/// Mean and sample standard deviation of one metric across folds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl MetricStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = if values.len() > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        Self { mean, std_dev }
    }
}
