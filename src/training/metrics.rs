//! Regression metrics and evaluation scores

use serde::{Deserialize, Serialize};
use std::fmt;

/// Below this a sum of squares counts as zero
const DEGENERATE_SS: f64 = 1e-12;

/// Mean squared error. NaN for empty or mismatched inputs.
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    sum / actual.len() as f64
}

/// Coefficient of determination.
///
/// With constant `actual` values the score is 1.0 for an exact fit and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let mean = mean(actual);
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    degenerate_ratio(ss_res, ss_tot)
}

/// Explained variance: 1 - Var(actual - predicted) / Var(actual)
pub fn explained_variance(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    degenerate_ratio(variance(&residuals), variance(actual))
}

fn degenerate_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator < DEGENERATE_SS {
        if numerator < DEGENERATE_SS {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - numerator / denominator
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Scores from one ensemble training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    /// R² on the training partition
    pub training: f64,
    /// Mean R² over contiguous k-fold CV on the training partition
    pub mean_cv: f64,
    /// Mean R² over shuffled k-fold CV on the training partition
    pub kfold_cv: f64,
    /// Held-out mean squared error
    pub mse: f64,
    /// Held-out R²
    pub r2: f64,
    /// Held-out explained variance
    pub explained_variance: f64,
}

impl fmt::Display for EvaluationScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Train R²: {:.4} | CV: {:.4} (shuffled {:.4}) | Test MSE: {:.6} R²: {:.4} EV: {:.4}",
            self.training, self.mean_cv, self.kfold_cv, self.mse, self.r2, self.explained_variance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse() {
        assert_eq!(mean_squared_error(&[1.0, 2.0], &[1.0, 4.0]), 2.0);
        assert!(mean_squared_error(&[], &[]).is_nan());
        assert!(mean_squared_error(&[1.0], &[1.0, 2.0]).is_nan());
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        assert!((r2_score(&actual, &actual) - 1.0).abs() < 1e-12);
        assert!(r2_score(&actual, &[2.5; 4]).abs() < 1e-12);
        // Worse than the mean goes negative
        assert!(r2_score(&actual, &[4.0, 3.0, 2.0, 1.0]) < 0.0);
    }

    #[test]
    fn test_r2_constant_actual() {
        assert_eq!(r2_score(&[0.3, 0.3], &[0.3, 0.3]), 1.0);
        assert_eq!(r2_score(&[0.3, 0.3], &[0.2, 0.4]), 0.0);
        assert_eq!(r2_score(&[0.3], &[0.35]), 0.0);
    }

    #[test]
    fn test_explained_variance_ignores_bias() {
        let actual = [1.0, 2.0, 3.0];
        let shifted = [2.0, 3.0, 4.0];
        assert!((explained_variance(&actual, &shifted) - 1.0).abs() < 1e-12);
        assert!(r2_score(&actual, &shifted) < 1.0);
    }

    #[test]
    fn test_scores_display() {
        let scores = EvaluationScores {
            training: 0.9,
            mean_cv: 0.5,
            kfold_cv: 0.55,
            mse: 0.001,
            r2: 0.6,
            explained_variance: 0.61,
        };
        let text = scores.to_string();
        assert!(text.contains("Train R²: 0.9000"));
        assert!(text.contains("Test MSE: 0.001000"));
    }
}
