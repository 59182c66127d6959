//! Polynomial trend fitting over a player's seasons
//!
//! Ordinary least squares of the target metric on powers of the season, solved by
//! SVD so that short histories with high degrees still produce a (minimum-norm) fit.

use nalgebra::{DMatrix, DVector};

use crate::training::metrics::r2_score;
use crate::{Result, StatError};

/// Result of fitting one degree and extrapolating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    pub degree: usize,
    pub predicted: f64,
    /// R² against the fitted history (not a held-out score)
    pub score: f64,
}

/// Fitted polynomial in season offset from `origin`
#[derive(Debug, Clone)]
pub struct PolynomialTrend {
    origin: i32,
    /// Coefficients, constant term first
    coefficients: Vec<f64>,
}

impl PolynomialTrend {
    /// Fit a polynomial of the given degree to `(season, value)` points.
    ///
    /// Seasons are measured from the earliest season in `history`; the fitted curve
    /// is the same polynomial, the design matrix is just far better conditioned than
    /// one built from raw years.
    pub fn fit(history: &[(i32, f64)], degree: usize) -> Result<Self> {
        if degree == 0 {
            return Err(StatError::InvalidInput(
                "polynomial degree must be at least 1".to_string(),
            ));
        }
        let origin = history
            .iter()
            .map(|(season, _)| *season)
            .min()
            .ok_or_else(|| StatError::InvalidInput("cannot fit an empty history".to_string()))?;

        let n = history.len();
        let design = DMatrix::from_fn(n, degree + 1, |row, col| {
            let x = (history[row].0 - origin) as f64;
            x.powi(col as i32)
        });
        let targets = DVector::from_iterator(n, history.iter().map(|(_, y)| *y));

        let svd = design.svd(true, true);
        let max_singular = svd.singular_values.max();
        let eps = max_singular * n.max(degree + 1) as f64 * f64::EPSILON;
        let solution = svd
            .solve(&targets, eps)
            .map_err(|e| StatError::InvalidInput(format!("least squares failed: {}", e)))?;

        Ok(PolynomialTrend {
            origin,
            coefficients: solution.iter().copied().collect(),
        })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Evaluate at a season (Horner's rule)
    pub fn predict(&self, season: i32) -> f64 {
        let x = (season - self.origin) as f64;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }

    /// R² of the fit against `history`
    pub fn score(&self, history: &[(i32, f64)]) -> f64 {
        let actual: Vec<f64> = history.iter().map(|(_, y)| *y).collect();
        let fitted: Vec<f64> = history.iter().map(|(s, _)| self.predict(*s)).collect();
        r2_score(&actual, &fitted)
    }
}

/// Fit one degree, extrapolate to `target_season`, and score the fit.
pub fn fit_and_predict(history: &[(i32, f64)], degree: usize, target_season: i32) -> Result<TrendFit> {
    let trend = PolynomialTrend::fit(history, degree)?;
    Ok(TrendFit {
        degree,
        predicted: trend.predict(target_season),
        score: trend.score(history),
    })
}
