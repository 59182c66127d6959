//! Forecasting strategies
//!
//! Both strategies answer the same question for one player: what will the target
//! metric be in `target_season`?

use crate::features::CareerSummary;
use crate::model::{fit_and_predict, TrendFit};
use crate::{Result, StatError, StatRecord};

use super::inference::EnsemblePredictor;

/// One player's forecast before it becomes a `PredictionRecord`
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub value: f64,
    pub score: Option<f64>,
    pub label: String,
}

/// Strategy chosen for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastStrategy {
    /// Polynomial degree search over the player's own seasons
    Trend,
    /// League-wide boosted model on averaged stats
    Ensemble,
}

pub trait Forecaster {
    /// `history` is one player's records, sorted by season and non-empty.
    fn forecast(&self, history: &[&StatRecord], target_season: i32) -> Result<Forecast>;
}

/// Tries degrees `1..=max_degree` and keeps the most conservative extrapolation
pub struct TrendForecaster {
    max_degree: usize,
    label: String,
}

impl TrendForecaster {
    pub fn new(max_degree: usize, label: impl Into<String>) -> Self {
        TrendForecaster {
            max_degree,
            label: label.into(),
        }
    }
}

impl Forecaster for TrendForecaster {
    fn forecast(&self, history: &[&StatRecord], target_season: i32) -> Result<Forecast> {
        let summary = CareerSummary::from_records(history)
            .ok_or_else(|| StatError::InvalidInput("no seasons to fit".to_string()))?;
        let mean = summary.mean_xwoba;
        let points: Vec<(i32, f64)> = history.iter().map(|r| (r.season, r.xwoba)).collect();

        let fits = (1..=self.max_degree)
            .map(|degree| fit_and_predict(&points, degree, target_season))
            .collect::<Result<Vec<_>>>()?;

        let chosen = select_closest_to_mean(&fits, mean).ok_or_else(|| {
            StatError::InvalidInput(format!("max_degree {} leaves nothing to fit", self.max_degree))
        })?;

        log::debug!(
            "{}: degree {} -> {:.4} (mean {:.4}, R² {:.3})",
            summary.player_id,
            chosen.degree,
            chosen.predicted,
            mean,
            chosen.score
        );

        Ok(Forecast {
            value: chosen.predicted,
            score: Some(chosen.score),
            label: self.label.clone(),
        })
    }
}

/// Pick the fit whose prediction lies closest to the historical mean.
///
/// Deliberately ignores fit quality: it damps wild high-degree extrapolations.
/// Ties keep the earlier (lower-degree) fit, and a non-finite prediction only wins
/// when nothing finite exists.
pub fn select_closest_to_mean(fits: &[TrendFit], mean: f64) -> Option<TrendFit> {
    let distance = |fit: &TrendFit| {
        let d = (fit.predicted - mean).abs();
        if d.is_nan() {
            f64::INFINITY
        } else {
            d
        }
    };

    let mut best: Option<(f64, TrendFit)> = None;
    for fit in fits {
        let d = distance(fit);
        match best {
            Some((best_d, _)) if d >= best_d => {}
            _ => best = Some((d, *fit)),
        }
    }
    best.map(|(_, fit)| fit)
}

/// Projects a player's averaged stats one year older through the ensemble model
pub struct EnsembleForecaster {
    predictor: EnsemblePredictor,
}

impl EnsembleForecaster {
    pub fn new(predictor: EnsemblePredictor) -> Self {
        EnsembleForecaster { predictor }
    }
}

impl Forecaster for EnsembleForecaster {
    fn forecast(&self, history: &[&StatRecord], _target_season: i32) -> Result<Forecast> {
        let summary = CareerSummary::from_records(history)
            .ok_or_else(|| StatError::InvalidInput("no seasons to average".to_string()))?;

        let value = self
            .predictor
            .predict_stats(&summary.averages, Some(summary.projected_age()))?;

        Ok(Forecast {
            value,
            score: None,
            label: self.predictor.model_type().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::history::make_record;

    fn fit(degree: usize, predicted: f64) -> TrendFit {
        TrendFit {
            degree,
            predicted,
            score: 0.5,
        }
    }

    #[test]
    fn test_selects_closest_prediction() {
        let fits = [fit(1, -2.75), fit(2, 2.875), fit(3, 2.0)];
        assert_eq!(select_closest_to_mean(&fits, 3.875).unwrap().degree, 2);
    }

    #[test]
    fn test_tie_goes_to_lower_degree() {
        let fits = [fit(1, 0.36), fit(2, 0.36), fit(3, 0.29)];
        assert_eq!(select_closest_to_mean(&fits, 0.325).unwrap().degree, 1);
    }

    #[test]
    fn test_nan_never_beats_finite() {
        let fits = [fit(1, f64::NAN), fit(2, 10.0)];
        assert_eq!(select_closest_to_mean(&fits, 0.3).unwrap().degree, 2);

        let fits = [fit(1, f64::NAN)];
        assert_eq!(select_closest_to_mean(&fits, 0.3).unwrap().degree, 1);
        assert!(select_closest_to_mean(&[], 0.3).is_none());
    }

    #[test]
    fn test_trend_forecaster_picks_quadratic() {
        // Quadratic extrapolation lands nearest the mean of 3.875
        let records: Vec<StatRecord> = [9.0, 4.0, 1.5, 1.0]
            .iter()
            .enumerate()
            .map(|(i, y)| make_record(1, 2017 + i as i32, 25.0 + i as f64, *y))
            .collect();
        let history: Vec<&StatRecord> = records.iter().collect();

        let forecast = TrendForecaster::new(3, "polynomial")
            .forecast(&history, 2021)
            .unwrap();

        assert!((forecast.value - 2.875).abs() < 1e-9);
        let score = forecast.score.unwrap();
        assert!(score > 0.99 && score < 1.0);
        assert_eq!(forecast.label, "polynomial");
    }

    #[test]
    fn test_exact_quadratic_selects_degree_two() {
        // y = -0.01x² + 0.08x + 0.14 over 2015-2020, peaking at 2019
        let curve = |x: f64| -0.01 * x * x + 0.08 * x + 0.14;
        let records: Vec<StatRecord> = (0..6)
            .map(|i| make_record(1, 2015 + i, 24.0 + i as f64, curve(i as f64)))
            .collect();
        let history: Vec<&StatRecord> = records.iter().collect();
        let points: Vec<(i32, f64)> = records.iter().map(|r| (r.season, r.xwoba)).collect();
        let mean = points.iter().map(|(_, y)| y).sum::<f64>() / points.len() as f64;

        let fits: Vec<TrendFit> = (1..=3)
            .map(|degree| fit_and_predict(&points, degree, 2021).unwrap())
            .collect();
        // The straight line overshoots towards 0.353
        assert!((fits[0].predicted - 0.353333).abs() < 1e-5);
        assert_eq!(select_closest_to_mean(&fits, mean).unwrap().degree, 2);

        let forecast = TrendForecaster::new(3, "polynomial")
            .forecast(&history, 2021)
            .unwrap();
        assert!((forecast.value - curve(6.0)).abs() < 1e-9);
        assert!((forecast.score.unwrap() - 1.0).abs() < 1e-9);
    }
}
