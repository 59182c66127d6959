//! Batch prediction across every player in a history table

use crate::data::{HistoryTable, ModelStore};
use crate::features::CareerSummary;
use crate::{PlayerId, PredictionConfig, PredictionRecord, Result, StatError, StatRecord};

use super::inference::EnsemblePredictor;
use super::strategy::{EnsembleForecaster, ForecastStrategy, Forecaster, TrendForecaster};

/// Chooses a strategy per player and runs the batch
pub struct PredictionOrchestrator<'a> {
    store: &'a dyn ModelStore,
    config: PredictionConfig,
}

impl<'a> PredictionOrchestrator<'a> {
    pub fn new(store: &'a dyn ModelStore, config: PredictionConfig) -> Self {
        PredictionOrchestrator { store, config }
    }

    /// Strategy for a player, or `None` when their history is too old to use
    pub fn choose_strategy(
        &self,
        summary: &CareerSummary,
        target_season: i32,
        ensemble_only: bool,
    ) -> Option<ForecastStrategy> {
        if summary.season_gap(target_season) > self.config.max_season_gap {
            return None;
        }
        if ensemble_only || summary.seasons < self.config.min_history {
            Some(ForecastStrategy::Ensemble)
        } else {
            Some(ForecastStrategy::Trend)
        }
    }

    /// Forecast `target_season` for every player in `history`.
    ///
    /// Records come back ordered by player id. Any player failing aborts the
    /// whole batch.
    pub fn generate_predictions(
        &self,
        history: &HistoryTable,
        target_season: i32,
        model_type: &str,
        ensemble_only: bool,
    ) -> Result<Vec<PredictionRecord>> {
        let groups = history.by_player();

        let mut plan: Vec<(PlayerId, Vec<&StatRecord>, ForecastStrategy)> = Vec::new();
        let mut stale = 0;
        for (player_id, records) in groups {
            let Some(summary) = CareerSummary::from_records(&records) else {
                continue;
            };
            match self.choose_strategy(&summary, target_season, ensemble_only) {
                Some(strategy) => plan.push((player_id, records, strategy)),
                None => {
                    log::debug!(
                        "{} ({}): last season {} too old for {}",
                        player_id,
                        records[0].full_name(),
                        summary.last_season,
                        target_season
                    );
                    stale += 1;
                }
            }
        }

        let needs_ensemble = plan
            .iter()
            .any(|(_, _, s)| *s == ForecastStrategy::Ensemble);
        let ensemble = if needs_ensemble {
            Some(EnsembleForecaster::new(EnsemblePredictor::load(
                self.store, model_type,
            )?))
        } else {
            None
        };
        let trend = TrendForecaster::new(self.config.max_degree, self.config.trend_label.clone());

        let mut predictions = Vec::with_capacity(plan.len());
        let (mut trend_count, mut ensemble_count) = (0, 0);
        for (player_id, records, strategy) in plan {
            let forecaster: &dyn Forecaster = match (strategy, &ensemble) {
                (ForecastStrategy::Trend, _) => {
                    trend_count += 1;
                    &trend
                }
                (ForecastStrategy::Ensemble, Some(forecaster)) => {
                    ensemble_count += 1;
                    forecaster
                }
                (ForecastStrategy::Ensemble, None) => {
                    return Err(StatError::ModelNotFound(model_type.to_string()))
                }
            };

            let forecast = forecaster.forecast(&records, target_season).map_err(|e| {
                log::error!(
                    "Prediction for {} ({}) failed: {}",
                    player_id,
                    records[0].full_name(),
                    e
                );
                e
            })?;

            predictions.push(PredictionRecord {
                player_id,
                season: target_season,
                predicted_xwoba: forecast.value,
                rsquared: forecast.score,
                model: forecast.label,
            });
        }

        log::info!(
            "Generated {} predictions for {} (trend: {}, ensemble: {}, stale: {})",
            predictions.len(),
            target_season,
            trend_count,
            ensemble_count,
            stale
        );
        Ok(predictions)
    }
}
