//! Prediction and inference
//!
//! Per-player strategy selection over a history table, plus single-line
//! inference against a stored ensemble model.

pub mod inference;
pub mod orchestrator;
pub mod strategy;

pub use inference::{format_prediction, EnsemblePredictor};
pub use orchestrator::PredictionOrchestrator;
pub use strategy::{
    select_closest_to_mean, EnsembleForecaster, Forecast, ForecastStrategy, Forecaster,
    TrendForecaster,
};
