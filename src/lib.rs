//! MLB stat forecasting
//!
//! Per-player xwOBA projections that pick between a polynomial trend fit over a
//! player's own seasons and a gradient-boosted tree model trained on the whole league.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Unique identifier for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// Named numeric stat fields for one row (or an average over several rows)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatLine(pub BTreeMap<String, f64>);

impl StatLine {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.0.get(field).copied()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: f64) {
        self.0.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<f64> {
        self.0.remove(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StatLine {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        StatLine(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// One season of batting data for one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub player_id: PlayerId,
    pub first_name: String,
    pub last_name: String,
    pub season: i32,
    pub player_age: f64,
    /// Batting fields keyed by column name (see `features::FEATURE_FIELDS`)
    pub stats: StatLine,
    /// Target metric
    pub xwoba: f64,
}

impl StatRecord {
    /// Stat line including `player_age`, ready for the feature codec
    pub fn feature_line(&self) -> StatLine {
        let mut line = self.stats.clone();
        line.insert(features::AGE_FIELD, self.player_age);
        line
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Output row of a prediction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub player_id: PlayerId,
    pub season: i32,
    pub predicted_xwoba: f64,
    /// Fit quality, only set by the polynomial path
    pub rsquared: Option<f64>,
    /// Model type name, or the trend label for polynomial fits
    pub model: String,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum StatError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("No trained model for type '{0}' - run `mlbstat train` first")]
    ModelNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StatError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub history: HistoryConfig,
    pub prediction: PredictionConfig,
    pub training: TrainerConfig,
    pub hyperparams: training::HyperParameterSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub model_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// First season loaded for training and prediction
    pub start_season: i32,
    /// Last season used by `mlbstat train` when none is given
    pub training_end_season: i32,
}

/// Strategy-selection thresholds for the prediction orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Players with fewer seasons than this use the ensemble model
    pub min_history: usize,
    /// Players whose last season is more than this many seasons old are skipped
    pub max_season_gap: i32,
    /// Highest polynomial degree tried (degrees start at 1)
    pub max_degree: usize,
    /// Model label written for polynomial predictions
    pub trend_label: String,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            min_history: 3,
            max_season_gap: 2,
            max_degree: 3,
            trend_label: "polynomial".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Fraction of rows held out for testing
    pub test_fraction: f64,
    /// Number of cross-validation folds
    pub cv_folds: usize,
    /// Fixed seed for the split and shuffled folds; entropy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            test_fraction: 0.2,
            cv_folds: 10,
            seed: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                database_path: "data/mlbstats.db".to_string(),
                model_dir: "model".to_string(),
            },
            history: HistoryConfig {
                start_season: 2015,
                training_end_season: 2020,
            },
            prediction: PredictionConfig::default(),
            training: TrainerConfig::default(),
            hyperparams: training::HyperParameterSet::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StatError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| StatError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StatError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
