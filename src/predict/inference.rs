//! Ensemble model inference

use crate::data::ModelStore;
use crate::features::encode;
use crate::model::GradientBoostedRegressor;
use crate::{PredictionRecord, Result, StatError, StatLine};

/// A loaded ensemble model ready to score feature vectors
pub struct EnsemblePredictor {
    model_type: String,
    model: GradientBoostedRegressor,
}

impl EnsemblePredictor {
    pub fn new(model_type: impl Into<String>, model: GradientBoostedRegressor) -> Self {
        EnsemblePredictor {
            model_type: model_type.into(),
            model,
        }
    }

    /// Load the model stored under `model_type`
    pub fn load(store: &dyn ModelStore, model_type: &str) -> Result<Self> {
        let model = store.load(model_type)?;
        log::debug!(
            "Loaded ensemble '{}' ({} trees, {} features)",
            model_type,
            model.n_trees(),
            model.n_features()
        );
        Ok(Self::new(model_type, model))
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    /// Predict from an already encoded vector
    pub fn predict_features(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.model.n_features() {
            return Err(StatError::InvalidInput(format!(
                "model '{}' expects {} features, got {}",
                self.model_type,
                self.model.n_features(),
                features.len()
            )));
        }
        Ok(self.model.predict(features))
    }

    /// Encode a stat line (optionally with a projected age) and predict
    pub fn predict_stats(&self, stats: &StatLine, override_age: Option<f64>) -> Result<f64> {
        let features = encode(stats, override_age)?;
        self.predict_features(&features)
    }
}

/// Human-readable line for a prediction
pub fn format_prediction(record: &PredictionRecord) -> String {
    let quality = match record.rsquared {
        Some(r2) => format!("R² {:.3}", r2),
        None => "R² -".to_string(),
    };
    format!(
        "{:>10}  {}  xwOBA {:.3}  {:<8}  {}",
        record.player_id.0, record.season, record.predicted_xwoba, quality, record.model
    )
}
