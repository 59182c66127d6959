//! Ensemble training
//!
//! Hyperparameters, cross-validation, and evaluation metrics for the boosted model.

pub mod cross_val;
pub mod hyperparams;
pub mod metrics;
pub mod trainer;

pub use cross_val::{cross_val_score, KFold};
pub use hyperparams::HyperParameterSet;
pub use metrics::EvaluationScores;
pub use trainer::EnsembleTrainer;
