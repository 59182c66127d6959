//! Model definitions
//!
//! Per-player polynomial trends and the league-wide boosted tree ensemble.

pub mod gbdt;
pub mod polynomial;
pub mod tree;

pub use gbdt::{BoosterParams, GradientBoostedRegressor};
pub use polynomial::{fit_and_predict, PolynomialTrend, TrendFit};
pub use tree::RegressionTree;
