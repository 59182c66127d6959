//! Gradient-boosted regression trees
//!
//! Squared-error boosting in the style of XGBoost: each round fits a tree to the
//! gradients of the current ensemble, optionally on a row subsample.

use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::tree::{GradientTable, RegressionTree};
use crate::{Result, StatError};

/// Fully resolved booster settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_estimators: usize,
    /// Fraction of rows sampled (without replacement) per tree
    pub subsample: f64,
    pub max_depth: usize,
    /// Shrinkage applied to every leaf weight
    pub learning_rate: f64,
    /// Minimum loss reduction required to split
    pub gamma: f64,
    /// L1 penalty on leaf weights
    pub reg_alpha: f64,
    /// L2 penalty on leaf weights
    pub reg_lambda: f64,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        BoosterParams {
            n_estimators: 100,
            subsample: 1.0,
            max_depth: 6,
            learning_rate: 0.3,
            gamma: 0.0,
            reg_alpha: 0.0,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

/// Trained ensemble model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    base_score: f64,
    n_features: usize,
    params: BoosterParams,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedRegressor {
    /// Fit on row-major `features` against `targets`.
    pub fn fit<R: Rng + ?Sized>(
        features: &[Vec<f64>],
        targets: &[f64],
        params: &BoosterParams,
        rng: &mut R,
    ) -> Result<Self> {
        let n = features.len();
        if n == 0 || n != targets.len() {
            return Err(StatError::Training(format!(
                "need matching non-empty features and targets (got {} rows, {} targets)",
                n,
                targets.len()
            )));
        }
        let n_features = features[0].len();
        if features.iter().any(|row| row.len() != n_features) {
            return Err(StatError::Training("ragged feature rows".to_string()));
        }

        let base_score = targets.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base_score; n];
        let hess = vec![1.0; n];
        let sample_size = ((params.subsample * n as f64).ceil() as usize).clamp(1, n);

        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let grad: Vec<f64> = predictions
                .iter()
                .zip(targets)
                .map(|(p, y)| p - y)
                .collect();

            let rows: Vec<usize> = if sample_size < n {
                let mut rows = sample(rng, n, sample_size).into_vec();
                rows.sort_unstable();
                rows
            } else {
                (0..n).collect()
            };

            let table = GradientTable {
                features,
                grad: &grad,
                hess: &hess,
            };
            let tree = RegressionTree::grow(&table, &rows, params);
            log::trace!(
                "Tree {}: {} leaves, depth {}",
                trees.len(),
                tree.leaf_count(),
                tree.depth()
            );

            for (pred, row) in predictions.iter_mut().zip(features) {
                *pred += tree.predict(row);
            }
            trees.push(tree);
        }

        log::debug!(
            "Fitted {} trees on {} rows x {} features (base score {:.4})",
            trees.len(),
            n,
            n_features,
            base_score
        );

        Ok(GradientBoostedRegressor {
            base_score,
            n_features,
            params: params.clone(),
            trees,
        })
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(sample)).sum::<f64>()
    }

    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Vec<f64> {
        samples.iter().map(|s| self.predict(s)).collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let targets = features.iter().map(|r| 2.0 * r[0] + 1.0).collect();
        (features, targets)
    }

    #[test]
    fn test_fits_training_data() {
        let (features, targets) = linear_data(40);
        let mut rng = StdRng::seed_from_u64(1);
        let model =
            GradientBoostedRegressor::fit(&features, &targets, &BoosterParams::default(), &mut rng)
                .unwrap();

        assert_eq!(model.n_trees(), 100);
        assert_eq!(model.n_features(), 2);
        for (row, y) in features.iter().zip(&targets) {
            assert!((model.predict(row) - y).abs() < 1.0);
        }
    }

    #[test]
    fn test_zero_rounds_predicts_mean() {
        let (features, targets) = linear_data(10);
        let params = BoosterParams {
            n_estimators: 0,
            ..BoosterParams::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let model = GradientBoostedRegressor::fit(&features, &targets, &params, &mut rng).unwrap();

        let mean = targets.iter().sum::<f64>() / targets.len() as f64;
        assert_eq!(model.predict(&[100.0, 0.0]), mean);
    }

    #[test]
    fn test_subsample_is_seed_deterministic() {
        let (features, targets) = linear_data(30);
        let params = BoosterParams {
            n_estimators: 20,
            subsample: 0.5,
            ..BoosterParams::default()
        };

        let a = GradientBoostedRegressor::fit(&features, &targets, &params, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = GradientBoostedRegressor::fit(&features, &targets, &params, &mut StdRng::seed_from_u64(9))
            .unwrap();

        assert_eq!(a.predict_batch(&features), b.predict_batch(&features));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = BoosterParams::default();

        assert!(GradientBoostedRegressor::fit(&[], &[], &params, &mut rng).is_err());
        assert!(GradientBoostedRegressor::fit(&[vec![1.0]], &[1.0, 2.0], &params, &mut rng).is_err());
        assert!(GradientBoostedRegressor::fit(
            &[vec![1.0], vec![1.0, 2.0]],
            &[1.0, 2.0],
            &params,
            &mut rng
        )
        .is_err());
    }

    #[test]
    fn test_serde_roundtrip_preserves_predictions() {
        let (features, targets) = linear_data(20);
        let mut rng = StdRng::seed_from_u64(3);
        let params = BoosterParams {
            n_estimators: 10,
            ..BoosterParams::default()
        };
        let model = GradientBoostedRegressor::fit(&features, &targets, &params, &mut rng).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let restored: GradientBoostedRegressor = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.n_trees(), 10);
        assert_eq!(restored.params().max_depth, model.params().max_depth);
        for row in &features {
            assert!((restored.predict(row) - model.predict(row)).abs() < 1e-9);
        }
    }
}
