//! K-fold cross-validation

use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::TrainingSet;
use crate::model::{BoosterParams, GradientBoostedRegressor};
use crate::Result;

use super::metrics::{mean, r2_score};

/// Fold layout for k-fold cross-validation
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        KFold {
            n_splits,
            shuffle: false,
        }
    }

    pub fn shuffled(n_splits: usize) -> Self {
        KFold {
            n_splits,
            shuffle: true,
        }
    }

    /// `(train, test)` index pairs over `n` rows.
    ///
    /// Folds are contiguous blocks of the (optionally shuffled) row order; the first
    /// `n % k` folds take one extra row. `k` is capped at `n`, and fewer than two
    /// folds yields no splits.
    pub fn splits<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<(Vec<usize>, Vec<usize>)> {
        let k = self.n_splits.min(n);
        if k < 2 {
            return Vec::new();
        }

        let mut order: Vec<usize> = (0..n).collect();
        if self.shuffle {
            order.shuffle(rng);
        }

        let base = n / k;
        let extra = n % k;
        let mut splits = Vec::with_capacity(k);
        let mut start = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            let test = order[start..start + size].to_vec();
            let train: Vec<usize> = order[..start]
                .iter()
                .chain(&order[start + size..])
                .copied()
                .collect();
            splits.push((train, test));
            start += size;
        }
        splits
    }
}

/// Mean held-out R² of freshly fitted models across the folds.
///
/// NaN when the data is too small to form two folds.
pub fn cross_val_score<R: Rng + ?Sized>(
    data: &TrainingSet,
    params: &BoosterParams,
    folds: KFold,
    rng: &mut R,
) -> Result<f64> {
    let splits = folds.splits(data.len(), rng);
    if splits.is_empty() {
        log::warn!(
            "Too few rows ({}) for {}-fold cross-validation",
            data.len(),
            folds.n_splits
        );
        return Ok(f64::NAN);
    }

    let mut scores = Vec::with_capacity(splits.len());
    for (train_idx, test_idx) in &splits {
        let train = data.subset(train_idx);
        let test = data.subset(test_idx);
        let model = GradientBoostedRegressor::fit(train.features(), train.targets(), params, rng)?;
        let predicted = model.predict_batch(test.features());
        scores.push(r2_score(test.targets(), &predicted));
    }

    log::debug!("CV fold scores: {:?}", scores);
    Ok(mean(&scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_contiguous_folds() {
        let mut rng = StdRng::seed_from_u64(0);
        let splits = KFold::new(3).splits(7, &mut rng);

        assert_eq!(splits.len(), 3);
        assert_eq!(splits[0].1, vec![0, 1, 2]);
        assert_eq!(splits[1].1, vec![3, 4]);
        assert_eq!(splits[2].1, vec![5, 6]);
        assert_eq!(splits[1].0, vec![0, 1, 2, 5, 6]);
    }

    #[test]
    fn test_shuffled_folds_cover_every_row_once() {
        let mut rng = StdRng::seed_from_u64(5);
        let splits = KFold::shuffled(10).splits(25, &mut rng);

        let mut seen: Vec<usize> = splits.iter().flat_map(|(_, test)| test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..25).collect::<Vec<_>>());
        for (train, test) in &splits {
            assert_eq!(train.len() + test.len(), 25);
        }
    }

    #[test]
    fn test_folds_capped_by_rows() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(KFold::new(10).splits(4, &mut rng).len(), 4);
        assert!(KFold::new(10).splits(1, &mut rng).is_empty());
    }

    #[test]
    fn test_cross_val_score_on_tiny_data_is_nan() {
        let data = TrainingSet::new(vec![vec![1.0]], vec![0.3]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let score =
            cross_val_score(&data, &BoosterParams::default(), KFold::new(10), &mut rng).unwrap();
        assert!(score.is_nan());
    }

    #[test]
    fn test_cross_val_score_on_learnable_data() {
        let features: Vec<Vec<f64>> = (0..60).map(|i| vec![(i * 7 % 60) as f64]).collect();
        let targets: Vec<f64> = features.iter().map(|r| r[0] * 0.01).collect();
        let data = TrainingSet::new(features, targets).unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        let score =
            cross_val_score(&data, &BoosterParams::default(), KFold::shuffled(5), &mut rng).unwrap();
        assert!(score > 0.8, "cv score {}", score);
    }
}
