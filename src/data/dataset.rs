//! Training tables for the ensemble model
//!
//! Every stat record becomes one encoded feature row with its xwOBA as target.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::features::{encode, FeatureVector, FEATURE_FIELDS};
use crate::{Result, StatError, StatRecord};

/// Feature rows plus targets
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    features: Vec<FeatureVector>,
    targets: Vec<f64>,
}

impl TrainingSet {
    pub fn new(features: Vec<FeatureVector>, targets: Vec<f64>) -> Result<Self> {
        if features.len() != targets.len() {
            return Err(StatError::Training(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if let Some(width) = features.first().map(Vec::len) {
            if features.iter().any(|row| row.len() != width) {
                return Err(StatError::Training("ragged feature rows".to_string()));
            }
        }
        Ok(TrainingSet { features, targets })
    }

    /// Encode records with each row's own age.
    ///
    /// # Errors
    /// `MissingField` if any record lacks a feature column.
    pub fn from_records(records: &[StatRecord]) -> Result<Self> {
        let features = records
            .iter()
            .map(|r| encode(&r.feature_line(), None))
            .collect::<Result<Vec<_>>>()?;
        let targets = records.iter().map(|r| r.xwoba).collect();
        Self::new(features, targets)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Check the table can support a training run.
    ///
    /// Needs at least two distinct feature rows, and every column must hold at
    /// least one finite value.
    pub fn validate(&self) -> Result<()> {
        let distinct: HashSet<Vec<u64>> = self
            .features
            .iter()
            .map(|row| row.iter().map(|v| v.to_bits()).collect())
            .collect();
        if distinct.len() < 2 {
            return Err(StatError::Training(format!(
                "need at least 2 distinct feature rows, found {}",
                distinct.len()
            )));
        }

        let width = self.features[0].len();
        for col in 0..width {
            if !self.features.iter().any(|row| row[col].is_finite()) {
                let name = FEATURE_FIELDS.get(col).copied().unwrap_or("unnamed");
                return Err(StatError::Training(format!(
                    "feature column {} ({}) has no numeric values",
                    col, name
                )));
            }
        }

        if !self.targets.iter().all(|t| t.is_finite()) {
            return Err(StatError::Training("target contains non-numeric values".to_string()));
        }

        Ok(())
    }

    /// Rows at the given indices, in index order
    pub fn subset(&self, indices: &[usize]) -> TrainingSet {
        TrainingSet {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Random unstratified split into `(train, test)`.
    ///
    /// The test side gets `ceil(test_fraction * n)` rows, kept between 1 and
    /// `n - 1` whenever there are at least two rows.
    pub fn train_test_split<R: Rng + ?Sized>(
        &self,
        test_fraction: f64,
        rng: &mut R,
    ) -> (TrainingSet, TrainingSet) {
        let n = self.len();
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);

        let mut n_test = (test_fraction * n as f64).ceil() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        } else {
            n_test = 0;
        }

        let (test_idx, train_idx) = indices.split_at(n_test);
        log::info!(
            "Split {} rows: train={}, test={}",
            n,
            train_idx.len(),
            test_idx.len()
        );

        (self.subset(train_idx), self.subset(test_idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::history::make_record;
    use crate::features::FEATURE_DIM;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table(n: usize) -> TrainingSet {
        let records: Vec<StatRecord> = (0..n)
            .map(|i| make_record(i as i64, 2018, 22.0 + i as f64, 0.300 + i as f64 / 100.0))
            .collect();
        TrainingSet::from_records(&records).unwrap()
    }

    #[test]
    fn test_from_records_encodes_rows() {
        let set = table(3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.features()[0].len(), FEATURE_DIM);
        assert_eq!(set.features()[2][0], 24.0);
        assert!((set.targets()[1] - 0.31).abs() < 1e-12);
    }

    #[test]
    fn test_missing_field_propagates() {
        let mut record = make_record(1, 2018, 25.0, 0.3);
        record.stats.remove("b_walk");
        assert!(matches!(
            TrainingSet::from_records(&[record]),
            Err(StatError::MissingField(f)) if f == "b_walk"
        ));
    }

    #[test]
    fn test_validate_needs_two_distinct_rows() {
        assert!(matches!(table(1).validate(), Err(StatError::Training(_))));

        let row = vec![1.0, 2.0];
        let dupes = TrainingSet::new(vec![row.clone(), row], vec![0.3, 0.4]).unwrap();
        assert!(matches!(dupes.validate(), Err(StatError::Training(_))));

        assert!(table(2).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_numeric_column() {
        let set = TrainingSet::new(
            vec![vec![1.0, f64::NAN], vec![2.0, f64::NAN]],
            vec![0.3, 0.4],
        )
        .unwrap();
        assert!(matches!(set.validate(), Err(StatError::Training(_))));
    }

    #[test]
    fn test_shape_mismatch() {
        assert!(TrainingSet::new(vec![vec![1.0]], vec![]).is_err());
        assert!(TrainingSet::new(vec![vec![1.0], vec![1.0, 2.0]], vec![0.1, 0.2]).is_err());
    }

    #[test]
    fn test_split_sizes() {
        let set = table(10);
        let mut rng = StdRng::seed_from_u64(7);
        let (train, test) = set.train_test_split(0.2, &mut rng);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        // Rounds the test side up
        let (train, test) = table(11).train_test_split(0.2, &mut rng);
        assert_eq!((train.len(), test.len()), (8, 3));

        let (train, test) = table(2).train_test_split(0.2, &mut rng);
        assert_eq!((train.len(), test.len()), (1, 1));
    }

    #[test]
    fn test_split_is_a_partition() {
        let set = table(20);
        let mut rng = StdRng::seed_from_u64(11);
        let (train, test) = set.train_test_split(0.2, &mut rng);

        let mut ages: Vec<f64> = train
            .features()
            .iter()
            .chain(test.features())
            .map(|row| row[0])
            .collect();
        ages.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expected: Vec<f64> = (0..20).map(|i| 22.0 + i as f64).collect();
        assert_eq!(ages, expected);
    }
}
