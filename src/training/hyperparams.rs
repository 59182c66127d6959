//! Caller-supplied training knobs

use serde::{Deserialize, Serialize};

use crate::model::BoosterParams;
use crate::{Result, StatError};

/// Hyperparameters for one ensemble training run.
///
/// Absent values fall back to the booster's own defaults and nothing else is
/// substituted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperParameterSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_estimators: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsample: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reg_alpha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reg_lambda: Option<f64>,
}

impl HyperParameterSet {
    /// Fill gaps from `other` (values already set here win)
    pub fn or(self, other: &HyperParameterSet) -> Self {
        HyperParameterSet {
            n_estimators: self.n_estimators.or(other.n_estimators),
            subsample: self.subsample.or(other.subsample),
            max_depth: self.max_depth.or(other.max_depth),
            learning_rate: self.learning_rate.or(other.learning_rate),
            gamma: self.gamma.or(other.gamma),
            reg_alpha: self.reg_alpha.or(other.reg_alpha),
            reg_lambda: self.reg_lambda.or(other.reg_lambda),
        }
    }

    /// Resolve into booster settings, validating ranges.
    pub fn resolve(&self) -> Result<BoosterParams> {
        let defaults = BoosterParams::default();
        let params = BoosterParams {
            n_estimators: self.n_estimators.unwrap_or(defaults.n_estimators),
            subsample: self.subsample.unwrap_or(defaults.subsample),
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            gamma: self.gamma.unwrap_or(defaults.gamma),
            reg_alpha: self.reg_alpha.unwrap_or(defaults.reg_alpha),
            reg_lambda: self.reg_lambda.unwrap_or(defaults.reg_lambda),
            min_child_weight: defaults.min_child_weight,
        };

        if params.n_estimators == 0 {
            return Err(invalid("n_estimators must be at least 1"));
        }
        if !(params.subsample > 0.0 && params.subsample <= 1.0) {
            return Err(invalid("subsample must be in (0, 1]"));
        }
        if params.max_depth == 0 {
            return Err(invalid("max_depth must be at least 1"));
        }
        if !(params.learning_rate > 0.0 && params.learning_rate.is_finite()) {
            return Err(invalid("learning_rate must be positive"));
        }
        for (name, value) in [
            ("gamma", params.gamma),
            ("reg_alpha", params.reg_alpha),
            ("reg_lambda", params.reg_lambda),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(invalid(&format!("{} must be non-negative", name)));
            }
        }

        Ok(params)
    }

    /// Name/value pairs for the set fields, in a stable order
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        [
            ("n_estimators", self.n_estimators.map(|v| v as f64)),
            ("subsample", self.subsample),
            ("max_depth", self.max_depth.map(|v| v as f64)),
            ("learning_rate", self.learning_rate),
            ("gamma", self.gamma),
            ("reg_alpha", self.reg_alpha),
            ("reg_lambda", self.reg_lambda),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

fn invalid(message: &str) -> StatError {
    StatError::Training(format!("invalid hyperparameter: {}", message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_resolves_to_defaults() {
        let params = HyperParameterSet::default().resolve().unwrap();
        assert_eq!(params, BoosterParams::default());
    }

    #[test]
    fn test_supplied_values_used_exactly() {
        let set = HyperParameterSet {
            n_estimators: Some(500),
            subsample: Some(0.8),
            max_depth: Some(4),
            learning_rate: Some(0.05),
            gamma: Some(0.1),
            reg_alpha: Some(0.01),
            reg_lambda: Some(2.0),
        };
        let params = set.resolve().unwrap();

        assert_eq!(params.n_estimators, 500);
        assert_eq!(params.subsample, 0.8);
        assert_eq!(params.max_depth, 4);
        assert_eq!(params.learning_rate, 0.05);
        assert_eq!(params.gamma, 0.1);
        assert_eq!(params.reg_alpha, 0.01);
        assert_eq!(params.reg_lambda, 2.0);
        assert_eq!(set.entries().len(), 7);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            HyperParameterSet { n_estimators: Some(0), ..Default::default() },
            HyperParameterSet { subsample: Some(0.0), ..Default::default() },
            HyperParameterSet { subsample: Some(1.5), ..Default::default() },
            HyperParameterSet { max_depth: Some(0), ..Default::default() },
            HyperParameterSet { learning_rate: Some(-0.1), ..Default::default() },
            HyperParameterSet { gamma: Some(f64::NAN), ..Default::default() },
            HyperParameterSet { reg_lambda: Some(-1.0), ..Default::default() },
        ];
        for set in cases {
            assert!(matches!(set.resolve(), Err(StatError::Training(_))), "{:?}", set);
        }
    }

    #[test]
    fn test_or_prefers_own_values() {
        let cli = HyperParameterSet { max_depth: Some(3), ..Default::default() };
        let config = HyperParameterSet {
            max_depth: Some(8),
            n_estimators: Some(200),
            ..Default::default()
        };
        let merged = cli.or(&config);
        assert_eq!(merged.max_depth, Some(3));
        assert_eq!(merged.n_estimators, Some(200));
        assert_eq!(merged.gamma, None);
    }
}
