//! Fixed-order feature encoding for the ensemble model
//!
//! Training rows and prediction inputs both go through [`encode`], so the column
//! order seen by the booster is always the same.

use crate::{Result, StatError, StatLine};

/// Age column, always the first feature
pub const AGE_FIELD: &str = "player_age";

/// Batting columns that must be present in every stat line, in model order
pub const STAT_FIELDS: [&str; 23] = [
    "b_ab",
    "b_total_pa",
    "b_total_hits",
    "b_single",
    "b_double",
    "b_triple",
    "b_home_run",
    "b_strikeout",
    "b_walk",
    "b_k_percent",
    "b_bb_percent",
    "batting_avg",
    "slg_percent",
    "on_base_percent",
    "on_base_plus_slg",
    "isolated_power",
    "b_rbi",
    "b_total_bases",
    "b_ab_scoring",
    "b_game",
    "b_hit_line_drive",
    "b_hit_popup",
    "b_played_dh",
];

/// Number of values in an encoded vector
pub const FEATURE_DIM: usize = STAT_FIELDS.len() + 1;

/// All feature names in encoded order
pub const FEATURE_FIELDS: [&str; FEATURE_DIM] = [
    AGE_FIELD,
    "b_ab",
    "b_total_pa",
    "b_total_hits",
    "b_single",
    "b_double",
    "b_triple",
    "b_home_run",
    "b_strikeout",
    "b_walk",
    "b_k_percent",
    "b_bb_percent",
    "batting_avg",
    "slg_percent",
    "on_base_percent",
    "on_base_plus_slg",
    "isolated_power",
    "b_rbi",
    "b_total_bases",
    "b_ab_scoring",
    "b_game",
    "b_hit_line_drive",
    "b_hit_popup",
    "b_played_dh",
];

pub type FeatureVector = Vec<f64>;

/// Encode a stat line into the model's feature order.
///
/// When `override_age` is given it replaces `player_age`, which then need not be
/// present in `stats`. Used when projecting a player into a season not yet played.
///
/// # Errors
/// `MissingField` naming the first absent key.
pub fn encode(stats: &StatLine, override_age: Option<f64>) -> Result<FeatureVector> {
    let age = match override_age {
        Some(age) => age,
        None => required(stats, AGE_FIELD)?,
    };

    let mut features = Vec::with_capacity(FEATURE_DIM);
    features.push(age);
    for field in STAT_FIELDS {
        features.push(required(stats, field)?);
    }

    Ok(features)
}

fn required(stats: &StatLine, field: &str) -> Result<f64> {
    stats
        .get(field)
        .ok_or_else(|| StatError::MissingField(field.to_string()))
}

#[cfg(test)]
pub(crate) fn sample_line(age: f64) -> StatLine {
    let mut line: StatLine = STAT_FIELDS
        .iter()
        .enumerate()
        .map(|(i, field)| (*field, i as f64 + 1.0))
        .collect();
    line.insert(AGE_FIELD, age);
    line
}
