//! Career summaries
//!
//! Collapses a player's season rows into the single averaged stat line the
//! ensemble model is asked about.

use std::collections::BTreeMap;

use crate::{PlayerId, StatLine, StatRecord};

use super::AGE_FIELD;

/// Aggregate view of one player's history
#[derive(Debug, Clone)]
pub struct CareerSummary {
    pub player_id: PlayerId,
    /// Number of seasons on record
    pub seasons: usize,
    /// Most recent season with data
    pub last_season: i32,
    /// Oldest recorded age
    pub max_age: f64,
    /// Mean of the target metric across all seasons
    pub mean_xwoba: f64,
    /// Per-field means (including `player_age`)
    pub averages: StatLine,
}

impl CareerSummary {
    /// Summarise a player's records. Returns `None` for an empty slice.
    ///
    /// Field means skip seasons where the field is absent or not finite.
    pub fn from_records(records: &[&StatRecord]) -> Option<Self> {
        let first = records.first()?;

        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        let mut last_season = first.season;
        let mut max_age = f64::NEG_INFINITY;
        let mut xwoba_sum = 0.0;

        for record in records {
            last_season = last_season.max(record.season);
            max_age = max_age.max(record.player_age);
            xwoba_sum += record.xwoba;

            for (field, value) in record.stats.iter() {
                accumulate(&mut sums, field, value);
            }
            accumulate(&mut sums, AGE_FIELD, record.player_age);
        }

        let averages = sums
            .into_iter()
            .filter(|(_, (_, n))| *n > 0)
            .map(|(field, (sum, n))| (field, sum / n as f64))
            .collect();

        Some(CareerSummary {
            player_id: first.player_id,
            seasons: records.len(),
            last_season,
            max_age,
            mean_xwoba: xwoba_sum / records.len() as f64,
            averages,
        })
    }

    /// Age to use for the season after the last one on record
    pub fn projected_age(&self) -> f64 {
        self.max_age + 1.0
    }

    /// Seasons between the last one on record and `target_season`
    pub fn season_gap(&self, target_season: i32) -> i32 {
        target_season - self.last_season
    }
}

fn accumulate<'a>(sums: &mut BTreeMap<&'a str, (f64, usize)>, field: &'a str, value: f64) {
    let entry = sums.entry(field).or_insert((0.0, 0));
    if value.is_finite() {
        entry.0 += value;
        entry.1 += 1;
    }
}
