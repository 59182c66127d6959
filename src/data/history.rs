//! Season-scoped history tables

use std::collections::BTreeMap;

use crate::{PlayerId, Result, StatError, StatRecord};

/// Stat records for an inclusive season range, read-only for a prediction run
#[derive(Debug, Clone)]
pub struct HistoryTable {
    start_season: i32,
    end_season: i32,
    records: Vec<StatRecord>,
}

impl HistoryTable {
    /// Build a table for `[start_season, end_season]`; rows outside the range are dropped.
    pub fn new(start_season: i32, end_season: i32, records: Vec<StatRecord>) -> Result<Self> {
        if start_season > end_season {
            return Err(StatError::InvalidInput(format!(
                "season range {}..={} is empty",
                start_season, end_season
            )));
        }

        let total = records.len();
        let records: Vec<StatRecord> = records
            .into_iter()
            .filter(|r| (start_season..=end_season).contains(&r.season))
            .collect();
        if records.len() < total {
            log::debug!(
                "Dropped {} records outside {}..={}",
                total - records.len(),
                start_season,
                end_season
            );
        }

        Ok(HistoryTable {
            start_season,
            end_season,
            records,
        })
    }

    pub fn season_range(&self) -> (i32, i32) {
        (self.start_season, self.end_season)
    }

    pub fn records(&self) -> &[StatRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records grouped per player, each group sorted by season
    pub fn by_player(&self) -> BTreeMap<PlayerId, Vec<&StatRecord>> {
        let mut groups: BTreeMap<PlayerId, Vec<&StatRecord>> = BTreeMap::new();
        for record in &self.records {
            groups.entry(record.player_id).or_default().push(record);
        }
        for group in groups.values_mut() {
            group.sort_by_key(|r| r.season);
        }
        groups
    }

    pub fn player_count(&self) -> usize {
        self.by_player().len()
    }
}

#[cfg(test)]
pub(crate) fn make_record(player: i64, season: i32, age: f64, xwoba: f64) -> StatRecord {
    use crate::features::encoding::sample_line;

    let mut stats = sample_line(age);
    stats.remove(crate::features::AGE_FIELD);
    StatRecord {
        player_id: PlayerId(player),
        first_name: "Test".to_string(),
        last_name: format!("Player{}", player),
        season,
        player_age: age,
        stats,
        xwoba,
    }
}
