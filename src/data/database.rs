//! SQLite storage for stat history, predictions and model metadata

use crate::training::{EvaluationScores, HyperParameterSet};
use crate::{PlayerId, PredictionRecord, Result, StatError, StatLine, StatRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::HistoryTable;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS stat_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id INTEGER NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                season INTEGER NOT NULL,
                player_age REAL NOT NULL,
                xwoba REAL NOT NULL,
                stats TEXT NOT NULL DEFAULT '{}',
                UNIQUE(player_id, season)
            );

            CREATE TABLE IF NOT EXISTS player_predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id INTEGER NOT NULL,
                season INTEGER NOT NULL,
                predicted_xwoba REAL NOT NULL,
                rsquared REAL,
                model TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ensemble_scores (
                model_type TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                training_score REAL,
                mean_cv_score REAL,
                kfold_cv_score REAL,
                mse REAL,
                rsquared REAL,
                explained_variance REAL
            );

            CREATE TABLE IF NOT EXISTS ensemble_hyperparams (
                model_type TEXT PRIMARY KEY,
                n_estimators INTEGER,
                subsample REAL,
                max_depth INTEGER,
                learning_rate REAL,
                gamma REAL,
                reg_alpha REAL,
                reg_lambda REAL
            );

            CREATE INDEX IF NOT EXISTS idx_stat_records_season ON stat_records(season);
            CREATE INDEX IF NOT EXISTS idx_predictions_season ON player_predictions(season);
            "#,
        )?;
        Ok(())
    }

    // ==================== Stat Records ====================

    /// Insert or update one player-season
    pub fn upsert_stat_record(&self, record: &StatRecord) -> Result<()> {
        Self::upsert_with(&self.conn, record)
    }

    /// Insert or update many player-seasons in one transaction
    pub fn upsert_stat_records(&self, records: &[StatRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for record in records {
            Self::upsert_with(&tx, record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn upsert_with(conn: &Connection, record: &StatRecord) -> Result<()> {
        // NaN would serialise as null and fail to read back
        let finite: StatLine = record
            .stats
            .iter()
            .filter(|(_, v)| v.is_finite())
            .collect();
        let stats_json = serde_json::to_string(&finite)?;

        conn.execute(
            r#"
            INSERT INTO stat_records (player_id, first_name, last_name, season,
                                      player_age, xwoba, stats)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(player_id, season) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                player_age = excluded.player_age,
                xwoba = excluded.xwoba,
                stats = excluded.stats
            "#,
            params![
                record.player_id.0,
                record.first_name,
                record.last_name,
                record.season,
                record.player_age,
                record.xwoba,
                stats_json,
            ],
        )?;
        Ok(())
    }

    /// All stat records for seasons `start..=end`, ordered by player then season
    pub fn get_history(&self, start_season: i32, end_season: i32) -> Result<HistoryTable> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id, first_name, last_name, season, player_age, xwoba, stats
             FROM stat_records
             WHERE season >= ?1 AND season <= ?2
             ORDER BY player_id, season",
        )?;

        let rows = stmt
            .query_map(params![start_season, end_season], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let records = rows
            .into_iter()
            .map(|(id, first_name, last_name, season, player_age, xwoba, stats)| {
                Ok(StatRecord {
                    player_id: PlayerId(id),
                    first_name,
                    last_name,
                    season,
                    player_age,
                    stats: serde_json::from_str(&stats)?,
                    xwoba,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Loaded {} stat records for {}..={}",
            records.len(),
            start_season,
            end_season
        );
        HistoryTable::new(start_season, end_season, records)
    }

    // ==================== Predictions ====================

    /// Append a batch of predictions atomically
    pub fn append_predictions(&self, records: &[PredictionRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for record in records {
            Self::insert_prediction(&tx, record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Swap out every stored prediction for `season` with `records` in one transaction
    pub fn replace_predictions(&self, season: i32, records: &[PredictionRecord]) -> Result<usize> {
        self.replace_batch(season, records, None)
    }

    /// `replace_predictions`, also stamping `model_type`'s held-out R² on its rows.
    ///
    /// Fails before touching the table when no scores are stored for the model.
    pub fn replace_predictions_with_ensemble_r2(
        &self,
        season: i32,
        records: &[PredictionRecord],
        model_type: &str,
    ) -> Result<usize> {
        let stored = self.require_scores(model_type)?;
        self.replace_batch(season, records, Some((model_type, stored.scores.r2)))
    }

    fn replace_batch(
        &self,
        season: i32,
        records: &[PredictionRecord],
        ensemble_r2: Option<(&str, f64)>,
    ) -> Result<usize> {
        if let Some(other) = records.iter().find(|r| r.season != season) {
            return Err(StatError::InvalidInput(format!(
                "prediction for season {} in a batch replacing {}",
                other.season, season
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute(
            "DELETE FROM player_predictions WHERE season = ?1",
            params![season],
        )?;
        for record in records {
            Self::insert_prediction(&tx, record)?;
        }
        if let Some((model_type, r2)) = ensemble_r2 {
            Self::set_rsquared(&tx, model_type, season, r2)?;
        }
        tx.commit()?;

        log::info!(
            "Replaced {} predictions for {} with {}",
            removed,
            season,
            records.len()
        );
        Ok(records.len())
    }

    fn insert_prediction(conn: &Connection, record: &PredictionRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO player_predictions (player_id, season, predicted_xwoba, rsquared, model)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.player_id.0,
                record.season,
                record.predicted_xwoba,
                record.rsquared,
                record.model,
            ],
        )?;
        Ok(())
    }

    /// Stored predictions for a season, ordered by player
    pub fn get_predictions(&self, season: i32) -> Result<Vec<PredictionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id, season, predicted_xwoba, rsquared, model
             FROM player_predictions
             WHERE season = ?1
             ORDER BY player_id, id",
        )?;

        let predictions = stmt
            .query_map(params![season], |row| {
                Ok(PredictionRecord {
                    player_id: PlayerId(row.get(0)?),
                    season: row.get(1)?,
                    predicted_xwoba: row.get(2)?,
                    rsquared: row.get(3)?,
                    model: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(predictions)
    }

    /// Copy the model's held-out R² onto its predictions for `season`
    pub fn update_ensemble_rsquared(&self, model_type: &str, season: i32) -> Result<usize> {
        let stored = self.require_scores(model_type)?;
        Self::set_rsquared(&self.conn, model_type, season, stored.scores.r2)
    }

    fn require_scores(&self, model_type: &str) -> Result<StoredScores> {
        self.get_ensemble_scores(model_type)?.ok_or_else(|| {
            StatError::InvalidInput(format!("no scores stored for model '{}'", model_type))
        })
    }

    fn set_rsquared(conn: &Connection, model_type: &str, season: i32, r2: f64) -> Result<usize> {
        let updated = conn.execute(
            "UPDATE player_predictions SET rsquared = ?1 WHERE season = ?2 AND model = ?3",
            params![finite_or_null(r2), season, model_type],
        )?;
        log::info!(
            "Set R² {:.4} on {} '{}' predictions for {}",
            r2,
            updated,
            model_type,
            season
        );
        Ok(updated)
    }

    // ==================== Model Metadata ====================

    /// Store evaluation scores for a model type, replacing earlier ones
    pub fn save_ensemble_scores(&self, model_type: &str, scores: &EvaluationScores) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM ensemble_scores WHERE model_type = ?1",
            params![model_type],
        )?;
        tx.execute(
            r#"
            INSERT INTO ensemble_scores (model_type, created_at, training_score, mean_cv_score,
                                         kfold_cv_score, mse, rsquared, explained_variance)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                model_type,
                Utc::now().to_rfc3339(),
                finite_or_null(scores.training),
                finite_or_null(scores.mean_cv),
                finite_or_null(scores.kfold_cv),
                finite_or_null(scores.mse),
                finite_or_null(scores.r2),
                finite_or_null(scores.explained_variance),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_ensemble_scores(&self, model_type: &str) -> Result<Option<StoredScores>> {
        let row = self
            .conn
            .query_row(
                "SELECT created_at, training_score, mean_cv_score, kfold_cv_score,
                        mse, rsquared, explained_variance
                 FROM ensemble_scores WHERE model_type = ?1",
                params![model_type],
                |row| {
                    let score = |i: usize| -> rusqlite::Result<f64> {
                        Ok(row.get::<_, Option<f64>>(i)?.unwrap_or(f64::NAN))
                    };
                    Ok((
                        row.get::<_, String>(0)?,
                        EvaluationScores {
                            training: score(1)?,
                            mean_cv: score(2)?,
                            kfold_cv: score(3)?,
                            mse: score(4)?,
                            r2: score(5)?,
                            explained_variance: score(6)?,
                        },
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(created_at, scores)| StoredScores {
            model_type: model_type.to_string(),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .ok(),
            scores,
        }))
    }

    /// Store the hyperparameters a model type was trained with, replacing earlier ones
    pub fn save_hyperparams(&self, model_type: &str, hyper_params: &HyperParameterSet) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM ensemble_hyperparams WHERE model_type = ?1",
            params![model_type],
        )?;
        tx.execute(
            r#"
            INSERT INTO ensemble_hyperparams (model_type, n_estimators, subsample, max_depth,
                                              learning_rate, gamma, reg_alpha, reg_lambda)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                model_type,
                hyper_params.n_estimators.map(|n| n as i64),
                hyper_params.subsample,
                hyper_params.max_depth.map(|d| d as i64),
                hyper_params.learning_rate,
                hyper_params.gamma,
                hyper_params.reg_alpha,
                hyper_params.reg_lambda,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_hyperparams(&self, model_type: &str) -> Result<Option<HyperParameterSet>> {
        let params = self
            .conn
            .query_row(
                "SELECT n_estimators, subsample, max_depth, learning_rate, gamma,
                        reg_alpha, reg_lambda
                 FROM ensemble_hyperparams WHERE model_type = ?1",
                params![model_type],
                |row| {
                    Ok(HyperParameterSet {
                        n_estimators: row.get::<_, Option<i64>>(0)?.map(|n| n as usize),
                        subsample: row.get(1)?,
                        max_depth: row.get::<_, Option<i64>>(2)?.map(|d| d as usize),
                        learning_rate: row.get(3)?,
                        gamma: row.get(4)?,
                        reg_alpha: row.get(5)?,
                        reg_lambda: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(params)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let record_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM stat_records", [], |row| row.get(0))?;

        let player_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT player_id) FROM stat_records",
            [],
            |row| row.get(0),
        )?;

        let (earliest_season, latest_season): (Option<i32>, Option<i32>) = self.conn.query_row(
            "SELECT MIN(season), MAX(season) FROM stat_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let prediction_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM player_predictions", [], |row| {
                    row.get(0)
                })?;

        Ok(DatabaseStats {
            record_count: record_count as usize,
            player_count: player_count as usize,
            earliest_season,
            latest_season,
            prediction_count: prediction_count as usize,
        })
    }
}

/// SQLite stores NaN as NULL anyway; be explicit about it
fn finite_or_null(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Evaluation scores as persisted for a model type
#[derive(Debug, Clone)]
pub struct StoredScores {
    pub model_type: String,
    pub created_at: Option<DateTime<Utc>>,
    pub scores: EvaluationScores,
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub record_count: usize,
    pub player_count: usize,
    pub earliest_season: Option<i32>,
    pub latest_season: Option<i32>,
    pub prediction_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::history::make_record;

    fn prediction(player: i64, season: i32, model: &str) -> PredictionRecord {
        PredictionRecord {
            player_id: PlayerId(player),
            season,
            predicted_xwoba: 0.33,
            rsquared: None,
            model: model.to_string(),
        }
    }

    fn scores(r2: f64) -> EvaluationScores {
        EvaluationScores {
            training: 0.9,
            mean_cv: f64::NAN,
            kfold_cv: 0.7,
            mse: 0.0004,
            r2,
            explained_variance: 0.8,
        }
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.record_count, 0);
        assert_eq!(stats.player_count, 0);
        assert_eq!(stats.earliest_season, None);
    }

    #[test]
    fn test_upsert_and_history() {
        let db = Database::in_memory().unwrap();
        let records = vec![
            make_record(1, 2019, 25.0, 0.31),
            make_record(1, 2020, 26.0, 0.32),
            make_record(2, 2014, 30.0, 0.29),
        ];
        assert_eq!(db.upsert_stat_records(&records).unwrap(), 3);

        // Same player-season replaces
        let mut updated = make_record(1, 2020, 26.0, 0.35);
        updated.first_name = "Changed".to_string();
        db.upsert_stat_record(&updated).unwrap();

        let history = db.get_history(2015, 2020).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[1].xwoba, 0.35);
        assert_eq!(history.records()[1].first_name, "Changed");
        assert_eq!(history.records()[0].stats, records[0].stats);

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.record_count, 3);
        assert_eq!(stats.player_count, 2);
        assert_eq!(stats.earliest_season, Some(2014));
        assert_eq!(stats.latest_season, Some(2020));
    }

    #[test]
    fn test_replace_predictions_only_touches_season() {
        let db = Database::in_memory().unwrap();
        db.append_predictions(&[prediction(1, 2020, "xgb"), prediction(2, 2021, "xgb")])
            .unwrap();

        db.replace_predictions(2021, &[prediction(3, 2021, "polynomial"), prediction(4, 2021, "xgb")])
            .unwrap();

        let current = db.get_predictions(2021).unwrap();
        assert_eq!(current.len(), 2);
        assert_eq!(current[0].player_id, PlayerId(3));
        assert_eq!(db.get_predictions(2020).unwrap().len(), 1);
    }

    #[test]
    fn test_replace_rejects_mixed_seasons() {
        let db = Database::in_memory().unwrap();
        db.append_predictions(&[prediction(1, 2021, "xgb")]).unwrap();

        assert!(matches!(
            db.replace_predictions(2021, &[prediction(2, 2022, "xgb")]),
            Err(StatError::InvalidInput(_))
        ));
        // Nothing deleted
        assert_eq!(db.get_predictions(2021).unwrap().len(), 1);
    }

    #[test]
    fn test_scores_replace_and_nan() {
        let db = Database::in_memory().unwrap();
        assert!(db.get_ensemble_scores("xgb").unwrap().is_none());

        db.save_ensemble_scores("xgb", &scores(0.5)).unwrap();
        db.save_ensemble_scores("xgb", &scores(0.6)).unwrap();

        let stored = db.get_ensemble_scores("xgb").unwrap().unwrap();
        assert_eq!(stored.scores.r2, 0.6);
        assert!(stored.scores.mean_cv.is_nan());
        assert!(stored.created_at.is_some());
    }

    #[test]
    fn test_hyperparams_roundtrip() {
        let db = Database::in_memory().unwrap();
        let params = HyperParameterSet {
            n_estimators: Some(200),
            reg_lambda: Some(2.5),
            ..HyperParameterSet::default()
        };
        db.save_hyperparams("xgb", &params).unwrap();

        assert_eq!(db.get_hyperparams("xgb").unwrap(), Some(params));
        assert_eq!(db.get_hyperparams("other").unwrap(), None);
    }

    #[test]
    fn test_replace_with_r2_without_scores_keeps_old_batch() {
        let db = Database::in_memory().unwrap();
        db.append_predictions(&[prediction(1, 2021, "xgb")]).unwrap();

        assert!(matches!(
            db.replace_predictions_with_ensemble_r2(
                2021,
                &[prediction(2, 2021, "xgb"), prediction(3, 2021, "polynomial")],
                "xgb"
            ),
            Err(StatError::InvalidInput(_))
        ));
        let kept = db.get_predictions(2021).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].player_id, PlayerId(1));

        db.save_ensemble_scores("xgb", &scores(0.42)).unwrap();
        db.replace_predictions_with_ensemble_r2(
            2021,
            &[prediction(2, 2021, "xgb"), prediction(3, 2021, "polynomial")],
            "xgb",
        )
        .unwrap();

        let replaced = db.get_predictions(2021).unwrap();
        assert_eq!(replaced.len(), 2);
        assert_eq!(replaced[0].rsquared, Some(0.42));
        assert_eq!(replaced[1].rsquared, None);
    }

    #[test]
    fn test_update_ensemble_rsquared() {
        let db = Database::in_memory().unwrap();
        db.append_predictions(&[
            prediction(1, 2021, "xgb"),
            prediction(2, 2021, "polynomial"),
            prediction(3, 2020, "xgb"),
        ])
        .unwrap();

        assert!(db.update_ensemble_rsquared("xgb", 2021).is_err());

        db.save_ensemble_scores("xgb", &scores(0.42)).unwrap();
        assert_eq!(db.update_ensemble_rsquared("xgb", 2021).unwrap(), 1);

        let predictions = db.get_predictions(2021).unwrap();
        assert_eq!(predictions[0].rsquared, Some(0.42));
        assert_eq!(predictions[1].rsquared, None);
        assert_eq!(db.get_predictions(2020).unwrap()[0].rsquared, None);
    }
}
