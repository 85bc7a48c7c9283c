//! Postgres-backed score store and judge registry.
//!
//! Judges and teams are stored by name. Uniqueness is enforced on the
//! lowercased judge name, so re-scoring a pair overwrites the earlier row.
//! The reconfigured team range lives in the single-row `team_range` table.

use async_trait::async_trait;
use jury_allocator::{Evaluation, JudgeRegistry, ScoreRecord, ScoreStore, StoreError, TeamRange};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::debug;

use super::DbError;

struct ScoreRow(ScoreRecord);

impl<'r> sqlx::FromRow<'r, PgRow> for ScoreRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(ScoreRecord {
            team: row.try_get("team")?,
            judge: row.try_get("judge")?,
            score: row.try_get("score")?,
        }))
    }
}

struct TeamRangeRow {
    start_team: i64,
    end_team: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for TeamRangeRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            start_team: row.try_get("start_team")?,
            end_team: row.try_get("end_team")?,
        })
    }
}

impl TryFrom<TeamRangeRow> for TeamRange {
    type Error = StoreError;

    fn try_from(row: TeamRangeRow) -> Result<Self, Self::Error> {
        let invalid = || {
            StoreError::Rejected(format!(
                "stored team range {}..={} is invalid",
                row.start_team, row.end_team
            ))
        };
        let start = u32::try_from(row.start_team).map_err(|_| invalid())?;
        let end = u32::try_from(row.end_team).map_err(|_| invalid())?;
        TeamRange::new(start, end).map_err(|_| invalid())
    }
}

/// Score store and judge registry over a shared pool.
#[derive(Clone)]
pub struct PgScoreStore {
    pool: PgPool,
}

impl PgScoreStore {
    /// Create a new store handle.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoreStore for PgScoreStore {
    async fn list_scores(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT team, judge, score
            FROM scores
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(rows.into_iter().map(|ScoreRow(record)| record).collect())
    }

    async fn record_score(&self, evaluation: &Evaluation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO scores (judge, judge_key, team, score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (judge_key, team)
            DO UPDATE SET score = EXCLUDED.score, judge = EXCLUDED.judge, updated_at = now()
            "#,
        )
        .bind(evaluation.judge.as_str())
        .bind(evaluation.judge.key())
        .bind(evaluation.team.to_string())
        .bind(evaluation.score)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        debug!(judge = %evaluation.judge, team = %evaluation.team, "Stored score");
        Ok(())
    }

    async fn clear_scores(&self) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM scores")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;

        debug!(deleted = result.rows_affected(), "Cleared scores");
        Ok(())
    }

    async fn load_team_range(&self) -> Result<Option<TeamRange>, StoreError> {
        let row = sqlx::query_as::<_, TeamRangeRow>(
            "SELECT start_team, end_team FROM team_range WHERE singleton",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;

        row.map(TeamRange::try_from).transpose()
    }

    async fn save_team_range(&self, range: TeamRange) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO team_range (singleton, start_team, end_team)
            VALUES (TRUE, $1, $2)
            ON CONFLICT (singleton)
            DO UPDATE SET start_team = EXCLUDED.start_team, end_team = EXCLUDED.end_team, updated_at = now()
            "#,
        )
        .bind(i64::from(range.start()))
        .bind(i64::from(range.end()))
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        debug!(start = range.start(), end = range.end(), "Saved team range");
        Ok(())
    }
}

#[async_trait]
impl JudgeRegistry for PgScoreStore {
    async fn list_judges(&self) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM judges ORDER BY name_key")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(names)
    }

    async fn register_judge(&self, name: &str) -> Result<(), StoreError> {
        let name = name.trim();
        let result = sqlx::query(
            r#"
            INSERT INTO judges (name_key, name)
            VALUES ($1, $2)
            ON CONFLICT (name_key) DO NOTHING
            "#,
        )
        .bind(name.to_lowercase())
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(name.to_string()));
        }
        Ok(())
    }
}
