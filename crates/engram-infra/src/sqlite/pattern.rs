//! SQLite pattern repository implementation.
//!
//! Write-time dedup on the exact `(pattern_type, data_fingerprint)` pair:
//! first occurrence inserts, every later occurrence updates frequency and
//! the running success-rate average inside one transaction.

use chrono::{DateTime, Utc};
use sqlx::Row;

use engram_core::repository::pattern::PatternRepository;
use engram_types::error::RepositoryError;
use engram_types::record::Pattern;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime_lossy};

/// SQLite-backed implementation of `PatternRepository`.
pub struct SqlitePatternRepository {
    pool: DatabasePool,
}

impl SqlitePatternRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types
// ---------------------------------------------------------------------------

struct PatternRow {
    id: i64,
    pattern_type: String,
    data_fingerprint: String,
    frequency: i64,
    success_rate: f64,
    last_seen_at: Option<String>,
}

impl PatternRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            pattern_type: row.try_get("pattern_type")?,
            data_fingerprint: row.try_get("data_fingerprint")?,
            frequency: row.try_get("frequency")?,
            success_rate: row.try_get("success_rate")?,
            last_seen_at: row.try_get("last_seen_at")?,
        })
    }

    fn into_pattern(self) -> Pattern {
        Pattern {
            id: self.id,
            pattern_type: self.pattern_type,
            data_fingerprint: self.data_fingerprint,
            frequency: self.frequency,
            success_rate: self.success_rate,
            last_seen_at: parse_datetime_lossy(self.last_seen_at).unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// PatternRepository implementation
// ---------------------------------------------------------------------------

impl PatternRepository for SqlitePatternRepository {
    async fn observe(
        &self,
        pattern_type: &str,
        data_fingerprint: &str,
        outcome_success: bool,
        seen_at: DateTime<Utc>,
    ) -> Result<Pattern, RepositoryError> {
        let outcome = if outcome_success { 1.0 } else { 0.0 };

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let existing: Option<(i64, i64, f64)> = sqlx::query_as(
            "SELECT id, frequency, success_rate FROM patterns WHERE pattern_type = ? AND data_fingerprint = ?",
        )
        .bind(pattern_type)
        .bind(data_fingerprint)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let id = match existing {
            Some((id, frequency, success_rate)) => {
                let new_frequency = frequency + 1;
                let new_rate = (success_rate * frequency as f64 + outcome) / new_frequency as f64;
                sqlx::query(
                    "UPDATE patterns SET frequency = ?, success_rate = ?, last_seen_at = ? WHERE id = ?",
                )
                .bind(new_frequency)
                .bind(new_rate)
                .bind(format_datetime(&seen_at))
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
                id
            }
            None => {
                let result = sqlx::query(
                    r#"INSERT INTO patterns (pattern_type, data_fingerprint, frequency, success_rate, last_seen_at)
                       VALUES (?, ?, 1, ?, ?)"#,
                )
                .bind(pattern_type)
                .bind(data_fingerprint)
                .bind(outcome)
                .bind(format_datetime(&seen_at))
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
                result.last_insert_rowid()
            }
        };

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query("SELECT * FROM patterns WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        PatternRow::from_row(&row)
            .map(PatternRow::into_pattern)
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn get(
        &self,
        pattern_type: &str,
        data_fingerprint: &str,
    ) -> Result<Option<Pattern>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM patterns WHERE pattern_type = ? AND data_fingerprint = ?",
        )
        .bind(pattern_type)
        .bind(data_fingerprint)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|r| {
            PatternRow::from_row(&r)
                .map(PatternRow::into_pattern)
                .map_err(|e| RepositoryError::Query(e.to_string()))
        })
        .transpose()
    }

    async fn list(&self, limit: Option<i64>) -> Result<Vec<Pattern>, RepositoryError> {
        let mut sql = String::from("SELECT * FROM patterns ORDER BY frequency DESC, id ASC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut patterns = Vec::with_capacity(rows.len());
        for row in &rows {
            let pattern_row =
                PatternRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            patterns.push(pattern_row.into_pattern());
        }
        Ok(patterns)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM patterns")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.0)
    }
}
