//! Store-level advisory lock for consolidation runs.
//!
//! A single-row table (`id = 1`) holds the current run id. Acquisition is an
//! `INSERT OR IGNORE`: whichever run inserts the row owns the lock, and the
//! single-writer pool makes the insert race-free across processes sharing
//! the database file.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use engram_core::repository::lock::ConsolidationLock;
use engram_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime_lossy};

/// SQLite-backed implementation of `ConsolidationLock`.
pub struct SqliteConsolidationLock {
    pool: DatabasePool,
}

impl SqliteConsolidationLock {
    /// Create a new lock backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl ConsolidationLock for SqliteConsolidationLock {
    async fn try_acquire(&self, run_id: Uuid, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO consolidation_lock (id, run_id, acquired_at) VALUES (1, ?, ?)",
        )
        .bind(run_id.to_string())
        .bind(format_datetime(&at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, run_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM consolidation_lock WHERE id = 1 AND run_id = ?")
            .bind(run_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn holder(&self) -> Result<Option<(Uuid, DateTime<Utc>)>, RepositoryError> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT run_id, acquired_at FROM consolidation_lock WHERE id = 1")
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            None => Ok(None),
            Some((run_id, acquired_at)) => {
                let run_id = Uuid::parse_str(&run_id)
                    .map_err(|e| RepositoryError::Query(format!("invalid run_id: {e}")))?;
                Ok(Some((
                    run_id,
                    parse_datetime_lossy(acquired_at).unwrap_or_default(),
                )))
            }
        }
    }

    async fn force_release(&self) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM consolidation_lock WHERE id = 1")
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }
}
