//! SQLite merge-audit log (read side).
//!
//! Audit rows are inserted by `SqliteKnowledgeRepository::apply_merge`
//! inside the merge transaction; this repository only queries them.

use sqlx::Row;
use uuid::Uuid;

use engram_core::repository::audit::MergeAuditRepository;
use engram_types::error::RepositoryError;
use engram_types::record::{KnowledgeItem, MergeAuditEntry, MergeStrategy};

use super::parse_datetime_lossy;
use super::pool::DatabasePool;

/// SQLite-backed implementation of `MergeAuditRepository`.
pub struct SqliteMergeAuditRepository {
    pool: DatabasePool,
}

impl SqliteMergeAuditRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types
// ---------------------------------------------------------------------------

struct MergeAuditRow {
    id: i64,
    run_id: String,
    primary_id: i64,
    merged_ids: String,
    strategy: String,
    snapshot: String,
    created_at: Option<String>,
}

impl MergeAuditRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            run_id: row.try_get("run_id")?,
            primary_id: row.try_get("primary_id")?,
            merged_ids: row.try_get("merged_ids")?,
            strategy: row.try_get("strategy")?,
            snapshot: row.try_get("snapshot")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_entry(self) -> Result<MergeAuditEntry, RepositoryError> {
        let run_id = Uuid::parse_str(&self.run_id)
            .map_err(|e| RepositoryError::Query(format!("invalid run_id: {e}")))?;
        let merged_ids: Vec<i64> = serde_json::from_str(&self.merged_ids)
            .map_err(|e| RepositoryError::Query(format!("invalid merged_ids: {e}")))?;
        let strategy: MergeStrategy = self
            .strategy
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let snapshot: Vec<KnowledgeItem> = serde_json::from_str(&self.snapshot)
            .map_err(|e| RepositoryError::Query(format!("invalid snapshot: {e}")))?;

        Ok(MergeAuditEntry {
            id: self.id,
            run_id,
            primary_id: self.primary_id,
            merged_ids,
            strategy,
            snapshot,
            created_at: parse_datetime_lossy(self.created_at).unwrap_or_default(),
        })
    }
}

fn rows_to_entries(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<MergeAuditEntry>, RepositoryError> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let audit_row =
            MergeAuditRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        entries.push(audit_row.into_entry()?);
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// MergeAuditRepository implementation
// ---------------------------------------------------------------------------

impl MergeAuditRepository for SqliteMergeAuditRepository {
    async fn list(&self, limit: Option<i64>) -> Result<Vec<MergeAuditEntry>, RepositoryError> {
        let mut sql = String::from("SELECT * FROM merge_audit ORDER BY id DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_entries(&rows)
    }

    async fn for_item(&self, item_id: i64) -> Result<Vec<MergeAuditEntry>, RepositoryError> {
        // merged_ids is a JSON array; scan primary matches in SQL and filter
        // membership in the decoded list.
        let rows = sqlx::query("SELECT * FROM merge_audit ORDER BY id DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let entries = rows_to_entries(&rows)?;
        Ok(entries
            .into_iter()
            .filter(|e| e.primary_id == item_id || e.merged_ids.contains(&item_id))
            .collect())
    }
}
