//! SQLite knowledge item repository implementation.
//!
//! Implements `KnowledgeRepository` from `engram-core`. The merge path is the
//! delicate part: primary update, supersede markers, and the audit snapshot
//! all commit in one writer transaction, so a crash can never leave a merge
//! half-applied.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use engram_core::dedup::MergeOutcome;
use engram_core::repository::knowledge::KnowledgeRepository;
use engram_types::error::RepositoryError;
use engram_types::record::{KnowledgeItem, NewKnowledgeItem};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime_lossy};

/// SQLite-backed implementation of `KnowledgeRepository`.
pub struct SqliteKnowledgeRepository {
    pool: DatabasePool,
}

impl SqliteKnowledgeRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct KnowledgeRow {
    id: i64,
    category: String,
    key: String,
    value: String,
    confidence: f64,
    importance: i64,
    times_accessed: i64,
    created_at: Option<String>,
    last_accessed_at: Option<String>,
    priority_score: f64,
    superseded_by: Option<i64>,
}

impl KnowledgeRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            category: row.try_get("category")?,
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            confidence: row.try_get("confidence")?,
            importance: row.try_get("importance")?,
            times_accessed: row.try_get("times_accessed")?,
            created_at: row.try_get("created_at")?,
            last_accessed_at: row.try_get("last_accessed_at")?,
            priority_score: row.try_get("priority_score")?,
            superseded_by: row.try_get("superseded_by")?,
        })
    }

    fn into_item(self) -> KnowledgeItem {
        KnowledgeItem {
            id: self.id,
            category: self.category,
            key: self.key,
            value: self.value,
            confidence: self.confidence,
            importance: self.importance.clamp(0, 10) as u8,
            times_accessed: self.times_accessed,
            created_at: parse_datetime_lossy(self.created_at),
            last_accessed_at: parse_datetime_lossy(self.last_accessed_at),
            priority_score: self.priority_score,
            superseded_by: self.superseded_by,
        }
    }
}

fn rows_to_items(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<KnowledgeItem>, RepositoryError> {
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let item_row =
            KnowledgeRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        items.push(item_row.into_item());
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// KnowledgeRepository implementation
// ---------------------------------------------------------------------------

impl KnowledgeRepository for SqliteKnowledgeRepository {
    async fn create(&self, item: &NewKnowledgeItem) -> Result<KnowledgeItem, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO knowledge_items (category, key, value, confidence, importance, times_accessed, created_at)
               VALUES (?, ?, ?, ?, ?, 0, ?)"#,
        )
        .bind(&item.category)
        .bind(&item.key)
        .bind(&item.value)
        .bind(item.confidence)
        .bind(item.importance as i64)
        .bind(format_datetime(&item.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| RepositoryError::Query("inserted knowledge item not found".to_string()))
    }

    async fn get(&self, id: i64) -> Result<Option<KnowledgeItem>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM knowledge_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|r| {
            KnowledgeRow::from_row(&r)
                .map(KnowledgeRow::into_item)
                .map_err(|e| RepositoryError::Query(e.to_string()))
        })
        .transpose()
    }

    async fn list_active(&self) -> Result<Vec<KnowledgeItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge_items WHERE superseded_by IS NULL ORDER BY id ASC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_items(&rows)
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<KnowledgeItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge_items WHERE superseded_by IS NULL AND category = ? ORDER BY id ASC",
        )
        .bind(category)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_items(&rows)
    }

    async fn lookup(&self, category: &str, key: &str) -> Result<Vec<KnowledgeItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge_items WHERE superseded_by IS NULL AND category = ? AND key = ? ORDER BY id ASC",
        )
        .bind(category)
        .bind(key)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_items(&rows)
    }

    async fn record_access(&self, id: i64, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE knowledge_items SET times_accessed = times_accessed + 1, last_accessed_at = ? WHERE id = ?",
        )
        .bind(format_datetime(&at))
        .bind(id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_priority_scores(&self, scores: &[(i64, f64)]) -> Result<u64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut updated = 0;
        for (id, score) in scores {
            let result = sqlx::query("UPDATE knowledge_items SET priority_score = ? WHERE id = ?")
                .bind(score)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            updated += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(updated)
    }

    async fn strengthen(&self, ids: &[i64]) -> Result<u64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut updated = 0;
        for id in ids {
            let result = sqlx::query(
                r#"UPDATE knowledge_items
                   SET confidence = MIN(1.0, confidence + 0.1),
                       importance = MIN(10, importance + 1)
                   WHERE id = ? AND superseded_by IS NULL"#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
            updated += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(updated)
    }

    async fn apply_merge(
        &self,
        run_id: Uuid,
        outcome: &MergeOutcome,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let primary: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT superseded_by FROM knowledge_items WHERE id = ?")
                .bind(outcome.primary_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match primary {
            None => return Err(RepositoryError::NotFound),
            Some((Some(_),)) => {
                return Err(RepositoryError::Conflict(
                    "primary already superseded".to_string(),
                ));
            }
            Some((None,)) => {}
        }

        sqlx::query(
            "UPDATE knowledge_items SET value = ?, confidence = ?, times_accessed = ? WHERE id = ?",
        )
        .bind(&outcome.value)
        .bind(outcome.confidence)
        .bind(outcome.times_accessed)
        .bind(outcome.primary_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        for merged_id in &outcome.merged_ids {
            sqlx::query("UPDATE knowledge_items SET superseded_by = ? WHERE id = ?")
                .bind(outcome.primary_id)
                .bind(merged_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        let merged_ids = serde_json::to_string(&outcome.merged_ids)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let snapshot = serde_json::to_string(&outcome.snapshot)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO merge_audit (run_id, primary_id, merged_ids, strategy, snapshot, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run_id.to_string())
        .bind(outcome.primary_id)
        .bind(merged_ids)
        .bind(outcome.strategy.to_string())
        .bind(snapshot)
        .bind(format_datetime(&at))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn count_active(&self) -> Result<i64, RepositoryError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM knowledge_items WHERE superseded_by IS NULL")
                .fetch_one(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.0)
    }

    async fn count_superseded(&self) -> Result<i64, RepositoryError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM knowledge_items WHERE superseded_by IS NOT NULL")
                .fetch_one(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_types::record::MergeStrategy;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn make_new(category: &str, key: &str, value: &str, confidence: f64) -> NewKnowledgeItem {
        NewKnowledgeItem {
            category: category.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            confidence,
            importance: 5,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let pool = test_pool().await;
        let repo = SqliteKnowledgeRepository::new(pool);

        let created = repo
            .create(&make_new("preference", "editor", "helix", 0.9))
            .await
            .unwrap();
        assert!(created.id > 0);

        let found = repo.lookup("preference", "editor").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "helix");

        assert!(repo.lookup("preference", "terminal").await.unwrap().is_empty());
        assert!(repo.lookup("fact", "editor").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_category() {
        let pool = test_pool().await;
        let repo = SqliteKnowledgeRepository::new(pool);

        repo.create(&make_new("fact", "a", "1", 0.5)).await.unwrap();
        repo.create(&make_new("fact", "b", "2", 0.5)).await.unwrap();
        repo.create(&make_new("preference", "c", "3", 0.5)).await.unwrap();

        assert_eq!(repo.list_by_category("fact").await.unwrap().len(), 2);
        assert_eq!(repo.list_by_category("preference").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_strengthen_caps_at_bounds() {
        let pool = test_pool().await;
        let repo = SqliteKnowledgeRepository::new(pool);
        let item = repo.create(&make_new("fact", "k", "v", 0.95)).await.unwrap();

        repo.strengthen(&[item.id]).await.unwrap();
        let boosted = repo.get(item.id).await.unwrap().unwrap();
        assert_eq!(boosted.confidence, 1.0);
        assert_eq!(boosted.importance, 6);

        // Repeated application keeps hitting the caps, never exceeds them.
        for _ in 0..6 {
            repo.strengthen(&[item.id]).await.unwrap();
        }
        let capped = repo.get(item.id).await.unwrap().unwrap();
        assert_eq!(capped.confidence, 1.0);
        assert_eq!(capped.importance, 10);
    }

    #[tokio::test]
    async fn test_apply_merge_transactional_effects() {
        let pool = test_pool().await;
        let repo = SqliteKnowledgeRepository::new(pool.clone());
        let a = repo.create(&make_new("fact", "city", "lisbon", 0.4)).await.unwrap();
        let b = repo.create(&make_new("fact", "city", "lisbon", 0.9)).await.unwrap();
        repo.record_access(a.id, Utc::now()).await.unwrap();
        repo.record_access(b.id, Utc::now()).await.unwrap();
        repo.record_access(b.id, Utc::now()).await.unwrap();

        let snapshot = vec![
            repo.get(a.id).await.unwrap().unwrap(),
            repo.get(b.id).await.unwrap().unwrap(),
        ];
        let outcome = MergeOutcome {
            primary_id: a.id,
            merged_ids: vec![b.id],
            strategy: MergeStrategy::KeepHighestConfidence,
            value: "lisbon".to_string(),
            confidence: 0.9,
            times_accessed: 3,
            snapshot,
        };
        let run_id = Uuid::now_v7();
        repo.apply_merge(run_id, &outcome, Utc::now()).await.unwrap();

        let primary = repo.get(a.id).await.unwrap().unwrap();
        assert_eq!(primary.confidence, 0.9);
        assert_eq!(primary.times_accessed, 3);
        assert!(primary.superseded_by.is_none());

        let merged = repo.get(b.id).await.unwrap().unwrap();
        assert_eq!(merged.superseded_by, Some(a.id));

        // Superseded item is gone from the active set and lookups.
        assert_eq!(repo.count_active().await.unwrap(), 1);
        assert_eq!(repo.count_superseded().await.unwrap(), 1);
        assert_eq!(repo.lookup("fact", "city").await.unwrap().len(), 1);

        // Audit row captured the pre-merge snapshot.
        let (strategy, snapshot_json): (String, String) =
            sqlx::query_as("SELECT strategy, snapshot FROM merge_audit WHERE primary_id = ?")
                .bind(a.id)
                .fetch_one(&pool.reader)
                .await
                .unwrap();
        assert_eq!(strategy, "keep_highest_confidence");
        let items: Vec<KnowledgeItem> = serde_json::from_str(&snapshot_json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].confidence, 0.4);
    }

    #[tokio::test]
    async fn test_apply_merge_conflicts_on_superseded_primary() {
        let pool = test_pool().await;
        let repo = SqliteKnowledgeRepository::new(pool);
        let a = repo.create(&make_new("fact", "city", "lisbon", 0.4)).await.unwrap();
        let b = repo.create(&make_new("fact", "city", "lisbon", 0.9)).await.unwrap();

        // First merge supersedes a under b.
        let outcome = MergeOutcome {
            primary_id: b.id,
            merged_ids: vec![a.id],
            strategy: MergeStrategy::KeepHighestConfidence,
            value: "lisbon".to_string(),
            confidence: 0.9,
            times_accessed: 0,
            snapshot: vec![],
        };
        repo.apply_merge(Uuid::now_v7(), &outcome, Utc::now()).await.unwrap();

        // A stale plan still naming a as primary must conflict, not clobber.
        let stale = MergeOutcome {
            primary_id: a.id,
            merged_ids: vec![b.id],
            strategy: MergeStrategy::KeepHighestConfidence,
            value: "lisbon".to_string(),
            confidence: 0.4,
            times_accessed: 0,
            snapshot: vec![],
        };
        let err = repo
            .apply_merge(Uuid::now_v7(), &stale, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
