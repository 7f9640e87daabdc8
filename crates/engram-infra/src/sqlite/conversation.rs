//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `engram-core` using sqlx with
//! split read/write pools: raw queries, private Row structs, batch updates
//! wrapped in writer transactions.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use engram_core::repository::conversation::ConversationRepository;
use engram_types::error::RepositoryError;
use engram_types::record::{Conversation, NewConversation};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime_lossy};

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: i64,
    summary: String,
    created_at: Option<String>,
    last_accessed_at: Option<String>,
    times_accessed: i64,
    importance: i64,
    outcome_success: Option<i64>,
    retention_score: f64,
    priority_score: f64,
    cluster_id: Option<i64>,
    archived: i64,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            summary: row.try_get("summary")?,
            created_at: row.try_get("created_at")?,
            last_accessed_at: row.try_get("last_accessed_at")?,
            times_accessed: row.try_get("times_accessed")?,
            importance: row.try_get("importance")?,
            outcome_success: row.try_get("outcome_success")?,
            retention_score: row.try_get("retention_score")?,
            priority_score: row.try_get("priority_score")?,
            cluster_id: row.try_get("cluster_id")?,
            archived: row.try_get("archived")?,
        })
    }

    fn into_conversation(self) -> Conversation {
        Conversation {
            id: self.id,
            summary: self.summary,
            // Malformed timestamps surface as None; scorers apply the
            // documented fallbacks instead of failing the batch.
            created_at: parse_datetime_lossy(self.created_at),
            last_accessed_at: parse_datetime_lossy(self.last_accessed_at),
            times_accessed: self.times_accessed,
            importance: self.importance.clamp(0, 10) as u8,
            outcome_success: self.outcome_success.map(|v| v != 0),
            retention_score: self.retention_score,
            priority_score: self.priority_score,
            cluster_id: self.cluster_id,
            archived: self.archived != 0,
        }
    }
}

fn rows_to_conversations(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<Conversation>, RepositoryError> {
    let mut conversations = Vec::with_capacity(rows.len());
    for row in rows {
        let conversation_row =
            ConversationRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        conversations.push(conversation_row.into_conversation());
    }
    Ok(conversations)
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn create(
        &self,
        conversation: &NewConversation,
    ) -> Result<Conversation, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO conversations (summary, created_at, times_accessed, importance, outcome_success)
               VALUES (?, ?, 0, ?, ?)"#,
        )
        .bind(&conversation.summary)
        .bind(format_datetime(&conversation.created_at))
        .bind(conversation.importance as i64)
        .bind(conversation.outcome_success.map(i64::from))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| RepositoryError::Query("inserted conversation not found".to_string()))
    }

    async fn get(&self, id: i64) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|r| {
            ConversationRow::from_row(&r)
                .map(ConversationRow::into_conversation)
                .map_err(|e| RepositoryError::Query(e.to_string()))
        })
        .transpose()
    }

    async fn list_active(&self) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE archived = 0 ORDER BY created_at IS NULL, created_at ASC, id ASC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_conversations(&rows)
    }

    async fn record_access(&self, id: i64, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE conversations SET times_accessed = times_accessed + 1, last_accessed_at = ? WHERE id = ?",
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
            let result = sqlx::query("UPDATE conversations SET priority_score = ? WHERE id = ?")
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

    async fn update_retention_scores(&self, scores: &[(i64, f64)]) -> Result<u64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut updated = 0;
        for (id, score) in scores {
            let result = sqlx::query("UPDATE conversations SET retention_score = ? WHERE id = ?")
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

    async fn assign_clusters(&self, assignments: &[(i64, i64)]) -> Result<u64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Clusters are fully recomputed each pass; conversations excluded
        // from clustering (unparseable timestamps) must end with no cluster.
        sqlx::query("UPDATE conversations SET cluster_id = NULL WHERE archived = 0")
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut updated = 0;
        for (id, cluster) in assignments {
            let result = sqlx::query("UPDATE conversations SET cluster_id = ? WHERE id = ?")
                .bind(cluster)
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

    async fn archive(
        &self,
        id: i64,
        run_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Err(RepositoryError::NotFound);
        };
        let conversation = ConversationRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_conversation();
        if conversation.archived {
            return Err(RepositoryError::Conflict("already archived".to_string()));
        }

        let snapshot = serde_json::to_string(&conversation)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO archived_conversations (conversation_id, run_id, snapshot, archived_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(id)
        .bind(run_id.to_string())
        .bind(snapshot)
        .bind(format_datetime(&at))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query("UPDATE conversations SET archived = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn count_active(&self) -> Result<i64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations WHERE archived = 0")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.0)
    }

    async fn count_archived(&self) -> Result<i64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations WHERE archived = 1")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn make_new(summary: &str, importance: u8) -> NewConversation {
        NewConversation {
            summary: summary.to_string(),
            importance,
            outcome_success: Some(true),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        let created = repo.create(&make_new("first chat", 6)).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.importance, 6);
        assert_eq!(created.outcome_success, Some(true));
        assert!(!created.archived);

        let fetched = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.summary, "first chat");
    }

    #[tokio::test]
    async fn test_list_active_orders_by_created_at() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);

        let mut older = make_new("older", 5);
        older.created_at = Utc::now() - chrono::Duration::days(3);
        let newer = make_new("newer", 5);

        let newer_created = repo.create(&newer).await.unwrap();
        let older_created = repo.create(&older).await.unwrap();

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, older_created.id);
        assert_eq!(active[1].id, newer_created.id);
    }

    #[tokio::test]
    async fn test_record_access() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let created = repo.create(&make_new("touched", 5)).await.unwrap();

        repo.record_access(created.id, Utc::now()).await.unwrap();
        repo.record_access(created.id, Utc::now()).await.unwrap();

        let fetched = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.times_accessed, 2);
        assert!(fetched.last_accessed_at.is_some());
    }

    #[tokio::test]
    async fn test_record_access_missing_row() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let err = repo.record_access(999, Utc::now()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_score_batches() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let a = repo.create(&make_new("a", 5)).await.unwrap();
        let b = repo.create(&make_new("b", 5)).await.unwrap();

        let updated = repo
            .update_priority_scores(&[(a.id, 7.5), (b.id, 2.5)])
            .await
            .unwrap();
        assert_eq!(updated, 2);
        let updated = repo
            .update_retention_scores(&[(a.id, 0.9), (b.id, 0.1)])
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let fetched = repo.get(a.id).await.unwrap().unwrap();
        assert_eq!(fetched.priority_score, 7.5);
        assert_eq!(fetched.retention_score, 0.9);
    }

    #[tokio::test]
    async fn test_assign_clusters_clears_stale_assignments() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let a = repo.create(&make_new("a", 5)).await.unwrap();
        let b = repo.create(&make_new("b", 5)).await.unwrap();

        repo.assign_clusters(&[(a.id, 0), (b.id, 1)]).await.unwrap();
        // Next pass only assigns a; b's stale assignment must be cleared.
        repo.assign_clusters(&[(a.id, 0)]).await.unwrap();

        assert_eq!(repo.get(a.id).await.unwrap().unwrap().cluster_id, Some(0));
        assert_eq!(repo.get(b.id).await.unwrap().unwrap().cluster_id, None);
    }

    #[tokio::test]
    async fn test_archive_moves_and_excludes() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let created = repo.create(&make_new("cold memory", 2)).await.unwrap();
        let run_id = Uuid::now_v7();

        repo.archive(created.id, run_id, Utc::now()).await.unwrap();

        let fetched = repo.get(created.id).await.unwrap().unwrap();
        assert!(fetched.archived);
        assert!(repo.list_active().await.unwrap().is_empty());
        assert_eq!(repo.count_active().await.unwrap(), 0);
        assert_eq!(repo.count_archived().await.unwrap(), 1);

        // Snapshot row captures the pre-archive state.
        let (snapshot, stored_run): (String, String) = sqlx::query_as(
            "SELECT snapshot, run_id FROM archived_conversations WHERE conversation_id = ?",
        )
        .bind(created.id)
        .fetch_one(&pool.reader)
        .await
        .unwrap();
        assert!(snapshot.contains("cold memory"));
        assert_eq!(stored_run, run_id.to_string());

        // Archiving twice conflicts.
        let err = repo.archive(created.id, run_id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_malformed_timestamp_surfaces_as_none() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let created = repo.create(&make_new("bad clock", 5)).await.unwrap();

        sqlx::query("UPDATE conversations SET created_at = 'garbage' WHERE id = ?")
            .bind(created.id)
            .execute(&pool.writer)
            .await
            .unwrap();

        let fetched = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.created_at, None);
    }
}
