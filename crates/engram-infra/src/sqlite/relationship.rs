//! SQLite relationship repository implementation.

use sqlx::Row;

use engram_core::repository::relationship::RelationshipRepository;
use engram_types::error::RepositoryError;
use engram_types::record::{NewRelationship, RelationType, Relationship};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime_lossy};

/// SQLite-backed implementation of `RelationshipRepository`.
pub struct SqliteRelationshipRepository {
    pool: DatabasePool,
}

impl SqliteRelationshipRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types
// ---------------------------------------------------------------------------

struct RelationshipRow {
    id: i64,
    from_item: i64,
    to_item: i64,
    relation_type: String,
    strength: f64,
    bidirectional: i64,
    verified: i64,
    created_at: Option<String>,
}

impl RelationshipRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            from_item: row.try_get("from_item")?,
            to_item: row.try_get("to_item")?,
            relation_type: row.try_get("relation_type")?,
            strength: row.try_get("strength")?,
            bidirectional: row.try_get("bidirectional")?,
            verified: row.try_get("verified")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_relationship(self) -> Result<Relationship, RepositoryError> {
        let relation_type: RelationType = self
            .relation_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Relationship {
            id: self.id,
            from_item: self.from_item,
            to_item: self.to_item,
            relation_type,
            strength: self.strength,
            bidirectional: self.bidirectional != 0,
            verified: self.verified != 0,
            created_at: parse_datetime_lossy(self.created_at).unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// RelationshipRepository implementation
// ---------------------------------------------------------------------------

impl RelationshipRepository for SqliteRelationshipRepository {
    async fn create(&self, relationship: &NewRelationship) -> Result<Relationship, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO relationships (from_item, to_item, relation_type, strength, bidirectional, verified, created_at)
               VALUES (?, ?, ?, ?, ?, 0, ?)"#,
        )
        .bind(relationship.from_item)
        .bind(relationship.to_item)
        .bind(relationship.relation_type.to_string())
        .bind(relationship.strength)
        .bind(i64::from(relationship.bidirectional))
        .bind(format_datetime(&relationship.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let id = result.last_insert_rowid();
        let row = sqlx::query("SELECT * FROM relationships WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        RelationshipRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_relationship()
    }

    async fn for_item(&self, item_id: i64) -> Result<Vec<Relationship>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM relationships
               WHERE from_item = ? OR (bidirectional = 1 AND to_item = ?)
               ORDER BY id ASC"#,
        )
        .bind(item_id)
        .bind(item_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut relationships = Vec::with_capacity(rows.len());
        for row in &rows {
            let relationship_row =
                RelationshipRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            relationships.push(relationship_row.into_relationship()?);
        }
        Ok(relationships)
    }

    async fn set_verified(&self, id: i64, verified: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE relationships SET verified = ? WHERE id = ?")
            .bind(i64::from(verified))
            .bind(id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM relationships")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.0)
    }
}
