//! Knowledge item repository trait definition.

use chrono::{DateTime, Utc};
use engram_types::error::RepositoryError;
use engram_types::record::{KnowledgeItem, NewKnowledgeItem};
use uuid::Uuid;

use crate::dedup::MergeOutcome;

/// Repository trait for knowledge item persistence.
///
/// "Active" everywhere below means `superseded_by IS NULL`: superseded items
/// are logically deleted and never returned from lookups, but stay in the
/// store for audit.
pub trait KnowledgeRepository: Send + Sync {
    /// Insert a new knowledge item. The store assigns the id.
    fn create(
        &self,
        item: &NewKnowledgeItem,
    ) -> impl std::future::Future<Output = Result<KnowledgeItem, RepositoryError>> + Send;

    /// Get an item by id, superseded or not.
    fn get(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<KnowledgeItem>, RepositoryError>> + Send;

    /// All active items.
    fn list_active(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<KnowledgeItem>, RepositoryError>> + Send;

    /// Active items in a category.
    fn list_by_category(
        &self,
        category: &str,
    ) -> impl std::future::Future<Output = Result<Vec<KnowledgeItem>, RepositoryError>> + Send;

    /// Active items matching category and key exactly.
    fn lookup(
        &self,
        category: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<KnowledgeItem>, RepositoryError>> + Send;

    /// Read-path access bump: increment times_accessed, set last_accessed_at.
    fn record_access(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Persist recomputed priority scores in one transaction.
    fn update_priority_scores(
        &self,
        scores: &[(i64, f64)],
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Apply the access-reinforcement rule to the given items in one
    /// transaction: confidence += 0.1 capped at 1.0, importance += 1 capped
    /// at 10.
    fn strengthen(
        &self,
        ids: &[i64],
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Apply a planned merge in one transaction: update the primary item's
    /// value/confidence/times_accessed, set superseded_by on every other
    /// group member, and write the merge-audit record with the pre-merge
    /// snapshot.
    ///
    /// Returns `Conflict` if the primary was superseded between the scan and
    /// this call; the caller skips the group and continues.
    fn apply_merge(
        &self,
        run_id: Uuid,
        outcome: &MergeOutcome,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Count of active items.
    fn count_active(
        &self,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Count of superseded items.
    fn count_superseded(
        &self,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
