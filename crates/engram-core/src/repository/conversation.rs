//! Conversation repository trait definition.

use chrono::{DateTime, Utc};
use engram_types::error::RepositoryError;
use engram_types::record::{Conversation, NewConversation};
use uuid::Uuid;

/// Repository trait for conversation persistence.
///
/// Implementations live in engram-infra (e.g., `SqliteConversationRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Score, cluster, and archive updates are batch operations: each call is a
/// single transaction, so a crash between consolidation steps leaves the
/// store in a well-defined state.
pub trait ConversationRepository: Send + Sync {
    /// Insert a new conversation. The store assigns the id.
    fn create(
        &self,
        conversation: &NewConversation,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by id (archived or not).
    fn get(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// All non-archived conversations, ordered by created_at ascending
    /// (rows without a resolvable timestamp sort last).
    fn list_active(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

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

    /// Persist recomputed retention scores in one transaction.
    fn update_retention_scores(
        &self,
        scores: &[(i64, f64)],
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Replace cluster assignments in one transaction: clears cluster_id on
    /// every active conversation, then applies the given (id, cluster) pairs.
    fn assign_clusters(
        &self,
        assignments: &[(i64, i64)],
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Move a conversation to archive storage: write an immutable snapshot
    /// and set archived=true, atomically.
    ///
    /// Returns `Conflict` if the conversation is already archived and
    /// `NotFound` if it does not exist.
    fn archive(
        &self,
        id: i64,
        run_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Count of active (non-archived) conversations.
    fn count_active(
        &self,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Count of archived conversations.
    fn count_archived(
        &self,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
