//! Relationship repository trait definition.

use engram_types::error::RepositoryError;
use engram_types::record::{NewRelationship, Relationship};

/// Repository trait for knowledge relationship edges.
///
/// Relationships are never auto-deleted. An edge whose endpoint was
/// superseded becomes a stale reference; traversal callers filter those
/// (see `MemoryService::related_items`).
pub trait RelationshipRepository: Send + Sync {
    /// Insert a new relationship edge. The store assigns the id.
    fn create(
        &self,
        relationship: &NewRelationship,
    ) -> impl std::future::Future<Output = Result<Relationship, RepositoryError>> + Send;

    /// All edges touching an item: outgoing, plus incoming where the edge
    /// is bidirectional.
    fn for_item(
        &self,
        item_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Relationship>, RepositoryError>> + Send;

    /// Mark an edge as verified (or unverified).
    fn set_verified(
        &self,
        id: i64,
        verified: bool,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Total edge count.
    fn count(&self) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
