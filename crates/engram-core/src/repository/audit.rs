//! Merge-audit repository trait definition.
//!
//! Audit rows are written inside the merge transaction
//! (`KnowledgeRepository::apply_merge`); this trait is the read side.

use engram_types::error::RepositoryError;
use engram_types::record::MergeAuditEntry;

/// Read access to the merge-audit trail.
pub trait MergeAuditRepository: Send + Sync {
    /// Most recent merges first.
    fn list(
        &self,
        limit: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<MergeAuditEntry>, RepositoryError>> + Send;

    /// All merges that involved an item, as primary or as a merged-away
    /// member.
    fn for_item(
        &self,
        item_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<MergeAuditEntry>, RepositoryError>> + Send;
}
