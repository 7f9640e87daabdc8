//! Store-level advisory lock for consolidation runs.
//!
//! Interleaved archival and deduplication passes over the same rows would
//! corrupt merge-audit bookkeeping, so concurrent orchestrator runs must be
//! serialized. The lock lives in the store (not in process memory) so that
//! runs triggered from separate processes exclude each other too.

use chrono::{DateTime, Utc};
use engram_types::error::RepositoryError;
use uuid::Uuid;

/// Single-flight guard for the consolidation orchestrator.
pub trait ConsolidationLock: Send + Sync {
    /// Try to take the lock for a run. Returns false if another run holds it.
    fn try_acquire(
        &self,
        run_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Release the lock, only if held by this run.
    fn release(
        &self,
        run_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Current holder, if any.
    fn holder(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<(Uuid, DateTime<Utc>)>, RepositoryError>> + Send;

    /// Clear the lock regardless of holder. For recovering from a crashed
    /// run; never called by the engine itself.
    fn force_release(
        &self,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
