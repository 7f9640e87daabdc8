//! Pattern repository trait definition.

use chrono::{DateTime, Utc};
use engram_types::error::RepositoryError;
use engram_types::record::Pattern;

/// Repository trait for behavioral pattern persistence.
///
/// Patterns are deduplicated at write time by the exact
/// `(pattern_type, data_fingerprint)` pair -- no fuzzy matching.
pub trait PatternRepository: Send + Sync {
    /// Record one occurrence of a pattern.
    ///
    /// First occurrence inserts with frequency 1 and success_rate equal to
    /// the outcome; every later occurrence increments frequency and folds
    /// the outcome into the running weighted average:
    /// `success_rate = (success_rate*freq_old + outcome)/freq_new`.
    fn observe(
        &self,
        pattern_type: &str,
        data_fingerprint: &str,
        outcome_success: bool,
        seen_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Pattern, RepositoryError>> + Send;

    /// Get a pattern by its dedup key.
    fn get(
        &self,
        pattern_type: &str,
        data_fingerprint: &str,
    ) -> impl std::future::Future<Output = Result<Option<Pattern>, RepositoryError>> + Send;

    /// List patterns ordered by frequency descending.
    fn list(
        &self,
        limit: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<Pattern>, RepositoryError>> + Send;

    /// Total pattern count.
    fn count(&self) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
