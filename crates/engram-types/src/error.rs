use thiserror::Error;

use crate::report::{ConsolidationReport, ConsolidationStep};

/// Errors from repository operations (used by trait definitions in engram-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from configuration validation.
///
/// Raised before any store mutation; a run never starts with bad thresholds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Errors from the consolidation orchestrator.
#[derive(Debug, Error)]
pub enum ConsolidateError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// Another run holds the store-level consolidation lock.
    #[error("a consolidation run is already in progress")]
    AlreadyRunning,

    /// The store failed mid-run; remaining steps were not executed.
    ///
    /// Carries the partial report so callers still see the counts from the
    /// steps that completed before the abort.
    #[error("consolidation aborted at step {step}: {source}")]
    Aborted {
        step: ConsolidationStep,
        #[source]
        source: RepositoryError,
        report: Box<ConsolidationReport>,
    },

    /// A store failure outside the six steps (lock acquisition or release).
    #[error("store unavailable: {0}")]
    Store(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::OutOfRange {
            field: "retention_threshold",
            reason: "1.5 is not within [0, 1]".to_string(),
        };
        assert!(err.to_string().contains("retention_threshold"));
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_aborted_error_carries_report() {
        let mut report = ConsolidationReport::begin(Uuid::now_v7(), false, Utc::now());
        report.aborted_at = Some(ConsolidationStep::Archival);
        report.priority_updated = 12;
        let err = ConsolidateError::Aborted {
            step: ConsolidationStep::Archival,
            source: RepositoryError::Connection,
            report: Box::new(report),
        };
        assert!(err.to_string().contains("archival"));
        let ConsolidateError::Aborted { report, .. } = err else {
            unreachable!();
        };
        assert!(!report.completed());
        assert_eq!(report.priority_updated, 12);
    }
}
