//! Consolidation run reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// The six orchestrator steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStep {
    PriorityScores,
    Clustering,
    RetentionScores,
    Archival,
    Strengthen,
    Deduplication,
}

impl fmt::Display for ConsolidationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsolidationStep::PriorityScores => write!(f, "priority_scores"),
            ConsolidationStep::Clustering => write!(f, "clustering"),
            ConsolidationStep::RetentionScores => write!(f, "retention_scores"),
            ConsolidationStep::Archival => write!(f, "archival"),
            ConsolidationStep::Strengthen => write!(f, "strengthen"),
            ConsolidationStep::Deduplication => write!(f, "deduplication"),
        }
    }
}

/// Structured result of one consolidation run.
///
/// Always carries per-step counts and the dry-run flag, even when the run
/// aborted partway: callers can distinguish "ran cleanly, did nothing" from
/// "aborted after step N" via `aborted_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    /// Priority scores persisted (conversations + knowledge items).
    pub priority_updated: u64,
    /// Temporal clusters found across active conversations.
    pub clusters_found: u64,
    /// Retention scores persisted.
    pub retention_updated: u64,
    /// Conversations moved to archive storage (counted only in dry runs).
    pub conversations_archived: u64,
    /// Knowledge items strengthened by the access-reinforcement rule.
    pub items_strengthened: u64,
    /// Duplicate groups identified.
    pub duplicate_groups: u64,
    /// Knowledge items superseded by merges (counted only in dry runs).
    pub items_merged: u64,
    /// Set when a store failure aborted the run at this step.
    pub aborted_at: Option<ConsolidationStep>,
}

impl ConsolidationReport {
    /// A fresh, all-zero report for a run starting now.
    pub fn begin(run_id: Uuid, dry_run: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            dry_run,
            started_at,
            priority_updated: 0,
            clusters_found: 0,
            retention_updated: 0,
            conversations_archived: 0,
            items_strengthened: 0,
            duplicate_groups: 0,
            items_merged: 0,
            aborted_at: None,
        }
    }

    /// Whether the run executed all six steps.
    pub fn completed(&self) -> bool {
        self.aborted_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_display_names() {
        assert_eq!(ConsolidationStep::PriorityScores.to_string(), "priority_scores");
        assert_eq!(ConsolidationStep::Deduplication.to_string(), "deduplication");
    }

    #[test]
    fn test_begin_is_zeroed() {
        let report = ConsolidationReport::begin(Uuid::now_v7(), true, Utc::now());
        assert!(report.dry_run);
        assert_eq!(report.conversations_archived, 0);
        assert_eq!(report.items_merged, 0);
        assert!(report.completed());
    }

    #[test]
    fn test_aborted_report_not_completed() {
        let mut report = ConsolidationReport::begin(Uuid::now_v7(), false, Utc::now());
        report.aborted_at = Some(ConsolidationStep::Archival);
        assert!(!report.completed());
    }

    #[test]
    fn test_report_serde_roundtrip() {
        let mut report = ConsolidationReport::begin(Uuid::now_v7(), false, Utc::now());
        report.clusters_found = 4;
        report.aborted_at = Some(ConsolidationStep::Strengthen);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"aborted_at\":\"strengthen\""));
        let parsed: ConsolidationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.clusters_found, 4);
    }
}
