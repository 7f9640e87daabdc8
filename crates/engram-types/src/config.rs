//! Consolidation configuration and validation.
//!
//! All thresholds are validated up front: a consolidation run with an
//! out-of-range configuration is rejected before any store read or write.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::record::MergeStrategy;

/// Tunable thresholds for a consolidation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Conversations below this retention score become archival candidates.
    pub retention_threshold: f64,
    /// Conversations younger than this are never archived, regardless of score.
    pub archival_age_floor_days: i64,
    /// Maximum gap between a cluster's first conversation and a member.
    pub cluster_gap_days: i64,
    /// Minimum composite similarity for a duplicate pair.
    pub similarity_threshold: f64,
    /// Knowledge items accessed more than this many times get strengthened.
    pub strengthen_access_threshold: i64,
    /// How duplicate groups are collapsed.
    pub merge_strategy: MergeStrategy,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            retention_threshold: 0.3,
            archival_age_floor_days: 90,
            cluster_gap_days: 7,
            similarity_threshold: 0.85,
            strengthen_access_threshold: 10,
            merge_strategy: MergeStrategy::KeepHighestConfidence,
        }
    }
}

impl ConsolidationConfig {
    /// Preset that archives more eagerly (retention threshold 0.2).
    pub fn aggressive() -> Self {
        Self {
            retention_threshold: 0.2,
            ..Self::default()
        }
    }

    /// Check all thresholds are in range.
    ///
    /// Called on entry to `consolidate` before any mutation occurs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.retention_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "retention_threshold",
                reason: format!("{} is not within [0, 1]", self.retention_threshold),
            });
        }
        if self.archival_age_floor_days < 0 {
            return Err(ConfigError::OutOfRange {
                field: "archival_age_floor_days",
                reason: format!("{} is negative", self.archival_age_floor_days),
            });
        }
        if self.cluster_gap_days < 0 {
            return Err(ConfigError::OutOfRange {
                field: "cluster_gap_days",
                reason: format!("{} is negative", self.cluster_gap_days),
            });
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "similarity_threshold",
                reason: format!("{} is not within [0, 1]", self.similarity_threshold),
            });
        }
        if self.strengthen_access_threshold < 0 {
            return Err(ConfigError::OutOfRange {
                field: "strengthen_access_threshold",
                reason: format!("{} is negative", self.strengthen_access_threshold),
            });
        }
        Ok(())
    }
}
