//! Record types for the Engram memory store.
//!
//! These types model the assistant's long-term memory: remembered
//! conversations, extracted knowledge facts, recurring behavioral patterns,
//! and relationships between knowledge items. Records are persisted by the
//! store layer; ids are store-assigned integer keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// A remembered conversation.
///
/// Created by the ingestion layer; scores, cluster assignment, and the
/// archived flag are mutated only by the consolidation engine, access
/// counters only by read paths. Timestamps that were missing or unparseable
/// in the store surface as `None` and are handled by the documented
/// fallback policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    /// Short summary of the exchange, provided by the ingestion layer.
    pub summary: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub times_accessed: i64,
    /// Importance from 1 (low) to 10 (critical), set at creation.
    pub importance: u8,
    /// Whether the conversation reached a successful outcome, if recorded.
    pub outcome_success: Option<bool>,
    /// Retention probability in [0, 1], recomputed each consolidation.
    pub retention_score: f64,
    /// Composite priority in [0, 10], recomputed each consolidation.
    pub priority_score: f64,
    /// Temporal cluster index assigned by the clusterer.
    pub cluster_id: Option<i64>,
    /// Archived conversations are excluded from all active-set operations.
    pub archived: bool,
}

/// Input for creating a conversation; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversation {
    pub summary: String,
    pub importance: u8,
    pub outcome_success: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// A single knowledge fact extracted from conversations.
///
/// Items with `superseded_by` set are logically deleted: excluded from
/// lookups and future similarity comparisons, retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: i64,
    /// Groups comparable items; deduplication only compares within a category.
    pub category: String,
    pub key: String,
    pub value: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Importance from 1 (low) to 10 (critical).
    pub importance: u8,
    pub times_accessed: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// Composite priority in [0, 10], recomputed each consolidation.
    pub priority_score: f64,
    /// If this item was merged away, the id of the item that replaced it.
    pub superseded_by: Option<i64>,
}

/// Input for creating a knowledge item; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKnowledgeItem {
    pub category: String,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub importance: u8,
    pub created_at: DateTime<Utc>,
}

/// A recurring behavioral pattern, deduplicated at write time by the exact
/// `(pattern_type, data_fingerprint)` pair.
///
/// Every later occurrence bumps `frequency` and folds the new outcome into
/// `success_rate` as a running weighted average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: i64,
    pub pattern_type: String,
    /// Lowercase-hex SHA-256 of the structural payload.
    pub data_fingerprint: String,
    pub frequency: i64,
    /// Running weighted average of outcomes in [0, 1].
    pub success_rate: f64,
    pub last_seen_at: DateTime<Utc>,
}

/// Kind of edge between two knowledge items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Supports,
    Contradicts,
    PartOf,
    RelatedTo,
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationType::Supports => write!(f, "supports"),
            RelationType::Contradicts => write!(f, "contradicts"),
            RelationType::PartOf => write!(f, "part_of"),
            RelationType::RelatedTo => write!(f, "related_to"),
        }
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "supports" => Ok(RelationType::Supports),
            "contradicts" => Ok(RelationType::Contradicts),
            "part_of" => Ok(RelationType::PartOf),
            "related_to" => Ok(RelationType::RelatedTo),
            other => Err(format!("invalid relation type: '{other}'")),
        }
    }
}

/// A directed (or bidirectional) edge between two knowledge items.
///
/// Relationships are never auto-deleted; they become stale references when
/// an endpoint is superseded, so traversal must check `superseded_by`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub from_item: i64,
    pub to_item: i64,
    pub relation_type: RelationType,
    pub strength: f64,
    pub bidirectional: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a relationship edge; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRelationship {
    pub from_item: i64,
    pub to_item: i64,
    pub relation_type: RelationType,
    pub strength: f64,
    pub bidirectional: bool,
    pub created_at: DateTime<Utc>,
}

/// How a group of near-duplicate knowledge items is collapsed into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Final value comes from the member with the highest confidence.
    KeepHighestConfidence,
    /// Final value comes from the member with the newest creation time.
    KeepNewest,
    /// Final value is a deduplicated, order-preserving comma join.
    CombineValues,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::KeepHighestConfidence => write!(f, "keep_highest_confidence"),
            MergeStrategy::KeepNewest => write!(f, "keep_newest"),
            MergeStrategy::CombineValues => write!(f, "combine_values"),
        }
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep_highest_confidence" => Ok(MergeStrategy::KeepHighestConfidence),
            "keep_newest" => Ok(MergeStrategy::KeepNewest),
            "combine_values" => Ok(MergeStrategy::CombineValues),
            other => Err(format!("invalid merge strategy: '{other}'")),
        }
    }
}

/// Audit record written for every merge, capturing the pre-merge state of
/// all group members so a merge can be reviewed or reversed by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeAuditEntry {
    pub id: i64,
    /// The consolidation run that performed the merge.
    pub run_id: Uuid,
    pub primary_id: i64,
    pub merged_ids: Vec<i64>,
    pub strategy: MergeStrategy,
    /// Full pre-merge snapshot of every item in the group, primary included.
    pub snapshot: Vec<KnowledgeItem>,
    pub created_at: DateTime<Utc>,
}
