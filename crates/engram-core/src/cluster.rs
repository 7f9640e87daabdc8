//! Temporal clustering of conversations into session-like groups.
//!
//! A single pass over time-ordered conversations with a sliding gap rule:
//! the anchor stays pinned to each group's first timestamp, so the gap is
//! always measured from the group's start, not from the previous member.

use chrono::{DateTime, Utc};
use engram_types::record::Conversation;

/// Default gap between a cluster's first conversation and any member.
pub const DEFAULT_GAP_DAYS: i64 = 7;

/// A session-like group of conversation ids, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalCluster {
    /// Sequential index, assigned from 0 in chronological order.
    pub index: i64,
    pub conversation_ids: Vec<i64>,
}

/// Partition conversations into temporal clusters.
///
/// `conversations` must be ordered by `created_at` ascending (the store's
/// active-list order). Conversations without a resolvable timestamp are
/// skipped entirely -- excluded from every cluster, not grouped on their own.
/// Deterministic: same input, same clusters.
pub fn cluster_conversations(
    conversations: &[Conversation],
    gap_days: i64,
) -> Vec<TemporalCluster> {
    let mut clusters: Vec<TemporalCluster> = Vec::new();
    let mut anchor: Option<DateTime<Utc>> = None;

    for conversation in conversations {
        let Some(created_at) = conversation.created_at else {
            continue;
        };

        let start_new = match anchor {
            None => true,
            Some(anchor_time) => (created_at - anchor_time).num_days() > gap_days,
        };

        if start_new {
            anchor = Some(created_at);
            clusters.push(TemporalCluster {
                index: clusters.len() as i64,
                conversation_ids: vec![conversation.id],
            });
        } else if let Some(current) = clusters.last_mut() {
            current.conversation_ids.push(conversation.id);
        }
    }

    clusters
}
