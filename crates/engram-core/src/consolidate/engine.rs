//! Consolidation engine: the six-step memory maintenance pass.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use engram_types::config::ConsolidationConfig;
use engram_types::error::{ConsolidateError, RepositoryError};
use engram_types::record::KnowledgeItem;
use engram_types::report::{ConsolidationReport, ConsolidationStep};

use crate::cluster::cluster_conversations;
use crate::dedup::{find_duplicates, group_duplicates, plan_merge};
use crate::repository::conversation::ConversationRepository;
use crate::repository::knowledge::KnowledgeRepository;
use crate::repository::lock::ConsolidationLock;
use crate::score::priority::priority_score;
use crate::score::retention::retention_score;

/// Orchestrates the periodic memory consolidation pass.
///
/// Generic over the repository traits so the engine never depends on a
/// concrete store. Each step persists through a single batch call (one
/// transaction in the store), so a crash mid-run leaves whole steps applied
/// or not applied, never half-updated scores.
///
/// Steps 1-3 and 5 converge when rerun without new data; steps 4 and 6
/// remove records from the active set, so an immediate second run reports
/// zero new archivals and merges.
pub struct ConsolidationEngine<C, K, L> {
    conversations: C,
    knowledge: K,
    lock: L,
    config: ConsolidationConfig,
}

impl<C, K, L> ConsolidationEngine<C, K, L>
where
    C: ConversationRepository,
    K: KnowledgeRepository,
    L: ConsolidationLock,
{
    pub fn new(conversations: C, knowledge: K, lock: L, config: ConsolidationConfig) -> Self {
        Self {
            conversations,
            knowledge,
            lock,
            config,
        }
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Run one full consolidation pass.
    ///
    /// Validates configuration before touching the store, then serializes
    /// against concurrent runs via the store-level lock. In dry-run mode
    /// every step computes and counts but writes nothing.
    #[tracing::instrument(name = "consolidate", skip(self))]
    pub async fn consolidate(
        &self,
        dry_run: bool,
    ) -> Result<ConsolidationReport, ConsolidateError> {
        self.config.validate()?;

        let run_id = Uuid::now_v7();
        let now = Utc::now();

        if !self.lock.try_acquire(run_id, now).await? {
            return Err(ConsolidateError::AlreadyRunning);
        }

        let result = self.run_steps(run_id, dry_run, now).await;

        if let Err(e) = self.lock.release(run_id).await {
            warn!(run_id = %run_id, error = %e, "Failed to release consolidation lock");
        }

        result
    }

    async fn run_steps(
        &self,
        run_id: Uuid,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<ConsolidationReport, ConsolidateError> {
        let mut report = ConsolidationReport::begin(run_id, dry_run, now);
        let config = &self.config;

        // Step 1: priority scores for all active records.
        let step = ConsolidationStep::PriorityScores;
        let conversations = self
            .conversations
            .list_active()
            .await
            .map_err(|e| aborted(step, e, &report))?;
        let mut knowledge = self
            .knowledge
            .list_active()
            .await
            .map_err(|e| aborted(step, e, &report))?;

        let conversation_scores: Vec<(i64, f64)> = conversations
            .iter()
            .map(|c| (c.id, priority_score(c, now)))
            .collect();
        let knowledge_scores: Vec<(i64, f64)> = knowledge
            .iter()
            .map(|i| (i.id, priority_score(i, now)))
            .collect();

        if !dry_run {
            self.conversations
                .update_priority_scores(&conversation_scores)
                .await
                .map_err(|e| aborted(step, e, &report))?;
            self.knowledge
                .update_priority_scores(&knowledge_scores)
                .await
                .map_err(|e| aborted(step, e, &report))?;
        }
        report.priority_updated = (conversation_scores.len() + knowledge_scores.len()) as u64;
        debug!(count = report.priority_updated, "Priority scores refreshed");

        // Step 2: temporal clusters over active conversations.
        let step = ConsolidationStep::Clustering;
        let clusters = cluster_conversations(&conversations, config.cluster_gap_days);
        let assignments: Vec<(i64, i64)> = clusters
            .iter()
            .flat_map(|cluster| {
                cluster
                    .conversation_ids
                    .iter()
                    .map(|id| (*id, cluster.index))
            })
            .collect();
        if !dry_run {
            self.conversations
                .assign_clusters(&assignments)
                .await
                .map_err(|e| aborted(step, e, &report))?;
        }
        report.clusters_found = clusters.len() as u64;
        debug!(count = report.clusters_found, "Clusters recomputed");

        // Step 3: retention scores.
        let step = ConsolidationStep::RetentionScores;
        let retention: Vec<(i64, f64)> = conversations
            .iter()
            .map(|c| (c.id, retention_score(c, now)))
            .collect();
        if !dry_run {
            self.conversations
                .update_retention_scores(&retention)
                .await
                .map_err(|e| aborted(step, e, &report))?;
        }
        report.retention_updated = retention.len() as u64;

        // Step 4: archive cold, old conversations. Both conditions are
        // required so a young conversation that merely scores low today is
        // never evicted.
        let step = ConsolidationStep::Archival;
        let retention_by_id: HashMap<i64, f64> = retention.into_iter().collect();
        for conversation in &conversations {
            let score = retention_by_id
                .get(&conversation.id)
                .copied()
                .unwrap_or(0.0);
            if score >= config.retention_threshold {
                continue;
            }
            let old_enough = conversation
                .created_at
                .is_some_and(|ts| (now - ts).num_days() > config.archival_age_floor_days);
            if !old_enough {
                continue;
            }

            if dry_run {
                report.conversations_archived += 1;
                continue;
            }
            match self.conversations.archive(conversation.id, run_id, now).await {
                Ok(()) => report.conversations_archived += 1,
                Err(RepositoryError::Conflict(reason)) => {
                    warn!(id = conversation.id, reason = %reason, "Skipping archival");
                }
                Err(RepositoryError::NotFound) => {
                    warn!(id = conversation.id, "Conversation vanished before archival");
                }
                Err(e) => return Err(aborted(step, e, &report)),
            }
        }
        debug!(count = report.conversations_archived, "Archival pass done");

        // Step 5: access reinforcement. Applies on every pass a record stays
        // over the threshold, not just the first crossing.
        let step = ConsolidationStep::Strengthen;
        let strengthen_ids: Vec<i64> = knowledge
            .iter()
            .filter(|i| i.times_accessed > config.strengthen_access_threshold)
            .map(|i| i.id)
            .collect();
        if !dry_run && !strengthen_ids.is_empty() {
            self.knowledge
                .strengthen(&strengthen_ids)
                .await
                .map_err(|e| aborted(step, e, &report))?;
        }
        report.items_strengthened = strengthen_ids.len() as u64;

        // Step 6: similarity deduplication. Re-read in wet runs so merges
        // see post-strengthen confidences.
        let step = ConsolidationStep::Deduplication;
        if !dry_run {
            knowledge = self
                .knowledge
                .list_active()
                .await
                .map_err(|e| aborted(step, e, &report))?;
        }
        let pairs = find_duplicates(&knowledge, config.similarity_threshold);
        let groups = group_duplicates(&pairs);
        let items_by_id: HashMap<i64, &KnowledgeItem> =
            knowledge.iter().map(|i| (i.id, i)).collect();

        for group in &groups {
            let Some(plan) = plan_merge(group, &items_by_id, config.merge_strategy) else {
                continue;
            };
            if !dry_run {
                match self.knowledge.apply_merge(run_id, &plan, now).await {
                    Ok(()) => {}
                    Err(RepositoryError::Conflict(reason)) => {
                        warn!(primary = plan.primary_id, reason = %reason, "Skipping merge group");
                        continue;
                    }
                    Err(e) => return Err(aborted(step, e, &report)),
                }
            }
            report.duplicate_groups += 1;
            report.items_merged += plan.merged_ids.len() as u64;
        }

        info!(
            run_id = %run_id,
            dry_run,
            archived = report.conversations_archived,
            merged = report.items_merged,
            clusters = report.clusters_found,
            strengthened = report.items_strengthened,
            "Consolidation pass complete"
        );
        Ok(report)
    }
}

/// Wrap a store failure with the step it interrupted and the partial report.
fn aborted(
    step: ConsolidationStep,
    source: RepositoryError,
    report: &ConsolidationReport,
) -> ConsolidateError {
    let mut report = report.clone();
    report.aborted_at = Some(step);
    ConsolidateError::Aborted {
        step,
        source,
        report: Box::new(report),
    }
}
