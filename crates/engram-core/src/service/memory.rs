//! Memory service: the ingestion and access surface of the store.
//!
//! This is what the surrounding runtime calls. Writes assign the initial
//! priority score so new records rank sensibly before the first
//! consolidation pass; read paths bump access counters, which feed both
//! scorers and the strengthen rule on the next pass.

use chrono::Utc;
use tracing::{info, warn};

use engram_types::error::RepositoryError;
use engram_types::record::{
    Conversation, KnowledgeItem, NewConversation, NewKnowledgeItem, NewRelationship, Pattern,
    RelationType, Relationship,
};

use crate::repository::conversation::ConversationRepository;
use crate::repository::knowledge::KnowledgeRepository;
use crate::repository::pattern::PatternRepository;
use crate::repository::relationship::RelationshipRepository;
use crate::score::priority::priority_score;
use crate::service::hash::FingerprintHasher;

/// Ingestion and access surface over the record store.
///
/// Generic over the repository traits and the fingerprint hasher to keep
/// clean architecture (engram-core never depends on engram-infra).
pub struct MemoryService<C, K, P, R, H> {
    conversations: C,
    knowledge: K,
    patterns: P,
    relationships: R,
    hasher: H,
}

impl<C, K, P, R, H> MemoryService<C, K, P, R, H>
where
    C: ConversationRepository,
    K: KnowledgeRepository,
    P: PatternRepository,
    R: RelationshipRepository,
    H: FingerprintHasher,
{
    pub fn new(conversations: C, knowledge: K, patterns: P, relationships: R, hasher: H) -> Self {
        Self {
            conversations,
            knowledge,
            patterns,
            relationships,
            hasher,
        }
    }

    /// Access the conversation repository.
    pub fn conversations(&self) -> &C {
        &self.conversations
    }

    /// Access the knowledge repository.
    pub fn knowledge(&self) -> &K {
        &self.knowledge
    }

    /// Access the pattern repository.
    pub fn patterns(&self) -> &P {
        &self.patterns
    }

    /// Access the relationship repository.
    pub fn relationships(&self) -> &R {
        &self.relationships
    }

    // --- Ingestion ---

    /// Persist a new conversation and assign its initial priority score.
    ///
    /// Importance is clamped to 1..=10; producers occasionally send 0 or
    /// out-of-scale values.
    #[tracing::instrument(skip(self, conversation), fields(importance = conversation.importance))]
    pub async fn record_conversation(
        &self,
        mut conversation: NewConversation,
    ) -> Result<Conversation, RepositoryError> {
        conversation.importance = conversation.importance.clamp(1, 10);
        let mut created = self.conversations.create(&conversation).await?;
        let score = priority_score(&created, Utc::now());
        self.conversations
            .update_priority_scores(&[(created.id, score)])
            .await?;
        created.priority_score = score;
        info!(id = created.id, score, "Conversation recorded");
        Ok(created)
    }

    /// Persist a new knowledge item and assign its initial priority score.
    #[tracing::instrument(skip(self, item), fields(category = %item.category))]
    pub async fn record_knowledge(
        &self,
        mut item: NewKnowledgeItem,
    ) -> Result<KnowledgeItem, RepositoryError> {
        item.importance = item.importance.clamp(1, 10);
        item.confidence = item.confidence.clamp(0.0, 1.0);
        let mut created = self.knowledge.create(&item).await?;
        let score = priority_score(&created, Utc::now());
        self.knowledge
            .update_priority_scores(&[(created.id, score)])
            .await?;
        created.priority_score = score;
        info!(id = created.id, score, "Knowledge item recorded");
        Ok(created)
    }

    /// Record one occurrence of a behavioral pattern.
    ///
    /// The payload is fingerprinted and upserted: a repeat occurrence bumps
    /// frequency and folds the outcome into the running success rate.
    pub async fn observe_pattern(
        &self,
        pattern_type: &str,
        payload: &str,
        outcome_success: bool,
    ) -> Result<Pattern, RepositoryError> {
        let fingerprint = self.hasher.fingerprint(payload);
        self.patterns
            .observe(pattern_type, &fingerprint, outcome_success, Utc::now())
            .await
    }

    // --- Read paths ---

    /// Bump a conversation's access counter (read-path side effect).
    pub async fn touch_conversation(&self, id: i64) -> Result<(), RepositoryError> {
        self.conversations.record_access(id, Utc::now()).await
    }

    /// Bump a knowledge item's access counter (read-path side effect).
    pub async fn touch_knowledge(&self, id: i64) -> Result<(), RepositoryError> {
        self.knowledge.record_access(id, Utc::now()).await
    }

    /// Exact category+key lookup. Superseded items are never returned.
    pub async fn lookup_knowledge(
        &self,
        category: &str,
        key: &str,
    ) -> Result<Vec<KnowledgeItem>, RepositoryError> {
        self.knowledge.lookup(category, key).await
    }

    // --- Relationships ---

    /// Link two knowledge items.
    ///
    /// Both endpoints must exist and be active; linking to a superseded item
    /// would create a stale reference on day one.
    pub async fn link_items(
        &self,
        from_item: i64,
        to_item: i64,
        relation_type: RelationType,
        strength: f64,
        bidirectional: bool,
    ) -> Result<Relationship, RepositoryError> {
        for id in [from_item, to_item] {
            let item = self.knowledge.get(id).await?.ok_or(RepositoryError::NotFound)?;
            if item.superseded_by.is_some() {
                return Err(RepositoryError::Conflict(format!(
                    "knowledge item {id} is superseded"
                )));
            }
        }
        self.relationships
            .create(&NewRelationship {
                from_item,
                to_item,
                relation_type,
                strength,
                bidirectional,
                created_at: Utc::now(),
            })
            .await
    }

    /// Traverse relationships from an item, resolving the far endpoint.
    ///
    /// Edges whose far endpoint was superseded or deleted are filtered out
    /// (relationships are never auto-deleted, so stale edges are expected).
    pub async fn related_items(
        &self,
        item_id: i64,
    ) -> Result<Vec<(Relationship, KnowledgeItem)>, RepositoryError> {
        let edges = self.relationships.for_item(item_id).await?;
        let mut related = Vec::with_capacity(edges.len());
        for edge in edges {
            let far_id = if edge.from_item == item_id {
                edge.to_item
            } else {
                edge.from_item
            };
            match self.knowledge.get(far_id).await? {
                Some(item) if item.superseded_by.is_none() => related.push((edge, item)),
                Some(_) => {
                    warn!(edge = edge.id, far_id, "Skipping stale relationship endpoint");
                }
                None => {
                    warn!(edge = edge.id, far_id, "Relationship endpoint missing");
                }
            }
        }
        Ok(related)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use std::sync::Arc;

    /// Deterministic stand-in for the SHA-256 hasher in infra.
    struct StubHasher;

    impl FingerprintHasher for StubHasher {
        fn fingerprint(&self, payload: &str) -> String {
            format!("fp:{payload}")
        }
    }

    fn service(
        store: &Arc<MemoryStore>,
    ) -> MemoryService<Arc<MemoryStore>, Arc<MemoryStore>, Arc<MemoryStore>, Arc<MemoryStore>, StubHasher>
    {
        MemoryService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            StubHasher,
        )
    }

    fn new_knowledge(category: &str, key: &str, value: &str) -> NewKnowledgeItem {
        NewKnowledgeItem {
            category: category.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            confidence: 0.8,
            importance: 5,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_conversation_assigns_initial_priority() {
        let store = MemoryStore::shared();
        let created = service(&store)
            .record_conversation(NewConversation {
                summary: "talked about the trip to Porto".to_string(),
                importance: 7,
                outcome_success: Some(true),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(created.priority_score > 0.0);
        let stored = store.conversations.lock().unwrap();
        assert_eq!(stored[0].priority_score, created.priority_score);
    }

    #[tokio::test]
    async fn test_record_conversation_clamps_importance() {
        let store = MemoryStore::shared();
        let created = service(&store)
            .record_conversation(NewConversation {
                summary: "out-of-scale importance".to_string(),
                importance: 14,
                outcome_success: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(created.importance, 10);
    }

    #[tokio::test]
    async fn test_touch_bumps_access_counter() {
        let store = MemoryStore::shared();
        let svc = service(&store);
        let created = svc
            .record_knowledge(new_knowledge("fact", "city", "lisbon"))
            .await
            .unwrap();

        svc.touch_knowledge(created.id).await.unwrap();
        svc.touch_knowledge(created.id).await.unwrap();

        let items = store.knowledge.lock().unwrap();
        assert_eq!(items[0].times_accessed, 2);
        assert!(items[0].last_accessed_at.is_some());
    }

    #[tokio::test]
    async fn test_lookup_excludes_superseded() {
        let store = MemoryStore::shared();
        let svc = service(&store);
        let a = svc
            .record_knowledge(new_knowledge("fact", "city", "lisbon"))
            .await
            .unwrap();
        let b = svc
            .record_knowledge(new_knowledge("fact", "city", "lisboa"))
            .await
            .unwrap();
        {
            let mut items = store.knowledge.lock().unwrap();
            items
                .iter_mut()
                .find(|i| i.id == b.id)
                .unwrap()
                .superseded_by = Some(a.id);
        }

        let found = svc.lookup_knowledge("fact", "city").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);
    }

    #[tokio::test]
    async fn test_observe_pattern_running_average() {
        let store = MemoryStore::shared();
        let svc = service(&store);

        let first = svc
            .observe_pattern("morning_briefing", "{\"topic\":\"weather\"}", true)
            .await
            .unwrap();
        assert_eq!(first.frequency, 1);
        assert_eq!(first.success_rate, 1.0);

        let second = svc
            .observe_pattern("morning_briefing", "{\"topic\":\"weather\"}", false)
            .await
            .unwrap();
        assert_eq!(second.frequency, 2);
        assert!((second.success_rate - 0.5).abs() < 1e-9);

        // Different payload fingerprints to a different pattern row.
        let other = svc
            .observe_pattern("morning_briefing", "{\"topic\":\"news\"}", true)
            .await
            .unwrap();
        assert_eq!(other.frequency, 1);
    }

    #[tokio::test]
    async fn test_link_rejects_superseded_endpoint() {
        let store = MemoryStore::shared();
        let svc = service(&store);
        let a = svc
            .record_knowledge(new_knowledge("fact", "city", "lisbon"))
            .await
            .unwrap();
        let b = svc
            .record_knowledge(new_knowledge("fact", "country", "portugal"))
            .await
            .unwrap();
        {
            let mut items = store.knowledge.lock().unwrap();
            items
                .iter_mut()
                .find(|i| i.id == b.id)
                .unwrap()
                .superseded_by = Some(a.id);
        }

        let err = svc
            .link_items(a.id, b.id, RelationType::PartOf, 0.9, false)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_related_items_filters_stale_edges() {
        let store = MemoryStore::shared();
        let svc = service(&store);
        let a = svc
            .record_knowledge(new_knowledge("fact", "city", "lisbon"))
            .await
            .unwrap();
        let b = svc
            .record_knowledge(new_knowledge("fact", "country", "portugal"))
            .await
            .unwrap();
        let c = svc
            .record_knowledge(new_knowledge("fact", "river", "tagus"))
            .await
            .unwrap();

        svc.link_items(a.id, b.id, RelationType::PartOf, 0.9, false)
            .await
            .unwrap();
        svc.link_items(a.id, c.id, RelationType::RelatedTo, 0.5, true)
            .await
            .unwrap();

        // Supersede one endpoint after linking: the edge stays but traversal
        // must skip it.
        {
            let mut items = store.knowledge.lock().unwrap();
            items
                .iter_mut()
                .find(|i| i.id == c.id)
                .unwrap()
                .superseded_by = Some(a.id);
        }

        let related = svc.related_items(a.id).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].1.id, b.id);
        assert_eq!(store.relationships.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bidirectional_edge_traversable_from_both_ends() {
        let store = MemoryStore::shared();
        let svc = service(&store);
        let a = svc
            .record_knowledge(new_knowledge("fact", "city", "lisbon"))
            .await
            .unwrap();
        let b = svc
            .record_knowledge(new_knowledge("fact", "country", "portugal"))
            .await
            .unwrap();

        svc.link_items(a.id, b.id, RelationType::RelatedTo, 0.7, true)
            .await
            .unwrap();

        assert_eq!(svc.related_items(a.id).await.unwrap().len(), 1);
        assert_eq!(svc.related_items(b.id).await.unwrap().len(), 1);
    }
}
