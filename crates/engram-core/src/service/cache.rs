//! Read-through cache over the record store.
//!
//! Owned explicitly by the caller (the chat runtime, a REPL, whatever sits
//! above the store) -- never a process-wide singleton. Warm it from the store
//! at startup with the highest-priority records, read through it for point
//! lookups, and invalidate on every write. Consolidation rewrites scores and
//! supersedes items, so callers should `clear` after a pass.

use std::collections::HashMap;

use engram_types::error::RepositoryError;
use engram_types::record::{Conversation, KnowledgeItem};

use crate::repository::conversation::ConversationRepository;
use crate::repository::knowledge::KnowledgeRepository;

/// Default number of records of each kind kept after a warm.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Explicit read-through cache of hot conversations and knowledge items.
pub struct RecallCache {
    capacity: usize,
    conversations: HashMap<i64, Conversation>,
    knowledge: HashMap<i64, KnowledgeItem>,
}

impl RecallCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            conversations: HashMap::new(),
            knowledge: HashMap::new(),
        }
    }

    /// Populate with the highest-priority active records of each kind.
    pub async fn warm<C, K>(&mut self, conversations: &C, knowledge: &K) -> Result<(), RepositoryError>
    where
        C: ConversationRepository,
        K: KnowledgeRepository,
    {
        let mut active = conversations.list_active().await?;
        active.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
        self.conversations = active
            .into_iter()
            .take(self.capacity)
            .map(|c| (c.id, c))
            .collect();

        let mut items = knowledge.list_active().await?;
        items.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
        self.knowledge = items
            .into_iter()
            .take(self.capacity)
            .map(|i| (i.id, i))
            .collect();

        Ok(())
    }

    /// Get a conversation, reading through to the store on a miss.
    pub async fn conversation<C>(
        &mut self,
        repo: &C,
        id: i64,
    ) -> Result<Option<Conversation>, RepositoryError>
    where
        C: ConversationRepository,
    {
        if let Some(cached) = self.conversations.get(&id) {
            return Ok(Some(cached.clone()));
        }
        let fetched = repo.get(id).await?;
        if let Some(conversation) = &fetched {
            if self.conversations.len() < self.capacity {
                self.conversations.insert(id, conversation.clone());
            }
        }
        Ok(fetched)
    }

    /// Get a knowledge item, reading through to the store on a miss.
    pub async fn knowledge<K>(
        &mut self,
        repo: &K,
        id: i64,
    ) -> Result<Option<KnowledgeItem>, RepositoryError>
    where
        K: KnowledgeRepository,
    {
        if let Some(cached) = self.knowledge.get(&id) {
            return Ok(Some(cached.clone()));
        }
        let fetched = repo.get(id).await?;
        if let Some(item) = &fetched {
            if self.knowledge.len() < self.capacity {
                self.knowledge.insert(id, item.clone());
            }
        }
        Ok(fetched)
    }

    /// Drop one conversation. Call after any write touching it.
    pub fn invalidate_conversation(&mut self, id: i64) {
        self.conversations.remove(&id);
    }

    /// Drop one knowledge item. Call after any write touching it.
    pub fn invalidate_knowledge(&mut self, id: i64) {
        self.knowledge.remove(&id);
    }

    /// Drop everything. Call after a consolidation pass: scores, cluster
    /// assignments, and supersede markers may all have changed.
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.knowledge.clear();
    }

    pub fn len(&self) -> usize {
        self.conversations.len() + self.knowledge.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty() && self.knowledge.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    #[tokio::test]
    async fn test_warm_keeps_highest_priority() {
        let store = MemoryStore::shared();
        for i in 0..5 {
            let id = store.seed_knowledge("fact", &format!("k{i}"), "v", 0.5, 0);
            let mut items = store.knowledge.lock().unwrap();
            items.iter_mut().find(|x| x.id == id).unwrap().priority_score = i as f64;
        }

        let mut cache = RecallCache::new(2);
        cache.warm(&store, &store).await.unwrap();
        assert_eq!(cache.len(), 2);
        // The two highest-priority items survived the capacity cut.
        assert!(cache.knowledge.values().all(|i| i.priority_score >= 3.0));
    }

    #[tokio::test]
    async fn test_read_through_on_miss() {
        let store = MemoryStore::shared();
        let id = store.seed_conversation(5, 1, 0);

        let mut cache = RecallCache::new(8);
        assert!(cache.is_empty());

        let fetched = cache.conversation(&store, id).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(cache.len(), 1);

        // A second read hits the cache even if the store row changes.
        {
            let mut conversations = store.conversations.lock().unwrap();
            conversations.iter_mut().find(|c| c.id == id).unwrap().summary =
                "rewritten".to_string();
        }
        let cached = cache.conversation(&store, id).await.unwrap().unwrap();
        assert_ne!(cached.summary, "rewritten");
    }

    #[tokio::test]
    async fn test_invalidate_rereads_store() {
        let store = MemoryStore::shared();
        let id = store.seed_conversation(5, 1, 0);

        let mut cache = RecallCache::new(8);
        cache.conversation(&store, id).await.unwrap();
        {
            let mut conversations = store.conversations.lock().unwrap();
            conversations.iter_mut().find(|c| c.id == id).unwrap().summary =
                "rewritten".to_string();
        }

        cache.invalidate_conversation(id);
        let fresh = cache.conversation(&store, id).await.unwrap().unwrap();
        assert_eq!(fresh.summary, "rewritten");
    }

    #[tokio::test]
    async fn test_clear_empties_both_kinds() {
        let store = MemoryStore::shared();
        let conversation_id = store.seed_conversation(5, 1, 0);
        let knowledge_id = store.seed_knowledge("fact", "k", "v", 0.5, 0);

        let mut cache = RecallCache::new(8);
        cache.conversation(&store, conversation_id).await.unwrap();
        cache.knowledge(&store, knowledge_id).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_miss_on_unknown_id() {
        let store = MemoryStore::shared();
        let mut cache = RecallCache::new(8);
        assert!(cache.conversation(&store, 404).await.unwrap().is_none());
        assert!(cache.is_empty());
    }
}
