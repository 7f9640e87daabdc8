//! In-memory repository implementations for engine and service tests.
//!
//! One `MemoryStore` stands in for all repository traits (implemented on
//! `Arc<MemoryStore>` so a single store can back every engine parameter).
//! `fail_on` injects a store failure into a named operation to exercise the
//! abort path.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use engram_types::error::RepositoryError;
use engram_types::record::{
    Conversation, KnowledgeItem, MergeAuditEntry, NewConversation, NewKnowledgeItem,
    NewRelationship, Pattern, Relationship,
};

use crate::dedup::MergeOutcome;
use crate::repository::audit::MergeAuditRepository;
use crate::repository::conversation::ConversationRepository;
use crate::repository::knowledge::KnowledgeRepository;
use crate::repository::lock::ConsolidationLock;
use crate::repository::pattern::PatternRepository;
use crate::repository::relationship::RelationshipRepository;

pub(crate) struct MemoryStore {
    pub conversations: Mutex<Vec<Conversation>>,
    pub knowledge: Mutex<Vec<KnowledgeItem>>,
    pub patterns: Mutex<Vec<Pattern>>,
    pub relationships: Mutex<Vec<Relationship>>,
    pub audits: Mutex<Vec<MergeAuditEntry>>,
    pub lock: Mutex<Option<(Uuid, DateTime<Utc>)>>,
    pub fail_on: Mutex<Option<&'static str>>,
    next_id: Mutex<i64>,
}

impl MemoryStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            conversations: Mutex::new(Vec::new()),
            knowledge: Mutex::new(Vec::new()),
            patterns: Mutex::new(Vec::new()),
            relationships: Mutex::new(Vec::new()),
            audits: Mutex::new(Vec::new()),
            lock: Mutex::new(None),
            fail_on: Mutex::new(None),
            next_id: Mutex::new(0),
        })
    }

    fn next(&self) -> i64 {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        *id
    }

    fn fail_check(&self, op: &'static str) -> Result<(), RepositoryError> {
        if *self.fail_on.lock().unwrap() == Some(op) {
            return Err(RepositoryError::Query(format!("injected failure in {op}")));
        }
        Ok(())
    }

    pub fn lock_holder(&self) -> Option<Uuid> {
        self.lock.lock().unwrap().map(|(id, _)| id)
    }

    pub fn seed_conversation(&self, importance: u8, age_days: i64, times_accessed: i64) -> i64 {
        let id = self.next();
        self.conversations.lock().unwrap().push(Conversation {
            id,
            summary: format!("conversation {id}"),
            created_at: Some(Utc::now() - Duration::days(age_days)),
            last_accessed_at: None,
            times_accessed,
            importance,
            outcome_success: None,
            retention_score: 0.0,
            priority_score: 0.0,
            cluster_id: None,
            archived: false,
        });
        id
    }

    pub fn seed_knowledge(
        &self,
        category: &str,
        key: &str,
        value: &str,
        confidence: f64,
        times_accessed: i64,
    ) -> i64 {
        let id = self.next();
        self.knowledge.lock().unwrap().push(KnowledgeItem {
            id,
            category: category.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            confidence,
            importance: 5,
            times_accessed,
            created_at: Some(Utc::now()),
            last_accessed_at: None,
            priority_score: 0.0,
            superseded_by: None,
        });
        id
    }
}

impl ConversationRepository for Arc<MemoryStore> {
    async fn create(&self, conversation: &NewConversation) -> Result<Conversation, RepositoryError> {
        let id = self.next();
        let record = Conversation {
            id,
            summary: conversation.summary.clone(),
            created_at: Some(conversation.created_at),
            last_accessed_at: None,
            times_accessed: 0,
            importance: conversation.importance,
            outcome_success: conversation.outcome_success,
            retention_score: 0.0,
            priority_score: 0.0,
            cluster_id: None,
            archived: false,
        };
        self.conversations.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<Conversation>, RepositoryError> {
        self.fail_check("list_active_conversations")?;
        let mut active: Vec<Conversation> = self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.archived)
            .cloned()
            .collect();
        active.sort_by_key(|c| (c.created_at.is_none(), c.created_at));
        Ok(active)
    }

    async fn record_access(&self, id: i64, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        conversation.times_accessed += 1;
        conversation.last_accessed_at = Some(at);
        Ok(())
    }

    async fn update_priority_scores(&self, scores: &[(i64, f64)]) -> Result<u64, RepositoryError> {
        self.fail_check("conversation_priority")?;
        let mut conversations = self.conversations.lock().unwrap();
        let mut updated = 0;
        for (id, score) in scores {
            if let Some(c) = conversations.iter_mut().find(|c| c.id == *id) {
                c.priority_score = *score;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn update_retention_scores(&self, scores: &[(i64, f64)]) -> Result<u64, RepositoryError> {
        self.fail_check("update_retention_scores")?;
        let mut conversations = self.conversations.lock().unwrap();
        let mut updated = 0;
        for (id, score) in scores {
            if let Some(c) = conversations.iter_mut().find(|c| c.id == *id) {
                c.retention_score = *score;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn assign_clusters(&self, assignments: &[(i64, i64)]) -> Result<u64, RepositoryError> {
        self.fail_check("assign_clusters")?;
        let mut conversations = self.conversations.lock().unwrap();
        for c in conversations.iter_mut().filter(|c| !c.archived) {
            c.cluster_id = None;
        }
        let mut updated = 0;
        for (id, cluster) in assignments {
            if let Some(c) = conversations.iter_mut().find(|c| c.id == *id) {
                c.cluster_id = Some(*cluster);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn archive(&self, id: i64, _run_id: Uuid, _at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.fail_check("archive")?;
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if conversation.archived {
            return Err(RepositoryError::Conflict("already archived".to_string()));
        }
        conversation.archived = true;
        Ok(())
    }

    async fn count_active(&self) -> Result<i64, RepositoryError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.archived)
            .count() as i64)
    }

    async fn count_archived(&self) -> Result<i64, RepositoryError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.archived)
            .count() as i64)
    }
}

impl KnowledgeRepository for Arc<MemoryStore> {
    async fn create(&self, item: &NewKnowledgeItem) -> Result<KnowledgeItem, RepositoryError> {
        let id = self.next();
        let record = KnowledgeItem {
            id,
            category: item.category.clone(),
            key: item.key.clone(),
            value: item.value.clone(),
            confidence: item.confidence,
            importance: item.importance,
            times_accessed: 0,
            created_at: Some(item.created_at),
            last_accessed_at: None,
            priority_score: 0.0,
            superseded_by: None,
        };
        self.knowledge.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<KnowledgeItem>, RepositoryError> {
        Ok(self
            .knowledge
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<KnowledgeItem>, RepositoryError> {
        self.fail_check("list_active_knowledge")?;
        Ok(self
            .knowledge
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.superseded_by.is_none())
            .cloned()
            .collect())
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<KnowledgeItem>, RepositoryError> {
        Ok(self
            .knowledge
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.superseded_by.is_none() && i.category == category)
            .cloned()
            .collect())
    }

    async fn lookup(&self, category: &str, key: &str) -> Result<Vec<KnowledgeItem>, RepositoryError> {
        Ok(self
            .knowledge
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.superseded_by.is_none() && i.category == category && i.key == key)
            .cloned()
            .collect())
    }

    async fn record_access(&self, id: i64, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut knowledge = self.knowledge.lock().unwrap();
        let item = knowledge
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(RepositoryError::NotFound)?;
        item.times_accessed += 1;
        item.last_accessed_at = Some(at);
        Ok(())
    }

    async fn update_priority_scores(&self, scores: &[(i64, f64)]) -> Result<u64, RepositoryError> {
        self.fail_check("knowledge_priority")?;
        let mut knowledge = self.knowledge.lock().unwrap();
        let mut updated = 0;
        for (id, score) in scores {
            if let Some(i) = knowledge.iter_mut().find(|i| i.id == *id) {
                i.priority_score = *score;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn strengthen(&self, ids: &[i64]) -> Result<u64, RepositoryError> {
        self.fail_check("strengthen")?;
        let mut knowledge = self.knowledge.lock().unwrap();
        let mut updated = 0;
        for id in ids {
            if let Some(i) = knowledge.iter_mut().find(|i| i.id == *id) {
                i.confidence = (i.confidence + 0.1).min(1.0);
                i.importance = (i.importance + 1).min(10);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn apply_merge(
        &self,
        run_id: Uuid,
        outcome: &MergeOutcome,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.fail_check("apply_merge")?;
        let mut knowledge = self.knowledge.lock().unwrap();
        let primary = knowledge
            .iter_mut()
            .find(|i| i.id == outcome.primary_id)
            .ok_or(RepositoryError::NotFound)?;
        if primary.superseded_by.is_some() {
            return Err(RepositoryError::Conflict(
                "primary already superseded".to_string(),
            ));
        }
        primary.value = outcome.value.clone();
        primary.confidence = outcome.confidence;
        primary.times_accessed = outcome.times_accessed;
        for id in &outcome.merged_ids {
            if let Some(i) = knowledge.iter_mut().find(|i| i.id == *id) {
                i.superseded_by = Some(outcome.primary_id);
            }
        }
        drop(knowledge);

        let audit_id = self.next();
        self.audits.lock().unwrap().push(MergeAuditEntry {
            id: audit_id,
            run_id,
            primary_id: outcome.primary_id,
            merged_ids: outcome.merged_ids.clone(),
            strategy: outcome.strategy,
            snapshot: outcome.snapshot.clone(),
            created_at: at,
        });
        Ok(())
    }

    async fn count_active(&self) -> Result<i64, RepositoryError> {
        Ok(self
            .knowledge
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.superseded_by.is_none())
            .count() as i64)
    }

    async fn count_superseded(&self) -> Result<i64, RepositoryError> {
        Ok(self
            .knowledge
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.superseded_by.is_some())
            .count() as i64)
    }
}

impl PatternRepository for Arc<MemoryStore> {
    async fn observe(
        &self,
        pattern_type: &str,
        data_fingerprint: &str,
        outcome_success: bool,
        seen_at: DateTime<Utc>,
    ) -> Result<Pattern, RepositoryError> {
        let mut patterns = self.patterns.lock().unwrap();
        let outcome = if outcome_success { 1.0 } else { 0.0 };
        if let Some(p) = patterns
            .iter_mut()
            .find(|p| p.pattern_type == pattern_type && p.data_fingerprint == data_fingerprint)
        {
            let old_frequency = p.frequency as f64;
            p.frequency += 1;
            p.success_rate = (p.success_rate * old_frequency + outcome) / p.frequency as f64;
            p.last_seen_at = seen_at;
            return Ok(p.clone());
        }
        drop(patterns);
        let id = self.next();
        let pattern = Pattern {
            id,
            pattern_type: pattern_type.to_string(),
            data_fingerprint: data_fingerprint.to_string(),
            frequency: 1,
            success_rate: outcome,
            last_seen_at: seen_at,
        };
        self.patterns.lock().unwrap().push(pattern.clone());
        Ok(pattern)
    }

    async fn get(
        &self,
        pattern_type: &str,
        data_fingerprint: &str,
    ) -> Result<Option<Pattern>, RepositoryError> {
        Ok(self
            .patterns
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.pattern_type == pattern_type && p.data_fingerprint == data_fingerprint)
            .cloned())
    }

    async fn list(&self, limit: Option<i64>) -> Result<Vec<Pattern>, RepositoryError> {
        let mut patterns: Vec<Pattern> = self.patterns.lock().unwrap().clone();
        patterns.sort_by_key(|p| std::cmp::Reverse(p.frequency));
        if let Some(limit) = limit {
            patterns.truncate(limit.max(0) as usize);
        }
        Ok(patterns)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.patterns.lock().unwrap().len() as i64)
    }
}

impl RelationshipRepository for Arc<MemoryStore> {
    async fn create(&self, relationship: &NewRelationship) -> Result<Relationship, RepositoryError> {
        let id = self.next();
        let record = Relationship {
            id,
            from_item: relationship.from_item,
            to_item: relationship.to_item,
            relation_type: relationship.relation_type.clone(),
            strength: relationship.strength,
            bidirectional: relationship.bidirectional,
            verified: false,
            created_at: relationship.created_at,
        };
        self.relationships.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn for_item(&self, item_id: i64) -> Result<Vec<Relationship>, RepositoryError> {
        Ok(self
            .relationships
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.from_item == item_id || (r.bidirectional && r.to_item == item_id))
            .cloned()
            .collect())
    }

    async fn set_verified(&self, id: i64, verified: bool) -> Result<(), RepositoryError> {
        let mut relationships = self.relationships.lock().unwrap();
        let relationship = relationships
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::NotFound)?;
        relationship.verified = verified;
        Ok(())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.relationships.lock().unwrap().len() as i64)
    }
}

impl MergeAuditRepository for Arc<MemoryStore> {
    async fn list(&self, limit: Option<i64>) -> Result<Vec<MergeAuditEntry>, RepositoryError> {
        let mut audits: Vec<MergeAuditEntry> = self.audits.lock().unwrap().clone();
        audits.reverse();
        if let Some(limit) = limit {
            audits.truncate(limit.max(0) as usize);
        }
        Ok(audits)
    }

    async fn for_item(&self, item_id: i64) -> Result<Vec<MergeAuditEntry>, RepositoryError> {
        Ok(self
            .audits
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.primary_id == item_id || a.merged_ids.contains(&item_id))
            .cloned()
            .collect())
    }
}

impl ConsolidationLock for Arc<MemoryStore> {
    async fn try_acquire(&self, run_id: Uuid, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let mut lock = self.lock.lock().unwrap();
        if lock.is_some() {
            return Ok(false);
        }
        *lock = Some((run_id, at));
        Ok(true)
    }

    async fn release(&self, run_id: Uuid) -> Result<(), RepositoryError> {
        let mut lock = self.lock.lock().unwrap();
        if lock.map(|(id, _)| id) == Some(run_id) {
            *lock = None;
        }
        Ok(())
    }

    async fn holder(&self) -> Result<Option<(Uuid, DateTime<Utc>)>, RepositoryError> {
        Ok(*self.lock.lock().unwrap())
    }

    async fn force_release(&self) -> Result<(), RepositoryError> {
        *self.lock.lock().unwrap() = None;
        Ok(())
    }
}
