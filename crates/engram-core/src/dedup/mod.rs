//! Near-duplicate detection and merge planning for knowledge items.
//!
//! Pairwise comparison is restricted to same-category buckets (cross-category
//! pairs score 0 and are never candidates), duplicate pairs are folded into
//! merge groups union-find style, and each group gets a merge plan under the
//! configured strategy. Planning is pure; the store applies a plan in one
//! transaction (`KnowledgeRepository::apply_merge`).

pub mod similarity;

use std::collections::HashMap;

use engram_types::record::{KnowledgeItem, MergeStrategy};

pub use similarity::similarity;

/// Default minimum composite similarity for a duplicate pair.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// A candidate duplicate pair and its composite similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    pub a_id: i64,
    pub b_id: i64,
    pub similarity: f64,
}

/// A set of mutually-duplicate items to collapse into the primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// The surviving item: the lowest/first-seen id in the group.
    pub primary_id: i64,
    /// Every member, primary included, in discovery order.
    pub member_ids: Vec<i64>,
}

/// The planned effect of merging one group, ready for the store to apply.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub primary_id: i64,
    /// Non-primary members; each gets `superseded_by = primary_id`.
    pub merged_ids: Vec<i64>,
    pub strategy: MergeStrategy,
    /// Final value for the primary, per strategy.
    pub value: String,
    /// Final confidence for the primary, per strategy.
    pub confidence: f64,
    /// Access counts are always summed across the group.
    pub times_accessed: i64,
    /// Pre-merge state of every member, primary included, for the audit row.
    pub snapshot: Vec<KnowledgeItem>,
}

/// Find all candidate duplicate pairs at or above `threshold`.
///
/// O(n^2) within each category bucket; superseded items are skipped even if
/// the caller passes them.
pub fn find_duplicates(items: &[KnowledgeItem], threshold: f64) -> Vec<DuplicatePair> {
    let mut buckets: HashMap<&str, Vec<&KnowledgeItem>> = HashMap::new();
    for item in items.iter().filter(|i| i.superseded_by.is_none()) {
        buckets.entry(item.category.as_str()).or_default().push(item);
    }

    // Deterministic pair order regardless of hash iteration.
    let mut categories: Vec<&str> = buckets.keys().copied().collect();
    categories.sort_unstable();

    let mut pairs = Vec::new();
    for category in categories {
        let bucket = &buckets[category];
        for i in 0..bucket.len() {
            for j in (i + 1)..bucket.len() {
                let score = similarity(bucket[i], bucket[j]);
                if score >= threshold {
                    pairs.push(DuplicatePair {
                        a_id: bucket[i].id,
                        b_id: bucket[j].id,
                        similarity: score,
                    });
                }
            }
        }
    }

    pairs
}

/// Fold duplicate pairs into merge groups.
///
/// Union-find style: a pair joins an existing group when either endpoint is
/// already a member; otherwise it seeds a new group whose primary is the
/// lower of the two ids. A pair bridging two existing groups unions them,
/// keeping the older group's primary.
pub fn group_duplicates(pairs: &[DuplicatePair]) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut membership: HashMap<i64, usize> = HashMap::new();

    for pair in pairs {
        match (
            membership.get(&pair.a_id).copied(),
            membership.get(&pair.b_id).copied(),
        ) {
            (Some(ga), Some(gb)) => {
                if ga != gb {
                    // Bridge: move the younger group's members into the older.
                    let (keep, drain) = if ga < gb { (ga, gb) } else { (gb, ga) };
                    let moved = std::mem::take(&mut groups[drain].member_ids);
                    for id in moved {
                        membership.insert(id, keep);
                        groups[keep].member_ids.push(id);
                    }
                }
            }
            (Some(g), None) => {
                groups[g].member_ids.push(pair.b_id);
                membership.insert(pair.b_id, g);
            }
            (None, Some(g)) => {
                groups[g].member_ids.push(pair.a_id);
                membership.insert(pair.a_id, g);
            }
            (None, None) => {
                let idx = groups.len();
                groups.push(DuplicateGroup {
                    primary_id: pair.a_id.min(pair.b_id),
                    member_ids: vec![pair.a_id, pair.b_id],
                });
                membership.insert(pair.a_id, idx);
                membership.insert(pair.b_id, idx);
            }
        }
    }

    // Drop groups emptied by unions.
    groups.retain(|g| !g.member_ids.is_empty());
    groups
}

/// Plan the merge for one group under the given strategy.
///
/// Returns `None` for degenerate groups (fewer than two resolvable members):
/// a group of size 1 is never merged.
pub fn plan_merge(
    group: &DuplicateGroup,
    items_by_id: &HashMap<i64, &KnowledgeItem>,
    strategy: MergeStrategy,
) -> Option<MergeOutcome> {
    let members: Vec<&KnowledgeItem> = group
        .member_ids
        .iter()
        .filter_map(|id| items_by_id.get(id).copied())
        .collect();
    if members.len() < 2 {
        return None;
    }

    let (value, confidence) = match strategy {
        MergeStrategy::KeepHighestConfidence => {
            let best = members
                .iter()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))?;
            (best.value.clone(), best.confidence)
        }
        MergeStrategy::KeepNewest => {
            // Items without a creation time sort oldest.
            let newest = members.iter().max_by_key(|i| i.created_at)?;
            (newest.value.clone(), newest.confidence)
        }
        MergeStrategy::CombineValues => {
            let mut seen = Vec::new();
            for member in &members {
                if !seen.contains(&member.value.as_str()) {
                    seen.push(member.value.as_str());
                }
            }
            let combined = seen.join(", ");
            let best_confidence = members
                .iter()
                .map(|i| i.confidence)
                .fold(f64::NEG_INFINITY, f64::max);
            (combined, best_confidence)
        }
    };

    let times_accessed = members.iter().map(|i| i.times_accessed).sum();
    let merged_ids: Vec<i64> = group
        .member_ids
        .iter()
        .copied()
        .filter(|id| *id != group.primary_id)
        .collect();

    Some(MergeOutcome {
        primary_id: group.primary_id,
        merged_ids,
        strategy,
        value,
        confidence,
        times_accessed,
        snapshot: members.into_iter().cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(id: i64, category: &str, key: &str, value: &str, confidence: f64) -> KnowledgeItem {
        KnowledgeItem {
            id,
            category: category.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            confidence,
            importance: 5,
            times_accessed: id * 10,
            created_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            last_accessed_at: None,
            priority_score: 0.0,
            superseded_by: None,
        }
    }

    #[test]
    fn test_identical_pair_found_at_any_threshold() {
        let items = vec![
            item(1, "fact", "birthday", "march 3", 0.8),
            item(2, "fact", "birthday", "march 3", 0.6),
        ];
        let pairs = find_duplicates(&items, 1.0);
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_category_never_paired() {
        let items = vec![
            item(1, "fact", "birthday", "march 3", 0.8),
            item(2, "preference", "birthday", "march 3", 0.6),
        ];
        assert!(find_duplicates(&items, 0.0).is_empty());
    }

    #[test]
    fn test_superseded_items_excluded() {
        let mut ghost = item(2, "fact", "birthday", "march 3", 0.6);
        ghost.superseded_by = Some(1);
        let items = vec![item(1, "fact", "birthday", "march 3", 0.8), ghost];
        assert!(find_duplicates(&items, 0.85).is_empty());
    }

    #[test]
    fn test_grouping_chains_transitively() {
        let pairs = vec![
            DuplicatePair { a_id: 1, b_id: 2, similarity: 0.9 },
            DuplicatePair { a_id: 2, b_id: 3, similarity: 0.9 },
        ];
        let groups = group_duplicates(&pairs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].primary_id, 1);
        assert_eq!(groups[0].member_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_grouping_bridge_unions_groups() {
        let pairs = vec![
            DuplicatePair { a_id: 1, b_id: 2, similarity: 0.9 },
            DuplicatePair { a_id: 3, b_id: 4, similarity: 0.9 },
            DuplicatePair { a_id: 2, b_id: 3, similarity: 0.9 },
        ];
        let groups = group_duplicates(&pairs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].primary_id, 1);
        let mut members = groups[0].member_ids.clone();
        members.sort_unstable();
        assert_eq!(members, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_independent_groups_stay_separate() {
        let pairs = vec![
            DuplicatePair { a_id: 1, b_id: 2, similarity: 0.9 },
            DuplicatePair { a_id: 7, b_id: 9, similarity: 0.9 },
        ];
        let groups = group_duplicates(&pairs);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].primary_id, 1);
        assert_eq!(groups[1].primary_id, 7);
    }

    #[test]
    fn test_plan_keep_highest_confidence() {
        let a = item(1, "fact", "k", "low", 0.4);
        let b = item(2, "fact", "k", "high", 0.9);
        let c = item(3, "fact", "k", "mid", 0.6);
        let by_id: HashMap<i64, &KnowledgeItem> =
            [(1, &a), (2, &b), (3, &c)].into_iter().collect();
        let group = DuplicateGroup { primary_id: 1, member_ids: vec![1, 2, 3] };

        let plan = plan_merge(&group, &by_id, MergeStrategy::KeepHighestConfidence).unwrap();
        assert_eq!(plan.primary_id, 1);
        assert_eq!(plan.value, "high");
        assert!((plan.confidence - 0.9).abs() < 1e-9);
        // times_accessed summed: 10 + 20 + 30
        assert_eq!(plan.times_accessed, 60);
        assert_eq!(plan.merged_ids, vec![2, 3]);
        assert_eq!(plan.snapshot.len(), 3);
    }

    #[test]
    fn test_plan_keep_newest() {
        let mut a = item(1, "fact", "k", "old", 0.9);
        a.created_at = Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        let mut b = item(2, "fact", "k", "new", 0.4);
        b.created_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let by_id: HashMap<i64, &KnowledgeItem> = [(1, &a), (2, &b)].into_iter().collect();
        let group = DuplicateGroup { primary_id: 1, member_ids: vec![1, 2] };

        let plan = plan_merge(&group, &by_id, MergeStrategy::KeepNewest).unwrap();
        assert_eq!(plan.value, "new");
        assert!((plan.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_plan_combine_values_dedups_in_order() {
        let a = item(1, "fact", "k", "espresso", 0.5);
        let b = item(2, "fact", "k", "cortado", 0.7);
        let c = item(3, "fact", "k", "espresso", 0.6);
        let by_id: HashMap<i64, &KnowledgeItem> =
            [(1, &a), (2, &b), (3, &c)].into_iter().collect();
        let group = DuplicateGroup { primary_id: 1, member_ids: vec![1, 2, 3] };

        let plan = plan_merge(&group, &by_id, MergeStrategy::CombineValues).unwrap();
        assert_eq!(plan.value, "espresso, cortado");
        assert!((plan.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_singleton_group_never_merged() {
        let a = item(1, "fact", "k", "v", 0.5);
        let by_id: HashMap<i64, &KnowledgeItem> = [(1, &a)].into_iter().collect();
        let group = DuplicateGroup { primary_id: 1, member_ids: vec![1] };
        assert!(plan_merge(&group, &by_id, MergeStrategy::KeepNewest).is_none());
    }
}
