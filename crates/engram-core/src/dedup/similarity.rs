//! Weighted string similarity between knowledge items.

use engram_types::record::KnowledgeItem;

const KEY_WEIGHT: f64 = 0.4;
const VALUE_WEIGHT: f64 = 0.3;

/// Flat contribution for sharing a category. Two same-category items with no
/// textual overlap still score 0.3; the default 0.85 threshold assumes this
/// baseline is present.
const CATEGORY_BASELINE: f64 = 0.3;

/// Composite similarity in [0, 1].
///
/// Items in different categories are never comparable and score 0.0.
/// Otherwise `0.4*key_similarity + 0.3*value_similarity + 0.3`, where each
/// text similarity is normalized Levenshtein over the lowercased strings.
pub fn similarity(a: &KnowledgeItem, b: &KnowledgeItem) -> f64 {
    if a.category != b.category {
        return 0.0;
    }

    KEY_WEIGHT * text_similarity(&a.key, &b.key)
        + VALUE_WEIGHT * text_similarity(&a.value, &b.value)
        + CATEGORY_BASELINE
}

/// Normalized edit similarity: `1 - levenshtein(a, b)/max(len)`, computed
/// over lowercased characters. Two empty strings are identical (1.0).
fn text_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// Levenshtein edit distance with a rolling two-row table.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(category: &str, key: &str, value: &str) -> KnowledgeItem {
        KnowledgeItem {
            id: 0,
            category: category.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            confidence: 0.5,
            importance: 5,
            times_accessed: 0,
            created_at: None,
            last_accessed_at: None,
            priority_score: 0.0,
            superseded_by: None,
        }
    }

    #[test]
    fn test_levenshtein_known_distances() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein(&chars("flaw"), &chars("lawn")), 2);
        assert_eq!(levenshtein(&chars("abc"), &chars("abc")), 0);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein(&chars("abc"), &chars("")), 3);
    }

    #[test]
    fn test_identical_items_score_one() {
        let a = item("preference", "favorite_editor", "helix");
        let b = item("preference", "favorite_editor", "helix");
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_categories_score_zero() {
        let a = item("preference", "favorite_editor", "helix");
        let b = item("fact", "favorite_editor", "helix");
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_same_category_baseline() {
        // No textual overlap at all still registers the category baseline.
        let a = item("fact", "aaaa", "bbbb");
        let b = item("fact", "cccc", "dddd");
        assert!((similarity(&a, &b) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_case_insensitive() {
        let a = item("fact", "Birthday", "March 3rd");
        let b = item("fact", "birthday", "march 3rd");
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_keys_count_as_identical() {
        let a = item("fact", "", "same value");
        let b = item("fact", "", "same value");
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_near_duplicate_crosses_default_threshold() {
        let a = item("preference", "coffee order", "flat white, oat milk");
        let b = item("preference", "coffee order", "flat white with oat milk");
        assert!(similarity(&a, &b) >= 0.85);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = item("fact", "home town", "Lisbon");
        let b = item("fact", "hometown", "Lisboa");
        assert!((similarity(&a, &b) - similarity(&b, &a)).abs() < 1e-12);
    }
}
