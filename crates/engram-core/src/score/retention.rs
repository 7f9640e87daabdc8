//! Retention probability estimation.
//!
//! Retention decides archival eligibility only -- it never ranks active
//! search results (that's the priority score). The combined
//! importance-plus-access term can exceed 1 before decay on purpose:
//! frequently used, high-importance conversations sit near 1.0 far longer
//! than cold ones, which is the mechanism that keeps hot memories alive
//! indefinitely while cold ones fade.

use chrono::{DateTime, Utc};
use engram_types::record::Conversation;

use super::access_boost;

/// Staleness assumed when neither timestamp is resolvable, in whole days.
const MAX_STALE_DAYS: i64 = 365;

/// Base decay horizon; scaled up by importance so important records decay
/// slower.
const DECAY_HORIZON_DAYS: f64 = 365.0;

/// Retention probability in [0, 1].
///
/// `(importance/10 + access_boost) * e^(-λ * days_since_access)` with
/// `λ = 1/(365 * (1 + importance/10))`, clamped to [0, 1]. Monotonically
/// non-increasing in staleness.
pub fn retention_score(conversation: &Conversation, now: DateTime<Utc>) -> f64 {
    let base_importance = f64::from(conversation.importance) / 10.0;
    let boost = access_boost(conversation.times_accessed);
    let days = days_since_access(conversation, now) as f64;

    let lambda = 1.0 / (DECAY_HORIZON_DAYS * (1.0 + base_importance));
    ((base_importance + boost) * (-lambda * days).exp()).clamp(0.0, 1.0)
}

/// Whole days since the conversation was last touched.
///
/// Falls back from `last_accessed_at` to `created_at`; with neither
/// resolvable the record is treated as maximally stale.
fn days_since_access(conversation: &Conversation, now: DateTime<Utc>) -> i64 {
    match conversation.last_accessed_at.or(conversation.created_at) {
        Some(ts) => (now - ts).num_days().max(0),
        None => MAX_STALE_DAYS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn conversation(importance: u8, times_accessed: i64, age_days: i64) -> Conversation {
        Conversation {
            id: 1,
            summary: "test".to_string(),
            created_at: Some(fixed_now() - Duration::days(age_days)),
            last_accessed_at: None,
            times_accessed,
            importance,
            outcome_success: None,
            retention_score: 0.0,
            priority_score: 0.0,
            cluster_id: None,
            archived: false,
        }
    }

    #[test]
    fn test_retention_within_bounds() {
        let now = fixed_now();
        for (imp, acc, age) in [(0u8, 0i64, 0i64), (10, 10_000, 0), (1, 0, 5000), (10, 50, 5000)] {
            let r = retention_score(&conversation(imp, acc, age), now);
            assert!((0.0..=1.0).contains(&r), "retention {r} out of range");
        }
    }

    #[test]
    fn test_hot_memory_saturates_at_one() {
        // High importance + saturated access: pre-decay sum is 2.0, so even
        // after months of decay the clamped score stays at 1.0.
        let now = fixed_now();
        let conv = conversation(10, 100, 60);
        assert_eq!(retention_score(&conv, now), 1.0);
    }

    #[test]
    fn test_monotone_non_increasing_in_staleness() {
        let now = fixed_now();
        let mut prev = f64::INFINITY;
        for age in [0, 1, 7, 30, 90, 365, 1000, 5000] {
            let r = retention_score(&conversation(5, 3, age), now);
            assert!(r <= prev, "retention increased at age {age}");
            prev = r;
        }
    }

    #[test]
    fn test_importance_slows_decay() {
        let now = fixed_now();
        let low = conversation(2, 0, 365);
        let high = conversation(8, 0, 365);
        let low_r = retention_score(&low, now);
        let high_r = retention_score(&high, now);
        // Relative to their own day-zero scores, the important conversation
        // retains a larger fraction.
        let low_frac = low_r / retention_score(&conversation(2, 0, 0), now);
        let high_frac = high_r / retention_score(&conversation(8, 0, 0), now);
        assert!(high_frac > low_frac);
    }

    #[test]
    fn test_prefers_last_accessed_over_created() {
        let now = fixed_now();
        let mut conv = conversation(5, 5, 400);
        let stale = retention_score(&conv, now);
        conv.last_accessed_at = Some(now - Duration::days(1));
        let touched = retention_score(&conv, now);
        assert!(touched > stale);
    }

    #[test]
    fn test_missing_timestamps_treated_as_maximally_stale() {
        let now = fixed_now();
        let mut no_ts = conversation(5, 5, 0);
        no_ts.created_at = None;
        no_ts.last_accessed_at = None;

        let year_old = conversation(5, 5, 365);
        assert_eq!(retention_score(&no_ts, now), retention_score(&year_old, now));
    }

    #[test]
    fn test_zero_importance_zero_access_scores_zero() {
        let now = fixed_now();
        let conv = conversation(0, 0, 10);
        assert_eq!(retention_score(&conv, now), 0.0);
    }
}
