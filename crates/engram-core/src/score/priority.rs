//! Composite priority scoring.
//!
//! `priority_score` ranks records for recall/surfacing on a 0-10 scale. It is
//! a weighted sum of six independently clamped sub-scores; the weights sum to
//! 10 so a maximal record lands exactly at the top of the scale.

use chrono::{DateTime, Utc};
use engram_types::record::{Conversation, KnowledgeItem};

use super::access_boost;

const IMPORTANCE_WEIGHT: f64 = 3.0;
const CONFIDENCE_WEIGHT: f64 = 2.0;
const RECENCY_WEIGHT: f64 = 2.0;
const FREQUENCY_WEIGHT: f64 = 1.5;
const OUTCOME_WEIGHT: f64 = 1.0;

/// Recency contribution when a record has no resolvable timestamp.
const RECENCY_NEUTRAL: f64 = 1.0;

/// Outcome contribution when no outcome was recorded.
const OUTCOME_NEUTRAL: f64 = 0.5;

/// Conversations carry no confidence field; they score as if 0.8.
const CONVERSATION_CONFIDENCE: f64 = 0.8;

/// Fixed topical-relevance contribution. Placeholder dimension kept for
/// score-range parity with the legacy scale; future context-weighting slots
/// in here.
const TOPICAL_RELEVANCE: f64 = 0.25;

/// e-folding time for the recency decay, in days.
const RECENCY_DECAY_DAYS: f64 = 365.0;

/// A record the priority scorer can rank.
///
/// Implemented by `Conversation` and `KnowledgeItem`; the scorer itself only
/// sees this view, so it can never mutate the record.
pub trait Prioritizable {
    /// Importance from 1 to 10.
    fn importance(&self) -> u8;
    /// Confidence in [0, 1]; record kinds without one supply a fixed default.
    fn confidence(&self) -> f64;
    /// The most recent of last-accessed / created, when resolvable.
    fn newest_timestamp(&self) -> Option<DateTime<Utc>>;
    fn times_accessed(&self) -> i64;
    /// Recorded outcome, if any.
    fn outcome_success(&self) -> Option<bool>;
}

impl Prioritizable for Conversation {
    fn importance(&self) -> u8 {
        self.importance
    }

    fn confidence(&self) -> f64 {
        CONVERSATION_CONFIDENCE
    }

    fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        match (self.last_accessed_at, self.created_at) {
            (Some(a), Some(c)) => Some(a.max(c)),
            (a, c) => a.or(c),
        }
    }

    fn times_accessed(&self) -> i64 {
        self.times_accessed
    }

    fn outcome_success(&self) -> Option<bool> {
        self.outcome_success
    }
}

impl Prioritizable for KnowledgeItem {
    fn importance(&self) -> u8 {
        self.importance
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        match (self.last_accessed_at, self.created_at) {
            (Some(a), Some(c)) => Some(a.max(c)),
            (a, c) => a.or(c),
        }
    }

    fn times_accessed(&self) -> i64 {
        self.times_accessed
    }

    fn outcome_success(&self) -> Option<bool> {
        // Knowledge items carry no outcome; the neutral contribution applies.
        None
    }
}

/// Composite priority score in [0, 10].
///
/// Pure function of the record's current fields and `now`; idempotent and
/// side-effect free.
pub fn priority_score<R: Prioritizable>(record: &R, now: DateTime<Utc>) -> f64 {
    let importance = (f64::from(record.importance()) / 10.0) * IMPORTANCE_WEIGHT;
    let confidence = record.confidence().clamp(0.0, 1.0) * CONFIDENCE_WEIGHT;
    let recency = recency_score(record.newest_timestamp(), now);
    let frequency = access_boost(record.times_accessed()) * FREQUENCY_WEIGHT;
    let outcome = match record.outcome_success() {
        Some(true) => OUTCOME_WEIGHT,
        Some(false) => 0.0,
        None => OUTCOME_NEUTRAL,
    };

    (importance + confidence + recency + frequency + outcome + TOPICAL_RELEVANCE)
        .clamp(0.0, 10.0)
}

/// Exponential recency decay: `2.0 * e^(-age_days/365)`.
///
/// With no resolvable timestamp the neutral 1.0 applies directly (not decayed).
fn recency_score(newest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match newest {
        Some(ts) => {
            let age_days = (now - ts).num_seconds().max(0) as f64 / 86_400.0;
            RECENCY_WEIGHT * (-age_days / RECENCY_DECAY_DAYS).exp()
        }
        None => RECENCY_NEUTRAL,
    }
}
