//! The consolidation orchestrator.
//!
//! One linear pass per invocation: refresh priority scores, recompute
//! temporal clusters, refresh retention scores, archive cold conversations,
//! strengthen frequently-accessed knowledge, deduplicate. See
//! [`engine::ConsolidationEngine`].

pub mod engine;

pub use engine::ConsolidationEngine;
