//! Shared domain types for Engram.
//!
//! This crate contains the core domain types used across the Engram memory
//! subsystem: the four record kinds, consolidation configuration, the
//! consolidation report, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod record;
pub mod report;
