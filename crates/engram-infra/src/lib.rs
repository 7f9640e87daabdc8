//! Infrastructure layer for Engram.
//!
//! Contains implementations of the repository traits defined in
//! `engram-core`: SQLite storage with WAL mode and split read/write pools,
//! the store-level consolidation lock, and SHA-256 pattern fingerprinting.

pub mod fingerprint;
pub mod sqlite;
