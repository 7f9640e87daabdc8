//! SHA-256 payload fingerprinting for pattern dedup keys.
//!
//! Implements the `FingerprintHasher` trait from `engram-core` using the
//! `sha2` crate (RustCrypto ecosystem).

use sha2::{Digest, Sha256};

use engram_core::service::hash::FingerprintHasher;

/// SHA-256 implementation of `FingerprintHasher`.
///
/// Computes lowercase hex-encoded SHA-256 digests of structural payloads.
/// The digest is the write-time dedup key for patterns, so it must stay
/// stable across runs and platforms.
pub struct Sha256FingerprintHasher;

impl Sha256FingerprintHasher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Sha256FingerprintHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintHasher for Sha256FingerprintHasher {
    fn fingerprint(&self, payload: &str) -> String {
        let digest = Sha256::digest(payload.as_bytes());
        format!("{:x}", digest)
    }
}
