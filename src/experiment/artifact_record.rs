//! Artifact Record - content-addressable storage for run outputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix of every content hash produced by [`content_hash`]
pub const CAS_PREFIX: &str = "sha256-";

/// Content-addressable hash of `bytes`: `sha256-<hex digest>`.
///
/// The separator is a dash rather than a colon so the hash doubles as a
/// portable file name.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{CAS_PREFIX}{}", hex::encode(Sha256::digest(bytes)))
}

/// Whether `hash` has the shape produced by [`content_hash`].
#[must_use]
pub fn is_content_hash(hash: &str) -> bool {
    hash.strip_prefix(CAS_PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Artifact Record represents a stored artifact from a run.
///
/// The `cas_hash` uniquely identifies the artifact content; identical
/// payloads logged by different runs share one stored blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    key: String,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Describe `bytes` stored under `key` for a run, hashing the content.
    #[must_use]
    pub fn for_content(run_id: impl Into<String>, key: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            cas_hash: content_hash(bytes),
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether `bytes` is exactly the content this record describes.
    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        bytes.len() as u64 == self.size_bytes && content_hash(bytes) == self.cas_hash
    }
}
