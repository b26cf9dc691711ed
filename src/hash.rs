//! Content fingerprinting for incremental indexing.
//!
//! A file is re-embedded only when its digest differs from the one stored
//! at last indexing time. SHA-256 keeps the check collision-resistant and
//! stable across runs and platforms.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of the given content.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
