//! Content-addressed hash of rendering inputs.

use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic digest of everything that influences a rendering's
/// visual content: the target URL/identity plus a coarse time bucket.
///
/// Two logically identical render requests collapse to one hash
/// regardless of which job computes it first. The time bucket bounds how
/// long an identity keeps hashing to the same entry, so content that
/// changes slowly (map backgrounds) is re-rendered at bucket granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderHash(String);

impl RenderHash {
    /// Computes the hash for a render identity within a time bucket.
    pub fn compute(identity: &str, bucket: TimeBucket) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        hasher.update(b"\n");
        hasher.update(bucket.0.to_be_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RenderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse time bucket participating in the render hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucket(pub i64);

impl TimeBucket {
    /// The current day-granularity bucket (days since the Unix epoch).
    pub fn today() -> Self {
        Self(chrono::Utc::now().timestamp() / 86_400)
    }

    /// Bucket for an explicit timestamp.
    pub fn for_timestamp(ts: chrono::DateTime<chrono::Utc>) -> Self {
        Self(ts.timestamp() / 86_400)
    }
}
