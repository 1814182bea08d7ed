//! Artifact storage.
//!
//! Rendered chunks, stamped chunks, merged reports and export files all
//! land in an artifact store addressed by path. Uploads of final
//! deliverables go through [`put_verified`], which re-checks the object
//! after writing; a mismatch surfaces as a verification error and fails
//! the uploading job through its normal retry budget.

mod fs;
mod memory;

pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Receipt for a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Stable locator callers hand out (storage path).
    pub locator: String,
    /// Bytes written.
    pub size: u64,
}

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Artifact storage failure.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact storage error: {0}")]
    Storage(String),

    #[error("artifact verification failed for {path}: {reason}")]
    Verification { path: String, reason: String },
}

impl ArtifactError {
    /// Whether retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Path-addressed artifact storage.
///
/// Dyn-compatible; pipeline handlers hold `Arc<dyn ArtifactStore>`.
pub trait ArtifactStore: Send + Sync + 'static {
    /// Stores a complete object at `path`, replacing any existing one.
    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send + 'a>>;

    /// Reads a complete object.
    fn get<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, ArtifactError>> + Send + 'a>>;

    /// Returns metadata for an object, or `None` when absent.
    fn stat<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ObjectStat>, ArtifactError>> + Send + 'a>>;

    /// Opens an incremental writer for a large object.
    ///
    /// Nothing is visible at `path` until the writer's `finish` succeeds.
    fn writer<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ArtifactWriter>, ArtifactError>> + Send + 'a>>;
}

/// Incremental object writer with per-chunk backpressure.
///
/// `write` completes only once the chunk is accepted by the backing
/// store, so a slow store naturally slows the producer down.
pub trait ArtifactWriter: Send {
    fn write<'a>(
        &'a mut self,
        chunk: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArtifactError>> + Send + 'a>>;

    fn finish(
        self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send>>;
}

/// Stores an object and verifies it landed intact.
///
/// After the write, the object is stat'ed back: it must exist and carry
/// the expected size. Any discrepancy is reported as
/// [`ArtifactError::Verification`].
pub async fn put_verified(
    store: &dyn ArtifactStore,
    path: &str,
    data: Bytes,
) -> Result<StoredArtifact, ArtifactError> {
    let stored = store.put(path, data).await?;
    verify_stored(store, &stored).await?;
    Ok(stored)
}

/// Verifies that an upload receipt matches what the store actually holds.
///
/// Every handler that produces a locator-bearing result runs this after
/// its upload, whether the object went through [`put_verified`] or an
/// incremental [`ArtifactWriter`]. The object must exist at the receipt's
/// locator and carry the receipt's size.
pub async fn verify_stored(
    store: &dyn ArtifactStore,
    stored: &StoredArtifact,
) -> Result<(), ArtifactError> {
    let stat = store
        .stat(&stored.locator)
        .await?
        .ok_or_else(|| ArtifactError::Verification {
            path: stored.locator.clone(),
            reason: "object absent after upload".to_string(),
        })?;
    if stat.size != stored.size {
        return Err(ArtifactError::Verification {
            path: stored.locator.clone(),
            reason: format!(
                "size mismatch: wrote {} bytes, stored {}",
                stored.size, stat.size
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_permanent() {
        assert!(!ArtifactError::NotFound("x".into()).is_retryable());
        assert!(ArtifactError::Storage("io".into()).is_retryable());
        assert!(ArtifactError::Verification {
            path: "p".into(),
            reason: "r".into()
        }
        .is_retryable());
    }

    #[tokio::test]
    async fn test_put_verified_roundtrip() {
        let store = MemoryArtifactStore::new();
        let stored = put_verified(&store, "reports/r1/final.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(stored.locator, "reports/r1/final.pdf");
        assert_eq!(stored.size, 4);
    }

    #[tokio::test]
    async fn test_verify_stored_detects_absent_object() {
        let store = MemoryArtifactStore::new();
        let stored = StoredArtifact {
            locator: "exports/r1.geojson".to_string(),
            size: 4,
        };
        let err = verify_stored(&store, &stored).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Verification { .. }));
    }

    #[tokio::test]
    async fn test_verify_stored_detects_size_mismatch() {
        let store = MemoryArtifactStore::new();
        store
            .put("exports/r1.geojson", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        let stored = StoredArtifact {
            locator: "exports/r1.geojson".to_string(),
            size: 99,
        };
        let err = verify_stored(&store, &stored).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Verification { .. }));
    }
}
