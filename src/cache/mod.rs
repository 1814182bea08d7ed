//! Content-addressed render cache.
//!
//! Expensive renderings (per-record map screenshots) are deduplicated by a
//! deterministic content hash: before invoking the external renderer, a
//! worker looks the hash up here and reuses the previously uploaded
//! artifact when the entry is still inside the freshness window.

mod key;
mod memory;

pub use key::{RenderHash, TimeBucket};
pub use memory::{MemoryRenderCache, DEFAULT_FRESHNESS_WINDOW};

/// Lookup/store contract for the render cache.
///
/// `lookup` returns `None` for both missing and stale entries; `store` is
/// last-write-wins with no per-hash locking.
pub trait RenderCache: Send + Sync + 'static {
    /// Returns the artifact locator for a fresh entry, if any.
    fn lookup(&self, hash: &RenderHash) -> Option<String>;

    /// Records the locator produced for a hash.
    fn store(&self, hash: RenderHash, locator: String);
}
