//! In-memory render cache.

use super::key::RenderHash;
use super::RenderCache;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Default freshness window: entries older than this are treated as
/// absent (5 days).
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(5 * 24 * 60 * 60);

/// Entry in the render cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Artifact locator of the previously produced rendering.
    locator: String,
    /// When the entry was written.
    written_at: Instant,
}

/// In-memory content-addressed render cache.
///
/// Maps a [`RenderHash`] to the locator of a previously uploaded rendering
/// artifact. Lookups return `None` both when no entry exists and when an
/// entry is older than the freshness window — callers cannot distinguish
/// "never rendered" from "stale", and both require a fresh render. Stale
/// entries are not actively evicted; the store is append-mostly and
/// reclamation is external.
///
/// Writes are last-write-wins. There is no per-hash locking: two
/// concurrent first-time renders of the same content may both render and
/// both store, which is safe but wasteful.
pub struct MemoryRenderCache {
    entries: DashMap<RenderHash, CacheEntry>,
    freshness_window: Duration,
}

impl MemoryRenderCache {
    /// Creates a cache with the default 5-day freshness window.
    pub fn new() -> Self {
        Self::with_freshness_window(DEFAULT_FRESHNESS_WINDOW)
    }

    /// Creates a cache with an explicit freshness window.
    pub fn with_freshness_window(freshness_window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            freshness_window,
        }
    }

    /// Number of entries currently stored, including stale ones.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl RenderCache for MemoryRenderCache {
    fn lookup(&self, hash: &RenderHash) -> Option<String> {
        let entry = self.entries.get(hash)?;
        if entry.written_at.elapsed() > self.freshness_window {
            return None;
        }
        Some(entry.locator.clone())
    }

    fn store(&self, hash: RenderHash, locator: String) {
        self.entries.insert(
            hash,
            CacheEntry {
                locator,
                written_at: Instant::now(),
            },
        );
    }
}

impl Default for MemoryRenderCache {
    fn default() -> Self {
        Self::new()
    }
}
