//! Service configuration.

use crate::cache::DEFAULT_FRESHNESS_WINDOW;
use std::time::Duration;

/// Default worker concurrency for the render-chunk queue.
pub const DEFAULT_RENDER_CONCURRENCY: usize = 5;

/// Default worker concurrency for the export queue.
pub const DEFAULT_EXPORT_CONCURRENCY: usize = 5;

/// Default bound on in-flight map screenshots within one render job.
pub const DEFAULT_SCREENSHOT_CONCURRENCY: usize = 10;

/// Default number of data records per rendered chunk.
pub const DEFAULT_CHUNK_BATCH_SIZE: u64 = 25;

/// Default number of records fetched per export round.
pub const DEFAULT_EXPORT_BATCH_SIZE: u64 = 100;

/// Default execution attempts per job.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Tunable settings for the report generation service.
///
/// All fields have working defaults; `with_*` setters override them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workers on the `render-chunk` queue.
    pub render_concurrency: usize,
    /// Workers on the `stamp-chunk` queue.
    pub stamp_concurrency: usize,
    /// Workers on the `export` queue.
    pub export_concurrency: usize,
    /// In-flight map screenshots per render job.
    pub screenshot_concurrency: usize,
    /// Records per rendered chunk.
    pub chunk_batch_size: u64,
    /// Records fetched per export round.
    pub export_batch_size: u64,
    /// Execution attempts per job before failing permanently.
    pub max_attempts: u32,
    /// Render cache freshness window.
    pub freshness_window: Duration,
    /// Base URL of the HTML report views to render.
    pub view_base_url: String,
    /// Base URL of the map views captured per located record.
    pub map_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            render_concurrency: DEFAULT_RENDER_CONCURRENCY,
            stamp_concurrency: DEFAULT_RENDER_CONCURRENCY,
            export_concurrency: DEFAULT_EXPORT_CONCURRENCY,
            screenshot_concurrency: DEFAULT_SCREENSHOT_CONCURRENCY,
            chunk_batch_size: DEFAULT_CHUNK_BATCH_SIZE,
            export_batch_size: DEFAULT_EXPORT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            view_base_url: "http://localhost:3000".to_string(),
            map_base_url: "http://localhost:3000/map".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_render_concurrency(mut self, workers: usize) -> Self {
        self.render_concurrency = workers;
        self
    }

    pub fn with_stamp_concurrency(mut self, workers: usize) -> Self {
        self.stamp_concurrency = workers;
        self
    }

    pub fn with_export_concurrency(mut self, workers: usize) -> Self {
        self.export_concurrency = workers;
        self
    }

    pub fn with_screenshot_concurrency(mut self, limit: usize) -> Self {
        self.screenshot_concurrency = limit;
        self
    }

    pub fn with_chunk_batch_size(mut self, records: u64) -> Self {
        self.chunk_batch_size = records.max(1);
        self
    }

    pub fn with_export_batch_size(mut self, records: u64) -> Self {
        self.export_batch_size = records.max(1);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn with_view_base_url(mut self, url: impl Into<String>) -> Self {
        self.view_base_url = url.into();
        self
    }

    pub fn with_map_base_url(mut self, url: impl Into<String>) -> Self {
        self.map_base_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.render_concurrency, 5);
        assert_eq!(config.export_concurrency, 5);
        assert_eq!(config.screenshot_concurrency, 10);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.freshness_window, Duration::from_secs(5 * 24 * 60 * 60));
    }

    #[test]
    fn test_builders_and_floors() {
        let config = Config::new()
            .with_chunk_batch_size(0)
            .with_max_attempts(0)
            .with_render_concurrency(2);
        assert_eq!(config.chunk_batch_size, 1);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.render_concurrency, 2);
    }
}
