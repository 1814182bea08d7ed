//! Stage-1 chunk rendering.

use super::chunk::{ChunkArtifact, RecordBatch};
use super::RENDER_CHUNK_QUEUE;
use crate::artifact::{put_verified, ArtifactStore};
use crate::cache::{RenderCache, RenderHash, TimeBucket};
use crate::render::{CallDeadline, RenderRequest, Renderer};
use crate::source::{DataRecord, DataSource};
use crate::store::{Job, JobError, JobHandler};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Parameters of a `render-chunk` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderChunkParams {
    pub request_id: String,
    pub index: u32,
    /// `None` renders the intro chunk.
    pub batch: Option<RecordBatch>,
}

/// Renders one document chunk to an uploaded PDF.
///
/// For a data chunk the handler first warms the map rendering for every
/// located record in its batch: the render cache is consulted by content
/// hash, and only misses hit the screenshot engine (bounded by the
/// screenshot semaphore, shared across all render jobs). The chunk's HTML
/// view is then rendered to PDF, paged, uploaded and verified.
pub struct RenderChunkHandler {
    source: Arc<dyn DataSource>,
    renderer: Arc<dyn Renderer>,
    artifacts: Arc<dyn ArtifactStore>,
    cache: Arc<dyn RenderCache>,
    view_base_url: String,
    map_base_url: String,
    screenshot_permits: Arc<Semaphore>,
}

impl RenderChunkHandler {
    pub fn new(
        source: Arc<dyn DataSource>,
        renderer: Arc<dyn Renderer>,
        artifacts: Arc<dyn ArtifactStore>,
        cache: Arc<dyn RenderCache>,
        view_base_url: String,
        map_base_url: String,
        screenshot_concurrency: usize,
    ) -> Self {
        Self {
            source,
            renderer,
            artifacts,
            cache,
            view_base_url,
            map_base_url,
            screenshot_permits: Arc::new(Semaphore::new(screenshot_concurrency.max(1))),
        }
    }

    fn chunk_view_url(&self, params: &RenderChunkParams) -> String {
        match &params.batch {
            None => format!(
                "{}/requests/{}/print/intro",
                self.view_base_url, params.request_id
            ),
            Some(batch) => format!(
                "{}/requests/{}/print/records?offset={}&limit={}",
                self.view_base_url, params.request_id, batch.offset, batch.limit
            ),
        }
    }

    fn map_view_url(&self, record: &DataRecord) -> Option<String> {
        let location = record.location?;
        Some(format!(
            "{}?record={}&lon={}&lat={}",
            self.map_base_url, record.id, location.lon, location.lat
        ))
    }

    /// Ensures every located record in the batch has a fresh map rendering,
    /// reusing cache hits and uploading misses.
    async fn warm_map_renders(
        &self,
        request_id: &str,
        records: &[DataRecord],
    ) -> Result<(), JobError> {
        let bucket = TimeBucket::today();
        let mut tasks: JoinSet<Result<(), JobError>> = JoinSet::new();

        for record in records {
            let Some(map_url) = self.map_view_url(record) else {
                continue;
            };
            let hash = RenderHash::compute(&map_url, bucket);
            if let Some(locator) = self.cache.lookup(&hash) {
                debug!(record_id = %record.id, locator = %locator, "Map render cache hit");
                continue;
            }

            let renderer = Arc::clone(&self.renderer);
            let artifacts = Arc::clone(&self.artifacts);
            let cache = Arc::clone(&self.cache);
            let permits = Arc::clone(&self.screenshot_permits);
            let path = format!("reports/{}/maps/{}.png", request_id, hash);
            let record_id = record.id.clone();

            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| JobError::retryable(e.to_string()))?;
                let request = RenderRequest::new(map_url).wait_for("#map-ready");
                let image = renderer
                    .render_screenshot(&request, CallDeadline::NoDeadline)
                    .await?;
                let stored = artifacts.put(&path, Bytes::from(image)).await?;
                debug!(record_id = %record_id, locator = %stored.locator, "Map rendered");
                cache.store(hash, stored.locator);
                Ok(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| JobError::retryable(format!("map render task: {}", e)))??;
        }
        Ok(())
    }
}

impl JobHandler for RenderChunkHandler {
    fn queue(&self) -> &str {
        RENDER_CHUNK_QUEUE
    }

    fn execute<'a>(
        &'a self,
        job: &'a Job,
    ) -> Pin<Box<dyn Future<Output = Result<Value, JobError>> + Send + 'a>> {
        Box::pin(async move {
            let params: RenderChunkParams = serde_json::from_value(job.params.clone())
                .map_err(|e| JobError::permanent(format!("malformed render params: {}", e)))?;

            if let Some(batch) = &params.batch {
                let records = self
                    .source
                    .record_page(&params.request_id, batch.offset, batch.limit)
                    .await?;
                self.warm_map_renders(&params.request_id, &records).await?;
            }

            let request = RenderRequest::new(self.chunk_view_url(&params)).wait_for("#report-ready");
            let pdf = self
                .renderer
                .render_pdf(&request, CallDeadline::NoDeadline)
                .await?;
            let page_count = self.renderer.page_count(&pdf).await?;

            let path = format!(
                "reports/{}/chunks/{}.pdf",
                params.request_id, params.index
            );
            let stored = put_verified(self.artifacts.as_ref(), &path, Bytes::from(pdf)).await?;

            info!(
                request_id = %params.request_id,
                index = params.index,
                pages = page_count,
                locator = %stored.locator,
                "Chunk rendered"
            );
            let artifact = ChunkArtifact {
                index: params.index,
                locator: stored.locator,
                page_count,
            };
            serde_json::to_value(&artifact)
                .map_err(|e| JobError::permanent(format!("result encoding: {}", e)))
        })
    }
}
