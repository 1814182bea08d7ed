//! Stage-2 footer stamping.

use super::chunk::ChunkArtifact;
use super::STAMP_QUEUE;
use crate::artifact::{put_verified, ArtifactStore};
use crate::render::{PageFooter, Renderer};
use crate::store::{Job, JobError, JobHandler};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

/// Parameters of a `stamp-chunk` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampParams {
    pub request_id: String,
    /// Left footer text on every page.
    pub title: String,
    pub index: u32,
    /// Rendered chunk to stamp.
    pub source_locator: String,
    pub page_count: u32,
    /// Global page number of this chunk's first page (1-based).
    pub start_page: u32,
    /// Page count of the whole document.
    pub total_pages: u32,
}

impl StampParams {
    /// Builds the per-page footers for this chunk.
    pub fn footers(&self) -> Vec<PageFooter> {
        (0..self.page_count)
            .map(|page| PageFooter {
                left: self.title.clone(),
                right: format!("{}/{}", self.start_page + page, self.total_pages),
            })
            .collect()
    }
}

/// Stamps global page footers onto one rendered chunk.
pub struct StampHandler {
    renderer: Arc<dyn Renderer>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl StampHandler {
    pub fn new(renderer: Arc<dyn Renderer>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            renderer,
            artifacts,
        }
    }
}

impl JobHandler for StampHandler {
    fn queue(&self) -> &str {
        STAMP_QUEUE
    }

    fn execute<'a>(
        &'a self,
        job: &'a Job,
    ) -> Pin<Box<dyn Future<Output = Result<Value, JobError>> + Send + 'a>> {
        Box::pin(async move {
            let params: StampParams = serde_json::from_value(job.params.clone())
                .map_err(|e| JobError::permanent(format!("malformed stamp params: {}", e)))?;

            let source = self.artifacts.get(&params.source_locator).await?;
            let stamped = self
                .renderer
                .stamp_footers(&source, &params.footers())
                .await?;

            let path = format!(
                "reports/{}/stamped/{}.pdf",
                params.request_id, params.index
            );
            let stored =
                put_verified(self.artifacts.as_ref(), &path, Bytes::from(stamped)).await?;

            info!(
                request_id = %params.request_id,
                index = params.index,
                start_page = params.start_page,
                pages = params.page_count,
                "Chunk stamped"
            );
            let artifact = ChunkArtifact {
                index: params.index,
                locator: stored.locator,
                page_count: params.page_count,
            };
            serde_json::to_value(&artifact)
                .map_err(|e| JobError::permanent(format!("result encoding: {}", e)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(start_page: u32, page_count: u32, total_pages: u32) -> StampParams {
        StampParams {
            request_id: "r1".to_string(),
            title: "Quarterly Wells".to_string(),
            index: 2,
            source_locator: "reports/r1/chunks/2.pdf".to_string(),
            page_count,
            start_page,
            total_pages,
        }
    }

    #[test]
    fn test_footers_carry_global_page_numbers() {
        let footers = params(4, 3, 9).footers();
        assert_eq!(footers.len(), 3);
        assert_eq!(footers[0].right, "4/9");
        assert_eq!(footers[1].right, "5/9");
        assert_eq!(footers[2].right, "6/9");
        assert!(footers.iter().all(|f| f.left == "Quarterly Wells"));
    }

    #[test]
    fn test_last_chunk_ends_at_total() {
        let footers = params(8, 2, 9).footers();
        assert_eq!(footers.last().unwrap().right, "9/9");
    }
}
