//! Stage-2 parent: merge stamped chunks into the final document.

use super::chunk::ChunkArtifact;
use super::MERGE_QUEUE;
use crate::artifact::{verify_stored, ArtifactStore};
use crate::flow::FlowOrchestrator;
use crate::store::{Job, JobError, JobHandler};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

/// Parameters of a `merge-report` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeParams {
    pub request_id: String,
    pub total_pages: u32,
}

/// Concatenates the stamped chunks, in index order, into the final
/// document artifact.
///
/// Chunk bytes are streamed through an incremental writer so the full
/// document is never held in memory; the finished object is verified
/// against the byte count that was written.
pub struct MergeHandler {
    orchestrator: Arc<FlowOrchestrator>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl MergeHandler {
    pub fn new(orchestrator: Arc<FlowOrchestrator>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            orchestrator,
            artifacts,
        }
    }
}

impl JobHandler for MergeHandler {
    fn queue(&self) -> &str {
        MERGE_QUEUE
    }

    fn execute<'a>(
        &'a self,
        job: &'a Job,
    ) -> Pin<Box<dyn Future<Output = Result<Value, JobError>> + Send + 'a>> {
        Box::pin(async move {
            let params: MergeParams = serde_json::from_value(job.params.clone())
                .map_err(|e| JobError::permanent(format!("malformed merge params: {}", e)))?;

            let results = self
                .orchestrator
                .children_results(&job.id)
                .await
                .ok_or_else(|| JobError::permanent("stamp results unavailable"))?;
            let mut artifacts = results
                .values()
                .map(|value| {
                    serde_json::from_value::<ChunkArtifact>(value.clone())
                        .map_err(|e| JobError::permanent(format!("malformed stamp result: {}", e)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            artifacts.sort_by_key(|a| a.index);

            let path = format!("reports/{}/final.pdf", params.request_id);
            let mut writer = self.artifacts.writer(&path).await?;
            for artifact in &artifacts {
                let bytes = self.artifacts.get(&artifact.locator).await?;
                writer.write(bytes).await?;
            }
            let stored = writer.finish().await?;

            // Post-upload verification, same contract as put_verified.
            verify_stored(self.artifacts.as_ref(), &stored).await?;

            info!(
                request_id = %params.request_id,
                chunks = artifacts.len(),
                total_pages = params.total_pages,
                size = stored.size,
                locator = %stored.locator,
                "Report merged"
            );
            Ok(json!({
                "request_id": params.request_id,
                "locator": stored.locator,
                "total_pages": params.total_pages,
            }))
        })
    }
}
