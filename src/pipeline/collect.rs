//! Stage-1 parent: collect render results, schedule stamping.

use super::chunk::ChunkArtifact;
use super::{COLLECT_QUEUE, MERGE_QUEUE, STAMP_QUEUE};
use super::merge::MergeParams;
use super::stamp::StampParams;
use crate::flow::{FlowOptions, FlowOrchestrator};
use crate::store::{Job, JobError, JobHandler, JobSpec};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

/// Parameters of a `collect-renders` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectParams {
    pub request_id: String,
    /// Report title, stamped into every page footer.
    pub title: String,
    /// Attempt budget handed down to stage-2 jobs.
    pub max_attempts: u32,
}

/// Runs once all chunks are rendered: sorts the partial artifacts by
/// index, computes each chunk's global start page by prefix sum, and
/// creates the stage-2 flow (stamp children gated by the merge parent).
///
/// Page offsets are computed here exactly once; stamp jobs receive their
/// absolute start page and never look at sibling chunks.
pub struct CollectHandler {
    orchestrator: Arc<FlowOrchestrator>,
}

impl CollectHandler {
    pub fn new(orchestrator: Arc<FlowOrchestrator>) -> Self {
        Self { orchestrator }
    }

    fn sorted_artifacts(results: Vec<Value>) -> Result<Vec<ChunkArtifact>, JobError> {
        let mut artifacts = results
            .into_iter()
            .map(|value| {
                serde_json::from_value::<ChunkArtifact>(value)
                    .map_err(|e| JobError::permanent(format!("malformed chunk result: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        artifacts.sort_by_key(|a| a.index);
        Ok(artifacts)
    }
}

impl JobHandler for CollectHandler {
    fn queue(&self) -> &str {
        COLLECT_QUEUE
    }

    fn execute<'a>(
        &'a self,
        job: &'a Job,
    ) -> Pin<Box<dyn Future<Output = Result<Value, JobError>> + Send + 'a>> {
        Box::pin(async move {
            let params: CollectParams = serde_json::from_value(job.params.clone())
                .map_err(|e| JobError::permanent(format!("malformed collect params: {}", e)))?;

            let results = self
                .orchestrator
                .children_results(&job.id)
                .await
                .ok_or_else(|| JobError::permanent("chunk results unavailable"))?;
            let artifacts = Self::sorted_artifacts(results.values().cloned().collect())?;

            let total_pages: u32 = artifacts.iter().map(|a| a.page_count).sum();

            let mut start_page = 1u32;
            let mut stamp_children = Vec::with_capacity(artifacts.len());
            for artifact in &artifacts {
                let stamp = StampParams {
                    request_id: params.request_id.clone(),
                    title: params.title.clone(),
                    index: artifact.index,
                    source_locator: artifact.locator.clone(),
                    page_count: artifact.page_count,
                    start_page,
                    total_pages,
                };
                start_page += artifact.page_count;
                stamp_children.push(
                    JobSpec::new(
                        STAMP_QUEUE,
                        serde_json::to_value(&stamp)
                            .map_err(|e| JobError::permanent(e.to_string()))?,
                    )
                    .with_max_attempts(params.max_attempts),
                );
            }

            let merge_params = MergeParams {
                request_id: params.request_id.clone(),
                total_pages,
            };
            let merge_spec = JobSpec::new(
                MERGE_QUEUE,
                serde_json::to_value(&merge_params)
                    .map_err(|e| JobError::permanent(e.to_string()))?,
            )
            .with_max_attempts(params.max_attempts);

            let merge_id = self
                .orchestrator
                .create_flow(merge_spec, stamp_children, FlowOptions::abort_on_child_failure())
                .await;

            info!(
                request_id = %params.request_id,
                chunks = artifacts.len(),
                total_pages = total_pages,
                merge_job = %merge_id,
                "Stamp stage scheduled"
            );
            Ok(json!({
                "request_id": params.request_id,
                "chunks": artifacts.len(),
                "total_pages": total_pages,
                "merge_job": merge_id.as_str(),
            }))
        })
    }
}
