//! Service facade.
//!
//! [`TerradocService`] wires the job store, flow orchestrator, request
//! tracker, render cache and worker pools around the caller-provided
//! collaborators (data source, request store, renderer, artifact store).
//! `run` drives everything until shutdown; `generate_document` and
//! `generate_export` are the fire-and-forget entry points.

use crate::artifact::ArtifactStore;
use crate::cache::MemoryRenderCache;
use crate::config::Config;
use crate::export::{ExportHandler, ExportParams, EXPORT_QUEUE};
use crate::flow::{FlowOptions, FlowOrchestrator};
use crate::pipeline::{
    plan_chunks, CollectHandler, CollectParams, MergeHandler, RenderChunkHandler,
    RenderChunkParams, RequestTracker, StampHandler, COLLECT_QUEUE, RENDER_CHUNK_QUEUE,
};
use crate::render::Renderer;
use crate::source::{DataSource, GenerationStatus, RequestStore, SourceError};
use crate::store::{JobSpec, JobStore, WorkerPool};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Outcome of a generation request.
///
/// `accepted: false` means a run is already in flight or the deliverable
/// is already Ready; the call is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub accepted: bool,
}

/// Error surfaced synchronously by the service entry points.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request does not exist; nothing was scheduled.
    #[error("request not found: {0}")]
    RequestNotFound(String),

    /// Upstream failure while validating or planning.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Internal encoding failure.
    #[error("parameter encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Report generation service.
pub struct TerradocService {
    config: Config,
    store: Arc<JobStore>,
    orchestrator: Arc<FlowOrchestrator>,
    tracker: Arc<RequestTracker>,
    source: Arc<dyn DataSource>,
    requests: Arc<dyn RequestStore>,
    renderer: Arc<dyn Renderer>,
    artifacts: Arc<dyn ArtifactStore>,
    cache: Arc<MemoryRenderCache>,
}

impl TerradocService {
    pub fn new(
        config: Config,
        source: Arc<dyn DataSource>,
        requests: Arc<dyn RequestStore>,
        renderer: Arc<dyn Renderer>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        let store = Arc::new(JobStore::new());
        let orchestrator = Arc::new(FlowOrchestrator::new(Arc::clone(&store)));
        let tracker = Arc::new(RequestTracker::new(Arc::clone(&requests)));
        let cache = Arc::new(MemoryRenderCache::with_freshness_window(
            config.freshness_window,
        ));
        Self {
            config,
            store,
            orchestrator,
            tracker,
            source,
            requests,
            renderer,
            artifacts,
            cache,
        }
    }

    /// The underlying job store (settlement feed, direct inspection).
    pub fn job_store(&self) -> Arc<JobStore> {
        Arc::clone(&self.store)
    }

    /// Watch channel following a request's document status.
    pub fn watch_document(&self, request_id: &str) -> watch::Receiver<GenerationStatus> {
        self.tracker.watch_document(request_id)
    }

    /// Runs orchestrator, tracker and all worker pools until shutdown.
    ///
    /// Must be running before generated jobs can make progress; the
    /// subscriptions are registered before any pool starts claiming.
    pub async fn run(&self, shutdown: CancellationToken) {
        let orchestrator_events = self.store.subscribe().await;
        let tracker_events = self.store.subscribe().await;

        let mut tasks = JoinSet::new();
        tasks.spawn(
            Arc::clone(&self.orchestrator).run(orchestrator_events, shutdown.clone()),
        );
        tasks.spawn(Arc::clone(&self.tracker).run(tracker_events, shutdown.clone()));

        let render_handler = Arc::new(RenderChunkHandler::new(
            Arc::clone(&self.source),
            Arc::clone(&self.renderer),
            Arc::clone(&self.artifacts),
            self.cache.clone(),
            self.config.view_base_url.clone(),
            self.config.map_base_url.clone(),
            self.config.screenshot_concurrency,
        ));
        let collect_handler = Arc::new(CollectHandler::new(Arc::clone(&self.orchestrator)));
        let stamp_handler = Arc::new(StampHandler::new(
            Arc::clone(&self.renderer),
            Arc::clone(&self.artifacts),
        ));
        let merge_handler = Arc::new(MergeHandler::new(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.artifacts),
        ));
        let export_handler = Arc::new(ExportHandler::new(
            Arc::clone(&self.source),
            Arc::clone(&self.artifacts),
            self.config.export_batch_size,
        ));

        let pools = [
            WorkerPool::new(
                Arc::clone(&self.store),
                render_handler,
                self.config.render_concurrency,
            ),
            WorkerPool::new(Arc::clone(&self.store), collect_handler, 1),
            WorkerPool::new(
                Arc::clone(&self.store),
                stamp_handler,
                self.config.stamp_concurrency,
            ),
            WorkerPool::new(Arc::clone(&self.store), merge_handler, 1),
            WorkerPool::new(
                Arc::clone(&self.store),
                export_handler,
                self.config.export_concurrency,
            ),
        ];
        for pool in pools {
            tasks.spawn(pool.run(shutdown.clone()));
        }

        info!("Terradoc service running");
        while tasks.join_next().await.is_some() {}
        info!("Terradoc service stopped");
    }

    /// Schedules document generation for a request.
    ///
    /// Fire and forget: the returned [`Accepted`] only says whether a new
    /// run was started. A missing request fails fast, synchronously.
    pub async fn generate_document(&self, request_id: &str) -> Result<Accepted, ServiceError> {
        let request = self
            .requests
            .load(request_id)
            .await?
            .ok_or_else(|| ServiceError::RequestNotFound(request_id.to_string()))?;
        if !request.document_status.accepts_new_run() {
            info!(request_id = %request_id, "Document generation already in flight or ready");
            return Ok(Accepted { accepted: false });
        }

        let total_records = self.source.count_records(request_id).await?;
        let chunks = plan_chunks(total_records, self.config.chunk_batch_size);

        self.requests
            .set_document_status(request_id, GenerationStatus::Generating)
            .await?;

        let parent_params = CollectParams {
            request_id: request_id.to_string(),
            title: request.title.clone(),
            max_attempts: self.config.max_attempts,
        };
        // The collect step only reads results and enqueues; a failure
        // there is not transient, so it gets a single attempt.
        let parent = JobSpec::new(COLLECT_QUEUE, serde_json::to_value(&parent_params)?)
            .with_max_attempts(1);

        let children = chunks
            .iter()
            .map(|chunk| {
                let params = RenderChunkParams {
                    request_id: request_id.to_string(),
                    index: chunk.index,
                    batch: chunk.batch,
                };
                Ok::<_, serde_json::Error>(
                    JobSpec::new(RENDER_CHUNK_QUEUE, serde_json::to_value(&params)?)
                        .with_max_attempts(self.config.max_attempts),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let parent_id = self
            .orchestrator
            .create_flow(parent, children, FlowOptions::abort_on_child_failure())
            .await;

        info!(
            request_id = %request_id,
            records = total_records,
            chunks = chunks.len(),
            collect_job = %parent_id,
            "Document generation scheduled"
        );
        Ok(Accepted { accepted: true })
    }

    /// Schedules export generation for a request. Same contract as
    /// [`generate_document`](Self::generate_document).
    pub async fn generate_export(&self, request_id: &str) -> Result<Accepted, ServiceError> {
        let request = self
            .requests
            .load(request_id)
            .await?
            .ok_or_else(|| ServiceError::RequestNotFound(request_id.to_string()))?;
        if !request.export_status.accepts_new_run() {
            info!(request_id = %request_id, "Export generation already in flight or ready");
            return Ok(Accepted { accepted: false });
        }

        self.requests
            .set_export_status(request_id, GenerationStatus::Generating)
            .await?;

        let params = ExportParams {
            request_id: request_id.to_string(),
        };
        let job_id = self
            .store
            .enqueue(
                JobSpec::new(EXPORT_QUEUE, serde_json::to_value(&params)?)
                    .with_max_attempts(self.config.max_attempts),
            )
            .await;

        info!(request_id = %request_id, job_id = %job_id, "Export generation scheduled");
        Ok(Accepted { accepted: true })
    }
}
