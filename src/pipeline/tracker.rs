//! Request generation status tracking.

use super::{COLLECT_QUEUE, MERGE_QUEUE, RENDER_CHUNK_QUEUE, STAMP_QUEUE};
use crate::export::EXPORT_QUEUE;
use crate::source::{GenerationStatus, RequestStore};
use crate::store::{JobSettled, JobState};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The single writer of request generation statuses.
///
/// Consumes the store's settlement stream and maps pipeline outcomes onto
/// the request: a completed merge makes the document Ready at its locator,
/// any permanently failed pipeline job makes it Failed. A request is never
/// Ready with a dangling locator, because Ready is written only from the
/// merge job's own result. Export jobs are tracked the same way on the
/// request's export status.
pub struct RequestTracker {
    requests: Arc<dyn RequestStore>,
    watchers: DashMap<String, watch::Sender<GenerationStatus>>,
}

impl RequestTracker {
    pub fn new(requests: Arc<dyn RequestStore>) -> Self {
        Self {
            requests,
            watchers: DashMap::new(),
        }
    }

    /// Returns a watch channel following the request's document status.
    pub fn watch_document(&self, request_id: &str) -> watch::Receiver<GenerationStatus> {
        self.watchers
            .entry(request_id.to_string())
            .or_insert_with(|| watch::channel(GenerationStatus::NotGenerated).0)
            .subscribe()
    }

    /// Consumes settlement events until shutdown or the stream closes.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<JobSettled>,
        shutdown: CancellationToken,
    ) {
        info!("Request tracker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Request tracker shutting down");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Settlement stream closed, request tracker stopping");
                        break;
                    };
                    self.handle_settlement(event).await;
                }
            }
        }
    }

    /// Maps one settlement onto the owning request's status fields.
    pub async fn handle_settlement(&self, event: JobSettled) {
        let Some(request_id) = event
            .params
            .get("request_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
        else {
            return;
        };

        match (event.queue.as_str(), event.state) {
            (MERGE_QUEUE, JobState::Completed) => {
                let Some(locator) = event
                    .result
                    .as_ref()
                    .and_then(|r| r.get("locator"))
                    .and_then(|l| l.as_str())
                else {
                    warn!(request_id = %request_id, "Merge result missing locator");
                    return;
                };
                self.set_document(
                    &request_id,
                    GenerationStatus::Ready {
                        locator: locator.to_string(),
                    },
                )
                .await;
            }
            (RENDER_CHUNK_QUEUE | COLLECT_QUEUE | STAMP_QUEUE | MERGE_QUEUE, JobState::Failed) => {
                self.set_document(&request_id, GenerationStatus::Failed)
                    .await;
            }
            (EXPORT_QUEUE, JobState::Completed) => {
                let Some(locator) = event
                    .result
                    .as_ref()
                    .and_then(|r| r.get("locator"))
                    .and_then(|l| l.as_str())
                else {
                    warn!(request_id = %request_id, "Export result missing locator");
                    return;
                };
                self.set_export(
                    &request_id,
                    GenerationStatus::Ready {
                        locator: locator.to_string(),
                    },
                )
                .await;
            }
            (EXPORT_QUEUE, JobState::Failed) => {
                self.set_export(&request_id, GenerationStatus::Failed).await;
            }
            _ => {}
        }
    }

    async fn set_document(&self, request_id: &str, status: GenerationStatus) {
        info!(request_id = %request_id, status = ?status, "Document status updated");
        if let Err(err) = self
            .requests
            .set_document_status(request_id, status.clone())
            .await
        {
            warn!(request_id = %request_id, error = %err, "Document status write failed");
        }
        // A send error means every receiver is gone; drop the entry so
        // the watcher table does not grow per generated document.
        let abandoned = match self.watchers.get(request_id) {
            Some(sender) => sender.send(status).is_err(),
            None => false,
        };
        if abandoned {
            self.watchers.remove(request_id);
        }
    }

    async fn set_export(&self, request_id: &str, status: GenerationStatus) {
        info!(request_id = %request_id, status = ?status, "Export status updated");
        if let Err(err) = self.requests.set_export_status(request_id, status).await {
            warn!(request_id = %request_id, error = %err, "Export status write failed");
        }
    }
}
