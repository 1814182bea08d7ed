//! Parent/child flow orchestration.
//!
//! A flow is a held parent job gated on a dynamically-sized set of child
//! jobs. The orchestrator registers the full child set *before* any child
//! is enqueued, so there is no window in which all currently-known
//! children are settled while more are still being added. The parent is
//! released only when every declared child has settled successfully.

use super::node::{ChildResults, FlowNode, FlowOptions};
use crate::store::{JobId, JobSettled, JobSpec, JobState, JobStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Error message recorded on a parent aborted because a child failed.
pub const CHILD_FAILED_ERROR: &str = "child job failed";

/// Coordinates parent jobs gated on child job sets.
///
/// One orchestrator instance serves every flow in the process. It consumes
/// the store's settlement stream in [`run`](Self::run); handlers that
/// spawn nested flows hold it behind an [`Arc`].
pub struct FlowOrchestrator {
    store: Arc<JobStore>,
    /// Active flow nodes keyed by parent job id.
    flows: Mutex<HashMap<JobId, FlowNode>>,
}

impl FlowOrchestrator {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self {
            store,
            flows: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a flow: enqueues the parent held, registers the child set,
    /// then enqueues the children. Returns the parent's job id.
    ///
    /// Child ids are assigned up front so the gate covers the complete set
    /// from the moment the first child becomes runnable. A flow with zero
    /// children releases the parent immediately (the gate is vacuously
    /// satisfied).
    pub async fn create_flow(
        &self,
        parent: JobSpec,
        children: Vec<JobSpec>,
        options: FlowOptions,
    ) -> JobId {
        let parent_id = self.store.enqueue(parent.held()).await;

        let child_specs: Vec<JobSpec> = children
            .into_iter()
            .map(|spec| {
                let id = spec.id.clone().unwrap_or_else(JobId::auto);
                spec.with_id(id).with_parent(parent_id.clone())
            })
            .collect();
        let child_ids: Vec<JobId> = child_specs
            .iter()
            .map(|spec| spec.id.clone().expect("child id assigned above"))
            .collect();

        info!(
            parent_id = %parent_id,
            children = child_ids.len(),
            abort_on_failure = options.remove_dependency_on_failure,
            "Flow created"
        );

        let mut node = FlowNode::new(child_ids, options);
        let vacuous = node.all_settled();
        if vacuous {
            // The gate is vacuously satisfied; mark the node resolved so
            // the parent's handler can read its (empty) child results.
            node.resolved = true;
        }
        self.flows.lock().await.insert(parent_id.clone(), node);

        if vacuous {
            self.store.release(&parent_id).await;
            return parent_id;
        }

        for spec in child_specs {
            self.store.enqueue(spec).await;
        }

        parent_id
    }

    /// Returns the recorded child results for a flow.
    ///
    /// Visible only once every child has completed: `None` while any
    /// child is outstanding and for flows that aborted, so callers never
    /// observe a partial set. Intended for the parent's own handler; the
    /// node is kept until the parent settles, so a retrying parent
    /// re-reads the same results.
    pub async fn children_results(&self, parent_id: &JobId) -> Option<ChildResults> {
        self.flows.lock().await.get(parent_id).and_then(|node| {
            (node.resolved && !node.child_failed).then(|| node.results.clone())
        })
    }

    /// Consumes settlement events until shutdown or the stream closes.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<JobSettled>,
        shutdown: CancellationToken,
    ) {
        info!("Flow orchestrator started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Flow orchestrator shutting down");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Settlement stream closed, flow orchestrator stopping");
                        break;
                    };
                    self.handle_settlement(event).await;
                }
            }
        }
    }

    /// Applies one settlement event to the flow table.
    pub async fn handle_settlement(&self, event: JobSettled) {
        // A settling parent retires its node regardless of outcome.
        if self.flows.lock().await.remove(&event.id).is_some() {
            debug!(parent_id = %event.id, state = %event.state, "Flow retired");
        }

        let Some(parent_id) = event.parent_id.clone() else {
            return;
        };

        enum Action {
            None,
            Release,
            Abort { cancel: Vec<JobId> },
        }

        let action = {
            let mut flows = self.flows.lock().await;
            let Some(node) = flows.get_mut(&parent_id) else {
                // Late settlement of a cancelled sibling after the flow
                // already aborted.
                return;
            };
            if !node.pending.remove(&event.id) {
                warn!(
                    parent_id = %parent_id,
                    child_id = %event.id,
                    "Settlement for unknown flow child ignored"
                );
                return;
            }

            match event.state {
                JobState::Completed => {
                    node.results
                        .insert(event.id.clone(), event.result.clone().unwrap_or_default());
                }
                JobState::Failed => {
                    node.child_failed = true;
                }
                _ => {}
            }

            if node.resolved {
                Action::None
            } else if node.child_failed && node.options.remove_dependency_on_failure {
                // The node stays registered so late sibling settlements
                // drain quietly above.
                node.resolved = true;
                Action::Abort {
                    cancel: node.pending.iter().cloned().collect(),
                }
            } else if node.all_settled() {
                node.resolved = true;
                if node.child_failed {
                    Action::Abort { cancel: Vec::new() }
                } else {
                    Action::Release
                }
            } else {
                Action::None
            }
        };

        match action {
            Action::None => {}
            Action::Release => {
                debug!(parent_id = %parent_id, "All children completed, releasing parent");
                self.store.release(&parent_id).await;
            }
            Action::Abort { cancel } => {
                self.abort_flow(&parent_id, cancel, &event.id).await;
            }
        }
    }

    /// Fails the parent without running it, cancelling any not-yet-started
    /// siblings first (best-effort: active siblings run to completion).
    async fn abort_flow(&self, parent_id: &JobId, cancel: Vec<JobId>, failed_child: &JobId) {
        warn!(
            parent_id = %parent_id,
            failed_child = %failed_child,
            cancelling = cancel.len(),
            "Flow child failed, aborting parent"
        );
        for sibling in &cancel {
            if !self.store.cancel(sibling).await {
                debug!(
                    parent_id = %parent_id,
                    child_id = %sibling,
                    "Sibling already active, left to finish"
                );
            }
        }
        self.store.abort(parent_id, CHILD_FAILED_ERROR).await;
    }
}

impl std::fmt::Debug for FlowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowOrchestrator").finish()
    }
}
