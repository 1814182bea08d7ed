//! Shared job store.
//!
//! The [`JobStore`] owns every job record and enforces the one invariant
//! the rest of the system relies on: at most one worker holds a given job
//! ACTIVE at a time. Claiming is an atomic WAITING → ACTIVE transition
//! under the store lock; workers never coordinate with each other.
//!
//! Settlement (a job reaching COMPLETED or permanently FAILED) is published
//! to subscribers over an unbounded channel. The flow orchestrator and the
//! request tracker are the two consumers.

use super::job::{Job, JobError, JobId, JobSpec, JobState};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

/// A settlement notification: a job reached a terminal state.
#[derive(Debug, Clone)]
pub struct JobSettled {
    /// Job identifier.
    pub id: JobId,
    /// Queue the job belonged to.
    pub queue: String,
    /// Terminal state (Completed or Failed).
    pub state: JobState,
    /// Result value for completed jobs.
    pub result: Option<Value>,
    /// Last error message for failed jobs.
    pub error: Option<String>,
    /// Handler parameters (carried so consumers can route by content).
    pub params: Value,
    /// Parent job id for flow children.
    pub parent_id: Option<JobId>,
}

/// Error message recorded when a waiting job is cancelled by flow abort.
pub const CANCELLED_ERROR: &str = "cancelled before start";

/// Terminal job records kept around for inspection after settlement.
/// Older ones are pruned so a long-running store stays bounded.
const MAX_SETTLED_RETAINED: usize = 1024;

/// Shared, concurrent job store.
///
/// All mutation happens under one async mutex; per-queue [`Notify`]
/// handles wake idle workers when new work appears. The store is cheap to
/// clone behind an [`Arc`] and tolerates concurrent readers and writers.
pub struct JobStore {
    inner: Mutex<StoreInner>,
    /// Per-queue wakeup for worker pools.
    notifiers: DashMap<String, Arc<Notify>>,
}

struct StoreInner {
    jobs: HashMap<JobId, Job>,
    /// FIFO of waiting job ids per queue.
    waiting: HashMap<String, VecDeque<JobId>>,
    /// Settlement subscribers.
    subscribers: Vec<mpsc::UnboundedSender<JobSettled>>,
    /// Terminal job ids in settlement order, oldest first.
    settled: VecDeque<JobId>,
}

impl StoreInner {
    /// Records a settled job and prunes the oldest terminal records
    /// beyond the retention window.
    fn retire(&mut self, id: JobId) {
        self.settled.push_back(id);
        while self.settled.len() > MAX_SETTLED_RETAINED {
            if let Some(old) = self.settled.pop_front() {
                self.jobs.remove(&old);
            }
        }
    }
}

impl JobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                jobs: HashMap::new(),
                waiting: HashMap::new(),
                subscribers: Vec::new(),
                settled: VecDeque::new(),
            }),
            notifiers: DashMap::new(),
        }
    }

    /// Returns the wakeup handle for a queue, creating it on first use.
    pub fn notifier(&self, queue: &str) -> Arc<Notify> {
        self.notifiers
            .entry(queue.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Subscribes to settlement events.
    ///
    /// Every job that reaches a terminal state after this call is reported
    /// on the returned channel.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<JobSettled> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().await.subscribers.push(tx);
        rx
    }

    /// Enqueues a job and returns its id.
    ///
    /// Held jobs are registered but invisible to workers until
    /// [`release`](Self::release).
    pub async fn enqueue(&self, spec: JobSpec) -> JobId {
        let job = Job::from_spec(spec);
        let id = job.id.clone();
        let queue = job.queue.clone();
        let held = job.held;

        {
            let mut inner = self.inner.lock().await;
            if !held {
                inner
                    .waiting
                    .entry(queue.clone())
                    .or_default()
                    .push_back(id.clone());
            }
            inner.jobs.insert(id.clone(), job);
        }

        debug!(job_id = %id, queue = %queue, held = held, "Job enqueued");
        if !held {
            self.notifier(&queue).notify_one();
        }
        id
    }

    /// Makes a held job eligible for worker pickup.
    pub async fn release(&self, id: &JobId) {
        let queue = {
            let mut inner = self.inner.lock().await;
            let Some(job) = inner.jobs.get_mut(id) else {
                warn!(job_id = %id, "Release of unknown job ignored");
                return;
            };
            if !job.held || job.state != JobState::Waiting {
                return;
            }
            job.held = false;
            let queue = job.queue.clone();
            inner
                .waiting
                .entry(queue.clone())
                .or_default()
                .push_back(id.clone());
            queue
        };

        debug!(job_id = %id, queue = %queue, "Held job released");
        self.notifier(&queue).notify_one();
    }

    /// Atomically claims one due WAITING job from the queue.
    ///
    /// The claimed job transitions to ACTIVE and its attempt counter is
    /// incremented; the returned snapshot is what the worker executes.
    /// Returns `None` when no job is due.
    pub async fn claim(&self, queue: &str) -> Option<Job> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;

        let waiting = inner.waiting.get_mut(queue)?;
        let mut skipped = Vec::new();
        let mut claimed = None;

        while let Some(id) = waiting.pop_front() {
            let Some(job) = inner.jobs.get_mut(&id) else {
                continue;
            };
            if job.state != JobState::Waiting || job.held {
                continue;
            }
            if job.available_at > now {
                skipped.push(id);
                continue;
            }
            job.state = JobState::Active;
            job.attempts += 1;
            claimed = Some(job.clone());
            break;
        }

        // Not-yet-due jobs go back in their original order.
        for id in skipped.into_iter().rev() {
            waiting.push_front(id);
        }

        claimed
    }

    /// Stores the result of a successful execution and settles the job.
    pub async fn complete(&self, id: &JobId, result: Value) {
        let settled = {
            let mut inner = self.inner.lock().await;
            let Some(job) = inner.jobs.get_mut(id) else {
                warn!(job_id = %id, "Completion for unknown job ignored");
                return;
            };
            if job.state != JobState::Active {
                warn!(job_id = %id, state = %job.state, "Completion for non-active job ignored");
                return;
            }
            job.state = JobState::Completed;
            job.result = Some(result);
            let settled = Self::settlement_of(job);
            inner.retire(id.clone());
            settled
        };

        info!(job_id = %id, queue = %settled.queue, "Job completed");
        self.publish(settled).await;
    }

    /// Records a failed execution attempt.
    ///
    /// Retryable errors are re-queued with the job's backoff delay while
    /// the attempt budget lasts; otherwise the job fails permanently and a
    /// settlement event is published.
    pub async fn fail(&self, id: &JobId, error: &JobError) {
        let (queue, settled) = {
            let mut inner = self.inner.lock().await;
            let inner = &mut *inner;
            let Some(job) = inner.jobs.get_mut(id) else {
                warn!(job_id = %id, "Failure for unknown job ignored");
                return;
            };
            if job.state != JobState::Active {
                warn!(job_id = %id, state = %job.state, "Failure for non-active job ignored");
                return;
            }
            job.error = Some(error.message.clone());

            let will_retry = error.is_retryable && job.attempts < job.max_attempts;
            if will_retry {
                let delay = job.backoff.delay(job.attempts);
                job.state = JobState::Waiting;
                job.available_at = Instant::now() + delay;
                let queue = job.queue.clone();
                inner
                    .waiting
                    .entry(queue.clone())
                    .or_default()
                    .push_back(id.clone());
                warn!(
                    job_id = %id,
                    queue = %queue,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "Job attempt failed, retry scheduled"
                );
                (Some(queue), None)
            } else {
                job.state = JobState::Failed;
                let settled = Self::settlement_of(job);
                inner.retire(id.clone());
                (None, Some(settled))
            }
        };

        if let Some(queue) = queue {
            self.notifier(&queue).notify_one();
        }
        if let Some(settled) = settled {
            warn!(
                job_id = %id,
                queue = %settled.queue,
                error = %error,
                "Job failed permanently"
            );
            self.publish(settled).await;
        }
    }

    /// Best-effort cancellation of a job that has not started.
    ///
    /// Succeeds only while the job is WAITING: the job is marked FAILED
    /// with [`CANCELLED_ERROR`] and settled. An ACTIVE job is left to
    /// finish and `false` is returned.
    pub async fn cancel(&self, id: &JobId) -> bool {
        self.abort(id, CANCELLED_ERROR).await
    }

    /// Fails a job that has not started, bypassing the retry budget.
    ///
    /// Works on WAITING jobs, held ones included — this is how a flow
    /// parent is failed without ever running when its flow aborts.
    /// Returns `false` for ACTIVE or already-terminal jobs.
    pub async fn abort(&self, id: &JobId, message: &str) -> bool {
        let settled = {
            let mut inner = self.inner.lock().await;
            let Some(job) = inner.jobs.get_mut(id) else {
                return false;
            };
            if job.state != JobState::Waiting {
                return false;
            }
            job.state = JobState::Failed;
            job.error = Some(message.to_string());
            let settled = Self::settlement_of(job);
            inner.retire(id.clone());
            settled
        };

        info!(job_id = %id, queue = %settled.queue, error = %message, "Waiting job aborted");
        self.publish(settled).await;
        true
    }

    /// Returns a snapshot of a job record.
    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.inner.lock().await.jobs.get(id).cloned()
    }

    fn settlement_of(job: &Job) -> JobSettled {
        JobSettled {
            id: job.id.clone(),
            queue: job.queue.clone(),
            state: job.state,
            result: job.result.clone(),
            error: job.error.clone(),
            params: job.params.clone(),
            parent_id: job.parent_id.clone(),
        }
    }

    async fn publish(&self, event: JobSettled) {
        let mut inner = self.inner.lock().await;
        inner
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore").finish()
    }
}
