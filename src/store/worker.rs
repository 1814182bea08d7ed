//! Worker pools.
//!
//! One [`WorkerPool`] serves one queue with a fixed number of concurrent
//! workers. Each worker loops: claim a due job from the store, run the
//! registered handler, and report the outcome back. Mutual exclusion per
//! job is the store's responsibility; the pool only bounds parallelism.
//!
//! Handlers must be safe to re-invoke: a retried handler may run again
//! after a partial prior success, so externally visible side effects
//! (artifact uploads) are verified for existence before being relied on
//! downstream.

use super::job::{Job, JobError};
use super::queue::JobStore;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default interval at which idle workers re-check for due jobs.
///
/// Wakeups are normally driven by the store's notifier; the poll interval
/// exists so that retries scheduled with a backoff delay are picked up.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handler for jobs of one queue.
///
/// Implementations hold their collaborators behind `Arc` and execute one
/// job attempt per call, returning either a JSON result value or a
/// [`JobError`] that decides retry behavior.
pub trait JobHandler: Send + Sync + 'static {
    /// Queue this handler serves.
    fn queue(&self) -> &str;

    /// Executes one attempt of the given job.
    fn execute<'a>(
        &'a self,
        job: &'a Job,
    ) -> Pin<Box<dyn Future<Output = Result<Value, JobError>> + Send + 'a>>;
}

/// Fixed-concurrency worker pool for one queue.
pub struct WorkerPool {
    store: Arc<JobStore>,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    /// Creates a pool of `concurrency` workers for the handler's queue.
    pub fn new(store: Arc<JobStore>, handler: Arc<dyn JobHandler>, concurrency: usize) -> Self {
        Self {
            store,
            handler,
            concurrency: concurrency.max(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the idle poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs the pool until shutdown is signalled.
    ///
    /// In-flight handler invocations finish before this returns.
    pub async fn run(self, shutdown: CancellationToken) {
        let queue = self.handler.queue().to_string();
        info!(
            queue = %queue,
            concurrency = self.concurrency,
            "Worker pool started"
        );

        let mut workers = JoinSet::new();
        for worker_index in 0..self.concurrency {
            let store = Arc::clone(&self.store);
            let handler = Arc::clone(&self.handler);
            let shutdown = shutdown.clone();
            let queue = queue.clone();
            let poll_interval = self.poll_interval;

            workers.spawn(async move {
                worker_loop(store, handler, queue, worker_index, poll_interval, shutdown).await;
            });
        }

        while workers.join_next().await.is_some() {}
        info!(queue = %queue, "Worker pool stopped");
    }
}

async fn worker_loop(
    store: Arc<JobStore>,
    handler: Arc<dyn JobHandler>,
    queue: String,
    worker_index: usize,
    poll_interval: Duration,
    shutdown: CancellationToken,
) {
    let notify = store.notifier(&queue);

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let Some(job) = store.claim(&queue).await else {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = notify.notified() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
            continue;
        };

        debug!(
            queue = %queue,
            worker = worker_index,
            job_id = %job.id,
            attempt = job.attempts,
            "Job claimed"
        );

        let start = Instant::now();
        match handler.execute(&job).await {
            Ok(value) => {
                debug!(
                    queue = %queue,
                    job_id = %job.id,
                    duration_ms = start.elapsed().as_millis(),
                    "Handler succeeded"
                );
                store.complete(&job.id, value).await;
            }
            Err(err) => {
                error!(
                    queue = %queue,
                    job_id = %job.id,
                    attempt = job.attempts,
                    error = %err,
                    retryable = err.is_retryable,
                    duration_ms = start.elapsed().as_millis(),
                    "Handler failed"
                );
                store.fail(&job.id, &err).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JobSpec, JobState};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl JobHandler for CountingHandler {
        fn queue(&self) -> &str {
            "counting"
        }

        fn execute<'a>(
            &'a self,
            job: &'a Job,
        ) -> Pin<Box<dyn Future<Output = Result<Value, JobError>> + Send + 'a>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.fail_first {
                    Err(JobError::retryable("induced failure"))
                } else {
                    Ok(json!({"echo": job.params.clone()}))
                }
            })
        }
    }

    #[tokio::test]
    async fn test_pool_runs_job_to_completion() {
        let store = Arc::new(JobStore::new());
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail_first: 0,
        });
        let mut events = store.subscribe().await;

        let shutdown = CancellationToken::new();
        let pool = WorkerPool::new(Arc::clone(&store), handler, 2);
        let pool_task = tokio::spawn(pool.run(shutdown.clone()));

        let id = store
            .enqueue(JobSpec::new("counting", json!({"n": 7})))
            .await;

        let settled = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("settlement within deadline")
            .unwrap();
        assert_eq!(settled.id, id);
        assert_eq!(settled.state, JobState::Completed);
        assert_eq!(settled.result, Some(json!({"echo": {"n": 7}})));

        shutdown.cancel();
        let _ = pool_task.await;
    }

    #[tokio::test]
    async fn test_pool_retries_then_succeeds() {
        let store = Arc::new(JobStore::new());
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail_first: 2,
        });
        let mut events = store.subscribe().await;

        let shutdown = CancellationToken::new();
        let pool = WorkerPool::new(Arc::clone(&store), Arc::clone(&handler) as Arc<dyn JobHandler>, 1)
            .with_poll_interval(Duration::from_millis(5));
        let pool_task = tokio::spawn(pool.run(shutdown.clone()));

        store
            .enqueue(
                JobSpec::new("counting", json!({}))
                    .with_max_attempts(3)
                    .with_backoff(crate::store::BackoffPolicy::Fixed(Duration::from_millis(
                        10,
                    ))),
            )
            .await;

        let settled = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("settlement within deadline")
            .unwrap();
        assert_eq!(settled.state, JobState::Completed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

        shutdown.cancel();
        let _ = pool_task.await;
    }

    #[tokio::test]
    async fn test_pool_exhausts_attempts() {
        let store = Arc::new(JobStore::new());
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail_first: usize::MAX,
        });
        let mut events = store.subscribe().await;

        let shutdown = CancellationToken::new();
        let pool = WorkerPool::new(Arc::clone(&store), Arc::clone(&handler) as Arc<dyn JobHandler>, 1)
            .with_poll_interval(Duration::from_millis(5));
        let pool_task = tokio::spawn(pool.run(shutdown.clone()));

        store
            .enqueue(
                JobSpec::new("counting", json!({}))
                    .with_max_attempts(2)
                    .with_backoff(crate::store::BackoffPolicy::Fixed(Duration::from_millis(
                        5,
                    ))),
            )
            .await;

        let settled = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("settlement within deadline")
            .unwrap();
        assert_eq!(settled.state, JobState::Failed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);

        shutdown.cancel();
        let _ = pool_task.await;
    }
}
