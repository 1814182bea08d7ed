//! Durable-style job queue with per-queue worker pools.
//!
//! # Core concepts
//!
//! - **Job**: a unit of work on a named queue with a retry budget and
//!   backoff policy. States: Waiting → Active → Completed | Failed.
//! - **JobStore**: the single owner of all job records; enforces at most
//!   one active execution per job and publishes settlement events.
//! - **WorkerPool**: a fixed number of workers serving one queue, each
//!   running the queue's registered [`JobHandler`].
//!
//! Unrelated jobs run fully in parallel, bounded by each pool's
//! concurrency; execution of a single job is mutually exclusive,
//! store-enforced.

mod job;
mod policy;
mod queue;
mod worker;

pub use job::{Job, JobError, JobId, JobSpec, JobState};
pub use policy::{
    BackoffPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_SECS,
};
pub use queue::{JobSettled, JobStore, CANCELLED_ERROR};
pub use worker::{JobHandler, WorkerPool, DEFAULT_POLL_INTERVAL};
