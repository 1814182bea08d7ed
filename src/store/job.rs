//! Job record and related types.
//!
//! A job is a unit of work on a named queue: parameters in, a JSON value
//! out, with a retry budget and backoff policy. Jobs are owned exclusively
//! by the [`JobStore`](super::JobStore); workers borrow one for the
//! duration of a single execution attempt.

use super::policy::BackoffPolicy;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global counter for generating unique job IDs.
static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a job.
///
/// Job IDs are strings that uniquely identify a job instance. They can be
/// generated automatically or constructed from meaningful data (like a
/// request id plus a chunk index).
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    /// Creates a new job ID with the given string value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a unique auto-generated job ID (`job-{counter}`).
    pub fn auto() -> Self {
        let counter = JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("job-{}", counter))
    }

    /// Returns the string value of this job ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a job.
///
/// `Completed` is terminal; `Failed` is terminal once the retry budget is
/// exhausted (a failed attempt that will be retried goes back to
/// `Waiting`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JobState {
    /// Eligible for worker pickup (or scheduled for a later attempt).
    #[default]
    Waiting,

    /// Currently held by exactly one worker.
    Active,

    /// Finished successfully; the result value is available.
    Completed,

    /// Failed permanently after exhausting attempts (or cancelled).
    Failed,
}

impl JobState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Active => write!(f, "Active"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Specification of a job to enqueue.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Explicit job id; `None` auto-generates one.
    pub id: Option<JobId>,

    /// Queue (job type) the job belongs to.
    pub queue: String,

    /// Handler parameters.
    pub params: Value,

    /// Maximum number of execution attempts.
    pub max_attempts: u32,

    /// Delay policy between failed attempts.
    pub backoff: BackoffPolicy,

    /// When true the job is registered but not eligible for pickup until
    /// [`JobStore::release`](super::JobStore::release) is called. Used by
    /// the flow orchestrator for parents gated on children.
    pub held: bool,

    /// Parent job id, for children belonging to a flow.
    pub parent_id: Option<JobId>,
}

impl JobSpec {
    /// Creates a spec for the given queue with default retry settings.
    pub fn new(queue: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            queue: queue.into(),
            params,
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            held: false,
            parent_id: None,
        }
    }

    /// Sets an explicit job id.
    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the maximum attempt count.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Marks the job as held (not eligible for pickup until released).
    pub fn held(mut self) -> Self {
        self.held = true;
        self
    }

    /// Sets the parent job id.
    pub fn with_parent(mut self, parent: JobId) -> Self {
        self.parent_id = Some(parent);
        self
    }
}

/// A job record as held by the store.
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique identifier.
    pub id: JobId,

    /// Queue (job type) the job belongs to.
    pub queue: String,

    /// Handler parameters.
    pub params: Value,

    /// Attempts made so far.
    pub attempts: u32,

    /// Maximum number of attempts before failing permanently.
    pub max_attempts: u32,

    /// Delay policy between failed attempts.
    pub backoff: BackoffPolicy,

    /// Current lifecycle state.
    pub state: JobState,

    /// Result value, set when the job completes.
    pub result: Option<Value>,

    /// Last error message, set on failed attempts.
    pub error: Option<String>,

    /// Parent job id for flow children.
    pub parent_id: Option<JobId>,

    /// Earliest instant the job may be claimed (backoff scheduling).
    pub available_at: Instant,

    /// Held jobs are invisible to workers until released.
    pub held: bool,
}

impl Job {
    pub(crate) fn from_spec(spec: JobSpec) -> Self {
        Self {
            id: spec.id.unwrap_or_else(JobId::auto),
            queue: spec.queue,
            params: spec.params,
            attempts: 0,
            max_attempts: spec.max_attempts.max(1),
            backoff: spec.backoff,
            state: JobState::Waiting,
            result: None,
            error: None,
            parent_id: spec.parent_id,
            available_at: Instant::now(),
            held: spec.held,
        }
    }
}

/// Error returned by a job handler.
///
/// Carries whether the failure is transient (retried up to the job's
/// attempt budget) or permanent (fails the job on the spot).
#[derive(Debug, Clone)]
pub struct JobError {
    /// Human-readable error message.
    pub message: String,
    /// Whether this error is retryable (transient) or permanent.
    pub is_retryable: bool,
}

impl JobError {
    /// Creates a retryable error (transient failure like a network blip).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: true,
        }
    }

    /// Creates a permanent error (won't succeed on retry).
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: false,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for JobError {}
