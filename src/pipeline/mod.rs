//! Chunked render-merge document pipeline.
//!
//! A document generation run is a two-stage flow chain:
//!
//! ```text
//!   render-chunk x N ──┐
//!   render-chunk       ├──> collect-renders ──> stamp-chunk x N ──┐
//!   render-chunk      ─┘        (parent)        stamp-chunk       ├──> merge-report
//!                                               stamp-chunk      ─┘      (parent)
//! ```
//!
//! Stage 1 renders the intro chunk plus one chunk per record batch, each
//! producing an uploaded partial document and its page count. The collect
//! parent computes global page offsets once, centrally, and spawns stage 2:
//! one stamp job per chunk writing `page/total` footers, gated by the merge
//! parent that concatenates the stamped parts into the final document.
//!
//! The request tracker is the single writer of the request's generation
//! status: merge completion makes it Ready, any permanent pipeline failure
//! makes it Failed.

mod chunk;
mod collect;
mod merge;
mod render_chunk;
mod stamp;
mod tracker;

pub use chunk::{plan_chunks, ChunkArtifact, ChunkSpec, RecordBatch, INTRO_CHUNK_INDEX};
pub use collect::{CollectHandler, CollectParams};
pub use merge::{MergeHandler, MergeParams};
pub use render_chunk::{RenderChunkHandler, RenderChunkParams};
pub use stamp::{StampHandler, StampParams};
pub use tracker::RequestTracker;

use crate::artifact::ArtifactError;
use crate::render::RenderError;
use crate::source::SourceError;
use crate::store::JobError;

/// Queue of stage-1 chunk rendering jobs.
pub const RENDER_CHUNK_QUEUE: &str = "render-chunk";

/// Queue of the stage-1 parent that schedules stamping.
pub const COLLECT_QUEUE: &str = "collect-renders";

/// Queue of stage-2 footer stamping jobs.
pub const STAMP_QUEUE: &str = "stamp-chunk";

/// Queue of the stage-2 parent that merges the final document.
pub const MERGE_QUEUE: &str = "merge-report";

impl From<RenderError> for JobError {
    fn from(err: RenderError) -> Self {
        Self {
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        }
    }
}

impl From<ArtifactError> for JobError {
    fn from(err: ArtifactError) -> Self {
        Self {
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        }
    }
}

impl From<SourceError> for JobError {
    fn from(err: SourceError) -> Self {
        Self {
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryability_carried_into_job_error() {
        let err: JobError = RenderError::Rejected("bad url".into()).into();
        assert!(!err.is_retryable);

        let err: JobError = ArtifactError::Verification {
            path: "p".into(),
            reason: "absent".into(),
        }
        .into();
        assert!(err.is_retryable);

        let err: JobError = SourceError::RequestNotFound("r1".into()).into();
        assert!(!err.is_retryable);
    }
}
