//! Flow orchestration: parent jobs gated on child job sets.
//!
//! A flow binds one held parent job to N child jobs. The orchestrator
//! watches the store's settlement stream; the parent becomes runnable only
//! after every child completes, with the children's results exposed to the
//! parent's handler. A permanently failed child either aborts the whole
//! flow (cancelling not-yet-started siblings) or lets the siblings finish
//! before failing the parent, depending on [`FlowOptions`].

mod node;
mod orchestrator;

pub use node::{ChildResults, FlowOptions};
pub use orchestrator::{FlowOrchestrator, CHILD_FAILED_ERROR};
