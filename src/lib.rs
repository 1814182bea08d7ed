//! Terradoc — asynchronous report generation for geospatial datasets.
//!
//! Terradoc turns a large, paginated dataset of place records into a single
//! merged, paginated document, and independently into a streamed GeoJSON
//! export. The heavy lifting is coordinated by a small set of primitives:
//!
//! - **Job store & worker pools** ([`store`]): a shared job queue with
//!   per-queue fixed-concurrency worker pools, retry with backoff, and
//!   store-enforced at-most-one-active-execution per job.
//! - **Flow orchestrator** ([`flow`]): lets a parent job declare a dynamic
//!   set of child jobs; the parent runs only after every child settles and
//!   can read all child results keyed by child identity.
//! - **Render cache** ([`cache`]): content-addressed cache mapping a
//!   deterministic hash of rendering inputs to a previously uploaded
//!   artifact, valid within a freshness window.
//! - **Render-merge pipeline** ([`pipeline`]): splits the dataset into
//!   ordered chunks, renders each chunk to a partial document, stamps
//!   cross-document page numbers once every chunk's page count is known,
//!   and merges the stamped parts into one ordered final document.
//! - **Streaming export** ([`export`]): a cursor-paginated, memory-bounded
//!   generator that emits a GeoJSON feature collection fragment by
//!   fragment to a backpressure-respecting sink.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TerradocService                          │
//! │  generate_document / generate_export (idempotent accept)    │
//! ├──────────────┬──────────────────────┬───────────────────────┤
//! │ Flow         │ Job Store +          │ Request               │
//! │ Orchestrator │ Worker Pools         │ Tracker               │
//! ├──────────────┴──────────────────────┴───────────────────────┤
//! │  Render Cache │ Renderer │ Artifact Store │ Data Source     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Data flows one way: a request creates a parent job in the flow
//! orchestrator; workers pull chunk jobs from the store, consult the render
//! cache before calling the external renderer, upload and verify artifacts,
//! and return `{index, locator, page_count}` results; the parent reads all
//! child results and drives the stamp and merge stages. The export
//! generator bypasses the orchestrator entirely — it is a single
//! long-running job that paginates the data source itself.

pub mod artifact;
pub mod cache;
pub mod config;
pub mod export;
pub mod flow;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod service;
pub mod source;
pub mod store;

pub use config::Config;
pub use service::{Accepted, TerradocService};
