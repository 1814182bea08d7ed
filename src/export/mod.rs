//! Streaming GeoJSON export.
//!
//! An export run is a single job that walks the request's records with a
//! cursor, batch by batch, and streams GeoJSON text fragments into a sink.
//! The document framing is written exactly once at each end, so the whole
//! export is never materialized in memory; backpressure comes from the
//! sink, whose `write` must complete before the next batch is fetched.

mod cursor;
mod feature;
mod generator;
mod sink;

pub use cursor::ExportCursor;
pub use feature::{feature_for, fragment};
pub use generator::{generate_export, ExportHandler, ExportParams};
pub use sink::{ArtifactSink, ExportSink, MemorySink};

/// Queue of export generation jobs.
pub const EXPORT_QUEUE: &str = "export";

/// Opening delimiter of the export document.
pub const EXPORT_OPEN: &str = "{\"type\":\"FeatureCollection\",\"features\":[";

/// Closing delimiter of the export document.
pub const EXPORT_CLOSE: &str = "]}";
