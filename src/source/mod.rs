//! Upstream data access.
//!
//! The pipeline reads two things from the owning application: the report
//! request itself (with its generation status fields) and the request's
//! data records, fetched in deterministic pages so chunking and export
//! pagination are reproducible.

mod memory;

pub use memory::{MemoryDataSource, MemoryRequestStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Lifecycle of a generated deliverable (document or export) on a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Never generated (or invalidated by a data change).
    #[default]
    NotGenerated,
    /// A generation run is in flight.
    Generating,
    /// Generated and available at the locator.
    Ready { locator: String },
    /// The last generation run failed permanently.
    Failed,
}

impl GenerationStatus {
    /// Whether a new generation run may be started.
    pub fn accepts_new_run(&self) -> bool {
        matches!(self, Self::NotGenerated | Self::Failed)
    }
}

/// A report request as the owning application sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub id: String,
    /// Human-readable title, stamped into page footers.
    pub title: String,
    /// Data snapshot the report covers.
    pub snapshot: DateTime<Utc>,
    pub document_status: GenerationStatus,
    pub export_status: GenerationStatus,
}

/// Point location of a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
}

/// One data record belonging to a request.
///
/// Records with a location get a rendered map view in the document and a
/// Point geometry in exports; unlocated records appear with null geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRecord {
    pub id: String,
    pub name: String,
    /// Arbitrary attributes carried into export feature properties.
    pub attributes: serde_json::Value,
    pub location: Option<Location>,
}

impl DataRecord {
    pub fn is_located(&self) -> bool {
        self.location.is_some()
    }
}

/// Upstream access failure.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request does not exist upstream.
    #[error("request not found: {0}")]
    RequestNotFound(String),

    /// The upstream is temporarily unreachable.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::RequestNotFound(_))
    }
}

/// Paged, deterministic access to a request's data records.
///
/// Every method sees the same stable ordering (by record id) so that a
/// retried job re-reads exactly the page its predecessor saw.
pub trait DataSource: Send + Sync + 'static {
    /// Total number of records on the request.
    fn count_records<'a>(
        &'a self,
        request_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, SourceError>> + Send + 'a>>;

    /// One page of all records, ordered by id.
    fn record_page<'a>(
        &'a self,
        request_id: &'a str,
        offset: u64,
        limit: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DataRecord>, SourceError>> + Send + 'a>>;

    /// One page of located records only, ordered by id.
    fn located_page<'a>(
        &'a self,
        request_id: &'a str,
        offset: u64,
        limit: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DataRecord>, SourceError>> + Send + 'a>>;

    /// One page of unlocated records only, ordered by id.
    fn unlocated_page<'a>(
        &'a self,
        request_id: &'a str,
        offset: u64,
        limit: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DataRecord>, SourceError>> + Send + 'a>>;
}

/// Access to request records and their generation status fields.
pub trait RequestStore: Send + Sync + 'static {
    /// Loads a request, or `None` when it does not exist.
    fn load<'a>(
        &'a self,
        request_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ReportRequest>, SourceError>> + Send + 'a>>;

    /// Updates the document generation status.
    fn set_document_status<'a>(
        &'a self,
        request_id: &'a str,
        status: GenerationStatus,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>>;

    /// Updates the export generation status.
    fn set_export_status<'a>(
        &'a self,
        request_id: &'a str,
        status: GenerationStatus,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>>;
}
