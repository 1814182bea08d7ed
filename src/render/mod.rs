//! External rendering engine client.
//!
//! Rendering (HTML page to PDF, map view to PNG) and PDF post-processing
//! (page counting, footer stamping) are performed by an
//! external headless-browser service. This module defines the client
//! contract and an HTTP implementation.

mod http;

pub use http::{HttpRenderer, RENDER_CONNECT_TIMEOUT};

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Deadline for a single renderer call.
///
/// `NoDeadline` leaves the call unbounded apart from the transport's
/// connect timeout; long document renders must not be cut short by a
/// blanket per-request limit. `After` bounds the call explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDeadline {
    NoDeadline,
    After(Duration),
}

/// What the renderer should wait for before capturing.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    /// Page to load.
    pub url: String,
    /// CSS selector that must be present before capture, if any.
    pub wait_for_selector: Option<String>,
}

impl RenderRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wait_for_selector: None,
        }
    }

    pub fn wait_for(mut self, selector: impl Into<String>) -> Self {
        self.wait_for_selector = Some(selector.into());
        self
    }
}

/// Footer text stamped onto one page.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PageFooter {
    /// Left-aligned text (document identifier).
    pub left: String,
    /// Right-aligned text (global page indicator).
    pub right: String,
}

/// Rendering engine failure.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The engine could not be reached or the call timed out.
    #[error("render engine unreachable: {0}")]
    Transport(String),

    /// The engine rejected the request (bad input, won't succeed on retry).
    #[error("render request rejected: {0}")]
    Rejected(String),

    /// The engine failed while processing (transient engine-side error).
    #[error("render engine error: {0}")]
    Engine(String),
}

impl RenderError {
    /// Whether a retry of the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Client contract for the external rendering engine.
///
/// Dyn-compatible so pipeline handlers can hold `Arc<dyn Renderer>` and
/// tests can substitute a scripted implementation.
pub trait Renderer: Send + Sync + 'static {
    /// Renders a page to PDF bytes.
    fn render_pdf<'a>(
        &'a self,
        request: &'a RenderRequest,
        deadline: CallDeadline,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>>;

    /// Captures a page as a PNG screenshot.
    fn render_screenshot<'a>(
        &'a self,
        request: &'a RenderRequest,
        deadline: CallDeadline,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>>;

    /// Returns the number of pages in a PDF document.
    fn page_count<'a>(
        &'a self,
        pdf: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<u32, RenderError>> + Send + 'a>>;

    /// Stamps one footer per page onto a PDF document.
    ///
    /// `footers.len()` must equal the document's page count.
    fn stamp_footers<'a>(
        &'a self,
        pdf: &'a [u8],
        footers: &'a [PageFooter],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>>;
}
