//! HTTP client for the rendering engine.

use super::{CallDeadline, PageFooter, RenderError, RenderRequest, Renderer};
use reqwest::StatusCode;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Connect-phase timeout; applies to every call regardless of deadline.
pub const RENDER_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP implementation of [`Renderer`] against a headless-browser
/// rendering service.
///
/// The service exposes `POST /render/pdf`, `POST /render/screenshot`,
/// `POST /pdf/info` and `POST /pdf/stamp`. Binary payloads travel as raw
/// bodies; structured arguments as JSON.
///
/// Document renders can legitimately run for minutes, so
/// [`CallDeadline::NoDeadline`] imposes no overall request timeout: only
/// the connect phase is bounded. A bounded deadline must be asked for
/// explicitly with [`CallDeadline::After`].
pub struct HttpRenderer {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PdfInfo {
    pages: u32,
}

impl HttpRenderer {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(RENDER_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RenderError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn timeout_for(deadline: CallDeadline) -> Option<Duration> {
        match deadline {
            CallDeadline::NoDeadline => None,
            CallDeadline::After(d) => Some(d),
        }
    }

    async fn capture(
        &self,
        path: &str,
        request: &RenderRequest,
        deadline: CallDeadline,
    ) -> Result<Vec<u8>, RenderError> {
        debug!(url = %request.url, path = path, "Render call");
        let mut builder = self.client.post(self.endpoint(path));
        if let Some(timeout) = Self::timeout_for(deadline) {
            builder = builder.timeout(timeout);
        }
        let response = builder
            .json(&serde_json::json!({
                "url": request.url,
                "waitForSelector": request.wait_for_selector,
            }))
            .send()
            .await
            .map_err(|e| RenderError::Transport(e.to_string()))?;
        Self::body_or_error(response).await
    }

    async fn body_or_error(response: reqwest::Response) -> Result<Vec<u8>, RenderError> {
        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| RenderError::Transport(e.to_string()))?;
            return Ok(bytes.to_vec());
        }
        let detail = response.text().await.unwrap_or_default();
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            Err(RenderError::Rejected(format!("{}: {}", status, detail)))
        } else {
            Err(RenderError::Engine(format!("{}: {}", status, detail)))
        }
    }
}

impl Renderer for HttpRenderer {
    fn render_pdf<'a>(
        &'a self,
        request: &'a RenderRequest,
        deadline: CallDeadline,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>> {
        Box::pin(self.capture("/render/pdf", request, deadline))
    }

    fn render_screenshot<'a>(
        &'a self,
        request: &'a RenderRequest,
        deadline: CallDeadline,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>> {
        Box::pin(self.capture("/render/screenshot", request, deadline))
    }

    fn page_count<'a>(
        &'a self,
        pdf: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<u32, RenderError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint("/pdf/info"))
                .header("content-type", "application/pdf")
                .body(pdf.to_vec())
                .send()
                .await
                .map_err(|e| RenderError::Transport(e.to_string()))?;
            let body = Self::body_or_error(response).await?;
            let info: PdfInfo = serde_json::from_slice(&body)
                .map_err(|e| RenderError::Engine(format!("malformed pdf info: {}", e)))?;
            Ok(info.pages)
        })
    }

    fn stamp_footers<'a>(
        &'a self,
        pdf: &'a [u8],
        footers: &'a [PageFooter],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>> {
        Box::pin(async move {
            let footers_json = serde_json::to_string(footers)
                .map_err(|e| RenderError::Rejected(e.to_string()))?;
            let response = self
                .client
                .post(self.endpoint("/pdf/stamp"))
                .header("content-type", "application/pdf")
                .header("x-footers", footers_json)
                .body(pdf.to_vec())
                .send()
                .await
                .map_err(|e| RenderError::Transport(e.to_string()))?;
            Self::body_or_error(response).await
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let renderer = HttpRenderer::new("http://render.internal:9222/").unwrap();
        assert_eq!(
            renderer.endpoint("/render/pdf"),
            "http://render.internal:9222/render/pdf"
        );
    }

    #[test]
    fn test_no_deadline_means_no_request_timeout() {
        assert_eq!(HttpRenderer::timeout_for(CallDeadline::NoDeadline), None);
        assert_eq!(
            HttpRenderer::timeout_for(CallDeadline::After(Duration::from_secs(5))),
            Some(Duration::from_secs(5))
        );
    }
}
