//! Shared test doubles for integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use terradoc::artifact::{
    ArtifactError, ArtifactStore, ArtifactWriter, MemoryArtifactStore, ObjectStat, StoredArtifact,
};
use terradoc::render::{CallDeadline, PageFooter, RenderError, RenderRequest, Renderer};

/// Deterministic renderer: every PDF has a fixed page count, stamping
/// replaces the document with one text line per footer so merged output
/// can be inspected as plain text.
pub struct FakeRenderer {
    pub pages_per_pdf: u32,
    pub pdf_calls: AtomicUsize,
    pub screenshot_calls: AtomicUsize,
}

impl FakeRenderer {
    pub fn new(pages_per_pdf: u32) -> Self {
        Self {
            pages_per_pdf,
            pdf_calls: AtomicUsize::new(0),
            screenshot_calls: AtomicUsize::new(0),
        }
    }
}

impl Renderer for FakeRenderer {
    fn render_pdf<'a>(
        &'a self,
        request: &'a RenderRequest,
        _deadline: CallDeadline,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>> {
        Box::pin(async move {
            self.pdf_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("%PDF {}\n", request.url).into_bytes())
        })
    }

    fn render_screenshot<'a>(
        &'a self,
        _request: &'a RenderRequest,
        _deadline: CallDeadline,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>> {
        Box::pin(async move {
            self.screenshot_calls.fetch_add(1, Ordering::SeqCst);
            Ok(b"PNG".to_vec())
        })
    }

    fn page_count<'a>(
        &'a self,
        _pdf: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<u32, RenderError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.pages_per_pdf) })
    }

    fn stamp_footers<'a>(
        &'a self,
        _pdf: &'a [u8],
        footers: &'a [PageFooter],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>> {
        Box::pin(async move {
            let mut out = String::new();
            for footer in footers {
                out.push_str(&format!("{}|{}\n", footer.left, footer.right));
            }
            Ok(out.into_bytes())
        })
    }
}

/// Artifact store whose `stat` pretends objects at matching paths never
/// landed, so upload verification fails.
pub struct VerificationFailingStore {
    inner: MemoryArtifactStore,
    broken_path_fragment: String,
}

impl VerificationFailingStore {
    pub fn new(broken_path_fragment: impl Into<String>) -> Self {
        Self {
            inner: MemoryArtifactStore::new(),
            broken_path_fragment: broken_path_fragment.into(),
        }
    }
}

impl ArtifactStore for VerificationFailingStore {
    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send + 'a>> {
        self.inner.put(path, data)
    }

    fn get<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, ArtifactError>> + Send + 'a>> {
        self.inner.get(path)
    }

    fn stat<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ObjectStat>, ArtifactError>> + Send + 'a>> {
        if path.contains(&self.broken_path_fragment) {
            return Box::pin(async move { Ok(None) });
        }
        self.inner.stat(path)
    }

    fn writer<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ArtifactWriter>, ArtifactError>> + Send + 'a>>
    {
        self.inner.writer(path)
    }
}

/// Shared handle type used by the scenarios.
pub type SharedRenderer = Arc<FakeRenderer>;
