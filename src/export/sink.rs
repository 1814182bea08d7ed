//! Export output sinks.

use crate::artifact::{ArtifactError, ArtifactWriter, StoredArtifact};
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;

/// Destination of an export run's text fragments.
///
/// `write` completing is the generator's permission to produce the next
/// batch; a slow sink therefore throttles record fetching instead of
/// letting fragments pile up in memory.
pub trait ExportSink: Send {
    fn write<'a>(
        &'a mut self,
        fragment: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArtifactError>> + Send + 'a>>;

    /// Completes the output and returns its receipt.
    fn finish(
        self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send>>;
}

/// Sink writing into an artifact store's incremental writer.
pub struct ArtifactSink {
    writer: Box<dyn ArtifactWriter>,
}

impl ArtifactSink {
    pub fn new(writer: Box<dyn ArtifactWriter>) -> Self {
        Self { writer }
    }
}

impl ExportSink for ArtifactSink {
    fn write<'a>(
        &'a mut self,
        fragment: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArtifactError>> + Send + 'a>> {
        self.writer.write(fragment)
    }

    fn finish(
        self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send>> {
        self.writer.finish()
    }
}

/// In-memory sink recording every written fragment, for tests.
#[derive(Default)]
pub struct MemorySink {
    fragments: Vec<Bytes>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragments written so far, framing included.
    pub fn fragments(&self) -> &[Bytes] {
        &self.fragments
    }

    /// Concatenation of everything written.
    pub fn document(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            out.push_str(&String::from_utf8_lossy(fragment));
        }
        out
    }
}

impl ExportSink for MemorySink {
    fn write<'a>(
        &'a mut self,
        fragment: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArtifactError>> + Send + 'a>> {
        Box::pin(async move {
            self.fragments.push(fragment);
            Ok(())
        })
    }

    fn finish(
        self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send>> {
        Box::pin(async move {
            let size = self.fragments.iter().map(|f| f.len() as u64).sum();
            Ok(StoredArtifact {
                locator: "memory".to_string(),
                size,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactStore, MemoryArtifactStore};

    #[tokio::test]
    async fn test_memory_sink_records_fragments() {
        let mut sink = MemorySink::new();
        sink.write(Bytes::from_static(b"[")).await.unwrap();
        sink.write(Bytes::from_static(b"]")).await.unwrap();
        assert_eq!(sink.fragments().len(), 2);
        assert_eq!(sink.document(), "[]");
    }

    #[tokio::test]
    async fn test_artifact_sink_streams_into_store() {
        let store = MemoryArtifactStore::new();
        let writer = store.writer("exports/r1.geojson").await.unwrap();
        let mut sink = Box::new(ArtifactSink::new(writer));

        sink.write(Bytes::from_static(b"abc")).await.unwrap();
        sink.write(Bytes::from_static(b"def")).await.unwrap();
        let stored = ExportSink::finish(sink).await.unwrap();

        assert_eq!(stored.size, 6);
        let data = store.get("exports/r1.geojson").await.unwrap();
        assert_eq!(&data[..], b"abcdef");
    }
}
