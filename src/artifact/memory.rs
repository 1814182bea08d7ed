//! In-memory artifact store.

use super::{ArtifactError, ArtifactStore, ArtifactWriter, ObjectStat, StoredArtifact};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

/// In-memory [`ArtifactStore`] used in tests and single-process setups.
#[derive(Clone, Default)]
pub struct MemoryArtifactStore {
    objects: Arc<DashMap<String, StoredObject>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn insert(&self, path: &str, data: Bytes) -> StoredArtifact {
        let size = data.len() as u64;
        self.objects.insert(
            path.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        StoredArtifact {
            locator: path.to_string(),
            size,
        }
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.insert(path, data)) })
    }

    fn get<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, ArtifactError>> + Send + 'a>> {
        Box::pin(async move {
            self.objects
                .get(path)
                .map(|obj| obj.data.clone())
                .ok_or_else(|| ArtifactError::NotFound(path.to_string()))
        })
    }

    fn stat<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ObjectStat>, ArtifactError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(self.objects.get(path).map(|obj| ObjectStat {
                size: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
            }))
        })
    }

    fn writer<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ArtifactWriter>, ArtifactError>> + Send + 'a>>
    {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            Ok(Box::new(MemoryWriter {
                store,
                path,
                buffer: BytesMut::new(),
            }) as Box<dyn ArtifactWriter>)
        })
    }
}

struct MemoryWriter {
    store: MemoryArtifactStore,
    path: String,
    buffer: BytesMut,
}

impl ArtifactWriter for MemoryWriter {
    fn write<'a>(
        &'a mut self,
        chunk: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArtifactError>> + Send + 'a>> {
        Box::pin(async move {
            self.buffer.extend_from_slice(&chunk);
            Ok(())
        })
    }

    fn finish(
        self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send>> {
        Box::pin(async move { Ok(self.store.insert(&self.path, self.buffer.freeze())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_stat() {
        let store = MemoryArtifactStore::new();
        store
            .put("reports/r1/chunk-0.pdf", Bytes::from_static(b"%PDF-0"))
            .await
            .unwrap();

        let data = store.get("reports/r1/chunk-0.pdf").await.unwrap();
        assert_eq!(&data[..], b"%PDF-0");

        let stat = store.stat("reports/r1/chunk-0.pdf").await.unwrap().unwrap();
        assert_eq!(stat.size, 6);
        assert!(store.stat("reports/r1/missing.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryArtifactStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_writer_invisible_until_finish() {
        let store = MemoryArtifactStore::new();
        let mut writer = store.writer("exports/r1.geojson").await.unwrap();
        writer.write(Bytes::from_static(b"{\"type\":")).await.unwrap();
        writer.write(Bytes::from_static(b"\"FeatureCollection\"}")).await.unwrap();

        assert!(store.stat("exports/r1.geojson").await.unwrap().is_none());

        let stored = writer.finish().await.unwrap();
        assert_eq!(stored.size, 28);
        let data = store.get("exports/r1.geojson").await.unwrap();
        assert_eq!(&data[..], b"{\"type\":\"FeatureCollection\"}");
    }
}
