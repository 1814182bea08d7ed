//! Filesystem-backed artifact store.

use super::{ArtifactError, ArtifactStore, ArtifactWriter, ObjectStat, StoredArtifact};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// [`ArtifactStore`] rooted at a local directory.
///
/// Objects are plain files under the root; parent directories are created
/// on demand. Incremental writes go to a `.partial` sibling that is
/// renamed into place on finish, so readers never observe a half-written
/// object.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    async fn ensure_parent(file: &Path) -> Result<(), ArtifactError> {
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArtifactError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send + 'a>> {
        Box::pin(async move {
            let file = self.resolve(path);
            Self::ensure_parent(&file).await?;
            let size = data.len() as u64;
            tokio::fs::write(&file, &data)
                .await
                .map_err(|e| ArtifactError::Storage(e.to_string()))?;
            debug!(path = %path, size = size, "Artifact written");
            Ok(StoredArtifact {
                locator: path.to_string(),
                size,
            })
        })
    }

    fn get<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, ArtifactError>> + Send + 'a>> {
        Box::pin(async move {
            match tokio::fs::read(self.resolve(path)).await {
                Ok(data) => Ok(Bytes::from(data)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(ArtifactError::NotFound(path.to_string()))
                }
                Err(e) => Err(ArtifactError::Storage(e.to_string())),
            }
        })
    }

    fn stat<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ObjectStat>, ArtifactError>> + Send + 'a>> {
        Box::pin(async move {
            match tokio::fs::metadata(self.resolve(path)).await {
                Ok(meta) => {
                    let last_modified = meta
                        .modified()
                        .ok()
                        .map(|t| DateTime::<Utc>::from(t));
                    Ok(Some(ObjectStat {
                        size: meta.len(),
                        last_modified,
                    }))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(ArtifactError::Storage(e.to_string())),
            }
        })
    }

    fn writer<'a>(
        &'a self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ArtifactWriter>, ArtifactError>> + Send + 'a>>
    {
        Box::pin(async move {
            let target = self.resolve(path);
            Self::ensure_parent(&target).await?;
            let mut partial = target.clone().into_os_string();
            partial.push(".partial");
            let partial = PathBuf::from(partial);
            let file = tokio::fs::File::create(&partial)
                .await
                .map_err(|e| ArtifactError::Storage(e.to_string()))?;
            Ok(Box::new(FsWriter {
                file,
                partial,
                target,
                locator: path.to_string(),
                written: 0,
            }) as Box<dyn ArtifactWriter>)
        })
    }
}

struct FsWriter {
    file: tokio::fs::File,
    partial: PathBuf,
    target: PathBuf,
    locator: String,
    written: u64,
}

impl ArtifactWriter for FsWriter {
    fn write<'a>(
        &'a mut self,
        chunk: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArtifactError>> + Send + 'a>> {
        Box::pin(async move {
            self.file
                .write_all(&chunk)
                .await
                .map_err(|e| ArtifactError::Storage(e.to_string()))?;
            self.written += chunk.len() as u64;
            Ok(())
        })
    }

    fn finish(
        mut self: Box<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredArtifact, ArtifactError>> + Send>> {
        Box::pin(async move {
            self.file
                .flush()
                .await
                .map_err(|e| ArtifactError::Storage(e.to_string()))?;
            drop(self.file);
            tokio::fs::rename(&self.partial, &self.target)
                .await
                .map_err(|e| ArtifactError::Storage(e.to_string()))?;
            Ok(StoredArtifact {
                locator: self.locator,
                size: self.written,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        let stored = store
            .put("reports/r1/final.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(stored.size, 4);

        let data = store.get("reports/r1/final.pdf").await.unwrap();
        assert_eq!(&data[..], b"%PDF");
    }

    #[tokio::test]
    async fn test_stat_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(store.stat("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_streaming_writer_renames_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        let mut writer = store.writer("exports/big.geojson").await.unwrap();
        writer.write(Bytes::from_static(b"part1-")).await.unwrap();

        // Target absent while writing.
        assert!(store.stat("exports/big.geojson").await.unwrap().is_none());

        writer.write(Bytes::from_static(b"part2")).await.unwrap();
        let stored = writer.finish().await.unwrap();
        assert_eq!(stored.size, 11);

        let data = store.get("exports/big.geojson").await.unwrap();
        assert_eq!(&data[..], b"part1-part2");
    }
}
