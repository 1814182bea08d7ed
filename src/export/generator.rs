//! Export generation.

use super::cursor::ExportCursor;
use super::feature::{feature_for, fragment};
use super::sink::{ArtifactSink, ExportSink};
use super::{EXPORT_CLOSE, EXPORT_OPEN, EXPORT_QUEUE};
use crate::artifact::{verify_stored, ArtifactStore};
use crate::source::DataSource;
use crate::store::{Job, JobError, JobHandler};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

/// Parameters of an `export` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportParams {
    pub request_id: String,
}

/// Streams a request's records into a sink as one GeoJSON document.
///
/// One fragment is written per non-empty round; rounds fetch up to
/// `batch_size` located and unlocated records at the cursor's offset.
/// Returns the number of features written.
pub async fn generate_export(
    source: &dyn DataSource,
    request_id: &str,
    batch_size: u64,
    sink: &mut dyn ExportSink,
) -> Result<u64, JobError> {
    sink.write(Bytes::from_static(EXPORT_OPEN.as_bytes()))
        .await?;

    let mut cursor = ExportCursor::new(batch_size);
    let mut features_written = 0u64;

    while !cursor.is_done() {
        let mut features = Vec::new();

        if !cursor.located_exhausted() {
            let page = source
                .located_page(request_id, cursor.offset(), cursor.batch_size())
                .await?;
            if page.is_empty() {
                cursor.mark_located_exhausted();
            }
            features.extend(page.iter().map(feature_for));
        }
        if !cursor.unlocated_exhausted() {
            let page = source
                .unlocated_page(request_id, cursor.offset(), cursor.batch_size())
                .await?;
            if page.is_empty() {
                cursor.mark_unlocated_exhausted();
            }
            features.extend(page.iter().map(feature_for));
        }

        if !features.is_empty() {
            let text = fragment(&features, features_written == 0);
            debug!(
                request_id = %request_id,
                offset = cursor.offset(),
                features = features.len(),
                "Export fragment written"
            );
            features_written += features.len() as u64;
            sink.write(Bytes::from(text)).await?;
        }
        cursor.advance();
    }

    sink.write(Bytes::from_static(EXPORT_CLOSE.as_bytes()))
        .await?;
    Ok(features_written)
}

/// Handler for `export` jobs: generates the document into the artifact
/// store through a streaming writer.
pub struct ExportHandler {
    source: Arc<dyn DataSource>,
    artifacts: Arc<dyn ArtifactStore>,
    batch_size: u64,
}

impl ExportHandler {
    pub fn new(source: Arc<dyn DataSource>, artifacts: Arc<dyn ArtifactStore>, batch_size: u64) -> Self {
        Self {
            source,
            artifacts,
            batch_size,
        }
    }
}

impl JobHandler for ExportHandler {
    fn queue(&self) -> &str {
        EXPORT_QUEUE
    }

    fn execute<'a>(
        &'a self,
        job: &'a Job,
    ) -> Pin<Box<dyn Future<Output = Result<Value, JobError>> + Send + 'a>> {
        Box::pin(async move {
            let params: ExportParams = serde_json::from_value(job.params.clone())
                .map_err(|e| JobError::permanent(format!("malformed export params: {}", e)))?;

            let path = format!("exports/{}.geojson", params.request_id);
            let writer = self.artifacts.writer(&path).await?;
            let mut sink = Box::new(ArtifactSink::new(writer));

            let features = generate_export(
                self.source.as_ref(),
                &params.request_id,
                self.batch_size,
                sink.as_mut(),
            )
            .await?;
            let stored = ExportSink::finish(sink).await?;

            // Post-upload verification, same contract as put_verified.
            verify_stored(self.artifacts.as_ref(), &stored).await?;

            info!(
                request_id = %params.request_id,
                features = features,
                size = stored.size,
                locator = %stored.locator,
                "Export generated"
            );
            Ok(json!({
                "request_id": params.request_id,
                "locator": stored.locator,
                "features": features,
            }))
        })
    }
}
