//! In-memory upstream implementations.

use super::{
    DataRecord, DataSource, GenerationStatus, ReportRequest, RequestStore, SourceError,
};
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// In-memory [`DataSource`] holding records per request id.
#[derive(Clone, Default)]
pub struct MemoryDataSource {
    records: Arc<DashMap<String, Vec<DataRecord>>>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers records for a request, sorted into the stable order every
    /// page read observes.
    pub fn insert_records(&self, request_id: impl Into<String>, mut records: Vec<DataRecord>) {
        records.sort_by(|a, b| a.id.cmp(&b.id));
        self.records.insert(request_id.into(), records);
    }

    fn page(
        &self,
        request_id: &str,
        offset: u64,
        limit: u64,
        filter: impl Fn(&DataRecord) -> bool,
    ) -> Result<Vec<DataRecord>, SourceError> {
        let records = self
            .records
            .get(request_id)
            .ok_or_else(|| SourceError::RequestNotFound(request_id.to_string()))?;
        Ok(records
            .iter()
            .filter(|r| filter(r))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl DataSource for MemoryDataSource {
    fn count_records<'a>(
        &'a self,
        request_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.records
                .get(request_id)
                .map(|r| r.len() as u64)
                .ok_or_else(|| SourceError::RequestNotFound(request_id.to_string()))
        })
    }

    fn record_page<'a>(
        &'a self,
        request_id: &'a str,
        offset: u64,
        limit: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DataRecord>, SourceError>> + Send + 'a>> {
        Box::pin(async move { self.page(request_id, offset, limit, |_| true) })
    }

    fn located_page<'a>(
        &'a self,
        request_id: &'a str,
        offset: u64,
        limit: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DataRecord>, SourceError>> + Send + 'a>> {
        Box::pin(async move { self.page(request_id, offset, limit, DataRecord::is_located) })
    }

    fn unlocated_page<'a>(
        &'a self,
        request_id: &'a str,
        offset: u64,
        limit: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DataRecord>, SourceError>> + Send + 'a>> {
        Box::pin(async move { self.page(request_id, offset, limit, |r| !r.is_located()) })
    }
}

/// In-memory [`RequestStore`].
#[derive(Clone, Default)]
pub struct MemoryRequestStore {
    requests: Arc<DashMap<String, ReportRequest>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request: ReportRequest) {
        self.requests.insert(request.id.clone(), request);
    }

    fn update(
        &self,
        request_id: &str,
        apply: impl FnOnce(&mut ReportRequest),
    ) -> Result<(), SourceError> {
        let mut entry = self
            .requests
            .get_mut(request_id)
            .ok_or_else(|| SourceError::RequestNotFound(request_id.to_string()))?;
        apply(&mut entry);
        Ok(())
    }
}

impl RequestStore for MemoryRequestStore {
    fn load<'a>(
        &'a self,
        request_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ReportRequest>, SourceError>> + Send + 'a>>
    {
        Box::pin(async move { Ok(self.requests.get(request_id).map(|r| r.clone())) })
    }

    fn set_document_status<'a>(
        &'a self,
        request_id: &'a str,
        status: GenerationStatus,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>> {
        Box::pin(async move { self.update(request_id, |r| r.document_status = status) })
    }

    fn set_export_status<'a>(
        &'a self,
        request_id: &'a str,
        status: GenerationStatus,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>> {
        Box::pin(async move { self.update(request_id, |r| r.export_status = status) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;
    use serde_json::json;

    fn record(id: &str, located: bool) -> DataRecord {
        DataRecord {
            id: id.to_string(),
            name: format!("Site {}", id),
            attributes: json!({"kind": "well"}),
            location: located.then_some(Location {
                lon: -120.5,
                lat: 47.1,
            }),
        }
    }

    #[tokio::test]
    async fn test_count_and_pages() {
        let source = MemoryDataSource::new();
        source.insert_records(
            "r1",
            vec![
                record("a", true),
                record("b", false),
                record("c", true),
                record("d", false),
            ],
        );

        assert_eq!(source.count_records("r1").await.unwrap(), 4);

        let located = source.located_page("r1", 0, 10).await.unwrap();
        assert_eq!(
            located.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "c"]
        );

        let unlocated = source.unlocated_page("r1", 1, 10).await.unwrap();
        assert_eq!(unlocated.len(), 1);
        assert_eq!(unlocated[0].id, "d");
    }

    #[tokio::test]
    async fn test_record_page_is_ordered_and_bounded() {
        let source = MemoryDataSource::new();
        source.insert_records("r1", vec![record("c", true), record("a", true), record("b", true)]);

        let page = source.record_page("r1", 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "b");
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let source = MemoryDataSource::new();
        let err = source.count_records("nope").await.unwrap_err();
        assert!(matches!(err, SourceError::RequestNotFound(_)));
    }

    #[tokio::test]
    async fn test_status_updates() {
        let store = MemoryRequestStore::new();
        store.insert(ReportRequest {
            id: "r1".to_string(),
            title: "Quarterly Wells".to_string(),
            snapshot: chrono::Utc::now(),
            document_status: GenerationStatus::NotGenerated,
            export_status: GenerationStatus::NotGenerated,
        });

        store
            .set_document_status("r1", GenerationStatus::Generating)
            .await
            .unwrap();
        let request = store.load("r1").await.unwrap().unwrap();
        assert_eq!(request.document_status, GenerationStatus::Generating);
        assert_eq!(request.export_status, GenerationStatus::NotGenerated);

        assert!(store
            .set_export_status("missing", GenerationStatus::Failed)
            .await
            .is_err());
    }
}
