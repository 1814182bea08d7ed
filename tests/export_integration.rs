//! End-to-end export generation through the service facade.

mod common;

use common::{FakeRenderer, VerificationFailingStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use terradoc::artifact::{ArtifactStore, MemoryArtifactStore};
use terradoc::source::{
    DataRecord, GenerationStatus, Location, MemoryDataSource, MemoryRequestStore, ReportRequest,
    RequestStore,
};
use terradoc::{Config, TerradocService};
use tokio_util::sync::CancellationToken;

fn record(id: &str, located: bool) -> DataRecord {
    DataRecord {
        id: id.to_string(),
        name: format!("Site {}", id),
        attributes: json!({"kind": "spring"}),
        location: located.then_some(Location { lon: 8.54, lat: 47.37 }),
    }
}

fn seeded_request(requests: &MemoryRequestStore, id: &str) {
    requests.insert(ReportRequest {
        id: id.to_string(),
        title: "Springs".to_string(),
        snapshot: chrono::Utc::now(),
        document_status: GenerationStatus::NotGenerated,
        export_status: GenerationStatus::NotGenerated,
    });
}

struct Fixture {
    service: Arc<TerradocService>,
    requests: MemoryRequestStore,
    artifacts: Arc<MemoryArtifactStore>,
    shutdown: CancellationToken,
}

impl Fixture {
    async fn start(source: MemoryDataSource, export_batch_size: u64) -> Self {
        let requests = MemoryRequestStore::new();
        seeded_request(&requests, "r1");
        let artifacts = Arc::new(MemoryArtifactStore::new());

        let service = Arc::new(TerradocService::new(
            Config::new().with_export_batch_size(export_batch_size),
            Arc::new(source),
            Arc::new(requests.clone()),
            Arc::new(FakeRenderer::new(1)),
            artifacts.clone(),
        ));
        let shutdown = CancellationToken::new();
        {
            let service = Arc::clone(&service);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { service.run(shutdown).await });
        }

        Self {
            service,
            requests,
            artifacts,
            shutdown,
        }
    }

    async fn wait_export_terminal(&self) -> GenerationStatus {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let request = self.requests.load("r1").await.unwrap().unwrap();
                match request.export_status {
                    GenerationStatus::Ready { .. } | GenerationStatus::Failed => {
                        return request.export_status
                    }
                    _ => tokio::time::sleep(Duration::from_millis(20)).await,
                }
            }
        })
        .await
        .expect("export settles within deadline")
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[tokio::test]
async fn export_streams_all_records_as_geojson() {
    let source = MemoryDataSource::new();
    source.insert_records(
        "r1",
        vec![
            record("a", true),
            record("b", false),
            record("c", true),
            record("d", true),
            record("e", false),
        ],
    );
    let fixture = Fixture::start(source, 2).await;

    let accepted = fixture.service.generate_export("r1").await.unwrap();
    assert!(accepted.accepted);

    let status = fixture.wait_export_terminal().await;
    let GenerationStatus::Ready { locator } = status else {
        panic!("expected Ready, got {:?}", status);
    };
    assert_eq!(locator, "exports/r1.geojson");

    let data = fixture.artifacts.get(&locator).await.unwrap();
    let document: Value = serde_json::from_slice(&data).unwrap();
    assert_eq!(document["type"], "FeatureCollection");

    let features = document["features"].as_array().unwrap();
    assert_eq!(features.len(), 5);
    let located = features
        .iter()
        .filter(|f| !f["geometry"].is_null())
        .count();
    assert_eq!(located, 3);
    for feature in features {
        assert_eq!(feature["type"], "Feature");
        assert_eq!(feature["properties"]["kind"], "spring");
    }
}

#[tokio::test]
async fn export_of_empty_request_is_bare_framing() {
    let source = MemoryDataSource::new();
    source.insert_records("r1", vec![]);
    let fixture = Fixture::start(source, 10).await;

    fixture.service.generate_export("r1").await.unwrap();
    let status = fixture.wait_export_terminal().await;
    let GenerationStatus::Ready { locator } = status else {
        panic!("expected Ready, got {:?}", status);
    };

    let data = fixture.artifacts.get(&locator).await.unwrap();
    assert_eq!(
        &data[..],
        b"{\"type\":\"FeatureCollection\",\"features\":[]}"
    );
}

#[tokio::test]
async fn repeated_export_request_is_rejected_while_in_flight() {
    let source = MemoryDataSource::new();
    source.insert_records("r1", (0..500).map(|i| record(&format!("rec-{:03}", i), true)).collect());
    let fixture = Fixture::start(source, 50).await;

    let first = fixture.service.generate_export("r1").await.unwrap();
    assert!(first.accepted);
    // Immediately after acceptance the status is Generating.
    let second = fixture.service.generate_export("r1").await.unwrap();
    assert!(!second.accepted);

    assert!(matches!(
        fixture.wait_export_terminal().await,
        GenerationStatus::Ready { .. }
    ));
}

#[tokio::test]
async fn export_verification_failure_exhausts_retries_and_fails_request() {
    let source = MemoryDataSource::new();
    source.insert_records("r1", vec![record("a", true)]);
    let requests = MemoryRequestStore::new();
    seeded_request(&requests, "r1");

    // stat() lies about the export document, so upload verification
    // fails on every attempt and the request must never go Ready with
    // a locator nothing can stat.
    let artifacts = Arc::new(VerificationFailingStore::new("r1.geojson"));

    let service = Arc::new(TerradocService::new(
        Config::new().with_max_attempts(2),
        Arc::new(source),
        Arc::new(requests.clone()),
        Arc::new(FakeRenderer::new(1)),
        artifacts.clone(),
    ));
    let shutdown = CancellationToken::new();
    let service_task = {
        let service = Arc::clone(&service);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { service.run(shutdown).await })
    };

    service.generate_export("r1").await.unwrap();

    let status = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let request = requests.load("r1").await.unwrap().unwrap();
            match request.export_status {
                GenerationStatus::Ready { .. } | GenerationStatus::Failed => {
                    return request.export_status
                }
                _ => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
    })
    .await
    .expect("export settles within deadline");
    assert_eq!(status, GenerationStatus::Failed);
    assert!(artifacts
        .stat("exports/r1.geojson")
        .await
        .unwrap()
        .is_none());

    shutdown.cancel();
    let _ = service_task.await;
}

#[tokio::test]
async fn export_of_unknown_request_fails_fast() {
    let fixture = Fixture::start(MemoryDataSource::new(), 10).await;
    let err = fixture.service.generate_export("ghost").await.unwrap_err();
    assert!(err.to_string().contains("ghost"));
}
