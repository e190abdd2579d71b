//! Pipeline integration tests against the in-memory backends.
//!
//! These cover the contract between the ingestor's processing step, the
//! persister's dual write and the read API, up to real HTTP responses from
//! a server bound to a random port. The broker and the real stores sit
//! outside the seams exercised here.

use std::net::SocketAddr;
use std::sync::Arc;

use mesh_telemetry::api::{spawn_api_server, ApiState};
use mesh_telemetry::events::{HistoryPoint, SensorView};
use mesh_telemetry::ingest::{process_message, MetadataCache, MetadataService};
use mesh_telemetry::persist::Persister;
use mesh_telemetry::storage::{LastValueRepository, MemoryLastValue, MemoryTimeSeries, SensorRow};
use tokio_util::sync::CancellationToken;

struct TestPipeline {
    store: Arc<MemoryTimeSeries>,
    cache: Arc<MemoryLastValue>,
    metadata: Arc<MetadataCache>,
    persister: Persister,
}

fn kitchen_sensor() -> SensorRow {
    SensorRow {
        id: 5,
        topic: "/msh/kitchen/temp".to_string(),
        name: "Kitchen Temperature".to_string(),
        type_name: "temperature".to_string(),
        unit: "°C".to_string(),
    }
}

async fn build_pipeline() -> TestPipeline {
    let store = Arc::new(MemoryTimeSeries::new());
    store.seed_sensor(kitchen_sensor(), Some(-30.0), Some(80.0));

    let cache = Arc::new(MemoryLastValue::new());

    let metadata = Arc::new(MetadataCache::new());
    MetadataService::new(store.clone(), metadata.clone())
        .refresh()
        .await
        .unwrap();

    let persister = Persister::new(store.clone(), cache.clone());

    TestPipeline {
        store,
        cache,
        metadata,
        persister,
    }
}

/// Push one raw reading through processing and persistence, the way the
/// broker would connect the two services.
async fn ingest_raw(pipeline: &TestPipeline, topic: &str, payload: &[u8]) -> bool {
    match process_message(topic, payload, &pipeline.metadata) {
        Ok(event) => {
            let wire = serde_json::to_vec(&event).unwrap();
            pipeline.persister.handle_message(&wire).await;
            true
        }
        Err(_) => false,
    }
}

async fn spawn_test_api(pipeline: &TestPipeline, token: &CancellationToken) -> SocketAddr {
    let state = ApiState::new(pipeline.store.clone(), pipeline.cache.clone());
    spawn_api_server(0, state, token.clone()).await.unwrap()
}

#[tokio::test]
async fn happy_path_reaches_history_and_live_value() {
    let pipeline = build_pipeline().await;

    assert!(ingest_raw(&pipeline, "/msh/kitchen/temp", b"21.5").await);
    assert_eq!(pipeline.store.measurement_count(), 1);

    let token = CancellationToken::new();
    let addr = spawn_test_api(&pipeline, &token).await;
    let client = reqwest::Client::new();

    // catalog carries the live value
    let sensors: Vec<SensorView> = client
        .get(format!("http://{addr}/api/sensors"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0].id, 5);
    assert_eq!(sensors[0].current_value, Some(21.5));

    // and the history window has exactly that point
    let points: Vec<HistoryPoint> = client
        .get(format!("http://{addr}/api/sensors/5/history?range=1h"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].value, 21.5);

    token.cancel();
}

#[tokio::test]
async fn rejected_messages_write_nothing() {
    let pipeline = build_pipeline().await;

    // unknown topic
    assert!(!ingest_raw(&pipeline, "/msh/unregistered/foo", b"10.0").await);
    // out of range
    assert!(!ingest_raw(&pipeline, "/msh/kitchen/temp", b"150").await);
    // malformed
    assert!(!ingest_raw(&pipeline, "/msh/kitchen/temp", b"NaN-ish").await);

    assert_eq!(pipeline.store.measurement_count(), 0);
    assert_eq!(pipeline.cache.fetch_last(5).await.unwrap(), None);
}

#[tokio::test]
async fn sensor_added_after_startup_is_picked_up_by_refresh() {
    let pipeline = build_pipeline().await;

    // a row added directly in the store is invisible until a refresh
    pipeline.store.seed_sensor(
        SensorRow {
            id: 9,
            topic: "/msh/attic/humidity".to_string(),
            name: "Attic Humidity".to_string(),
            type_name: "humidity".to_string(),
            unit: "%".to_string(),
        },
        Some(0.0),
        Some(100.0),
    );
    assert!(!ingest_raw(&pipeline, "/msh/attic/humidity", b"55").await);

    MetadataService::new(pipeline.store.clone(), pipeline.metadata.clone())
        .refresh()
        .await
        .unwrap();

    assert!(ingest_raw(&pipeline, "/msh/attic/humidity", b"55").await);
    assert_eq!(pipeline.store.measurement_count(), 1);
}

#[tokio::test]
async fn missing_live_value_stays_null() {
    let pipeline = build_pipeline().await;

    assert!(ingest_raw(&pipeline, "/msh/kitchen/temp", b"0").await);
    // cache entry expires; history remains
    pipeline.cache.evict(5);

    let token = CancellationToken::new();
    let addr = spawn_test_api(&pipeline, &token).await;

    let sensors: Vec<SensorView> = reqwest::get(format!("http://{addr}/api/sensors"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // absent is distinct from zero
    assert_eq!(sensors[0].current_value, None);

    token.cancel();
}

#[tokio::test]
async fn cache_outage_degrades_to_null_values() {
    let pipeline = build_pipeline().await;
    assert!(ingest_raw(&pipeline, "/msh/kitchen/temp", b"21.5").await);

    pipeline.cache.set_failing(true);

    let token = CancellationToken::new();
    let addr = spawn_test_api(&pipeline, &token).await;

    let response = reqwest::get(format!("http://{addr}/api/sensors")).await.unwrap();
    assert_eq!(response.status(), 200);

    let sensors: Vec<SensorView> = response.json().await.unwrap();
    assert_eq!(sensors[0].current_value, None);

    token.cancel();
}

#[tokio::test]
async fn empty_history_window_is_an_empty_list() {
    let pipeline = build_pipeline().await;

    let token = CancellationToken::new();
    let addr = spawn_test_api(&pipeline, &token).await;

    let response = reqwest::get(format!("http://{addr}/api/sensors/5/history?range=1h"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let points: Vec<HistoryPoint> = response.json().await.unwrap();
    assert!(points.is_empty());

    token.cancel();
}

#[tokio::test]
async fn invalid_parameters_return_400() {
    let pipeline = build_pipeline().await;

    let token = CancellationToken::new();
    let addr = spawn_test_api(&pipeline, &token).await;

    // unknown range literal
    let response = reqwest::get(format!("http://{addr}/api/sensors/5/history?range=eternity"))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // non-integer id
    let response = reqwest::get(format!("http://{addr}/api/sensors/five/history"))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    token.cancel();
}

#[tokio::test]
async fn store_outage_returns_500_with_generic_message() {
    let pipeline = build_pipeline().await;
    pipeline.store.set_failing(true);

    let token = CancellationToken::new();
    let addr = spawn_test_api(&pipeline, &token).await;

    let response = reqwest::get(format!("http://{addr}/api/sensors")).await.unwrap();
    assert_eq!(response.status(), 500);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "internal server error");

    token.cancel();
}

#[tokio::test]
async fn health_and_cors_behave() {
    let pipeline = build_pipeline().await;

    let token = CancellationToken::new();
    let addr = spawn_test_api(&pipeline, &token).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    // preflight from a foreign origin
    let response = client
        .request(reqwest::Method::OPTIONS, format!("http://{addr}/api/sensors"))
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );

    token.cancel();
}
