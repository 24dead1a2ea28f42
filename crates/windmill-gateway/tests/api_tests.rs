//! HTTP API tests.

use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{header, HeaderName, HeaderValue, Request, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use windmill_core::stream::{channel, Popped};
use windmill_core::ReadingStore;
use windmill_gateway::{create_router, AppState, GatewayConfig};

const API_KEY: &str = "test-key";

fn test_state(config: GatewayConfig) -> AppState {
    let store = ReadingStore::temporary().unwrap();
    AppState::new(
        store,
        GatewayConfig {
            api_key: API_KEY.to_string(),
            ..config
        },
    )
}

fn test_server(state: AppState) -> TestServer {
    TestServer::new(create_router(state)).unwrap()
}

fn api_key(value: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_static(value),
    )
}

async fn ingest(server: &TestServer, body: Value) -> Value {
    let (name, value) = api_key(API_KEY);
    let response = server
        .post("/api/v1/ingest")
        .add_header(name, value)
        .json(&body)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()
}

#[tokio::test]
async fn test_health() {
    let server = test_server(test_state(GatewayConfig::default()));

    let response = server.get("/api/v1/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["readings"], 0);
    assert_eq!(body["subscribers"]["channels"], 0);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_ingest_requires_api_key() {
    let server = test_server(test_state(GatewayConfig::default()));
    let body = json!({"device_id": "turbine-1", "ts": 1_714_564_800_000i64});

    let missing = server.post("/api/v1/ingest").json(&body).await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(missing.json::<Value>()["message"], "Invalid or missing API key");

    let (name, value) = api_key("wrong-key");
    let wrong = server
        .post("/api/v1/ingest")
        .add_header(name, value)
        .json(&body)
        .await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ingest_missing_fields() {
    let server = test_server(test_state(GatewayConfig::default()));

    for (body, field) in [
        (json!({"ts": 1_000}), "device_id"),
        (json!({"device_id": "turbine-1"}), "ts"),
    ] {
        let (name, value) = api_key(API_KEY);
        let response = server
            .post("/api/v1/ingest")
            .add_header(name, value)
            .json(&body)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let error = response.json::<Value>();
        assert_eq!(error["error"], true);
        assert_eq!(error["message"], format!("Missing required field: {}", field));
    }
}

#[tokio::test]
async fn test_ingest_then_latest() {
    let server = test_server(test_state(GatewayConfig::default()));
    let ts = Utc::now().timestamp_millis();

    let created = ingest(
        &server,
        json!({
            "device_id": "turbine-1",
            "ts": ts,
            "voltage_v": 12.0,
            "current_a": 1.5,
            "rpm": 3400
        }),
    )
    .await;
    assert_eq!(created["status"], "success");
    assert_eq!(created["device_id"], "turbine-1");

    let latest = server
        .get("/api/v1/latest")
        .add_query_param("device_id", "turbine-1")
        .await;
    assert_eq!(latest.status_code(), StatusCode::OK);

    let body = latest.json::<Value>();
    assert_eq!(body["offline"], false);
    assert_eq!(body["data"]["power_w"], 18.0);
    assert_eq!(body["data"]["rpm"], 3400);
    assert!(body["data"]["temp_c"].is_null());

    let unknown = server
        .get("/api/v1/latest")
        .add_query_param("device_id", "turbine-9")
        .await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ingest_reaches_live_subscriber() {
    let state = test_state(GatewayConfig::default());
    let registry = state.registry.clone();
    let server = test_server(state);

    let (tx, mut rx) = channel(registry.next_channel_id(), 10);
    registry.register("turbine-1", tx);

    ingest(
        &server,
        json!({"device_id": "turbine-1", "ts": 1_714_564_800_000i64, "voltage_v": 12.5}),
    )
    .await;
    ingest(
        &server,
        json!({"device_id": "turbine-2", "ts": 1_714_564_800_000i64, "voltage_v": 9.0}),
    )
    .await;

    match rx.pop(Duration::from_secs(1)).await {
        Popped::Event(event) => {
            assert_eq!(event.device_id(), "turbine-1");
            assert_eq!(event.observed_millis(), 1_714_564_800_000);
        }
        other => panic!("expected the ingested reading, got {:?}", other),
    }
    assert_eq!(rx.pop(Duration::from_millis(50)).await, Popped::Timeout);
}

#[tokio::test]
async fn test_history_filters() {
    let server = test_server(test_state(GatewayConfig::default()));
    for i in 0..5i64 {
        ingest(
            &server,
            json!({
                "device_id": "turbine-1",
                "ts": 1_000 * (i + 1),
                "voltage_v": 10.0 + i as f64,
                "current_a": 1.0
            }),
        )
        .await;
    }

    let all = server
        .get("/api/v1/history")
        .add_query_param("device_id", "turbine-1")
        .await
        .json::<Value>();
    assert_eq!(all["count"], 5);
    assert_eq!(all["history"][0]["ts"], 1_000);
    assert_eq!(all["history"][4]["power_w"], 14.0);

    let window = server
        .get("/api/v1/history")
        .add_query_param("device_id", "turbine-1")
        .add_query_param("from", 2_000)
        .add_query_param("to", 4_000)
        .add_query_param("limit", 2)
        .await
        .json::<Value>();
    assert_eq!(window["count"], 2);
    assert_eq!(window["history"][0]["ts"], 3_000);
    assert_eq!(window["history"][1]["ts"], 4_000);

    let single = server
        .get("/api/v1/history")
        .add_query_param("device_id", "turbine-1")
        .add_query_param("metric", "voltage_v")
        .await
        .json::<Value>();
    let first = single["history"][0].as_object().unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first["voltage_v"], 10.0);

    let missing = server.get("/api/v1/history").await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_devices_offline_flag() {
    let server = test_server(test_state(GatewayConfig::default()));
    let now = Utc::now().timestamp_millis();

    ingest(&server, json!({"device_id": "turbine-1", "ts": now})).await;
    ingest(
        &server,
        json!({"device_id": "turbine-2", "ts": now - 10 * 60 * 1_000}),
    )
    .await;

    let body = server.get("/api/v1/devices").await.json::<Value>();
    let devices = body["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0]["device_id"], "turbine-1");
    assert_eq!(devices[0]["offline"], false);
    assert_eq!(devices[1]["device_id"], "turbine-2");
    assert_eq!(devices[1]["offline"], true);
}

#[tokio::test]
async fn test_stream_requires_device_id() {
    let server = test_server(test_state(GatewayConfig::default()));

    let response = server.get("/api/v1/stream").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "device_id parameter required"
    );
}

/// Next SSE `data:` payload from a streaming body, parsed as JSON.
async fn next_data(body: &mut BodyDataStream) -> Value {
    let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("no frame before timeout")
        .expect("stream ended")
        .unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    let data = text
        .trim_end()
        .strip_prefix("data: ")
        .unwrap_or_else(|| panic!("not a data frame: {:?}", text));
    serde_json::from_str(data).unwrap()
}

#[tokio::test]
async fn test_stream_delivers_connected_then_ingested_reading() {
    let router = create_router(test_state(GatewayConfig::default()));

    let response = router
        .clone()
        .oneshot(
            Request::get("/api/v1/stream?device_id=turbine-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()["x-accel-buffering"], "no");

    let mut body = response.into_body().into_data_stream();
    let connected = next_data(&mut body).await;
    assert_eq!(connected, json!({"type": "connected", "device_id": "turbine-1"}));

    let ingested = router
        .oneshot(
            Request::post("/api/v1/ingest")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-api-key", API_KEY)
                .body(Body::from(
                    json!({
                        "device_id": "turbine-1",
                        "ts": 1_714_564_800_000i64,
                        "voltage_v": 12.1,
                        "current_a": 2.0
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ingested.status(), StatusCode::CREATED);

    let event = next_data(&mut body).await;
    assert_eq!(event["device_id"], "turbine-1");
    assert_eq!(event["timestamp"], "2024-05-01T12:00:00Z");
    assert_eq!(event["voltage_v"], 12.1);
    assert_eq!(event["power_w"], 24.2);
    assert!(event["rpm"].is_null());
    assert!(event.get("type").is_none());
}

#[tokio::test]
async fn test_dev_simulate_rejects_oversized_count() {
    let server = test_server(test_state(GatewayConfig::default()));

    let response = server
        .post("/api/v1/dev/simulate")
        .json(&json!({"count": 1usize << 44}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let health = server.get("/api/v1/health").await.json::<Value>();
    assert_eq!(health["readings"], 0);
}

#[tokio::test]
async fn test_dev_simulate_and_clear() {
    let server = test_server(test_state(GatewayConfig::default()));

    let simulated = server
        .post("/api/v1/dev/simulate")
        .json(&json!({"count": 5, "device_id": "esp32-002"}))
        .await;
    assert_eq!(simulated.status_code(), StatusCode::CREATED);
    assert_eq!(simulated.json::<Value>()["count"], 5);

    let defaults = server.post("/api/v1/dev/simulate").await;
    assert_eq!(defaults.status_code(), StatusCode::CREATED);
    assert_eq!(defaults.json::<Value>()["device_id"], "esp32-001");

    let history = server
        .get("/api/v1/history")
        .add_query_param("device_id", "esp32-002")
        .await
        .json::<Value>();
    assert_eq!(history["count"], 5);

    let cleared = server.post("/api/v1/dev/clear").await;
    assert_eq!(cleared.status_code(), StatusCode::OK);
    assert_eq!(cleared.json::<Value>()["deleted"], 25);

    let devices = server.get("/api/v1/devices").await.json::<Value>();
    assert!(devices["devices"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_dev_routes_can_be_disabled() {
    let config = GatewayConfig {
        dev_routes: false,
        ..GatewayConfig::default()
    };
    let server = test_server(test_state(config));

    let response = server.post("/api/v1/dev/clear").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
