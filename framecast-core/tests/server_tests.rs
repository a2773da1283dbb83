//! HTTP API tests against the router, no sockets involved

mod mocks;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use framecast_core::capture::SessionRegistry;
use framecast_core::config::PublisherOptions;
use framecast_core::server::{AppState, router};
use framecast_core::types::MULTIPART_CONTENT_TYPE;
use mocks::{MockBackend, PART_HEADER, RecordingEncoder};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tower::ServiceExt;

const TIMEOUT: Duration = Duration::from_secs(5);

fn state(backend: &MockBackend) -> AppState {
    let registry = Arc::new(SessionRegistry::new(Arc::new(backend.clone()), 4));
    AppState::new(
        registry,
        Arc::new(RecordingEncoder::new()),
        PublisherOptions::default(),
    )
}

async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    router(state.clone())
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap()
}

async fn json_of(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn overlay_body() -> Value {
    json!({
        "type": "text",
        "content": "LIVE",
        "x": 10,
        "y": 40,
        "width": 100,
        "height": 30,
        "fontSize": 24,
        "color": "#ff0000"
    })
}

#[tokio::test]
async fn test_health() {
    let state = state(&MockBackend::new());
    let response = send(&state, "GET", "/api/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "API is running");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_cors_preflight_allowed() {
    let state = state(&MockBackend::new());

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/overlays")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));

    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = router(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_start_requires_url() {
    let state = state(&MockBackend::new());

    let response = send(&state, "POST", "/api/stream/start", Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_of(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "RTSP URL is required");

    let response = send(&state, "POST", "/api/stream/start", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_unreachable() {
    let backend = MockBackend::new().unreachable("rtsp://cam/down");
    let state = state(&backend);

    let response = send(
        &state,
        "POST",
        "/api/stream/start",
        Some(json!({ "rtsp_url": "rtsp://cam/down" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_of(response).await;
    assert_eq!(body["error"], "Failed to open RTSP stream");
    assert!(!state.default_session().is_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_then_video_feed() {
    let backend = MockBackend::new();
    let state = state(&backend);

    let response = send(
        &state,
        "POST",
        "/api/stream/start",
        Some(json!({ "rtsp_url": "rtsp://cam/a" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Stream started successfully");
    assert_eq!(body["stream_url"], "/api/stream/video");

    let response = send(&state, "GET", "/api/stream/status", None).await;
    let body = json_of(response).await;
    assert_eq!(body["data"]["active"], true);
    assert_eq!(body["data"]["state"], "running");
    assert_eq!(body["data"]["source"], "rtsp://cam/a");

    let response = send(&state, "GET", "/api/stream/video", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        MULTIPART_CONTENT_TYPE
    );

    let mut stream = response.into_body().into_data_stream();
    let first = tokio::time::timeout(TIMEOUT, stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(first.starts_with(PART_HEADER));

    let response = send(&state, "POST", "/api/stream/stop", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["message"], "Stream stopped successfully");

    state.registry.shutdown();
    assert_eq!(backend.open_handles(), 0);
}

#[tokio::test]
async fn test_video_feed_when_inactive_is_empty() {
    let state = state(&MockBackend::new());

    let response = send(&state, "GET", "/api/stream/video", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = tokio::time::timeout(TIMEOUT, to_bytes(response.into_body(), usize::MAX))
        .await
        .unwrap()
        .unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_stop_when_inactive_succeeds() {
    let state = state(&MockBackend::new());

    let response = send(&state, "POST", "/api/stream/stop", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_overlay_crud() {
    let state = state(&MockBackend::new());

    let response = send(&state, "POST", "/api/overlays", Some(overlay_body())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_of(response).await;
    assert_eq!(body["message"], "Overlay created successfully");
    let id = body["data"]["_id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["fontSize"], 24);

    let response = send(&state, "GET", "/api/overlays", None).await;
    let body = json_of(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["_id"], id.as_str());

    let mut changed = overlay_body();
    changed["content"] = json!("REC");
    changed.as_object_mut().unwrap().remove("color");
    changed.as_object_mut().unwrap().remove("fontSize");
    let response = send(&state, "PUT", &format!("/api/overlays/{}", id), Some(changed)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["message"], "Overlay updated successfully");
    assert_eq!(body["data"]["content"], "REC");
    assert_eq!(body["data"]["color"], "#ff0000");
    assert_eq!(body["data"]["fontSize"], 24);

    let response = send(&state, "GET", &format!("/api/overlays/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await["data"]["content"], "REC");

    let response = send(&state, "DELETE", &format!("/api/overlays/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await["message"], "Overlay deleted successfully");

    let response = send(&state, "GET", &format!("/api/overlays/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_of(response).await["error"], "Overlay not found");
}

#[tokio::test]
async fn test_overlay_validation() {
    let state = state(&MockBackend::new());

    let mut missing = overlay_body();
    missing.as_object_mut().unwrap().remove("width");
    let response = send(&state, "POST", "/api/overlays", Some(missing)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_of(response).await["error"],
        "Missing required field: width"
    );

    let mut bad_type = overlay_body();
    bad_type["type"] = json!("video");
    let response = send(&state, "POST", "/api/overlays", Some(bad_type)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_of(response).await["error"],
        "Type must be 'text' or 'logo'"
    );

    assert!(state.overlays.is_empty());
}

#[tokio::test]
async fn test_overlay_malformed_id_is_not_found() {
    let state = state(&MockBackend::new());

    for method in ["GET", "DELETE"] {
        let response = send(&state, method, "/api/overlays/not-an-id", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let response = send(&state, "PUT", "/api/overlays/not-an-id", Some(overlay_body())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_settings_defaults_and_update() {
    let state = state(&MockBackend::new());

    let response = send(&state, "GET", "/api/settings", None).await;
    let body = json_of(response).await;
    assert_eq!(body["data"]["rtsp_url"], "");
    assert_eq!(body["data"]["default_quality"], "high");
    assert_eq!(body["data"]["auto_reconnect"], true);

    let response = send(
        &state,
        "POST",
        "/api/settings",
        Some(json!({ "rtsp_url": "rtsp://cam/a", "auto_reconnect": false })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["message"], "Settings updated successfully");
    assert!(body["data"]["updated_at"].is_string());

    let response = send(&state, "GET", "/api/settings", None).await;
    let body = json_of(response).await;
    assert_eq!(body["data"]["rtsp_url"], "rtsp://cam/a");
    assert_eq!(body["data"]["auto_reconnect"], false);
    assert_eq!(body["data"]["default_quality"], "high");
}

#[tokio::test]
async fn test_overlays_feed_the_publisher() {
    use framecast_core::overlay::OverlayProvider;

    let state = state(&MockBackend::new());
    send(&state, "POST", "/api/overlays", Some(overlay_body())).await;

    let snapshot = state.overlays.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].content, "LIVE");
    assert_eq!(snapshot[0].rgb(), Ok([255, 0, 0]));
}
