//! Integration tests for the dashboard backend.
//!
//! These tests run the real router on a local port, backed by the fake
//! inference endpoint, and drive it over HTTP and WebSocket.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::{classification_reply, find_available_port, jpeg_bytes, FakeGemini};
use futures::{SinkExt, StreamExt};
use sentinel_core::{
    create_router, AlertLevel, AppState, DrowsinessStatus, Monitor, SessionEvent, SessionPhase,
    SessionSnapshot,
};
use sentinel_dashboard::{Dashboard, TextRenderer};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Running dashboard backend.
struct TestServer {
    http_url: String,
    ws_url: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn post_capture(&self, image: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/capture", self.http_url))
            .json(&json!({ "image": image }))
            .send()
            .await
            .expect("capture request")
    }

    async fn status(&self) -> SessionSnapshot {
        self.client
            .get(format!("{}/api/status", self.http_url))
            .send()
            .await
            .expect("status request")
            .json()
            .await
            .expect("status body")
    }

    async fn clear(&self) -> Value {
        self.client
            .post(format!("{}/api/history/clear", self.http_url))
            .send()
            .await
            .expect("clear request")
            .json()
            .await
            .expect("clear body")
    }
}

/// Spawns the backend in front of the given fake endpoint.
async fn spawn_test_server(fake: &FakeGemini) -> TestServer {
    let monitor = Monitor::new(Arc::new(fake.client()));
    let router = create_router(AppState::new(monitor));

    let addr = format!("127.0.0.1:{}", find_available_port());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        http_url: format!("http://{addr}"),
        ws_url: format!("ws://{addr}/ws"),
        client: reqwest::Client::new(),
    }
}

fn jpeg_data_url() -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg_bytes()))
}

/// Connects a WebSocket client to the given URL.
async fn connect_client(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next event, answering pings along the way.
async fn receive_event(client: &mut WsClient) -> SessionEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

// ============================================================================
// HTTP API Tests
// ============================================================================

/// Tests a full capture cycle over HTTP and the resulting dashboard.
#[tokio::test]
async fn test_capture_cycle_over_http() {
    let fake = FakeGemini::start(vec![(
        StatusCode::OK,
        classification_reply("Drowsy", 77.0, 40.0),
    )])
    .await;
    let server = spawn_test_server(&fake).await;

    let initial = server.status().await;
    assert_eq!(initial.phase, SessionPhase::Idle);
    assert_eq!(initial.total_entries, 0);

    let response = server.post_capture(&jpeg_data_url()).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let snapshot: SessionSnapshot = response.json().await.expect("snapshot");
    assert_eq!(snapshot.phase, SessionPhase::Displaying);
    assert_eq!(snapshot.alert_level, Some(AlertLevel::Warning));
    assert_eq!(snapshot.recent_history.len(), 1);
    assert_eq!(snapshot.recent_history[0].status, DrowsinessStatus::Drowsy);

    let panel = TextRenderer::new(&Dashboard::from_snapshot(&snapshot)).render();
    assert!(panel.contains("DROWSY"));
    assert!(panel.contains("77%"));
    assert!(panel.contains("40%"));
    assert!(panel.contains("WARNING: DROWSINESS DETECTED"));

    assert_eq!(server.status().await, snapshot);
}

/// Tests that an inference failure is reported in the snapshot, not as an HTTP error.
#[tokio::test]
async fn test_inference_failure_is_displayed() {
    let fake = FakeGemini::start(vec![
        (StatusCode::OK, classification_reply("Alert", 99.0, 93.0)),
        (
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"API key expired"}}"#.to_string(),
        ),
    ])
    .await;
    let server = spawn_test_server(&fake).await;

    server.post_capture(&jpeg_data_url()).await;
    let response = server.post_capture(&jpeg_data_url()).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let snapshot: SessionSnapshot = response.json().await.expect("snapshot");
    assert_eq!(snapshot.phase, SessionPhase::Error);
    assert!(snapshot.alert_level.is_none());
    assert!(snapshot
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("API key expired")));
    assert_eq!(snapshot.total_entries, 1);

    let dashboard = Dashboard::from_snapshot(&snapshot);
    assert!(dashboard
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("SYSTEM ERROR: ")));
}

/// Tests that a payload that is not an image is rejected before inference.
#[tokio::test]
async fn test_invalid_image_rejected() {
    let fake = FakeGemini::start(Vec::new()).await;
    let server = spawn_test_server(&fake).await;

    let response = server
        .post_capture(&format!("data:image/png;base64,{}", BASE64.encode(b"GIF89a")))
        .await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.expect("error body");
    assert!(body["error"]
        .as_str()
        .is_some_and(|e| e.contains("unrecognized image format")));
    assert!(fake.requests().is_empty());
    assert_eq!(server.status().await.phase, SessionPhase::Idle);
}

/// Tests that a second capture while one is in flight gets 409.
#[tokio::test]
async fn test_concurrent_capture_conflict() {
    let fake = FakeGemini::start_with_delay(
        vec![(StatusCode::OK, classification_reply("Alert", 90.0, 85.0))],
        Some(Duration::from_millis(500)),
    )
    .await;
    let server = Arc::new(spawn_test_server(&fake).await);

    let first = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.post_capture(&jpeg_data_url()).await.status() })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(server.status().await.phase, SessionPhase::Analyzing);

    let second = server.post_capture(&jpeg_data_url()).await;
    assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);

    assert_eq!(first.await.expect("first capture"), reqwest::StatusCode::OK);
    assert_eq!(fake.requests().len(), 1);
    assert_eq!(server.status().await.total_entries, 1);
}

/// Tests that clearing history is idempotent and restarts numbering.
#[tokio::test]
async fn test_clear_history() {
    let fake = FakeGemini::start(vec![
        (StatusCode::OK, classification_reply("Alert", 90.0, 85.0)),
        (StatusCode::OK, classification_reply("Asleep", 92.0, 1.0)),
        (StatusCode::OK, classification_reply("Drowsy", 70.0, 35.0)),
    ])
    .await;
    let server = spawn_test_server(&fake).await;

    server.post_capture(&jpeg_data_url()).await;
    server.post_capture(&jpeg_data_url()).await;

    assert_eq!(server.clear().await["cleared"], 2);
    assert_eq!(server.clear().await["cleared"], 0);

    let snapshot = server.status().await;
    assert!(snapshot.recent_history.is_empty());
    assert_eq!(snapshot.total_entries, 0);

    let response = server.post_capture(&jpeg_data_url()).await;
    let snapshot: SessionSnapshot = response.json().await.expect("snapshot");
    assert_eq!(snapshot.recent_history[0].sequence, 1);
}

// ============================================================================
// WebSocket Tests
// ============================================================================

/// Tests that a client receives the current snapshot on connection.
#[tokio::test]
async fn test_client_receives_connected_event() {
    let fake = FakeGemini::start(Vec::new()).await;
    let server = spawn_test_server(&fake).await;

    let mut client = connect_client(&server.ws_url).await;
    match receive_event(&mut client).await {
        SessionEvent::Connected(payload) => {
            assert_eq!(payload.snapshot.phase, SessionPhase::Idle);
            assert!(payload.snapshot.recent_history.is_empty());
        }
        other => panic!("Expected Connected event, got: {other:?}"),
    }
}

/// Tests the event sequence for a successful capture followed by a clear.
#[tokio::test]
async fn test_capture_events_are_streamed() {
    let fake = FakeGemini::start(vec![(
        StatusCode::OK,
        classification_reply("Asleep", 94.0, 2.0),
    )])
    .await;
    let server = spawn_test_server(&fake).await;

    let mut client = connect_client(&server.ws_url).await;
    assert!(matches!(
        receive_event(&mut client).await,
        SessionEvent::Connected(_)
    ));

    server.post_capture(&jpeg_data_url()).await;

    assert!(matches!(
        receive_event(&mut client).await,
        SessionEvent::AnalysisStarted(_)
    ));
    match receive_event(&mut client).await {
        SessionEvent::AnalysisComplete(payload) => {
            assert_eq!(payload.result.status, DrowsinessStatus::Asleep);
            assert_eq!(payload.alert_level, AlertLevel::Critical);
            assert_eq!(payload.entry.sequence, 1);
        }
        other => panic!("Expected AnalysisComplete event, got: {other:?}"),
    }

    server.clear().await;
    match receive_event(&mut client).await {
        SessionEvent::HistoryCleared(payload) => assert_eq!(payload.cleared, 1),
        other => panic!("Expected HistoryCleared event, got: {other:?}"),
    }
}

/// Tests that every connected client sees a failed analysis.
#[tokio::test]
async fn test_failure_broadcast_to_all_clients() {
    let fake = FakeGemini::start(vec![(
        StatusCode::INTERNAL_SERVER_ERROR,
        "boom".to_string(),
    )])
    .await;
    let server = spawn_test_server(&fake).await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut client = connect_client(&server.ws_url).await;
        receive_event(&mut client).await;
        clients.push(client);
    }

    server.post_capture(&jpeg_data_url()).await;

    for client in &mut clients {
        assert!(matches!(
            receive_event(client).await,
            SessionEvent::AnalysisStarted(_)
        ));
        match receive_event(client).await {
            SessionEvent::AnalysisFailed(payload) => {
                assert!(payload.message.contains("server"));
            }
            other => panic!("Expected AnalysisFailed event, got: {other:?}"),
        }
    }
}
