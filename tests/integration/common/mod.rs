//! Fake inference endpoint shared by the integration tests.
//!
//! Serves `POST /v1beta/models/{model}:generateContent` with scripted
//! replies and records every request it receives.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use sentinel_core::{ApiKey, CapturedImage, Config, GeminiClient};
use serde_json::{json, Value};

/// Key the fake endpoint expects in `x-goog-api-key`.
pub const TEST_API_KEY: &str = "integration-test-key";

/// Smallest byte sequence that sniffs as JPEG.
pub fn jpeg_bytes() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00]
}

/// A captured JPEG frame.
pub fn frame() -> CapturedImage {
    CapturedImage::from_bytes(jpeg_bytes()).expect("valid jpeg")
}

/// Wraps model output text the way `generateContent` returns it.
pub fn reply_with_text(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

/// A successful classification reply.
pub fn classification_reply(status: &str, confidence: f64, eye_openness: f64) -> String {
    reply_with_text(
        &json!({
            "status": status,
            "confidence": confidence,
            "eyeOpenness": eye_openness
        })
        .to_string(),
    )
}

/// A request as seen by the fake endpoint.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub call: String,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct FakeState {
    replies: Mutex<VecDeque<(StatusCode, String)>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

/// Handle to a running fake endpoint.
#[derive(Clone)]
pub struct FakeGemini {
    pub base_url: String,
    state: Arc<FakeState>,
}

impl FakeGemini {
    /// Starts a fake endpoint that answers with `replies` in order.
    ///
    /// Once the script is exhausted every request gets a 500.
    pub async fn start(replies: Vec<(StatusCode, String)>) -> Self {
        Self::start_with_delay(replies, None).await
    }

    /// Like [`FakeGemini::start`], holding every reply for `delay`.
    pub async fn start_with_delay(
        replies: Vec<(StatusCode, String)>,
        delay: Option<Duration>,
    ) -> Self {
        let state = Arc::new(FakeState {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            delay,
        });

        let router = Router::new()
            .route("/v1beta/models/:call", post(generate_content))
            .with_state(Arc::clone(&state));

        let addr = format!("127.0.0.1:{}", find_available_port());
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind fake endpoint");

        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Fake endpoint failed");
        });

        Self {
            base_url: format!("http://{addr}/v1beta"),
            state,
        }
    }

    /// Configuration pointing at this endpoint.
    pub fn config(&self) -> Config {
        Config {
            api_base_url: self.base_url.clone(),
            model: "vision-test".to_string(),
            ..Config::default()
        }
    }

    /// A client talking to this endpoint with [`TEST_API_KEY`].
    pub fn client(&self) -> GeminiClient {
        let key = ApiKey::new(TEST_API_KEY).expect("non-blank key");
        GeminiClient::new(&self.config(), key).expect("Failed to build client")
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().expect("lock").clone()
    }
}

async fn generate_content(
    State(state): State<Arc<FakeState>>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let api_key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.requests.lock().expect("lock").push(RecordedRequest {
        call,
        api_key,
        body,
    });

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    let reply = state.replies.lock().expect("lock").pop_front();
    reply.unwrap_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":{"message":"no scripted reply"}}"#.to_string(),
        )
    })
}

/// Finds an available port for testing.
pub fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}
