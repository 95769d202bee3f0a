//! Integration tests for the inference client against a fake endpoint.
//!
//! These tests validate the request the client sends over the wire and how
//! HTTP failures and malformed replies surface as inference errors.

mod common;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::{
    classification_reply, frame, jpeg_bytes, reply_with_text, FakeGemini, TEST_API_KEY,
};
use sentinel_core::{
    AlertLevel, DrowsinessStatus, InferenceClient, InferenceErrorKind, Monitor, SentinelError,
    SessionPhase, PROMPT,
};
use std::sync::Arc;

fn inference_kind(err: &SentinelError) -> InferenceErrorKind {
    match err {
        SentinelError::InferenceFailed { kind, .. } => *kind,
        other => panic!("Expected InferenceFailed, got: {other:?}"),
    }
}

// ============================================================================
// Request Shape
// ============================================================================

/// Tests that the request carries the key header, the image and the schema.
#[tokio::test]
async fn test_request_wire_format() {
    let fake = FakeGemini::start(vec![(
        StatusCode::OK,
        classification_reply("Alert", 97.0, 91.0),
    )])
    .await;

    fake.client().classify(&frame()).await.expect("classify");

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);

    let request = &requests[0];
    assert_eq!(request.call, "vision-test:generateContent");
    assert_eq!(request.api_key.as_deref(), Some(TEST_API_KEY));

    let parts = &request.body["contents"][0]["parts"];
    assert_eq!(parts.as_array().map(Vec::len), Some(2));
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(parts[0]["inlineData"]["data"], BASE64.encode(jpeg_bytes()));
    assert_eq!(parts[1]["text"], PROMPT);

    let config = &request.body["generationConfig"];
    assert_eq!(config["responseMimeType"], "application/json");
    assert_eq!(
        config["responseSchema"]["properties"]["status"]["enum"],
        serde_json::json!(["Alert", "Drowsy", "Asleep"])
    );
    assert_eq!(
        config["responseSchema"]["required"],
        serde_json::json!(["status", "confidence", "eyeOpenness"])
    );
}

// ============================================================================
// Successful Replies
// ============================================================================

/// Tests the drowsy reply end to end through the client.
#[tokio::test]
async fn test_drowsy_reply_is_parsed() {
    let fake = FakeGemini::start(vec![(
        StatusCode::OK,
        classification_reply("Drowsy", 77.0, 40.0),
    )])
    .await;

    let result = fake.client().classify(&frame()).await.expect("classify");

    assert_eq!(result.status, DrowsinessStatus::Drowsy);
    assert!((result.confidence - 77.0).abs() < f64::EPSILON);
    assert!((result.eye_openness - 40.0).abs() < f64::EPSILON);
    assert_eq!(result.alert_level(), AlertLevel::Warning);
}

/// Tests that a reply missing `confidence` gets 0 rather than failing.
#[tokio::test]
async fn test_missing_confidence_defaults_to_zero() {
    let fake = FakeGemini::start(vec![(
        StatusCode::OK,
        reply_with_text(r#"{"status":"Asleep","eyeOpenness":3}"#),
    )])
    .await;

    let result = fake.client().classify(&frame()).await.expect("classify");

    assert_eq!(result.status, DrowsinessStatus::Asleep);
    assert!(result.confidence.abs() < f64::EPSILON);
    assert_eq!(result.alert_level(), AlertLevel::Critical);
}

/// Tests that a status outside the schema becomes Unknown.
#[tokio::test]
async fn test_out_of_enum_status_is_unknown() {
    let fake = FakeGemini::start(vec![(
        StatusCode::OK,
        reply_with_text(r#"{"status":"Yawning","confidence":50,"eyeOpenness":60}"#),
    )])
    .await;

    let result = fake.client().classify(&frame()).await.expect("classify");

    assert_eq!(result.status, DrowsinessStatus::Unknown);
    assert_eq!(result.alert_level(), AlertLevel::Nominal);
}

// ============================================================================
// Failures
// ============================================================================

/// Tests that a 429 is reported as a rate limit failure.
#[tokio::test]
async fn test_quota_exceeded() {
    let fake = FakeGemini::start(vec![(
        StatusCode::TOO_MANY_REQUESTS,
        r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#
            .to_string(),
    )])
    .await;

    let err = fake.client().classify(&frame()).await.unwrap_err();

    assert_eq!(inference_kind(&err), InferenceErrorKind::RateLimit);
    assert!(err.to_string().contains("Resource has been exhausted"));
    assert!(err.is_recoverable());
}

/// Tests that a 403 is reported as an authentication failure.
#[tokio::test]
async fn test_rejected_key() {
    let fake = FakeGemini::start(vec![(
        StatusCode::FORBIDDEN,
        r#"{"error":{"code":403,"message":"API key not valid"}}"#.to_string(),
    )])
    .await;

    let err = fake.client().classify(&frame()).await.unwrap_err();
    assert_eq!(inference_kind(&err), InferenceErrorKind::Authentication);
}

/// Tests that a 503 is reported as a server failure.
#[tokio::test]
async fn test_server_unavailable() {
    let fake = FakeGemini::start(vec![(
        StatusCode::SERVICE_UNAVAILABLE,
        "upstream overloaded".to_string(),
    )])
    .await;

    let err = fake.client().classify(&frame()).await.unwrap_err();
    assert_eq!(inference_kind(&err), InferenceErrorKind::Server);
}

/// Tests that non-JSON model output is a malformed reply.
#[tokio::test]
async fn test_garbage_reply() {
    let fake = FakeGemini::start(vec![(
        StatusCode::OK,
        reply_with_text("The operator looks tired."),
    )])
    .await;

    let err = fake.client().classify(&frame()).await.unwrap_err();
    assert_eq!(inference_kind(&err), InferenceErrorKind::MalformedReply);
}

/// Tests that a reply with no candidates is a malformed reply.
#[tokio::test]
async fn test_empty_candidates() {
    let fake = FakeGemini::start(vec![(StatusCode::OK, r#"{"candidates":[]}"#.to_string())]).await;

    let err = fake.client().classify(&frame()).await.unwrap_err();
    assert_eq!(inference_kind(&err), InferenceErrorKind::MalformedReply);
}

// ============================================================================
// Session Behavior
// ============================================================================

/// Tests that a failure between two successes leaves history untouched.
#[tokio::test]
async fn test_monitor_recovers_after_failure() {
    let fake = FakeGemini::start(vec![
        (StatusCode::OK, classification_reply("Alert", 95.0, 88.0)),
        (
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"quota"}}"#.to_string(),
        ),
        (StatusCode::OK, classification_reply("Drowsy", 77.0, 40.0)),
    ])
    .await;
    let monitor = Monitor::new(Arc::new(fake.client()));

    let first = monitor.process_capture(frame()).await.expect("first");
    assert_eq!(first.phase, SessionPhase::Displaying);
    assert_eq!(first.total_entries, 1);

    let second = monitor.process_capture(frame()).await.expect("second");
    assert_eq!(second.phase, SessionPhase::Error);
    assert!(second.last_result.is_none());
    assert!(second
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("rate_limit")));
    assert_eq!(second.total_entries, 1);

    let third = monitor.process_capture(frame()).await.expect("third");
    assert_eq!(third.phase, SessionPhase::Displaying);
    assert!(third.last_error.is_none());
    assert_eq!(third.alert_level, Some(AlertLevel::Warning));

    let sequences: Vec<u32> = third.recent_history.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
    assert_eq!(fake.requests().len(), 3);
}
