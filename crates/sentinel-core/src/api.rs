//! HTTP API for the dashboard frontend.
//!
//! # Endpoints
//!
//! - `POST /api/capture` - Submit a captured frame for classification
//! - `POST /api/history/clear` - Clear the event log
//! - `GET /api/status` - Get the current session snapshot
//! - `GET /ws` - WebSocket event stream
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sentinel_core::{create_router, AppState, ApiKey, Config, GeminiClient, Monitor};
//!
//! # async fn example() -> sentinel_core::Result<()> {
//! let config = Config::default();
//! let key = ApiKey::new("your-key").ok_or_else(|| sentinel_core::SentinelError::missing_credential("API_KEY"))?;
//! let client = GeminiClient::new(&config, key)?;
//!
//! let router = create_router(AppState::new(Monitor::new(Arc::new(client))));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::capture::{CapturedImage, MAX_IMAGE_SIZE};
use crate::error::SentinelError;
use crate::monitor::Monitor;
use crate::session::SessionSnapshot;
use crate::websocket::ws_handler;

/// Request bodies carry base64, which is 4/3 the size of the image.
const MAX_BODY_SIZE: usize = (MAX_IMAGE_SIZE as usize) / 3 * 4 + 64 * 1024;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the capture endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// Data URL (`data:image/jpeg;base64,...`) or bare base64 image.
    pub image: String,
}

/// Response body for the clear endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    /// Number of entries removed.
    pub cleared: usize,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared state for HTTP and WebSocket handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The session driver.
    pub monitor: Monitor,
}

impl AppState {
    /// Creates the state around a monitor.
    #[must_use]
    pub const fn new(monitor: Monitor) -> Self {
        Self { monitor }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// Body or image could not be used.
    BadRequest(String),
    /// An analysis is already running.
    Busy(String),
    /// Anything else.
    Internal(String),
}

impl From<SentinelError> for ApiError {
    fn from(err: SentinelError) -> Self {
        match err {
            SentinelError::InvalidImage { .. } => Self::BadRequest(err.to_string()),
            SentinelError::AnalysisInFlight => Self::Busy(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Busy(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the router with the API routes, the WebSocket route, CORS and
/// request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/capture", post(handle_capture))
        .route("/history/clear", post(handle_clear_history))
        .route("/status", get(handle_status));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/capture`.
///
/// Inference failures still answer 200; the snapshot carries the error.
async fn handle_capture(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CaptureRequest>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let Json(request) = payload?;

    let image = CapturedImage::from_data_url(&request.image).map_err(|e| {
        warn!(error = %e, "Rejected captured image");
        ApiError::from(e)
    })?;

    info!(
        format = %image.format,
        size_bytes = image.size_bytes(),
        "Received capture"
    );

    let snapshot = state.monitor.process_capture(image).await?;
    Ok(Json(snapshot))
}

/// Handler for `POST /api/history/clear`.
async fn handle_clear_history(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    let cleared = state.monitor.clear_history().await;
    Json(ClearResponse { cleared })
}

/// Handler for `GET /api/status`.
async fn handle_status(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.monitor.snapshot().await)
}

// ============================================================================
// Tests
// ============================================================================
