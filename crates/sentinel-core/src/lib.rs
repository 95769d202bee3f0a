//! Sentinel Vision core
//!
//! Session state, remote drowsiness classification, HTTP API and WebSocket
//! events for the operator monitoring dashboard.

pub mod api;
pub mod capture;
pub mod classification;
pub mod config;
pub mod credential;
pub mod error;
pub mod history;
pub mod inference;
pub mod monitor;
pub mod session;
pub mod websocket;

pub use api::{create_router, AppState, CaptureRequest, ClearResponse, ErrorResponse};
pub use capture::{CapturedImage, ImageFormat, MAX_IMAGE_SIZE};
pub use classification::{AlertLevel, ClassificationResult, DrowsinessStatus};
pub use config::Config;
pub use credential::{resolve_api_key, ApiKey, CredentialSource};
pub use error::{InferenceErrorKind, Result, SentinelError};
pub use history::{HistoryEntry, SessionHistory, RECENT_WINDOW, TREND_WINDOW};
pub use inference::{GeminiClient, InferenceClient, PROMPT};
pub use monitor::Monitor;
pub use session::{SessionPhase, SessionSnapshot, SessionState};
pub use websocket::{EventBroadcaster, SessionEvent};
