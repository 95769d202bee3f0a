//! WebSocket event stream for live dashboard updates.
//!
//! Every connected client receives the session events as JSON objects with
//! `event` and `payload` fields.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes the current snapshot
//! - `analysis_started` - A captured frame was submitted for classification
//! - `analysis_complete` - Classification succeeded and was logged
//! - `analysis_failed` - Classification failed; history is unchanged
//! - `history_cleared` - The event log was cleared
//!
//! # Example
//!
//! ```no_run
//! use sentinel_core::websocket::{EventBroadcaster, SessionEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(SessionEvent::analysis_started(chrono::Utc::now()));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::classification::{AlertLevel, ClassificationResult};
use crate::history::HistoryEntry;
use crate::session::SessionSnapshot;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The session as it was when the client connected.
    pub snapshot: SessionSnapshot,
}

/// Payload for the `analysis_started` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStartedPayload {
    /// When the frame was captured.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `analysis_complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCompletePayload {
    /// The classification.
    pub result: ClassificationResult,
    /// Alert level derived from the status.
    pub alert_level: AlertLevel,
    /// The history entry that was appended.
    pub entry: HistoryEntry,
}

/// Payload for the `analysis_failed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFailedPayload {
    /// Human-readable failure message.
    pub message: String,
}

/// Payload for the `history_cleared` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryClearedPayload {
    /// Number of entries removed.
    pub cleared: usize,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events streamed to dashboard clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent when a frame is submitted.
    AnalysisStarted(AnalysisStartedPayload),
    /// Sent when a classification is logged.
    AnalysisComplete(AnalysisCompletePayload),
    /// Sent when a classification fails.
    AnalysisFailed(AnalysisFailedPayload),
    /// Sent when the event log is cleared.
    HistoryCleared(HistoryClearedPayload),
}

impl SessionEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(snapshot: SessionSnapshot) -> Self {
        Self::Connected(ConnectedPayload { snapshot })
    }

    /// Creates an `AnalysisStarted` event for a frame captured at `captured_at`.
    #[must_use]
    pub const fn analysis_started(captured_at: DateTime<Utc>) -> Self {
        Self::AnalysisStarted(AnalysisStartedPayload {
            timestamp: captured_at,
        })
    }

    /// Creates an `AnalysisComplete` event.
    #[must_use]
    pub const fn analysis_complete(result: ClassificationResult, entry: HistoryEntry) -> Self {
        Self::AnalysisComplete(AnalysisCompletePayload {
            alert_level: result.alert_level(),
            result,
            entry,
        })
    }

    /// Creates an `AnalysisFailed` event.
    #[must_use]
    pub fn analysis_failed(message: impl Into<String>) -> Self {
        Self::AnalysisFailed(AnalysisFailedPayload {
            message: message.into(),
        })
    }

    /// Creates a `HistoryCleared` event.
    #[must_use]
    pub const fn history_cleared(cleared: usize) -> Self {
        Self::HistoryCleared(HistoryClearedPayload { cleared })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::AnalysisStarted(_) => "analysis_started",
            Self::AnalysisComplete(_) => "analysis_complete",
            Self::AnalysisFailed(_) => "analysis_failed",
            Self::HistoryCleared(_) => "history_cleared",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Fans session events out to every subscriber.
///
/// Events are not kept for clients that connect later.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster with the given per-subscriber buffer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives `Lagged` and misses events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Sends an event and returns how many subscribers will see it.
    pub fn send(&self, event: SessionEvent) -> usize {
        // Err only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// Upgrade handler for `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serves one WebSocket client.
///
/// - Sends `connected` with the current snapshot immediately
/// - Forwards every broadcast event
/// - Pings every 30 seconds and closes after 3 missed pongs
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so nothing falls in between
    let mut event_receiver = state.monitor.subscribe();
    let snapshot = state.monitor.snapshot().await;

    let connected_json = match serde_json::to_string(&SessionEvent::connected(snapshot)) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize connected event");
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent initial snapshot");

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately
    heartbeat.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring data message from client");
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket error");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(session_event) => {
                        let json = match serde_json::to_string(&session_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize event");
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Client lagged behind the event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!(missed = MAX_MISSED_PONGS, "Client stopped answering pings, closing");
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
