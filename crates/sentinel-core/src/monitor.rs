//! Capture-to-display orchestration.
//!
//! A [`Monitor`] owns the session state and runs one classification cycle per
//! captured frame: `begin_analysis`, the remote call, then
//! `complete_analysis` or `fail_analysis`. The state lock is released while
//! the remote call is in flight, so status reads stay responsive and a second
//! capture is rejected by the `Analyzing` phase rather than queued.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::capture::CapturedImage;
use crate::classification::ClassificationResult;
use crate::error::{InferenceErrorKind, Result, SentinelError};
use crate::inference::InferenceClient;
use crate::session::{SessionSnapshot, SessionState};
use crate::websocket::{EventBroadcaster, SessionEvent};

/// Drives the session for one process.
///
/// Cloning is cheap and every clone shares the same session.
#[derive(Clone)]
pub struct Monitor {
    client: Arc<dyn InferenceClient>,
    state: Arc<Mutex<SessionState>>,
    broadcaster: EventBroadcaster,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("backend", &self.client.backend_name())
            .field("subscribers", &self.broadcaster.receiver_count())
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Creates a monitor with a fresh `Idle` session.
    #[must_use]
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self::with_broadcaster(client, EventBroadcaster::default())
    }

    /// Creates a monitor that publishes to an existing broadcaster.
    #[must_use]
    pub fn with_broadcaster(client: Arc<dyn InferenceClient>, broadcaster: EventBroadcaster) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(SessionState::new())),
            broadcaster,
        }
    }

    /// Runs one capture, classify and display cycle.
    ///
    /// An inference failure is not an error here: it is recorded in the
    /// session (phase `Error`, history unchanged) and the returned snapshot
    /// shows it. Classification and the state update run on their own task,
    /// so the session leaves `Analyzing` even if the caller stops waiting.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::AnalysisInFlight` if a previous cycle has not
    /// finished.
    pub async fn process_capture(&self, image: CapturedImage) -> Result<SessionSnapshot> {
        self.state.lock().await.begin_analysis()?;
        self.broadcaster
            .send(SessionEvent::analysis_started(image.captured_at));

        info!(
            backend = self.client.backend_name(),
            captured_at = %image.captured_at,
            format = %image.format,
            size_bytes = image.size_bytes(),
            "Analyzing captured frame"
        );

        let cycle = self.clone();
        let task = tokio::spawn(async move {
            let outcome = cycle.client.classify(&image).await;
            cycle.record_outcome(outcome).await
        });

        match task.await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_outcome(Err(SentinelError::inference(
                    InferenceErrorKind::Other,
                    format!("analysis task ended unexpectedly: {e}"),
                )))
                .await
            }
        }
    }

    /// Moves the session out of `Analyzing` and publishes the outcome.
    async fn record_outcome(
        &self,
        outcome: Result<ClassificationResult>,
    ) -> Result<SessionSnapshot> {
        let mut state = self.state.lock().await;
        match outcome {
            Ok(result) => {
                let entry = state.complete_analysis(result)?.clone();
                info!(
                    sequence = entry.sequence,
                    status = %result.status,
                    alert_level = %result.alert_level(),
                    "Classification logged"
                );
                self.broadcaster
                    .send(SessionEvent::analysis_complete(result, entry));
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Classification failed, history unchanged");
                state.fail_analysis(message.clone())?;
                self.broadcaster.send(SessionEvent::analysis_failed(message));
            }
        }

        Ok(state.snapshot())
    }

    /// Empties the event log and returns how many entries were removed.
    pub async fn clear_history(&self) -> usize {
        let cleared = self.state.lock().await.clear_history();
        info!(cleared, "History cleared");
        self.broadcaster.send(SessionEvent::history_cleared(cleared));
        cleared
    }

    /// Returns the current snapshot.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Returns a copy of the full session state.
    pub async fn session(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcaster.subscribe()
    }
}
