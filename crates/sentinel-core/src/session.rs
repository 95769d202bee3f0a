//! Session state machine for the capture/classify/display cycle.
//!
//! This module defines the phases of one monitoring session and the
//! transitions between them. All transitions are synchronous and take
//! `&mut self`; the [`Monitor`](crate::Monitor) owns the state behind a mutex.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classification::{AlertLevel, ClassificationResult};
use crate::error::{Result, SentinelError};
use crate::history::{HistoryEntry, SessionHistory};

// ============================================================================
// SessionPhase
// ============================================================================

/// Current phase of the monitoring session.
///
/// The phase transitions through these states:
/// - `Idle` -> `Analyzing` (an image was captured)
/// - `Analyzing` -> `Displaying` (classification succeeded)
/// - `Analyzing` -> `Error` (classification failed)
/// - `Displaying` / `Error` -> `Analyzing` (the next image was captured)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No capture has been processed yet.
    #[default]
    Idle,
    /// An inference request is in flight.
    Analyzing,
    /// The latest classification is on display.
    Displaying,
    /// The latest classification failed; the error is on display.
    Error,
}

impl SessionPhase {
    /// Returns `true` if a new capture may be submitted in this phase.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_core::SessionPhase;
    ///
    /// assert!(SessionPhase::Idle.accepts_capture());
    /// assert!(SessionPhase::Error.accepts_capture());
    /// assert!(!SessionPhase::Analyzing.accepts_capture());
    /// ```
    #[must_use]
    pub const fn accepts_capture(&self) -> bool {
        !matches!(self, Self::Analyzing)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Analyzing => write!(f, "analyzing"),
            Self::Displaying => write!(f, "displaying"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Complete state of one monitoring session.
///
/// Lives for the duration of the process; nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Current phase.
    pub phase: SessionPhase,

    /// Event log of successful classifications.
    pub history: SessionHistory,

    /// Result shown in the telemetry panel, if any.
    pub last_result: Option<ClassificationResult>,

    /// Message of the most recent failure, shown while in `Error`.
    pub last_error: Option<String>,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Creates a new session in the `Idle` phase with an empty history.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_core::{SessionPhase, SessionState};
    ///
    /// let state = SessionState::new();
    /// assert_eq!(state.phase, SessionPhase::Idle);
    /// assert!(state.history.is_empty());
    /// assert!(state.last_result.is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            phase: SessionPhase::Idle,
            history: SessionHistory::new(),
            last_result: None,
            last_error: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Marks the start of an analysis.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::AnalysisInFlight` if another analysis has not
    /// finished yet. The state is left unchanged.
    pub fn begin_analysis(&mut self) -> Result<()> {
        if !self.phase.accepts_capture() {
            return Err(SentinelError::AnalysisInFlight);
        }

        debug!(from = %self.phase, "Analysis started");
        self.phase = SessionPhase::Analyzing;
        self.touch();
        Ok(())
    }

    /// Records a successful classification.
    ///
    /// Appends a history entry with `sequence = len + 1`, replaces the
    /// telemetry and moves to `Displaying`.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::InvalidStateTransition` if no analysis is in
    /// flight.
    pub fn complete_analysis(&mut self, result: ClassificationResult) -> Result<&HistoryEntry> {
        if self.phase != SessionPhase::Analyzing {
            return Err(SentinelError::invalid_transition(
                self.phase,
                SessionPhase::Displaying,
            ));
        }

        self.phase = SessionPhase::Displaying;
        self.last_result = Some(result);
        self.last_error = None;
        self.touch();

        Ok(self.history.append(result.status, result.eye_openness))
    }

    /// Records a failed classification.
    ///
    /// The history is untouched. The telemetry is cleared so the failure
    /// message is the only thing on display.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::InvalidStateTransition` if no analysis is in
    /// flight.
    pub fn fail_analysis(&mut self, message: impl Into<String>) -> Result<()> {
        if self.phase != SessionPhase::Analyzing {
            return Err(SentinelError::invalid_transition(
                self.phase,
                SessionPhase::Error,
            ));
        }

        self.phase = SessionPhase::Error;
        self.last_result = None;
        self.last_error = Some(message.into());
        self.touch();
        Ok(())
    }

    /// Empties the event log and returns how many entries were removed.
    ///
    /// Allowed in every phase. The telemetry and phase are kept.
    pub fn clear_history(&mut self) -> usize {
        let removed = self.history.clear();
        self.touch();
        removed
    }

    /// Alert level of the result on display, if any.
    #[must_use]
    pub fn alert_level(&self) -> Option<AlertLevel> {
        self.last_result.as_ref().map(ClassificationResult::alert_level)
    }

    /// Returns a read-only view for the presentation layer.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            last_result: self.last_result,
            alert_level: self.alert_level(),
            last_error: self.last_error.clone(),
            recent_history: self.history.recent().to_vec(),
            total_entries: self.history.len(),
            eye_openness_trend: self.history.openness_trend(),
            started_at: self.started_at,
            updated_at: self.updated_at,
        }
    }
}

// ============================================================================
// SessionSnapshot
// ============================================================================

/// Serializable view of the session returned by the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current phase.
    pub phase: SessionPhase,

    /// Result on display, if any.
    pub last_result: Option<ClassificationResult>,

    /// Alert level of the result on display.
    pub alert_level: Option<AlertLevel>,

    /// Failure message on display, if any.
    pub last_error: Option<String>,

    /// Most recent history entries, oldest first.
    pub recent_history: Vec<HistoryEntry>,

    /// Total number of history entries.
    pub total_entries: usize,

    /// Eye openness of the last 20 classifications, oldest first.
    #[serde(default)]
    pub eye_openness_trend: Vec<f64>,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Tests
// ============================================================================
