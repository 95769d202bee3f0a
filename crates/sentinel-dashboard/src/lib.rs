//! Sentinel Vision dashboard presentation
//!
//! Turns the session state into what the operator sees: telemetry, one alert
//! banner and the event log of the most recent classifications.
//!
//! # Types
//!
//! - [`Dashboard`] - View model built from a session
//! - [`Telemetry`] - Formatted status, confidence and eye openness
//! - [`Banner`] - Alert banner for the result on display
//! - [`EventLogRow`] - One row of the event log
//!
//! The eye-openness trend of the last 20 classifications is rendered with
//! [`sparkline`].
//!
//! # Renderers
//!
//! - [`TextRenderer`] - Terminal panel
//! - [`json::JsonGenerator`] - Compact or pretty JSON
//!
//! # Example
//!
//! ```rust
//! use sentinel_core::{ClassificationResult, DrowsinessStatus, SessionState};
//! use sentinel_dashboard::{Dashboard, TextRenderer};
//!
//! let mut state = SessionState::new();
//! state.begin_analysis().unwrap();
//! state
//!     .complete_analysis(ClassificationResult::new(DrowsinessStatus::Drowsy, 77.0, 40.0))
//!     .unwrap();
//!
//! let dashboard = Dashboard::from_session(&state);
//! let panel = TextRenderer::new(&dashboard).render();
//! assert!(panel.contains("WARNING: DROWSINESS DETECTED"));
//! ```

pub mod json;
mod text;

pub use text::TextRenderer;

use chrono::{DateTime, Utc};
use sentinel_core::{
    AlertLevel, ClassificationResult, HistoryEntry, SessionPhase, SessionSnapshot, SessionState,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while rendering the dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Failed to serialize the dashboard to JSON.
    #[error("failed to serialize dashboard: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for dashboard operations.
pub type Result<T> = std::result::Result<T, DashboardError>;

// ============================================================================
// Formatting
// ============================================================================

/// Banner text for an alert level.
#[must_use]
pub const fn banner_text(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Critical => "CRITICAL: WAKE UP! OPERATOR UNRESPONSIVE",
        AlertLevel::Warning => "WARNING: DROWSINESS DETECTED",
        AlertLevel::Nominal => "SYSTEM NORMAL: OPERATOR ALERT",
    }
}

/// Formats a 0-100 score as a percentage.
///
/// Whole numbers print without decimals, anything else prints as-is.
///
/// ```rust
/// use sentinel_dashboard::format_percent;
///
/// assert_eq!(format_percent(77.0), "77%");
/// assert_eq!(format_percent(77.5), "77.5%");
/// ```
#[must_use]
pub fn format_percent(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.0}%")
    } else {
        format!("{value}%")
    }
}

/// Bar glyphs for the alertness trend, lowest first.
const TREND_BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Renders 0-100 eye-openness readings as one bar per reading.
///
/// Values outside 0-100 are clamped.
///
/// ```rust
/// use sentinel_dashboard::sparkline;
///
/// assert_eq!(sparkline(&[0.0, 50.0, 100.0]), "▁▅█");
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sparkline(values: &[f64]) -> String {
    let top = TREND_BARS.len() - 1;
    values
        .iter()
        .map(|value| {
            let level = (value.clamp(0.0, 100.0) / 100.0 * top as f64).round() as usize;
            TREND_BARS[level.min(top)]
        })
        .collect()
}

/// Formats the text shown for a failed analysis.
#[must_use]
pub fn error_text(message: &str) -> String {
    format!("SYSTEM ERROR: {message}")
}

// ============================================================================
// View Model
// ============================================================================

/// Telemetry for the result on display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    /// Operator status, upper-cased.
    pub status: String,
    /// Confidence with a `%` suffix.
    pub confidence: String,
    /// Eye openness with a `%` suffix.
    pub eye_openness: String,
}

impl From<&ClassificationResult> for Telemetry {
    fn from(result: &ClassificationResult) -> Self {
        Self {
            status: result.status.label().to_uppercase(),
            confidence: format_percent(result.confidence),
            eye_openness: format_percent(result.eye_openness),
        }
    }
}

/// Alert banner for the result on display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    /// Severity.
    pub level: AlertLevel,
    /// Banner text.
    pub text: String,
}

impl From<AlertLevel> for Banner {
    fn from(level: AlertLevel) -> Self {
        Self {
            level,
            text: banner_text(level).to_string(),
        }
    }
}

/// One row of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogRow {
    /// Sequence number of the entry.
    pub sequence: u32,
    /// Status as reported by the model.
    pub status: String,
    /// Eye openness with a `%` suffix.
    pub eye_openness: String,
}

impl From<&HistoryEntry> for EventLogRow {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            sequence: entry.sequence,
            status: entry.status.label().to_string(),
            eye_openness: format_percent(entry.eye_openness),
        }
    }
}

/// Everything the operator sees, derived from one session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Session phase.
    pub phase: SessionPhase,

    /// Telemetry, absent until a classification succeeds and after a failure.
    pub telemetry: Option<Telemetry>,

    /// Alert banner for the telemetry on display.
    pub banner: Option<Banner>,

    /// `SYSTEM ERROR: ...` text while the latest analysis failed.
    pub error: Option<String>,

    /// Most recent history entries, oldest first.
    pub event_log: Vec<EventLogRow>,

    /// Total number of history entries.
    pub total_entries: usize,

    /// Eye-openness trend of the last 20 classifications as a sparkline.
    pub trend: String,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}

impl Dashboard {
    /// Builds the dashboard from a session.
    #[must_use]
    pub fn from_session(state: &SessionState) -> Self {
        Self::from_snapshot(&state.snapshot())
    }

    /// Builds the dashboard from a snapshot, e.g. one returned by the HTTP API.
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            phase: snapshot.phase,
            telemetry: snapshot.last_result.as_ref().map(Telemetry::from),
            banner: snapshot.alert_level.map(Banner::from),
            error: snapshot.last_error.as_deref().map(error_text),
            event_log: snapshot.recent_history.iter().map(EventLogRow::from).collect(),
            total_entries: snapshot.total_entries,
            trend: sparkline(&snapshot.eye_openness_trend),
            started_at: snapshot.started_at,
            updated_at: snapshot.updated_at,
        }
    }

    /// Returns `true` if older entries are hidden from the event log.
    #[must_use]
    pub fn is_log_truncated(&self) -> bool {
        self.total_entries > self.event_log.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
