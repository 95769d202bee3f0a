//! Append-only event log of successful classifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::DrowsinessStatus;

/// Number of entries shown in the event log.
pub const RECENT_WINDOW: usize = 5;

/// Number of readings kept in the eye-openness trend.
pub const TREND_WINDOW: usize = 20;

/// One successful classification, recorded in the event log.
///
/// Entries are never mutated after they are appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Position in the log, starting at 1.
    pub sequence: u32,

    /// Classified operator state.
    pub status: DrowsinessStatus,

    /// Eye openness reported with the classification.
    pub eye_openness: f64,

    /// When the entry was appended.
    pub recorded_at: DateTime<Utc>,
}

/// Ordered history of classifications for one session.
///
/// Sequence numbers are assigned as `len + 1` at append time, so they are
/// strictly increasing and gap-free from 1 until the next [`clear`].
///
/// [`clear`]: SessionHistory::clear
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHistory {
    entries: Vec<HistoryEntry>,
}

impl SessionHistory {
    /// Creates an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a new entry and returns it.
    pub fn append(&mut self, status: DrowsinessStatus, eye_openness: f64) -> &HistoryEntry {
        let sequence = u32::try_from(self.entries.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);

        self.entries.push(HistoryEntry {
            sequence,
            status,
            eye_openness,
            recorded_at: Utc::now(),
        });

        &self.entries[self.entries.len() - 1]
    }

    /// The most recent [`RECENT_WINDOW`] entries, oldest first.
    #[must_use]
    pub fn recent(&self) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(RECENT_WINDOW);
        &self.entries[start..]
    }

    /// Eye openness of the most recent [`TREND_WINDOW`] entries, oldest first.
    #[must_use]
    pub fn openness_trend(&self) -> Vec<f64> {
        let start = self.entries.len().saturating_sub(TREND_WINDOW);
        self.entries[start..].iter().map(|e| e.eye_openness).collect()
    }

    /// Removes every entry and returns how many were removed.
    ///
    /// Clearing an empty history is a no-op.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
