//! Terminal rendering of the dashboard.
//!
//! The panel has up to five sections, each separated by a blank line:
//!
//! - Header with the session phase
//! - Telemetry (status, confidence, eye openness)
//! - Alert banner or error text
//! - Alertness trend sparkline of the last 20 readings
//! - Event log table of the most recent entries

use std::fmt::Write;

use sentinel_core::SessionPhase;

use crate::{Dashboard, EventLogRow};

/// Width of the telemetry label column.
const LABEL_WIDTH: usize = 17;

/// Width of the `#` column in the event log.
const SEQUENCE_WIDTH: usize = 5;

/// Width of the `STATUS` column in the event log.
const STATUS_WIDTH: usize = 10;

/// Renders a [`Dashboard`] as plain text for the terminal.
pub struct TextRenderer<'a> {
    dashboard: &'a Dashboard,
}

impl<'a> TextRenderer<'a> {
    /// Creates a renderer for the given dashboard.
    #[must_use]
    pub const fn new(dashboard: &'a Dashboard) -> Self {
        Self { dashboard }
    }

    /// Renders the full panel.
    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();

        self.write_header(&mut output);
        self.write_telemetry(&mut output);
        self.write_alert(&mut output);
        self.write_trend(&mut output);
        self.write_event_log(&mut output);

        output
    }

    fn write_header(&self, output: &mut String) {
        let _ = writeln!(output, "SENTINEL VISION [{}]", self.dashboard.phase);

        match self.dashboard.phase {
            SessionPhase::Analyzing => {
                let _ = writeln!(output, "\nANALYZING BIOMETRICS...");
            }
            SessionPhase::Idle if self.dashboard.telemetry.is_none() => {
                let _ = writeln!(output, "\nAWAITING CAPTURE");
            }
            _ => {}
        }
    }

    fn write_telemetry(&self, output: &mut String) {
        let Some(telemetry) = &self.dashboard.telemetry else {
            return;
        };

        let _ = writeln!(output, "\nTELEMETRY");
        for (label, value) in [
            ("OPERATOR STATUS", &telemetry.status),
            ("CONFIDENCE", &telemetry.confidence),
            ("EYE OPENNESS", &telemetry.eye_openness),
        ] {
            let _ = writeln!(output, "  {label:<LABEL_WIDTH$}{value}");
        }
    }

    fn write_alert(&self, output: &mut String) {
        if let Some(banner) = &self.dashboard.banner {
            let _ = writeln!(output, "\n{}", banner.text);
        }
        if let Some(error) = &self.dashboard.error {
            let _ = writeln!(output, "\n{error}");
        }
    }

    fn write_trend(&self, output: &mut String) {
        if self.dashboard.trend.is_empty() {
            return;
        }

        let _ = writeln!(output, "\nALERTNESS TREND (100 = AWAKE)");
        let _ = writeln!(output, "  {}", self.dashboard.trend);
    }

    fn write_event_log(&self, output: &mut String) {
        let rows = &self.dashboard.event_log;
        if rows.is_empty() {
            return;
        }

        let _ = writeln!(output, "\nEVENT LOG");
        write_row(output, "#", "STATUS", "EYE OPENNESS");
        for EventLogRow {
            sequence,
            status,
            eye_openness,
        } in rows
        {
            write_row(output, &sequence.to_string(), status, eye_openness);
        }

        if self.dashboard.is_log_truncated() {
            let _ = writeln!(
                output,
                "  ({} of {} entries shown)",
                rows.len(),
                self.dashboard.total_entries
            );
        }
    }
}

fn write_row(output: &mut String, sequence: &str, status: &str, eye_openness: &str) {
    let _ = writeln!(
        output,
        "  {sequence:<SEQUENCE_WIDTH$}{status:<STATUS_WIDTH$}{eye_openness}"
    );
}
