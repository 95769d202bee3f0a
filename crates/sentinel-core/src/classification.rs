//! Classification results returned by the vision model.
//!
//! Replies are deserialized strictly into [`ClassificationResult`]. Absent
//! fields take documented defaults instead of failing the analysis, and a
//! status outside the model's enum becomes [`DrowsinessStatus::Unknown`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// DrowsinessStatus
// ============================================================================

/// Operator state reported by the vision model.
///
/// Matching against the model's enum literals is case-sensitive: `"Asleep"`
/// is [`DrowsinessStatus::Asleep`], `"asleep"` is [`DrowsinessStatus::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DrowsinessStatus {
    /// Eyes open, operator attentive.
    Alert,
    /// Signs of drowsiness.
    Drowsy,
    /// Eyes closed, operator unresponsive.
    Asleep,
    /// Missing from the reply or not one of the enumerated values.
    #[default]
    Unknown,
}

impl DrowsinessStatus {
    /// The values the response schema allows, in schema order.
    pub const SCHEMA_VALUES: [&'static str; 3] = ["Alert", "Drowsy", "Asleep"];

    /// Parses a status literal exactly as the model emits it.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "Alert" => Self::Alert,
            "Drowsy" => Self::Drowsy,
            "Asleep" => Self::Asleep,
            _ => Self::Unknown,
        }
    }

    /// The literal used on the wire.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Alert => "Alert",
            Self::Drowsy => "Drowsy",
            Self::Asleep => "Asleep",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for DrowsinessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DrowsinessStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for DrowsinessStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Non-string values are out of the enum too, not a parse failure.
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().map_or(Self::Unknown, Self::from_label))
    }
}

// ============================================================================
// AlertLevel
// ============================================================================

/// Severity shown in the alert banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Operator unresponsive.
    Critical,
    /// Drowsiness detected.
    Warning,
    /// Nothing to report.
    Nominal,
}

impl AlertLevel {
    /// Derives the alert level from a status.
    ///
    /// `Asleep` is critical, `Drowsy` is a warning, everything else
    /// (including `Unknown`) is nominal.
    ///
    /// # Examples
    ///
    /// ```
    /// use sentinel_core::{AlertLevel, DrowsinessStatus};
    ///
    /// assert_eq!(AlertLevel::from_status(DrowsinessStatus::Asleep), AlertLevel::Critical);
    /// assert_eq!(AlertLevel::from_status(DrowsinessStatus::Drowsy), AlertLevel::Warning);
    /// assert_eq!(AlertLevel::from_status(DrowsinessStatus::Alert), AlertLevel::Nominal);
    /// ```
    #[must_use]
    pub const fn from_status(status: DrowsinessStatus) -> Self {
        match status {
            DrowsinessStatus::Asleep => Self::Critical,
            DrowsinessStatus::Drowsy => Self::Warning,
            DrowsinessStatus::Alert | DrowsinessStatus::Unknown => Self::Nominal,
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Warning => write!(f, "warning"),
            Self::Nominal => write!(f, "nominal"),
        }
    }
}

// ============================================================================
// ClassificationResult
// ============================================================================

/// One classification of a captured frame.
///
/// `confidence` and `eye_openness` are expected in `[0, 100]` by the response
/// schema; they are not clamped here. A missing value defaults to 0, which
/// cannot be told apart from a genuine 0 reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Classified operator state.
    #[serde(default)]
    pub status: DrowsinessStatus,

    /// Model confidence, 0-100.
    #[serde(default)]
    pub confidence: f64,

    /// Estimated eye openness, 0 (closed) to 100 (wide open).
    #[serde(default)]
    pub eye_openness: f64,
}

impl ClassificationResult {
    /// Creates a result from its parts.
    #[must_use]
    pub const fn new(status: DrowsinessStatus, confidence: f64, eye_openness: f64) -> Self {
        Self {
            status,
            confidence,
            eye_openness,
        }
    }

    /// Parses the JSON object the model returns.
    ///
    /// # Errors
    ///
    /// Fails if the text is not a JSON object or a numeric field holds a
    /// non-numeric value. Absent fields are not errors.
    pub fn from_reply(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Alert level derived from the status.
    #[must_use]
    pub const fn alert_level(&self) -> AlertLevel {
        AlertLevel::from_status(self.status)
    }
}
