//! Error types for the Sentinel Vision core.
//!
//! This module defines the error hierarchy for session operations, including
//! configuration loading, credential resolution, image capture, remote
//! inference, and session state transitions.

use std::path::PathBuf;

/// A specialized `Result` type for Sentinel core operations.
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Errors that can occur while running a monitoring session.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your sentinel.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Credential Errors
    // ========================================================================
    /// No API credential was found in the environment or entered at the prompt.
    #[error("API key required: '{env_var}' is not set and no key was entered\n\nSuggestion: Export {env_var} or enter the key when prompted")]
    MissingCredential {
        /// Name of the environment variable that was consulted.
        env_var: String,
    },

    // ========================================================================
    // Capture Errors
    // ========================================================================
    /// The captured image cannot be submitted to the inference API.
    #[error("Invalid image: {message}\n\nSuggestion: Capture a PNG, JPEG or WebP still image")]
    InvalidImage {
        /// Why the image was rejected.
        message: String,
    },

    // ========================================================================
    // Inference Errors
    // ========================================================================
    /// The remote inference call failed.
    ///
    /// Every failure of the inference client (network, authentication, quota,
    /// malformed reply) surfaces as this single variant. The kind is carried
    /// for logging; callers treat all kinds the same way.
    #[error("Inference failed ({kind}): {message}")]
    InferenceFailed {
        /// The category of the failure.
        kind: InferenceErrorKind,
        /// Detailed error message.
        message: String,
    },

    // ========================================================================
    // Concurrency Errors
    // ========================================================================
    /// A capture was submitted while another inference was still in flight.
    #[error("An analysis is already in progress\n\nSuggestion: Wait for the current result before capturing again")]
    AnalysisInFlight,

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },
}

/// Categories of inference failures for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceErrorKind {
    /// Authentication failure (invalid or revoked API key).
    Authentication,
    /// Quota or rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The reply was empty, not JSON, or had mistyped fields.
    MalformedReply,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for InferenceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::MalformedReply => write!(f, "malformed_reply"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl InferenceErrorKind {
    /// Maps an HTTP status code returned by the inference API to a kind.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl SentinelError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MissingCredential` error.
    #[must_use]
    pub fn missing_credential(env_var: impl Into<String>) -> Self {
        Self::MissingCredential {
            env_var: env_var.into(),
        }
    }

    /// Creates a new `InvalidImage` error.
    #[must_use]
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage {
            message: message.into(),
        }
    }

    /// Creates a new `InferenceFailed` error.
    #[must_use]
    pub fn inference(kind: InferenceErrorKind, message: impl Into<String>) -> Self {
        Self::InferenceFailed {
            kind,
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error is local to one interaction.
    ///
    /// Recoverable errors are shown to the user and the session goes back to
    /// awaiting the next capture.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InferenceFailed { .. } | Self::AnalysisInFlight | Self::InvalidImage { .. }
        )
    }

    /// Returns `true` if this error is fatal and halts all further processing.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::MissingCredential { .. }
        )
    }
}
