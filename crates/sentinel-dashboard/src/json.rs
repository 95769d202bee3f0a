//! JSON output of the dashboard.
//!
//! Used by `sentinel analyze --json` to emit one document per analyzed frame.
//!
//! # Example
//!
//! ```rust
//! use sentinel_core::SessionState;
//! use sentinel_dashboard::{json::JsonGenerator, Dashboard};
//!
//! let dashboard = Dashboard::from_session(&SessionState::new());
//! let generator = JsonGenerator::new(&dashboard);
//!
//! let compact = generator.generate().unwrap();
//! assert!(!compact.contains('\n'));
//! ```

use crate::{Dashboard, DashboardError, Result};

/// Serializes a [`Dashboard`] to JSON.
pub struct JsonGenerator<'a> {
    dashboard: &'a Dashboard,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a generator for the given dashboard.
    #[must_use]
    pub const fn new(dashboard: &'a Dashboard) -> Self {
        Self { dashboard }
    }

    /// Generates compact single-line JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Serialization`] if serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.dashboard).map_err(DashboardError::from)
    }

    /// Generates pretty-printed JSON with 2-space indentation.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Serialization`] if serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.dashboard).map_err(DashboardError::from)
    }
}
