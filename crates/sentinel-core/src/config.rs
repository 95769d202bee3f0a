//! Configuration types for Sentinel Vision.
//!
//! This module provides the configuration used to reach the remote inference
//! API and to serve the dashboard backend.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "sentinel.json";

/// Default vision model used for classification.
fn default_model() -> String {
    "gemini-3-flash-preview".to_string()
}

/// Default base URL of the generative language API.
fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

/// Default address the dashboard backend binds to.
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

/// Default port for the dashboard backend.
const fn default_port() -> u16 {
    3000
}

/// Main configuration for Sentinel Vision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Vision model that classifies captured frames.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the inference API (without the `/models/...` suffix).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Environment variable consulted first for the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Address the dashboard backend binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port the dashboard backend listens on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `sentinel.json` in the current directory. If not found,
    /// returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            SentinelError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `sentinel.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `SentinelError::ConfigValidationError` if the values
    /// are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(SentinelError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| SentinelError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// - `model`, `apiKeyEnv` and `bindAddress` must not be blank
    /// - `apiBaseUrl` must be an `http://` or `https://` URL
    /// - `port` must not be 0
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(SentinelError::config_validation(
                "model must not be empty",
                "Set model to a vision-capable model name in your sentinel.json",
            ));
        }

        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(SentinelError::config_validation(
                format!("apiBaseUrl must be an http(s) URL, got '{}'", self.api_base_url),
                "Set apiBaseUrl to the API root, e.g. https://generativelanguage.googleapis.com/v1beta",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(SentinelError::config_validation(
                "apiKeyEnv must not be empty",
                "Set apiKeyEnv to the environment variable holding your key (default: API_KEY)",
            ));
        }

        if self.bind_address.trim().is_empty() {
            return Err(SentinelError::config_validation(
                "bindAddress must not be empty",
                "Set bindAddress in your sentinel.json (use '127.0.0.1' for local only)",
            ));
        }

        if self.port == 0 {
            return Err(SentinelError::config_validation(
                "port must be greater than 0",
                "Set port to a free TCP port in your sentinel.json or pass --port",
            ));
        }

        Ok(())
    }

    /// Returns the full `generateContent` endpoint for the configured model.
    #[must_use]
    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base_url.trim_end_matches('/'),
            self.model
        )
    }
}
