//! API key resolution.
//!
//! The environment takes precedence; an interactive prompt is the fallback.
//! Without a key no inference call is ever attempted.

use std::fmt;

use tracing::{debug, info};

use crate::error::{Result, SentinelError};

/// Secret credential for the inference API.
///
/// `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key, trimming surrounding whitespace.
    ///
    /// Returns `None` for blank input.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the key for use in a request header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Where the resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read from the configured environment variable.
    Environment,
    /// Entered at the interactive prompt.
    Prompt,
}

/// Resolves the API key from `env_var`, falling back to `prompt`.
///
/// The prompt is only invoked when the variable is unset or blank.
///
/// # Errors
///
/// Returns `SentinelError::MissingCredential` when neither source yields a
/// non-blank key, and `SentinelError::Io` when the prompt itself fails.
pub fn resolve_api_key<F>(env_var: &str, prompt: F) -> Result<(ApiKey, CredentialSource)>
where
    F: FnOnce() -> std::io::Result<Option<String>>,
{
    let from_env = std::env::var(env_var).ok();
    resolve_with(from_env.as_deref(), env_var, prompt)
}

/// Resolution logic with the environment lookup already done.
fn resolve_with<F>(
    from_env: Option<&str>,
    env_var: &str,
    prompt: F,
) -> Result<(ApiKey, CredentialSource)>
where
    F: FnOnce() -> std::io::Result<Option<String>>,
{
    if let Some(key) = from_env.and_then(ApiKey::new) {
        info!(env_var, "API key detected in environment");
        return Ok((key, CredentialSource::Environment));
    }

    debug!(env_var, "API key not in environment, prompting");
    let entered = prompt()?;
    entered
        .as_deref()
        .and_then(ApiKey::new)
        .map(|key| (key, CredentialSource::Prompt))
        .ok_or_else(|| SentinelError::missing_credential(env_var))
}
