use std::env;

use crate::{GatewayError, GatewayErrorKind, ResearchError};

const PLACEHOLDER_MARKERS: &[&str] = &[
    "your-api-key",
    "your_api_key",
    "your-key-here",
    "replace-me",
    "changeme",
    "placeholder",
    "xxxx",
    "<",
];

const MIN_KEY_LEN: usize = 20;

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Require that a given environment variable is set and non-empty.
pub fn require_env(var: &str) -> Result<SecretValue, ResearchError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretValue(value)),
        _ => Err(ResearchError::MissingSecret(var.to_string())),
    }
}

/// Reject credentials that are guaranteed to produce a 401 before any
/// request is sent.
pub fn validate_api_key(key: &SecretValue, required_prefix: Option<&str>) -> Result<(), GatewayError> {
    let raw = key.expose().trim();
    if raw.is_empty() {
        return Err(GatewayError::new(
            GatewayErrorKind::AuthError,
            "API key is empty",
        ));
    }

    let lowered = raw.to_ascii_lowercase();
    if PLACEHOLDER_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return Err(GatewayError::new(
            GatewayErrorKind::AuthError,
            "API key looks like a placeholder value",
        ));
    }

    if let Some(prefix) = required_prefix.filter(|prefix| !prefix.is_empty()) {
        if !raw.starts_with(prefix) {
            return Err(GatewayError::new(
                GatewayErrorKind::AuthError,
                format!("API key must start with `{prefix}`"),
            ));
        }
    }

    if raw.len() < MIN_KEY_LEN {
        return Err(GatewayError::new(
            GatewayErrorKind::AuthError,
            "API key is too short",
        ));
    }

    Ok(())
}
