use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for CompanyScout.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("provider not found: {0}")]
    ProviderNotFound(String),
    #[error("provider {0} is not enabled")]
    ProviderDisabled(String),
    #[error("registry error: {0}")]
    Registry(String),
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResearchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Classification of a failed remote API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayErrorKind {
    RateLimitError,
    AuthError,
    TimeoutError,
    NetworkError,
    ExecutionError,
}

impl GatewayErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayErrorKind::RateLimitError => "RATE_LIMIT_ERROR",
            GatewayErrorKind::AuthError => "AUTH_ERROR",
            GatewayErrorKind::TimeoutError => "TIMEOUT_ERROR",
            GatewayErrorKind::NetworkError => "NETWORK_ERROR",
            GatewayErrorKind::ExecutionError => "EXECUTION_ERROR",
        }
    }

    /// Rate limits, timeouts and connection failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorKind::RateLimitError
                | GatewayErrorKind::TimeoutError
                | GatewayErrorKind::NetworkError
        )
    }
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure returned by the gateway once its retry budget is spent
/// or a fatal response is observed.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub attempts: u32,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            attempts: 0,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Error thrown out of a provider's `discover`; the orchestrator demotes it
/// to the provider's run status.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {0} is not enabled")]
    NotEnabled(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("execution failed: {0}")]
    Execution(String),
}

impl ProviderError {
    /// True when the remote API itself failed, as opposed to local processing.
    pub fn is_api_failure(&self) -> bool {
        matches!(self, ProviderError::Gateway(_))
    }
}
