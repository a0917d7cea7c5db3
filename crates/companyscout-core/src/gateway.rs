//! Remote call gateway for the generative-text API.
//!
//! Every request goes through a bounded exponential backoff loop. Failures are
//! classified into [`GatewayErrorKind`]s and returned as values; nothing is
//! thrown past this boundary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::LlmConfig;
use crate::logging::redact_secrets;
use crate::security::validate_api_key;
use crate::{GatewayError, GatewayErrorKind, ResearchError, SecretValue, metrics};

const MAX_ERROR_BODY_CHARS: usize = 300;
const RATE_LIMIT_HINT_HEADERS: &[&str] = &[
    "retry-after",
    "ratelimit-reset",
    "x-ratelimit-reset-requests",
    "x-ratelimit-reset-tokens",
];

/// Backoff configuration for the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent);
        Duration::from_millis(millis.min(u64::MAX as f64) as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
}

/// Anything that can turn a prompt into generated text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError>;
}

/// HTTP gateway to an OpenAI-compatible chat completions endpoint.
pub struct Gateway {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretValue,
    key_prefix: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Gateway {
    pub fn new(
        llm: &LlmConfig,
        retry: RetryPolicy,
        api_key: SecretValue,
    ) -> Result<Self, ResearchError> {
        let client = build_client(Duration::from_secs(llm.timeout_secs))?;
        Ok(Self {
            client,
            api_base: llm.api_base.trim_end_matches('/').to_string(),
            api_key,
            key_prefix: Some(llm.api_key_prefix.clone()).filter(|prefix| !prefix.is_empty()),
            retry,
        })
    }

    /// Build from process configuration. A missing credential is not an error
    /// here; every call will fail fast with `AUTH_ERROR` instead.
    pub fn from_config(config: &crate::ResearchConfig) -> Result<Self, ResearchError> {
        let api_key = config.api_key().unwrap_or_else(|err| {
            warn!(error = %err, "API credential not configured");
            SecretValue::new("")
        });
        Self::new(&config.llm, config.retry.clone(), api_key)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ResearchError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// POST `payload` to `endpoint` (relative to the API base) with retry and backoff.
    pub async fn call(
        &self,
        endpoint: &str,
        payload: &Value,
        api_key: &SecretValue,
    ) -> Result<Value, GatewayError> {
        validate_api_key(api_key, self.key_prefix.as_deref())?;

        let url = format!("{}/{}", self.api_base, endpoint.trim_start_matches('/'));
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            debug!(%url, attempt, max_attempts, "sending request");
            let err = match self.attempt(&url, payload, api_key).await {
                Ok(body) => return Ok(body),
                Err(err) => err.with_attempts(attempt),
            };

            let remaining = max_attempts - attempt;
            if !should_retry(&err) {
                error!(
                    kind = %err.kind,
                    status = ?err.status,
                    attempt,
                    "remote call failed, not retrying"
                );
                return Err(err);
            }
            if remaining == 0 {
                error!(kind = %err.kind, attempt, "remote call failed, retry budget exhausted");
                return Err(err);
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                kind = %err.kind,
                attempt,
                remaining,
                backoff_ms = delay.as_millis() as u64,
                "remote call failed, retrying"
            );
            metrics::record_gateway_retry(err.kind.as_str());
            tokio::time::sleep(delay).await;
        }

        Err(GatewayError::new(
            GatewayErrorKind::ExecutionError,
            "retry loop exited without a result",
        ))
    }

    async fn attempt(
        &self,
        url: &str,
        payload: &Value,
        api_key: &SecretValue,
    ) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key.expose())
            .json(payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|err| {
                GatewayError::new(
                    GatewayErrorKind::ExecutionError,
                    format!("failed to decode response body: {err}"),
                )
                .with_status(status.as_u16())
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            for (header, value) in rate_limit_hints(response.headers()) {
                warn!(header, %value, "rate limit hint received");
            }
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

#[async_trait]
impl CompletionClient for Gateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        let payload = serde_json::to_value(ChatCompletionRequest::from(request)).map_err(|err| {
            GatewayError::new(GatewayErrorKind::ExecutionError, err.to_string())
        })?;
        let body = self.call("chat/completions", &payload, &self.api_key).await?;

        let parsed: ChatCompletionResponse = serde_json::from_value(body).map_err(|err| {
            GatewayError::new(
                GatewayErrorKind::ExecutionError,
                format!("unexpected response shape: {err}"),
            )
        })?;
        let text = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::new(GatewayErrorKind::ExecutionError, "response contained no text")
            })?;

        Ok(CompletionResponse {
            text,
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
        })
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, ResearchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| {
            ResearchError::InvalidConfiguration(format!("failed to create HTTP client: {err}"))
        })
}

fn should_retry(err: &GatewayError) -> bool {
    err.is_retryable() || err.status.is_some_and(|status| status >= 500)
}

fn classify_transport_error(err: reqwest::Error) -> GatewayError {
    let kind = if err.is_timeout() {
        GatewayErrorKind::TimeoutError
    } else if err.is_connect() || err.is_request() {
        GatewayErrorKind::NetworkError
    } else {
        GatewayErrorKind::ExecutionError
    };
    GatewayError::new(kind, redact_secrets(&err.to_string()))
}

fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => GatewayErrorKind::RateLimitError,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayErrorKind::AuthError,
        StatusCode::GATEWAY_TIMEOUT => GatewayErrorKind::TimeoutError,
        _ => GatewayErrorKind::ExecutionError,
    };
    let snippet: String = redact_secrets(body)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();
    GatewayError::new(kind, format!("HTTP {status}: {snippet}")).with_status(status.as_u16())
}

fn rate_limit_hints(headers: &HeaderMap) -> Vec<(&'static str, String)> {
    RATE_LIMIT_HINT_HEADERS
        .iter()
        .filter_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?;
            Some((*name, value.to_string()))
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

impl From<&CompletionRequest> for ChatCompletionRequest {
    fn from(request: &CompletionRequest) -> Self {
        Self {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
