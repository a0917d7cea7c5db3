use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::gateway::RetryPolicy;
use crate::{ResearchError, SecretValue};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_API_KEY_PREFIX: &str = "sk-";
const DEFAULT_LOG_DIR: &str = "data/logs";
const ENABLED_SUFFIX: &str = "_ENABLED";

/// Top-level runtime configuration, read once at process start.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub llm: LlmConfig,
    pub retry: RetryPolicy,
    pub log_dir: PathBuf,
    toggles: HashMap<String, bool>,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Name of the environment variable that holds the bearer credential.
    pub api_key_env: String,
    /// Expected credential prefix; empty disables the check.
    pub api_key_prefix: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1500,
            timeout_secs: 60,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key_prefix: DEFAULT_API_KEY_PREFIX.to_string(),
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            retry: RetryPolicy::default(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            toggles: HashMap::new(),
        }
    }
}

impl ResearchConfig {
    pub fn from_env() -> Result<Self, ResearchError> {
        Self::from_vars(env::vars())
    }

    /// Build configuration from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ResearchError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let get = |key: &str| {
            vars.get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = LlmConfig::default();
        let llm = LlmConfig {
            api_base: get("COMPANYSCOUT_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            model: get("COMPANYSCOUT_MODEL").unwrap_or(defaults.model),
            max_tokens: parse_or(
                "COMPANYSCOUT_MAX_TOKENS",
                get("COMPANYSCOUT_MAX_TOKENS"),
                defaults.max_tokens,
            )?,
            timeout_secs: parse_or(
                "COMPANYSCOUT_TIMEOUT_SECS",
                get("COMPANYSCOUT_TIMEOUT_SECS"),
                defaults.timeout_secs,
            )?,
            api_key_env: get("COMPANYSCOUT_API_KEY_ENV").unwrap_or(defaults.api_key_env),
            api_key_prefix: vars
                .get("COMPANYSCOUT_API_KEY_PREFIX")
                .map(|value| value.trim().to_string())
                .unwrap_or(defaults.api_key_prefix),
        };

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(
                "API_MAX_RETRIES",
                get("API_MAX_RETRIES"),
                retry_defaults.max_attempts,
            )?,
            initial_delay_ms: parse_or(
                "API_RETRY_DELAY_MS",
                get("API_RETRY_DELAY_MS"),
                retry_defaults.initial_delay_ms,
            )?,
            backoff_factor: parse_or(
                "API_BACKOFF_FACTOR",
                get("API_BACKOFF_FACTOR"),
                retry_defaults.backoff_factor,
            )?,
        };
        if retry.max_attempts == 0 {
            return Err(ResearchError::InvalidConfiguration(
                "API_MAX_RETRIES must be at least 1".into(),
            ));
        }
        if retry.backoff_factor < 1.0 {
            return Err(ResearchError::InvalidConfiguration(
                "API_BACKOFF_FACTOR must be >= 1".into(),
            ));
        }

        let log_dir = get("COMPANYSCOUT_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

        let mut toggles = HashMap::new();
        for (key, value) in vars.iter() {
            let Some(prefix) = key.strip_suffix(ENABLED_SUFFIX) else {
                continue;
            };
            if prefix.is_empty() {
                continue;
            }
            match parse_bool(value) {
                Some(flag) => {
                    toggles.insert(prefix.to_ascii_uppercase(), flag);
                }
                None => {
                    tracing::warn!(%key, %value, "ignoring non-boolean provider toggle");
                }
            }
        }

        Ok(Self {
            llm,
            retry,
            log_dir,
            toggles,
        })
    }

    /// Whether `<PROVIDERNAME>_ENABLED` allows the named provider. Unset means enabled.
    pub fn provider_enabled(&self, provider: &str) -> bool {
        self.toggles
            .get(&toggle_key(provider))
            .copied()
            .unwrap_or(true)
    }

    /// Resolve the configured API credential (from environment only).
    pub fn api_key(&self) -> Result<SecretValue, ResearchError> {
        crate::require_env(&self.llm.api_key_env)
    }

    pub fn with_provider_enabled(mut self, provider: &str, enabled: bool) -> Self {
        self.toggles.insert(toggle_key(provider), enabled);
        self
    }
}

fn toggle_key(provider: &str) -> String {
    provider
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ResearchError> {
    match raw {
        Some(value) => value.parse::<T>().map_err(|_| {
            ResearchError::InvalidConfiguration(format!("{key} has invalid value `{value}`"))
        }),
        None => Ok(default),
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
