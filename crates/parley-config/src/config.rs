use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use parley_observability::LoggingConfig;

/// Top-level configuration, stored as JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentSettings,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject settings the runtime cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.base_url cannot be empty".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model cannot be empty".to_string()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.agent.max_rounds == 0 {
            return Err(ConfigError::Validation(
                "agent.max_rounds must be greater than 0".to_string(),
            ));
        }
        if self.agent.event_buffer == 0 {
            return Err(ConfigError::Validation(
                "agent.event_buffer must be greater than 0".to_string(),
            ));
        }
        if self.agent.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "agent.retry.max_attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Model provider connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub provider_id: String,
    pub base_url: String,
    /// Explicit key; takes precedence over `api_key_env`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub model: String,
    pub timeout_secs: u64,
    pub headers: HashMap<String, String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_id: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            headers: HashMap::new(),
        }
    }
}

impl LlmConfig {
    /// The configured key, else the one in `api_key_env`
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentSettings {
    pub max_rounds: usize,
    pub tool_timeout_secs: u64,
    pub event_buffer: usize,
    pub system_prompt: String,
    pub retry: RetrySettings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            tool_timeout_secs: 30,
            event_buffer: 32,
            system_prompt: "You are a helpful assistant.".to_string(),
            retry: RetrySettings::default(),
        }
    }
}

/// Whole-round retry on transient provider failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub respect_retry_after: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_ms: 1000,
            respect_retry_after: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
