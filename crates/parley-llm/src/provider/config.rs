use std::collections::HashMap;
use std::time::Duration;

/// Model used when no explicit model is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How requests authenticate against the provider
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthConfig {
    /// Key sent as `Authorization: Bearer <key>`
    ApiKey { key: String },
    /// Local or proxy endpoints that need no credentials
    #[default]
    None,
}

impl AuthConfig {
    pub fn header(&self) -> Option<(&'static str, String)> {
        match self {
            AuthConfig::ApiKey { key } => Some(("Authorization", format!("Bearer {}", key))),
            AuthConfig::None => None,
        }
    }
}

// keys never reach log output
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthConfig::ApiKey { .. } => f.write_str("ApiKey(****)"),
            AuthConfig::None => f.write_str("None"),
        }
    }
}

/// Connection settings for one OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_id: String,
    /// Base URL up to, not including, `/chat/completions`
    pub base_url: String,
    pub auth: AuthConfig,
    pub model: String,
    pub timeout: Duration,
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
}

impl ProviderConfig {
    pub fn new(provider_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            base_url: base_url.into(),
            auth: AuthConfig::None,
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            headers: HashMap::new(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.auth = AuthConfig::ApiKey { key: key.into() };
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }
}
