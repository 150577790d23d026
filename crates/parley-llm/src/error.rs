use thiserror::Error;

/// Unified error type for model gateway operations
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("network error: {0}")]
    Network(String),

    #[error("api error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("malformed response: {0}")]
    MalformedResponse(#[from] ConversionError),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<u64> },
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(", retry after {}s", secs),
        None => String::new(),
    }
}

impl LLMError {
    /// Whether a whole-round retry may succeed.
    ///
    /// Network failures, dropped streams, rate limiting and server-side
    /// (5xx / 408) errors are transient. Authentication, malformed responses,
    /// client errors and configuration problems are not.
    pub fn is_transient(&self) -> bool {
        match self {
            LLMError::Network(_) | LLMError::Stream(_) | LLMError::RateLimited { .. } => true,
            LLMError::Api { status, .. } => *status >= 500 || *status == 408,
            LLMError::Auth(_) | LLMError::MalformedResponse(_) | LLMError::Config(_) => false,
        }
    }

    /// Retry-after hint in seconds, if the provider sent one
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            LLMError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Error during schema transformation
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;
