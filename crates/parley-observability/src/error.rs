//! Error types for parley-observability

/// Observability error type
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ObservabilityError {
    /// Invalid level or filter directive
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the level or directive
        message: String,
    },

    /// Subscriber could not be installed or updated
    #[error("Logging error: {message}")]
    Logging {
        /// Reason reported by the subscriber
        message: String,
    },

    /// A global subscriber is already installed
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

impl ObservabilityError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a logging error
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

/// Result alias for this crate
pub type Result<T> = std::result::Result<T, ObservabilityError>;
