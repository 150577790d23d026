//! Error types for parley-tool

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("tool {0} not found")]
    NotFound(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("argument {argument} should be {expected}, got {actual}")]
    TypeMismatch {
        argument: String,
        expected: String,
        actual: String,
    },

    #[error("tool {0} is already registered")]
    DuplicateName(String),
}

impl ToolError {
    pub fn execution(reason: impl Into<String>) -> Self {
        ToolError::ExecutionFailed(reason.into())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::InvalidArguments(err.to_string())
    }
}
