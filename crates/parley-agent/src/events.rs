use parley_core::Context;
use serde::{Deserialize, Serialize};

/// Event delivered from a running round to its consumer.
///
/// Every round ends with exactly one terminal event, `Complete` or `Error`.
/// Only `Chunk` text belongs to the answer; when a `Retrying` event arrives,
/// chunks received before it belong to the abandoned attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Incremental answer text
    Chunk { text: String },
    /// Tool about to run
    ToolCall { call_id: String, name: String },
    /// Tool finished
    ToolResult {
        call_id: String,
        name: String,
        success: bool,
    },
    /// Round failed transiently and will start over
    Retrying {
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    /// Round finished; carries the updated context
    Complete { context: Context },
    /// Round failed; `message` is safe to show to the user
    Error { message: String },
}

impl AgentEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(AgentEvent::Complete { context: Context::new("sys") }.is_terminal());
        assert!(AgentEvent::error("boom").is_terminal());
        assert!(!AgentEvent::chunk("hi").is_terminal());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(AgentEvent::chunk("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "chunk", "text": "hi"}));
    }
}
