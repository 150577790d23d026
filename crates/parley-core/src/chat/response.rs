use crate::chat::FinishReason;
use crate::types::{Message, ToolCall};

/// Non-streaming provider answer
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    /// Assistant message; its `tool_calls` are the model's tool requests
    pub message: Message,
    pub usage: ChatUsage,
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    pub fn new(id: impl Into<String>, model: impl Into<String>, message: Message) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            message,
            usage: ChatUsage::default(),
            finish_reason: FinishReason::Stop,
        }
    }

    pub fn with_usage(mut self, usage: ChatUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }

    pub fn text(&self) -> &str {
        self.message.text()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message.tool_calls.as_deref().unwrap_or_default()
    }
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ChatUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn add(&mut self, other: &ChatUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_calls_come_from_message() {
        let call = ToolCall::new("call_1", "calculator", json!({"expression": "2+2"}));
        let response = ChatResponse::new("resp_1", "gpt-4o-mini", Message::tool_request(vec![call.clone()]));
        assert_eq!(response.tool_calls(), &[call]);

        let plain = ChatResponse::new("resp_2", "gpt-4o-mini", Message::assistant("Hi", None));
        assert!(plain.tool_calls().is_empty());
        assert_eq!(plain.text(), "Hi");
    }

    #[test]
    fn test_usage_accumulates() {
        let mut usage = ChatUsage::new(10, 2);
        usage.add(&ChatUsage::new(5, 3));
        assert_eq!(usage, ChatUsage::new(15, 5));
        assert_eq!(usage.total(), 20);
    }
}
