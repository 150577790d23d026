/// One item of a streamed answer.
///
/// Only `Content` carries answer text. The other variants are provider
/// bookkeeping that consumers may ignore.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatChunk {
    Content { text: String },
    /// A streamed tool call began
    ToolCallStart { call_id: String, name: String },
    ToolCallDelta { call_id: String, arguments_delta: String },
    Usage { input_tokens: u32, output_tokens: u32 },
    Finish { reason: FinishReason },
}

impl ChatChunk {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    pub fn content_text(&self) -> Option<&str> {
        match self {
            Self::Content { text } => Some(text),
            _ => None,
        }
    }
}

/// Why the provider stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

impl FinishReason {
    /// Wire name as used by chat-completions APIs; unknown names read as `Stop`
    pub fn parse(s: &str) -> Self {
        match s {
            "length" => Self::Length,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Stop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
