//! parley-core - conversation data model
//!
//! Messages, tool calls, the copy-on-append [`Context`] and the request and
//! response types exchanged with a model provider.

pub mod chat;
pub mod context;
pub mod types;

pub use chat::{ChatChunk, ChatRequest, ChatResponse, ChatUsage, FinishReason};
pub use context::{Context, ContextError};
pub use types::{Message, Role, ToolCall, ToolDefinition};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
