//! Conversation context
//!
//! The ordered message history sent to the model on every request. A
//! `Context` is a value: every mutating operation returns a new `Context`
//! and leaves the receiver untouched, so other holders never observe a change.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Message, Role};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("first message must have role system, found {0}")]
    SystemNotFirst(Role),

    #[error("tool result {call_id} does not answer a call from the preceding assistant message")]
    OrphanToolResult { call_id: String },

    #[error("tool message at position {0} has no tool_call_id")]
    MissingToolCallId(usize),
}

/// Ordered, copy-on-append conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    messages: Arc<Vec<Message>>,
}

impl Context {
    /// Start a conversation with a single system message
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: Arc::new(vec![Message::system(system_prompt)]),
        }
    }

    /// Build a context from an existing history, checking its invariants
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, ContextError> {
        let context = Self {
            messages: Arc::new(messages),
        };
        context.validate()?;
        Ok(context)
    }

    /// New context with `message` added at the end
    pub fn append(&self, message: Message) -> Self {
        self.extend(std::iter::once(message))
    }

    /// New context with all `messages` added at the end, in order
    pub fn extend(&self, messages: impl IntoIterator<Item = Message>) -> Self {
        let mut next = Vec::clone(&self.messages);
        next.extend(messages);
        Self {
            messages: Arc::new(next),
        }
    }

    /// Ordered message history
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// New context keeping only system messages, in their original order
    pub fn reset(&self) -> Self {
        let kept = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .cloned()
            .collect();
        Self {
            messages: Arc::new(kept),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Check the structural invariants of the history.
    ///
    /// The first message must be a system message, and every tool message
    /// must answer a call made by the closest preceding assistant message.
    pub fn validate(&self) -> Result<(), ContextError> {
        if let Some(first) = self.messages.first() {
            if first.role != Role::System {
                return Err(ContextError::SystemNotFirst(first.role));
            }
        }

        let mut open_calls: Vec<&str> = Vec::new();
        for (index, message) in self.messages.iter().enumerate() {
            match message.role {
                Role::Assistant => {
                    open_calls = message.tool_call_ids().collect();
                }
                Role::Tool => {
                    let call_id = message
                        .tool_call_id
                        .as_deref()
                        .ok_or(ContextError::MissingToolCallId(index))?;
                    if !open_calls.contains(&call_id) {
                        return Err(ContextError::OrphanToolResult {
                            call_id: call_id.to_string(),
                        });
                    }
                }
                Role::User | Role::System => open_calls.clear(),
            }
        }
        Ok(())
    }
}
