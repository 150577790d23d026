//! Model gateway
//!
//! The narrow seam the orchestration loop talks to: one non-streaming call
//! used to detect tool-use intent and one streaming call that delivers the
//! answer. Gateways never retry; a failed call is reported as is.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use async_trait::async_trait;
use futures::Stream;
use parley_core::chat::{ChatChunk, ChatRequest, ChatUsage};
use parley_core::types::{ToolCall, ToolDefinition};
use parley_core::Context;

use crate::error::{LLMError, Result};
use crate::provider::{LLMProvider, DEFAULT_MODEL};
use crate::transformer::LLMStream;

/// Outcome of a non-streaming round trip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Empty when the model chose to answer directly
    pub tool_calls: Vec<ToolCall>,
    pub usage: ChatUsage,
}

impl Completion {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Abstraction over "ask the model for a completion"
///
/// `model` of `None` selects the gateway's configured default.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn request_completion(
        &self,
        model: Option<&str>,
        context: &Context,
        tools: &[ToolDefinition],
    ) -> Result<Completion>;

    async fn request_stream(
        &self,
        model: Option<&str>,
        context: &Context,
        tools: &[ToolDefinition],
    ) -> Result<StreamHandle>;
}

/// Gateway backed by an [`LLMProvider`]
#[derive(Clone)]
pub struct ProviderGateway {
    provider: Arc<dyn LLMProvider>,
    default_model: String,
}

impl ProviderGateway {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    fn build_request(
        &self,
        model: Option<&str>,
        context: &Context,
        tools: &[ToolDefinition],
    ) -> ChatRequest {
        let model = model.unwrap_or(&self.default_model);
        ChatRequest::for_context(model, context).with_tools(tools.iter().cloned())
    }
}

#[async_trait]
impl ModelGateway for ProviderGateway {
    async fn request_completion(
        &self,
        model: Option<&str>,
        context: &Context,
        tools: &[ToolDefinition],
    ) -> Result<Completion> {
        let request = self.build_request(model, context, tools);
        log::debug!(
            "[{}] completion request: model={}, messages={}, tools={}",
            self.provider.provider_id(),
            request.model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self.provider.chat(request).await?;
        Ok(Completion {
            text: response.text().to_string(),
            tool_calls: response.tool_calls().to_vec(),
            usage: response.usage,
        })
    }

    async fn request_stream(
        &self,
        model: Option<&str>,
        context: &Context,
        tools: &[ToolDefinition],
    ) -> Result<StreamHandle> {
        let request = self.build_request(model, context, tools).streaming();
        log::debug!(
            "[{}] stream request: model={}, messages={}",
            self.provider.provider_id(),
            request.model,
            request.messages.len()
        );

        let stream = self.provider.chat_stream(request).await?;
        Ok(StreamHandle::new(stream))
    }
}

/// Forward-only, non-restartable sequence of stream chunks.
///
/// Closing drops the underlying provider stream, which releases the HTTP
/// connection. `close` may be called any number of times, before or after
/// the stream is exhausted; once closed the handle yields `None`.
pub struct StreamHandle {
    inner: Option<LLMStream>,
}

impl StreamHandle {
    pub fn new(stream: LLMStream) -> Self {
        Self {
            inner: Some(stream),
        }
    }

    /// Handle over a fixed list of chunks
    pub fn from_chunks(chunks: Vec<std::result::Result<ChatChunk, LLMError>>) -> Self {
        Self::new(Box::pin(futures::stream::iter(chunks)))
    }

    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            log::debug!("stream handle closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for StreamHandle {
    type Item = Result<ChatChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let Some(stream) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match stream.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_handle_yields_in_order() {
        let mut handle = StreamHandle::from_chunks(vec![
            Ok(ChatChunk::content("a")),
            Ok(ChatChunk::content("b")),
        ]);

        let mut seen = Vec::new();
        while let Some(chunk) = handle.next().await {
            seen.push(chunk.unwrap().content_text().unwrap_or_default().to_string());
        }
        assert_eq!(seen, vec!["a", "b"]);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut handle = StreamHandle::from_chunks(vec![Ok(ChatChunk::content("a"))]);
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert!(handle.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_after_exhaustion() {
        let mut handle = StreamHandle::from_chunks(vec![]);
        assert!(handle.next().await.is_none());
        handle.close();
        assert!(handle.is_closed());
    }
}
