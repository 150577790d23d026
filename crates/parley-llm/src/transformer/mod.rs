pub mod openai;

pub use openai::OpenAiTransformer;

use futures::Stream;
use parley_core::chat::{ChatChunk, ChatRequest, ChatResponse};
use serde_json::Value;
use std::pin::Pin;

use crate::error::ConversionError;

/// Chunks of a streamed answer as they arrive from the provider
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, crate::LLMError>> + Send>>;

/// Translation between Parley's chat types and a provider wire format
pub trait SchemaTransformer: Send + Sync {
    fn encode_request(&self, request: &ChatRequest) -> Result<Value, ConversionError>;

    fn decode_response(&self, body: &Value) -> Result<ChatResponse, ConversionError>;

    /// Decode the data of one server-sent event; `None` for events that
    /// carry nothing of interest
    fn decode_stream_event(&self, data: &str) -> Result<Option<ChatChunk>, ConversionError>;
}
