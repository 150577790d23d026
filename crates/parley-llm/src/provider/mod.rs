pub mod base;
pub mod config;

pub use base::BaseProvider;
pub use config::{AuthConfig, ProviderConfig, DEFAULT_MODEL};

use async_trait::async_trait;
use parley_core::chat::{ChatRequest, ChatResponse};

use crate::error::Result;
use crate::transformer::LLMStream;

/// Raw provider seam: one non-streaming and one streaming round trip.
///
/// Providers never retry; retry policy belongs to the caller.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Stream the answer; the request is sent with streaming enabled
    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream>;
}
