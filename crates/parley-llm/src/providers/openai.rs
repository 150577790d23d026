use async_trait::async_trait;
use parley_core::chat::{ChatRequest, ChatResponse};

use crate::error::Result;
use crate::provider::{BaseProvider, LLMProvider, ProviderConfig};
use crate::transformer::{LLMStream, OpenAiTransformer};

/// Public OpenAI endpoint
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider for OpenAI and any endpoint speaking the chat-completions dialect
/// (local model servers, proxies)
pub struct OpenAiProvider {
    base: BaseProvider<OpenAiTransformer>,
}

impl OpenAiProvider {
    pub fn with_config(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            base: BaseProvider::new(config, OpenAiTransformer::new())?,
        })
    }

    /// Hosted OpenAI with the given key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ProviderConfig::new("openai", OPENAI_BASE_URL).with_api_key(api_key))
    }

    pub fn configured_model(&self) -> &str {
        &self.base.config().model
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        self.base.provider_id()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.base.chat(request).await
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream> {
        self.base.chat_stream(request).await
    }
}
