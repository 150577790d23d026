use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use parley_core::chat::{ChatRequest, ChatResponse};
use reqwest::{header, Client, Response, StatusCode};
use std::sync::Arc;

use crate::error::{LLMError, Result};
use crate::provider::{LLMProvider, ProviderConfig};
use crate::transformer::{SchemaTransformer, LLMStream};

/// End-of-stream marker sent as the data of the final SSE event
const DONE_MARKER: &str = "[DONE]";

/// HTTP plumbing shared by providers; the wire format comes from `T`
pub struct BaseProvider<T: SchemaTransformer> {
    config: ProviderConfig,
    http_client: Client,
    transformer: Arc<T>,
}

impl<T: SchemaTransformer + 'static> BaseProvider<T> {
    pub fn new(config: ProviderConfig, transformer: T) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(LLMError::Config("base_url must not be empty".to_string()));
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LLMError::Config(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            transformer: Arc::new(transformer),
        })
    }

    pub fn provider_id(&self) -> &str {
        &self.config.provider_id
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Build request headers
    fn build_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        if let Some((header_name, header_value)) = self.config.auth.header() {
            let value = header::HeaderValue::from_str(&header_value)
                .map_err(|e| LLMError::Config(format!("Invalid auth header value: {}", e)))?;
            headers.insert(header_name, value);
        }

        for (key, value) in &self.config.headers {
            let header_name = header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| LLMError::Config(format!("Invalid header name: {}", e)))?;
            let header_value = header::HeaderValue::from_str(value)
                .map_err(|e| LLMError::Config(format!("Invalid header value: {}", e)))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    async fn post(&self, request: &ChatRequest) -> Result<Response> {
        let body = self.transformer.encode_request(request)?;
        let headers = self.build_headers()?;

        let response = self.http_client
            .post(self.endpoint())
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Send a non-streaming request
    pub async fn send_request(&self, request: ChatRequest) -> Result<ChatResponse> {
        log::debug!("POST {} (model={}, tools={})", self.endpoint(), request.model, request.tools.len());

        let response = self.post(&request).await?;

        let body = response
            .text()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;
        let response_data: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| LLMError::MalformedResponse(e.into()))?;

        Ok(self.transformer.decode_response(&response_data)?)
    }

    /// Send a streaming request
    ///
    /// The returned stream pulls from the HTTP body on demand, so at most one
    /// network read is buffered ahead of the consumer.
    pub async fn send_stream_request(&self, request: ChatRequest) -> Result<LLMStream> {
        let request = request.streaming();

        log::debug!("POST {} (stream, model={})", self.endpoint(), request.model);

        let response = self.post(&request).await?;

        let transformer = self.transformer.clone();
        let stream = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                let done = matches!(event, Ok(event) if event.data.trim() == DONE_MARKER);
                futures::future::ready(!done)
            })
            .filter_map(move |event| {
                let transformer = transformer.clone();
                async move {
                    match event {
                        Ok(event) => match transformer.decode_stream_event(event.data.trim()) {
                            Ok(Some(chunk)) => Some(Ok(chunk)),
                            Ok(None) => None,
                            Err(e) => Some(Err(LLMError::MalformedResponse(e))),
                        },
                        Err(e) => Some(Err(LLMError::Stream(e.to_string()))),
                    }
                }
            });

        Ok(Box::pin(stream))
    }
}

/// Map a non-success HTTP response onto the gateway error taxonomy
async fn error_from_response(response: Response) -> LLMError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let error_text = response.text().await.unwrap_or_default();

    log::warn!("provider returned {}: {}", status, error_text);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LLMError::Auth(status.to_string()),
        StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimited { retry_after },
        _ => LLMError::Api {
            status: status.as_u16(),
            message: error_text,
        },
    }
}

#[async_trait]
impl<T: SchemaTransformer + 'static> LLMProvider for BaseProvider<T> {
    fn provider_id(&self) -> &str {
        self.provider_id()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.send_request(request).await
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LLMStream> {
        self.send_stream_request(request).await
    }
}
