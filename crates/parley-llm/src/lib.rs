//! parley-llm - model gateway for Parley
//!
//! - `ModelGateway`: the narrow seam the orchestration loop calls
//! - `LLMProvider` and `BaseProvider`: HTTP round trips to a provider
//! - `OpenAiTransformer`: chat-completions wire format, including SSE chunks

pub mod error;
pub mod gateway;
pub mod provider;
pub mod providers;
pub mod transformer;

pub use error::{ConversionError, LLMError, Result};
pub use gateway::{Completion, ModelGateway, ProviderGateway, StreamHandle};
pub use provider::{AuthConfig, BaseProvider, LLMProvider, ProviderConfig, DEFAULT_MODEL};
pub use providers::OpenAiProvider;
pub use transformer::{LLMStream, OpenAiTransformer, SchemaTransformer};
