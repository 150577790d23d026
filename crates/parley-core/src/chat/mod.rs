//! Provider-facing request, response and stream types

pub mod chunk;
pub mod request;
pub mod response;

pub use chunk::{ChatChunk, FinishReason};
pub use request::ChatRequest;
pub use response::{ChatResponse, ChatUsage};
