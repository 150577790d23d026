use parley_llm::LLMError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("gateway error: {0}")]
    Gateway(#[from] LLMError),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("no final answer after {max_rounds} tool rounds")]
    RoundLimitExceeded { max_rounds: usize },

    #[error("cancelled")]
    Cancelled,

    #[error("a round is already in progress for this session")]
    RoundInProgress,

    #[error("event channel closed")]
    ChannelClosed,

    #[error("round task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Whether retrying the whole round may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::Gateway(err) if err.is_transient())
    }

    /// Text safe to show to the person chatting.
    ///
    /// Provider payloads never appear here; the one provider detail that is
    /// surfaced on purpose is the rate-limit retry hint.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Gateway(err) => match err {
                LLMError::Network(_) => "Could not reach the model provider. Please try again.".to_string(),
                LLMError::Auth(_) => {
                    "Authentication with the model provider failed. Check your API key.".to_string()
                }
                LLMError::RateLimited { retry_after: Some(secs) } => format!(
                    "The model provider is rate limiting requests. Try again in {} seconds.",
                    secs
                ),
                LLMError::RateLimited { retry_after: None } => {
                    "The model provider is rate limiting requests. Try again shortly.".to_string()
                }
                LLMError::MalformedResponse(_) => {
                    "The model provider sent a response that could not be understood.".to_string()
                }
                LLMError::Api { status, .. } => {
                    format!("The model provider returned an error (HTTP {}).", status)
                }
                LLMError::Stream(_) => "The response stream was interrupted.".to_string(),
                LLMError::Config(_) => "The model provider is not configured correctly.".to_string(),
            },
            AgentError::EmptyResponse => "The model returned an empty response.".to_string(),
            AgentError::RoundLimitExceeded { max_rounds } => format!(
                "Stopped after {} rounds of tool calls without a final answer.",
                max_rounds
            ),
            AgentError::Cancelled => "The request was cancelled.".to_string(),
            AgentError::RoundInProgress => "Please wait for the current reply to finish.".to_string(),
            AgentError::ChannelClosed | AgentError::TaskFailed(_) => {
                "Something went wrong while generating the reply.".to_string()
            }
        }
    }
}
