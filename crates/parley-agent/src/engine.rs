//! Reason-act-answer orchestration loop
//!
//! One round turns a user message into an assistant answer. While tools are
//! offered the loop first asks the model, without streaming, whether it
//! wants any; requested tools run and the loop asks again. Once the model
//! answers directly a fresh streaming call produces the text the consumer
//! sees. The context only changes when the whole round succeeds.

use std::sync::Arc;

use futures::StreamExt;
use parley_core::chat::{ChatChunk, ChatUsage};
use parley_core::types::{Message, ToolDefinition};
use parley_core::Context;
use parley_llm::{ModelGateway, StreamHandle};
use parley_tool::{ToolCoordinator, ToolProgress};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::events::AgentEvent;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model id passed to the gateway; `None` uses the gateway default
    pub model: Option<String>,
    /// Maximum reason/act cycles before a round is abandoned
    pub max_rounds: usize,
    /// Capacity of the per-round event channel
    pub event_buffer: usize,
    pub retry: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_rounds: 5,
            event_buffer: 32,
            retry: RetryPolicy::default(),
        }
    }
}

/// Where a round currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reasoning,
    Acting,
    Answering,
}

pub struct AgentLoop {
    config: AgentConfig,
    gateway: Arc<dyn ModelGateway>,
    coordinator: ToolCoordinator,
}

impl AgentLoop {
    pub fn new(config: AgentConfig, gateway: Arc<dyn ModelGateway>, coordinator: ToolCoordinator) -> Self {
        Self {
            config,
            gateway,
            coordinator,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &ToolCoordinator {
        &self.coordinator
    }

    /// Run a round, starting it over on transient gateway failures.
    ///
    /// Returns the context with the user message, any tool exchange and the
    /// final assistant message appended. On error the caller keeps `context`.
    pub async fn run_with_retry(
        &self,
        context: &Context,
        user_text: &str,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Result<Context> {
        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            match self.run_round(context, user_text, events, cancel).await {
                Ok(updated) => return Ok(updated),
                Err(err) if policy.should_retry(&err, attempt) => {
                    let delay = policy.delay_for(&err);
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "round failed, retrying"
                    );
                    send(
                        events,
                        AgentEvent::Retrying {
                            attempt,
                            max_attempts: policy.max_attempts,
                            reason: err.user_message(),
                        },
                    )
                    .await?;

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run one round without retrying
    pub async fn run_round(
        &self,
        context: &Context,
        user_text: &str,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Result<Context> {
        let model = self.config.model.as_deref();
        let tools = self.coordinator.registry().definitions();
        let mut context = context.append(Message::user(user_text));
        let mut usage = ChatUsage::default();
        let mut cycles = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if tools.is_empty() {
                break;
            }

            debug!(phase = ?Phase::Reasoning, cycle = cycles, tools = tools.len(), "requesting completion");
            let completion = tokio::select! {
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                result = self.gateway.request_completion(model, &context, &tools) => result?,
            };
            usage.add(&completion.usage);

            if !completion.wants_tools() {
                break;
            }
            if cycles >= self.config.max_rounds {
                warn!(max_rounds = self.config.max_rounds, "model kept requesting tools");
                return Err(AgentError::RoundLimitExceeded {
                    max_rounds: self.config.max_rounds,
                });
            }
            cycles += 1;

            debug!(phase = ?Phase::Acting, calls = completion.tool_calls.len(), "running tools");
            context = context.append(Message::tool_request(completion.tool_calls.clone()));

            context = self
                .coordinator
                .handle_tool_calls_with(&completion.tool_calls, &context, |progress| {
                    send(events, progress_event(progress))
                })
                .await?;
        }

        debug!(phase = ?Phase::Answering, messages = context.len(), "requesting stream");
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = self.gateway.request_stream(model, &context, &tools) => result?,
        };
        let answer = self.drain(stream, events, cancel, &mut usage).await?;

        info!(
            cycles,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            answer_len = answer.len(),
            "round complete"
        );
        Ok(context.append(Message::assistant(answer, None)))
    }

    /// Forward content chunks as they arrive and return their concatenation
    async fn drain(
        &self,
        mut stream: StreamHandle,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
        usage: &mut ChatUsage,
    ) -> Result<String> {
        let mut answer = String::new();
        let mut delivered = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stream.close();
                    return Err(AgentError::Cancelled);
                }
                next = stream.next() => next,
            };

            match next {
                None => break,
                Some(Err(err)) => {
                    stream.close();
                    return Err(err.into());
                }
                Some(Ok(ChatChunk::Content { text })) => {
                    if text.is_empty() {
                        continue;
                    }
                    answer.push_str(&text);
                    delivered += 1;
                    if let Err(err) = send(events, AgentEvent::Chunk { text }).await {
                        stream.close();
                        return Err(err);
                    }
                }
                Some(Ok(ChatChunk::Usage {
                    input_tokens,
                    output_tokens,
                })) => usage.add(&ChatUsage::new(input_tokens, output_tokens)),
                Some(Ok(_)) => {}
            }
        }

        if delivered == 0 {
            return Err(AgentError::EmptyResponse);
        }
        Ok(answer)
    }

    /// Definitions offered to the model on every request
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.coordinator.registry().definitions()
    }
}

fn progress_event(progress: ToolProgress) -> AgentEvent {
    match progress {
        ToolProgress::Started { call_id, name } => AgentEvent::ToolCall { call_id, name },
        ToolProgress::Finished(outcome) => AgentEvent::ToolResult {
            success: outcome.is_success(),
            call_id: outcome.call_id,
            name: outcome.name,
        },
    }
}

async fn send(events: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<()> {
    events.send(event).await.map_err(|_| AgentError::ChannelClosed)
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("config", &self.config)
            .field("tools", &self.coordinator.registry().names())
            .finish()
    }
}
