//! Tool execution coordinator
//!
//! Turns the model's tool-call requests into tool-role messages. Every
//! request produces exactly one message, in request order, whatever the
//! outcome; failures become text the model can read on its next turn.

use crate::error::{Result, ToolError};
use crate::registry::ToolRegistry;
use crate::types::Tool;
use parley_core::types::{Message, ToolCall};
use parley_core::Context;
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Default per-call time limit
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

const ARGS_PREVIEW_LEN: usize = 200;

/// How a single tool call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Ok,
    NotFound,
    Error,
    Timeout,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Ok => "ok",
            ToolStatus::NotFound => "not_found",
            ToolStatus::Error => "error",
            ToolStatus::Timeout => "timeout",
        }
    }
}

/// Result of running one tool call, ready to fold into a context
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub call_id: String,
    pub name: String,
    pub status: ToolStatus,
    /// Text of the tool-role message
    pub content: String,
    pub duration: Duration,
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Ok
    }

    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.call_id, &self.content)
    }
}

/// Progress of a fold, in call order
#[derive(Debug, Clone)]
pub enum ToolProgress {
    Started { call_id: String, name: String },
    Finished(ToolOutcome),
}

/// Resolves tool calls against a registry and runs them
#[derive(Debug, Clone)]
pub struct ToolCoordinator {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolCoordinator {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Set execution timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run every call in order and append one tool-role message per call
    pub async fn handle_tool_calls(&self, calls: &[ToolCall], context: &Context) -> Context {
        let folded = self
            .handle_tool_calls_with(calls, context, |_| async { Ok::<(), Infallible>(()) })
            .await;
        match folded {
            Ok(context) => context,
            Err(never) => match never {},
        }
    }

    /// Same fold as [`handle_tool_calls`](Self::handle_tool_calls), reporting
    /// progress to `observe` before and after each call.
    ///
    /// An error from `observe` stops the fold; `context` is left as it was.
    pub async fn handle_tool_calls_with<F, Fut, E>(
        &self,
        calls: &[ToolCall],
        context: &Context,
        mut observe: F,
    ) -> std::result::Result<Context, E>
    where
        F: FnMut(ToolProgress) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
    {
        let mut messages = Vec::with_capacity(calls.len());
        for call in calls {
            observe(ToolProgress::Started {
                call_id: call.id.clone(),
                name: call.name.clone(),
            })
            .await?;

            let outcome = self.execute(call).await;
            messages.push(outcome.to_message());
            observe(ToolProgress::Finished(outcome)).await?;
        }
        Ok(context.extend(messages))
    }

    /// Run a single call. Never fails: every error is rendered into the outcome.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        let start = Instant::now();

        let (status, content) = match self.registry.get(&call.name) {
            None => (
                ToolStatus::NotFound,
                ToolError::NotFound(call.name.clone()).to_string(),
            ),
            Some(tool) => match self.invoke(tool, call).await {
                Ok(value) => (ToolStatus::Ok, stringify_result(value)),
                Err(err) => {
                    let status = if matches!(err, ToolError::Timeout(_)) {
                        ToolStatus::Timeout
                    } else {
                        ToolStatus::Error
                    };
                    (status, format!("tool execution failed: {}", err))
                }
            },
        };

        let outcome = ToolOutcome {
            call_id: call.id.clone(),
            name: call.name.clone(),
            status,
            content,
            duration: start.elapsed(),
        };
        audit(call, &outcome);
        outcome
    }

    async fn invoke(&self, tool: &Tool, call: &ToolCall) -> Result<Value> {
        let args = call.argument_map().map_err(ToolError::InvalidArguments)?;
        validate_args(tool, &args)?;

        // Spawned so a panicking callback is reported instead of unwinding the round
        let handler = tool.handler();
        let task = tokio::spawn(async move { handler.call(args).await });
        let abort = task.abort_handle();

        match timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ToolError::execution(if join_err.is_panic() {
                "tool panicked".to_string()
            } else {
                join_err.to_string()
            })),
            Err(_) => {
                abort.abort();
                Err(ToolError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }
}

/// Check arguments against the tool's declared schema
pub fn validate_args(tool: &Tool, args: &Map<String, Value>) -> Result<()> {
    for arg_def in &tool.args {
        let value = args.get(&arg_def.name);

        if arg_def.required && value.is_none() {
            return Err(ToolError::MissingArgument(arg_def.name.clone()));
        }

        if let Some(value) = value {
            if !arg_def.arg_type.matches(value) {
                return Err(ToolError::TypeMismatch {
                    argument: arg_def.name.clone(),
                    expected: arg_def.arg_type.to_string(),
                    actual: value.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn stringify_result(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn audit(call: &ToolCall, outcome: &ToolOutcome) {
    let mut preview = call.arguments_string();
    if preview.len() > ARGS_PREVIEW_LEN {
        let mut cut = ARGS_PREVIEW_LEN;
        while !preview.is_char_boundary(cut) {
            cut -= 1;
        }
        preview.truncate(cut);
        preview.push_str("...");
    }

    let duration_ms = outcome.duration.as_millis() as u64;
    if outcome.is_success() {
        tracing::info!(
            target: "parley::tool_audit",
            tool = %outcome.name,
            call_id = %outcome.call_id,
            outcome = outcome.status.as_str(),
            duration_ms,
            args = %preview,
            "tool call"
        );
    } else {
        tracing::warn!(
            target: "parley::tool_audit",
            tool = %outcome.name,
            call_id = %outcome.call_id,
            outcome = outcome.status.as_str(),
            duration_ms,
            args = %preview,
            error = %outcome.content,
            "tool call"
        );
    }
}
