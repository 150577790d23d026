//! Chat session
//!
//! A session owns its context and runs at most one round at a time. Each
//! round is a spawned task that talks back only through its event channel;
//! the session adopts the new context when the round completes.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parley_core::Context;
use parley_observability::create_round_span;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument};

use crate::engine::AgentLoop;
use crate::error::{AgentError, Result};
use crate::events::AgentEvent;

struct InFlight {
    round_id: String,
    cancel: CancellationToken,
    task: JoinHandle<Result<Context>>,
}

/// Consumer side of a running round
#[derive(Debug)]
pub struct RoundHandle {
    round_id: String,
    events: mpsc::Receiver<AgentEvent>,
    cancel: CancellationToken,
}

impl RoundHandle {
    pub fn round_id(&self) -> &str {
        &self.round_id
    }

    /// Next event, or `None` once the round has finished and every event was read
    pub async fn next_event(&mut self) -> Option<AgentEvent> {
        self.events.recv().await
    }

    /// Ask the round to stop; safe to call repeatedly or after it finished
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

pub struct ChatSession {
    id: String,
    agent: Arc<AgentLoop>,
    context: Context,
    in_flight: Option<InFlight>,
}

impl ChatSession {
    pub fn new(agent: Arc<AgentLoop>, system_prompt: impl Into<String>) -> Self {
        Self::with_context(agent, Context::new(system_prompt))
    }

    pub fn with_context(agent: Arc<AgentLoop>, context: Context) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent,
            context,
            in_flight: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Whether a round is running or finished without its result being taken
    pub fn is_busy(&mut self) -> bool {
        self.settle()
    }

    /// Start a round for `text`.
    ///
    /// Rejected with [`AgentError::RoundInProgress`] while another round of
    /// this session is still running.
    pub fn submit(&mut self, text: impl Into<String>) -> Result<RoundHandle> {
        if self.settle() {
            return Err(AgentError::RoundInProgress);
        }

        let text = text.into();
        let round_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.agent.config().event_buffer.max(1));
        let cancel = CancellationToken::new();

        let agent = self.agent.clone();
        let context = self.context.clone();
        let token = cancel.clone();
        let span = create_round_span(&self.id, &round_id);

        let task = tokio::spawn(
            async move {
                debug!(chars = text.len(), "round started");
                let result = AssertUnwindSafe(agent.run_with_retry(&context, &text, &tx, &token))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(AgentError::TaskFailed(panic_reason(payload.as_ref()))));
                let terminal = match &result {
                    Ok(updated) => AgentEvent::Complete {
                        context: updated.clone(),
                    },
                    Err(err) => {
                        error!(error = %err, "round failed");
                        AgentEvent::error(err.user_message())
                    }
                };
                // the consumer may already be gone
                let _ = tx.send(terminal).await;
                result
            }
            .instrument(span),
        );

        self.in_flight = Some(InFlight {
            round_id: round_id.clone(),
            cancel: cancel.clone(),
            task,
        });

        Ok(RoundHandle {
            round_id,
            events: rx,
            cancel,
        })
    }

    /// Adopt the context carried by a `Complete` event
    pub fn apply_completion(&mut self, context: Context) {
        self.context = context;
        self.in_flight = None;
    }

    /// Wait for the in-flight round and adopt its context on success
    pub async fn wait(&mut self) -> Result<Context> {
        let Some(round) = self.in_flight.take() else {
            return Ok(self.context.clone());
        };

        match round.task.await {
            Ok(Ok(context)) => {
                self.context = context.clone();
                Ok(context)
            }
            Ok(Err(err)) => Err(err),
            Err(join_err) if join_err.is_cancelled() => Err(AgentError::Cancelled),
            Err(join_err) => Err(AgentError::TaskFailed(join_err.to_string())),
        }
    }

    /// Submit `text`, pass every event to `on_event`, and wait for the result
    pub async fn send<F>(&mut self, text: impl Into<String>, mut on_event: F) -> Result<Context>
    where
        F: FnMut(&AgentEvent),
    {
        let mut handle = self.submit(text)?;
        while let Some(event) = handle.next_event().await {
            on_event(&event);
        }
        self.wait().await
    }

    /// Stop the in-flight round, if any. The context is left as it was.
    pub fn cancel(&mut self) {
        if let Some(round) = self.in_flight.take() {
            debug!(round_id = %round.round_id, "cancelling round");
            round.cancel.cancel();
        }
    }

    /// Forget the conversation but keep the system instructions
    pub fn reset(&mut self) {
        self.cancel();
        self.context = self.context.reset();
    }

    /// Clears a finished round, adopting its context if it succeeded.
    /// Returns whether a round is still outstanding.
    fn settle(&mut self) -> bool {
        let Some(round) = self.in_flight.as_mut() else {
            return false;
        };
        if !round.task.is_finished() {
            return true;
        }
        if let Some(Ok(Ok(context))) = (&mut round.task).now_or_never() {
            self.context = context;
        }
        self.in_flight = None;
        false
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("round panicked: {}", text)
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("round panicked: {}", text)
    } else {
        "round panicked".to_string()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("messages", &self.context.len())
            .field("in_flight", &self.in_flight.as_ref().map(|r| r.round_id.as_str()))
            .finish()
    }
}
