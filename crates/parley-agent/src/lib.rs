//! parley-agent - orchestration for Parley
//!
//! - `AgentLoop`: the reason-act-answer state machine over a model gateway
//!   and a tool coordinator
//! - `RetryPolicy`: whole-round retry on transient gateway failures
//! - `ChatSession`: per-session context ownership, one round in flight,
//!   events delivered over a bounded channel

pub mod engine;
pub mod error;
pub mod events;
pub mod retry;
pub mod session;

pub use engine::{AgentConfig, AgentLoop, Phase};
pub use error::{AgentError, Result};
pub use events::AgentEvent;
pub use retry::RetryPolicy;
pub use session::{ChatSession, RoundHandle};
