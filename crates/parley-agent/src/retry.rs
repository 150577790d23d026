//! Whole-round retry policy
//!
//! A failed round is started again from its pre-round context, never resumed.
//! Delay between attempts is constant.

use std::time::Duration;

use crate::error::AgentError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub delay: Duration,
    /// Wait at least as long as a rate-limit `retry_after` hint
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
            respect_retry_after: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Whether `attempt` (1-based) failing with `error` should be followed by another
    pub fn should_retry(&self, error: &AgentError, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }

    /// Pause before the next attempt
    pub fn delay_for(&self, error: &AgentError) -> Duration {
        let hint = match error {
            AgentError::Gateway(err) if self.respect_retry_after => err.retry_after(),
            _ => None,
        };
        match hint {
            Some(secs) => self.delay.max(Duration::from_secs(secs)),
            None => self.delay,
        }
    }
}
