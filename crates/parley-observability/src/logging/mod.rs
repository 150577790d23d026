//! Structured logging
//!
//! Installs the global `tracing` subscriber and provides the spans used to
//! correlate log lines with a chat session and a single round.

use tracing_subscriber::{
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;
use crate::error::{ObservabilityError, Result};

/// Handle used to swap the active filter
type ReloadHandle = Handle<EnvFilter, Registry>;

/// Owner of the installed subscriber
#[derive(Debug)]
pub struct LogManager {
    config: LoggingConfig,
    reload_handle: ReloadHandle,
}

impl LogManager {
    /// Install the global subscriber, writing to stderr.
    ///
    /// Only one subscriber can exist per process; a second call returns
    /// [`ObservabilityError::AlreadyInitialized`] instead of panicking.
    pub fn init(config: LoggingConfig) -> Result<Self> {
        let filter = build_filter(&config)?;
        let (filter, reload_handle) = reload::Layer::new(filter);
        let registry = tracing_subscriber::registry().with(filter);

        let installed = if config.json_format {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .json()
                .with_target(config.include_target)
                .with_line_number(config.include_line_number)
                .with_current_span(true);
            registry.with(layer).try_init()
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.include_target)
                .with_line_number(config.include_line_number)
                .with_ansi(config.ansi_colors);
            registry.with(layer).try_init()
        };
        installed.map_err(|_| ObservabilityError::AlreadyInitialized)?;

        tracing::debug!(
            target: "parley_observability",
            level = %config.level,
            json = config.json_format,
            "log manager initialized"
        );

        Ok(Self {
            config,
            reload_handle,
        })
    }

    /// Replace the active level without reinstalling the subscriber
    pub fn update_level(&mut self, level: &str) -> Result<()> {
        let next = LoggingConfig {
            level: level.to_string(),
            ..self.config.clone()
        };
        let filter = build_filter(&next)?;

        self.reload_handle
            .modify(|current| *current = filter)
            .map_err(|e| ObservabilityError::logging(format!("Failed to update log level: {}", e)))?;
        self.config = next;

        tracing::info!(target: "parley_observability", level, "log level updated");
        Ok(())
    }

    /// Currently applied configuration
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}

/// Build the env filter from a level plus module overrides
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| ObservabilityError::config(format!("Invalid log level: {}", e)))?;

    for (module, level) in &config.module_levels {
        let directive = format!("{}={}", module, level)
            .parse()
            .map_err(|e| ObservabilityError::config(format!("Invalid directive: {}", e)))?;
        filter = filter.add_directive(directive);
    }

    Ok(filter)
}

/// Span covering a whole chat session
pub fn create_session_span(session_id: &str) -> tracing::Span {
    tracing::info_span!("session", session_id = %session_id)
}

/// Span covering one round (one user turn) within a session
pub fn create_round_span(session_id: &str, round_id: &str) -> tracing::Span {
    tracing::info_span!("round", session_id = %session_id, round_id = %round_id)
}
