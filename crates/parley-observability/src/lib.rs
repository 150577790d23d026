//! Parley observability
//!
//! Subscriber setup for the binaries and the spans the agent runs rounds in.
//! Library crates only emit through `tracing` / `log` macros.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::LoggingConfig;
pub use error::{ObservabilityError, Result};
pub use logging::{build_filter, create_round_span, create_session_span, LogManager};

/// Convenience imports
pub mod prelude {
    //! Commonly used items

    pub use crate::{create_round_span, create_session_span, LogManager, LoggingConfig};
    pub use tracing::{debug, error, info, instrument, trace, warn, Instrument, Span};
}
