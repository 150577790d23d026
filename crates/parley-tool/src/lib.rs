//! parley-tool - Tool registry and execution for Parley
//!
//! This crate provides:
//! - Tool definitions with a declarative argument schema
//! - An ordered, name-unique tool registry
//! - The coordinator that runs model tool calls and folds results into a context

pub mod error;
pub mod executor;
pub mod registry;
pub mod types;

pub use error::{ToolError, Result};
pub use executor::{ToolCoordinator, ToolOutcome, ToolProgress, ToolStatus, DEFAULT_TOOL_TIMEOUT};
pub use registry::ToolRegistry;
pub use types::{to_json_schema, ArgDef, ArgType, Tool, ToolHandler};

/// Re-export async_trait for implementers
pub use async_trait::async_trait;
