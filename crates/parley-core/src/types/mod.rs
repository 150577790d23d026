pub mod message;
pub mod tool;

pub use message::{Message, Role};
pub use tool::{ToolCall, ToolDefinition};
