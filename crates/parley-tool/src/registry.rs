//! Tool registry for managing available tools

use crate::error::{Result, ToolError};
use crate::types::Tool;
use parley_core::types::ToolDefinition;
use std::collections::HashMap;

/// Ordered set of tools keyed by name.
///
/// Registration happens while building; once handed to a coordinator the
/// registry is only read, so one `Arc<ToolRegistry>` can back any number of
/// sessions.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with initial tools
    pub fn with_tools(tools: impl IntoIterator<Item = Tool>) -> Result<Self> {
        tools.into_iter().try_fold(Self::new(), Self::with_tool)
    }

    /// Add a tool, rejecting a name that is already taken
    pub fn register(&mut self, tool: Tool) -> Result<()> {
        if self.index.contains_key(&tool.name) {
            return Err(ToolError::DuplicateName(tool.name));
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_tool(mut self, tool: Tool) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tools in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Declarations for every tool, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(Tool::definition).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
