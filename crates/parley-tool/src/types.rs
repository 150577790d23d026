//! Core types for tool definitions

use async_trait::async_trait;
use parley_core::types::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::{Result, ToolError};

/// Definition of an argument for a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArgDef {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: ArgType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ArgDef {
    pub fn required(name: impl Into<String>, arg_type: ArgType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg_type,
            required: true,
            default: None,
            description: Some(description.into()),
        }
    }

    pub fn optional(name: impl Into<String>, arg_type: ArgType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, arg_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn schema(&self) -> Value {
        let mut schema = json!({ "type": self.arg_type.to_string() });
        if let Some(description) = &self.description {
            schema["description"] = json!(description);
        }
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        schema
    }
}

/// Type of argument
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgType::String => write!(f, "string"),
            ArgType::Number => write!(f, "number"),
            ArgType::Integer => write!(f, "integer"),
            ArgType::Boolean => write!(f, "boolean"),
            ArgType::Array => write!(f, "array"),
            ArgType::Object => write!(f, "object"),
        }
    }
}

impl ArgType {
    /// Check if a JSON value matches this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ArgType::String => value.is_string(),
            ArgType::Number => value.is_number(),
            ArgType::Integer => value.is_i64() || value.is_u64(),
            ArgType::Boolean => value.is_boolean(),
            ArgType::Array => value.is_array(),
            ArgType::Object => value.is_object(),
        }
    }
}

/// Render argument definitions as a JSON-schema object
pub fn to_json_schema(args: &[ArgDef]) -> Value {
    let properties: Map<String, Value> = args
        .iter()
        .map(|arg| (arg.name.clone(), arg.schema()))
        .collect();
    let required: Vec<&str> = args
        .iter()
        .filter(|arg| arg.required)
        .map(|arg| arg.name.as_str())
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Executable side of a tool.
///
/// Implement the trait directly for handlers that need to await; plain
/// synchronous callbacks go through [`Tool::from_fn`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Map<String, Value>) -> Result<Value>;
}

/// Synchronous callback run on the blocking pool, so a slow callback never
/// stalls an async worker and the coordinator's timeout can still fire
struct BlockingFn<F>(Arc<F>);

#[async_trait]
impl<F> ToolHandler for BlockingFn<F>
where
    F: Fn(Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
{
    async fn call(&self, args: Map<String, Value>) -> Result<Value> {
        let callback = self.0.clone();
        tokio::task::spawn_blocking(move || callback(args))
            .await
            .map_err(|join_err| {
                ToolError::execution(if join_err.is_panic() {
                    "tool panicked".to_string()
                } else {
                    join_err.to_string()
                })
            })?
    }
}

/// A named, schema-described capability the model may invoke
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub args: Vec<ArgDef>,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Tool backed by a plain synchronous callback
    pub fn from_fn<F>(name: impl Into<String>, description: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, description, BlockingFn(Arc::new(callback)))
    }

    pub fn with_arg(mut self, arg: ArgDef) -> Self {
        self.args.push(arg);
        self
    }

    pub fn handler(&self) -> Arc<dyn ToolHandler> {
        self.handler.clone()
    }

    /// Declaration sent to the model
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, to_json_schema(&self.args))
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("args", &self.args)
            .finish()
    }
}
