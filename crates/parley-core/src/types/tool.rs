use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Decoded arguments; `Null` when the model's text was not valid JSON
    pub arguments: Value,
    /// Argument text that failed to decode, kept verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malformed: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            malformed: None,
        }
    }

    /// Call from the argument text a provider sent; blank text means no arguments
    pub fn from_raw(id: impl Into<String>, name: impl Into<String>, raw_arguments: &str) -> Self {
        let text = raw_arguments.trim();
        if text.is_empty() {
            return Self::new(id, name, Value::Object(Map::new()));
        }
        match serde_json::from_str(text) {
            Ok(arguments) => Self::new(id, name, arguments),
            Err(_) => Self {
                malformed: Some(raw_arguments.to_string()),
                ..Self::new(id, name, Value::Null)
            },
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed.is_some()
    }

    /// Arguments as sent on the wire
    pub fn arguments_string(&self) -> String {
        match &self.malformed {
            Some(raw) => raw.clone(),
            None => self.arguments.to_string(),
        }
    }

    /// Arguments as a key-value map, or a description of why they are not one
    pub fn argument_map(&self) -> Result<Map<String, Value>, String> {
        if let Some(raw) = &self.malformed {
            return Err(format!("arguments are not valid JSON: {}", raw));
        }
        match &self.arguments {
            Value::Object(map) => Ok(map.clone()),
            Value::Null => Ok(Map::new()),
            other => Err(format!("arguments must be a JSON object, got {}", other)),
        }
    }
}

/// What the model is told about a tool: name, purpose and a JSON-schema
/// object describing the arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Tool that takes no arguments
    pub fn simple(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, json!({ "type": "object", "properties": {} }))
    }
}
