//! Chat-completions wire format

use parley_core::chat::{ChatChunk, ChatRequest, ChatResponse, ChatUsage, FinishReason};
use parley_core::types::{Message, ToolCall, ToolDefinition};
use serde_json::{json, Map, Value};

use crate::error::ConversionError;
use crate::transformer::SchemaTransformer;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiTransformer;

impl OpenAiTransformer {
    pub fn new() -> Self {
        Self
    }
}

fn encode_message(message: &Message) -> Value {
    let mut out = Map::new();
    out.insert("role".into(), json!(message.role.to_string()));

    // a pure tool request has no text
    let content = if message.content.is_empty() && message.has_tool_calls() {
        Value::Null
    } else {
        json!(message.content)
    };
    out.insert("content".into(), content);

    if let Some(calls) = message.tool_calls.as_ref().filter(|c| !c.is_empty()) {
        let calls: Vec<Value> = calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments_string() },
                })
            })
            .collect();
        out.insert("tool_calls".into(), Value::Array(calls));
    }
    if let Some(id) = &message.tool_call_id {
        out.insert("tool_call_id".into(), json!(id));
    }

    Value::Object(out)
}

fn encode_tool(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Arguments that are not valid JSON are kept verbatim
fn decode_tool_calls(value: &Value) -> Vec<ToolCall> {
    let Some(calls) = value.as_array() else {
        return Vec::new();
    };
    calls
        .iter()
        .filter_map(|call| {
            let id = call["id"].as_str()?;
            let function = &call["function"];
            let name = function["name"].as_str()?;
            let raw = function["arguments"].as_str().unwrap_or_default();
            Some(ToolCall::from_raw(id, name, raw))
        })
        .collect()
}

fn decode_usage(usage: &Value) -> ChatUsage {
    let count = |key: &str| usage[key].as_u64().unwrap_or(0).min(u32::MAX as u64) as u32;
    ChatUsage::new(count("prompt_tokens"), count("completion_tokens"))
}

impl SchemaTransformer for OpenAiTransformer {
    fn encode_request(&self, request: &ChatRequest) -> Result<Value, ConversionError> {
        if request.model.is_empty() {
            return Err(ConversionError::MissingField("model".to_string()));
        }

        let mut body = json!({
            "model": request.model,
            "messages": request.messages.iter().map(encode_message).collect::<Vec<_>>(),
            "stream": request.stream,
        });

        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(encode_tool).collect());
        }
        if request.stream {
            body["stream_options"] = json!({ "include_usage": true });
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        Ok(body)
    }

    fn decode_response(&self, body: &Value) -> Result<ChatResponse, ConversionError> {
        let choice = body["choices"]
            .get(0)
            .ok_or_else(|| ConversionError::MissingField("choices".to_string()))?;

        let message = &choice["message"];
        if !message.is_object() {
            return Err(ConversionError::MissingField("choices[0].message".to_string()));
        }
        match message["role"].as_str() {
            None | Some("assistant") => {}
            Some(role) => {
                return Err(ConversionError::InvalidFormat(format!(
                    "expected assistant message, got role {}",
                    role
                )))
            }
        }

        let content = message["content"].as_str().unwrap_or_default();
        let tool_calls = decode_tool_calls(&message["tool_calls"]);
        let tool_calls = (!tool_calls.is_empty()).then_some(tool_calls);

        let finish_reason = choice["finish_reason"]
            .as_str()
            .map(FinishReason::parse)
            .unwrap_or(FinishReason::Stop);

        Ok(ChatResponse::new(
            body["id"].as_str().unwrap_or_default(),
            body["model"].as_str().unwrap_or_default(),
            Message::assistant(content, tool_calls),
        )
        .with_usage(decode_usage(&body["usage"]))
        .with_finish_reason(finish_reason))
    }

    fn decode_stream_event(&self, data: &str) -> Result<Option<ChatChunk>, ConversionError> {
        let event: Value = serde_json::from_str(data)?;
        let choice = &event["choices"][0];
        let delta = &choice["delta"];

        if let Some(text) = delta["content"].as_str().filter(|t| !t.is_empty()) {
            return Ok(Some(ChatChunk::content(text)));
        }

        if let Some(call) = delta["tool_calls"].get(0) {
            let call_id = call["id"].as_str().unwrap_or_default().to_string();
            let function = &call["function"];
            // a name opens a new call; later deltas only carry argument text
            if let Some(name) = function["name"].as_str() {
                return Ok(Some(ChatChunk::ToolCallStart {
                    call_id,
                    name: name.to_string(),
                }));
            }
            if let Some(args) = function["arguments"].as_str().filter(|a| !a.is_empty()) {
                return Ok(Some(ChatChunk::ToolCallDelta {
                    call_id,
                    arguments_delta: args.to_string(),
                }));
            }
        }

        if let Some(reason) = choice["finish_reason"].as_str() {
            return Ok(Some(ChatChunk::Finish {
                reason: FinishReason::parse(reason),
            }));
        }

        if event["usage"].is_object() {
            let usage = decode_usage(&event["usage"]);
            return Ok(Some(ChatChunk::Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            }));
        }

        Ok(None)
    }
}
