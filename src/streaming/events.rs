//! Response event shapes and the extraction cascade
//!
//! Agents emit heterogeneous payloads. Every payload is classified into a
//! closed set of shapes when it enters the engine, and text and usage are
//! pulled out of each shape by exhaustive matching. Payloads that fit no
//! shape are rejected rather than stringified.

use crate::errors::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lookup paths tried, in order, when searching an event for usage data
const USAGE_PATHS: [&str; 4] = [
    "/result/metrics/accumulated_usage",
    "/usage",
    "/metadata/usage",
    "/data/usage",
];

const INPUT_KEYS: [&str; 3] = ["inputTokens", "input_tokens", "prompt_tokens"];
const OUTPUT_KEYS: [&str; 3] = ["outputTokens", "output_tokens", "completion_tokens"];

/// Token usage reported by an agent for one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageInfo {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Read a usage object in any of the common key spellings.
    ///
    /// Returns `None` when both counts are zero or absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let pick = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| object.get(*key).and_then(Value::as_u64))
                .unwrap_or(0)
        };

        let usage = Self::new(pick(&INPUT_KEYS), pick(&OUTPUT_KEYS));
        if usage.total() == 0 {
            None
        } else {
            Some(usage)
        }
    }
}

/// Agent loop counters reported under `result.metrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentMetrics {
    pub cycles: Option<u64>,
    pub tools: Option<u64>,
}

impl AgentMetrics {
    /// Read `cycle_count` and `tool_metrics` from a metrics object.
    ///
    /// `tool_metrics` is either a list of calls or a map from tool name to
    /// its calls; both are counted by call.
    pub fn from_value(value: &Value) -> Option<Self> {
        let cycles = value.get("cycle_count").and_then(Value::as_u64);
        let tools = match value.get("tool_metrics") {
            Some(Value::Array(calls)) => Some(calls.len() as u64),
            Some(Value::Object(by_tool)) => Some(
                by_tool
                    .values()
                    .map(|calls| match calls {
                        Value::Array(calls) => calls.len() as u64,
                        _ => 1,
                    })
                    .sum(),
            ),
            _ => None,
        };

        if cycles.is_none() && tools.is_none() {
            None
        } else {
            Some(Self { cycles, tools })
        }
    }
}

/// One unit of agent output, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// A bare text chunk
    Text(String),

    /// `{"text": ...}` or `{"content": [{"text": ...}, ...]}`
    Structured(Value),

    /// An object whose `message` member holds text in one of the shapes above
    Message(Value),

    /// Metadata with no text, typically the last event of a stream
    Terminal(Value),
}

impl ResponseEvent {
    pub fn text(chunk: impl Into<String>) -> Self {
        ResponseEvent::Text(chunk.into())
    }

    /// Classify a raw payload.
    pub fn from_value(value: Value) -> Result<Self, AgentError> {
        match shape_of(&value) {
            Some(Shape::Text) => match value {
                Value::String(text) => Ok(ResponseEvent::Text(text)),
                _ => Err(AgentError::UnrecognizedShape(summarize(&value))),
            },
            Some(Shape::DataText) => match value.get("data").and_then(Value::as_str) {
                Some(text) => Ok(ResponseEvent::Text(text.to_string())),
                None => Err(AgentError::UnrecognizedShape(summarize(&value))),
            },
            Some(Shape::Structured) => Ok(ResponseEvent::Structured(value)),
            Some(Shape::DataStructured) => Ok(ResponseEvent::Structured(value["data"].clone())),
            Some(Shape::Message) => Ok(ResponseEvent::Message(value)),
            Some(Shape::Terminal) => Ok(ResponseEvent::Terminal(value)),
            None => Err(AgentError::UnrecognizedShape(summarize(&value))),
        }
    }

    /// Text carried by this event, if any.
    pub fn extract_text(&self) -> Result<Option<String>, AgentError> {
        match self {
            ResponseEvent::Text(text) => Ok(Some(text.clone())),
            ResponseEvent::Structured(payload) => payload_text(payload),
            ResponseEvent::Message(value) => match value.get("message") {
                Some(Value::String(text)) => Ok(Some(text.clone())),
                Some(inner) if inner.is_object() => payload_text(inner),
                _ => Err(AgentError::UnrecognizedShape(summarize(value))),
            },
            ResponseEvent::Terminal(_) => Ok(None),
        }
    }

    /// Usage metadata carried by this event, if any.
    pub fn usage(&self) -> Option<UsageInfo> {
        match self {
            ResponseEvent::Text(_) => None,
            ResponseEvent::Structured(value)
            | ResponseEvent::Message(value)
            | ResponseEvent::Terminal(value) => find_usage(value),
        }
    }

    /// Agent loop counters carried by this event, if any.
    pub fn metrics(&self) -> Option<AgentMetrics> {
        match self {
            ResponseEvent::Text(_) => None,
            ResponseEvent::Structured(value)
            | ResponseEvent::Message(value)
            | ResponseEvent::Terminal(value) => value
                .pointer("/result/metrics")
                .and_then(AgentMetrics::from_value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Text,
    DataText,
    Structured,
    DataStructured,
    Message,
    Terminal,
}

fn has_text_fields(value: &Value) -> bool {
    value.get("text").is_some() || value.get("content").is_some()
}

fn shape_of(value: &Value) -> Option<Shape> {
    let object = match value {
        Value::String(_) => return Some(Shape::Text),
        Value::Object(object) => object,
        _ => return None,
    };

    if has_text_fields(value) {
        return Some(Shape::Structured);
    }
    if object.contains_key("message") {
        return Some(Shape::Message);
    }
    match object.get("data") {
        Some(Value::String(_)) => return Some(Shape::DataText),
        Some(data) if has_text_fields(data) => return Some(Shape::DataStructured),
        _ => {}
    }
    if USAGE_PATHS.iter().any(|path| value.pointer(path).is_some())
        || value.pointer("/result/metrics").is_some()
        || object.contains_key("metrics")
        || object.contains_key("done")
    {
        return Some(Shape::Terminal);
    }
    None
}

/// Search a payload for usage data; the first path present wins.
pub fn find_usage(value: &Value) -> Option<UsageInfo> {
    USAGE_PATHS
        .iter()
        .find_map(|path| value.pointer(path))
        .and_then(UsageInfo::from_value)
}

fn payload_text(payload: &Value) -> Result<Option<String>, AgentError> {
    if let Some(text) = payload.get("text").and_then(Value::as_str) {
        return Ok(Some(text.to_string()));
    }

    match payload.get("content") {
        Some(Value::Array(blocks)) => {
            // Non-text blocks (tool use, images) carry nothing to display
            let text: String = blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            Ok(if text.is_empty() { None } else { Some(text) })
        }
        Some(Value::String(text)) => Ok(Some(text.clone())),
        _ => Err(AgentError::UnrecognizedShape(summarize(payload))),
    }
}

fn summarize(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() > 80 {
        let head: String = rendered.chars().take(77).collect();
        format!("{}...", head)
    } else {
        rendered
    }
}
