//! Agent capability contract
//!
//! An agent is consumed as an opaque capability in one of two shapes: an
//! incremental event stream or a single blocking call. The engine tries
//! `stream()` first and falls back to `call()`.

pub mod loader;
pub mod ollama;

use crate::errors::{AgentError, ConsoleError};
use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;

pub use loader::{AgentDefinition, AgentLoader, AgentMode, ModelSection};
pub use ollama::OllamaAgent;

/// Finite, non-restartable sequence of raw response events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Value, AgentError>> + Send>>;

/// Builds a fresh agent instance for a session reset
pub type AgentFactory = Box<dyn Fn() -> Result<Arc<dyn Agent>, ConsoleError> + Send + Sync>;

/// A conversational agent
#[async_trait]
pub trait Agent: Send + Sync {
    /// Descriptive metadata used for display and pricing
    fn profile(&self) -> &AgentProfile;

    /// Incremental shape. `None` means the agent only answers blocking calls.
    fn stream(&self, _query: &str) -> Option<EventStream> {
        None
    }

    /// Blocking shape. Runs on a worker thread, never on the runtime.
    fn call(&self, _query: &str) -> Result<Value, AgentError> {
        Err(AgentError::Unsupported("blocking calls"))
    }

    /// Release resources held by this instance
    async fn release(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Agent metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub model_id: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub tools: Vec<String>,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Human-readable model name, also used as the pricing key
    pub fn model_label(&self) -> String {
        match &self.model_id {
            Some(id) if !id.trim().is_empty() => normalize_model_name(id),
            _ => "Unknown Model".to_string(),
        }
    }
}

/// Turn vendor model identifiers into display names.
///
/// `us.anthropic.claude-sonnet-4-5-20250929-v1:0` becomes `Claude Sonnet 4.5`.
/// Identifiers of other families are returned unchanged.
pub fn normalize_model_name(model_id: &str) -> String {
    let lower = model_id.to_lowercase();

    let family = ["sonnet", "opus", "haiku"]
        .into_iter()
        .find(|family| lower.contains(&format!("claude-{}", family)));

    let Some(family) = family else {
        return model_id.to_string();
    };

    let mut name = format!("Claude {}{}", family[..1].to_uppercase(), &family[1..]);
    if family == "sonnet" {
        let version = [("4-5", "4.5"), ("4.5", "4.5"), ("3-5", "3.5"), ("3.5", "3.5")]
            .into_iter()
            .find(|(needle, _)| lower.contains(needle))
            .map(|(_, version)| version);
        if let Some(version) = version {
            name.push(' ');
            name.push_str(version);
        }
    }
    name
}
