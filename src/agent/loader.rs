//! Agent definitions loaded from TOML files
//!
//! ```toml
//! name = "Ollie"
//! description = "General helper running on a local model"
//! mode = "stream"
//! system_prompt = "You are concise."
//! tools = ["web_search"]
//!
//! [model]
//! provider = "ollama"
//! id = "llama3.1:8b"
//! endpoint = "http://127.0.0.1:11434"
//! max_tokens = 2048
//! temperature = 0.7
//! ```

use super::{Agent, AgentFactory, AgentProfile, OllamaAgent};
use crate::agent::ollama::DEFAULT_OLLAMA_URL;
use crate::errors::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Invocation shape requested by a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    #[default]
    Stream,
    Blocking,
}

/// `[model]` table of a definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub id: String,
    pub endpoint: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

fn default_provider() -> String {
    "ollama".to_string()
}

/// Parsed agent definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mode: AgentMode,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    pub model: ModelSection,
}

impl AgentDefinition {
    /// Read and parse a definition file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConsoleError::AgentLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConsoleError::AgentLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Agent name, falling back to the file stem
    pub fn display_name(&self, path: &Path) -> String {
        self.name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "Agent".to_string())
    }

    pub fn profile(&self, path: &Path) -> AgentProfile {
        AgentProfile {
            name: self.display_name(path),
            description: self.description.clone(),
            model_id: Some(self.model.id.clone()),
            max_tokens: self.model.max_tokens,
            temperature: self.model.temperature,
            tools: self.tools.clone(),
        }
    }
}

/// Builds agents from one definition file
#[derive(Debug, Clone)]
pub struct AgentLoader {
    path: PathBuf,
    request_timeout: Duration,
}

impl AgentLoader {
    pub fn new(path: impl Into<PathBuf>, request_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            request_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the definition and construct the agent it describes.
    pub fn load(&self) -> Result<Arc<dyn Agent>> {
        let definition = AgentDefinition::from_file(&self.path)?;
        self.build(&definition)
    }

    pub fn build(&self, definition: &AgentDefinition) -> Result<Arc<dyn Agent>> {
        let fail = |reason: String| ConsoleError::AgentLoad {
            path: self.path.clone(),
            reason,
        };

        if definition.model.id.trim().is_empty() {
            return Err(fail("model.id must not be empty".to_string()));
        }

        match definition.model.provider.to_lowercase().as_str() {
            "ollama" => {
                let endpoint = definition
                    .model
                    .endpoint
                    .clone()
                    .or_else(|| std::env::var("OLLAMA_HOST").ok())
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

                let agent = OllamaAgent::new(
                    definition.profile(&self.path),
                    &endpoint,
                    definition.system_prompt.clone(),
                    definition.mode,
                    self.request_timeout,
                )
                .map_err(|e| fail(e.to_string()))?;

                tracing::info!(
                    agent = %agent.profile().name,
                    model = %definition.model.id,
                    endpoint = %endpoint,
                    mode = ?definition.mode,
                    "Agent loaded"
                );
                Ok(Arc::new(agent))
            }
            other => Err(fail(format!("unknown model provider '{}'", other))),
        }
    }

    /// Factory used by `clear` to install a fresh instance
    pub fn into_factory(self) -> AgentFactory {
        Box::new(move || self.load())
    }
}
