//! Error types for chatloop
//!
//! Two layers: `AgentError` covers everything an agent invocation can
//! raise and is what the retry policy classifies; `ConsoleError` covers
//! startup and shell failures.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure raised while invoking an agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// The call exceeded its time budget
    #[error("Agent call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The agent endpoint could not be reached
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The agent endpoint answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// An event or response did not match any known shape
    #[error("Unrecognized response shape: {0}")]
    UnrecognizedShape(String),

    /// The agent exposes neither invocation shape required for the call
    #[error("Agent does not support {0}")]
    Unsupported(&'static str),

    /// The response body could not be decoded
    #[error("Malformed response: {0}")]
    Protocol(String),

    /// The user interrupted the query
    #[error("Query interrupted")]
    Interrupted,

    /// Anything else the agent reports
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Map a transport failure. `timeout` is the budget the request ran
    /// under; URLs are stripped so endpoint paths never reach messages.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            AgentError::Timeout {
                duration_ms: timeout.as_millis() as u64,
            }
        } else if err.is_connect() {
            AgentError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            AgentError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            }
        } else if err.is_decode() {
            AgentError::Protocol(err.to_string())
        } else {
            AgentError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Protocol(err.to_string())
    }
}

/// Main error type for the console
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Configuration could not be read, parsed or validated
    #[error("Configuration error: {0}")]
    Config(String),

    /// The agent definition could not be turned into an agent
    #[error("Failed to load agent from {path:?}: {reason}")]
    AgentLoad { path: PathBuf, reason: String },

    /// Template file could not be read
    #[error("Template error: {0}")]
    Template(String),

    /// Line editor errors
    #[error("Input error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    /// Agent errors escaping the retry loop
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Log subscriber setup errors
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Result type alias for console operations
pub type Result<T> = std::result::Result<T, ConsoleError>;
