//! chatloop - interactive terminal chat with an LLM agent
//!
//! # Architecture
//!
//! - **agent**: capability contract, TOML definitions, Ollama HTTP agent
//! - **streaming**: response collection, event shapes, thinking indicator
//! - **recovery**: failure classification and retry policy
//! - **execution**: one query to completion, with retries and accounting
//! - **telemetry**: token and cost accounting
//! - **session**: counters, status bar, exit summary
//! - **templates**: prompt templates from a directory
//! - **repl**: the interactive console
//! - **cli**: arguments, layered configuration, `.env` loading

pub mod errors;
pub mod logging;

pub mod agent;
pub mod recovery;
pub mod streaming;
pub mod telemetry;
pub mod templates;

pub mod execution;
pub mod session;

pub mod cli;
pub mod repl;

// Re-export commonly used types
pub use errors::{AgentError, ConsoleError, Result};
pub use execution::{QueryExecutor, QueryOutcome, QueryReporter};
pub use repl::ConsoleShell;
