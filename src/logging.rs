//! Tracing subscriber initialization
//!
//! Logs go to `<log_dir>/<agent>_chat.log` so the terminal only shows the
//! conversation. `RUST_LOG` overrides the default level.

use crate::errors::{ConsoleError, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Log file for an agent: lowercase, whitespace replaced by underscores
pub fn log_file_path(log_dir: &Path, agent_name: &str) -> PathBuf {
    let stem: String = agent_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "agent".to_string() } else { stem };
    log_dir.join(format!("{}_chat.log", stem))
}

/// Install the global file subscriber and return the log file path.
pub fn init(log_dir: &Path, agent_name: &str, default_level: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        ConsoleError::Logging(format!(
            "failed to create log directory {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let path = log_file_path(log_dir, agent_name);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ConsoleError::Logging(format!("invalid log file path {}", path.display())))?;

    let appender = tracing_appender::rolling::never(log_dir, file_name);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(appender)
        .with_ansi(false)
        .try_init()
        .map_err(|e| ConsoleError::Logging(e.to_string()))?;

    Ok(path)
}
