//! `.env` discovery
//!
//! The nearest `.env` found from the working directory upwards (at most
//! three parent directories) is loaded. Variables that are already set are
//! left alone.

use std::path::{Path, PathBuf};

/// Parent directories searched above the starting directory
pub const MAX_PARENT_LEVELS: usize = 3;

/// Locate the nearest `.env`, starting at `start`.
pub fn find_env_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(MAX_PARENT_LEVELS + 1)
        .map(|dir| dir.join(".env"))
        .find(|candidate| candidate.is_file())
}

/// Load the nearest `.env` above the working directory, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    let path = find_env_file(&cwd)?;

    match dotenvy::from_path(&path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Loaded environment file");
            Some(path)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Could not load environment file: {}", e);
            None
        }
    }
}
