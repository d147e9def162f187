//! Line input with persistent history
//!
//! `LineSource` is the seam between the shell and the terminal; the
//! rustyline editor is the production implementation.

use crate::errors::Result;
use rustyline::error::ReadlineError;
use rustyline::history::History;
use rustyline::{Config, DefaultEditor};
use std::path::PathBuf;

/// Maximum number of history entries kept
pub const MAX_HISTORY_SIZE: usize = 1000;

/// Outcome of one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    /// Ctrl-C at the prompt
    Interrupted,
    /// Ctrl-D or closed stdin
    Eof,
}

/// Source of user input lines
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent>;

    fn add_history(&mut self, line: &str);

    /// Persist history, if this source has any
    fn save_history(&mut self) -> Result<()>;
}

/// Rustyline-backed input
pub struct InputHandler {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
}

impl InputHandler {
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(false)
            .build();
        let editor = DefaultEditor::with_config(config)?;

        Ok(InputHandler {
            editor,
            history_path: None,
        })
    }

    /// Load history from `history_file` if it exists; it is written back on save.
    pub fn with_history(history_file: PathBuf) -> Result<Self> {
        let mut handler = Self::new()?;

        if history_file.exists() {
            if let Err(e) = handler.editor.load_history(&history_file) {
                tracing::warn!("Could not load history from {}: {}", history_file.display(), e);
            }
        }

        handler.history_path = Some(history_file);
        Ok(handler)
    }

    pub fn history_len(&self) -> usize {
        self.editor.history().len()
    }
}

impl LineSource for InputHandler {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(InputEvent::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(InputEvent::Eof),
            Err(err) => Err(err.into()),
        }
    }

    fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }

    fn save_history(&mut self) -> Result<()> {
        if let Some(ref path) = self.history_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.editor.save_history(path)?;
        }
        Ok(())
    }
}
