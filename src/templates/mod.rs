//! Prompt templates
//!
//! A template is a `*.md` file in the template directory; its file stem is
//! the name it is invoked by (`/review` loads `review.md`). A first line
//! starting with `#` doubles as the listing description.

use crate::errors::{ConsoleError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Placeholder replaced with the invocation context
pub const PLACEHOLDER: &str = "{input}";

/// Template file extension
const EXTENSION: &str = "md";

/// A loaded template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub raw_text: String,
}

impl Template {
    /// Description taken from a leading `#` line
    pub fn description(&self) -> Option<String> {
        let first = self.raw_text.lines().next()?.trim();
        if first.starts_with('#') {
            Some(first.trim_start_matches('#').trim().to_string())
        } else {
            None
        }
    }

    /// Substitute `context` into the template.
    ///
    /// Every `{input}` is replaced verbatim. Without a placeholder a
    /// non-empty context is appended after a blank line.
    pub fn render(&self, context: &str) -> String {
        if self.raw_text.contains(PLACEHOLDER) {
            self.raw_text.replace(PLACEHOLDER, context)
        } else if context.is_empty() {
            self.raw_text.clone()
        } else {
            format!("{}\n\n{}", self.raw_text, context)
        }
    }
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInfo {
    pub name: String,
    pub description: Option<String>,
}

/// Directory of templates
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a template with this name lives at, whether or not it exists
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }

    /// Load a template; `Ok(None)` when it does not exist.
    pub fn load(&self, name: &str) -> Result<Option<Template>> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Ok(None);
        }

        let path = self.path_for(name);
        match fs::read_to_string(&path) {
            Ok(raw_text) => Ok(Some(Template {
                name: name.to_string(),
                raw_text,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConsoleError::Template(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Load and render in one step.
    pub fn resolve(&self, name: &str, context: &str) -> Result<Option<String>> {
        Ok(self.load(name)?.map(|template| template.render(context)))
    }

    /// Template names, sorted. A missing directory lists nothing.
    pub fn names(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(EXTENSION))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names
    }

    /// Sorted listing with descriptions
    pub fn list(&self) -> Vec<TemplateInfo> {
        self.names()
            .into_iter()
            .map(|name| {
                let description = match self.load(&name) {
                    Ok(Some(template)) => template.description(),
                    _ => None,
                };
                TemplateInfo { name, description }
            })
            .collect()
    }
}
