//! One-line boxed session status

use super::stats::{format_elapsed, SessionStats};
use crate::telemetry::format_tokens;

/// Longest model label shown before truncation
pub const MAX_MODEL_LABEL: usize = 30;

/// Session status bar
#[derive(Debug, Clone)]
pub struct StatusBar {
    agent_name: String,
    model_label: String,
    show_tokens: bool,
}

impl StatusBar {
    pub fn new(agent_name: impl Into<String>, model_label: &str, show_tokens: bool) -> Self {
        Self {
            agent_name: agent_name.into(),
            model_label: truncate_label(model_label),
            show_tokens,
        }
    }

    pub fn model_label(&self) -> &str {
        &self.model_label
    }

    /// Status fields joined with ` │ `, without the box
    pub fn line(&self, stats: &SessionStats, total_tokens: u64) -> String {
        let mut parts = vec![self.agent_name.clone(), self.model_label.clone()];

        if self.show_tokens && total_tokens > 0 {
            parts.push(format!("{} tokens", format_tokens(total_tokens)));
        }

        let noun = if stats.query_count() == 1 {
            "query"
        } else {
            "queries"
        };
        parts.push(format!("{} {}", stats.query_count(), noun));
        parts.push(format_elapsed(stats.elapsed()));

        parts.join(" │ ")
    }

    /// Three-line box drawn around `line()`
    pub fn render(&self, stats: &SessionStats, total_tokens: u64) -> String {
        boxed(&self.line(stats, total_tokens))
    }
}

fn boxed(line: &str) -> String {
    let width = line.chars().count() + 2;
    format!(
        "┌{}┐\n│ {} │\n└{}┘",
        "─".repeat(width),
        line,
        "─".repeat(width)
    )
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() > MAX_MODEL_LABEL {
        let head: String = label.chars().take(MAX_MODEL_LABEL - 3).collect();
        format!("{}...", head)
    } else {
        label.to_string()
    }
}
