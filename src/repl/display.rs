//! Terminal output for the console
//!
//! Every line the shell shows goes through `DisplayManager`, colored with
//! the configured palette. It is also the terminal `QueryReporter`: the
//! agent-name prefix is written lazily with the first fragment of an
//! attempt, so the thinking indicator has the line to itself until then.
//! In rich mode fragments are held back and the finished response is
//! rendered as Markdown instead.

use crate::agent::AgentProfile;
use crate::cli::{FeatureFlags, Palette, PathsConfig};
use crate::execution::{QueryFailure, QueryReporter};
use crate::recovery::{ErrorClass, RetryAttempt};
use crate::session::{CloseReason, SessionStats, SessionSummary, StatusBar};
use crate::streaming::CollectedResponse;
use crate::telemetry::{format_cost, format_tokens, TokenCostTracker};
use crate::templates::TemplateStore;
use super::markdown::render_markdown;
use colored::*;
use crossterm::{
    cursor::{MoveTo, MoveToColumn, MoveUp},
    execute,
    terminal::{self, Clear, ClearType},
};
use std::io::{self, Write};

/// Width of the `=` and `-` rules
const RULE_WIDTH: usize = 60;

/// Most tools listed by `info`
const MAX_LISTED_TOOLS: usize = 10;

/// Assumed terminal width when it cannot be queried
const FALLBACK_COLUMNS: usize = 80;

/// Result of the `clear` command's session reset
#[derive(Debug)]
pub enum ResetOutcome {
    /// No factory configured
    NotAvailable,
    Reset,
    Failed(String),
}

/// Console output
pub struct DisplayManager {
    out: Box<dyn Write>,
    palette: Palette,
    features: FeatureFlags,
    paths: PathsConfig,
    file_backed: bool,
    agent_name: String,
    status_bar: Option<StatusBar>,
    /// Prefix written for the current attempt
    responding: bool,
    /// Text written on the response line since the prefix
    partial: String,
}

impl DisplayManager {
    /// Display writing to stdout
    pub fn new(
        agent_name: impl Into<String>,
        palette: Palette,
        features: FeatureFlags,
        paths: PathsConfig,
    ) -> Self {
        Self::with_writer(Box::new(io::stdout()), agent_name, palette, features, paths)
    }

    pub fn with_writer(
        out: Box<dyn Write>,
        agent_name: impl Into<String>,
        palette: Palette,
        features: FeatureFlags,
        paths: PathsConfig,
    ) -> Self {
        DisplayManager {
            out,
            palette,
            features,
            paths,
            file_backed: false,
            agent_name: agent_name.into(),
            status_bar: None,
            responding: false,
            partial: String::new(),
        }
    }

    /// Mention loaded configuration files in the banner
    pub fn with_file_backed(mut self, file_backed: bool) -> Self {
        self.file_backed = file_backed;
        self
    }

    /// Attach a status bar; only used when `show_status_bar` is on
    pub fn with_status_bar(mut self, status_bar: StatusBar) -> Self {
        if self.features.show_status_bar {
            self.status_bar = Some(status_bar);
        }
        self
    }

    pub fn status_bar(&self) -> Option<&StatusBar> {
        self.status_bar.as_ref()
    }

    fn line(&mut self, text: impl std::fmt::Display) {
        let _ = writeln!(self.out, "{}", text);
    }

    fn blank(&mut self) {
        let _ = writeln!(self.out);
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn rule(&mut self, ch: char) {
        let rule = ch.to_string().repeat(RULE_WIDTH);
        let colored = rule.color(self.palette.dim).to_string();
        self.line(colored);
    }

    fn system(&mut self, text: &str) {
        let colored = text.color(self.palette.system).to_string();
        self.line(colored);
    }

    fn error(&mut self, text: &str) {
        let colored = text.color(self.palette.error).to_string();
        self.line(colored);
    }

    fn success(&mut self, text: &str) {
        let colored = text.color(self.palette.success).to_string();
        self.line(colored);
    }

    fn dim(&mut self, text: &str) {
        let colored = text.color(self.palette.dim).to_string();
        self.line(colored);
    }

    /// Prompt for a fresh query
    pub fn user_prompt(&mut self) -> String {
        self.blank();
        self.flush();
        format!("{}: ", "You".color(self.palette.user))
    }

    /// Prompt for continuation lines
    pub fn continuation_prompt(&self) -> String {
        "... ".color(self.palette.user).to_string()
    }

    pub fn clear_screen(&mut self) {
        let _ = execute!(self.out, Clear(ClearType::All), MoveTo(0, 0));
    }

    /// Draw the status bar box, if enabled
    pub fn show_status_bar(&mut self, stats: &SessionStats, tracker: &TokenCostTracker) {
        if let Some(bar) = &self.status_bar {
            let rendered = bar.render(stats, tracker.total_tokens());
            self.line(rendered);
        }
    }

    /// Clear the screen and redraw the status bar before a query
    pub fn redraw_status(&mut self, stats: &SessionStats, tracker: &TokenCostTracker) {
        if self.status_bar.is_none() {
            return;
        }
        self.clear_screen();
        self.show_status_bar(stats, tracker);
        self.blank();
    }

    fn command_lines(&mut self) {
        let dir = self.paths.prompts_dir.display().to_string();
        self.line("Commands:");
        self.line("  help      - Show this help message");
        self.line("  info      - Show detailed agent information");
        self.line("  templates - List available prompt templates");
        self.line(format!("  /name     - Use prompt template from {}/name.md", dir));
        self.line("  clear     - Clear screen and reset agent session");
        self.line("  quit      - Exit the chat");
        self.line("  exit      - Exit the chat");
    }

    pub fn show_banner(
        &mut self,
        profile: &AgentProfile,
        stats: &SessionStats,
        tracker: &TokenCostTracker,
    ) {
        if !self.features.show_banner {
            return;
        }

        if self.status_bar.is_some() {
            self.blank();
            self.show_status_bar(stats, tracker);
        }

        self.blank();
        self.line(format!("{} - Interactive Chat", self.agent_name.to_uppercase()));
        self.line("=".repeat(RULE_WIDTH));
        self.line(format!("Welcome to {}!", self.agent_name));
        self.line(profile.description.clone());

        if self.features.show_metadata {
            self.blank();
            self.dim("Agent Configuration:");
            let model = match &self.status_bar {
                Some(bar) => Some(bar.model_label().to_string()),
                None => profile.model_id.clone(),
            };
            if let Some(model) = model {
                self.line(format!("  Model: {}", model));
            }
            if let Some(max_tokens) = profile.max_tokens {
                self.line(format!("  Max Tokens: {}", max_tokens));
            }
            if !profile.tools.is_empty() {
                self.line(format!("  Tools: {} available", profile.tools.len()));
            }
        }

        self.blank();
        self.command_lines();
        self.blank();
        self.line("Features:");
        self.line("  ↑↓     - Navigate command history");
        self.line("  Enter  - Submit single line");
        self.line("  \\\\     - Start multi-line input (end with empty line)");
        if self.features.rich_enabled {
            self.line("  Rich   - Markdown rendering with animated spinner");
        }

        if self.file_backed {
            self.blank();
            self.dim("Configuration loaded");
            if self.features.auto_save {
                self.line(format!(
                    "  Auto-save: enabled → {}",
                    self.paths.save_location.display()
                ));
            }
        }

        self.line("=".repeat(RULE_WIDTH));
        self.flush();
    }

    pub fn show_help(&mut self, profile: &AgentProfile) {
        let dir = self.paths.prompts_dir.display().to_string();
        let history = self.paths.history_file.display().to_string();

        self.blank();
        self.line(format!("{} - Help", self.agent_name.to_uppercase()));
        self.line("=".repeat(50));
        self.line(format!("Agent: {}", self.agent_name));
        self.line(format!("Description: {}", profile.description));
        self.blank();
        self.command_lines();
        self.blank();
        self.line("Prompt Templates:");
        self.line(format!("  Create: Save markdown files to {}/name.md", dir));
        self.line("  Use: Type /name <optional context>");
        self.line("  Variables: Use {input} in template for substitution");
        self.line("  Example: /review {input} → replaces {input} with context");
        self.blank();
        self.line("Multi-line Input:");
        self.line("  Type \\\\ to start multi-line mode");
        self.line("  Press Enter on empty line to submit");
        self.line("  Great for code blocks and long prompts");
        self.blank();
        self.line("History:");
        self.line("  Use ↑↓ arrows to navigate previous queries");
        self.line(format!("  History saved to {}", history));
        self.line("=".repeat(50));
        self.flush();
    }

    pub fn show_info(&mut self, profile: &AgentProfile) {
        self.blank();
        self.line(format!("{} - Information", self.agent_name.to_uppercase()));
        self.line("=".repeat(RULE_WIDTH));
        self.line(format!("Name: {}", self.agent_name));
        self.line(format!("Description: {}", profile.description));
        self.blank();

        self.line("Configuration:");
        if let Some(model_id) = &profile.model_id {
            self.line(format!("  Model ID: {}", model_id));
        }
        if let Some(max_tokens) = profile.max_tokens {
            self.line(format!("  Max Tokens: {}", max_tokens));
        }
        if let Some(temperature) = profile.temperature {
            self.line(format!("  Temperature: {}", temperature));
        }
        self.blank();

        if profile.tools.is_empty() {
            self.line("Tools: None");
        } else {
            self.line(format!("Available Tools ({}):", profile.tools.len()));
            for (i, tool) in profile.tools.iter().take(MAX_LISTED_TOOLS).enumerate() {
                self.line(format!("  {}. {}", i + 1, tool));
            }
            if profile.tools.len() > MAX_LISTED_TOOLS {
                self.line(format!(
                    "  ... and {} more",
                    profile.tools.len() - MAX_LISTED_TOOLS
                ));
            }
        }

        self.blank();
        self.line("Features:");
        if self.features.rich_enabled {
            self.line("  ✓ Rich text with Markdown rendering");
        }
        self.line("  ✓ Command history with full readline editing");
        self.line("  ✓ Multi-line input support");
        self.line("  ✓ Automatic error recovery and retry logic");
        self.line("  ✓ Session reset with 'clear' command");
        if self.file_backed {
            self.line("  ✓ Configuration file support (~/.chatrc or .chatrc)");
        }
        if self.features.auto_save {
            self.line("  ✓ Auto-save conversations on exit");
        }
        self.line("=".repeat(RULE_WIDTH));
        self.flush();
    }

    pub fn show_templates(&mut self, store: &TemplateStore) {
        let templates = store.list();
        let dir = store.dir().display().to_string();

        if templates.is_empty() {
            self.blank();
            self.system("No prompt templates found");
            self.line(format!("Create templates in: {}", dir));
            self.line(format!("Example: {}", store.path_for("review").display()));
            self.flush();
            return;
        }

        self.blank();
        self.line(format!(
            "{} ({}):",
            "Available Prompt Templates".color(self.palette.system),
            templates.len()
        ));
        self.rule('-');
        for info in &templates {
            let name = info.name.color(self.palette.success);
            match &info.description {
                Some(desc) => {
                    let desc = desc.color(self.palette.dim);
                    self.line(format!("  /{} - {}", name, desc));
                }
                None => self.line(format!("  /{}", name)),
            }
        }
        self.rule('-');
        self.system("Usage: /template_name <optional context>");
        self.system(&format!("Location: {}", dir));
        self.flush();
    }

    pub fn template_loaded(&mut self, name: &str) {
        self.system(&format!("✓ Loaded template: {}", name));
    }

    pub fn template_missing(&mut self, name: &str, store: &TemplateStore) {
        let names = store.names();
        let available = if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        };
        self.error(&format!("Template not found: {}", name));
        self.line(format!("Available templates: {}", available));
        self.line(format!("Create at: {}", store.path_for(name).display()));
        self.flush();
    }

    pub fn template_error(&mut self, name: &str, reason: &str) {
        self.error(&format!("Could not load template {}: {}", name, reason));
        self.flush();
    }

    pub fn multiline_intro(&mut self) {
        self.system("Multi-line mode (empty line to submit):");
        self.flush();
    }

    pub fn show_cleared(&mut self, outcome: &ResetOutcome) {
        match outcome {
            ResetOutcome::NotAvailable => self.success("✓ Screen cleared"),
            ResetOutcome::Reset => self.success("✓ Screen cleared and agent session reset"),
            ResetOutcome::Failed(reason) => {
                self.error(&format!("⚠️  Could not reset agent session: {}", reason));
                self.system("Screen cleared but agent session maintained");
            }
        }
        self.flush();
    }

    pub fn farewell(&mut self, reason: CloseReason) {
        let text = match reason {
            CloseReason::Quit => format!("\nGoodbye! Thanks for using {}!", self.agent_name),
            CloseReason::Interrupted => {
                format!("\n\nChat interrupted. Thanks for using {}!", self.agent_name)
            }
            CloseReason::EndOfInput => {
                format!("\n\nChat ended. Thanks for using {}!", self.agent_name)
            }
        };
        self.system(&text);
        self.flush();
    }

    pub fn show_summary(&mut self, summary: &SessionSummary) {
        self.blank();
        self.rule('=');
        self.system("Session Summary");
        self.rule('-');
        for part in summary.lines() {
            self.system(&format!("  {}", part));
        }
        self.rule('=');
        let done = format!("\n{} session complete!", self.agent_name);
        self.success(&done);
        self.flush();
    }

    fn begin_response(&mut self) {
        if self.responding {
            return;
        }
        self.responding = true;
        self.partial.clear();
        let prefix = self.agent_name.color(self.palette.agent);
        let _ = write!(self.out, "\n{}: ", prefix);
    }

    /// End the current response line, if one was started
    fn end_response(&mut self) {
        if self.responding {
            self.blank();
            self.responding = false;
            self.partial.clear();
        }
    }

    /// Erase the response line and everything it wrapped onto
    fn erase_response(&mut self) {
        if !self.responding {
            return;
        }
        let written = format!("{}: {}", self.agent_name, self.partial);
        let columns = terminal::size()
            .ok()
            .map(|(cols, _)| cols as usize)
            .filter(|cols| *cols > 0)
            .unwrap_or(FALLBACK_COLUMNS);
        let rows = rows_used(&written, columns);

        if rows > 1 {
            let _ = execute!(self.out, MoveUp((rows - 1).min(u16::MAX as usize) as u16));
        }
        let _ = execute!(self.out, MoveToColumn(0), Clear(ClearType::FromCursorDown));
        self.responding = false;
        self.partial.clear();
    }

    fn footer(&mut self, response: &CollectedResponse, tracker: &TokenCostTracker) {
        let mut parts = Vec::new();

        if self.features.show_duration {
            parts.push(format!("Time: {:.1}s", response.duration.as_secs_f64()));
        }

        if let Some(metrics) = response.metrics {
            if let Some(cycles) = metrics.cycles.filter(|n| *n > 0) {
                parts.push(counted(cycles, "cycle"));
            }
            if let Some(tools) = metrics.tools.filter(|n| *n > 0) {
                parts.push(counted(tools, "tool"));
            }
        }

        if self.features.show_tokens {
            if let Some(usage) = response.usage {
                parts.push(format!(
                    "Tokens: {} (in: {}, out: {})",
                    format_tokens(usage.total()),
                    format_tokens(usage.input_tokens),
                    format_tokens(usage.output_tokens)
                ));
                let query_cost = tracker.cost_for(usage.input_tokens, usage.output_tokens);
                if query_cost > 0.0 {
                    parts.push(format!("Cost: {}", format_cost(query_cost)));
                }
                let session_cost = tracker.cost();
                if session_cost > 0.0 {
                    parts.push(format!("Session: {}", format_cost(session_cost)));
                }
            }
        }

        if !parts.is_empty() {
            self.blank();
            self.rule('-');
            self.system(&parts.join(" │ "));
        }
    }
}

/// `1 cycle`, `3 tools`
fn counted(n: u64, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

/// Terminal rows taken by `text` when wrapped at `columns`
fn rows_used(text: &str, columns: usize) -> usize {
    let columns = columns.max(1);
    text.split('\n')
        .map(|line| line.chars().count().div_ceil(columns).max(1))
        .sum()
}

impl QueryReporter for DisplayManager {
    fn fragment(&mut self, text: &str) {
        if self.features.rich_enabled {
            return;
        }
        self.begin_response();
        self.partial.push_str(text);
        let _ = write!(self.out, "{}", text);
        self.flush();
    }

    fn discard_partial(&mut self) {
        self.erase_response();
        self.flush();
    }

    fn attempt_failed(&mut self, attempt: &RetryAttempt, max_attempts: u32, will_retry: bool) {
        self.end_response();
        if !will_retry {
            return;
        }

        let wait = attempt.wait.as_secs_f64();
        match attempt.error_class {
            ErrorClass::Timeout => {
                self.error(&format!(
                    "\n⚠️  Timeout (attempt {}/{})",
                    attempt.attempt_number, max_attempts
                ));
                self.system(&format!("Retrying in {:.1}s...", wait));
            }
            ErrorClass::ConnectionFailure => {
                self.error(&format!("\n⚠️  Connection error: {}", attempt.message));
                self.system(&format!("Retrying in {:.1}s...", wait));
            }
            ErrorClass::RateLimited => {
                self.error("\n⚠️  Rate limit reached");
                self.system(&format!("Waiting {:.0}s before retry...", wait));
            }
            ErrorClass::NonRetryable => {}
        }
        self.flush();
    }

    fn query_completed(&mut self, response: &CollectedResponse, tracker: &TokenCostTracker) {
        if self.features.rich_enabled && !response.text.trim().is_empty() {
            self.begin_response();
            self.blank();
            for line in render_markdown(&response.text, &self.palette) {
                self.line(line);
            }
            self.responding = false;
        } else if !self.responding {
            self.begin_response();
            let empty = "(empty response)".color(self.palette.dim).to_string();
            let _ = write!(self.out, "{}", empty);
        }
        self.end_response();
        self.footer(response, tracker);
        self.flush();
    }

    fn query_failed(&mut self, failure: &QueryFailure) {
        self.end_response();

        if failure.exhausted() {
            let text = match failure.class {
                ErrorClass::Timeout => "\nMax retries reached. Please try again later.",
                ErrorClass::ConnectionFailure => {
                    "\nMax retries reached. Check your network connection."
                }
                _ => "\nRate limit persists. Please wait and try again.",
            };
            self.error(text);
        }

        self.blank();
        self.rule('-');
        let text = format!("{}: Query failed - {}", self.agent_name, failure.error);
        self.error(&text);
        self.system("Try rephrasing your question or check the logs for details.");
        self.flush();
    }

    fn query_interrupted(&mut self) {
        self.end_response();
        self.flush();
    }
}
