//! Interactive console
//!
//! `ConsoleShell` is the read-eval-print loop. It reads a line (or a
//! multi-line block), short-circuits built-in commands, expands template
//! invocations and hands everything else to the `QueryExecutor`.
//!
//! Whatever ends the loop (quit, end of input, Ctrl-C), finalization runs
//! in the same order: farewell, save history, release the agent, print the
//! summary.

pub mod commands;
pub mod display;
pub mod input;
pub mod markdown;

use crate::agent::{Agent, AgentFactory, AgentProfile};
use crate::execution::QueryExecutor;
use crate::session::{CloseReason, SessionReporter, SessionStats, SessionSummary};
use crate::telemetry::TokenCostTracker;
use crate::templates::TemplateStore;
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use commands::{Command, MULTILINE_TRIGGER};
pub use display::{DisplayManager, ResetOutcome};
pub use input::{InputEvent, InputHandler, LineSource, MAX_HISTORY_SIZE};

/// Produces a future that resolves when the user interrupts a running query
pub type InterruptSignal = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

/// Interrupt on Ctrl-C
pub fn ctrl_c_signal() -> InterruptSignal {
    Box::new(|| {
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Could not listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
        .boxed()
    })
}

/// Where the shell is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    Idle,
    ReadingInput,
    DispatchingCommand,
    ResolvingTemplate,
    ExecutingQuery,
    Closed(CloseReason),
}

/// What a finished shell reports back
#[derive(Debug, Clone)]
pub struct ShellReport {
    pub session_id: Uuid,
    pub reason: CloseReason,
    pub queries: u32,
    pub failed: u32,
    /// `None` only if the summary was already emitted
    pub summary: Option<SessionSummary>,
}

/// Result of reading a multi-line block
enum Block {
    Text(String),
    Closed(CloseReason),
}

/// The read-eval-print loop
pub struct ConsoleShell {
    agent: Arc<dyn Agent>,
    factory: Option<AgentFactory>,
    profile: AgentProfile,
    executor: QueryExecutor,
    templates: TemplateStore,
    display: DisplayManager,
    input: Box<dyn LineSource>,
    interrupt: InterruptSignal,
    stats: SessionStats,
    tracker: TokenCostTracker,
    reporter: SessionReporter,
    state: ShellState,
}

impl ConsoleShell {
    /// `model_label` is the name used for pricing.
    pub fn new(
        agent: Arc<dyn Agent>,
        executor: QueryExecutor,
        templates: TemplateStore,
        display: DisplayManager,
        input: Box<dyn LineSource>,
        model_label: impl Into<String>,
    ) -> Self {
        let profile = agent.profile().clone();
        Self {
            agent,
            factory: None,
            profile,
            executor,
            templates,
            display,
            input,
            interrupt: ctrl_c_signal(),
            stats: SessionStats::new(),
            tracker: TokenCostTracker::new(model_label),
            reporter: SessionReporter::new(),
            state: ShellState::Idle,
        }
    }

    /// Enable agent session reset on `clear`
    pub fn with_factory(mut self, factory: AgentFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Replace the Ctrl-C listener used while a query runs
    pub fn with_interrupt(mut self, interrupt: InterruptSignal) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn state(&self) -> ShellState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn tracker(&self) -> &TokenCostTracker {
        &self.tracker
    }

    /// Run until the session closes, then finalize.
    pub async fn run(mut self) -> ShellReport {
        tracing::info!(session = %self.stats.id(), agent = %self.profile.name, "Session started");
        self.display
            .show_banner(&self.profile, &self.stats, &self.tracker);

        let reason = self.run_loop().await;
        self.finalize(reason).await
    }

    async fn run_loop(&mut self) -> CloseReason {
        loop {
            self.state = ShellState::ReadingInput;
            let prompt = self.display.user_prompt();
            let line = match self.read(&prompt) {
                Ok(line) => line,
                Err(reason) => return reason,
            };

            let trimmed = line.trim();
            if !trimmed.is_empty() {
                self.input.add_history(trimmed);
            }

            self.state = ShellState::DispatchingCommand;
            let query = match Command::parse(&line) {
                Command::Empty => continue,
                Command::Quit => return CloseReason::Quit,
                Command::Help => {
                    self.display.show_help(&self.profile);
                    continue;
                }
                Command::Info => {
                    self.display.show_info(&self.profile);
                    continue;
                }
                Command::Templates => {
                    self.display.show_templates(&self.templates);
                    continue;
                }
                Command::Clear => {
                    self.clear().await;
                    continue;
                }
                Command::MultiLine => match self.read_block() {
                    Block::Text(text) if text.trim().is_empty() => continue,
                    Block::Text(text) => text,
                    Block::Closed(reason) => return reason,
                },
                Command::Template { name, context } => {
                    self.state = ShellState::ResolvingTemplate;
                    match self.templates.resolve(&name, &context) {
                        Ok(Some(text)) => {
                            self.display.template_loaded(&name);
                            text
                        }
                        Ok(None) => {
                            self.display.template_missing(&name, &self.templates);
                            continue;
                        }
                        Err(e) => {
                            tracing::error!("Error loading template {}: {}", name, e);
                            self.display.template_error(&name, &e.to_string());
                            continue;
                        }
                    }
                }
                Command::Query(text) => text,
            };

            self.state = ShellState::ExecutingQuery;
            if let Some(reason) = self.execute(&query).await {
                return reason;
            }
            self.state = ShellState::Idle;
        }
    }

    /// One line from the input source; `Err` carries the close reason.
    fn read(&mut self, prompt: &str) -> Result<String, CloseReason> {
        match self.input.read_line(prompt) {
            Ok(InputEvent::Line(line)) => Ok(line),
            Ok(InputEvent::Interrupted) => Err(CloseReason::Interrupted),
            Ok(InputEvent::Eof) => Err(CloseReason::EndOfInput),
            Err(e) => {
                tracing::error!("Input failed: {}", e);
                Err(CloseReason::EndOfInput)
            }
        }
    }

    /// Collect lines until an empty one
    fn read_block(&mut self) -> Block {
        self.display.multiline_intro();
        let prompt = self.display.continuation_prompt();
        let mut lines = Vec::new();

        loop {
            match self.read(&prompt) {
                Ok(line) if line.trim().is_empty() => break,
                Ok(line) => lines.push(line),
                Err(reason) => return Block::Closed(reason),
            }
        }

        Block::Text(lines.join("\n"))
    }

    /// Run one query; returns a close reason if it was interrupted.
    ///
    /// An interrupt cancels the query and then waits for it to wind down,
    /// so the indicator is gone before anything else is printed.
    async fn execute(&mut self, query: &str) -> Option<CloseReason> {
        self.display.redraw_status(&self.stats, &self.tracker);

        let cancel = CancellationToken::new();
        let interrupt = (self.interrupt)();
        let outcome = {
            let run = self.executor.execute_until(
                &self.agent,
                query,
                &cancel,
                &mut self.tracker,
                &mut self.stats,
                &mut self.display,
            );
            tokio::pin!(run);
            let finished = tokio::select! {
                outcome = &mut run => Some(outcome),
                _ = interrupt => None,
            };
            match finished {
                Some(outcome) => outcome,
                None => {
                    cancel.cancel();
                    run.await
                }
            }
        };

        if outcome.was_interrupted() {
            Some(CloseReason::Interrupted)
        } else {
            None
        }
    }

    /// Clear the screen and, with a factory, swap in a fresh agent.
    async fn clear(&mut self) {
        self.display.clear_screen();

        let outcome = match &self.factory {
            None => ResetOutcome::NotAvailable,
            Some(factory) => match factory() {
                Ok(fresh) => {
                    if let Err(e) = self.agent.release().await {
                        tracing::debug!("Error releasing previous agent: {}", e);
                    }
                    self.agent = fresh;
                    self.profile = self.agent.profile().clone();
                    tracing::info!("Agent session reset via clear command");
                    ResetOutcome::Reset
                }
                Err(e) => {
                    tracing::error!("Failed to reset agent session: {}", e);
                    ResetOutcome::Failed(e.to_string())
                }
            },
        };

        self.display.show_cleared(&outcome);
        self.display
            .show_banner(&self.profile, &self.stats, &self.tracker);
    }

    async fn finalize(mut self, reason: CloseReason) -> ShellReport {
        self.state = ShellState::Closed(reason);
        self.stats.close(reason);
        self.display.farewell(reason);

        if let Err(e) = self.input.save_history() {
            tracing::warn!("Could not save history: {}", e);
        }

        if let Err(e) = self.agent.release().await {
            tracing::warn!("Error during agent cleanup: {}", e);
        }

        let summary = self.reporter.finish(&self.stats, &self.tracker);
        if let Some(summary) = &summary {
            self.display.show_summary(summary);
        }

        tracing::info!(
            session = %self.stats.id(),
            queries = self.stats.query_count(),
            failed = self.stats.failed_count(),
            reason = ?reason,
            "Session closed"
        );

        ShellReport {
            session_id: self.stats.id(),
            reason,
            queries: self.stats.query_count(),
            failed: self.stats.failed_count(),
            summary,
        }
    }
}
