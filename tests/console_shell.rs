//! End-to-end console sessions against a scripted agent

mod common;

use chatloop::agent::{Agent, AgentFactory};
use chatloop::errors::ConsoleError;
use chatloop::recovery::RetryPolicy;
use chatloop::repl::{ConsoleShell, InputEvent};
use chatloop::session::CloseReason;
use chatloop::streaming::{IndicatorRenderer, StreamCollector};
use chatloop::templates::TemplateStore;
use chatloop::QueryExecutor;
use common::{display, silent_collector, Capture, Script, ScriptedAgent, ScriptedInput};
use futures_util::FutureExt;
use std::fs;
use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Session {
    _root: TempDir,
    capture: Capture,
    shell: ConsoleShell,
}

fn session(agent: &Arc<ScriptedAgent>, input: ScriptedInput) -> Session {
    session_with(agent, input, |_| silent_collector(Duration::from_secs(5)))
}

/// `collector` gets the capture the display writes into
fn session_with(
    agent: &Arc<ScriptedAgent>,
    input: ScriptedInput,
    collector: impl FnOnce(&Capture) -> StreamCollector,
) -> Session {
    let root = TempDir::new().unwrap();
    let prompts = root.path().join("prompts");
    fs::create_dir_all(&prompts).unwrap();
    fs::write(prompts.join("review.md"), "# Code review\nReview: {input}").unwrap();
    fs::write(prompts.join("plain.md"), "Summarize this.").unwrap();

    let capture = Capture::default();
    let collector = collector(&capture);
    let agent: Arc<dyn Agent> = agent.clone();
    let shell = ConsoleShell::new(
        agent,
        QueryExecutor::new(collector, RetryPolicy::new(3, Duration::ZERO)),
        TemplateStore::new(prompts),
        display(&capture, root.path()),
        Box::new(input),
        "llama3.1:8b",
    );

    Session {
        _root: root,
        capture,
        shell,
    }
}

#[tokio::test]
async fn test_query_then_quit() {
    let agent = ScriptedAgent::new(vec![Script::reply(&["Hel", "lo"], 10, 2)]);
    let input = ScriptedInput::lines(&["help", "hello there", "quit"]);
    let saved = input.saved.clone();
    let s = session(&agent, input);

    let report = s.shell.run().await;
    let text = s.capture.text();

    assert_eq!(report.reason, CloseReason::Quit);
    assert_eq!(report.queries, 1);
    assert_eq!(agent.queries(), vec!["hello there"]);
    assert!(text.contains("HELPER - Help"));
    assert!(text.contains("Helper: Hello"));
    assert!(text.contains("Goodbye! Thanks for using Helper!"));
    assert!(text.contains("Tokens: 12 (in: 10, out: 2)"));

    // finalization: history saved, agent released, summary once
    assert!(saved.load(Ordering::SeqCst));
    assert_eq!(agent.releases(), 1);
    assert_eq!(text.matches("Session Summary").count(), 1);
    assert!(text.contains("Queries: 1"));
    assert!(text.contains("Helper session complete!"));
}

#[tokio::test]
async fn test_end_of_input_still_finalizes() {
    let agent = ScriptedAgent::new(Vec::new());
    let s = session(&agent, ScriptedInput::lines(&[]));

    let report = s.shell.run().await;
    let text = s.capture.text();

    assert_eq!(report.reason, CloseReason::EndOfInput);
    assert!(report.summary.is_some());
    assert!(text.contains("Chat ended. Thanks for using Helper!"));
    assert_eq!(text.matches("Session Summary").count(), 1);
    assert_eq!(agent.releases(), 1);
    assert_eq!(agent.invocations(), 0);
}

#[tokio::test]
async fn test_interrupt_at_prompt() {
    let agent = ScriptedAgent::new(Vec::new());
    let input = ScriptedInput::events(vec![
        InputEvent::Line("first".to_string()),
        InputEvent::Interrupted,
        InputEvent::Line("never read".to_string()),
    ]);
    let saved = input.saved.clone();
    let s = session(&agent, input);

    let report = s.shell.run().await;
    let text = s.capture.text();

    assert_eq!(report.reason, CloseReason::Interrupted);
    assert_eq!(report.queries, 1);
    assert!(text.contains("Chat interrupted. Thanks for using Helper!"));
    assert_eq!(text.matches("Session Summary").count(), 1);
    assert!(saved.load(Ordering::SeqCst));
    assert_eq!(agent.queries(), vec!["first"]);
}

/// Indicator that draws markers into the captured output
struct Marker(Capture);

impl IndicatorRenderer for Marker {
    fn interval(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn tick(&mut self, _frame: usize) {
        let _ = write!(self.0, "[thinking]");
    }

    fn clear(&mut self) {
        let _ = write!(self.0, "[cleared]");
    }
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_during_query_clears_indicator_first() {
    let agent = ScriptedAgent::new(vec![Script::Stall]);
    let input = ScriptedInput::lines(&["a slow question", "never read"]);
    let saved = input.saved.clone();
    let s = session_with(&agent, input, |capture| {
        let marks = capture.clone();
        StreamCollector::with_renderers(
            Duration::from_secs(30),
            Arc::new(move || Box::new(Marker(marks.clone())) as Box<dyn IndicatorRenderer>),
        )
    });
    let shell = s
        .shell
        .with_interrupt(Box::new(|| tokio::time::sleep(Duration::from_millis(350)).boxed()));

    let report = shell.run().await;
    let text = s.capture.text();

    assert_eq!(report.reason, CloseReason::Interrupted);
    assert_eq!(report.queries, 0);
    assert_eq!(agent.queries(), vec!["a slow question"]);

    let cleared = text.rfind("[cleared]").unwrap();
    let farewell = text.find("Chat interrupted").unwrap();
    assert!(cleared < farewell);
    assert!(text.contains("[thinking]"));
    assert_eq!(text.matches("Session Summary").count(), 1);
    assert!(saved.load(Ordering::SeqCst));
    assert_eq!(agent.releases(), 1);
}

#[tokio::test]
async fn test_template_substitution() {
    let agent = ScriptedAgent::new(Vec::new());
    let s = session(
        &agent,
        ScriptedInput::lines(&["/review foo.py", "/plain some notes", "/plain", "exit"]),
    );

    s.shell.run().await;

    assert_eq!(
        agent.queries(),
        vec![
            "# Code review\nReview: foo.py",
            "Summarize this.\n\nsome notes",
            "Summarize this.",
        ]
    );
    assert!(s.capture.text().contains("✓ Loaded template: review"));
}

#[tokio::test]
async fn test_missing_template_is_not_sent() {
    let agent = ScriptedAgent::new(Vec::new());
    let s = session(&agent, ScriptedInput::lines(&["/nope context", "bye"]));

    let report = s.shell.run().await;
    let text = s.capture.text();

    assert_eq!(report.queries, 0);
    assert_eq!(agent.invocations(), 0);
    assert!(text.contains("Template not found: nope"));
    assert!(text.contains("Available templates: plain, review"));
    assert!(text.contains("nope.md"));
}

#[tokio::test]
async fn test_multiline_block_is_one_query() {
    let agent = ScriptedAgent::new(Vec::new());
    let s = session(
        &agent,
        ScriptedInput::lines(&["\\\\", "fn main() {", "    println!(\"hi\");", "}", "", "quit"]),
    );

    let report = s.shell.run().await;

    assert_eq!(report.queries, 1);
    assert_eq!(
        agent.queries(),
        vec!["fn main() {\n    println!(\"hi\");\n}"]
    );
    assert!(s
        .capture
        .text()
        .contains("Multi-line mode (empty line to submit):"));
}

#[tokio::test]
async fn test_empty_multiline_block_is_skipped() {
    let agent = ScriptedAgent::new(Vec::new());
    let s = session(&agent, ScriptedInput::lines(&["\\\\", "", "quit"]));

    let report = s.shell.run().await;
    assert_eq!(report.queries, 0);
    assert_eq!(agent.invocations(), 0);
}

#[tokio::test]
async fn test_query_failure_keeps_shell_alive() {
    let agent = ScriptedAgent::new(vec![
        Script::Fail(chatloop::AgentError::Other("model not found".to_string())),
        Script::reply(&["recovered"], 1, 1),
    ]);
    let s = session(&agent, ScriptedInput::lines(&["one", "two", "quit"]));

    let report = s.shell.run().await;
    let text = s.capture.text();

    assert_eq!(report.queries, 2);
    assert_eq!(report.failed, 1);
    assert!(text.contains("Helper: Query failed - model not found"));
    assert!(text.contains("Helper: recovered"));
}

#[tokio::test]
async fn test_clear_resets_agent_with_factory() {
    let first = ScriptedAgent::new(Vec::new());
    let second = ScriptedAgent::new(vec![Script::reply(&["fresh"], 1, 1)]);

    let handed_out = second.clone();
    let factory: AgentFactory = Box::new(move || {
        let agent: Arc<dyn Agent> = handed_out.clone();
        Ok(agent)
    });

    let s = session(&first, ScriptedInput::lines(&["clear", "after reset", "quit"]));
    let shell = s.shell.with_factory(factory);

    shell.run().await;
    let text = s.capture.text();

    assert!(text.contains("✓ Screen cleared and agent session reset"));
    assert_eq!(first.releases(), 1);
    assert_eq!(first.invocations(), 0);
    assert_eq!(second.queries(), vec!["after reset"]);
    assert_eq!(second.releases(), 1);
}

#[tokio::test]
async fn test_clear_keeps_agent_when_factory_fails() {
    let agent = ScriptedAgent::new(Vec::new());
    let factory: AgentFactory =
        Box::new(|| Err(ConsoleError::Config("endpoint unreachable".to_string())));

    let s = session(&agent, ScriptedInput::lines(&["clear", "still here", "quit"]));
    let shell = s.shell.with_factory(factory);

    shell.run().await;
    let text = s.capture.text();

    assert!(text.contains("Could not reset agent session"));
    assert!(text.contains("Screen cleared but agent session maintained"));
    assert_eq!(agent.queries(), vec!["still here"]);
    assert_eq!(agent.releases(), 1);
}

#[tokio::test]
async fn test_clear_without_factory() {
    let agent = ScriptedAgent::new(Vec::new());
    let s = session(&agent, ScriptedInput::lines(&["CLEAR", "quit"]));

    s.shell.run().await;

    let text = s.capture.text();
    assert!(text.contains("✓ Screen cleared"));
    assert!(!text.contains("agent session reset"));
    assert_eq!(agent.releases(), 1);
}

#[tokio::test]
async fn test_history_records_non_empty_lines() {
    let agent = ScriptedAgent::new(Vec::new());
    let input = ScriptedInput::lines(&["  ", "info", "question", "quit"]);
    let history = input.history.clone();
    let s = session(&agent, input);

    s.shell.run().await;

    assert_eq!(
        *history.lock().unwrap(),
        vec!["info", "question", "quit"]
    );
    assert!(s.capture.text().contains("HELPER - Information"));
}
