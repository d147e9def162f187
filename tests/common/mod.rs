//! Shared fixtures for integration tests
#![allow(dead_code)]

use chatloop::agent::{Agent, AgentProfile, EventStream};
use chatloop::cli::{FeatureFlags, Palette, PathsConfig};
use chatloop::errors::{AgentError, Result as ConsoleResult};
use chatloop::execution::{QueryFailure, QueryReporter};
use chatloop::recovery::RetryAttempt;
use chatloop::repl::{DisplayManager, InputEvent, LineSource};
use chatloop::streaming::{CollectedResponse, IndicatorRenderer, SilentRenderer, StreamCollector};
use chatloop::telemetry::TokenCostTracker;
use futures_util::stream;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What one invocation of the scripted agent does
pub enum Script {
    /// Yield these events, then end
    Events(Vec<Value>),
    /// Fail on the first event
    Fail(AgentError),
    /// Yield these text chunks, then fail
    Partial(Vec<&'static str>, AgentError),
    /// Never yield anything
    Stall,
}

impl Script {
    /// Text chunks followed by a terminal usage event
    pub fn reply(chunks: &[&str], input: u64, output: u64) -> Self {
        let mut events: Vec<Value> = chunks.iter().map(|c| json!(c)).collect();
        events.push(json!({
            "usage": {"input_tokens": input, "output_tokens": output}
        }));
        Script::Events(events)
    }

    pub fn rate_limited() -> Self {
        Script::Fail(AgentError::Other("rate limit exceeded".to_string()))
    }
}

/// Streaming agent that plays back one script per invocation
pub struct ScriptedAgent {
    profile: AgentProfile,
    scripts: Mutex<VecDeque<Script>>,
    queries: Mutex<Vec<String>>,
    invocations: AtomicUsize,
    releases: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            profile: AgentProfile::new("Helper", "Answers questions").with_model("llama3.1:8b"),
            scripts: Mutex::new(scripts.into()),
            queries: Mutex::new(Vec::new()),
            invocations: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        })
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Agent for ScriptedAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn stream(&self, query: &str) -> Option<EventStream> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::Events(vec![json!("ok")]));

        let events: EventStream = match script {
            Script::Events(events) => {
                Box::pin(stream::iter(events.into_iter().map(Ok::<Value, AgentError>)))
            }
            Script::Fail(error) => Box::pin(stream::iter(vec![Err::<Value, AgentError>(error)])),
            Script::Partial(chunks, error) => {
                let mut items: Vec<std::result::Result<Value, AgentError>> =
                    chunks.into_iter().map(|c| Ok(json!(c))).collect();
                items.push(Err(error));
                Box::pin(stream::iter(items))
            }
            Script::Stall => Box::pin(stream::pending::<std::result::Result<Value, AgentError>>()),
        };
        Some(events)
    }

    async fn release(&self) -> std::result::Result<(), AgentError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn silent_collector(timeout: Duration) -> StreamCollector {
    StreamCollector::with_renderers(
        timeout,
        Arc::new(|| Box::new(SilentRenderer) as Box<dyn IndicatorRenderer>),
    )
}

/// Everything a query reported, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Reported {
    Fragment(String),
    Discarded,
    Retry { attempt: u32, wait: Duration },
    GaveUp { attempt: u32 },
    Completed(String),
    Failed(String),
    Interrupted,
}

#[derive(Default)]
pub struct RecordingReporter {
    pub events: Vec<Reported>,
}

impl QueryReporter for RecordingReporter {
    fn fragment(&mut self, text: &str) {
        self.events.push(Reported::Fragment(text.to_string()));
    }

    fn discard_partial(&mut self) {
        self.events.push(Reported::Discarded);
    }

    fn attempt_failed(&mut self, attempt: &RetryAttempt, _max_attempts: u32, will_retry: bool) {
        self.events.push(if will_retry {
            Reported::Retry {
                attempt: attempt.attempt_number,
                wait: attempt.wait,
            }
        } else {
            Reported::GaveUp {
                attempt: attempt.attempt_number,
            }
        });
    }

    fn query_completed(&mut self, response: &CollectedResponse, _tracker: &TokenCostTracker) {
        self.events.push(Reported::Completed(response.text.clone()));
    }

    fn query_failed(&mut self, failure: &QueryFailure) {
        self.events.push(Reported::Failed(failure.error.to_string()));
    }

    fn query_interrupted(&mut self) {
        self.events.push(Reported::Interrupted);
    }
}

/// Input source playing back fixed events, then end of input
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
    pub history: Arc<Mutex<Vec<String>>>,
    pub saved: Arc<AtomicBool>,
}

impl ScriptedInput {
    pub fn lines(lines: &[&str]) -> Self {
        Self::events(
            lines
                .iter()
                .map(|line| InputEvent::Line(line.to_string()))
                .collect(),
        )
    }

    pub fn events(events: Vec<InputEvent>) -> Self {
        Self {
            events: events.into(),
            history: Arc::new(Mutex::new(Vec::new())),
            saved: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl LineSource for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> ConsoleResult<InputEvent> {
        Ok(self.events.pop_front().unwrap_or(InputEvent::Eof))
    }

    fn add_history(&mut self, line: &str) {
        self.history.lock().unwrap().push(line.to_string());
    }

    fn save_history(&mut self) -> ConsoleResult<()> {
        self.saved.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Writer whose contents can be read back
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn features() -> FeatureFlags {
    FeatureFlags {
        auto_save: false,
        show_metadata: true,
        show_tokens: true,
        show_duration: true,
        show_banner: true,
        show_status_bar: false,
        rich_enabled: false,
    }
}

pub fn paths(root: &Path) -> PathsConfig {
    PathsConfig {
        prompts_dir: root.join("prompts"),
        log_dir: root.join("logs"),
        history_file: root.join("history"),
        save_location: root.join("saved"),
    }
}

/// Uncolored display writing into `capture`
pub fn display(capture: &Capture, root: &Path) -> DisplayManager {
    colored::control::set_override(false);
    DisplayManager::with_writer(
        Box::new(capture.clone()),
        "Helper",
        Palette::default(),
        features(),
        paths(root),
    )
}
