//! Collector properties over every recognized event shape

mod common;

use chatloop::agent::Agent;
use chatloop::streaming::{IndicatorRenderer, StreamCollector, UsageInfo};
use common::{Script, ScriptedAgent};
use quickcheck_macros::quickcheck;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wrap a chunk in one of the recognized shapes
fn shaped(chunk: &str, shape: u8) -> Value {
    match shape % 5 {
        0 => json!(chunk),
        1 => json!({ "text": chunk }),
        2 => json!({ "content": [{ "text": chunk }] }),
        3 => json!({ "message": { "content": [{ "text": chunk }] } }),
        _ => json!({ "data": chunk }),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Tick,
    Clear,
    Text(String),
}

struct Recorder(Arc<Mutex<Vec<Entry>>>);

impl IndicatorRenderer for Recorder {
    fn interval(&self) -> Duration {
        Duration::from_millis(1)
    }

    fn tick(&mut self, _frame: usize) {
        self.0.lock().unwrap().push(Entry::Tick);
    }

    fn clear(&mut self) {
        self.0.lock().unwrap().push(Entry::Clear);
    }
}

fn recording_collector(log: &Arc<Mutex<Vec<Entry>>>) -> StreamCollector {
    let log = log.clone();
    StreamCollector::with_renderers(
        Duration::from_secs(5),
        Arc::new(move || Box::new(Recorder(log.clone())) as Box<dyn IndicatorRenderer>),
    )
}

#[quickcheck]
fn prop_text_is_concatenation_in_order(chunks: Vec<(String, u8)>) -> bool {
    let expected: String = chunks.iter().map(|(chunk, _)| chunk.as_str()).collect();
    let events: Vec<Value> = chunks
        .iter()
        .map(|(chunk, shape)| shaped(chunk, *shape))
        .collect();
    let agent: Arc<dyn Agent> = ScriptedAgent::new(vec![Script::Events(events)]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let collector = recording_collector(&log);

    let mut streamed = String::new();
    let response = runtime().block_on(async {
        collector
            .collect(&agent, "q", &mut |t: &str| streamed.push_str(t))
            .await
    });

    match response {
        Ok(response) => response.text == expected && streamed == expected,
        Err(_) => false,
    }
}

#[quickcheck]
fn prop_indicator_is_silent_after_first_content(chunks: Vec<String>) -> bool {
    let events: Vec<Value> = chunks.iter().map(|chunk| json!(chunk)).collect();
    let agent: Arc<dyn Agent> = ScriptedAgent::new(vec![Script::Events(events)]);

    let log = Arc::new(Mutex::new(Vec::new()));
    let collector = recording_collector(&log);

    let sink = log.clone();
    let result = runtime().block_on(async {
        collector
            .collect(&agent, "q", &mut |t: &str| {
                sink.lock().unwrap().push(Entry::Text(t.to_string()))
            })
            .await
    });
    if result.is_err() {
        return false;
    }

    let entries = log.lock().unwrap().clone();
    let clears = entries.iter().filter(|e| **e == Entry::Clear).count();
    let first_text = entries.iter().position(|e| matches!(e, Entry::Text(_)));
    let last_indicator = entries
        .iter()
        .rposition(|e| matches!(e, Entry::Tick | Entry::Clear));

    let ordered = match (first_text, last_indicator) {
        (Some(text), Some(indicator)) => indicator < text,
        _ => true,
    };
    clears == 1 && ordered
}

#[tokio::test]
async fn test_hello_scenario() {
    let agent: Arc<dyn Agent> = ScriptedAgent::new(vec![Script::reply(&["Hel", "lo"], 10, 2)]);
    let log = Arc::new(Mutex::new(Vec::new()));

    let response = recording_collector(&log)
        .collect(&agent, "greet", &mut |_: &str| {})
        .await
        .unwrap();

    assert_eq!(response.text, "Hello");
    assert_eq!(response.usage, Some(UsageInfo::new(10, 2)));
}

#[tokio::test]
async fn test_terminal_metrics_usage() {
    let agent: Arc<dyn Agent> = ScriptedAgent::new(vec![Script::Events(vec![
        json!({ "data": "answer" }),
        json!({ "result": { "metrics": { "accumulated_usage": {
            "inputTokens": 120, "outputTokens": 30
        } } } }),
    ])]);
    let log = Arc::new(Mutex::new(Vec::new()));

    let response = recording_collector(&log)
        .collect(&agent, "q", &mut |_: &str| {})
        .await
        .unwrap();

    assert_eq!(response.text, "answer");
    assert_eq!(response.usage, Some(UsageInfo::new(120, 30)));
}

#[tokio::test]
async fn test_failure_stops_indicator() {
    let agent: Arc<dyn Agent> = ScriptedAgent::new(vec![Script::rate_limited()]);
    let log = Arc::new(Mutex::new(Vec::new()));

    let failure = recording_collector(&log)
        .collect(&agent, "q", &mut |_: &str| {})
        .await
        .unwrap_err();

    assert!(failure.error.to_string().contains("rate limit"));
    assert_eq!(log.lock().unwrap().last(), Some(&Entry::Clear));
}
