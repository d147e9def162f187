//! Ollama-compatible HTTP agent
//!
//! - Streaming: POST /api/chat, newline-delimited JSON frames
//! - Blocking: POST /api/chat with `stream: false`
//!
//! The agent keeps the conversation so far and sends it with every
//! request. An exchange is remembered only once the final frame (or the
//! blocking response) has arrived, so a failed attempt leaves no trace and
//! its retry sends the same history. `release` forgets everything.
//!
//! Provider frames are rewritten into the generic event shapes before they
//! leave this module: text chunks become `{"text": ...}` and the final frame
//! becomes a terminal object with a `usage` member.

use super::{Agent, AgentProfile, EventStream};
use crate::agent::loader::AgentMode;
use crate::errors::AgentError;
use crate::streaming::FrameParser;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{future, stream, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Connect timeout for both request shapes
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Conversation so far, oldest first
type History = Arc<Mutex<Vec<ChatMessage>>>;

/// Ollama agent
#[derive(Debug, Clone)]
pub struct OllamaAgent {
    profile: AgentProfile,
    client: Client,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
    mode: AgentMode,
    request_timeout: Duration,
    history: History,
}

impl OllamaAgent {
    /// Create an agent. `request_timeout` bounds blocking calls, which the
    /// engine cannot cancel once started.
    pub fn new(
        profile: AgentProfile,
        base_url: &str,
        system_prompt: Option<String>,
        mode: AgentMode,
        request_timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AgentError::from_reqwest(e, request_timeout))?;
        let model = profile.model_id.clone().unwrap_or_default();

        Ok(Self {
            profile,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            system_prompt,
            mode,
            request_timeout,
            history: Arc::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    /// Number of remembered messages, user and assistant
    pub fn history_len(&self) -> usize {
        lock(&self.history).len()
    }

    fn options(&self) -> Option<Value> {
        let mut options = serde_json::Map::new();
        if let Some(temperature) = self.profile.temperature {
            options.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = self.profile.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tokens));
        }
        if options.is_empty() {
            None
        } else {
            Some(Value::Object(options))
        }
    }

    fn chat_request(&self, query: &str, stream: bool) -> ChatRequest {
        let mut messages = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::new("system", system.clone()));
        }
        messages.extend(lock(&self.history).iter().cloned());
        messages.push(ChatMessage::new("user", query));

        ChatRequest {
            model: self.model.clone(),
            messages,
            stream,
            options: self.options(),
        }
    }

    fn turn(&self, query: &str) -> ChatTurn {
        ChatTurn::new(Arc::clone(&self.history), query)
    }

    fn transport(&self) -> impl Fn(reqwest::Error) -> AgentError {
        let timeout = self.request_timeout;
        move |e| AgentError::from_reqwest(e, timeout)
    }
}

#[async_trait]
impl Agent for OllamaAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn stream(&self, query: &str) -> Option<EventStream> {
        if self.mode != AgentMode::Stream {
            return None;
        }

        let url = format!("{}/api/chat", self.base_url);
        let request = self.client.post(url).json(&self.chat_request(query, true));
        let events = stream::once(open_stream(request, self.request_timeout, self.turn(query)))
            .try_flatten();
        Some(Box::pin(events))
    }

    fn call(&self, query: &str) -> Result<Value, AgentError> {
        if self.mode != AgentMode::Blocking {
            return Err(AgentError::Unsupported("blocking calls"));
        }

        // Built per call: a blocking client must not be dropped on the runtime
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(self.request_timeout)
            .build()
            .map_err(self.transport())?;

        let url = format!("{}/api/chat", self.base_url);
        let response = client
            .post(url)
            .json(&self.chat_request(query, false))
            .send()
            .map_err(self.transport())?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().map_err(self.transport())?;
        let event = translate_chat_response(&body)?;
        let mut turn = self.turn(query);
        turn.observe(body)?;
        turn.commit();
        Ok(event)
    }

    async fn release(&self) -> Result<(), AgentError> {
        let forgotten = {
            let mut history = lock(&self.history);
            let count = history.len();
            history.clear();
            count
        };
        tracing::debug!(messages = forgotten, "Conversation released");
        Ok(())
    }
}

fn lock(history: &History) -> std::sync::MutexGuard<'_, Vec<ChatMessage>> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One exchange in flight: frames in, events out, history updated on the
/// final frame
struct ChatTurn {
    history: History,
    query: String,
    reply: String,
    done: bool,
    parser: FrameParser,
}

impl ChatTurn {
    fn new(history: History, query: &str) -> Self {
        Self {
            history,
            query: query.to_string(),
            reply: String::new(),
            done: false,
            parser: FrameParser::new(),
        }
    }

    /// Feed raw body bytes; returns the events they complete.
    fn push(&mut self, bytes: &[u8]) -> Result<Vec<Value>, AgentError> {
        self.parser
            .push(bytes)?
            .into_iter()
            .map(|frame| self.observe(frame))
            .collect()
    }

    /// The body ended; anything short of a complete final frame is an error.
    fn finish(&mut self) -> Result<Vec<Value>, AgentError> {
        if !self.parser.is_drained() {
            return Err(AgentError::Protocol(format!(
                "response ended inside a frame ({} bytes left)",
                self.parser.buffer_size()
            )));
        }
        if !self.done {
            return Err(AgentError::Protocol(
                "response ended before the final frame".to_string(),
            ));
        }
        Ok(Vec::new())
    }

    fn observe(&mut self, frame: Value) -> Result<Value, AgentError> {
        let event = translate_chat_frame(&frame)?;
        if let Some(text) = frame.pointer("/message/content").and_then(Value::as_str) {
            self.reply.push_str(text);
        }
        if frame.get("done").and_then(Value::as_bool) == Some(true) {
            self.commit();
        }
        Ok(event)
    }

    fn commit(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        let mut history = lock(&self.history);
        history.push(ChatMessage::new("user", std::mem::take(&mut self.query)));
        history.push(ChatMessage::new("assistant", std::mem::take(&mut self.reply)));
    }
}

async fn open_stream(
    request: RequestBuilder,
    timeout: Duration,
    mut turn: ChatTurn,
) -> Result<impl futures_util::Stream<Item = Result<Value, AgentError>>, AgentError> {
    let response = request
        .send()
        .await
        .map_err(|e| AgentError::from_reqwest(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AgentError::Api {
            status: status.as_u16(),
            message,
        });
    }

    // `None` marks the end of the body
    let chunks = response
        .bytes_stream()
        .map(Some)
        .chain(stream::once(future::ready(None)));

    let events = chunks
        .map(move |chunk: Option<Result<Bytes, reqwest::Error>>| match chunk {
            Some(chunk) => {
                let bytes = chunk.map_err(|e| AgentError::from_reqwest(e, timeout))?;
                turn.push(&bytes)
            }
            None => turn.finish(),
        })
        .map_ok(|events| stream::iter(events.into_iter().map(Ok::<Value, AgentError>)))
        .try_flatten();

    Ok(events)
}

/// Rewrite one streamed /api/chat frame into a generic event.
pub fn translate_chat_frame(frame: &Value) -> Result<Value, AgentError> {
    if let Some(error) = frame.get("error").and_then(Value::as_str) {
        return Err(AgentError::Other(error.to_string()));
    }

    let text = frame
        .pointer("/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if frame.get("done").and_then(Value::as_bool) != Some(true) {
        return Ok(json!({ "text": text }));
    }

    let mut terminal = json!({ "done": true, "usage": usage_of(frame) });
    if !text.is_empty() {
        terminal["text"] = json!(text);
    }
    Ok(terminal)
}

/// Rewrite a blocking /api/chat response into a message event with usage.
pub fn translate_chat_response(response: &Value) -> Result<Value, AgentError> {
    if let Some(error) = response.get("error").and_then(Value::as_str) {
        return Err(AgentError::Other(error.to_string()));
    }

    match response.get("message") {
        Some(message) if message.is_object() => Ok(json!({
            "message": message,
            "usage": usage_of(response),
        })),
        _ => Err(AgentError::Protocol(
            "chat response has no message".to_string(),
        )),
    }
}

fn usage_of(frame: &Value) -> Value {
    json!({
        "input_tokens": frame.get("prompt_eval_count").and_then(Value::as_u64).unwrap_or(0),
        "output_tokens": frame.get("eval_count").and_then(Value::as_u64).unwrap_or(0),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::{ResponseEvent, UsageInfo};

    fn agent(mode: AgentMode) -> OllamaAgent {
        let mut profile = AgentProfile::new("Ollie", "Local model").with_model("llama3.1:8b");
        profile.temperature = Some(0.2);
        profile.max_tokens = Some(512);
        OllamaAgent::new(
            profile,
            "http://localhost:11434/",
            Some("Be brief.".to_string()),
            mode,
            Duration::from_secs(30),
        )
        .unwrap()
    }

    fn frame(content: &str, done: bool) -> Vec<u8> {
        let mut line = json!({
            "message": {"role": "assistant", "content": content},
            "done": done,
        })
        .to_string();
        line.push('\n');
        line.into_bytes()
    }

    fn roles(request: &Value) -> Vec<(String, String)> {
        request["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| {
                (
                    m["role"].as_str().unwrap().to_string(),
                    m["content"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn test_agent_creation() {
        let agent = agent(AgentMode::Stream);
        assert_eq!(agent.base_url(), "http://localhost:11434");
        assert_eq!(agent.profile().name, "Ollie");
        assert_eq!(agent.history_len(), 0);
    }

    #[test]
    fn test_chat_request_carries_options() {
        let request =
            serde_json::to_value(agent(AgentMode::Stream).chat_request("hi", true)).unwrap();
        assert_eq!(request["model"], "llama3.1:8b");
        assert_eq!(request["stream"], true);
        assert_eq!(request["options"]["num_predict"], 512);
        assert_eq!(
            roles(&request),
            vec![
                ("system".to_string(), "Be brief.".to_string()),
                ("user".to_string(), "hi".to_string()),
            ]
        );
    }

    #[test]
    fn test_second_request_carries_first_exchange() {
        let agent = agent(AgentMode::Stream);

        let mut turn = agent.turn("what is 2+2?");
        let mut body = frame("It is ", false);
        body.extend(frame("4.", false));
        body.extend(frame("", true));
        let events = turn.push(&body).unwrap();
        assert_eq!(events.len(), 3);
        assert!(turn.finish().unwrap().is_empty());

        let request = serde_json::to_value(agent.chat_request("and 3+3?", true)).unwrap();
        assert_eq!(
            roles(&request),
            vec![
                ("system".to_string(), "Be brief.".to_string()),
                ("user".to_string(), "what is 2+2?".to_string()),
                ("assistant".to_string(), "It is 4.".to_string()),
                ("user".to_string(), "and 3+3?".to_string()),
            ]
        );
    }

    #[test]
    fn test_unfinished_turn_is_not_remembered() {
        let agent = agent(AgentMode::Stream);

        let mut turn = agent.turn("hello");
        turn.push(&frame("Hi", false)).unwrap();
        let err = turn.finish().unwrap_err();

        assert!(matches!(err, AgentError::Protocol(_)));
        assert_eq!(agent.history_len(), 0);
    }

    #[test]
    fn test_body_ending_mid_frame_is_a_protocol_error() {
        let agent = agent(AgentMode::Stream);

        let mut turn = agent.turn("hello");
        let mut body = frame("Hi", false);
        body.extend_from_slice(br#"{"message":{"content":"the"#);
        let events = turn.push(&body).unwrap();
        assert_eq!(events.len(), 1);

        match turn.finish() {
            Err(AgentError::Protocol(message)) => assert!(message.contains("inside a frame")),
            other => panic!("expected protocol error, got {:?}", other),
        }
        assert_eq!(agent.history_len(), 0);
    }

    #[tokio::test]
    async fn test_release_forgets_the_conversation() {
        let agent = agent(AgentMode::Stream);
        let mut turn = agent.turn("hello");
        turn.push(&frame("Hi", true)).unwrap();
        assert_eq!(agent.history_len(), 2);

        agent.release().await.unwrap();

        assert_eq!(agent.history_len(), 0);
        let request = serde_json::to_value(agent.chat_request("again", true)).unwrap();
        assert_eq!(roles(&request).len(), 2);
    }

    #[test]
    fn test_shape_follows_mode() {
        assert!(agent(AgentMode::Blocking).stream("hi").is_none());
        assert!(matches!(
            agent(AgentMode::Stream).call("hi"),
            Err(AgentError::Unsupported(_))
        ));
    }

    #[test]
    fn test_chat_frames_translate_to_events() {
        let chunk = translate_chat_frame(&json!({
            "message": {"role": "assistant", "content": "Hel"}, "done": false
        }))
        .unwrap();
        let event = ResponseEvent::from_value(chunk).unwrap();
        assert_eq!(event.extract_text().unwrap(), Some("Hel".to_string()));

        let last = translate_chat_frame(&json!({
            "message": {"role": "assistant", "content": ""},
            "done": true, "prompt_eval_count": 10, "eval_count": 2
        }))
        .unwrap();
        let event = ResponseEvent::from_value(last).unwrap();
        assert!(matches!(event, ResponseEvent::Terminal(_)));
        assert_eq!(event.usage(), Some(UsageInfo::new(10, 2)));
    }

    #[test]
    fn test_error_frame_fails() {
        let err = translate_chat_frame(&json!({"error": "model not found"})).unwrap_err();
        assert_eq!(err.to_string(), "model not found");
    }

    #[test]
    fn test_chat_response_translation() {
        let value = translate_chat_response(&json!({
            "message": {"role": "assistant", "content": "Hello"},
            "done": true,
            "prompt_eval_count": 7,
            "eval_count": 3
        }))
        .unwrap();
        let event = ResponseEvent::from_value(value).unwrap();
        assert_eq!(event.extract_text().unwrap(), Some("Hello".to_string()));
        assert_eq!(event.usage(), Some(UsageInfo::new(7, 3)));
    }
}
