//! One agent invocation, start to finish
//!
//! The collector starts the thinking indicator, drives whichever shape the
//! agent supports, and forwards text fragments to the caller in arrival
//! order. The indicator is stopped and joined before the first fragment is
//! handed over, and on every failure path before the error is returned.

use super::events::{AgentMetrics, ResponseEvent, UsageInfo};
use super::indicator::{IndicatorConfig, IndicatorRenderer, ThinkingIndicator};
use crate::agent::Agent;
use crate::errors::AgentError;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Produces a renderer for each invocation
pub type RendererFactory = Arc<dyn Fn() -> Box<dyn IndicatorRenderer> + Send + Sync>;

/// Successful invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedResponse {
    /// Concatenation of every text fragment, in arrival order
    pub text: String,
    pub duration: Duration,
    pub usage: Option<UsageInfo>,
    /// Agent loop counters from the terminal event, when reported
    pub metrics: Option<AgentMetrics>,
}

/// Failed invocation, tagged with the time spent before it failed
#[derive(Debug)]
pub struct CollectFailure {
    pub error: AgentError,
    pub duration: Duration,
}

/// Streaming response collector
#[derive(Clone)]
pub struct StreamCollector {
    timeout: Duration,
    renderers: RendererFactory,
}

impl StreamCollector {
    pub fn new(timeout: Duration, indicator: IndicatorConfig) -> Self {
        Self::with_renderers(timeout, Arc::new(move || indicator.renderer()))
    }

    pub fn with_renderers(timeout: Duration, renderers: RendererFactory) -> Self {
        Self { timeout, renderers }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one invocation bounded by the configured timeout.
    pub async fn collect(
        &self,
        agent: &Arc<dyn Agent>,
        query: &str,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<CollectedResponse, CollectFailure> {
        self.collect_until(agent, query, &CancellationToken::new(), on_text)
            .await
    }

    /// Like `collect`, but gives up with `AgentError::Interrupted` as soon
    /// as `cancel` fires. The indicator is stopped either way.
    pub async fn collect_until(
        &self,
        agent: &Arc<dyn Agent>,
        query: &str,
        cancel: &CancellationToken,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<CollectedResponse, CollectFailure> {
        let started = Instant::now();
        let mut indicator = Some(ThinkingIndicator::start((self.renderers)()));

        let driven = tokio::time::timeout(
            self.timeout,
            self.drive(agent, query, &mut indicator, on_text),
        );
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Interrupted),
            result = driven => match result {
                Ok(inner) => inner,
                Err(_) => Err(AgentError::Timeout {
                    duration_ms: self.timeout.as_millis() as u64,
                }),
            },
        };

        if let Some(indicator) = indicator.take() {
            indicator.stop().await;
        }
        let duration = started.elapsed();

        match outcome {
            Ok((text, usage, metrics)) => Ok(CollectedResponse {
                text,
                duration,
                usage,
                metrics,
            }),
            Err(error) => Err(CollectFailure { error, duration }),
        }
    }

    async fn drive(
        &self,
        agent: &Arc<dyn Agent>,
        query: &str,
        indicator: &mut Option<ThinkingIndicator>,
        on_text: &mut dyn FnMut(&str),
    ) -> Result<(String, Option<UsageInfo>, Option<AgentMetrics>), AgentError> {
        let mut text = String::new();

        let last = match agent.stream(query) {
            Some(mut events) => {
                let mut last = None;
                while let Some(item) = events.next().await {
                    let event = ResponseEvent::from_value(item?)?;
                    if let Some(fragment) = event.extract_text()? {
                        emit(&fragment, indicator, on_text, &mut text).await;
                    }
                    last = Some(event);
                }
                last
            }
            None => {
                let worker = Arc::clone(agent);
                let owned = query.to_string();
                let response = tokio::task::spawn_blocking(move || worker.call(&owned))
                    .await
                    .map_err(|e| AgentError::Other(format!("Agent worker failed: {}", e)))??;

                let event = ResponseEvent::from_value(response)?;
                if let Some(fragment) = event.extract_text()? {
                    emit(&fragment, indicator, on_text, &mut text).await;
                }
                Some(event)
            }
        };

        tracing::debug!(chars = text.len(), "Response collected");
        Ok((
            text,
            last.as_ref().and_then(ResponseEvent::usage),
            last.as_ref().and_then(ResponseEvent::metrics),
        ))
    }
}

/// Hand a fragment to the caller, stopping the indicator first if it is
/// still running. Empty fragments are not content.
async fn emit(
    fragment: &str,
    indicator: &mut Option<ThinkingIndicator>,
    on_text: &mut dyn FnMut(&str),
    text: &mut String,
) {
    if fragment.is_empty() {
        return;
    }
    if let Some(running) = indicator.take() {
        running.stop().await;
    }
    on_text(fragment);
    text.push_str(fragment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentProfile, EventStream};
    use crate::streaming::indicator::SilentRenderer;
    use futures_util::stream;
    use serde_json::{json, Value};

    struct Scripted {
        profile: AgentProfile,
        events: Vec<Value>,
        blocking: Option<Value>,
    }

    impl Agent for Scripted {
        fn profile(&self) -> &AgentProfile {
            &self.profile
        }

        fn stream(&self, _query: &str) -> Option<EventStream> {
            if self.blocking.is_some() {
                return None;
            }
            let events: Vec<Result<Value, AgentError>> =
                self.events.iter().cloned().map(Ok).collect();
            Some(Box::pin(stream::iter(events)))
        }

        fn call(&self, _query: &str) -> Result<Value, AgentError> {
            self.blocking
                .clone()
                .ok_or(AgentError::Unsupported("blocking calls"))
        }
    }

    fn collector() -> StreamCollector {
        StreamCollector::with_renderers(
            Duration::from_secs(5),
            Arc::new(|| Box::new(SilentRenderer) as Box<dyn IndicatorRenderer>),
        )
    }

    fn streaming(events: Vec<Value>) -> Arc<dyn Agent> {
        Arc::new(Scripted {
            profile: AgentProfile::new("t", ""),
            events,
            blocking: None,
        })
    }

    #[tokio::test]
    async fn test_text_and_usage_from_stream() {
        let agent = streaming(vec![
            json!("Hel"),
            json!({"data": "lo"}),
            json!({"usage": {"input_tokens": 10, "output_tokens": 2}}),
        ]);

        let mut seen = Vec::new();
        let response = collector()
            .collect(&agent, "hi", &mut |t: &str| seen.push(t.to_string()))
            .await
            .unwrap();

        assert_eq!(response.text, "Hello");
        assert_eq!(response.usage, Some(UsageInfo::new(10, 2)));
        assert_eq!(seen, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_usage_comes_from_last_event_only() {
        let agent = streaming(vec![
            json!({"text": "a", "usage": {"input_tokens": 1, "output_tokens": 1}}),
            json!({"text": "b"}),
        ]);
        let response = collector().collect(&agent, "q", &mut |_: &str| {}).await.unwrap();
        assert_eq!(response.usage, None);
    }

    #[tokio::test]
    async fn test_blocking_shape() {
        let agent: Arc<dyn Agent> = Arc::new(Scripted {
            profile: AgentProfile::new("t", ""),
            events: Vec::new(),
            blocking: Some(json!({
                "message": {"content": [{"text": "Done."}]},
                "metadata": {"usage": {"inputTokens": 4, "outputTokens": 1}}
            })),
        });

        let response = collector().collect(&agent, "q", &mut |_: &str| {}).await.unwrap();
        assert_eq!(response.text, "Done.");
        assert_eq!(response.usage, Some(UsageInfo::new(4, 1)));
    }

    #[tokio::test]
    async fn test_unrecognized_event_fails() {
        let agent = streaming(vec![json!("ok"), json!(17)]);
        let failure = collector().collect(&agent, "q", &mut |_: &str| {}).await.unwrap_err();
        assert!(matches!(failure.error, AgentError::UnrecognizedShape(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_stream_times_out() {
        struct Stalled(AgentProfile);
        impl Agent for Stalled {
            fn profile(&self) -> &AgentProfile {
                &self.0
            }
            fn stream(&self, _query: &str) -> Option<EventStream> {
                Some(Box::pin(stream::pending::<Result<Value, AgentError>>()))
            }
        }

        let agent: Arc<dyn Agent> = Arc::new(Stalled(AgentProfile::new("s", "")));
        let failure = StreamCollector::with_renderers(
            Duration::from_secs(3),
            Arc::new(|| Box::new(SilentRenderer) as Box<dyn IndicatorRenderer>),
        )
        .collect(&agent, "q", &mut |_: &str| {})
        .await
        .unwrap_err();

        assert!(matches!(
            failure.error,
            AgentError::Timeout { duration_ms: 3000 }
        ));
        assert!(failure.duration >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_indicator_before_returning() {
        struct Stalled(AgentProfile);
        impl Agent for Stalled {
            fn profile(&self) -> &AgentProfile {
                &self.0
            }
            fn stream(&self, _query: &str) -> Option<EventStream> {
                Some(Box::pin(stream::pending::<Result<Value, AgentError>>()))
            }
        }

        struct Log(Arc<std::sync::Mutex<Vec<&'static str>>>);
        impl IndicatorRenderer for Log {
            fn interval(&self) -> Duration {
                Duration::from_millis(100)
            }
            fn tick(&mut self, _frame: usize) {
                self.0.lock().unwrap().push("tick");
            }
            fn clear(&mut self) {
                self.0.lock().unwrap().push("clear");
            }
        }

        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = log.clone();
        let collector = StreamCollector::with_renderers(
            Duration::from_secs(30),
            Arc::new(move || Box::new(Log(sink.clone())) as Box<dyn IndicatorRenderer>),
        );

        let agent: Arc<dyn Agent> = Arc::new(Stalled(AgentProfile::new("s", "")));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            trigger.cancel();
        });

        let failure = collector
            .collect_until(&agent, "q", &cancel, &mut |_: &str| {})
            .await
            .unwrap_err();

        assert!(matches!(failure.error, AgentError::Interrupted));
        assert_eq!(log.lock().unwrap().last(), Some(&"clear"));
    }
}
