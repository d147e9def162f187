//! Run one query to completion
//!
//! The executor wraps the stream collector in the retry policy and, once
//! the attempt sequence has resolved, feeds usage into the token tracker
//! and bumps the session query count. Output goes through a
//! `QueryReporter`, so the same loop drives the terminal and the tests.

use crate::agent::Agent;
use crate::errors::AgentError;
use crate::recovery::{classify, ErrorClass, RetryAttempt, RetryPolicy};
use crate::session::SessionStats;
use crate::streaming::{CollectedResponse, StreamCollector};
use crate::telemetry::TokenCostTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Receives everything a query produces, in order
pub trait QueryReporter {
    /// A text fragment of the current attempt
    fn fragment(&mut self, text: &str);

    /// The current attempt failed after reporting fragments; they are void
    fn discard_partial(&mut self);

    /// An attempt failed; `will_retry` tells whether another one follows
    fn attempt_failed(&mut self, attempt: &RetryAttempt, max_attempts: u32, will_retry: bool);

    /// The query succeeded; accounting has already been updated
    fn query_completed(&mut self, response: &CollectedResponse, tracker: &TokenCostTracker);

    /// The query failed for good
    fn query_failed(&mut self, failure: &QueryFailure);

    /// The user interrupted the query; nothing was accounted
    fn query_interrupted(&mut self);
}

/// Terminal failure of a query
#[derive(Debug)]
pub struct QueryFailure {
    pub error: AgentError,
    pub class: ErrorClass,
    pub attempts: u32,
    /// Duration of the last attempt
    pub duration: Duration,
}

impl QueryFailure {
    /// True when the policy stopped because attempts ran out
    pub fn exhausted(&self) -> bool {
        self.class.is_transient()
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self.error, AgentError::Interrupted)
    }
}

/// Result of one query plus its failed attempts
#[derive(Debug)]
pub struct QueryOutcome {
    pub result: Result<CollectedResponse, QueryFailure>,
    pub attempts: Vec<RetryAttempt>,
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn was_interrupted(&self) -> bool {
        matches!(&self.result, Err(failure) if failure.is_interrupted())
    }

    /// Number of agent invocations made
    pub fn invocations(&self) -> usize {
        match self.result {
            Ok(_) => self.attempts.len() + 1,
            Err(ref failure) => failure.attempts as usize,
        }
    }
}

/// Retry loop around the stream collector
#[derive(Clone)]
pub struct QueryExecutor {
    collector: StreamCollector,
    policy: RetryPolicy,
}

impl QueryExecutor {
    pub fn new(collector: StreamCollector, policy: RetryPolicy) -> Self {
        Self { collector, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `query` until it succeeds or the policy gives up.
    pub async fn execute(
        &self,
        agent: &Arc<dyn Agent>,
        query: &str,
        tracker: &mut TokenCostTracker,
        stats: &mut SessionStats,
        reporter: &mut dyn QueryReporter,
    ) -> QueryOutcome {
        self.execute_until(agent, query, &CancellationToken::new(), tracker, stats, reporter)
            .await
    }

    /// Run `query` until it succeeds, the policy gives up or `cancel` fires.
    ///
    /// Attempts are strictly sequential. `tracker` and `stats` are touched
    /// once, after the last attempt, and not at all for an interrupted query.
    pub async fn execute_until(
        &self,
        agent: &Arc<dyn Agent>,
        query: &str,
        cancel: &CancellationToken,
        tracker: &mut TokenCostTracker,
        stats: &mut SessionStats,
        reporter: &mut dyn QueryReporter,
    ) -> QueryOutcome {
        tracing::info!(chars = query.len(), "Processing query");

        let mut attempts: Vec<RetryAttempt> = Vec::new();
        let mut attempt = 1u32;

        let result = loop {
            let mut streamed = false;
            let collected = self
                .collector
                .collect_until(agent, query, cancel, &mut |text: &str| {
                    streamed = true;
                    reporter.fragment(text);
                })
                .await;

            let failure = match collected {
                Ok(response) => break Ok(response),
                Err(failure) => failure,
            };
            if streamed {
                reporter.discard_partial();
            }

            if matches!(failure.error, AgentError::Interrupted) {
                break Err(QueryFailure {
                    error: failure.error,
                    class: ErrorClass::NonRetryable,
                    attempts: attempt,
                    duration: failure.duration,
                });
            }

            let class = classify(&failure.error);
            let decision = self.policy.decide(class, attempt);
            let record = RetryAttempt {
                attempt_number: attempt,
                error_class: class,
                message: failure.error.to_string(),
                wait: decision.wait,
            };

            if decision.retry {
                tracing::warn!(
                    attempt,
                    class = %class,
                    wait_ms = decision.wait.as_millis() as u64,
                    "Attempt failed, retrying: {}",
                    failure.error
                );
            } else {
                tracing::error!(attempt, class = %class, "Query failed: {}", failure.error);
            }

            reporter.attempt_failed(&record, self.policy.max_attempts(), decision.retry);
            attempts.push(record);

            if !decision.retry {
                break Err(QueryFailure {
                    error: failure.error,
                    class,
                    attempts: attempt,
                    duration: failure.duration,
                });
            }

            let interrupted = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(decision.wait) => false,
            };
            if interrupted {
                break Err(QueryFailure {
                    error: AgentError::Interrupted,
                    class: ErrorClass::NonRetryable,
                    attempts: attempt,
                    duration: Duration::ZERO,
                });
            }
            attempt += 1;
        };

        match &result {
            Ok(response) => {
                if let Some(usage) = &response.usage {
                    tracker.record(usage);
                }
                stats.record_query(true);
                tracing::info!(
                    duration_ms = response.duration.as_millis() as u64,
                    input_tokens = response.usage.map(|u| u.input_tokens).unwrap_or(0),
                    output_tokens = response.usage.map(|u| u.output_tokens).unwrap_or(0),
                    "Query completed"
                );
                reporter.query_completed(response, tracker);
            }
            Err(failure) if failure.is_interrupted() => {
                tracing::warn!(attempt = failure.attempts, "Query interrupted");
                reporter.query_interrupted();
            }
            Err(failure) => {
                stats.record_query(false);
                reporter.query_failed(failure);
            }
        }

        QueryOutcome { result, attempts }
    }
}
