//! Retry policy for failed agent invocations
//!
//! Classification is ordered and the first match wins:
//!
//! | Class             | Wait before attempt n+1          |
//! |-------------------|----------------------------------|
//! | Timeout           | `base_delay`                     |
//! | ConnectionFailure | `base_delay`                     |
//! | RateLimited       | `base_delay * 2^(n-1)`           |
//! | NonRetryable      | not retried                      |
//!
//! No retry is scheduled once `n` reaches `max_attempts`.

use super::types::{ErrorClass, RetryDecision};
use crate::errors::AgentError;
use std::time::Duration;

/// Default maximum number of attempts per query
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts (2 seconds)
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Exponent cap so the shift can never overflow
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Retry policy with fixed and exponential delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    /// `max_attempts` below one is treated as one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decide what happens after attempt `attempt` (1-based) failed with `class`.
    pub fn decide(&self, class: ErrorClass, attempt: u32) -> RetryDecision {
        if !class.is_transient() || attempt >= self.max_attempts {
            return RetryDecision::give_up();
        }

        let wait = match class {
            ErrorClass::Timeout | ErrorClass::ConnectionFailure => self.base_delay,
            ErrorClass::RateLimited => {
                let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
                self.base_delay
                    .checked_mul(1u32 << exponent)
                    .unwrap_or(Duration::MAX)
            }
            ErrorClass::NonRetryable => Duration::ZERO,
        };
        RetryDecision::retry_after(wait)
    }

    /// Worst-case total wait across a query made entirely of `class` failures
    pub fn max_total_wait(&self, class: ErrorClass) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.decide(class, attempt).wait)
            .sum()
    }
}

/// Map an agent failure onto its retry class.
///
/// Only free-form agent messages go through the rate-limit heuristic.
/// Variants that embed payloads or decoder output never do.
pub fn classify(error: &AgentError) -> ErrorClass {
    match error {
        AgentError::Timeout { .. } => ErrorClass::Timeout,
        AgentError::Connection(_) => ErrorClass::ConnectionFailure,
        AgentError::Api { status: 429, .. } => ErrorClass::RateLimited,
        AgentError::Api { message, .. } | AgentError::Other(message)
            if is_rate_limit(message) =>
        {
            ErrorClass::RateLimited
        }
        AgentError::Api { .. }
        | AgentError::Other(_)
        | AgentError::UnrecognizedShape(_)
        | AgentError::Unsupported(_)
        | AgentError::Protocol(_)
        | AgentError::Interrupted => ErrorClass::NonRetryable,
    }
}

/// Substring heuristic: agents report throttling only through their messages.
fn is_rate_limit(message: &str) -> bool {
    message.to_lowercase().contains("rate") || message.contains("429")
}
