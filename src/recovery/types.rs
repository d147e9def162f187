//! Recovery type definitions

use std::fmt;
use std::time::Duration;

/// Failure class, decided once per failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The attempt exceeded its time budget
    Timeout,

    /// The agent endpoint could not be reached
    ConnectionFailure,

    /// The agent reported a rate limit
    RateLimited,

    /// Anything else; surfaced immediately
    NonRetryable,
}

impl ErrorClass {
    pub fn is_transient(&self) -> bool {
        !matches!(self, ErrorClass::NonRetryable)
    }

    /// Short label shown to the user when an attempt fails
    pub fn label(&self) -> &'static str {
        match self {
            ErrorClass::Timeout => "Timeout",
            ErrorClass::ConnectionFailure => "Connection error",
            ErrorClass::RateLimited => "Rate limit reached",
            ErrorClass::NonRetryable => "Error",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of consulting the policy after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub wait: Duration,
}

impl RetryDecision {
    pub fn retry_after(wait: Duration) -> Self {
        Self { retry: true, wait }
    }

    pub fn give_up() -> Self {
        Self {
            retry: false,
            wait: Duration::ZERO,
        }
    }
}

/// One failed attempt, kept only for the duration of its query
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    /// 1-based
    pub attempt_number: u32,
    pub error_class: ErrorClass,
    pub message: String,
    /// Delay before the next attempt; zero when no retry follows
    pub wait: Duration,
}
