//! Failure classification and retry decisions
//! Attempts are retried only for transient failure classes

pub mod policy;
pub mod types;

pub use policy::{classify, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use types::{ErrorClass, RetryAttempt, RetryDecision};
