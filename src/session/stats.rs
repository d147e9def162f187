//! Session-lifetime counters

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Why the shell stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `quit`, `exit` or `bye`
    Quit,
    /// End of input (Ctrl-D or closed stdin)
    EndOfInput,
    /// Ctrl-C
    Interrupted,
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Closed(CloseReason),
}

/// Counters for the current session
///
/// `query_count` moves once per resolved query, after its attempts are
/// finished, whether the query succeeded or not.
#[derive(Debug, Clone)]
pub struct SessionStats {
    id: Uuid,
    started_at: DateTime<Local>,
    start_time: Instant,
    query_count: u32,
    failed_count: u32,
    status: SessionStatus,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Local::now(),
            start_time: Instant::now(),
            query_count: 0,
            failed_count: 0,
            status: SessionStatus::Active,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wall-clock start, for logs
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn query_count(&self) -> u32 {
        self.query_count
    }

    pub fn failed_count(&self) -> u32 {
        self.failed_count
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn record_query(&mut self, succeeded: bool) {
        self.query_count += 1;
        if !succeeded {
            self.failed_count += 1;
        }
    }

    pub fn close(&mut self, reason: CloseReason) {
        if self.status == SessionStatus::Active {
            self.status = SessionStatus::Closed(reason);
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// `45s`, `3m 12s`, `1h 5m`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
