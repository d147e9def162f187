//! Session counters, status bar and exit summary
//!
//! - `SessionStats`: start time, query count, lifecycle status
//! - `StatusBar`: boxed one-line status, rendered on demand
//! - `SessionReporter`: builds the exit summary exactly once

pub mod stats;
pub mod status_bar;

pub use stats::{format_elapsed, CloseReason, SessionStats, SessionStatus};
pub use status_bar::{StatusBar, MAX_MODEL_LABEL};

use crate::telemetry::{format_cost, format_tokens, TokenCostTracker};

/// Exit summary values
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub duration: String,
    pub queries: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

impl SessionSummary {
    /// Lines of the summary body, in display order
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Duration: {}", self.duration),
            format!("Queries: {}", self.queries),
        ];

        let total = self.input_tokens + self.output_tokens;
        if total > 0 {
            lines.push(format!(
                "Tokens: {} (in: {}, out: {})",
                format_tokens(total),
                format_tokens(self.input_tokens),
                format_tokens(self.output_tokens)
            ));
            if self.cost > 0.0 {
                lines.push(format!("Total Cost: {}", format_cost(self.cost)));
            }
        }
        lines
    }
}

/// Produces the exit summary; later calls to `finish` return nothing
#[derive(Debug, Default)]
pub struct SessionReporter {
    emitted: bool,
}

impl SessionReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.emitted
    }

    pub fn finish(
        &mut self,
        stats: &SessionStats,
        tracker: &TokenCostTracker,
    ) -> Option<SessionSummary> {
        if self.emitted {
            return None;
        }
        self.emitted = true;

        Some(SessionSummary {
            duration: format_elapsed(stats.elapsed()),
            queries: stats.query_count(),
            input_tokens: tracker.total_input(),
            output_tokens: tracker.total_output(),
            cost: tracker.cost(),
        })
    }
}
