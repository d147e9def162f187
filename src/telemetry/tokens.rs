//! Session token accounting and cost estimation

use super::pricing::{self, ModelPrice};
use crate::streaming::UsageInfo;

/// Cumulative token usage for one session
///
/// Totals only ever grow. Cost is derived on demand from the price table,
/// so an unknown model simply costs zero.
#[derive(Debug, Clone, Default)]
pub struct TokenCostTracker {
    model_name: String,
    total_input: u64,
    total_output: u64,
}

impl TokenCostTracker {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            total_input: 0,
            total_output: 0,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn add_usage(&mut self, input_tokens: u64, output_tokens: u64) {
        self.total_input = self.total_input.saturating_add(input_tokens);
        self.total_output = self.total_output.saturating_add(output_tokens);
    }

    pub fn record(&mut self, usage: &UsageInfo) {
        self.add_usage(usage.input_tokens, usage.output_tokens);
    }

    pub fn total_input(&self) -> u64 {
        self.total_input
    }

    pub fn total_output(&self) -> u64 {
        self.total_output
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_input + self.total_output
    }

    fn price(&self) -> Option<ModelPrice> {
        pricing::lookup(&self.model_name)
    }

    /// Estimated session cost in USD
    pub fn cost(&self) -> f64 {
        self.cost_for(self.total_input, self.total_output)
    }

    /// Estimated cost of an arbitrary token count at this model's price
    pub fn cost_for(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.price()
            .map(|price| price.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }
}

/// `$0.0042`, `$0.420`, `$4.20`
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${:.4}", cost)
    } else if cost < 1.0 {
        format!("${:.3}", cost)
    } else {
        format!("${:.2}", cost)
    }
}

/// `999`, `1.2K`, `3.4M`
pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}K", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}
