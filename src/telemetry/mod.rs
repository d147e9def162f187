//! Token accounting and cost estimation
//!
//! Usage reported by the agent is accumulated per session and priced with a
//! static per-model table.

pub mod pricing;
pub mod tokens;

pub use pricing::{lookup as lookup_price, ModelPrice, PRICING};
pub use tokens::{format_cost, format_tokens, TokenCostTracker};
