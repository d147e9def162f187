//! Response streaming
//!
//! Event shapes, incremental frame parsing, the thinking indicator and the
//! collector that ties them together for one agent invocation.

pub mod collector;
pub mod events;
pub mod indicator;
pub mod parser;

// Re-export commonly used types
pub use collector::{CollectFailure, CollectedResponse, RendererFactory, StreamCollector};
pub use events::{find_usage, AgentMetrics, ResponseEvent, UsageInfo};
pub use indicator::{
    DotsRenderer, IndicatorConfig, IndicatorRenderer, IndicatorStyle, SilentRenderer,
    SpinnerRenderer, ThinkingIndicator,
};
pub use parser::{FrameParser, MAX_BUFFER_SIZE};
