//! Result shaping: summaries, trends and the tool outcome type.

pub mod outcome;
pub mod summary;
pub mod trend;

pub use outcome::ToolOutcome;
pub use summary::summarize;
pub use trend::{trend, TrendDirection, TrendResult};
