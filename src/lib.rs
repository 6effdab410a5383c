//! Reporting tools over per-channel advertising tables.
//!
//! Each tool turns typed, optional filter arguments into one or more
//! parameterized SELECT statements, runs them on a pooled PostgreSQL
//! connection and shapes the rows into a [`ToolOutcome`].

pub mod analysis;
pub mod channels;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod query;
pub mod record;
pub mod sanitizer;
pub mod tools;

pub use analysis::ToolOutcome;
pub use config::DatabaseConfig;
pub use db::{ConnectionPool, Connector, QueryExecutor};
pub use error::{AppError, AppResult};
pub use record::{MetricRecord, MetricValue};
pub use tools::definitions::{build_tools, ToolDefinition};
pub use tools::{ToolRegistry, ToolSpec};
