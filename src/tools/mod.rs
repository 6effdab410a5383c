pub mod definitions;
pub mod report;

use crate::analysis::ToolOutcome;
use crate::channels;
use crate::db::Connector;
use crate::error::{AppError, AppResult};
use report::{PlannedQuery, Report};
use schemars::Schema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One callable reporting tool.
pub struct ToolSpec {
    pub channel: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Fills `"Error <action>: ..."` when the tool fails.
    pub action: &'static str,
    pub schema: fn() -> Schema,
    /// Validate JSON arguments and plan every query the tool will run.
    pub prepare: fn(Value) -> AppResult<Report>,
}

impl ToolSpec {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.channel, self.name)
    }
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("channel", &self.channel)
            .field("name", &self.name)
            .finish()
    }
}

/// Deserialize tool arguments; `null` is treated as `{}`.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> AppResult<T> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(args).map_err(|e| AppError::InvalidArgument(e.to_string()))
}

/// Every tool of every channel, looked up by channel and tool name.
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: channels::all_tools(),
        }
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn find(&self, channel: &str, name: &str) -> AppResult<&ToolSpec> {
        self.tools
            .iter()
            .find(|tool| tool.channel == channel && tool.name == name)
            .ok_or_else(|| AppError::UnknownTool(format!("{}.{}", channel, name)))
    }

    /// The queries a call would run, without touching the database.
    pub fn plan(&self, channel: &str, name: &str, args: Value) -> AppResult<Vec<PlannedQuery>> {
        let tool = self.find(channel, name)?;
        Ok((tool.prepare)(args)?.planned_queries())
    }

    /// Run one tool call on a pooled connection.
    ///
    /// Only a pool initialization failure is returned as `Err`; every other
    /// failure becomes [`ToolOutcome::Error`]. A connection whose query hit a
    /// database error is discarded; otherwise it goes back to the pool.
    pub async fn invoke<C: Connector>(
        &self,
        pool: &C,
        channel: &str,
        name: &str,
        args: Value,
    ) -> AppResult<ToolOutcome> {
        let tool = match self.find(channel, name) {
            Ok(tool) => tool,
            Err(err) => {
                warn!(channel, tool = name, "unknown tool requested");
                return Ok(ToolOutcome::error("processing request", &err));
            }
        };

        let report = match (tool.prepare)(args) {
            Ok(report) => report,
            Err(err) => {
                warn!(tool = %tool.qualified_name(), error = %err, "rejected tool arguments");
                return Ok(ToolOutcome::error(tool.action, &err));
            }
        };

        let mut connection = match pool.acquire().await {
            Ok(connection) => connection,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(tool = %tool.qualified_name(), error = %err, "could not check out a connection");
                return Ok(ToolOutcome::error(tool.action, &err));
            }
        };

        let start = Instant::now();
        debug!(tool = %tool.qualified_name(), "running tool");
        let outcome = match report.execute(&mut connection).await {
            Ok(outcome) => {
                drop(connection);
                outcome
            }
            Err(err) => {
                warn!(tool = %tool.qualified_name(), error = %err, "tool failed");
                if err.poisons_connection() {
                    pool.discard(connection).await;
                } else {
                    drop(connection);
                }
                ToolOutcome::error(tool.action, &err)
            }
        };

        info!(
            tool = %tool.qualified_name(),
            rows = outcome.row_count(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "tool finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        limit: Option<i64>,
    }

    #[test]
    fn test_parse_args_accepts_null() {
        let args: Args = parse_args(Value::Null).unwrap();
        assert_eq!(args.limit, None);
    }

    #[test]
    fn test_parse_args_rejects_unknown_fields() {
        let err = parse_args::<Args>(serde_json::json!({"limt": 5})).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[test]
    fn test_qualified_names_are_unique() {
        let registry = ToolRegistry::new();
        let mut names: Vec<String> = registry.tools().iter().map(ToolSpec::qualified_name).collect();
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.find("linkedin", "drop_tables"),
            Err(AppError::UnknownTool(name)) if name == "linkedin.drop_tables"
        ));
    }
}
