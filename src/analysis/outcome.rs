use crate::error::AppError;
use crate::record::MetricRecord;
use serde::Serialize;

/// What a tool hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The query ran and matched nothing.
    Empty { message: String },
    Rows { rows: Vec<MetricRecord> },
    RowsWithSummary {
        rows: Vec<MetricRecord>,
        summary: MetricRecord,
    },
    /// `"Error <action>: <message>"`
    Error { message: String },
}

impl ToolOutcome {
    pub fn empty(message: impl Into<String>) -> Self {
        ToolOutcome::Empty {
            message: message.into(),
        }
    }

    /// Rows, or the no-data sentinel when there are none.
    pub fn rows(rows: Vec<MetricRecord>, no_data: &str) -> Self {
        if rows.is_empty() {
            Self::empty(no_data)
        } else {
            ToolOutcome::Rows { rows }
        }
    }

    /// Rows with a summary, or the no-data sentinel when there are no rows.
    pub fn with_summary(rows: Vec<MetricRecord>, summary: MetricRecord, no_data: &str) -> Self {
        if rows.is_empty() {
            Self::empty(no_data)
        } else {
            ToolOutcome::RowsWithSummary { rows, summary }
        }
    }

    pub fn error(action: &str, err: &AppError) -> Self {
        ToolOutcome::Error {
            message: format!("Error {}: {}", action, err),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            ToolOutcome::Rows { rows } | ToolOutcome::RowsWithSummary { rows, .. } => rows.len(),
            ToolOutcome::Empty { .. } | ToolOutcome::Error { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rows_give_sentinel() {
        let outcome = ToolOutcome::with_summary(vec![], MetricRecord::new(), "No data found");
        assert_eq!(outcome, ToolOutcome::empty("No data found"));
    }

    #[test]
    fn test_error_message_format() {
        let err = AppError::DatabaseError("relation \"linkedin_ads\" does not exist".into());
        let outcome = ToolOutcome::error("processing request", &err);
        assert_eq!(
            outcome,
            ToolOutcome::Error {
                message: "Error processing request: Database error: relation \"linkedin_ads\" does not exist"
                    .into()
            }
        );
    }

    #[test]
    fn test_serialized_kind_tag() {
        let outcome = ToolOutcome::rows(vec![MetricRecord::new().with("clicks", 4i64)], "none");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "rows");
        assert_eq!(json["rows"][0]["clicks"], 4);

        let json = serde_json::to_value(ToolOutcome::empty("none")).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "empty", "message": "none"}));
    }
}
