use crate::analysis::{summarize, trend, ToolOutcome};
use crate::db::{fetch, fetch_one, QueryExecutor};
use crate::error::AppResult;
use crate::metrics::MetricDefinition;
use crate::query::QueryPlan;
use crate::record::MetricRecord;
use serde::Serialize;

/// How the summary attached to a report's rows is produced.
#[derive(Debug, Clone)]
pub enum SummaryStep {
    /// A one-row aggregate over the full filtered set (no row cap).
    Query(QueryPlan),
    /// First-versus-last change of one column across the returned periods.
    Trend { metric: &'static str },
    /// Totals and volume-weighted ratios computed from the returned rows.
    Totals {
        counters: &'static [&'static str],
        ratios: &'static [MetricDefinition],
    },
}

/// Everything one tool call will run: the row query, optional summary steps,
/// and what to say when nothing matches.
#[derive(Debug, Clone)]
pub struct Report {
    rows: QueryPlan,
    summary: Vec<SummaryStep>,
    no_data: String,
    // Ungrouped aggregates always return one row; this column being zero means no data.
    empty_when_zero: Option<&'static str>,
}

/// Plans of a report, in execution order, for dry runs.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedQuery {
    pub role: &'static str,
    pub plan: QueryPlan,
}

impl Report {
    pub fn rows(plan: QueryPlan, no_data: impl Into<String>) -> Self {
        Self {
            rows: plan,
            summary: Vec::new(),
            no_data: no_data.into(),
            empty_when_zero: None,
        }
    }

    pub fn with_summary(mut self, step: SummaryStep) -> Self {
        self.summary.push(step);
        self
    }

    pub fn with_summary_query(self, plan: QueryPlan) -> Self {
        self.with_summary(SummaryStep::Query(plan))
    }

    pub fn with_trend(self, metric: &'static str) -> Self {
        self.with_summary(SummaryStep::Trend { metric })
    }

    pub fn empty_when_zero(mut self, column: &'static str) -> Self {
        self.empty_when_zero = Some(column);
        self
    }

    pub fn no_data(&self) -> &str {
        &self.no_data
    }

    pub fn planned_queries(&self) -> Vec<PlannedQuery> {
        let mut planned = vec![PlannedQuery {
            role: "rows",
            plan: self.rows.clone(),
        }];
        planned.extend(self.summary.iter().filter_map(|step| match step {
            SummaryStep::Query(plan) => Some(PlannedQuery {
                role: "summary",
                plan: plan.clone(),
            }),
            _ => None,
        }));
        planned
    }

    /// Run every query on one connection, in order. The summary query only runs
    /// when the row query matched something.
    pub async fn execute(self, executor: &mut dyn QueryExecutor) -> AppResult<ToolOutcome> {
        let rows = fetch(executor, &self.rows).await?;

        if rows.is_empty() || self.is_zero_aggregate(&rows) {
            return Ok(ToolOutcome::empty(self.no_data));
        }

        if self.summary.is_empty() {
            return Ok(ToolOutcome::rows(rows, &self.no_data));
        }

        let mut summary = MetricRecord::new();
        for step in &self.summary {
            match step {
                SummaryStep::Query(plan) => summary.extend(fetch_one(executor, plan).await?),
                SummaryStep::Trend { metric } => {
                    summary.extend(trend(&rows, metric).to_record(metric, rows.len()))
                }
                SummaryStep::Totals { counters, ratios } => {
                    summary.extend(summarize(&rows, counters, ratios))
                }
            }
        }

        Ok(ToolOutcome::with_summary(rows, summary, &self.no_data))
    }

    fn is_zero_aggregate(&self, rows: &[MetricRecord]) -> bool {
        match (self.empty_when_zero, rows) {
            (Some(column), [row]) => row.decimal(column).map_or(true, |count| count.is_zero()),
            _ => false,
        }
    }
}
