//! Organic search page analytics. This table's date column is `ad_date`.

use crate::channels::{date_range, percent_arg};
use crate::error::AppResult;
use crate::metrics::catalog::{BOUNCE_RATE, SESSION_CONVERSION_RATE};
use crate::metrics::{MetricDefinition, Operand};
use crate::query::{resolve_limit, FilterRequest, QueryBuilder, SortOrder, SortWhitelist};
use crate::tools::report::Report;
use crate::tools::{parse_args, ToolSpec};
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

pub const CHANNEL: &str = "seo";

const TABLE: &str = "seo_organic_ads";
const DATE: &str = "ad_date";

const UNIQUE_VISITOR_RATE: MetricDefinition = MetricDefinition::percent(
    "unique_visitor_rate_pct",
    Operand::Counter("unique_visitors"),
    Operand::Counter("sessions"),
    2,
);

const AVG_SESSION_MINUTES: &str = "ROUND(AVG(avg_session_duration_sec) / 60.0, 2)";

const PAGE_SORTS: SortWhitelist = SortWhitelist {
    entries: &[
        ("date", "ad_date"),
        ("ad_date", "ad_date"),
        ("sessions", "sessions"),
        ("conversions", "conversions"),
        ("conversion_rate", "conversion_rate_pct"),
        ("bounce_rate", "bounce_rate"),
        ("avg_session_duration", "avg_session_duration_sec"),
        ("unique_visitors", "unique_visitors"),
    ],
    default_key: "date",
};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct PageAnalyticsArgs {
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub start_date: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub end_date: Option<String>,
    #[schemars(description = "Filter by page URL (partial match)")]
    pub page_url: Option<String>,
    #[schemars(description = "Minimum sessions")]
    pub min_sessions: Option<i64>,
    #[schemars(description = "Maximum bounce rate, in percent")]
    pub max_bounce_rate: Option<f64>,
    #[schemars(description = "Minimum conversions")]
    pub min_conversions: Option<i64>,
    #[schemars(description = "Filter by traffic source (partial match)")]
    pub source: Option<String>,
    #[schemars(description = "Sort by: date (default), sessions, conversions, conversion_rate, bounce_rate, avg_session_duration, unique_visitors")]
    pub sort_by: Option<String>,
    #[schemars(description = "Sort order: asc or desc (default). Descending bounce rate lists the lowest bounce rates first")]
    pub sort_order: Option<String>,
    #[schemars(description = "Maximum number of rows (default: 10)")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryGrouping {
    #[default]
    Overall,
    Source,
    DailyTrends,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsSummaryArgs {
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub start_date: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub end_date: Option<String>,
    #[schemars(description = "Filter by traffic source (partial match)")]
    pub source: Option<String>,
    #[schemars(description = "overall (default), source or daily_trends")]
    pub group_by: SummaryGrouping,
    #[schemars(description = "Days covered by daily_trends when no date range is given (default: 30)")]
    pub days_for_trends: Option<i64>,
}

pub fn page_analytics(args: PageAnalyticsArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.start_date.as_deref(), args.end_date.as_deref())?;
    let filters = FilterRequest::new()
        .contains("page_url", args.page_url.as_deref())
        .at_least(DATE, from)
        .at_most(DATE, to)
        .at_least("sessions", args.min_sessions)
        .at_most("bounce_rate", percent_arg("max_bounce_rate", args.max_bounce_rate)?)
        .at_least("conversions", args.min_conversions)
        .contains("source", args.source.as_deref())
        .limit(resolve_limit(args.limit, 10)?);

    let (sort_key, sort_expr) = PAGE_SORTS.resolve(args.sort_by.as_deref());
    // Lower bounce is better, so bounce rate always lists the best pages first.
    let order = if sort_key == "bounce_rate" {
        SortOrder::Asc
    } else {
        SortOrder::parse(args.sort_order.as_deref())
    };

    let plan = QueryBuilder::from(TABLE)
        .columns([DATE, "page_url", "sessions", "unique_visitors"])
        .row_metrics(&[BOUNCE_RATE.named("bounce_rate_pct")])
        .column("avg_session_duration_sec")
        .aliased("ROUND(avg_session_duration_sec / 60.0, 2)", "avg_session_duration_min")
        .columns(["conversions", "source"])
        .row_metrics(&[SESSION_CONVERSION_RATE.named("conversion_rate_pct"), UNIQUE_VISITOR_RATE])
        .order_by_nulls_last(sort_expr, order)
        .build(&filters)?;

    Ok(Report::rows(plan, "No pages found matching the criteria."))
}

pub fn analytics_summary(args: AnalyticsSummaryArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.start_date.as_deref(), args.end_date.as_deref())?;

    match args.group_by {
        SummaryGrouping::DailyTrends => {
            let days = args.days_for_trends.unwrap_or(30);
            let filters = FilterRequest::new()
                .date_window(DATE, from, to, days)?
                .contains("source", args.source.as_deref());

            let plan = QueryBuilder::from(TABLE)
                .column(DATE)
                .aliased("COUNT(*)", "daily_pages")
                .sum("sessions", "daily_sessions")
                .sum("unique_visitors", "daily_unique_visitors")
                .aggregate_metrics(&[BOUNCE_RATE.named("avg_bounce_rate")])
                .aliased(AVG_SESSION_MINUTES, "avg_session_duration_min")
                .sum("conversions", "daily_conversions")
                .aggregate_metrics(&[SESSION_CONVERSION_RATE.named("daily_conversion_rate")])
                .group_by(DATE)
                .order_by(DATE, SortOrder::Asc)
                .build(&filters)?;

            Ok(Report::rows(
                plan,
                format!("No trend data available for the last {} days.", days),
            ))
        }
        SummaryGrouping::Source => {
            let filters = FilterRequest::new()
                .at_least(DATE, from)
                .at_most(DATE, to)
                .contains("source", args.source.as_deref());

            let plan = QueryBuilder::from(TABLE)
                .column("source")
                .aliased("COUNT(*)", "total_records")
                .aliased("COUNT(DISTINCT page_url)", "unique_pages")
                .sum("sessions", "total_sessions")
                .sum("unique_visitors", "total_unique_visitors")
                .aggregate_metrics(&[BOUNCE_RATE.named("avg_bounce_rate")])
                .aliased(AVG_SESSION_MINUTES, "avg_session_duration_min")
                .sum("conversions", "total_conversions")
                .aggregate_metrics(&[SESSION_CONVERSION_RATE])
                .group_by("source")
                .order_by("SUM(sessions)", SortOrder::Desc)
                .build(&filters)?;

            Ok(Report::rows(plan, "No source data found for the specified criteria."))
        }
        SummaryGrouping::Overall => {
            let filters = FilterRequest::new()
                .at_least(DATE, from)
                .at_most(DATE, to)
                .contains("source", args.source.as_deref());

            let plan = QueryBuilder::from(TABLE)
                .aliased("COUNT(*)", "total_records")
                .aliased("COUNT(DISTINCT page_url)", "unique_pages")
                .sum("sessions", "total_sessions")
                .sum("unique_visitors", "total_unique_visitors")
                .aggregate_metrics(&[BOUNCE_RATE.named("avg_bounce_rate")])
                .aliased("ROUND(AVG(avg_session_duration_sec), 2)", "avg_session_duration")
                .aliased(AVG_SESSION_MINUTES, "avg_session_duration_min")
                .sum("conversions", "total_conversions")
                .aggregate_metrics(&[
                    SESSION_CONVERSION_RATE.named("overall_conversion_rate"),
                    UNIQUE_VISITOR_RATE.named("unique_visitor_rate"),
                ])
                .aliased("MIN(ad_date)", "earliest_date")
                .aliased("MAX(ad_date)", "latest_date")
                .build(&filters)?;

            Ok(Report::rows(plan, "No data found for the specified criteria.").empty_when_zero("total_records"))
        }
    }
}

pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            channel: CHANNEL,
            name: "get_page_analytics",
            description: "Retrieve organic page analytics filtered by page, date, sessions, bounce rate, conversions and source, sorted by a chosen metric.",
            action: "retrieving page analytics",
            schema: || schema_for!(PageAnalyticsArgs),
            prepare: |args| page_analytics(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "get_analytics_summary",
            description: "Summarize organic analytics overall, per traffic source, or as daily trends.",
            action: "generating analytics summary",
            schema: || schema_for!(AnalyticsSummaryArgs),
            prepare: |args| analytics_summary(parse_args(args)?),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::BindValue;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn sql_of(report: Report) -> String {
        report.planned_queries()[0].plan.sql().to_string()
    }

    #[test]
    fn test_bounce_rate_always_lists_lowest_first() {
        for order in ["desc", "asc", "DESC"] {
            let args: PageAnalyticsArgs =
                parse_args(json!({"sort_by": "bounce_rate", "sort_order": order})).unwrap();
            assert!(
                sql_of(page_analytics(args).unwrap()).ends_with("ORDER BY bounce_rate ASC NULLS LAST LIMIT $1"),
                "{}",
                order
            );
        }

        let args: PageAnalyticsArgs = parse_args(json!({"sort_by": "sessions"})).unwrap();
        assert!(sql_of(page_analytics(args).unwrap()).ends_with("ORDER BY sessions DESC NULLS LAST LIMIT $1"));
    }

    #[test]
    fn test_page_filters_use_ad_date() {
        let args: PageAnalyticsArgs =
            parse_args(json!({"start_date": "2024-02-01", "max_bounce_rate": 40.0})).unwrap();
        let report = page_analytics(args).unwrap();
        let planned = report.planned_queries();
        assert!(planned[0].plan.sql().contains("WHERE ad_date >= $1 AND bounce_rate <= $2"));
        assert_eq!(planned[0].plan.params()[1], BindValue::Decimal(Decimal::new(4, 1)));
    }

    #[test]
    fn test_summary_groupings() {
        let overall = analytics_summary(parse_args(json!({"start_date": "2024-01-01"})).unwrap()).unwrap();
        let sql = sql_of(overall);
        assert!(sql.contains("WHERE ad_date >= $1"));
        assert!(!sql.contains("GROUP BY"));

        let by_source = analytics_summary(parse_args(json!({"group_by": "source"})).unwrap()).unwrap();
        assert!(sql_of(by_source).ends_with("GROUP BY source ORDER BY SUM(sessions) DESC"));

        let daily = analytics_summary(
            parse_args(json!({"group_by": "daily_trends", "days_for_trends": 14, "source": "google"})).unwrap(),
        )
        .unwrap();
        assert_eq!(daily.no_data(), "No trend data available for the last 14 days.");
        let sql = sql_of(daily);
        assert!(sql.contains("WHERE ad_date >= CURRENT_DATE - CAST($1 AS INTEGER) AND source ILIKE $2"));
        assert!(sql.ends_with("GROUP BY ad_date ORDER BY ad_date ASC"), "{}", sql);
    }
}
