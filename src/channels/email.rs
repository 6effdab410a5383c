use crate::channels::{date_range, percent_arg};
use crate::error::{AppError, AppResult};
use crate::metrics::catalog::{EMAIL_CONVERSION_RATE, EMAIL_CTR, OPEN_RATE, UNSUBSCRIBE_RATE};
use crate::metrics::MetricDefinition;
use crate::query::{resolve_limit, Condition, FilterRequest, QueryBuilder, SortOrder};
use crate::tools::report::Report;
use crate::tools::{parse_args, ToolSpec};
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

pub const CHANNEL: &str = "email";

const TABLE: &str = "email_campaigns";
const DATE: &str = "date";

const OPEN_RATE_PCT: MetricDefinition = OPEN_RATE.named("open_rate_pct");
const CLICK_RATE_PCT: MetricDefinition = EMAIL_CTR.named("click_rate_pct");
const CONVERSION_RATE_PCT: MetricDefinition = EMAIL_CONVERSION_RATE.named("conversion_rate_pct");

/// Campaign row columns shared by the row-level email tools.
fn campaign_rows() -> QueryBuilder {
    QueryBuilder::from(TABLE)
        .columns([DATE, "campaign_id", "subject_line", "emails_sent"])
        .row_metrics(&[OPEN_RATE_PCT, CLICK_RATE_PCT])
        .columns(["unsubscribes", "conversions", "source"])
        .row_metrics(&[CONVERSION_RATE_PCT])
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct EmailPerformanceArgs {
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub start_date: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub end_date: Option<String>,
    #[schemars(description = "Minimum open rate, in percent")]
    pub min_open_rate: Option<f64>,
    #[schemars(description = "Minimum click-through rate, in percent")]
    pub min_click_rate: Option<f64>,
    #[schemars(description = "Filter by exact campaign ID")]
    pub campaign_id: Option<String>,
    #[schemars(description = "Maximum number of rows (default: 10)")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    ConversionRate,
    OpenRate,
    ClickThroughRate,
}

impl RankingMetric {
    /// Percent value projected as `metric_value`.
    fn value_sql(&self) -> String {
        match self {
            RankingMetric::ConversionRate => CONVERSION_RATE_PCT.row_sql(),
            RankingMetric::OpenRate => OPEN_RATE_PCT.row_sql(),
            RankingMetric::ClickThroughRate => CLICK_RATE_PCT.row_sql(),
        }
    }

    /// Primary sort column and its tiebreaker.
    fn order(&self) -> (&'static str, &'static str) {
        match self {
            RankingMetric::ConversionRate => ("conversion_rate_pct", "conversions"),
            RankingMetric::OpenRate => ("open_rate", "emails_sent"),
            RankingMetric::ClickThroughRate => ("click_through_rate", "emails_sent"),
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct TopCampaignsArgs {
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub start_date: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub end_date: Option<String>,
    #[schemars(description = "Ranking metric: conversion_rate (default), open_rate or click_through_rate")]
    pub metric: RankingMetric,
    #[schemars(description = "Number of campaigns (default: 3)")]
    pub limit: Option<i64>,
    #[schemars(description = "Filter by exact campaign ID")]
    pub campaign_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CampaignSummaryArgs {
    #[schemars(description = "Filter by exact campaign ID")]
    pub campaign_id: Option<String>,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub start_date: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct EmailTrendsArgs {
    #[schemars(description = "Days to look back, also the maximum number of rows (default: 30)")]
    pub days_to_look_for: Option<i64>,
    #[schemars(description = "Filter by exact campaign ID")]
    pub campaign_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubjectSearchArgs {
    #[schemars(description = "Keyword to find in subject lines")]
    pub subject_keyword: String,
    #[schemars(description = "Maximum number of rows (default: 10)")]
    #[serde(default)]
    pub limit: Option<i64>,
}

fn date_filters(start_date: Option<&str>, end_date: Option<&str>) -> AppResult<FilterRequest> {
    let (from, to) = date_range(start_date, end_date)?;
    Ok(FilterRequest::new().at_least(DATE, from).at_most(DATE, to))
}

pub fn campaign_performance(args: EmailPerformanceArgs) -> AppResult<Report> {
    let filters = date_filters(args.start_date.as_deref(), args.end_date.as_deref())?
        .equals("campaign_id", args.campaign_id.as_deref())
        .at_least("open_rate", percent_arg("min_open_rate", args.min_open_rate)?)
        .at_least("click_through_rate", percent_arg("min_click_rate", args.min_click_rate)?)
        .limit(resolve_limit(args.limit, 10)?);

    let plan = campaign_rows().order_by(DATE, SortOrder::Desc).build(&filters)?;
    Ok(Report::rows(plan, "No campaigns found matching the criteria."))
}

pub fn top_campaigns(args: TopCampaignsArgs) -> AppResult<Report> {
    let filters = FilterRequest::new()
        .predicate("emails_sent > 0")
        .with_all(date_filters(args.start_date.as_deref(), args.end_date.as_deref())?)
        .equals("campaign_id", args.campaign_id.as_deref())
        .limit(resolve_limit(args.limit, 3)?);

    let (primary, tiebreak) = args.metric.order();
    let plan = campaign_rows()
        .aliased(&args.metric.value_sql(), "metric_value")
        .order_by_nulls_last(primary, SortOrder::Desc)
        .order_by(tiebreak, SortOrder::Desc)
        .build(&filters)?;
    Ok(Report::rows(plan, "No campaigns found."))
}

pub fn campaign_summary(args: CampaignSummaryArgs) -> AppResult<Report> {
    let filters = FilterRequest::new()
        .equals("campaign_id", args.campaign_id.as_deref())
        .with_all(date_filters(args.start_date.as_deref(), args.end_date.as_deref())?);

    let plan = QueryBuilder::from(TABLE)
        .aliased("COUNT(*)", "total_campaigns")
        .sum("emails_sent", "total_emails_sent")
        .aggregate_metrics(&[OPEN_RATE.named("avg_open_rate"), EMAIL_CTR.named("avg_click_rate")])
        .sum("conversions", "total_conversions")
        .sum("unsubscribes", "total_unsubscribes")
        .aggregate_metrics(&[EMAIL_CONVERSION_RATE.named("overall_conversion_rate"), UNSUBSCRIBE_RATE])
        .aliased("MIN(date)", "earliest_campaign")
        .aliased("MAX(date)", "latest_campaign")
        .build(&filters)?;

    Ok(Report::rows(plan, "No campaigns found for the specified criteria.").empty_when_zero("total_campaigns"))
}

/// Per-day, per-campaign rows over the last `days_to_look_for` days, newest first.
pub fn campaign_trends(args: EmailTrendsArgs) -> AppResult<Report> {
    let days = args.days_to_look_for.unwrap_or(30);
    if days < 1 {
        return Err(AppError::InvalidArgument(format!(
            "days_to_look_for must be at least 1, got {}",
            days
        )));
    }

    let filters = FilterRequest::new()
        .with(Condition::within_last_days(DATE, days))
        .equals("campaign_id", args.campaign_id.as_deref())
        .limit(resolve_limit(Some(days), 30)?);

    let plan = QueryBuilder::from(TABLE)
        .column("campaign_id")
        .aliased(DATE, "campaign_date")
        .aliased("COUNT(*)", "daily_campaigns")
        .aggregate_metrics(&[OPEN_RATE.named("avg_open_rate"), EMAIL_CTR.named("avg_click_rate")])
        .sum("conversions", "daily_conversions")
        .sum("emails_sent", "daily_emails_sent")
        .aggregate_metrics(&[EMAIL_CONVERSION_RATE.named("daily_conversion_rate")])
        .group_by(DATE)
        .group_by("campaign_id")
        .order_by(DATE, SortOrder::Desc)
        .build(&filters)?;

    Ok(Report::rows(plan, "No recent campaign data available."))
}

pub fn search_by_subject(args: SubjectSearchArgs) -> AppResult<Report> {
    let keyword = args.subject_keyword.trim();
    if keyword.is_empty() {
        return Err(AppError::InvalidArgument("subject_keyword must not be empty".into()));
    }

    let filters = FilterRequest::new()
        .with(Condition::contains("subject_line", keyword))
        .limit(resolve_limit(args.limit, 10)?);

    let plan = campaign_rows().order_by(DATE, SortOrder::Desc).build(&filters)?;
    Ok(Report::rows(
        plan,
        format!("No campaigns found with subject containing '{}'", keyword),
    ))
}

pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            channel: CHANNEL,
            name: "get_campaign_performance",
            description: "Retrieve email campaign rows, newest first, filtered by date, campaign and minimum open or click rate (in percent).",
            action: "retrieving campaign data",
            schema: || schema_for!(EmailPerformanceArgs),
            prepare: |args| campaign_performance(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "get_top_campaigns",
            description: "Rank the highest-performing email campaigns by conversion rate, open rate or click-through rate.",
            action: "retrieving top campaigns",
            schema: || schema_for!(TopCampaignsArgs),
            prepare: |args| top_campaigns(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "get_campaign_summary",
            description: "Summarize email campaigns: totals, weighted open and click rates, conversion and unsubscribe rates, and the date span.",
            action: "generating summary",
            schema: || schema_for!(CampaignSummaryArgs),
            prepare: |args| campaign_summary(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "get_campaign_trends",
            description: "Daily per-campaign email performance over a recent window, newest first.",
            action: "retrieving trends",
            schema: || schema_for!(EmailTrendsArgs),
            prepare: |args| campaign_trends(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "search_campaigns_by_subject",
            description: "Search email campaigns whose subject line contains a keyword.",
            action: "searching campaigns",
            schema: || schema_for!(SubjectSearchArgs),
            prepare: |args| search_by_subject(parse_args(args)?),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::BindValue;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn test_percent_thresholds_bind_as_ratios() {
        let args: EmailPerformanceArgs =
            parse_args(json!({"min_open_rate": 25.0, "min_click_rate": 2.5, "campaign_id": "E-1"})).unwrap();
        let planned = campaign_performance(args).unwrap().planned_queries();
        let plan = &planned[0].plan;
        assert!(plan.sql().contains(
            "WHERE CAST(campaign_id AS TEXT) = $1 AND open_rate >= $2 AND click_through_rate >= $3 ORDER BY date DESC LIMIT $4"
        ));
        assert_eq!(plan.params()[1], BindValue::Decimal(Decimal::new(25, 2)));
        assert_eq!(plan.params()[2], BindValue::Decimal(Decimal::new(25, 3)));
    }

    #[test]
    fn test_top_campaigns_nulls_last_with_tiebreak() {
        let args: TopCampaignsArgs = parse_args(json!({"metric": "open_rate"})).unwrap();
        let planned = top_campaigns(args).unwrap().planned_queries();
        let sql = planned[0].plan.sql();
        assert!(sql.contains("WHERE emails_sent > 0"));
        assert!(sql.ends_with("ORDER BY open_rate DESC NULLS LAST, emails_sent DESC LIMIT $1"));
        assert_eq!(planned[0].plan.params(), &[BindValue::Int(3)]);
    }

    #[test]
    fn test_top_campaigns_rejects_unknown_metric() {
        assert!(parse_args::<TopCampaignsArgs>(json!({"metric": "revenue"})).is_err());
    }

    #[test]
    fn test_trends_window_bounds_rows() {
        let args: EmailTrendsArgs = parse_args(json!({"days_to_look_for": 7})).unwrap();
        let planned = campaign_trends(args).unwrap().planned_queries();
        let plan = &planned[0].plan;
        assert!(plan.sql().contains("GROUP BY date, campaign_id ORDER BY date DESC LIMIT $2"));
        assert_eq!(plan.params(), &[BindValue::Int(7), BindValue::Int(7)]);
        assert!(campaign_trends(EmailTrendsArgs { days_to_look_for: Some(0), campaign_id: None }).is_err());
    }

    #[test]
    fn test_subject_keyword_required() {
        assert!(parse_args::<SubjectSearchArgs>(json!({})).is_err());
        let report = search_by_subject(parse_args(json!({"subject_keyword": "sale"})).unwrap()).unwrap();
        assert_eq!(report.no_data(), "No campaigns found with subject containing 'sale'");
    }
}
