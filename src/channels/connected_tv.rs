use crate::channels::paid_media::{PaidMediaChannel, DATE, DEFAULT_DAYS_BACK, NO_TREND_DATA};
use crate::channels::date_range;
use crate::error::AppResult;
use crate::metrics::catalog::{COMPLETION_RATE, CONVERSION_RATE, ENGAGEMENT_SCORE, STORED_CTR};
use crate::query::{resolve_limit, DateFilter, Period, SortOrder, TimeOperator};
use crate::tools::report::Report;
use crate::tools::{parse_args, ToolSpec};
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

pub const CHANNEL: &str = "connected_tv";

const DEFAULT_METRICS: &[&str] = &["impressions", "completion_rate", "click_through_rate"];

pub const CONNECTED_TV_ADS: PaidMediaChannel = PaidMediaChannel {
    table: "connected_tv_ads",
    base_predicate: None,
    row_dimensions: &["platform", "ad_slot"],
    entity: &["ad_slot", "platform"],
    distinct: ("platform", "platform_count"),
    selectable: &["impressions", "completion_rate", "click_through_rate", "conversions"],
    counters: &["impressions", "conversions"],
    row_metrics: &[COMPLETION_RATE, STORED_CTR, CONVERSION_RATE, ENGAGEMENT_SCORE],
    aggregate_metrics: &[
        COMPLETION_RATE.named("avg_completion_rate"),
        STORED_CTR.named("avg_click_through_rate"),
        CONVERSION_RATE,
        ENGAGEMENT_SCORE,
    ],
    trend_metrics: &[
        COMPLETION_RATE.named("avg_completion_rate"),
        STORED_CTR.named("avg_click_through_rate"),
        CONVERSION_RATE,
    ],
    rank_by: "impressions",
};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformPerformanceArgs {
    #[schemars(description = "Filter by ad slot (partial match)")]
    pub ad_slot: Option<String>,
    #[schemars(description = "Filter by platform (exact, case-insensitive)")]
    pub platform: Option<String>,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "How to apply the date filter: >, <, >=, <=, = or between (default)")]
    pub time_operator: TimeOperator,
    #[schemars(description = "Metric columns to return: impressions, completion_rate, click_through_rate, conversions")]
    pub metrics: Option<Vec<String>>,
    #[schemars(description = "Maximum number of rows (default: 10)")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlatformTrendMetric {
    #[default]
    Impressions,
    CompletionRate,
    ClickThroughRate,
    Conversions,
}

impl PlatformTrendMetric {
    pub fn column(&self) -> &'static str {
        match self {
            PlatformTrendMetric::Impressions => "impressions",
            PlatformTrendMetric::CompletionRate => "avg_completion_rate",
            PlatformTrendMetric::ClickThroughRate => "avg_click_through_rate",
            PlatformTrendMetric::Conversions => "conversions",
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformTrendsArgs {
    #[schemars(description = "Filter by ad slot (partial match)")]
    pub ad_slot: Option<String>,
    #[schemars(description = "Filter by platform (exact, case-insensitive)")]
    pub platform: Option<String>,
    #[schemars(description = "Aggregation period: daily (default), weekly or monthly")]
    pub period: Period,
    #[schemars(description = "Metric to analyze the trend for (default: impressions)")]
    pub metric: PlatformTrendMetric,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "Days to look back when no date range is given (default: 30)")]
    pub days_back: Option<i64>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AdSlotSearchArgs {
    #[schemars(description = "Term to find in ad slot names")]
    pub search_term: Option<String>,
    #[schemars(description = "Filter by platform (exact, case-insensitive)")]
    pub platform: Option<String>,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "Minimum total impressions")]
    pub min_impressions: Option<i64>,
    #[schemars(description = "Only ad slots that have (true) or have no (false) conversions")]
    pub has_conversions: Option<bool>,
    #[schemars(description = "Maximum number of ad slots (default: 10)")]
    pub limit: Option<i64>,
}

pub fn platform_performance(args: PlatformPerformanceArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.date_from.as_deref(), args.date_to.as_deref())?;
    let dates = DateFilter::resolve(from, to, args.time_operator)?;
    let metrics = CONNECTED_TV_ADS.select_metrics(args.metrics.as_deref(), DEFAULT_METRICS)?;

    let filters = CONNECTED_TV_ADS
        .filters()
        .contains("ad_slot", args.ad_slot.as_deref())
        .equals_ignore_case("platform", args.platform.as_deref())
        .dates(DATE, dates.as_ref())
        .limit(resolve_limit(args.limit, 10)?);

    CONNECTED_TV_ADS.performance(
        &filters,
        &metrics,
        ("impressions", SortOrder::Desc),
        "No campaign data found matching the criteria.",
    )
}

pub fn platform_trends(args: PlatformTrendsArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.date_from.as_deref(), args.date_to.as_deref())?;
    let filters = CONNECTED_TV_ADS
        .filters()
        .contains("ad_slot", args.ad_slot.as_deref())
        .equals_ignore_case("platform", args.platform.as_deref())
        .date_window(DATE, from, to, args.days_back.unwrap_or(DEFAULT_DAYS_BACK))?;

    CONNECTED_TV_ADS.trends(&filters, args.period, args.metric.column(), NO_TREND_DATA)
}

pub fn search_ad_slots(args: AdSlotSearchArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.date_from.as_deref(), args.date_to.as_deref())?;
    let filters = CONNECTED_TV_ADS
        .filters()
        .contains("ad_slot", args.search_term.as_deref())
        .equals_ignore_case("platform", args.platform.as_deref())
        .at_least(DATE, from)
        .at_most(DATE, to)
        .having_at_least("SUM(impressions)", args.min_impressions)
        .having_presence("SUM(conversions)", args.has_conversions)
        .limit(resolve_limit(args.limit, 10)?);

    CONNECTED_TV_ADS.search(&filters, "No similar result has been found")
}

pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            channel: CHANNEL,
            name: "get_platform_performance",
            description: "Get connected TV ad slot performance rows with completion rate, CTR, conversion rate and engagement score, ranked by impressions, plus a summary.",
            action: "processing request",
            schema: || schema_for!(PlatformPerformanceArgs),
            prepare: |args| platform_performance(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "get_platform_trends",
            description: "Analyze connected TV performance over daily, weekly or monthly periods.",
            action: "processing trends",
            schema: || schema_for!(PlatformTrendsArgs),
            prepare: |args| platform_trends(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "search_similar_ad_slot",
            description: "Search connected TV ad slots by name with platform, impression and conversion filters.",
            action: "searching ad_slot",
            schema: || schema_for!(AdSlotSearchArgs),
            prepare: |args| search_ad_slots(parse_args(args)?),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_platform_is_exact_and_case_insensitive() {
        let report = platform_performance(parse_args(json!({"platform": "Roku"})).unwrap()).unwrap();
        let planned = report.planned_queries();
        assert!(planned[0].plan.sql().contains("WHERE LOWER(platform) = LOWER($1)"));
        assert!(planned[0].plan.sql().contains(
            "ROUND(CAST((conversions * click_through_rate) AS NUMERIC) / NULLIF(impressions, 0), 6) AS engagement_score"
        ));
        assert!(planned[1].plan.sql().contains("COUNT(DISTINCT platform) AS platform_count"));
    }

    #[test]
    fn test_trend_metric_maps_to_weighted_column() {
        let args: PlatformTrendsArgs = parse_args(json!({"metric": "completion_rate"})).unwrap();
        assert_eq!(args.metric.column(), "avg_completion_rate");
        let planned = platform_trends(args).unwrap().planned_queries();
        assert!(planned[0].plan.sql().contains("AS avg_completion_rate"));
    }

    #[test]
    fn test_search_groups_by_slot_and_platform() {
        let report = search_ad_slots(parse_args(json!({"search_term": "pre-roll"})).unwrap()).unwrap();
        let sql = report.planned_queries()[0].plan.sql().to_string();
        assert!(sql.contains("GROUP BY ad_slot, platform"));
        assert!(sql.ends_with("ORDER BY total_impressions DESC LIMIT $2"));
    }
}
