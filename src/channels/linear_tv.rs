use crate::channels::paid_media::{DEFAULT_DAYS_BACK, NO_TREND_DATA};
use crate::channels::{date_range, decimal_arg};
use crate::error::AppResult;
use crate::metrics::catalog::{CONVERSION_RATE, FREQUENCY, REACH_RATE};
use crate::metrics::MetricDefinition;
use crate::query::{
    resolve_limit, CompareOp, Condition, FilterRequest, Period, QueryBuilder, SortOrder, SortWhitelist,
};
use crate::tools::report::{Report, SummaryStep};
use crate::tools::{parse_args, ToolSpec};
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

pub const CHANNEL: &str = "linear_tv";

const TABLE: &str = "linear_tv_ads";
const DATE: &str = "date";

const CONVERSION_RATE_PCT: MetricDefinition = CONVERSION_RATE.named("conversion_rate_pct");

const NETWORK_SORTS: SortWhitelist = SortWhitelist {
    entries: &[
        ("date", "date"),
        ("impressions", "impressions"),
        ("reach", "reach"),
        ("frequency", "frequency"),
        ("conversions", "conversions"),
        ("conversion_rate", "conversion_rate_pct"),
    ],
    default_key: "date",
};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzeNetworkArgs {
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub start_date: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub end_date: Option<String>,
    #[schemars(description = "Network name (exact, case-insensitive)")]
    pub network: Option<String>,
    #[schemars(description = "Keyword to find in program names")]
    pub program_keyword: Option<String>,
    #[schemars(description = "Minimum impressions per row")]
    pub min_impressions: Option<i64>,
    #[schemars(description = "Minimum reach per row")]
    pub min_reach: Option<i64>,
    #[schemars(description = "Minimum conversion rate, in percent")]
    pub min_conversion_rate: Option<f64>,
    #[schemars(description = "Sort by: date (default), impressions, reach, frequency, conversions, conversion_rate")]
    pub sort_by: Option<String>,
    #[schemars(description = "Sort order: asc or desc (default)")]
    pub sort_order: Option<String>,
    #[schemars(description = "Maximum number of rows (default: 10)")]
    pub limit: Option<i64>,
    #[schemars(description = "Also return summary statistics over all matching rows")]
    pub include_summary: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMetric {
    #[default]
    Impressions,
    Reach,
    Frequency,
    Conversions,
}

impl NetworkMetric {
    /// Column in period trend rows.
    fn trend_column(&self) -> &'static str {
        match self {
            NetworkMetric::Impressions => "impressions",
            NetworkMetric::Reach => "reach",
            NetworkMetric::Frequency => "frequency",
            NetworkMetric::Conversions => "conversions",
        }
    }

    /// Column in per-network comparison rows.
    fn comparison_column(&self) -> &'static str {
        match self {
            NetworkMetric::Impressions => "total_impressions",
            NetworkMetric::Reach => "total_reach",
            NetworkMetric::Frequency => "avg_frequency",
            NetworkMetric::Conversions => "total_conversions",
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkTrendsArgs {
    #[schemars(description = "Filter by network (partial match)")]
    pub network: Option<String>,
    #[schemars(description = "Filter by program (partial match)")]
    pub program: Option<String>,
    #[schemars(description = "Filter by source (partial match)")]
    pub source: Option<String>,
    #[schemars(description = "Aggregation period: daily (default), weekly or monthly")]
    pub period: Period,
    #[schemars(description = "Metric to analyze the trend for (default: impressions)")]
    pub metric: NetworkMetric,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "Days to look back when no date range is given (default: 30)")]
    pub days_back: Option<i64>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkComparisonArgs {
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "First network to compare (partial match)")]
    pub compare_network_1: Option<String>,
    #[schemars(description = "Second network to compare (partial match)")]
    pub compare_network_2: Option<String>,
    #[schemars(description = "Days to look back when no date range is given (default: 30)")]
    pub days_back: Option<i64>,
    #[schemars(description = "Metric to rank networks by (default: impressions)")]
    pub metric: NetworkMetric,
    #[schemars(description = "Number of networks to return (default: 10)")]
    pub top_n: Option<i64>,
}

pub fn analyze_network(args: AnalyzeNetworkArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.start_date.as_deref(), args.end_date.as_deref())?;
    let (_, sort_expr) = NETWORK_SORTS.resolve(args.sort_by.as_deref());

    let mut filters = FilterRequest::new()
        .at_least(DATE, from)
        .at_most(DATE, to)
        .equals_ignore_case("network", args.network.as_deref())
        .contains("program", args.program_keyword.as_deref())
        .at_least("impressions", args.min_impressions)
        .at_least("reach", args.min_reach);
    if let Some(rate) = decimal_arg("min_conversion_rate", args.min_conversion_rate)? {
        filters = filters.with(Condition::compare(&CONVERSION_RATE_PCT.row_sql(), CompareOp::Ge, rate));
    }
    let filters = filters.limit(resolve_limit(args.limit, 10)?);

    let rows = QueryBuilder::from(TABLE)
        .columns([DATE, "network", "program", "impressions", "reach", "frequency", "conversions", "source"])
        .row_metrics(&[CONVERSION_RATE_PCT, FREQUENCY])
        .order_by(sort_expr, SortOrder::parse(args.sort_order.as_deref()))
        .build(&filters)?;

    let report = Report::rows(rows, "No TV networks found matching the criteria.");
    if !args.include_summary {
        return Ok(report);
    }

    let summary = QueryBuilder::from(TABLE)
        .aliased("COUNT(*)", "total_networks")
        .aliased("COUNT(DISTINCT network)", "unique_networks")
        .sum("impressions", "total_impressions")
        .sum("reach", "total_reach")
        .aggregate_metrics(&[FREQUENCY.named("avg_frequency")])
        .sum("conversions", "total_conversions")
        .aggregate_metrics(&[CONVERSION_RATE.named("overall_conversion_rate")])
        .aliased("MIN(date)", "earliest_network")
        .aliased("MAX(date)", "latest_network")
        .build(&filters.without_limit())?;

    Ok(report.with_summary_query(summary))
}

const TREND_TOTALS: &[&str] = &["impressions", "reach", "conversions"];
const TREND_RATIOS: &[MetricDefinition] = &[
    CONVERSION_RATE.named("overall_conversion_rate"),
    FREQUENCY.named("overall_frequency"),
];

/// Period rows with a trend of the chosen metric and totals re-derived from the periods.
pub fn network_trends(args: NetworkTrendsArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.date_from.as_deref(), args.date_to.as_deref())?;
    let filters = FilterRequest::new()
        .contains("network", args.network.as_deref())
        .contains("program", args.program.as_deref())
        .contains("source", args.source.as_deref())
        .date_window(DATE, from, to, args.days_back.unwrap_or(DEFAULT_DAYS_BACK))?;

    let plan = QueryBuilder::from(TABLE)
        .period(args.period, DATE, "period")
        .sum("impressions", "impressions")
        .sum("reach", "reach")
        .aggregate_metrics(&[FREQUENCY.named("frequency")])
        .sum("conversions", "conversions")
        .aggregate_metrics(&[CONVERSION_RATE, REACH_RATE])
        .aliased("COUNT(DISTINCT network)", "network_count")
        .aliased("COUNT(DISTINCT program)", "program_count")
        .aliased("COUNT(DISTINCT source)", "source_count")
        .aliased("COUNT(*)", "record_count")
        .build(&filters)?;

    Ok(Report::rows(plan, NO_TREND_DATA)
        .with_trend(args.metric.trend_column())
        .with_summary(SummaryStep::Totals {
            counters: TREND_TOTALS,
            ratios: TREND_RATIOS,
        }))
}

pub fn network_comparison(args: NetworkComparisonArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.date_from.as_deref(), args.date_to.as_deref())?;

    let networks: Vec<Condition> = [args.compare_network_1.as_deref(), args.compare_network_2.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| Condition::contains("network", name))
        .collect();

    let mut filters = FilterRequest::new().predicate("impressions > 0").predicate("reach > 0");
    if !networks.is_empty() {
        filters = filters.with(Condition::any_of(networks));
    }
    let filters = filters
        .date_window(DATE, from, to, args.days_back.unwrap_or(DEFAULT_DAYS_BACK))?
        .limit(resolve_limit(args.top_n, 10)?);

    let plan = QueryBuilder::from(TABLE)
        .column("network")
        .sum("impressions", "total_impressions")
        .sum("reach", "total_reach")
        .aggregate_metrics(&[FREQUENCY.named("avg_frequency")])
        .sum("conversions", "total_conversions")
        .aggregate_metrics(&[CONVERSION_RATE_PCT])
        .aliased("COUNT(DISTINCT program)", "program_count")
        .aliased("COUNT(DISTINCT source)", "source_count")
        .group_by("network")
        .order_by(args.metric.comparison_column(), SortOrder::Desc)
        .build(&filters)?;

    Ok(Report::rows(plan, "No network data found for the specified criteria."))
}

pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            channel: CHANNEL,
            name: "linear_tv_analyze_tv_network",
            description: "Retrieve, filter and sort linear TV network rows by impressions, reach, frequency, conversions, conversion rate or date, optionally with summary statistics.",
            action: "analyzing TV networks",
            schema: || schema_for!(AnalyzeNetworkArgs),
            prepare: |args| analyze_network(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "linear_tv_get_network_trends",
            description: "Analyze linear TV network and program performance over daily, weekly or monthly periods.",
            action: "processing trends",
            schema: || schema_for!(NetworkTrendsArgs),
            prepare: |args| network_trends(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "linear_tv_get_network_comparison",
            description: "Compare linear TV networks by total impressions, reach, frequency or conversions, optionally restricted to two networks.",
            action: "processing network comparison",
            schema: || schema_for!(NetworkComparisonArgs),
            prepare: |args| network_comparison(parse_args(args)?),
        },
    ]
}
