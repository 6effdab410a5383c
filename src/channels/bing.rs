//! Bing Ads rows live in a table shared with other traffic sources; every
//! query is pinned to `source = 'Bing Ads'`.

use crate::channels::date_range;
use crate::channels::paid_media::{
    self, CampaignSearchArgs, CampaignTrendMetric, CampaignTrendsArgs, PaidMediaChannel, CAMPAIGN_METRICS,
    DATE, NO_CAMPAIGN_DATA,
};
use crate::error::AppResult;
use crate::metrics::catalog::{CLICK_CONVERSION_RATE, COST_PER_CONVERSION, CPC, CTR_PERCENT};
use crate::query::{resolve_limit, DateFilter, SortOrder, TimeOperator};
use crate::tools::report::Report;
use crate::tools::{parse_args, ToolSpec};
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

pub const CHANNEL: &str = "bing";

const COUNTERS: &[&str] = &["impressions", "clicks", "spend", "conversions"];

/// Row cap when the caller gives no limit; those rows come newest first.
pub const UNLIMITED_ROW_CAP: i64 = 20;

pub const BING_ADS: PaidMediaChannel = PaidMediaChannel {
    table: "bing_advertising_data",
    base_predicate: Some("source = 'Bing Ads'"),
    row_dimensions: &["campaign_id", "campaign_name"],
    entity: &["campaign_id", "campaign_name"],
    distinct: ("campaign_id", "campaign_count"),
    selectable: COUNTERS,
    counters: COUNTERS,
    row_metrics: &[CTR_PERCENT.named("ctr"), CPC, CLICK_CONVERSION_RATE, COST_PER_CONVERSION],
    aggregate_metrics: &[CTR_PERCENT.named("ctr"), CPC, CLICK_CONVERSION_RATE],
    trend_metrics: &[CTR_PERCENT.named("ctr"), CPC],
    rank_by: "spend",
};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct BingPerformanceArgs {
    #[schemars(description = "Filter by campaign name (partial match)")]
    pub campaign_name: Option<String>,
    #[schemars(description = "Filter by exact campaign ID")]
    pub campaign_id: Option<String>,
    #[schemars(description = "Filter by traffic source (partial match)")]
    pub source: Option<String>,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "How to apply the date filter: >, <, >=, <=, = or between (default)")]
    pub time_operator: TimeOperator,
    #[schemars(description = "Metric columns to return: impressions, clicks, spend, conversions")]
    pub metrics: Option<Vec<String>>,
    #[schemars(description = "Return the top N rows by spend; without it the newest 20 rows are returned")]
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct BingSearchArgs {
    #[schemars(description = "Term to find in campaign names")]
    pub search_term: Option<String>,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "Minimum total spend")]
    pub min_spend: Option<f64>,
    #[schemars(description = "Only campaigns that have (true) or have no (false) conversions")]
    pub has_conversions: Option<bool>,
    #[schemars(description = "Maximum number of campaigns (default: 20)")]
    pub limit: Option<i64>,
}

impl From<BingSearchArgs> for CampaignSearchArgs {
    fn from(args: BingSearchArgs) -> Self {
        CampaignSearchArgs {
            search_term: args.search_term,
            date_from: args.date_from,
            date_to: args.date_to,
            min_spend: args.min_spend,
            min_impressions: None,
            has_conversions: args.has_conversions,
            limit: args.limit,
        }
    }
}

pub fn campaign_performance(args: BingPerformanceArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.date_from.as_deref(), args.date_to.as_deref())?;
    let dates = DateFilter::resolve(from, to, args.time_operator)?;
    let metrics = BING_ADS.select_metrics(args.metrics.as_deref(), CAMPAIGN_METRICS)?;

    let (order_by, limit) = match args.limit {
        Some(limit) => ((BING_ADS.rank_by, SortOrder::Desc), resolve_limit(Some(limit), UNLIMITED_ROW_CAP)?),
        None => ((DATE, SortOrder::Desc), UNLIMITED_ROW_CAP),
    };

    let filters = BING_ADS
        .filters()
        .contains("campaign_name", args.campaign_name.as_deref())
        .equals("campaign_id", args.campaign_id.as_deref())
        .contains("source", args.source.as_deref())
        .dates(DATE, dates.as_ref())
        .limit(limit);

    BING_ADS.performance(&filters, &metrics, order_by, NO_CAMPAIGN_DATA)
}

pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            channel: CHANNEL,
            name: "get_campaign_performance_for_bing",
            description: "Get Bing Ads campaign rows with CTR, CPC and conversion metrics. With a limit, returns the top rows by spend; otherwise the most recent rows.",
            action: "processing request",
            schema: || schema_for!(BingPerformanceArgs),
            prepare: |args| campaign_performance(parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "get_campaign_trends",
            description: "Analyze Bing Ads campaign performance over daily, weekly or monthly periods (default metric: spend).",
            action: "processing trends",
            schema: || schema_for!(CampaignTrendsArgs),
            prepare: |args| paid_media::campaign_trends(&BING_ADS, parse_args(args)?, CampaignTrendMetric::Spend),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "search_similar_campaigns",
            description: "Search Bing Ads campaigns by name with minimum spend and conversion filters.",
            action: "searching campaigns",
            schema: || schema_for!(BingSearchArgs),
            prepare: |args| {
                let args: BingSearchArgs = parse_args(args)?;
                paid_media::campaign_search(&BING_ADS, args.into(), "No campaigns found matching the search criteria.")
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::BindValue;
    use serde_json::json;

    fn rows_sql(args: serde_json::Value) -> (String, Vec<BindValue>) {
        let planned = campaign_performance(parse_args(args).unwrap()).unwrap().planned_queries();
        (planned[0].plan.sql().to_string(), planned[0].plan.params().to_vec())
    }

    #[test]
    fn test_without_limit_newest_first_capped() {
        let (sql, params) = rows_sql(json!({}));
        assert!(sql.contains("WHERE source = 'Bing Ads'"));
        assert!(sql.ends_with("ORDER BY date DESC LIMIT $1"));
        assert_eq!(params, vec![BindValue::Int(UNLIMITED_ROW_CAP)]);
    }

    #[test]
    fn test_with_limit_top_by_spend() {
        let (sql, params) = rows_sql(json!({"limit": 5, "source": "Search"}));
        assert!(sql.contains("source ILIKE $1"));
        assert!(sql.ends_with("ORDER BY spend DESC LIMIT $2"));
        assert_eq!(params.last(), Some(&BindValue::Int(5)));
    }

    #[test]
    fn test_trend_rows_sum_spend() {
        let tools = tools();
        let tool = tools.iter().find(|tool| tool.name == "get_campaign_trends").unwrap();
        let planned = (tool.prepare)(json!({})).unwrap().planned_queries();
        assert!(planned[0].plan.sql().contains("SUM(spend) AS spend"));
    }

    #[test]
    fn test_search_has_no_impression_threshold() {
        let tools = tools();
        let tool = tools.iter().find(|tool| tool.name == "search_similar_campaigns").unwrap();
        assert!((tool.prepare)(json!({"min_impressions": 10})).is_err());
        let planned = (tool.prepare)(json!({"min_spend": 10.0})).unwrap().planned_queries();
        assert!(planned[0].plan.sql().contains("GROUP BY campaign_id, campaign_name HAVING SUM(spend) >= $1"));
    }
}
