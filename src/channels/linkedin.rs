use crate::channels::paid_media::{
    self, CampaignPerformanceArgs, CampaignSearchArgs, CampaignTrendMetric, CampaignTrendsArgs,
    PaidMediaChannel,
};
use crate::metrics::catalog::{
    CLICK_TO_CONVERSION_RATE, CONVERSION_RATE, COST_PER_CONVERSION, CPC, CTR_PERCENT,
};
use crate::metrics::MetricDefinition;
use crate::tools::{parse_args, ToolSpec};
use schemars::schema_for;

pub const CHANNEL: &str = "linkedin";

const COUNTERS: &[&str] = &["impressions", "clicks", "spend", "conversions"];

const ROW_METRICS: &[MetricDefinition] = &[
    CTR_PERCENT,
    CPC,
    CONVERSION_RATE,
    COST_PER_CONVERSION,
    CLICK_TO_CONVERSION_RATE,
];

const AGGREGATE_METRICS: &[MetricDefinition] = &[
    CTR_PERCENT.named("avg_ctr"),
    CPC.named("avg_cpc"),
    CONVERSION_RATE,
    COST_PER_CONVERSION,
];

const TREND_METRICS: &[MetricDefinition] = &[CTR_PERCENT.named("ctr"), CPC, CONVERSION_RATE];

pub const LINKEDIN_ADS: PaidMediaChannel = PaidMediaChannel {
    table: "linkedin_ads",
    base_predicate: None,
    row_dimensions: &["campaign_id", "campaign_name"],
    entity: &["campaign_name", "campaign_id"],
    distinct: ("campaign_id", "campaign_count"),
    selectable: COUNTERS,
    counters: COUNTERS,
    row_metrics: ROW_METRICS,
    aggregate_metrics: AGGREGATE_METRICS,
    trend_metrics: TREND_METRICS,
    rank_by: "spend",
};

pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            channel: CHANNEL,
            name: "linkedin_get_campaign_performance",
            description: "Get LinkedIn campaign performance rows with derived CTR, CPC and conversion metrics, ranked by spend, plus a summary over all matching rows.",
            action: "processing request",
            schema: || schema_for!(CampaignPerformanceArgs),
            prepare: |args| paid_media::campaign_performance(&LINKEDIN_ADS, parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "linkedin_get_campaign_trends",
            description: "Analyze LinkedIn campaign performance over daily, weekly or monthly periods and report the change in the chosen metric.",
            action: "processing trends",
            schema: || schema_for!(CampaignTrendsArgs),
            prepare: |args| {
                paid_media::campaign_trends(&LINKEDIN_ADS, parse_args(args)?, CampaignTrendMetric::Impressions)
            },
        },
        ToolSpec {
            channel: CHANNEL,
            name: "linkedin_search_similar_campaigns",
            description: "Search LinkedIn campaigns by name with minimum spend, impression and conversion filters.",
            action: "searching campaigns",
            schema: || schema_for!(CampaignSearchArgs),
            prepare: |args| {
                paid_media::campaign_search(
                    &LINKEDIN_ADS,
                    parse_args(args)?,
                    "No campaigns found matching the specified criteria.",
                )
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan_sql(name: &str, args: serde_json::Value) -> Vec<String> {
        let tool = tools().into_iter().find(|tool| tool.name == name).unwrap();
        (tool.prepare)(args)
            .unwrap()
            .planned_queries()
            .into_iter()
            .map(|planned| planned.plan.sql().to_string())
            .collect()
    }

    #[test]
    fn test_performance_ranks_by_spend_and_summarizes_unlimited() {
        let sql = plan_sql(
            "linkedin_get_campaign_performance",
            json!({"campaign_name": "brand", "date_from": "2024-01-01", "date_to": "2024-01-31"}),
        );
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with("SELECT date, campaign_id, campaign_name, impressions, clicks, spend, conversions, "));
        assert!(sql[0].ends_with("ORDER BY spend DESC LIMIT $4"));
        assert!(sql[1].contains("COUNT(DISTINCT campaign_id) AS campaign_count"));
        assert!(!sql[1].contains("LIMIT"));
    }

    #[test]
    fn test_performance_rejects_unknown_metric() {
        let tool = tools().into_iter().find(|tool| tool.name == "linkedin_get_campaign_performance").unwrap();
        assert!((tool.prepare)(json!({"metrics": ["clicks", "password"]})).is_err());
    }

    #[test]
    fn test_trends_default_to_thirty_day_lookback() {
        let sql = plan_sql("linkedin_get_campaign_trends", json!({"period": "monthly", "metric": "ctr"}));
        assert!(sql[0].contains("WHERE date >= CURRENT_DATE - CAST($1 AS INTEGER)"));
        assert!(sql[0].contains("TO_CHAR(DATE_TRUNC('month', date), 'YYYY-MM') AS period"));
        assert!(sql[0].contains("AS ctr"));
    }

    #[test]
    fn test_search_thresholds_go_to_having() {
        let sql = plan_sql(
            "linkedin_search_similar_campaigns",
            json!({"search_term": "q3", "min_spend": 250.5, "min_impressions": 1000, "has_conversions": true}),
        );
        assert!(sql[0].contains(
            "GROUP BY campaign_name, campaign_id HAVING SUM(spend) >= $2 AND SUM(impressions) >= $3 AND SUM(conversions) > 0"
        ));
        assert!(sql[0].ends_with("ORDER BY total_spend DESC LIMIT $4"));
    }
}
