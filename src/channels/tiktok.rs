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

pub const CHANNEL: &str = "tiktok";

const COUNTERS: &[&str] = &["impressions", "clicks", "spend", "conversions"];

pub const TIKTOK_ADS: PaidMediaChannel = PaidMediaChannel {
    table: "tiktok_campaign_ad_details",
    base_predicate: None,
    row_dimensions: &["campaign_id", "campaign_name"],
    entity: &["campaign_name", "campaign_id"],
    distinct: ("campaign_id", "campaign_count"),
    selectable: COUNTERS,
    counters: COUNTERS,
    row_metrics: &[
        CTR_PERCENT,
        CPC,
        CONVERSION_RATE,
        COST_PER_CONVERSION,
        CLICK_TO_CONVERSION_RATE,
    ],
    aggregate_metrics: &[
        CTR_PERCENT.named("avg_ctr"),
        CPC.named("avg_cpc"),
        CONVERSION_RATE,
        COST_PER_CONVERSION,
    ],
    trend_metrics: &[CTR_PERCENT.named("ctr"), CPC, CONVERSION_RATE],
    rank_by: "spend",
};

pub fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            channel: CHANNEL,
            name: "get_campaign_performance",
            description: "Get TikTok campaign performance rows with CTR, CPC and conversion metrics, ranked by spend, plus a summary over all matching rows.",
            action: "processing request",
            schema: || schema_for!(CampaignPerformanceArgs),
            prepare: |args| paid_media::campaign_performance(&TIKTOK_ADS, parse_args(args)?),
        },
        ToolSpec {
            channel: CHANNEL,
            name: "get_campaign_trends",
            description: "Analyze TikTok campaign performance over daily, weekly or monthly periods.",
            action: "processing trends",
            schema: || schema_for!(CampaignTrendsArgs),
            prepare: |args| {
                paid_media::campaign_trends(&TIKTOK_ADS, parse_args(args)?, CampaignTrendMetric::Impressions)
            },
        },
        ToolSpec {
            channel: CHANNEL,
            name: "search_similar_campaigns",
            description: "Search TikTok campaigns by name with minimum spend, impression and conversion filters.",
            action: "searching campaigns",
            schema: || schema_for!(CampaignSearchArgs),
            prepare: |args| paid_media::campaign_search(&TIKTOK_ADS, parse_args(args)?, "No Relevant campaigns found"),
        },
    ]
}
