//! Performance, trend and search reports shared by the paid-media channels.
//!
//! A channel is a table plus the columns and formulas it reports on; the
//! queries themselves are the same for every channel.

use crate::channels::{date_range, decimal_arg};
use crate::error::{AppError, AppResult};
use crate::metrics::MetricDefinition;
use crate::query::{resolve_limit, DateFilter, FilterRequest, Period, QueryBuilder, SortOrder, TimeOperator};
use crate::tools::report::Report;
use schemars::JsonSchema;
use serde::Deserialize;

pub struct PaidMediaChannel {
    pub table: &'static str,
    /// Fixed row restriction, e.g. one traffic source in a shared table.
    pub base_predicate: Option<&'static str>,
    /// Columns identifying a row in performance output.
    pub row_dimensions: &'static [&'static str],
    /// Columns a search groups by.
    pub entity: &'static [&'static str],
    /// Column counted distinctly in the performance summary, and its alias.
    pub distinct: (&'static str, &'static str),
    /// Raw columns a caller may pick with `metrics`.
    pub selectable: &'static [&'static str],
    /// Columns summed in summaries, trends and searches.
    pub counters: &'static [&'static str],
    pub row_metrics: &'static [MetricDefinition],
    /// Ratios over summed counters, used by searches and performance summaries.
    pub aggregate_metrics: &'static [MetricDefinition],
    pub trend_metrics: &'static [MetricDefinition],
    /// Counter rows and entities are ranked by.
    pub rank_by: &'static str,
}

pub const DATE: &str = "date";

impl PaidMediaChannel {
    /// Empty filter set carrying the channel's fixed predicate.
    pub fn filters(&self) -> FilterRequest {
        match self.base_predicate {
            Some(predicate) => FilterRequest::new().predicate(predicate),
            None => FilterRequest::new(),
        }
    }

    /// Validate a `metrics` selection against the whitelist, keeping caller order.
    pub fn select_metrics(
        &self,
        requested: Option<&[String]>,
        defaults: &'static [&'static str],
    ) -> AppResult<Vec<&'static str>> {
        let requested = match requested {
            Some(requested) if !requested.is_empty() => requested,
            _ => return Ok(defaults.to_vec()),
        };

        let mut selected: Vec<&'static str> = Vec::with_capacity(requested.len());
        for name in requested {
            let column = self
                .selectable
                .iter()
                .find(|column| column.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| {
                    AppError::InvalidArgument(format!(
                        "unknown metric '{}'; expected one of: {}",
                        name,
                        self.selectable.join(", ")
                    ))
                })?;
            if !selected.contains(column) {
                selected.push(column);
            }
        }
        Ok(selected)
    }

    /// Row-level records ordered by `order_by`, plus a summary over the full
    /// filtered set. `filters` must already carry the row cap.
    pub fn performance(
        &self,
        filters: &FilterRequest,
        metrics: &[&'static str],
        order_by: (&str, SortOrder),
        no_data: &'static str,
    ) -> AppResult<Report> {
        let rows = QueryBuilder::from(self.table)
            .column(DATE)
            .columns(self.row_dimensions.iter().copied())
            .columns(metrics.iter().copied())
            .row_metrics(self.row_metrics)
            .order_by(order_by.0, order_by.1)
            .build(filters)?;

        let summary = self.totals_query()
            .aliased(&format!("COUNT(DISTINCT {})", self.distinct.0), self.distinct.1)
            .aliased(&format!("MIN({})", DATE), "start_date")
            .aliased(&format!("MAX({})", DATE), "end_date")
            .build(&filters.without_limit())?;

        Ok(Report::rows(rows, no_data).with_summary_query(summary))
    }

    /// Period buckets oldest first, with the change in `metric_column` from
    /// the first to the last bucket attached as the summary.
    pub fn trends(
        &self,
        filters: &FilterRequest,
        period: Period,
        metric_column: &'static str,
        no_data: &'static str,
    ) -> AppResult<Report> {
        let mut builder = QueryBuilder::from(self.table).period(period, DATE, "period");
        for counter in self.counters {
            builder = builder.sum(counter, counter);
        }
        let plan = builder
            .aggregate_metrics(self.trend_metrics)
            .aliased("COUNT(*)", "campaign_count")
            .build(filters)?;

        Ok(Report::rows(plan, no_data).with_trend(metric_column))
    }

    /// One row per entity with totals, ratios and active date span. HAVING
    /// thresholds and the row cap come from `filters`.
    pub fn search(&self, filters: &FilterRequest, no_data: &'static str) -> AppResult<Report> {
        let mut builder = QueryBuilder::from(self.table).columns(self.entity.iter().copied());
        for counter in self.counters {
            builder = builder.sum(counter, &format!("total_{}", counter));
        }
        for dimension in self.entity {
            builder = builder.group_by(dimension);
        }
        let plan = builder
            .aggregate_metrics(self.aggregate_metrics)
            .aliased(&format!("MIN({})", DATE), "first_date")
            .aliased(&format!("MAX({})", DATE), "last_date")
            .aliased(&format!("COUNT(DISTINCT {})", DATE), "days_active")
            .aliased("COUNT(*)", "total_records")
            .order_by(&format!("total_{}", self.rank_by), SortOrder::Desc)
            .build(filters)?;

        Ok(Report::rows(plan, no_data))
    }

    fn totals_query(&self) -> QueryBuilder {
        let mut builder = QueryBuilder::from(self.table).aliased("COUNT(*)", "total_records");
        for counter in self.counters {
            builder = builder.sum(counter, &format!("total_{}", counter));
        }
        builder.aggregate_metrics(self.aggregate_metrics)
    }
}

pub const CAMPAIGN_METRICS: &[&str] = &["impressions", "clicks", "spend", "conversions"];

pub const NO_CAMPAIGN_DATA: &str = "No campaign data found matching the criteria.";
pub const NO_TREND_DATA: &str = "No trend data found for the specified criteria.";

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CampaignPerformanceArgs {
    #[schemars(description = "Filter by campaign name (partial, case-insensitive match)")]
    pub campaign_name: Option<String>,
    #[schemars(description = "Filter by exact campaign ID")]
    pub campaign_id: Option<String>,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "How to apply the date filter: >, <, >=, <=, = or between (default)")]
    pub time_operator: TimeOperator,
    #[schemars(description = "Metric columns to return: impressions, clicks, spend, conversions")]
    pub metrics: Option<Vec<String>>,
    #[schemars(description = "Maximum number of rows (default: 10)")]
    pub limit: Option<i64>,
}

/// Metric a campaign trend is computed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CampaignTrendMetric {
    #[default]
    Impressions,
    Clicks,
    Spend,
    Conversions,
    Ctr,
    Cpc,
}

impl CampaignTrendMetric {
    /// Column of the trend rows holding this metric.
    pub fn column(&self) -> &'static str {
        match self {
            CampaignTrendMetric::Impressions => "impressions",
            CampaignTrendMetric::Clicks => "clicks",
            CampaignTrendMetric::Spend => "spend",
            CampaignTrendMetric::Conversions => "conversions",
            CampaignTrendMetric::Ctr => "ctr",
            CampaignTrendMetric::Cpc => "cpc",
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CampaignTrendsArgs {
    #[schemars(description = "Filter by campaign name (partial match)")]
    pub campaign_name: Option<String>,
    #[schemars(description = "Aggregation period: daily (default), weekly or monthly")]
    pub period: Period,
    #[schemars(description = "Metric to analyze the trend for (default: impressions)")]
    pub metric: Option<CampaignTrendMetric>,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "Days to look back when no date range is given (default: 30)")]
    pub days_back: Option<i64>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CampaignSearchArgs {
    #[schemars(description = "Term to find in campaign names")]
    pub search_term: Option<String>,
    #[schemars(description = "Start date (YYYY-MM-DD)")]
    pub date_from: Option<String>,
    #[schemars(description = "End date (YYYY-MM-DD)")]
    pub date_to: Option<String>,
    #[schemars(description = "Minimum total spend")]
    pub min_spend: Option<f64>,
    #[schemars(description = "Minimum total impressions")]
    pub min_impressions: Option<i64>,
    #[schemars(description = "Only campaigns that have (true) or have no (false) conversions")]
    pub has_conversions: Option<bool>,
    #[schemars(description = "Maximum number of campaigns (default: 20)")]
    pub limit: Option<i64>,
}

pub const DEFAULT_DAYS_BACK: i64 = 30;

/// Row-level campaign records ranked by the channel's counter, with a summary.
pub fn campaign_performance(channel: &PaidMediaChannel, args: CampaignPerformanceArgs) -> AppResult<Report> {
    let (from, to) = date_range(args.date_from.as_deref(), args.date_to.as_deref())?;
    let dates = DateFilter::resolve(from, to, args.time_operator)?;
    let metrics = channel.select_metrics(args.metrics.as_deref(), CAMPAIGN_METRICS)?;

    let filters = channel
        .filters()
        .contains("campaign_name", args.campaign_name.as_deref())
        .equals("campaign_id", args.campaign_id.as_deref())
        .dates(DATE, dates.as_ref())
        .limit(resolve_limit(args.limit, 10)?);

    channel.performance(&filters, &metrics, (channel.rank_by, SortOrder::Desc), NO_CAMPAIGN_DATA)
}

pub fn campaign_trends(
    channel: &PaidMediaChannel,
    args: CampaignTrendsArgs,
    default_metric: CampaignTrendMetric,
) -> AppResult<Report> {
    let (from, to) = date_range(args.date_from.as_deref(), args.date_to.as_deref())?;
    let filters = channel
        .filters()
        .contains("campaign_name", args.campaign_name.as_deref())
        .date_window(DATE, from, to, args.days_back.unwrap_or(DEFAULT_DAYS_BACK))?;

    let metric = args.metric.unwrap_or(default_metric);
    channel.trends(&filters, args.period, metric.column(), NO_TREND_DATA)
}

/// Campaigns whose names match, with totals and HAVING thresholds.
pub fn campaign_search(
    channel: &PaidMediaChannel,
    args: CampaignSearchArgs,
    no_data: &'static str,
) -> AppResult<Report> {
    let (from, to) = date_range(args.date_from.as_deref(), args.date_to.as_deref())?;
    let filters = channel
        .filters()
        .contains("campaign_name", args.search_term.as_deref())
        .at_least(DATE, from)
        .at_most(DATE, to)
        .having_at_least("SUM(spend)", decimal_arg("min_spend", args.min_spend)?)
        .having_at_least("SUM(impressions)", args.min_impressions)
        .having_presence("SUM(conversions)", args.has_conversions)
        .limit(resolve_limit(args.limit, 20)?);

    channel.search(&filters, no_data)
}
