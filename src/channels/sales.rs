//! Customer purchase behavior over the consolidated profit table. Its
//! column names carry spaces and capitals, so every reference is quoted.

use crate::channels::decimal_arg;
use crate::error::AppResult;
use crate::metrics::catalog::PROFIT_MARGIN;
use crate::metrics::{MetricDefinition, Operand};
use crate::query::{resolve_limit, FilterRequest, QueryBuilder, SortOrder};
use crate::tools::report::Report;
use crate::tools::{parse_args, ToolSpec};
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

pub const CHANNEL: &str = "sales";

const TABLE: &str = "consolidated_profit";
const CUSTOMER: &str = "\"Customer ID\"";
const CATEGORY: &str = "\"Category\"";
const MERCHANT: &str = "\"Merchant_Name\"";
const GROSS: &str = "\"Gross Profit\"";
const NET: &str = "\"Net Profit\"";
const PAYMENT: &str = "\"Customer Payment\"";

const NO_DATA: &str = "No customer data found matching the specified criteria.";

const PAYMENT_TO_PROFIT: MetricDefinition = MetricDefinition::percent(
    "payment_to_profit_ratio",
    Operand::Counter(PAYMENT),
    Operand::Counter(GROSS),
    2,
);

const ZERO_PAYMENT_PERCENTAGE: &str =
    "ROUND(COUNT(CASE WHEN \"Customer Payment\" = 0 THEN 1 END) * 100.0 / NULLIF(COUNT(*), 0), 2)";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    #[default]
    CustomerProfile,
    ProfitabilityAnalysis,
    CategoryPreferences,
    MerchantRelationships,
    PaymentBehavior,
    LifetimeValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSort {
    #[default]
    TotalGrossProfit,
    TotalNetProfit,
    TransactionCount,
    AvgPayment,
    CustomerId,
}

impl CustomerSort {
    /// Aggregate expression the sort key ranks by, valid in every grouping.
    pub fn expr(&self) -> &'static str {
        match self {
            CustomerSort::TotalGrossProfit => "SUM(\"Gross Profit\")",
            CustomerSort::TotalNetProfit => "SUM(\"Net Profit\")",
            CustomerSort::TransactionCount => "COUNT(*)",
            CustomerSort::AvgPayment => "AVG(\"Customer Payment\")",
            CustomerSort::CustomerId => CUSTOMER,
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CustomerBehaviorArgs {
    #[schemars(description = "Specific customer ID to analyze")]
    pub customer_id: Option<String>,
    #[schemars(description = "Filter by product category (exact, case-insensitive)")]
    pub category: Option<String>,
    #[schemars(description = "Filter by merchant name (exact, case-insensitive)")]
    pub merchant_name: Option<String>,
    #[schemars(description = "customer_profile (default), profitability_analysis, category_preferences, merchant_relationships, payment_behavior or lifetime_value")]
    pub analysis_type: AnalysisType,
    #[schemars(description = "Minimum total gross profit per group")]
    pub min_gross_profit: Option<f64>,
    #[schemars(description = "Minimum total net profit per group")]
    pub min_net_profit: Option<f64>,
    #[schemars(description = "Minimum number of transactions per group (default: 1)")]
    pub min_transactions: Option<i64>,
    #[schemars(description = "Sort by: total_gross_profit (default), total_net_profit, transaction_count, avg_payment, customer_id")]
    pub sort_by: CustomerSort,
    #[schemars(description = "Maximum number of rows (default: 20)")]
    pub limit: Option<i64>,
}

pub fn customer_behavior(args: CustomerBehaviorArgs) -> AppResult<Report> {
    let filters = FilterRequest::new()
        .equals(CUSTOMER, args.customer_id.as_deref())
        .equals_ignore_case(CATEGORY, args.category.as_deref())
        .equals_ignore_case(MERCHANT, args.merchant_name.as_deref())
        .having_at_least("SUM(\"Gross Profit\")", decimal_arg("min_gross_profit", args.min_gross_profit)?)
        .having_at_least("SUM(\"Net Profit\")", decimal_arg("min_net_profit", args.min_net_profit)?)
        .having_at_least("COUNT(*)", Some(args.min_transactions.unwrap_or(1)))
        .limit(resolve_limit(args.limit, 20)?);

    let ranked = |builder: QueryBuilder| builder.group_by(CUSTOMER).order_by(args.sort_by.expr(), SortOrder::Desc);

    let builder = match args.analysis_type {
        AnalysisType::CustomerProfile => ranked(
            QueryBuilder::from(TABLE)
                .column(CUSTOMER)
                .aliased("COUNT(*)", "transaction_count")
                .sum(GROSS, "total_gross_profit")
                .sum(NET, "total_net_profit")
                .sum(PAYMENT, "total_payments")
                .aliased("ROUND(AVG(\"Gross Profit\"), 2)", "avg_gross_profit")
                .aliased("ROUND(AVG(\"Net Profit\"), 2)", "avg_net_profit")
                .aliased("ROUND(AVG(\"Customer Payment\"), 2)", "avg_payment")
                .aggregate_metrics(&[PROFIT_MARGIN])
                .aliased("COUNT(DISTINCT \"Category\")", "categories_purchased")
                .aliased("COUNT(DISTINCT \"Merchant_Name\")", "merchants_used")
                .aliased("STRING_AGG(DISTINCT \"Category\", ', ')", "preferred_categories")
                .aliased("STRING_AGG(DISTINCT \"Merchant_Name\", ', ')", "used_merchants")
                .aliased("MIN(\"Gross Profit\")", "min_transaction_gross")
                .aliased("MAX(\"Gross Profit\")", "max_transaction_gross"),
        ),
        AnalysisType::ProfitabilityAnalysis => ranked(
            QueryBuilder::from(TABLE)
                .column(CUSTOMER)
                .aliased("COUNT(*)", "transaction_count")
                .sum(GROSS, "total_gross_profit")
                .sum(NET, "total_net_profit")
                .aliased("SUM(\"Gross Profit\") - SUM(\"Net Profit\")", "total_costs")
                .aggregate_metrics(&[PROFIT_MARGIN.named("profit_margin")])
                .aliased("ROUND(AVG(\"Net Profit\"), 2)", "avg_profit_per_transaction")
                .aliased("MAX(\"Net Profit\")", "highest_profit_transaction")
                .aliased("MIN(\"Net Profit\")", "lowest_profit_transaction"),
        ),
        AnalysisType::CategoryPreferences => share_of_customer(CATEGORY, "category", "transactions_in_category"),
        AnalysisType::MerchantRelationships => share_of_customer(MERCHANT, "merchant", "transactions_with_merchant"),
        AnalysisType::PaymentBehavior => ranked(
            QueryBuilder::from(TABLE)
                .column(CUSTOMER)
                .aliased("COUNT(*)", "total_transactions")
                .sum(PAYMENT, "total_payments")
                .sum(GROSS, "total_gross_profit")
                .aliased("ROUND(AVG(\"Customer Payment\"), 2)", "avg_payment_amount")
                .aliased("COUNT(CASE WHEN \"Customer Payment\" = 0 THEN 1 END)", "zero_payment_count")
                .aliased("COUNT(CASE WHEN \"Customer Payment\" > 0 THEN 1 END)", "paid_transaction_count")
                .aliased(ZERO_PAYMENT_PERCENTAGE, "zero_payment_percentage")
                .aggregate_metrics(&[PAYMENT_TO_PROFIT]),
        ),
        AnalysisType::LifetimeValue => ranked(
            QueryBuilder::from(TABLE)
                .column(CUSTOMER)
                .aliased("COUNT(*)", "lifetime_transactions")
                .sum(GROSS, "lifetime_gross_profit")
                .sum(NET, "lifetime_net_profit")
                .sum(PAYMENT, "lifetime_payments")
                .aliased("ROUND(AVG(\"Gross Profit\"), 2)", "avg_transaction_value")
                .aliased("ROUND(SUM(\"Net Profit\") / COUNT(*), 2)", "avg_profit_per_transaction")
                .aliased("COUNT(DISTINCT \"Category\")", "category_diversity")
                .aliased("COUNT(DISTINCT \"Merchant_Name\")", "merchant_diversity")
                .aggregate_metrics(&[PROFIT_MARGIN.named("overall_margin_pct")]),
        ),
    };

    Ok(Report::rows(builder.build(&filters)?, NO_DATA))
}

/// Per customer and `dimension`: volumes plus the dimension's share of the
/// customer's transactions. Rows stay grouped by customer, best first.
fn share_of_customer(dimension: &str, prefix: &str, count_alias: &str) -> QueryBuilder {
    let gross = format!("{}_gross_profit", prefix);
    QueryBuilder::from(TABLE)
        .columns([CUSTOMER, dimension])
        .aliased("COUNT(*)", count_alias)
        .sum(GROSS, &gross)
        .sum(NET, &format!("{}_net_profit", prefix))
        .sum(PAYMENT, &format!("{}_payments", prefix))
        .aliased("ROUND(AVG(\"Gross Profit\"), 2)", &format!("avg_{}_gross_profit", prefix))
        .aliased(
            "ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER (PARTITION BY \"Customer ID\"), 2)",
            &format!("{}_percentage", prefix),
        )
        .group_by(CUSTOMER)
        .group_by(dimension)
        .order_by(CUSTOMER, SortOrder::Asc)
        .order_by(&gross, SortOrder::Desc)
}

pub fn tools() -> Vec<ToolSpec> {
    vec![ToolSpec {
        channel: CHANNEL,
        name: "analyze_customer_purchase_behavior",
        description: "Analyze customer purchase behavior: profiles, profitability, category and merchant preferences, payment behavior or lifetime value.",
        action: "analyzing customer behavior",
        schema: || schema_for!(CustomerBehaviorArgs),
        prepare: |args| customer_behavior(parse_args(args)?),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::BindValue;
    use crate::sanitizer::validate_plan;
    use serde_json::json;

    fn plan_for(args: serde_json::Value) -> crate::query::QueryPlan {
        customer_behavior(parse_args(args).unwrap())
            .unwrap()
            .planned_queries()
            .remove(0)
            .plan
    }

    #[test]
    fn test_profile_quotes_identifiers_and_binds_having_before_limit() {
        let plan = plan_for(json!({"category": "Electronics", "min_net_profit": 50.0, "limit": 5}));
        let sql = plan.sql();
        assert!(sql.contains("WHERE LOWER(\"Category\") = LOWER($1)"));
        assert!(sql.contains("GROUP BY \"Customer ID\" HAVING SUM(\"Net Profit\") >= $2 AND COUNT(*) >= $3"));
        assert!(sql.ends_with("ORDER BY SUM(\"Gross Profit\") DESC LIMIT $4"));
        assert_eq!(plan.params()[2], BindValue::Int(1));
        assert_eq!(plan.params()[3], BindValue::Int(5));
        validate_plan(&plan).unwrap();
    }

    #[test]
    fn test_category_share_uses_window_over_customer() {
        let plan = plan_for(json!({"analysis_type": "category_preferences"}));
        assert!(plan
            .sql()
            .contains("SUM(COUNT(*)) OVER (PARTITION BY \"Customer ID\"), 2) AS category_percentage"));
        assert!(plan
            .sql()
            .contains("ORDER BY \"Customer ID\" ASC, category_gross_profit DESC"));
        validate_plan(&plan).unwrap();
    }

    #[test]
    fn test_share_count_columns() {
        let category = plan_for(json!({"analysis_type": "category_preferences"}));
        assert!(category.sql().contains("COUNT(*) AS transactions_in_category"));

        let merchant = plan_for(json!({"analysis_type": "merchant_relationships"}));
        assert!(merchant.sql().contains("COUNT(*) AS transactions_with_merchant"));
        assert!(merchant.sql().contains("AS merchant_percentage"));
    }

    #[test]
    fn test_every_analysis_type_validates() {
        for kind in [
            "customer_profile",
            "profitability_analysis",
            "category_preferences",
            "merchant_relationships",
            "payment_behavior",
            "lifetime_value",
        ] {
            let plan = plan_for(json!({"analysis_type": kind, "customer_id": "C-1", "sort_by": "avg_payment"}));
            assert!(plan.sql().contains("CAST(\"Customer ID\" AS TEXT) = $1"), "{}", kind);
            validate_plan(&plan).unwrap();
        }
    }

    #[test]
    fn test_unknown_sort_key_is_rejected() {
        let err = parse_args::<CustomerBehaviorArgs>(json!({"sort_by": "revenue"})).unwrap_err();
        assert!(matches!(err, crate::error::AppError::InvalidArgument(_)));
    }
}
