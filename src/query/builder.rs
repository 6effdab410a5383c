use crate::error::{AppError, AppResult};
use crate::metrics::MetricDefinition;
use crate::query::filter::{Condition, FilterRequest};
use crate::query::period::Period;
use crate::query::plan::{BindValue, QueryPlan};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Case-insensitive; anything other than `asc` sorts descending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Fixed mapping from a caller-facing sort key to the expression it orders by.
#[derive(Debug, Clone, Copy)]
pub struct SortWhitelist {
    pub entries: &'static [(&'static str, &'static str)],
    pub default_key: &'static str,
}

impl SortWhitelist {
    /// Resolve `key` to its expression. Unknown or missing keys fall back to
    /// the default key, so an unvalidated identifier never reaches ORDER BY.
    pub fn resolve(&self, key: Option<&str>) -> (&'static str, &'static str) {
        let lookup = |wanted: &str| {
            self.entries
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .copied()
        };
        key.map(str::trim)
            .and_then(|wanted| lookup(wanted))
            .or_else(|| lookup(self.default_key))
            .unwrap_or((self.default_key, self.default_key))
    }
}

/// Assembles one SELECT in clause order: projection, FROM, WHERE, GROUP BY,
/// HAVING, ORDER BY, LIMIT. Table, column and sort expressions are trusted
/// configuration; filter values only enter through [`FilterRequest`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    table: String,
    columns: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
}

impl QueryBuilder {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    pub fn column(mut self, expr: impl Into<String>) -> Self {
        self.columns.push(expr.into());
        self
    }

    pub fn columns<I, S>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(exprs.into_iter().map(Into::into));
        self
    }

    pub fn aliased(self, expr: &str, alias: &str) -> Self {
        self.column(format!("{} AS {}", expr, alias))
    }

    /// `SUM(column) AS total_column`
    pub fn sum(self, column: &str, alias: &str) -> Self {
        self.column(format!("SUM({}) AS {}", column, alias))
    }

    pub fn row_metrics(self, metrics: &[MetricDefinition]) -> Self {
        self.columns(metrics.iter().map(MetricDefinition::row_column))
    }

    pub fn aggregate_metrics(self, metrics: &[MetricDefinition]) -> Self {
        self.columns(metrics.iter().map(MetricDefinition::aggregate_column))
    }

    pub fn group_by(mut self, expr: &str) -> Self {
        self.group_by.push(expr.to_string());
        self
    }

    /// Bucket rows by `period`: the label is projected under `alias`, rows are
    /// grouped by the truncated date and ordered oldest first.
    pub fn period(self, period: Period, date_column: &str, alias: &str) -> Self {
        let group = period.group_expr(date_column);
        self.aliased(&period.label_expr(date_column), alias)
            .group_by(&group)
            .order_by(&group, SortOrder::Asc)
    }

    pub fn order_by(mut self, expr: &str, order: SortOrder) -> Self {
        self.order_by.push(format!("{} {}", expr, order.as_sql()));
        self
    }

    pub fn order_by_nulls_last(mut self, expr: &str, order: SortOrder) -> Self {
        self.order_by
            .push(format!("{} {} NULLS LAST", expr, order.as_sql()));
        self
    }

    pub fn build(&self, filters: &FilterRequest) -> AppResult<QueryPlan> {
        if self.columns.is_empty() {
            return Err(AppError::QueryError(format!(
                "no columns selected from {}",
                self.table
            )));
        }

        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.table);
        let mut params: Vec<BindValue> = Vec::new();

        append_conditions(&mut sql, &mut params, " WHERE ", filters.conditions());

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        append_conditions(&mut sql, &mut params, " HAVING ", filters.aggregate_conditions());

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = filters.limit_value() {
            params.push(BindValue::Int(limit));
            sql.push_str(&format!(" LIMIT ${}", params.len()));
        }

        Ok(QueryPlan::new(sql, params))
    }
}

fn append_conditions(
    sql: &mut String,
    params: &mut Vec<BindValue>,
    keyword: &str,
    conditions: &[Condition],
) {
    for (idx, condition) in conditions.iter().enumerate() {
        sql.push_str(if idx == 0 { keyword } else { " AND " });
        condition.render_into(sql, params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::catalog::{CONVERSION_RATE, CTR_PERCENT};
    use crate::query::filter::{DateFilter, TimeOperator};
    use chrono::NaiveDate;
    use sqlparser::ast::Statement;
    use sqlparser::dialect::PostgreSqlDialect;
    use sqlparser::parser::Parser;

    const SORTS: SortWhitelist = SortWhitelist {
        entries: &[("date", "date"), ("conversion_rate", "conversion_rate"), ("impressions", "impressions")],
        default_key: "date",
    };

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn assert_single_select(sql: &str) {
        let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Statement::Query(_)));
    }

    fn assert_placeholders_match(plan: &QueryPlan) {
        let expected: Vec<usize> = (1..=plan.params().len()).collect();
        assert_eq!(plan.placeholders(), expected, "sql: {}", plan.sql());
    }

    #[test]
    fn test_no_filters_means_no_where() {
        let plan = QueryBuilder::from("linkedin_ads")
            .columns(["date", "campaign_name"])
            .build(&FilterRequest::new())
            .unwrap();
        assert_eq!(plan.sql(), "SELECT date, campaign_name FROM linkedin_ads");
        assert!(plan.params().is_empty());
    }

    #[test]
    fn test_filters_bind_in_clause_order_with_limit_last() {
        let dates = DateFilter::resolve(
            Some(date("2024-01-01")),
            Some(date("2024-01-31")),
            TimeOperator::Between,
        )
        .unwrap();
        let filters = FilterRequest::new()
            .contains("campaign_name", Some("spring"))
            .equals("campaign_id", Some("C-9"))
            .dates("date", dates.as_ref())
            .at_least("spend", Some(100i64))
            .limit(10);

        let plan = QueryBuilder::from("linkedin_ads")
            .column("*")
            .row_metrics(&[CTR_PERCENT])
            .order_by("spend", SortOrder::Desc)
            .build(&filters)
            .unwrap();

        assert_eq!(
            plan.sql(),
            "SELECT *, ROUND(CAST(clicks AS NUMERIC) / NULLIF(impressions, 0) * 100, 2) AS ctr_percent \
             FROM linkedin_ads WHERE campaign_name ILIKE $1 AND CAST(campaign_id AS TEXT) = $2 \
             AND date BETWEEN $3 AND $4 AND spend >= $5 ORDER BY spend DESC LIMIT $6"
        );
        assert_eq!(plan.params().len(), 6);
        assert_eq!(plan.params()[0], BindValue::Text("%spring%".into()));
        assert_eq!(plan.params()[5], BindValue::Int(10));
        assert_eq!(plan.sql().matches("BETWEEN").count(), 1);
        assert_placeholders_match(&plan);
        assert_single_select(plan.sql());
    }

    #[test]
    fn test_having_follows_group_by() {
        let filters = FilterRequest::new()
            .contains("campaign_name", Some("promo"))
            .having_at_least("SUM(spend)", Some(50i64))
            .having_presence("SUM(conversions)", Some(true))
            .limit(20);

        let plan = QueryBuilder::from("tiktok_campaign_ad_details")
            .column("campaign_name")
            .sum("spend", "total_spend")
            .group_by("campaign_name")
            .order_by("total_spend", SortOrder::Desc)
            .build(&filters)
            .unwrap();

        assert_eq!(
            plan.sql(),
            "SELECT campaign_name, SUM(spend) AS total_spend FROM tiktok_campaign_ad_details \
             WHERE campaign_name ILIKE $1 GROUP BY campaign_name \
             HAVING SUM(spend) >= $2 AND SUM(conversions) > 0 ORDER BY total_spend DESC LIMIT $3"
        );
        assert_placeholders_match(&plan);
        assert_single_select(plan.sql());
    }

    #[test]
    fn test_period_orders_ascending() {
        let filters = FilterRequest::new()
            .date_window("date", None, None, 30)
            .unwrap();
        let plan = QueryBuilder::from("connected_tv_ads")
            .period(Period::Weekly, "date", "period")
            .sum("impressions", "impressions")
            .aggregate_metrics(&[CONVERSION_RATE])
            .build(&filters)
            .unwrap();

        assert!(plan.sql().contains("GROUP BY DATE_TRUNC('week', date)"));
        assert!(plan.sql().ends_with("ORDER BY DATE_TRUNC('week', date) ASC"));
        assert_placeholders_match(&plan);
        assert_single_select(plan.sql());
    }

    #[test]
    fn test_sort_whitelist_falls_back() {
        assert_eq!(SORTS.resolve(Some("Conversion_Rate")).1, "conversion_rate");
        assert_eq!(SORTS.resolve(Some("date; DROP TABLE x")).1, "date");
        assert_eq!(SORTS.resolve(None).0, "date");
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("sideways")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(None), SortOrder::Desc);
    }

    #[test]
    fn test_empty_projection_rejected() {
        let result = QueryBuilder::from("email_campaigns").build(&FilterRequest::new());
        assert!(matches!(result, Err(AppError::QueryError(_))));
    }
}
