use crate::error::{AppError, AppResult};
use crate::query::plan::BindValue;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MAX_LIMIT: i64 = 1000;

/// Comparison applied between a column expression and one bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
        }
    }
}

/// How `date_from` / `date_to` are applied by the performance tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TimeOperator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
    #[default]
    #[serde(rename = "between")]
    Between,
}

impl TimeOperator {
    fn compare_op(&self) -> Option<CompareOp> {
        match self {
            TimeOperator::Gt => Some(CompareOp::Gt),
            TimeOperator::Lt => Some(CompareOp::Lt),
            TimeOperator::Ge => Some(CompareOp::Ge),
            TimeOperator::Le => Some(CompareOp::Le),
            TimeOperator::Eq => Some(CompareOp::Eq),
            TimeOperator::Between => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Sql(String),
    Param(BindValue),
}

/// One WHERE or HAVING element. Literal SQL comes only from channel
/// configuration; every user-supplied value is a bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pieces: Vec<Piece>,
}

impl Condition {
    /// A trusted, parameterless predicate such as `source = 'Bing Ads'`.
    pub fn predicate(sql: impl Into<String>) -> Self {
        Self {
            pieces: vec![Piece::Sql(sql.into())],
        }
    }

    pub fn compare(expr: &str, op: CompareOp, value: impl Into<BindValue>) -> Self {
        Self {
            pieces: vec![
                Piece::Sql(format!("{} {} ", expr, op.as_sql())),
                Piece::Param(value.into()),
            ],
        }
    }

    /// Case-insensitive substring match.
    pub fn contains(expr: &str, term: &str) -> Self {
        Self {
            pieces: vec![
                Piece::Sql(format!("{} ILIKE ", expr)),
                Piece::Param(BindValue::Text(format!("%{}%", escape_like(term)))),
            ],
        }
    }

    pub fn equals_ignore_case(expr: &str, value: &str) -> Self {
        Self {
            pieces: vec![
                Piece::Sql(format!("LOWER({}) = LOWER(", expr)),
                Piece::Param(BindValue::Text(value.to_string())),
                Piece::Sql(")".to_string()),
            ],
        }
    }

    pub fn between(expr: &str, low: impl Into<BindValue>, high: impl Into<BindValue>) -> Self {
        Self {
            pieces: vec![
                Piece::Sql(format!("{} BETWEEN ", expr)),
                Piece::Param(low.into()),
                Piece::Sql(" AND ".to_string()),
                Piece::Param(high.into()),
            ],
        }
    }

    /// `(a OR b OR ...)`, parenthesised so it composes under `AND`.
    pub fn any_of(conditions: Vec<Condition>) -> Self {
        let mut pieces = vec![Piece::Sql("(".to_string())];
        for (idx, condition) in conditions.into_iter().enumerate() {
            if idx > 0 {
                pieces.push(Piece::Sql(" OR ".to_string()));
            }
            pieces.extend(condition.pieces);
        }
        pieces.push(Piece::Sql(")".to_string()));
        Self { pieces }
    }

    /// `date >= CURRENT_DATE - n`, with the day count bound.
    pub fn within_last_days(date_column: &str, days: i64) -> Self {
        Self {
            pieces: vec![
                Piece::Sql(format!("{} >= CURRENT_DATE - CAST(", date_column)),
                Piece::Param(BindValue::Int(days)),
                Piece::Sql(" AS INTEGER)".to_string()),
            ],
        }
    }

    /// Append this condition, numbering placeholders after the params already collected.
    pub(crate) fn render_into(&self, sql: &mut String, params: &mut Vec<BindValue>) {
        for piece in &self.pieces {
            match piece {
                Piece::Sql(text) => sql.push_str(text),
                Piece::Param(value) => {
                    params.push(value.clone());
                    sql.push('$');
                    sql.push_str(&params.len().to_string());
                }
            }
        }
    }
}

/// Escape LIKE wildcards so a search term matches literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn parse_date(field: &str, value: Option<&str>) -> AppResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AppError::InvalidArgument(format!("{} must be a YYYY-MM-DD date, got '{}'", field, raw))
            }),
        None => Ok(None),
    }
}

/// Resolve a caller's limit: default when absent, rejected when not positive.
pub fn resolve_limit(limit: Option<i64>, default: i64) -> AppResult<i64> {
    match limit {
        Some(value) if value < 1 => Err(AppError::InvalidArgument(format!(
            "limit must be at least 1, got {}",
            value
        ))),
        Some(value) => Ok(value.min(MAX_LIMIT)),
        None => Ok(default),
    }
}

/// Date restriction for the row-level performance tools.
#[derive(Debug, Clone, PartialEq)]
pub enum DateFilter {
    Compare(CompareOp, NaiveDate),
    Between(NaiveDate, NaiveDate),
}

impl DateFilter {
    /// `between` needs both bounds; otherwise the one bound present is applied.
    pub fn resolve(
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        operator: TimeOperator,
    ) -> AppResult<Option<Self>> {
        let filter = match (from, to, operator.compare_op()) {
            (Some(from), Some(to), None) => {
                if from > to {
                    return Err(AppError::InvalidArgument(format!(
                        "date_from {} is after date_to {}",
                        from, to
                    )));
                }
                Some(DateFilter::Between(from, to))
            }
            (Some(from), _, None) => Some(DateFilter::Compare(CompareOp::Ge, from)),
            (Some(from), _, Some(op)) => Some(DateFilter::Compare(op, from)),
            (None, Some(to), None) => Some(DateFilter::Compare(CompareOp::Le, to)),
            (None, Some(to), Some(op)) => Some(DateFilter::Compare(op, to)),
            (None, None, _) => None,
        };
        Ok(filter)
    }

    pub fn condition(&self, column: &str) -> Condition {
        match self {
            DateFilter::Compare(op, date) => Condition::compare(column, *op, *date),
            DateFilter::Between(from, to) => Condition::between(column, *from, *to),
        }
    }
}

/// The validated filters of one query: WHERE elements, HAVING elements, and a row cap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterRequest {
    conditions: Vec<Condition>,
    aggregate_conditions: Vec<Condition>,
    limit: Option<i64>,
}

impl FilterRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Append another request's conditions. Its limit is ignored.
    pub fn with_all(mut self, other: FilterRequest) -> Self {
        self.conditions.extend(other.conditions);
        self.aggregate_conditions.extend(other.aggregate_conditions);
        self
    }

    pub fn predicate(self, sql: &'static str) -> Self {
        self.with(Condition::predicate(sql))
    }

    pub fn contains(self, expr: &str, term: Option<&str>) -> Self {
        match non_blank(term) {
            Some(term) => self.with(Condition::contains(expr, term)),
            None => self,
        }
    }

    pub fn equals_ignore_case(self, expr: &str, value: Option<&str>) -> Self {
        match non_blank(value) {
            Some(value) => self.with(Condition::equals_ignore_case(expr, value)),
            None => self,
        }
    }

    /// Exact match on an identifier column, compared as text so string IDs
    /// bind against integer or text columns alike.
    pub fn equals(self, expr: &str, value: Option<&str>) -> Self {
        match non_blank(value) {
            Some(value) => self.with(Condition::compare(
                &format!("CAST({} AS TEXT)", expr),
                CompareOp::Eq,
                value,
            )),
            None => self,
        }
    }

    pub fn at_least<V: Into<BindValue>>(self, expr: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(Condition::compare(expr, CompareOp::Ge, value)),
            None => self,
        }
    }

    pub fn at_most<V: Into<BindValue>>(self, expr: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(Condition::compare(expr, CompareOp::Le, value)),
            None => self,
        }
    }

    pub fn dates(self, column: &str, filter: Option<&DateFilter>) -> Self {
        match filter {
            Some(filter) => self.with(filter.condition(column)),
            None => self,
        }
    }

    /// Trend window: explicit bounds when given, otherwise the last `days_back` days.
    pub fn date_window(
        self,
        column: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        days_back: i64,
    ) -> AppResult<Self> {
        if days_back < 0 {
            return Err(AppError::InvalidArgument(format!(
                "days_back must not be negative, got {}",
                days_back
            )));
        }
        let mut request = self;
        match (from, to) {
            (Some(from), _) => {
                request = request.with(Condition::compare(column, CompareOp::Ge, from));
            }
            (None, None) => {
                request = request.with(Condition::within_last_days(column, days_back));
            }
            (None, Some(_)) => {}
        }
        if let Some(to) = to {
            request = request.with(Condition::compare(column, CompareOp::Le, to));
        }
        Ok(request)
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.aggregate_conditions.push(condition);
        self
    }

    pub fn having_at_least<V: Into<BindValue>>(self, expr: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.having(Condition::compare(expr, CompareOp::Ge, value)),
            None => self,
        }
    }

    /// `SUM(x) > 0` when `true`, `SUM(x) = 0` when `false`.
    pub fn having_presence(self, expr: &str, present: Option<bool>) -> Self {
        match present {
            Some(true) => self.having(Condition::predicate(format!("{} > 0", expr))),
            Some(false) => self.having(Condition::predicate(format!("{} = 0", expr))),
            None => self,
        }
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Same filters, no row cap: the full filtered set a summary runs over.
    pub fn without_limit(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            aggregate_conditions: self.aggregate_conditions.clone(),
            limit: None,
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn aggregate_conditions(&self) -> &[Condition] {
        &self.aggregate_conditions
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn render(condition: &Condition) -> (String, Vec<BindValue>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        condition.render_into(&mut sql, &mut params);
        (sql, params)
    }

    #[test]
    fn test_between_uses_single_fragment() {
        let filter = DateFilter::resolve(
            Some(date("2024-01-01")),
            Some(date("2024-01-31")),
            TimeOperator::Between,
        )
        .unwrap()
        .unwrap();
        let (sql, params) = render(&filter.condition("date"));
        assert_eq!(sql, "date BETWEEN $1 AND $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_single_bound_uses_operator() {
        let filter = DateFilter::resolve(Some(date("2024-03-01")), None, TimeOperator::Gt)
            .unwrap()
            .unwrap();
        assert_eq!(render(&filter.condition("date")).0, "date > $1");

        let filter = DateFilter::resolve(Some(date("2024-03-01")), None, TimeOperator::Between)
            .unwrap()
            .unwrap();
        assert_eq!(render(&filter.condition("date")).0, "date >= $1");

        let filter = DateFilter::resolve(None, Some(date("2024-03-01")), TimeOperator::Between)
            .unwrap()
            .unwrap();
        assert_eq!(render(&filter.condition("date")).0, "date <= $1");
    }

    #[test]
    fn test_reversed_range_rejected() {
        let result = DateFilter::resolve(
            Some(date("2024-02-01")),
            Some(date("2024-01-01")),
            TimeOperator::Between,
        );
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_no_dates_no_filter() {
        assert_eq!(DateFilter::resolve(None, None, TimeOperator::Eq).unwrap(), None);
    }

    #[test]
    fn test_contains_escapes_wildcards() {
        let (sql, params) = render(&Condition::contains("campaign_name", "50%_off"));
        assert_eq!(sql, "campaign_name ILIKE $1");
        assert_eq!(params, vec![BindValue::Text("%50\\%\\_off%".into())]);
    }

    #[test]
    fn test_any_of_is_parenthesised() {
        let condition = Condition::any_of(vec![
            Condition::contains("network", "abc"),
            Condition::contains("network", "nbc"),
        ]);
        let (sql, params) = render(&condition);
        assert_eq!(sql, "(network ILIKE $1 OR network ILIKE $2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_blank_filters_are_skipped() {
        let request = FilterRequest::new()
            .contains("ad_slot", Some("   "))
            .equals("campaign_id", None)
            .at_least::<i64>("impressions", None);
        assert!(request.conditions().is_empty());
    }

    #[test]
    fn test_date_window_defaults_to_lookback() {
        let request = FilterRequest::new().date_window("date", None, None, 30).unwrap();
        let (sql, params) = render(&request.conditions()[0]);
        assert_eq!(sql, "date >= CURRENT_DATE - CAST($1 AS INTEGER)");
        assert_eq!(params, vec![BindValue::Int(30)]);

        let request = FilterRequest::new()
            .date_window("date", None, Some(date("2024-05-01")), 30)
            .unwrap();
        assert_eq!(request.conditions().len(), 1);
        assert_eq!(render(&request.conditions()[0]).0, "date <= $1");
    }

    #[test]
    fn test_date_window_rejects_negative_days() {
        assert!(FilterRequest::new().date_window("date", None, None, -1).is_err());
    }

    #[test]
    fn test_presence_flag_has_no_param() {
        let request = FilterRequest::new().having_presence("SUM(conversions)", Some(false));
        let (sql, params) = render(&request.aggregate_conditions()[0]);
        assert_eq!(sql, "SUM(conversions) = 0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_resolve_limit() {
        assert_eq!(resolve_limit(None, 10).unwrap(), 10);
        assert_eq!(resolve_limit(Some(5), 10).unwrap(), 5);
        assert_eq!(resolve_limit(Some(50_000), 10).unwrap(), MAX_LIMIT);
        assert!(resolve_limit(Some(0), 10).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("date_from", Some("2024-01-05")).unwrap(), Some(date("2024-01-05")));
        assert_eq!(parse_date("date_from", Some("")).unwrap(), None);
        assert!(parse_date("date_from", Some("05/01/2024")).is_err());
    }

    #[test]
    fn test_time_operator_serde_names() {
        let op: TimeOperator = serde_json::from_str("\">=\"").unwrap();
        assert_eq!(op, TimeOperator::Ge);
        let op: TimeOperator = serde_json::from_str("\"between\"").unwrap();
        assert_eq!(op, TimeOperator::Between);
    }
}
