use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// A filter value bound to a `$n` placeholder. Never spliced into SQL text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    Bool(bool),
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::Text(value.to_string())
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::Text(value)
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        BindValue::Int(value)
    }
}

impl From<Decimal> for BindValue {
    fn from(value: Decimal) -> Self {
        BindValue::Decimal(value)
    }
}

impl From<NaiveDate> for BindValue {
    fn from(value: NaiveDate) -> Self {
        BindValue::Date(value)
    }
}

impl From<bool> for BindValue {
    fn from(value: bool) -> Self {
        BindValue::Bool(value)
    }
}

/// SQL text plus the values for its placeholders, in placeholder order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    sql: String,
    params: Vec<BindValue>,
}

impl QueryPlan {
    pub(crate) fn new(sql: String, params: Vec<BindValue>) -> Self {
        Self { sql, params }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[BindValue] {
        &self.params
    }

    /// Placeholder numbers in the order they appear in the SQL text.
    pub fn placeholders(&self) -> Vec<usize> {
        placeholder_numbers(&self.sql)
    }
}

pub(crate) fn placeholder_numbers(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut in_literal = false;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                in_literal = !in_literal;
                i += 1;
            }
            b'$' if !in_literal => {
                i += 1;
                let start = i;
                let mut value = 0usize;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    value = value * 10 + (bytes[i] - b'0') as usize;
                    i += 1;
                }
                if i > start {
                    found.push(value);
                }
            }
            _ => i += 1,
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_numbers_skip_literals() {
        let sql = "SELECT * FROM t WHERE a = $1 AND b = '$9' AND c BETWEEN $2 AND $3 LIMIT $4";
        assert_eq!(placeholder_numbers(sql), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_bind_value_conversions() {
        assert_eq!(BindValue::from("roku"), BindValue::Text("roku".into()));
        assert_eq!(BindValue::from(10i64), BindValue::Int(10));
        assert_eq!(BindValue::from(true), BindValue::Bool(true));
    }
}
