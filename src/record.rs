use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A single cell of a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Serialized as a string to preserve precision.
    Decimal(Decimal),
    Date(NaiveDate),
    Text(String),
}

impl MetricValue {
    /// Numeric view of the cell; dates, text and nulls are not numbers.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            MetricValue::Int(value) => Some(Decimal::from(*value)),
            MetricValue::Decimal(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Int(value)
    }
}

impl From<Decimal> for MetricValue {
    fn from(value: Decimal) -> Self {
        MetricValue::Decimal(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Decimal::from_f64(value)
            .map(MetricValue::Decimal)
            .unwrap_or(MetricValue::Null)
    }
}

impl From<NaiveDate> for MetricValue {
    fn from(value: NaiveDate) -> Self {
        MetricValue::Date(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl<T: Into<MetricValue>> From<Option<T>> for MetricValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(MetricValue::Null)
    }
}

/// One result row. Column order follows the SELECT list and is kept on output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    columns: Vec<(String, MetricValue)>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used by tests and summary assembly.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column, replacing any existing value with the same name in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<MetricValue>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&MetricValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn decimal(&self, column: &str) -> Option<Decimal> {
        self.get(column).and_then(MetricValue::as_decimal)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Append every column of `other`, overwriting shared names.
    pub fn extend(&mut self, other: MetricRecord) {
        for (name, value) in other.columns {
            self.insert(name, value);
        }
    }
}

impl Serialize for MetricRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_column_order() {
        let mut record = MetricRecord::new()
            .with("date", "2024-01-01")
            .with("impressions", 10i64)
            .with("spend", Decimal::new(450, 2));
        record.insert("impressions", 12i64);

        let names: Vec<&str> = record.columns().collect();
        assert_eq!(names, vec!["date", "impressions", "spend"]);
        assert_eq!(record.decimal("impressions"), Some(Decimal::from(12)));
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let record = MetricRecord::new()
            .with("campaign_name", "Spring")
            .with("cpc", Option::<Decimal>::None)
            .with("clicks", 3i64);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"campaign_name":"Spring","cpc":null,"clicks":3}"#);
    }

    #[test]
    fn test_only_numbers_are_decimal() {
        assert_eq!(MetricValue::from(7i64).as_decimal(), Some(Decimal::from(7)));
        assert_eq!(MetricValue::from("2024-02-29").as_decimal(), None);
        assert_eq!(MetricValue::from(NaiveDate::from_ymd_opt(2024, 2, 29)).as_decimal(), None);
        assert_eq!(MetricValue::Null.as_decimal(), None);
    }
}
