use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bucket size for trend queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// Expression the rows are grouped and ordered by.
    pub fn group_expr(&self, date_column: &str) -> String {
        match self {
            Period::Daily => date_column.to_string(),
            Period::Weekly => format!("DATE_TRUNC('week', {})", date_column),
            Period::Monthly => format!("DATE_TRUNC('month', {})", date_column),
        }
    }

    /// Canonical label: `YYYY-MM-DD` for days and weeks, `YYYY-MM` for months.
    pub fn label_expr(&self, date_column: &str) -> String {
        let format = match self {
            Period::Daily | Period::Weekly => "YYYY-MM-DD",
            Period::Monthly => "YYYY-MM",
        };
        format!("TO_CHAR({}, '{}')", self.group_expr(date_column), format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_groups_on_raw_date() {
        assert_eq!(Period::Daily.group_expr("date"), "date");
        assert_eq!(Period::Daily.label_expr("ad_date"), "TO_CHAR(ad_date, 'YYYY-MM-DD')");
    }

    #[test]
    fn test_weekly_and_monthly_truncate() {
        assert_eq!(
            Period::Weekly.label_expr("date"),
            "TO_CHAR(DATE_TRUNC('week', date), 'YYYY-MM-DD')"
        );
        assert_eq!(
            Period::Monthly.label_expr("date"),
            "TO_CHAR(DATE_TRUNC('month', date), 'YYYY-MM')"
        );
    }

    #[test]
    fn test_period_deserializes_lowercase() {
        let period: Period = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(period, Period::Monthly);
        assert!(serde_json::from_str::<Period>("\"yearly\"").is_err());
    }
}
