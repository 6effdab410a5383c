use crate::record::{MetricRecord, MetricValue};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

impl TrendDirection {
    fn between(first: Decimal, last: Decimal) -> Self {
        match last.cmp(&first) {
            std::cmp::Ordering::Greater => TrendDirection::Increasing,
            std::cmp::Ordering::Less => TrendDirection::Decreasing,
            std::cmp::Ordering::Equal => TrendDirection::Flat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Flat => "flat",
        }
    }
}

/// First-versus-last comparison of one metric over periods sorted oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendResult {
    Change {
        first: Decimal,
        last: Decimal,
        percent_change: Decimal,
        direction: TrendDirection,
    },
    /// The first period is zero, so a percent change is undefined.
    NoBaseline {
        first: Decimal,
        last: Decimal,
        direction: TrendDirection,
    },
    /// Fewer than two periods carry a value for the metric.
    InsufficientData { periods: usize },
}

/// Compare `metric` in the first and last rows that carry a numeric value.
pub fn trend(rows: &[MetricRecord], metric: &str) -> TrendResult {
    let values: Vec<Decimal> = rows.iter().filter_map(|row| row.decimal(metric)).collect();

    let (first, last) = match values.as_slice() {
        [first, .., last] => (*first, *last),
        _ => return TrendResult::InsufficientData { periods: values.len() },
    };

    let direction = TrendDirection::between(first, last);
    if first.is_zero() {
        return TrendResult::NoBaseline { first, last, direction };
    }

    let percent_change = last
        .checked_sub(first)
        .and_then(|delta| delta.checked_div(first))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));
    match percent_change {
        Some(change) => TrendResult::Change {
            first,
            last,
            percent_change: change.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            direction,
        },
        None => TrendResult::NoBaseline { first, last, direction },
    }
}

impl TrendResult {
    /// Flatten into summary columns prefixed `trend_`.
    pub fn to_record(&self, metric: &str, periods: usize) -> MetricRecord {
        let record = MetricRecord::new()
            .with("trend_metric", metric)
            .with("trend_periods", periods as i64);

        match self {
            TrendResult::Change {
                first,
                last,
                percent_change,
                direction,
            } => record
                .with("trend_status", "change")
                .with("trend_first_value", *first)
                .with("trend_last_value", *last)
                .with("trend_percent_change", *percent_change)
                .with("trend_direction", direction.as_str()),
            TrendResult::NoBaseline { first, last, direction } => record
                .with("trend_status", "no_baseline")
                .with("trend_first_value", *first)
                .with("trend_last_value", *last)
                .with("trend_percent_change", MetricValue::Null)
                .with("trend_direction", direction.as_str()),
            TrendResult::InsufficientData { .. } => record
                .with("trend_status", "insufficient_data")
                .with("trend_percent_change", MetricValue::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[i64]) -> Vec<MetricRecord> {
        values
            .iter()
            .map(|v| MetricRecord::new().with("impressions", *v))
            .collect()
    }

    #[test]
    fn test_percent_change_first_to_last() {
        let result = trend(&series(&[200, 50, 250]), "impressions");
        assert_eq!(
            result,
            TrendResult::Change {
                first: Decimal::from(200),
                last: Decimal::from(250),
                percent_change: Decimal::from(25),
                direction: TrendDirection::Increasing,
            }
        );
    }

    #[test]
    fn test_zero_baseline_does_not_divide() {
        let result = trend(&series(&[0, 10, 40]), "impressions");
        assert_eq!(
            result,
            TrendResult::NoBaseline {
                first: Decimal::ZERO,
                last: Decimal::from(40),
                direction: TrendDirection::Increasing,
            }
        );
        let record = result.to_record("impressions", 3);
        assert_eq!(record.get("trend_percent_change"), Some(&MetricValue::Null));
        assert_eq!(record.get("trend_status"), Some(&MetricValue::from("no_baseline")));
    }

    #[test]
    fn test_equal_endpoints_are_flat() {
        let result = trend(&series(&[30, 90, 30]), "impressions");
        assert!(matches!(
            result,
            TrendResult::Change { direction: TrendDirection::Flat, percent_change, .. } if percent_change.is_zero()
        ));
    }

    #[test]
    fn test_decrease() {
        let result = trend(&series(&[400, 100]), "impressions");
        assert!(matches!(
            result,
            TrendResult::Change { direction: TrendDirection::Decreasing, percent_change, .. }
                if percent_change == Decimal::from(-75)
        ));
    }

    #[test]
    fn test_change_beyond_decimal_range_has_no_baseline() {
        let rows = vec![
            MetricRecord::new().with("spend", Decimal::ONE),
            MetricRecord::new().with("spend", Decimal::MAX),
        ];
        let result = trend(&rows, "spend");
        assert_eq!(
            result,
            TrendResult::NoBaseline {
                first: Decimal::ONE,
                last: Decimal::MAX,
                direction: TrendDirection::Increasing,
            }
        );

        let rows = vec![
            MetricRecord::new().with("spend", Decimal::new(1, 28)),
            MetricRecord::new().with("spend", Decimal::from(1_000_000)),
        ];
        assert!(matches!(trend(&rows, "spend"), TrendResult::NoBaseline { .. }));
    }

    #[test]
    fn test_single_period_is_insufficient() {
        assert_eq!(
            trend(&series(&[5]), "impressions"),
            TrendResult::InsufficientData { periods: 1 }
        );
        assert_eq!(trend(&[], "impressions"), TrendResult::InsufficientData { periods: 0 });
    }

    #[test]
    fn test_null_periods_are_skipped() {
        let mut rows = series(&[10, 20]);
        rows.insert(0, MetricRecord::new().with("impressions", MetricValue::Null));
        assert!(matches!(
            trend(&rows, "impressions"),
            TrendResult::Change { first, .. } if first == Decimal::from(10)
        ));
    }
}
