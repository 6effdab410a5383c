use crate::metrics::{self, MetricDefinition};
use crate::record::{MetricRecord, MetricValue};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Count, per-counter `total_*` / `avg_*`, and each ratio re-derived from the
/// summed counters. Ratios are volume-weighted: `sum(num) / sum(den)`, never
/// the mean of per-row ratios.
pub fn summarize(rows: &[MetricRecord], counters: &[&str], ratios: &[MetricDefinition]) -> MetricRecord {
    let mut summary = MetricRecord::new().with("record_count", rows.len() as i64);

    for counter in counters {
        let values: Vec<&MetricValue> = rows.iter().filter_map(|row| row.get(counter)).collect();
        let all_int = values.iter().all(|value| matches!(value, MetricValue::Int(_) | MetricValue::Null));
        let total = values
            .iter()
            .filter_map(|value| value.as_decimal())
            .fold(Decimal::ZERO, |acc, value| acc + value);

        let total_value = match (all_int, total.to_i64()) {
            (true, Some(total)) => MetricValue::Int(total),
            _ => MetricValue::Decimal(total),
        };
        summary.insert(format!("total_{}", counter), total_value);

        let average = if rows.is_empty() {
            MetricValue::Null
        } else {
            MetricValue::Decimal(
                (total / Decimal::from(rows.len() as i64))
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            )
        };
        summary.insert(format!("avg_{}", counter), average);
    }

    let totals = metrics::totals(rows, ratios);
    for (name, value) in metrics::derive(&totals, ratios) {
        summary.insert(name, value);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::catalog::{CONVERSION_RATE, CPC};

    #[test]
    fn test_ratios_are_volume_weighted() {
        let rows = vec![
            MetricRecord::new().with("impressions", 10i64).with("conversions", 10i64),
            MetricRecord::new().with("impressions", 1000i64).with("conversions", 0i64),
        ];

        // Mean of per-row rates would be 50%.
        let per_row_mean = rows
            .iter()
            .filter_map(|row| CONVERSION_RATE.derive(row))
            .sum::<Decimal>()
            / Decimal::from(2);
        assert_eq!(per_row_mean, Decimal::from(50));

        let summary = summarize(&rows, &["impressions", "conversions"], &[CONVERSION_RATE]);
        assert_eq!(summary.get("record_count"), Some(&MetricValue::Int(2)));
        assert_eq!(summary.get("total_impressions"), Some(&MetricValue::Int(1010)));
        assert_eq!(summary.get("total_conversions"), Some(&MetricValue::Int(10)));
        assert_eq!(summary.decimal("avg_impressions"), Some(Decimal::from(505)));
        assert_eq!(summary.decimal("conversion_rate"), Some(Decimal::new(9901, 4)));
    }

    #[test]
    fn test_zero_totals_give_null_ratio() {
        let rows = vec![MetricRecord::new()
            .with("spend", Decimal::new(500, 2))
            .with("clicks", 0i64)];
        let summary = summarize(&rows, &["spend"], &[CPC]);
        assert_eq!(summary.get("cpc"), Some(&MetricValue::Null));
        assert_eq!(summary.decimal("total_spend"), Some(Decimal::new(500, 2)));
    }

    #[test]
    fn test_empty_rows_summarize_without_fault() {
        let summary = summarize(&[], &["impressions"], &[CONVERSION_RATE]);
        assert_eq!(summary.get("record_count"), Some(&MetricValue::Int(0)));
        assert_eq!(summary.get("avg_impressions"), Some(&MetricValue::Null));
        assert_eq!(summary.get("conversion_rate"), Some(&MetricValue::Null));
    }
}
