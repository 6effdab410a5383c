//! Derived metric formulas.
//!
//! Every metric is `numerator / denominator`, NULL when the denominator is zero
//! or missing, and rounded to a fixed number of decimals. The same definition
//! renders a per-row SQL expression, an aggregate SQL expression over summed
//! counters, and can be evaluated in Rust on rows that were already fetched.

use crate::record::{MetricRecord, MetricValue};
use rust_decimal::{Decimal, RoundingStrategy};

/// One side of a ratio: a raw counter column, or the product of two columns
/// (used to weight a stored ratio by volume).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Counter(&'static str),
    Product(&'static str, &'static str),
}

impl Operand {
    fn row_sql(&self) -> String {
        match self {
            Operand::Counter(column) => column.to_string(),
            Operand::Product(left, right) => format!("({} * {})", left, right),
        }
    }

    fn sum_sql(&self) -> String {
        match self {
            Operand::Counter(column) => format!("SUM({})", column),
            Operand::Product(left, right) => format!("SUM({} * {})", left, right),
        }
    }

    /// Key a summed operand is stored under in a totals record.
    fn total_key(&self) -> String {
        match self {
            Operand::Counter(column) => column.to_string(),
            Operand::Product(left, right) => format!("{}*{}", left, right),
        }
    }

    /// A totals record carries products already summed under [`Operand::total_key`].
    fn evaluate(&self, record: &MetricRecord) -> Option<Decimal> {
        match self {
            Operand::Counter(column) => record.decimal(column),
            Operand::Product(left, right) => record.decimal(&self.total_key()).or_else(|| {
                record.decimal(left)?.checked_mul(record.decimal(right)?)
            }),
        }
    }
}

/// Whether a metric is reported as a plain ratio or multiplied by 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Ratio,
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    pub name: &'static str,
    pub numerator: Operand,
    pub denominator: Operand,
    pub scale: Scale,
    pub precision: u32,
}

impl MetricDefinition {
    pub const fn ratio(name: &'static str, numerator: Operand, denominator: Operand, precision: u32) -> Self {
        Self {
            name,
            numerator,
            denominator,
            scale: Scale::Ratio,
            precision,
        }
    }

    pub const fn percent(
        name: &'static str,
        numerator: Operand,
        denominator: Operand,
        precision: u32,
    ) -> Self {
        Self {
            name,
            numerator,
            denominator,
            scale: Scale::Percent,
            precision,
        }
    }

    /// Same formula under another output name.
    pub const fn named(self, name: &'static str) -> Self {
        Self { name, ..self }
    }

    /// Per-row expression, e.g. `ROUND(CAST(clicks AS NUMERIC) / NULLIF(impressions, 0) * 100, 2)`.
    pub fn row_sql(&self) -> String {
        self.render(&self.numerator.row_sql(), &self.denominator.row_sql())
    }

    /// Expression over summed counters; the volume-weighted form used by
    /// grouped, trend and summary queries.
    pub fn aggregate_sql(&self) -> String {
        self.render(&self.numerator.sum_sql(), &self.denominator.sum_sql())
    }

    pub fn row_column(&self) -> String {
        format!("{} AS {}", self.row_sql(), self.name)
    }

    pub fn aggregate_column(&self) -> String {
        format!("{} AS {}", self.aggregate_sql(), self.name)
    }

    fn render(&self, numerator: &str, denominator: &str) -> String {
        let scale = match self.scale {
            Scale::Ratio => "",
            Scale::Percent => " * 100",
        };
        format!(
            "ROUND(CAST({} AS NUMERIC) / NULLIF({}, 0){}, {})",
            numerator, denominator, scale, self.precision
        )
    }

    /// Evaluate against a fetched row or a record built by [`totals`]. `None`
    /// when either operand is missing or the denominator is zero.
    pub fn derive(&self, record: &MetricRecord) -> Option<Decimal> {
        let numerator = self.numerator.evaluate(record)?;
        let denominator = self.denominator.evaluate(record)?;
        let mut value = numerator.checked_div(denominator)?;
        if self.scale == Scale::Percent {
            value = value.checked_mul(Decimal::ONE_HUNDRED)?;
        }
        Some(value.round_dp_with_strategy(self.precision, RoundingStrategy::MidpointAwayFromZero))
    }
}

/// Apply each definition to one row of raw counters, or to summed counters
/// from [`totals`] for volume-weighted ratios.
pub fn derive(record: &MetricRecord, definitions: &[MetricDefinition]) -> Vec<(&'static str, MetricValue)> {
    definitions
        .iter()
        .map(|definition| (definition.name, definition.derive(record).into()))
        .collect()
}

/// Sum every operand the definitions need across `rows`, keyed so that
/// [`derive`] reads the sums. Rows missing a value contribute nothing.
pub fn totals(rows: &[MetricRecord], definitions: &[MetricDefinition]) -> MetricRecord {
    let mut totals = MetricRecord::new();
    for operand in definitions
        .iter()
        .flat_map(|definition| [definition.numerator, definition.denominator])
    {
        let key = operand.total_key();
        if totals.get(&key).is_some() {
            continue;
        }
        let sum = rows
            .iter()
            .filter_map(|row| operand.evaluate(row))
            .fold(Decimal::ZERO, |acc, value| acc + value);
        totals.insert(key, sum);
    }
    totals
}

/// Shared formulas. Stored rate columns (`completion_rate`, `click_through_rate`,
/// `open_rate`, `bounce_rate`) are ratios in `[0, 1]`.
pub mod catalog {
    use super::{MetricDefinition, Operand};

    pub const CTR_PERCENT: MetricDefinition = MetricDefinition::percent(
        "ctr_percent",
        Operand::Counter("clicks"),
        Operand::Counter("impressions"),
        2,
    );

    pub const CPC: MetricDefinition =
        MetricDefinition::ratio("cpc", Operand::Counter("spend"), Operand::Counter("clicks"), 2);

    pub const CONVERSION_RATE: MetricDefinition = MetricDefinition::percent(
        "conversion_rate",
        Operand::Counter("conversions"),
        Operand::Counter("impressions"),
        4,
    );

    pub const CLICK_CONVERSION_RATE: MetricDefinition = MetricDefinition::percent(
        "conversion_rate",
        Operand::Counter("conversions"),
        Operand::Counter("clicks"),
        2,
    );

    pub const COST_PER_CONVERSION: MetricDefinition = MetricDefinition::ratio(
        "cost_per_conversion",
        Operand::Counter("spend"),
        Operand::Counter("conversions"),
        2,
    );

    pub const CLICK_TO_CONVERSION_RATE: MetricDefinition = MetricDefinition::percent(
        "click_to_conversion_rate",
        Operand::Counter("conversions"),
        Operand::Counter("clicks"),
        2,
    );

    /// Stored completion ratio weighted by impressions.
    pub const COMPLETION_RATE: MetricDefinition = MetricDefinition::percent(
        "completion_rate_percent",
        Operand::Product("completion_rate", "impressions"),
        Operand::Counter("impressions"),
        2,
    );

    pub const STORED_CTR: MetricDefinition = MetricDefinition::percent(
        "ctr_percent",
        Operand::Product("click_through_rate", "impressions"),
        Operand::Counter("impressions"),
        2,
    );

    /// Conversions per impression scaled by click-through ratio.
    pub const ENGAGEMENT_SCORE: MetricDefinition = MetricDefinition::ratio(
        "engagement_score",
        Operand::Product("conversions", "click_through_rate"),
        Operand::Counter("impressions"),
        6,
    );

    pub const FREQUENCY: MetricDefinition = MetricDefinition::ratio(
        "calculated_frequency",
        Operand::Counter("impressions"),
        Operand::Counter("reach"),
        2,
    );

    pub const REACH_RATE: MetricDefinition = MetricDefinition::percent(
        "reach_rate",
        Operand::Counter("reach"),
        Operand::Counter("impressions"),
        2,
    );

    pub const OPEN_RATE: MetricDefinition = MetricDefinition::percent(
        "open_rate_percent",
        Operand::Product("open_rate", "emails_sent"),
        Operand::Counter("emails_sent"),
        2,
    );

    pub const EMAIL_CTR: MetricDefinition = MetricDefinition::percent(
        "click_rate_percent",
        Operand::Product("click_through_rate", "emails_sent"),
        Operand::Counter("emails_sent"),
        2,
    );

    pub const EMAIL_CONVERSION_RATE: MetricDefinition = MetricDefinition::percent(
        "conversion_rate",
        Operand::Counter("conversions"),
        Operand::Counter("emails_sent"),
        2,
    );

    pub const UNSUBSCRIBE_RATE: MetricDefinition = MetricDefinition::percent(
        "unsubscribe_rate",
        Operand::Counter("unsubscribes"),
        Operand::Counter("emails_sent"),
        2,
    );

    pub const SESSION_CONVERSION_RATE: MetricDefinition = MetricDefinition::percent(
        "conversion_rate",
        Operand::Counter("conversions"),
        Operand::Counter("sessions"),
        2,
    );

    pub const BOUNCE_RATE: MetricDefinition = MetricDefinition::percent(
        "bounce_rate_percent",
        Operand::Product("bounce_rate", "sessions"),
        Operand::Counter("sessions"),
        2,
    );

    pub const PROFIT_MARGIN: MetricDefinition = MetricDefinition::percent(
        "profit_margin_pct",
        Operand::Counter("\"Net Profit\""),
        Operand::Counter("\"Gross Profit\""),
        2,
    );
}

#[cfg(test)]
mod tests {
    use super::catalog::*;
    use super::*;

    #[test]
    fn test_zero_denominator_is_null() {
        let row = MetricRecord::new().with("clicks", 0i64).with("spend", Decimal::new(1250, 2));
        assert_eq!(CPC.derive(&row), None);

        let row = MetricRecord::new().with("spend", Decimal::new(1250, 2));
        assert_eq!(CPC.derive(&row), None);
    }

    #[test]
    fn test_percent_scaled_once_and_rounded() {
        let row = MetricRecord::new().with("clicks", 1i64).with("impressions", 3i64);
        assert_eq!(CTR_PERCENT.derive(&row), Some(Decimal::new(3333, 2)));

        let row = MetricRecord::new().with("conversions", 1i64).with("impressions", 8i64);
        // 12.5 at 4 dp
        assert_eq!(CONVERSION_RATE.derive(&row), Some(Decimal::new(125000, 4)));
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        let row = MetricRecord::new()
            .with("spend", Decimal::new(1, 0))
            .with("clicks", 8i64);
        // 0.125 -> 0.13
        assert_eq!(CPC.derive(&row), Some(Decimal::new(13, 2)));
    }

    #[test]
    fn test_engagement_score_uses_product() {
        let row = MetricRecord::new()
            .with("conversions", 5i64)
            .with("click_through_rate", Decimal::new(2, 2))
            .with("impressions", 1000i64);
        // 5 * 0.02 / 1000 = 0.0001
        assert_eq!(ENGAGEMENT_SCORE.derive(&row), Some(Decimal::new(100, 6)));
    }

    #[test]
    fn test_sql_guards_denominator() {
        assert_eq!(
            CPC.row_sql(),
            "ROUND(CAST(spend AS NUMERIC) / NULLIF(clicks, 0), 2)"
        );
        assert_eq!(
            COMPLETION_RATE.aggregate_column(),
            "ROUND(CAST(SUM(completion_rate * impressions) AS NUMERIC) / NULLIF(SUM(impressions), 0) * 100, 2) AS completion_rate_percent"
        );
    }

    #[test]
    fn test_totals_feed_volume_weighted_ratio() {
        let rows = vec![
            MetricRecord::new().with("impressions", 10i64).with("conversions", 10i64),
            MetricRecord::new().with("impressions", 1000i64).with("conversions", 0i64),
        ];
        let sums = totals(&rows, &[CONVERSION_RATE]);
        assert_eq!(sums.decimal("impressions"), Some(Decimal::from(1010)));
        // 10 / 1010 * 100 = 0.990099.. -> 0.9901
        assert_eq!(
            CONVERSION_RATE.derive(&sums),
            Some(Decimal::new(9901, 4))
        );
    }

    #[test]
    fn test_weighted_stored_rate_from_totals() {
        let rows = vec![
            MetricRecord::new()
                .with("completion_rate", Decimal::new(9, 1))
                .with("impressions", 100i64),
            MetricRecord::new()
                .with("completion_rate", Decimal::new(1, 1))
                .with("impressions", 300i64),
        ];
        let sums = totals(&rows, &[COMPLETION_RATE]);
        // (0.9 * 100 + 0.1 * 300) / 400 * 100 = 30
        let derived = derive(&sums, &[COMPLETION_RATE]);
        assert_eq!(
            derived,
            vec![("completion_rate_percent", MetricValue::Decimal(Decimal::from(30)))]
        );
    }

    #[test]
    fn test_derive_names_outputs() {
        let row = MetricRecord::new().with("clicks", 0i64).with("impressions", 0i64);
        let derived = derive(&row, &[CTR_PERCENT, CTR_PERCENT.named("ctr")]);
        assert_eq!(derived[0], ("ctr_percent", MetricValue::Null));
        assert_eq!(derived[1].0, "ctr");
    }
}
