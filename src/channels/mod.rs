//! One module per advertising channel. Each exposes its tool definitions;
//! the paid-media channels share their report shapes through [`paid_media`].

pub mod bing;
pub mod connected_tv;
pub mod email;
pub mod linear_tv;
pub mod linkedin;
pub mod paid_media;
pub mod sales;
pub mod seo;
pub mod tiktok;

use crate::error::{AppError, AppResult};
use crate::query::parse_date;
use crate::tools::ToolSpec;
use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Every channel's tools, in channel order.
pub fn all_tools() -> Vec<ToolSpec> {
    [
        connected_tv::tools(),
        linkedin::tools(),
        linear_tv::tools(),
        bing::tools(),
        email::tools(),
        tiktok::tools(),
        seo::tools(),
        sales::tools(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Parse an optional `date_from` / `date_to` pair.
pub(crate) fn date_range(
    date_from: Option<&str>,
    date_to: Option<&str>,
) -> AppResult<(Option<NaiveDate>, Option<NaiveDate>)> {
    Ok((parse_date("date_from", date_from)?, parse_date("date_to", date_to)?))
}

pub(crate) fn decimal_arg(field: &str, value: Option<f64>) -> AppResult<Option<Decimal>> {
    value
        .map(|raw| {
            Decimal::from_f64(raw).ok_or_else(|| {
                AppError::InvalidArgument(format!("{} must be a finite number, got {}", field, raw))
            })
        })
        .transpose()
}

/// A threshold given in percent, converted for comparison against a ratio column.
pub(crate) fn percent_arg(field: &str, value: Option<f64>) -> AppResult<Option<Decimal>> {
    Ok(decimal_arg(field, value)?.map(|percent| percent / Decimal::ONE_HUNDRED))
}
