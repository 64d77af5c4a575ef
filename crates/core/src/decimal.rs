use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Fractional digits carried through every intermediate amount.
pub const INTERNAL_SCALE: u32 = 4;
/// Fractional digits of exported settlement figures.
pub const EXPORT_SCALE: u32 = 2;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("cannot parse `{value}` as a decimal amount")]
pub struct DecimalParseError {
    pub value: String,
}

/// Rounds to the internal 4-digit scale (banker's rounding).
pub fn round_internal(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(INTERNAL_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Rounds to the 2-digit export scale, half away from zero.
pub fn round_export(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(EXPORT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Parses plain (`1234.56`) and European (`1.234,56`) decimal text.
///
/// Blank input is zero. A comma marks the fractional part; when one is
/// present every dot is taken as a thousands separator.
pub fn parse_decimal(raw: &str) -> Result<Decimal, DecimalParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };

    Decimal::from_str(&normalized)
        .map_err(|_| DecimalParseError { value: raw.to_string() })
}
