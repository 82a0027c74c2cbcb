//! Amount codec (C1)
//!
//! Parses a decimal euro string into an integer cent value. Rejects
//! anything with more than two fractional digits rather than silently
//! rounding it away — a bulk transfer amount is either exact or invalid.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid amount: {0}")]
pub struct AmountError(pub String);

/// Parses `s` as a non-negative-or-negative decimal and returns its value
/// in integer cents, using half-up rounding to two fractional digits.
/// Fails if `s` does not parse as a decimal, or if it carries more than
/// two fractional digits (i.e. rounding would change the value).
pub fn to_cents(s: &str) -> Result<i64, AmountError> {
    let amount = Decimal::from_str(s).map_err(|_| AmountError(format!("invalid amount: {s}")))?;

    let quantized = amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    if amount != quantized {
        return Err(AmountError(format!(
            "more than 2 decimal places is not allowed: {s}"
        )));
    }

    // `quantized`'s scale is at most 2 but may be less (e.g. "10" stays
    // scale 0) — scale the mantissa up to exactly 2 fractional digits
    // ourselves rather than multiplying two `Decimal`s and re-parsing
    // their display form, which would trip over trailing-zero scale
    // (`10.00 * 100` prints as `"1000.00"`, not `"1000"`).
    let scale_up = 10i128.pow(2 - quantized.scale());
    let cents = quantized
        .mantissa()
        .checked_mul(scale_up)
        .ok_or_else(|| AmountError(format!("amount out of range: {s}")))?;
    i64::try_from(cents).map_err(|_| AmountError(format!("amount out of range: {s}")))
}

/// Formats an integer cent value back into a euro decimal string, for
/// round-trip testing and for rendering amounts in logs/responses.
pub fn format_euros(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
