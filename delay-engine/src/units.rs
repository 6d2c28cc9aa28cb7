//! Decimal strings to and from token base units.

use delay_types::Amount;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("malformed decimal {0:?}")]
    Malformed(String),
    #[error("amount {0:?} does not fit in 128 bits")]
    Overflow(String),
}

fn pow10(exp: u32) -> Option<Amount> {
    10u128.checked_pow(exp)
}

/// Parses `"12.5"` into base units of a token with `decimals` decimals.
///
/// Excess fractional digits are rounded half-up. Empty input is zero.
/// Signs, exponents and separators are rejected.
pub fn parse_units(input: &str, decimals: u8) -> Result<Amount, UnitsError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    let malformed = || UnitsError::Malformed(raw.to_string());
    let overflow = || UnitsError::Overflow(raw.to_string());

    let (whole, fraction) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(malformed());
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let decimals = usize::from(decimals);
    let scale = pow10(decimals as u32).ok_or_else(overflow)?;
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<Amount>().map_err(|_| overflow())?
    };

    let (kept, dropped) = fraction.split_at(fraction.len().min(decimals));
    let mut fraction_units = if kept.is_empty() {
        0
    } else {
        let padded = format!("{kept:0<decimals$}");
        padded.parse::<Amount>().map_err(|_| overflow())?
    };
    if dropped.bytes().next().is_some_and(|b| b >= b'5') {
        fraction_units += 1;
    }

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction_units))
        .ok_or_else(overflow)
}

/// Renders base units as a plain decimal with trailing zeros removed.
pub fn format_units(value: Amount, decimals: u8) -> String {
    let Some(scale) = pow10(u32::from(decimals)) else {
        return value.to_string();
    };
    let whole = value / scale;
    let fraction = value % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0>width$}", width = usize::from(decimals));
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Like [`format_units`], rounded half-up to at most `precision` fractional digits.
pub fn format_amount(value: Amount, decimals: u8, precision: u8) -> String {
    if precision >= decimals {
        return format_units(value, decimals);
    }
    let Some(step) = pow10(u32::from(decimals - precision)) else {
        return format_units(value, decimals);
    };
    let rounded = match (value / step).checked_mul(step) {
        Some(floor) if value % step >= step / 2 => floor.checked_add(step).unwrap_or(floor),
        Some(floor) => floor,
        None => value,
    };
    format_units(rounded, decimals)
}
