//! Integer token units and decimal conversion.
//!
//! On-chain amounts are unsigned integers. Conversion to and from decimal
//! strings is done on the digits, never through floating point.

use anyhow::{anyhow, Result};

/// Amount in on-chain base units.
pub type Amount = u128;

/// Decimals of native ETH (wei).
pub const ETH_DECIMALS: u32 = 18;

/// Parse a decimal string such as `"0.25"` into base units.
///
/// Fails on negative numbers, garbage, or more fractional digits than
/// `decimals` allows.
pub fn parse_units(value: &str, decimals: u32) -> Result<Amount> {
    let s = value.trim();
    if s.is_empty() {
        return Err(anyhow!("empty amount"));
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(anyhow!("invalid amount: {}", value));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!("invalid amount: {}", value));
    }
    if frac.len() > decimals as usize {
        return Err(anyhow!(
            "amount {} has more than {} decimal places",
            value,
            decimals
        ));
    }

    let scale = 10u128
        .checked_pow(decimals)
        .ok_or_else(|| anyhow!("unsupported decimals: {}", decimals))?;
    let whole_units: Amount = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<Amount>()
            .map_err(|e| anyhow!("invalid amount {}: {}", value, e))?
    };
    let frac_units: Amount = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded
            .parse::<Amount>()
            .map_err(|e| anyhow!("invalid amount {}: {}", value, e))?
    };

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| anyhow!("amount overflows: {}", value))
}

/// Format base units as a decimal string with trailing zeros removed.
pub fn format_units(amount: Amount, decimals: u32) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let scale = 10u128.pow(decimals);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}
