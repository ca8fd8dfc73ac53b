//! Token unit conversion
//!
//! Amounts are carried as `u128` base units with 18 decimals. Human-facing
//! input (env vars, replay scripts) and output go through `rust_decimal`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{MarketError, Result};

/// Base units per whole token
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Number of decimal places in a token amount
pub const DECIMALS: u32 = 18;

/// Full scale of the odds query (parts per 10,000)
pub const BPS_SCALE: u32 = 10_000;

/// Parse a decimal token amount ("0.1", "250") into base units
pub fn parse_tokens(input: &str) -> Result<u128> {
    let value = Decimal::from_str(input.trim())
        .map_err(|e| MarketError::InvalidTokenAmount(format!("{}: {}", input, e)))?;
    tokens_to_wei(value)
}

/// Convert a decimal token amount into base units, truncating beyond 18 places
pub fn tokens_to_wei(value: Decimal) -> Result<u128> {
    if value.is_sign_negative() {
        return Err(MarketError::InvalidTokenAmount(value.to_string()));
    }

    let whole = value.trunc();
    let fraction = value - whole;

    let whole_units = whole
        .to_u128()
        .and_then(|w| w.checked_mul(WAD))
        .ok_or(MarketError::MathOverflow)?;

    // fraction < 1, so the scaled value always fits in the decimal mantissa
    let fraction_units = (fraction * Decimal::from(WAD as u64))
        .trunc()
        .to_u128()
        .ok_or(MarketError::MathOverflow)?;

    whole_units
        .checked_add(fraction_units)
        .ok_or(MarketError::MathOverflow)
}

/// Render base units as a normalized decimal token string
pub fn format_tokens(wei: u128) -> String {
    let whole = wei / WAD;
    let fraction = (wei % WAD) as u64;

    let fraction = Decimal::from_i128_with_scale(fraction as i128, DECIMALS).normalize();
    if fraction.is_zero() {
        whole.to_string()
    } else {
        // "0.25" -> "25"
        let digits = fraction.to_string();
        let digits = digits.trim_start_matches("0.");
        format!("{}.{}", whole, digits)
    }
}

/// Render basis points as a percentage string ("62.50%")
pub fn format_bps(bps: u32) -> String {
    let pct = Decimal::new(bps as i64, 2);
    format!("{:.2}%", pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_tokens() {
        assert_eq!(parse_tokens("1").unwrap(), WAD);
        assert_eq!(parse_tokens("0.1").unwrap(), WAD / 10);
        assert_eq!(parse_tokens(" 250.5 ").unwrap(), 250 * WAD + WAD / 2);
        assert_eq!(parse_tokens("0.000000000000000001").unwrap(), 1);
        assert!(matches!(parse_tokens("-1"), Err(MarketError::InvalidTokenAmount(_))));
        assert!(matches!(parse_tokens("ten"), Err(MarketError::InvalidTokenAmount(_))));
    }

    #[test]
    fn test_large_amounts() {
        assert_eq!(tokens_to_wei(dec!(1000000)).unwrap(), 1_000_000 * WAD);
        assert_eq!(
            tokens_to_wei(dec!(12345678901.5)).unwrap(),
            12_345_678_901 * WAD + WAD / 2
        );
    }

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(0), "0");
        assert_eq!(format_tokens(3 * WAD), "3");
        assert_eq!(format_tokens(WAD / 4), "0.25");
        assert_eq!(format_tokens(10 * WAD + 1), "10.000000000000000001");
    }

    #[test]
    fn test_format_bps() {
        assert_eq!(format_bps(6250), "62.50%");
        assert_eq!(format_bps(5000), "50.00%");
    }
}
