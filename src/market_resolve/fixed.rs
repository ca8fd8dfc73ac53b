use crate::error::{MarketError, Result};
use crate::units::WAD;

// ============================================================================
// FIXED-POINT CONSTANTS
// ============================================================================

/// ln(2) scaled by 1e18, rounded down
pub const LN2_WAD: u128 = 693_147_180_559_945_309;

/// ln(2) scaled by 1e18, rounded up
pub const LN2_WAD_UP: u128 = 693_147_180_559_945_310;

/// Exponent clamp: e^-42 is below one base unit, so larger inputs evaluate to zero
pub const EXP_CLAMP: u128 = 42 * WAD;

/// Bound on |computed - exact| for `softplus_neg`, in base units of the WAD result
pub const SOFTPLUS_ERROR: u128 = 256;

const MAX_SERIES_TERMS: u128 = 64;

// ============================================================================
// CHECKED WAD ARITHMETIC
// ============================================================================

/// x * y / 1e18, rounded down
///
/// The factor split keeps intermediates inside u128 as long as the smaller
/// operand stays below ~340 tokens, which holds for every curve term.
pub fn mul_wad(x: u128, y: u128) -> Result<u128> {
    let (big, small) = if x >= y { (x, y) } else { (y, x) };
    let high = (big / WAD)
        .checked_mul(small)
        .ok_or(MarketError::MathOverflow)?;
    let low = (big % WAD)
        .checked_mul(small)
        .ok_or(MarketError::MathOverflow)?;
    high.checked_add(low / WAD).ok_or(MarketError::MathOverflow)
}

/// x * y / 1e18, rounded up
pub fn mul_wad_up(x: u128, y: u128) -> Result<u128> {
    let (big, small) = if x >= y { (x, y) } else { (y, x) };
    let high = (big / WAD)
        .checked_mul(small)
        .ok_or(MarketError::MathOverflow)?;
    let low = (big % WAD)
        .checked_mul(small)
        .ok_or(MarketError::MathOverflow)?;
    let carry = if low % WAD == 0 { 0 } else { 1 };
    high.checked_add(low / WAD + carry)
        .ok_or(MarketError::MathOverflow)
}

/// x * 1e18 / y, rounded down
///
/// Long division in two 1e9 steps so the remainder never overflows for
/// divisors up to ~3.4e29.
pub fn div_wad(x: u128, y: u128) -> Result<u128> {
    const HALF: u128 = 1_000_000_000;

    if y == 0 {
        return Err(MarketError::MathOverflow);
    }
    if y >= u128::MAX / HALF {
        return Err(MarketError::MathOverflow);
    }

    let whole = (x / y).checked_mul(WAD).ok_or(MarketError::MathOverflow)?;
    let r = x % y;

    let r1 = r * HALF;
    let d1 = r1 / y;
    let r2 = (r1 % y) * HALF;
    let d2 = r2 / y;

    whole
        .checked_add(d1 * HALF + d2)
        .ok_or(MarketError::MathOverflow)
}

// ============================================================================
// TRANSCENDENTALS
// ============================================================================

/// e^(-x) for x >= 0 in WAD
///
/// Range reduction x = k*ln2 + r with r in [0, ln2), Taylor series for e^r,
/// then 1/e^r shifted right by k. Inputs at or past `EXP_CLAMP` return 0.
pub fn exp_neg(x: u128) -> u128 {
    if x >= EXP_CLAMP {
        return 0;
    }

    let k = x / LN2_WAD;
    let r = x - k * LN2_WAD;

    // e^r, r < 0.7 so every term shrinks
    let mut term = WAD;
    let mut sum = WAD;
    let mut n = 1;
    while n <= MAX_SERIES_TERMS {
        term = term * r / WAD / n;
        if term == 0 {
            break;
        }
        sum += term;
        n += 1;
    }

    // sum is in [1e18, 2e18), so 1e36 / sum stays in (0.5e18, 1e18]
    let inverse = WAD * WAD / sum;

    // k <= 60 because x < 42e18
    inverse >> k
}

/// ln(1 + t) for t in [0, 1e18], via ln(y) = 2 * atanh((y - 1) / (y + 1))
pub fn ln_one_plus(t: u128) -> u128 {
    let t = t.min(WAD);
    if t == 0 {
        return 0;
    }

    let y = WAD + t;
    // s in (0, 1/3]
    let s = (y - WAD) * WAD / (y + WAD);
    let s2 = s * s / WAD;

    let mut power = s;
    let mut sum = s;
    let mut n = 1;
    while n <= MAX_SERIES_TERMS {
        power = power * s2 / WAD;
        if power == 0 {
            break;
        }
        sum += power / (2 * n + 1);
        n += 1;
    }

    2 * sum
}

/// ln(1 + e^(-x)) for x >= 0 in WAD; within `SOFTPLUS_ERROR` of the exact value
pub fn softplus_neg(x: u128) -> u128 {
    ln_one_plus(exp_neg(x))
}
