use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fixed::{div_wad, exp_neg, mul_wad, mul_wad_up, softplus_neg, EXP_CLAMP, SOFTPLUS_ERROR};
use super::Outcome;
use crate::error::{MarketError, Result};
use crate::units::{BPS_SCALE, WAD};

// ============================================================================
// LMSR CONSTANTS
// ============================================================================

/// Logarithmic Market Scoring Rule bonding curve for binary markets
///
/// Cost function: C(q1, q2) = b * ln(e^(q1/b) + e^(q2/b))
///
/// Evaluated in the overflow-free form:
///   C(q) = max(q1, q2) + b * ln(1 + e^(-|q1 - q2| / b))
///
/// Price calculation:
/// - Price(i) = e^(qi/b) / (e^(q1/b) + e^(q2/b))
/// - Prices always sum to 1.0
///
/// A buyer of outcome i paying A receives the largest Δ with
/// C(qi + Δ, qj) - C(qi, qj) <= A, found by bounded binary search.

/// Smallest accepted liquidity parameter (0.001 tokens)
pub const MIN_LIQUIDITY_PARAM: u128 = WAD / 1_000;

/// Largest accepted liquidity parameter (1,000,000 tokens)
pub const MAX_LIQUIDITY_PARAM: u128 = 1_000_000 * WAD;

/// Binary search iteration cap
pub const MAX_SEARCH_ITERATIONS: u32 = 256;

/// Cap on upper-bound doublings before the search starts
pub const MAX_BOUND_DOUBLINGS: u32 = 128;

/// Base units added to every trade cost so rounding never favours the buyer
pub const QUOTE_MARGIN: u128 = 1;

/// Pure LMSR pricing over two outcome quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmsrCurve {
    /// Liquidity parameter `b` in base units
    pub liquidity: u128,
}

/// Result of pricing a payment against the curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Shares minted for the payment
    pub shares: u128,
    /// Curve cost of those shares (always <= the payment)
    pub cost: u128,
    /// Marginal price of the bought outcome after the trade, in basis points
    pub price_after_bps: u32,
}

impl LmsrCurve {
    /// Build a curve, rejecting `b` outside `[min, max]`
    pub fn new(liquidity: u128, min: u128, max: u128) -> Result<Self> {
        if liquidity < min || liquidity > max || liquidity == 0 {
            return Err(MarketError::InvalidLiquidityParam {
                value: liquidity,
                min,
                max,
            });
        }
        Ok(Self { liquidity })
    }

    /// Build a curve with the default liquidity bounds
    pub fn with_default_bounds(liquidity: u128) -> Result<Self> {
        Self::new(liquidity, MIN_LIQUIDITY_PARAM, MAX_LIQUIDITY_PARAM)
    }

    /// |q1 - q2| / b in WAD, clamped where e^(-x) is already zero
    fn exponent(&self, spread: u128) -> Result<u128> {
        if spread / self.liquidity >= EXP_CLAMP / WAD {
            return Ok(EXP_CLAMP);
        }
        div_wad(spread, self.liquidity)
    }

    /// Lower and upper bounds on C(q)
    pub fn cost_bounds(&self, quantities: [u128; 2]) -> Result<(u128, u128)> {
        let [q1, q2] = quantities;
        let high = q1.max(q2);
        let spread = high - q1.min(q2);

        let tail = softplus_neg(self.exponent(spread)?);
        let lower = mul_wad(self.liquidity, tail.saturating_sub(SOFTPLUS_ERROR))?;
        let upper = mul_wad_up(self.liquidity, tail + SOFTPLUS_ERROR)?;

        Ok((
            high.checked_add(lower).ok_or(MarketError::MathOverflow)?,
            high.checked_add(upper).ok_or(MarketError::MathOverflow)?,
        ))
    }

    /// Amount the market must hold before the first trade: C(0, 0) = b * ln 2, rounded up
    pub fn initial_subsidy(&self) -> Result<u128> {
        Ok(self.cost_bounds([0, 0])?.1)
    }

    /// Cost charged for `shares` of `outcome`, given the lower bound of C before the trade
    fn cost_from(&self, quantities: [u128; 2], outcome: Outcome, shares: u128, before: u128) -> Result<u128> {
        let mut after = quantities;
        let slot = &mut after[outcome.index()];
        *slot = slot.checked_add(shares).ok_or(MarketError::MathOverflow)?;

        let (_, upper) = self.cost_bounds(after)?;
        upper
            .saturating_sub(before)
            .checked_add(QUOTE_MARGIN)
            .ok_or(MarketError::MathOverflow)
    }

    /// Cost of buying exactly `shares` of `outcome`, rounded in the market's favour
    pub fn cost_to_buy(&self, quantities: [u128; 2], outcome: Outcome, shares: u128) -> Result<u128> {
        if shares == 0 {
            return Ok(0);
        }
        let (before, _) = self.cost_bounds(quantities)?;
        self.cost_from(quantities, outcome, shares, before)
    }

    /// Shares of `outcome` bought by paying `amount`
    ///
    /// # Returns
    /// The largest share count whose cost fits in `amount`, or
    /// `ShareAmountZero` when not even one base unit is affordable.
    pub fn quote(&self, quantities: [u128; 2], outcome: Outcome, amount: u128) -> Result<Quote> {
        if amount == 0 {
            return Err(MarketError::ShareAmountZero);
        }

        let (before, _) = self.cost_bounds(quantities)?;
        let fits = |shares: u128| -> Result<bool> {
            Ok(self.cost_from(quantities, outcome, shares, before)? <= amount)
        };

        // Grow an upper bound that the payment cannot afford
        let mut hi = amount;
        let mut doublings = 0;
        while fits(hi)? {
            if doublings >= MAX_BOUND_DOUBLINGS {
                return Err(MarketError::MathOverflow);
            }
            hi = hi.checked_mul(2).ok_or(MarketError::MathOverflow)?;
            doublings += 1;
        }

        // Invariant: lo is affordable (0 trivially), hi is not
        let mut lo = 0u128;
        let mut iterations = 0;
        while hi - lo > 1 && iterations < MAX_SEARCH_ITERATIONS {
            let mid = lo + (hi - lo) / 2;
            if fits(mid)? {
                lo = mid;
            } else {
                hi = mid;
            }
            iterations += 1;
        }

        if lo == 0 {
            return Err(MarketError::ShareAmountZero);
        }

        let cost = self.cost_from(quantities, outcome, lo, before)?;
        let mut after = quantities;
        after[outcome.index()] += lo;
        let price_after_bps = self.odds_bps(after)?[outcome.index()];

        debug!(
            "LMSR quote: outcome {} amount {} -> {} shares in {} steps (price {} bps)",
            outcome, amount, lo, iterations, price_after_bps
        );

        Ok(Quote {
            shares: lo,
            cost,
            price_after_bps,
        })
    }

    /// Marginal prices in WAD; the two always sum to exactly 1e18
    pub fn prices(&self, quantities: [u128; 2]) -> Result<[u128; 2]> {
        let [q1, q2] = quantities;
        let spread = q1.max(q2) - q1.min(q2);
        let e = exp_neg(self.exponent(spread)?);

        // Leading outcome: 1 / (1 + e^(-spread/b))
        let leading = WAD * WAD / (WAD + e);
        let trailing = WAD - leading;

        if q1 >= q2 {
            Ok([leading, trailing])
        } else {
            Ok([trailing, leading])
        }
    }

    /// Marginal prices in parts per 10,000, summing to exactly 10,000
    pub fn odds_bps(&self, quantities: [u128; 2]) -> Result<[u32; 2]> {
        let [p1, _] = self.prices(quantities)?;
        let scale = BPS_SCALE as u128;
        let first = ((p1 * scale + WAD / 2) / WAD) as u32;
        Ok([first, BPS_SCALE - first])
    }
}

/// Shares bought by paying `amount` for `outcome` at state `(q1, q2)` with liquidity `b`
pub fn quote(q1: u128, q2: u128, b: u128, outcome: Outcome, amount: u128) -> Result<u128> {
    let curve = LmsrCurve::with_default_bounds(b)?;
    Ok(curve.quote([q1, q2], outcome, amount)?.shares)
}
