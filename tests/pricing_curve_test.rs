/// Pricing curve properties over a spread of market states

use binary_prediction_market::market_resolve::lmsr::{self, LmsrCurve};
use binary_prediction_market::{MarketError, Outcome, WAD};

const STATES: [[u128; 2]; 7] = [
    [0, 0],
    [10 * WAD, 0],
    [0, 37 * WAD],
    [250 * WAD, 240 * WAD],
    [1_000 * WAD, 3 * WAD],
    [5 * WAD / 2, 7 * WAD / 3],
    [100_000 * WAD, 0],
];

#[test]
fn test_prices_sum_to_one_everywhere() {
    for b in [WAD / 100, WAD, 100 * WAD, 10_000 * WAD] {
        let curve = LmsrCurve::with_default_bounds(b).unwrap();
        for q in STATES {
            let prices = curve.prices(q).unwrap();
            assert_eq!(prices[0] + prices[1], WAD);

            let odds = curve.odds_bps(q).unwrap();
            assert_eq!(odds[0] + odds[1], 10_000);
            if q[0] > q[1] {
                assert!(odds[0] >= 5_000);
            }
        }
    }
}

#[test]
fn test_larger_liquidity_means_smaller_impact() {
    let amount = 10 * WAD;
    let mut last_price = u32::MAX;
    let mut last_shares = 0;

    for b in [5 * WAD, 20 * WAD, 100 * WAD, 1_000 * WAD, 50_000 * WAD] {
        let curve = LmsrCurve::with_default_bounds(b).unwrap();
        let quote = curve.quote([0, 0], Outcome::One, amount).unwrap();

        assert!(quote.price_after_bps <= last_price, "price rose at b = {}", b);
        assert!(quote.shares >= last_shares, "shares fell at b = {}", b);
        assert!(quote.cost <= amount);
        last_price = quote.price_after_bps;
        last_shares = quote.shares;
    }
    // Deep book: close to the even-odds limit of 2 shares per token
    assert!(last_shares > 19_990 * WAD / 1_000);
}

#[test]
fn test_quote_is_deterministic_and_symmetric() {
    let curve = LmsrCurve::with_default_bounds(100 * WAD).unwrap();
    let a = curve.quote([30 * WAD, 10 * WAD], Outcome::Two, 7 * WAD).unwrap();
    let b = curve.quote([30 * WAD, 10 * WAD], Outcome::Two, 7 * WAD).unwrap();
    let mirrored = curve.quote([10 * WAD, 30 * WAD], Outcome::One, 7 * WAD).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.shares, mirrored.shares);
    assert_eq!(
        lmsr::quote(30 * WAD, 10 * WAD, 100 * WAD, Outcome::Two, 7 * WAD).unwrap(),
        a.shares
    );
}

#[test]
fn test_quoted_shares_never_cost_more_than_paid() {
    for b in [WAD, 100 * WAD, 10_000 * WAD] {
        let curve = LmsrCurve::with_default_bounds(b).unwrap();
        for q in STATES {
            for outcome in [Outcome::One, Outcome::Two] {
                let amount = 3 * WAD;
                let quote = curve.quote(q, outcome, amount).unwrap();
                assert!(quote.shares > 0);
                assert!(curve.cost_to_buy(q, outcome, quote.shares).unwrap() <= amount);
            }
        }
    }
}

#[test]
fn test_buying_the_leader_in_a_lopsided_market() {
    // At a price of ~1, a token buys at most one share
    let curve = LmsrCurve::with_default_bounds(WAD).unwrap();
    let quote = curve.quote([100 * WAD, 0], Outcome::One, 5 * WAD).unwrap();
    assert!(quote.shares <= 5 * WAD);
    assert!(quote.shares > 5 * WAD - WAD / 1_000);
    assert_eq!(quote.price_after_bps, 10_000);
}

#[test]
fn test_invalid_inputs() {
    assert!(matches!(
        LmsrCurve::with_default_bounds(0),
        Err(MarketError::InvalidLiquidityParam { .. })
    ));
    assert!(matches!(
        LmsrCurve::with_default_bounds(2_000_000 * WAD),
        Err(MarketError::InvalidLiquidityParam { .. })
    ));

    let curve = LmsrCurve::with_default_bounds(WAD).unwrap();
    assert_eq!(
        curve.quote([0, 0], Outcome::One, 0).unwrap_err(),
        MarketError::ShareAmountZero
    );
}
