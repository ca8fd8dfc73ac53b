// Post-settlement fee splitting

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{MarketError, Result};
use crate::market_resolve::MarketId;
use crate::params::{ParameterStore, CREATOR_FEE_BPS, PROTOCOL_FEE_BPS};
use crate::units::{format_tokens, BPS_SCALE};

/// What the engine knows about a finalized market when it asks for fees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub market: MarketId,
    pub creator: String,
    /// Sum of every payment the market accepted
    pub settled_volume: u128,
    /// Balance left after reserving every winning share; fees come out of this only
    pub surplus: u128,
}

/// One payout requested by the fee sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAllocation {
    pub recipient: String,
    pub amount: u128,
}

/// Fee policy invoked once per market after finalization
///
/// `allocate` only decides; bookkeeping happens in `record`, which the
/// engine calls after every allocation has been transferred.
pub trait FeeSink {
    /// Decide who is paid what; the engine transfers the allocations
    fn allocate(&self, settlement: &Settlement) -> Result<Vec<FeeAllocation>>;

    /// Commit allocations the engine has paid out
    fn record(&mut self, settlement: &Settlement, allocations: &[FeeAllocation]);
}

/// Splits a volume fee between the protocol treasury and the market creator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardDistributor {
    pub treasury: String,
    pub protocol_fee_bps: u32,
    pub creator_fee_bps: u32,
    /// Lifetime fees paid per recipient
    pub totals: BTreeMap<String, u128>,
    /// Markets already charged
    pub settled_markets: Vec<MarketId>,
}

impl RewardDistributor {
    pub fn new(treasury: &str, protocol_fee_bps: u32, creator_fee_bps: u32) -> Self {
        Self {
            treasury: treasury.to_string(),
            protocol_fee_bps,
            creator_fee_bps,
            totals: BTreeMap::new(),
            settled_markets: Vec::new(),
        }
    }

    /// Fee rates taken from the parameter store
    pub fn from_params(treasury: &str, params: &dyn ParameterStore) -> Self {
        let mut distributor = Self::new(treasury, 0, 0);
        distributor.refresh_rates(params);
        distributor
    }

    /// Re-read fee rates after a parameter change; each rate is capped at 100%
    pub fn refresh_rates(&mut self, params: &dyn ParameterStore) {
        let clamp = |v: u128| v.min(BPS_SCALE as u128) as u32;
        self.protocol_fee_bps = clamp(params.uint(PROTOCOL_FEE_BPS));
        self.creator_fee_bps = clamp(params.uint(CREATOR_FEE_BPS));
    }

    pub fn total_paid(&self, recipient: &str) -> u128 {
        self.totals.get(recipient).copied().unwrap_or(0)
    }

    fn bps_of(volume: u128, bps: u32) -> Result<u128> {
        volume
            .checked_mul(bps as u128)
            .map(|v| v / BPS_SCALE as u128)
            .ok_or(MarketError::MathOverflow)
    }
}

impl FeeSink for RewardDistributor {
    fn allocate(&self, settlement: &Settlement) -> Result<Vec<FeeAllocation>> {
        if self.settled_markets.contains(&settlement.market) {
            return Err(MarketError::FeesAlreadyCollected);
        }

        let mut protocol = Self::bps_of(settlement.settled_volume, self.protocol_fee_bps)?;
        let mut creator = Self::bps_of(settlement.settled_volume, self.creator_fee_bps)?;

        // Scale both shares down together when the surplus cannot cover them
        let requested = protocol + creator;
        if requested > settlement.surplus {
            let total_bps = (self.protocol_fee_bps + self.creator_fee_bps) as u128;
            protocol = settlement
                .surplus
                .checked_mul(self.protocol_fee_bps as u128)
                .map(|v| v / total_bps)
                .ok_or(MarketError::MathOverflow)?;
            creator = settlement.surplus - protocol;
        }

        let mut allocations = Vec::new();
        for (recipient, amount) in [
            (self.treasury.clone(), protocol),
            (settlement.creator.clone(), creator),
        ] {
            if amount == 0 {
                continue;
            }
            allocations.push(FeeAllocation { recipient, amount });
        }

        debug!(
            "Fees quoted for market {}: protocol {}, creator {} on volume {}",
            settlement.market,
            format_tokens(protocol),
            format_tokens(creator),
            format_tokens(settlement.settled_volume)
        );

        Ok(allocations)
    }

    fn record(&mut self, settlement: &Settlement, allocations: &[FeeAllocation]) {
        for allocation in allocations {
            let total = self.totals.entry(allocation.recipient.clone()).or_insert(0);
            *total = total.saturating_add(allocation.amount);
        }
        self.settled_markets.push(settlement.market);

        let paid: u128 = allocations.iter().map(|a| a.amount).sum();
        info!(
            "💰 Fees for market {} paid: {} across {} recipients",
            settlement.market,
            format_tokens(paid),
            allocations.len()
        );
    }
}
