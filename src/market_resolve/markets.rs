use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use super::lifecycle::MarketState;
use super::lmsr::LmsrCurve;
use super::resolution::Resolution;
use super::{Context, MarketId, Outcome};
use crate::access::Role;
use crate::error::{MarketError, Result};
use crate::events::MarketEvent;
use crate::params::{
    APPROVAL_QUORUM, MAXIMUM_BET, MAX_LIQUIDITY, MINIMUM_BET, MIN_CREATOR_BOND, MIN_LIQUIDITY,
};
use crate::rewards::Settlement;
use crate::units::{format_tokens, BPS_SCALE};

// ============================================================================
// MARKET RECORD
// ============================================================================

/// Binary prediction market priced by an LMSR curve
///
/// Balance accounting:
/// - `bond` is the creator's refundable stake, held until refund
/// - `balance` is the settlement balance: initial subsidy + every payment,
///   minus claims, fees and the creator's surplus refund
///
/// The subsidy covers C(0, 0), so `balance` always covers the larger of the
/// two share quantities and therefore every winning share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Index in the market book
    pub id: MarketId,

    /// Account that proposed the market and posted the bond
    pub creator: String,

    /// Market question (e.g., "Will ETH close above 5k on Dec 31?")
    pub question: String,

    /// Labels for outcome 1 and outcome 2
    pub outcomes: [String; 2],

    /// Category tag: sports, crypto, politics, ...
    pub category: String,

    /// Trading stops and resolution may start at this unix time
    pub resolution_deadline: u64,

    /// Creation timestamp
    pub created_at: u64,

    /// Curve liquidity parameter `b`
    pub liquidity_param: u128,

    /// Creator bond held in escrow
    pub bond: u128,

    /// Initial curve funding posted with the bond
    pub subsidy: u128,

    /// Shares issued per outcome
    pub quantities: [u128; 2],

    /// Total paid in per outcome
    pub staked: [u128; 2],

    /// Settlement balance backing the shares
    pub balance: u128,

    /// Sum of all payments
    pub volume: u128,

    pub state: MarketState,

    pub resolution: Resolution,

    /// Positions keyed by participant
    pub positions: BTreeMap<String, Position>,

    /// Winning shares already paid out
    pub claimed_shares: u128,

    pub fees_settled: bool,

    pub fees_paid: u128,

    pub bond_refunded: bool,

    pub rejection_reason: Option<String>,
}

/// A participant's holding in one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The only outcome this participant may hold
    pub outcome: Outcome,
    /// Cumulative amount paid in
    pub amount: u128,
    /// Cumulative shares owned
    pub shares: u128,
    /// Set once winnings are paid, never cleared
    pub claimed: bool,
    /// Dispute round in which this position last signaled
    pub dispute_round: Option<u32>,
}

/// Result of `calculate_payout`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payout {
    /// Market not finalized yet
    Undetermined,
    /// Pre-fee amount owed (zero for losing or absent positions)
    Amount(u128),
}

/// Inputs to `create_market`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    pub question: String,
    pub outcomes: [String; 2],
    pub category: String,
    pub resolution_deadline: u64,
    pub liquidity_param: u128,
    pub bond: u128,
}

/// Inputs to `place_bet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRequest {
    pub outcome: Outcome,
    pub amount: u128,
    /// Lowest acceptable payout multiplier after the trade, in bps (15000 = 1.5x); 0 disables
    pub min_expected_odds: u32,
    /// Trade must land at or before this unix time; 0 disables
    pub deadline: u64,
}

/// What a successful bet produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetReceipt {
    pub market: MarketId,
    pub outcome: Outcome,
    pub amount: u128,
    pub shares: u128,
    /// Marginal price of the chosen outcome after the trade
    pub price_bps: u32,
    /// Shares held by the bettor after the trade
    pub position_shares: u128,
}

impl Market {
    pub fn curve(&self) -> LmsrCurve {
        LmsrCurve {
            liquidity: self.liquidity_param,
        }
    }

    /// Current marginal prices in basis points, summing to 10,000
    pub fn odds(&self) -> Result<[u32; 2]> {
        self.curve().odds_bps(self.quantities)
    }

    pub fn position(&self, participant: &str) -> Option<&Position> {
        self.positions.get(participant)
    }

    pub fn final_outcome(&self) -> Option<Outcome> {
        self.resolution.final_outcome
    }

    /// Shares still owed to winners (zero until finalized)
    pub fn outstanding_entitlement(&self) -> u128 {
        match self.final_outcome() {
            Some(outcome) => self.quantities[outcome.index()] - self.claimed_shares,
            None => 0,
        }
    }

    /// Settlement balance not owed to any winner
    pub fn surplus(&self) -> u128 {
        self.balance.saturating_sub(self.outstanding_entitlement())
    }

    /// Balance covers every share that could still win
    pub fn is_solvent(&self) -> bool {
        match self.final_outcome() {
            Some(_) => self.balance >= self.outstanding_entitlement(),
            None if self.state == MarketState::Rejected => true,
            None => self.balance >= self.quantities[0].max(self.quantities[1]),
        }
    }
}

/// Payout per unit staked at `price_bps`, in bps: 5000 pays 20000 (2x)
pub fn payout_odds_bps(price_bps: u32) -> u32 {
    let scale = BPS_SCALE as u64;
    match price_bps {
        0 => u32::MAX,
        p => (scale * scale / p as u64) as u32,
    }
}

// ============================================================================
// MARKET BOOK
// ============================================================================

/// All markets, addressed by index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketBook {
    markets: Vec<Market>,
}

impl MarketBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Market> {
        self.markets.iter()
    }

    pub fn get(&self, id: MarketId) -> Result<&Market> {
        self.markets
            .get(id.0 as usize)
            .ok_or(MarketError::MarketNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: MarketId) -> Result<&mut Market> {
        self.markets
            .get_mut(id.0 as usize)
            .ok_or(MarketError::MarketNotFound(id))
    }

    /// Current odds for a market, in basis points
    pub fn odds(&self, id: MarketId) -> Result<[u32; 2]> {
        self.get(id)?.odds()
    }

    /// Propose a new market, escrowing the creator's bond and the curve subsidy
    ///
    /// # Returns
    /// Id of the new market, in state Proposed
    pub fn create_market(&mut self, ctx: &mut Context<'_>, creator: &str, params: MarketParams) -> Result<MarketId> {
        let question = params.question.trim();
        if question.is_empty() {
            return Err(MarketError::InvalidQuestion);
        }
        let category = params.category.trim();
        if category.is_empty() {
            return Err(MarketError::InvalidCategory);
        }
        let [first, second] = &params.outcomes;
        if first.trim().is_empty() || second.trim().is_empty() || first.trim() == second.trim() {
            return Err(MarketError::InvalidOutcomeLabels);
        }
        if params.resolution_deadline <= ctx.now {
            return Err(MarketError::InvalidResolutionTime {
                deadline: params.resolution_deadline,
                now: ctx.now,
            });
        }
        let min_bond = ctx.params.uint(MIN_CREATOR_BOND);
        if params.bond < min_bond {
            return Err(MarketError::InsufficientBond {
                required: min_bond,
                provided: params.bond,
            });
        }

        let curve = LmsrCurve::new(
            params.liquidity_param,
            ctx.params.uint(MIN_LIQUIDITY),
            ctx.params.uint(MAX_LIQUIDITY),
        )?;
        let subsidy = curve.initial_subsidy()?;
        let deposit = params
            .bond
            .checked_add(subsidy)
            .ok_or(MarketError::MathOverflow)?;

        let id = MarketId(self.markets.len() as u64);
        ctx.vault.escrow(creator, id, deposit)?;

        let market = Market {
            id,
            creator: creator.to_string(),
            question: question.to_string(),
            outcomes: [first.trim().to_string(), second.trim().to_string()],
            category: category.to_string(),
            resolution_deadline: params.resolution_deadline,
            created_at: ctx.now,
            liquidity_param: curve.liquidity,
            bond: params.bond,
            subsidy,
            quantities: [0, 0],
            staked: [0, 0],
            balance: subsidy,
            volume: 0,
            state: MarketState::Proposed,
            resolution: Resolution::default(),
            positions: BTreeMap::new(),
            claimed_shares: 0,
            fees_settled: false,
            fees_paid: 0,
            bond_refunded: false,
            rejection_reason: None,
        };

        info!(
            "📥 Market {} proposed by {}: \"{}\" (b = {}, bond = {})",
            id,
            creator,
            market.question,
            format_tokens(market.liquidity_param),
            format_tokens(market.bond)
        );

        ctx.events.emit(
            ctx.now,
            MarketEvent::MarketProposed {
                market: id,
                creator: market.creator.clone(),
                question: market.question.clone(),
                bond: market.bond,
                liquidity_param: market.liquidity_param,
                subsidy,
                resolution_deadline: market.resolution_deadline,
            },
        );
        self.markets.push(market);
        Ok(id)
    }

    /// Governance approval; `participation` is the vote count reported by governance
    pub fn approve_market(&mut self, ctx: &mut Context<'_>, id: MarketId, caller: &str, participation: u128) -> Result<()> {
        ctx.roles.require_role(Role::Operator, caller)?;
        let market = self.get_mut(id)?;
        let next = market.state.transition(MarketState::Approved)?;

        let quorum = ctx.params.uint(APPROVAL_QUORUM);
        if participation < quorum {
            return Err(MarketError::ThresholdNotMet {
                required: quorum,
                actual: participation,
            });
        }

        market.state = next;
        info!("👍 Market {} approved by {}", id, caller);
        ctx.events.emit(
            ctx.now,
            MarketEvent::MarketApproved {
                market: id,
                approver: caller.to_string(),
                participation,
            },
        );
        Ok(())
    }

    /// Governance rejection; refunds bond and subsidy to the creator
    pub fn reject_market(&mut self, ctx: &mut Context<'_>, id: MarketId, caller: &str, reason: &str) -> Result<u128> {
        ctx.roles.require_role(Role::Operator, caller)?;
        let market = self.get_mut(id)?;
        let next = market.state.transition(MarketState::Rejected)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(MarketError::MissingReason);
        }

        let refund = market
            .bond
            .checked_add(market.balance)
            .ok_or(MarketError::MathOverflow)?;

        let previous = (market.state, market.balance);
        market.state = next;
        market.balance = 0;
        market.bond_refunded = true;
        market.rejection_reason = Some(reason.to_string());

        if let Err(e) = ctx.vault.release(id, &market.creator, refund) {
            (market.state, market.balance) = previous;
            market.bond_refunded = false;
            market.rejection_reason = None;
            return Err(e);
        }

        info!("🚫 Market {} rejected by {}: {}", id, caller, reason);
        ctx.events.emit(
            ctx.now,
            MarketEvent::MarketRejected {
                market: id,
                rejecter: caller.to_string(),
                reason: reason.to_string(),
                refunded: refund,
            },
        );
        Ok(refund)
    }

    /// Open an approved market for trading
    pub fn activate_market(&mut self, ctx: &mut Context<'_>, id: MarketId, caller: &str) -> Result<()> {
        ctx.roles.require_role(Role::Operator, caller)?;
        let market = self.get_mut(id)?;
        market.state = market.state.transition(MarketState::Active)?;

        info!("🟢 Market {} is live", id);
        ctx.events.emit(
            ctx.now,
            MarketEvent::MarketActivated {
                market: id,
                activator: caller.to_string(),
            },
        );
        Ok(())
    }

    /// Buy shares of one outcome
    ///
    /// # Arguments
    /// * `caller` - Bettor; pays `request.amount` from their balance
    /// * `request` - Outcome, payment and slippage/deadline bounds
    ///
    /// # Returns
    /// Receipt with shares minted and the resulting price
    pub fn place_bet(&mut self, ctx: &mut Context<'_>, id: MarketId, caller: &str, request: BetRequest) -> Result<BetReceipt> {
        let BetRequest {
            outcome,
            amount,
            min_expected_odds,
            deadline,
        } = request;

        if amount == 0 {
            return Err(MarketError::InvalidAmount);
        }

        let market = self.get_mut(id)?;
        market.state.require(MarketState::Active)?;
        if ctx.now >= market.resolution_deadline {
            return Err(MarketError::BettingClosed);
        }
        if deadline != 0 && ctx.now > deadline {
            return Err(MarketError::DeadlineExpired);
        }

        let minimum = ctx.params.uint(MINIMUM_BET);
        if amount < minimum {
            return Err(MarketError::BetTooSmall { minimum });
        }
        let maximum = ctx.params.uint(MAXIMUM_BET);
        if maximum > 0 && amount > maximum {
            return Err(MarketError::BetTooLarge { maximum });
        }

        if let Some(existing) = market.positions.get(caller) {
            if existing.outcome != outcome {
                return Err(MarketError::CannotChangeBet);
            }
        }

        let quote = market.curve().quote(market.quantities, outcome, amount)?;

        let odds = payout_odds_bps(quote.price_after_bps);
        if min_expected_odds > 0 && odds < min_expected_odds {
            return Err(MarketError::SlippageTooHigh {
                odds,
                minimum: min_expected_odds,
            });
        }

        // Compute every new value before moving funds
        let slot = outcome.index();
        let quantity = market.quantities[slot]
            .checked_add(quote.shares)
            .ok_or(MarketError::MathOverflow)?;
        let staked = market.staked[slot]
            .checked_add(amount)
            .ok_or(MarketError::MathOverflow)?;
        let balance = market
            .balance
            .checked_add(amount)
            .ok_or(MarketError::MathOverflow)?;
        let volume = market
            .volume
            .checked_add(amount)
            .ok_or(MarketError::MathOverflow)?;
        let (position_amount, position_shares) = match market.positions.get(caller) {
            Some(p) => (
                p.amount.checked_add(amount).ok_or(MarketError::MathOverflow)?,
                p.shares.checked_add(quote.shares).ok_or(MarketError::MathOverflow)?,
            ),
            None => (amount, quote.shares),
        };

        ctx.vault.escrow(caller, id, amount)?;

        market.quantities[slot] = quantity;
        market.staked[slot] = staked;
        market.balance = balance;
        market.volume = volume;
        let position = market
            .positions
            .entry(caller.to_string())
            .or_insert(Position {
                outcome,
                amount: 0,
                shares: 0,
                claimed: false,
                dispute_round: None,
            });
        position.amount = position_amount;
        position.shares = position_shares;

        info!(
            "🎲 {} bet {} on outcome {} in market {}: {} shares, price now {} bps",
            caller,
            format_tokens(amount),
            outcome,
            id,
            format_tokens(quote.shares),
            quote.price_after_bps
        );

        ctx.events.emit(
            ctx.now,
            MarketEvent::BetPlaced {
                market: id,
                bettor: caller.to_string(),
                outcome,
                amount,
                shares: quote.shares,
                price_bps: quote.price_after_bps,
            },
        );

        Ok(BetReceipt {
            market: id,
            outcome,
            amount,
            shares: quote.shares,
            price_bps: quote.price_after_bps,
            position_shares,
        })
    }

    /// Pre-fee amount owed to `participant`
    pub fn calculate_payout(&self, id: MarketId, participant: &str) -> Result<Payout> {
        let market = self.get(id)?;
        let Some(winner) = market.final_outcome() else {
            return Ok(Payout::Undetermined);
        };
        let amount = match market.position(participant) {
            Some(p) if p.outcome == winner => p.shares,
            _ => 0,
        };
        Ok(Payout::Amount(amount))
    }

    /// Pay out the caller's winning shares, one token unit per share
    ///
    /// Losers and non-participants get `NothingToClaim`; the claimed flag is
    /// set before funds move and restored if the transfer fails.
    pub fn claim_winnings(&mut self, ctx: &mut Context<'_>, id: MarketId, caller: &str) -> Result<u128> {
        let market = self.get_mut(id)?;
        market.state.require(MarketState::Finalized)?;
        let winner = market.final_outcome().ok_or(MarketError::MarketNotFinalized)?;

        let position = market
            .positions
            .get(caller)
            .ok_or(MarketError::NothingToClaim)?;
        if position.claimed {
            return Err(MarketError::AlreadyClaimed);
        }
        if position.outcome != winner || position.shares == 0 {
            return Err(MarketError::NothingToClaim);
        }
        let payout = position.shares;
        if market.balance < payout {
            return Err(MarketError::EscrowShortfall {
                market: id,
                needed: payout,
                available: market.balance,
            });
        }

        // Effects before interaction
        if let Some(p) = market.positions.get_mut(caller) {
            p.claimed = true;
        }
        market.claimed_shares += payout;
        market.balance -= payout;

        if let Err(e) = ctx.vault.release(id, caller, payout) {
            if let Some(p) = market.positions.get_mut(caller) {
                p.claimed = false;
            }
            market.claimed_shares -= payout;
            market.balance += payout;
            return Err(e);
        }

        info!("🏆 {} claimed {} from market {}", caller, format_tokens(payout), id);
        ctx.events.emit(
            ctx.now,
            MarketEvent::WinningsClaimed {
                market: id,
                claimant: caller.to_string(),
                amount: payout,
            },
        );
        Ok(payout)
    }

    /// Hand the settled volume to the fee sink and pay its allocations from the surplus
    pub fn collect_fees(&mut self, ctx: &mut Context<'_>, id: MarketId) -> Result<u128> {
        let market = self.get_mut(id)?;
        market.state.require(MarketState::Finalized)?;
        if market.fees_settled {
            return Err(MarketError::FeesAlreadyCollected);
        }

        let surplus = market.surplus();
        let settlement = Settlement {
            market: id,
            creator: market.creator.clone(),
            settled_volume: market.volume,
            surplus,
        };
        let allocations = ctx.fees.allocate(&settlement)?;

        let total = allocations
            .iter()
            .try_fold(0u128, |acc, a| acc.checked_add(a.amount))
            .ok_or(MarketError::MathOverflow)?;
        if total > surplus {
            return Err(MarketError::FeeAllocationExceedsSurplus {
                requested: total,
                available: surplus,
            });
        }
        let held = ctx.vault.escrowed(id);
        if held < total {
            return Err(MarketError::EscrowShortfall {
                market: id,
                needed: total,
                available: held,
            });
        }

        // All allocations land or none do
        for (paid, allocation) in allocations.iter().enumerate() {
            if let Err(e) = ctx.vault.release(id, &allocation.recipient, allocation.amount) {
                for done in allocations[..paid].iter().rev() {
                    if let Err(undo) = ctx.vault.escrow(&done.recipient, id, done.amount) {
                        error!(
                            "❌ Market {} could not reclaim {} from {}: {}",
                            id,
                            format_tokens(done.amount),
                            done.recipient,
                            undo
                        );
                    }
                }
                return Err(e);
            }
        }

        market.fees_settled = true;
        market.fees_paid = total;
        market.balance -= total;
        ctx.fees.record(&settlement, &allocations);

        ctx.events.emit(
            ctx.now,
            MarketEvent::FeesCollected {
                market: id,
                settled_volume: market.volume,
                total_fees: total,
            },
        );
        Ok(total)
    }

    /// Return the creator's bond plus whatever surplus fees left behind
    ///
    /// Rejected markets refund during rejection, so this only pays out on
    /// finalized markets whose fees are settled.
    pub fn refund_creator_bond(&mut self, ctx: &mut Context<'_>, id: MarketId) -> Result<u128> {
        let market = self.get_mut(id)?;
        if market.bond_refunded {
            return Err(MarketError::BondAlreadyRefunded);
        }
        market.state.require(MarketState::Finalized)?;
        if !market.fees_settled {
            return Err(MarketError::FeesNotCollected);
        }

        let surplus = market.surplus();
        let refund = market
            .bond
            .checked_add(surplus)
            .ok_or(MarketError::MathOverflow)?;

        market.bond_refunded = true;
        market.balance -= surplus;

        if let Err(e) = ctx.vault.release(id, &market.creator, refund) {
            market.bond_refunded = false;
            market.balance += surplus;
            return Err(e);
        }

        info!(
            "💸 Market {} returned {} to creator {}",
            id,
            format_tokens(refund),
            market.creator
        );
        ctx.events.emit(
            ctx.now,
            MarketEvent::CreatorBondRefunded {
                market: id,
                creator: market.creator.clone(),
                amount: refund,
            },
        );
        Ok(refund)
    }

    /// Fee collection right after finalization; a failure is logged and left for a retry
    pub(crate) fn try_collect_fees(&mut self, ctx: &mut Context<'_>, id: MarketId) {
        if let Err(e) = self.collect_fees(ctx, id) {
            warn!("⚠️  Fee collection for market {} deferred: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Vault;
    use crate::market_resolve::testing::Harness;
    use crate::params::ParameterStore;
    use crate::units::WAD;

    fn params(deadline: u64) -> MarketParams {
        MarketParams {
            question: "Will BTC close above 100k?".to_string(),
            outcomes: ["Yes".to_string(), "No".to_string()],
            category: "crypto".to_string(),
            resolution_deadline: deadline,
            liquidity_param: 100 * WAD,
            bond: WAD / 10,
        }
    }

    #[test]
    fn test_create_market_escrows_bond_and_subsidy() {
        let mut h = Harness::new();
        let id = h.proposed_market();
        let market = h.market(id).clone();

        assert_eq!(market.state, MarketState::Proposed);
        assert_eq!(market.balance, market.subsidy);
        assert!(market.subsidy >= 69 * WAD && market.subsidy < 70 * WAD);
        assert_eq!(h.ledger.escrowed(id), market.bond + market.subsidy);
        assert_eq!(h.ledger.balance("creator"), 1_000 * WAD - market.bond - market.subsidy);
        assert_eq!(h.market(id).odds().unwrap(), [5_000, 5_000]);
    }

    #[test]
    fn test_create_market_validation() {
        let mut h = Harness::new();
        let now = h.now;
        let (book, mut ctx) = h.split();

        let mut p = params(now + 10);
        p.question = "   ".to_string();
        assert_eq!(book.create_market(&mut ctx, "creator", p), Err(MarketError::InvalidQuestion));

        let mut p = params(now + 10);
        p.category = String::new();
        assert_eq!(book.create_market(&mut ctx, "creator", p), Err(MarketError::InvalidCategory));

        let mut p = params(now + 10);
        p.outcomes = ["Yes".to_string(), "Yes".to_string()];
        assert_eq!(book.create_market(&mut ctx, "creator", p), Err(MarketError::InvalidOutcomeLabels));

        assert_eq!(
            book.create_market(&mut ctx, "creator", params(now)),
            Err(MarketError::InvalidResolutionTime { deadline: now, now })
        );

        let mut p = params(now + 10);
        p.bond = WAD / 100;
        assert!(matches!(
            book.create_market(&mut ctx, "creator", p),
            Err(MarketError::InsufficientBond { .. })
        ));

        let mut p = params(now + 10);
        p.liquidity_param = 1;
        assert!(matches!(
            book.create_market(&mut ctx, "creator", p),
            Err(MarketError::InvalidLiquidityParam { .. })
        ));

        assert!(matches!(
            book.create_market(&mut ctx, "nobody", params(now + 10)),
            Err(MarketError::InsufficientFunds { .. })
        ));
        assert!(book.is_empty());
        assert!(h.events.is_empty());
    }

    #[test]
    fn test_governance_transitions() {
        let mut h = Harness::new();
        let id = h.proposed_market();
        let (book, mut ctx) = h.split();

        assert!(matches!(
            book.approve_market(&mut ctx, id, "alice", 0),
            Err(MarketError::Unauthorized { .. })
        ));
        assert_eq!(
            book.activate_market(&mut ctx, id, "operator"),
            Err(MarketError::MarketNotApproved)
        );
        book.approve_market(&mut ctx, id, "operator", 0).unwrap();
        assert_eq!(
            book.approve_market(&mut ctx, id, "operator", 0),
            Err(MarketError::MarketAlreadyApproved)
        );
        book.activate_market(&mut ctx, id, "operator").unwrap();
        assert_eq!(
            book.activate_market(&mut ctx, id, "operator"),
            Err(MarketError::MarketAlreadyActive)
        );
        assert_eq!(h.market(id).state, MarketState::Active);
    }

    #[test]
    fn test_approval_quorum() {
        let mut h = Harness::new();
        h.params.set(APPROVAL_QUORUM, 5).unwrap();
        let id = h.proposed_market();
        let (book, mut ctx) = h.split();

        assert_eq!(
            book.approve_market(&mut ctx, id, "operator", 4),
            Err(MarketError::ThresholdNotMet { required: 5, actual: 4 })
        );
        book.approve_market(&mut ctx, id, "operator", 5).unwrap();
    }

    #[test]
    fn test_reject_refunds_creator() {
        let mut h = Harness::new();
        let id = h.proposed_market();
        let (book, mut ctx) = h.split();

        assert_eq!(
            book.reject_market(&mut ctx, id, "operator", ""),
            Err(MarketError::MissingReason)
        );
        book.reject_market(&mut ctx, id, "operator", "duplicate question").unwrap();
        assert_eq!(
            book.refund_creator_bond(&mut ctx, id),
            Err(MarketError::BondAlreadyRefunded)
        );
        assert_eq!(
            book.approve_market(&mut ctx, id, "operator", 0),
            Err(MarketError::MarketAlreadyRejected)
        );

        assert_eq!(h.ledger.balance("creator"), 1_000 * WAD);
        assert_eq!(h.ledger.escrowed(id), 0);
        assert_eq!(h.market(id).state, MarketState::Rejected);
    }

    #[test]
    fn test_bets_accumulate_on_one_side() {
        let mut h = Harness::new();
        let id = h.active_market();

        let first = h.bet(id, "alice", Outcome::One, 10).unwrap();
        let second = h.bet(id, "alice", Outcome::One, 10).unwrap();
        assert!(first.shares > 19 * WAD);
        assert!(second.shares < first.shares);
        assert!(second.price_bps > first.price_bps);
        assert_eq!(second.position_shares, first.shares + second.shares);

        assert_eq!(
            h.bet(id, "alice", Outcome::Two, 10),
            Err(MarketError::CannotChangeBet)
        );

        let market = h.market(id);
        let position = market.position("alice").unwrap();
        assert_eq!(position.amount, 20 * WAD);
        assert_eq!(market.quantities[0], position.shares);
        assert_eq!(market.staked, [20 * WAD, 0]);
        assert_eq!(market.balance, market.subsidy + 20 * WAD);
        assert!(market.is_solvent());

        let odds = market.odds().unwrap();
        assert_eq!(odds[0] + odds[1], 10_000);
        assert!(odds[0] > 5_000);
    }

    #[test]
    fn test_bet_rejections_leave_state_untouched() {
        let mut h = Harness::new();
        let id = h.proposed_market();
        assert_eq!(h.bet(id, "alice", Outcome::One, 1), Err(MarketError::MarketNotActive));

        let id = h.active_market();
        let before = h.market(id).clone();
        let ledger_before = h.ledger.balance("alice");

        assert_eq!(h.bet(id, "alice", Outcome::One, 0), Err(MarketError::InvalidAmount));
        assert!(matches!(
            h.bet(id, "alice", Outcome::One, 5_000),
            Err(MarketError::InsufficientFunds { .. })
        ));

        let (book, mut ctx) = h.split();
        // 50 tokens push the price to ~0.70, paying ~1.44x
        let slippage = BetRequest {
            outcome: Outcome::One,
            amount: 50 * WAD,
            min_expected_odds: 15_000,
            deadline: 0,
        };
        assert!(matches!(
            book.place_bet(&mut ctx, id, "alice", slippage),
            Err(MarketError::SlippageTooHigh { minimum: 15_000, .. })
        ));
        let expired = BetRequest {
            deadline: ctx.now - 1,
            ..slippage
        };
        assert_eq!(
            book.place_bet(&mut ctx, id, "alice", expired),
            Err(MarketError::DeadlineExpired)
        );

        assert_eq!(h.market(id), &before);
        assert_eq!(h.ledger.balance("alice"), ledger_before);

        h.now = h.deadline;
        assert_eq!(h.bet(id, "alice", Outcome::One, 1), Err(MarketError::BettingClosed));
    }

    #[test]
    fn test_payout_odds() {
        assert_eq!(payout_odds_bps(5_000), 20_000);
        assert_eq!(payout_odds_bps(10_000), 10_000);
        assert_eq!(payout_odds_bps(8_000), 12_500);
        assert_eq!(payout_odds_bps(0), u32::MAX);
    }

    #[test]
    fn test_min_expected_odds_is_a_payout_multiplier() {
        let mut h = Harness::new();
        let id = h.active_market();
        let (book, mut ctx) = h.split();

        // Even market: one token moves the price to ~0.5025, paying ~1.99x
        let mut request = BetRequest {
            outcome: Outcome::One,
            amount: WAD,
            min_expected_odds: 20_000,
            deadline: 0,
        };
        match book.place_bet(&mut ctx, id, "alice", request) {
            Err(MarketError::SlippageTooHigh { odds, minimum }) => {
                assert_eq!(minimum, 20_000);
                assert!(odds > 19_800 && odds < 20_000);
            }
            other => panic!("expected slippage rejection, got {:?}", other),
        }

        request.min_expected_odds = 15_000;
        let receipt = book.place_bet(&mut ctx, id, "alice", request).unwrap();
        assert!(payout_odds_bps(receipt.price_bps) >= 15_000);
    }

    #[test]
    fn test_bet_size_limits() {
        let mut h = Harness::new();
        h.params.set(MAXIMUM_BET, 50 * WAD).unwrap();
        let id = h.active_market();
        let minimum = h.params.uint(MINIMUM_BET);

        let (book, mut ctx) = h.split();
        let dust = BetRequest {
            outcome: Outcome::Two,
            amount: minimum - 1,
            min_expected_odds: 0,
            deadline: 0,
        };
        assert_eq!(
            book.place_bet(&mut ctx, id, "bob", dust),
            Err(MarketError::BetTooSmall { minimum })
        );
        assert_eq!(
            h.bet(id, "bob", Outcome::Two, 51),
            Err(MarketError::BetTooLarge { maximum: 50 * WAD })
        );
    }

    #[test]
    fn test_dust_against_deep_market_mints_nothing() {
        let mut h = Harness::new();
        h.params.set(MINIMUM_BET, 1).unwrap();
        let id = h.active_market();
        let (book, mut ctx) = h.split();
        let request = BetRequest {
            outcome: Outcome::One,
            amount: 1,
            min_expected_odds: 0,
            deadline: 0,
        };
        assert_eq!(
            book.place_bet(&mut ctx, id, "alice", request),
            Err(MarketError::ShareAmountZero)
        );
    }

    #[test]
    fn test_claims_and_payouts() {
        let mut h = Harness::new();
        let id = h.active_market();
        let alice = h.bet(id, "alice", Outcome::One, 10).unwrap();
        h.bet(id, "bob", Outcome::Two, 30).unwrap();

        assert_eq!(h.book.calculate_payout(id, "alice"), Ok(Payout::Undetermined));
        let (book, mut ctx) = h.split();
        assert_eq!(
            book.claim_winnings(&mut ctx, id, "alice"),
            Err(MarketError::MarketNotFinalized)
        );

        h.finalize(id, Outcome::One);
        assert_eq!(h.book.calculate_payout(id, "alice"), Ok(Payout::Amount(alice.shares)));
        assert_eq!(h.book.calculate_payout(id, "bob"), Ok(Payout::Amount(0)));
        assert_eq!(h.book.calculate_payout(id, "carol"), Ok(Payout::Amount(0)));

        let before = h.ledger.balance("alice");
        let (book, mut ctx) = h.split();
        assert_eq!(book.claim_winnings(&mut ctx, id, "alice"), Ok(alice.shares));
        assert_eq!(
            book.claim_winnings(&mut ctx, id, "alice"),
            Err(MarketError::AlreadyClaimed)
        );
        assert_eq!(
            book.claim_winnings(&mut ctx, id, "bob"),
            Err(MarketError::NothingToClaim)
        );
        assert_eq!(
            book.claim_winnings(&mut ctx, id, "carol"),
            Err(MarketError::NothingToClaim)
        );
        assert_eq!(h.ledger.balance("alice"), before + alice.shares);
        assert!(h.market(id).is_solvent());
    }

    #[test]
    fn test_fees_then_creator_refund_drain_surplus() {
        let mut h = Harness::new();
        let id = h.active_market();
        let alice = h.bet(id, "alice", Outcome::One, 10).unwrap();
        h.bet(id, "bob", Outcome::Two, 30).unwrap();

        let (book, mut ctx) = h.split();
        assert_eq!(
            book.refund_creator_bond(&mut ctx, id),
            Err(MarketError::MarketNotFinalized)
        );

        h.finalize(id, Outcome::One);
        let market = h.market(id).clone();
        assert!(market.fees_settled);
        // 2.5% + 1.5% of 40 tokens
        assert_eq!(market.fees_paid, 16 * WAD / 10);
        assert_eq!(h.ledger.balance("treasury"), WAD);

        let (book, mut ctx) = h.split();
        assert_eq!(book.collect_fees(&mut ctx, id), Err(MarketError::FeesAlreadyCollected));
        let refund = book.refund_creator_bond(&mut ctx, id).unwrap();
        assert_eq!(refund, market.bond + market.surplus());
        assert_eq!(
            book.refund_creator_bond(&mut ctx, id),
            Err(MarketError::BondAlreadyRefunded)
        );

        // Only alice's winnings remain in escrow
        assert_eq!(h.ledger.escrowed(id), alice.shares);
        let (book, mut ctx) = h.split();
        book.claim_winnings(&mut ctx, id, "alice").unwrap();
        assert_eq!(h.ledger.escrowed(id), 0);
    }

    // ===== VAULT FAILURES =====

    #[test]
    fn test_failed_claim_restores_position() {
        let mut h = Harness::new();
        let id = h.active_market();
        let alice = h.bet(id, "alice", Outcome::One, 10).unwrap();
        h.finalize(id, Outcome::One);

        let before = h.market(id).clone();
        let events_before = h.events.len();
        let stats_before = h.ledger.stats();
        h.ledger.refuse_releases_to = Some("alice".to_string());

        let (book, mut ctx) = h.split();
        assert!(matches!(
            book.claim_winnings(&mut ctx, id, "alice"),
            Err(MarketError::EscrowShortfall { .. })
        ));
        assert_eq!(h.market(id), &before);
        assert_eq!(h.events.len(), events_before);
        assert_eq!(h.ledger.stats(), stats_before);

        h.ledger.refuse_releases_to = None;
        let (book, mut ctx) = h.split();
        assert_eq!(book.claim_winnings(&mut ctx, id, "alice"), Ok(alice.shares));
    }

    #[test]
    fn test_failed_rejection_is_atomic() {
        let mut h = Harness::new();
        let id = h.proposed_market();
        let before = h.market(id).clone();
        let events_before = h.events.len();
        h.ledger.refuse_releases_to = Some("creator".to_string());

        let (book, mut ctx) = h.split();
        assert!(book.reject_market(&mut ctx, id, "operator", "spam").is_err());
        assert_eq!(h.market(id), &before);
        assert_eq!(h.events.len(), events_before);
        assert_eq!(h.ledger.escrowed(id), before.bond + before.subsidy);

        h.ledger.refuse_releases_to = None;
        let (book, mut ctx) = h.split();
        assert_eq!(
            book.reject_market(&mut ctx, id, "operator", "spam"),
            Ok(before.bond + before.subsidy)
        );
    }

    #[test]
    fn test_failed_bond_refund_restores_flag() {
        let mut h = Harness::new();
        let id = h.active_market();
        h.bet(id, "bob", Outcome::Two, 5).unwrap();
        h.finalize(id, Outcome::One);

        let before = h.market(id).clone();
        let events_before = h.events.len();
        h.ledger.refuse_releases_to = Some("creator".to_string());

        let (book, mut ctx) = h.split();
        assert!(book.refund_creator_bond(&mut ctx, id).is_err());
        assert_eq!(h.market(id), &before);
        assert_eq!(h.events.len(), events_before);

        h.ledger.refuse_releases_to = None;
        let (book, mut ctx) = h.split();
        assert_eq!(
            book.refund_creator_bond(&mut ctx, id),
            Ok(before.bond + before.surplus())
        );
    }

    #[test]
    fn test_failed_fee_release_rolls_back_and_retries() {
        let mut h = Harness::new();
        let id = h.active_market();
        h.bet(id, "alice", Outcome::One, 10).unwrap();
        h.bet(id, "bob", Outcome::Two, 30).unwrap();

        // The treasury is paid first, so its transfer must be undone
        h.ledger.refuse_releases_to = Some("creator".to_string());
        h.finalize(id, Outcome::One);

        let market = h.market(id).clone();
        assert_eq!(market.state, MarketState::Finalized);
        assert!(!market.fees_settled);
        assert_eq!(market.fees_paid, 0);
        assert_eq!(h.ledger.balance("treasury"), 0);
        assert_eq!(h.ledger.escrowed(id), market.bond + market.balance);
        assert_eq!(h.rewards.total_paid("treasury"), 0);
        assert!(h.events.for_market(id).all(|e| e.name() != "fees_collected"));

        let (book, mut ctx) = h.split();
        assert_eq!(book.refund_creator_bond(&mut ctx, id), Err(MarketError::FeesNotCollected));
        assert!(book.collect_fees(&mut ctx, id).is_err());
        assert_eq!(h.market(id), &market);

        h.ledger.refuse_releases_to = None;
        let (book, mut ctx) = h.split();
        assert_eq!(book.collect_fees(&mut ctx, id), Ok(16 * WAD / 10));
        assert_eq!(book.collect_fees(&mut ctx, id), Err(MarketError::FeesAlreadyCollected));
        assert_eq!(h.ledger.balance("treasury"), WAD);
        assert_eq!(h.rewards.total_paid("treasury"), WAD);
        assert_eq!(h.rewards.total_paid("creator"), 6 * WAD / 10);
        assert_eq!(h.ledger.escrowed(id), market.bond + market.balance - 16 * WAD / 10);
    }
}
