use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::lifecycle::MarketState;
use super::markets::MarketBook;
use super::{Context, MarketId, Outcome};
use crate::access::Role;
use crate::error::{MarketError, Result};
use crate::events::MarketEvent;
use crate::params::{
    DISPUTE_RESOLUTION_POLICY, DISPUTE_THRESHOLD_BPS, DISPUTE_WINDOW, POLICY_FINALIZE, POLICY_REOPEN,
};
use crate::units::{format_tokens, BPS_SCALE};

// ============================================================================
// RESOLUTION RECORD
// ============================================================================

/// Post-trading resolution progress for one market
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Candidate outcome under the current dispute window
    pub proposed_outcome: Option<Outcome>,
    pub resolver: Option<String>,
    pub justification: Option<String>,
    pub proposed_at: u64,
    pub dispute_window_end: u64,
    /// Locked once, never overwritten
    pub final_outcome: Option<Outcome>,
    /// Incremented every time a correction reopens the window
    pub dispute_round: u32,
    /// Stake signaled against the candidate in this round
    pub dispute_weight: u128,
    pub dispute_count: u32,
    /// Final outcome was set by an administrative action
    pub overridden: bool,
}

/// What `resolve_dispute` did with the corrected outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    Finalized,
    Reopened { dispute_window_end: u64 },
}

/// Smallest weight that disputes a candidate when `losing_stake` backs the other side
pub fn dispute_threshold(losing_stake: u128, threshold_bps: u128) -> Result<u128> {
    let scale = BPS_SCALE as u128;
    losing_stake
        .checked_mul(threshold_bps)
        .and_then(|v| v.checked_add(scale - 1))
        .map(|v| v / scale)
        .ok_or(MarketError::MathOverflow)
}

fn require_justification(justification: &str) -> Result<String> {
    let trimmed = justification.trim();
    if trimmed.is_empty() {
        return Err(MarketError::MissingReason);
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// RESOLUTION PROTOCOL
// ============================================================================

impl MarketBook {
    /// Propose the candidate outcome and open the dispute window
    ///
    /// # Arguments
    /// * `caller` - Must hold the resolver role
    /// * `outcome` - Candidate outcome
    /// * `justification` - Free-form evidence, recorded with the proposal
    ///
    /// # Returns
    /// Unix time at which the dispute window closes
    pub fn propose_outcome(
        &mut self,
        ctx: &mut Context<'_>,
        id: MarketId,
        caller: &str,
        outcome: Outcome,
        justification: &str,
    ) -> Result<u64> {
        ctx.roles.require_role(Role::Resolver, caller)?;
        let market = self.get_mut(id)?;
        market.state.require(MarketState::Active)?;
        if ctx.now < market.resolution_deadline {
            return Err(MarketError::ResolutionTimeNotReached);
        }
        let next = market.state.transition(MarketState::Resolving)?;
        let window_end = ctx
            .now
            .checked_add(ctx.params.uint(DISPUTE_WINDOW).min(u64::MAX as u128) as u64)
            .ok_or(MarketError::MathOverflow)?;

        market.state = next;
        let resolution = &mut market.resolution;
        resolution.proposed_outcome = Some(outcome);
        resolution.resolver = Some(caller.to_string());
        resolution.justification = Some(justification.to_string());
        resolution.proposed_at = ctx.now;
        resolution.dispute_window_end = window_end;

        info!(
            "⏳ Outcome {} proposed for market {} by {}, dispute window until {}",
            outcome, id, caller, window_end
        );
        ctx.events.emit(
            ctx.now,
            MarketEvent::OutcomeProposed {
                market: id,
                resolver: caller.to_string(),
                outcome,
                justification: justification.to_string(),
                dispute_window_end: window_end,
            },
        );
        Ok(window_end)
    }

    /// Object to the candidate outcome with the caller's losing-side stake
    ///
    /// # Returns
    /// true if this signal pushed the market into DISPUTED
    pub fn signal_dispute(&mut self, ctx: &mut Context<'_>, id: MarketId, caller: &str) -> Result<bool> {
        let market = self.get_mut(id)?;
        market.state.require(MarketState::Resolving)?;
        if ctx.now >= market.resolution.dispute_window_end {
            return Err(MarketError::ProposalWindowClosed);
        }
        let candidate = market
            .resolution
            .proposed_outcome
            .ok_or(MarketError::MarketNotResolving)?;
        let losing = candidate.other();
        let round = market.resolution.dispute_round;

        let position = market
            .positions
            .get(caller)
            .filter(|p| p.outcome == losing && p.amount > 0)
            .ok_or(MarketError::NoStakeToDispute)?;
        if position.dispute_round == Some(round) {
            return Err(MarketError::AlreadyDisputed);
        }
        let weight = position.amount;

        let threshold = dispute_threshold(
            market.staked[losing.index()],
            ctx.params.uint(DISPUTE_THRESHOLD_BPS),
        )?;
        let total_weight = market
            .resolution
            .dispute_weight
            .checked_add(weight)
            .ok_or(MarketError::MathOverflow)?;
        let disputed = total_weight >= threshold;
        let next = if disputed {
            Some(market.state.transition(MarketState::Disputed)?)
        } else {
            None
        };

        // Flag the signal before the weight counts
        if let Some(p) = market.positions.get_mut(caller) {
            p.dispute_round = Some(round);
        }
        market.resolution.dispute_weight = total_weight;
        market.resolution.dispute_count += 1;
        if let Some(state) = next {
            market.state = state;
            warn!(
                "⚠️  Market {} disputed: {} of {} signaled against outcome {}",
                id,
                format_tokens(total_weight),
                format_tokens(threshold),
                candidate
            );
        }

        ctx.events.emit(
            ctx.now,
            MarketEvent::DisputeSignaled {
                market: id,
                disputer: caller.to_string(),
                weight,
                total_weight,
                threshold,
                disputed,
            },
        );
        Ok(disputed)
    }

    /// Administrative correction of a disputed market
    ///
    /// Policy 0 finalizes with the corrected outcome; policy 1 makes it the new
    /// candidate under a fresh dispute window and round.
    pub fn resolve_dispute(
        &mut self,
        ctx: &mut Context<'_>,
        id: MarketId,
        caller: &str,
        outcome: Outcome,
        justification: &str,
    ) -> Result<DisputeOutcome> {
        ctx.roles.require_role(Role::Admin, caller)?;
        let justification = require_justification(justification)?;
        self.get(id)?.state.require(MarketState::Disputed)?;

        match ctx.params.uint(DISPUTE_RESOLUTION_POLICY) {
            POLICY_FINALIZE => {
                self.lock_final_outcome(ctx, id, outcome, true)?;
                let market = self.get_mut(id)?;
                market.resolution.justification = Some(justification.clone());
                ctx.events.emit(
                    ctx.now,
                    MarketEvent::DisputeResolved {
                        market: id,
                        admin: caller.to_string(),
                        outcome,
                        justification,
                        finalized: true,
                    },
                );
                return Ok(DisputeOutcome::Finalized);
            }
            POLICY_REOPEN => {}
            value => {
                return Err(MarketError::InvalidParameterValue {
                    key: DISPUTE_RESOLUTION_POLICY.to_string(),
                    value,
                });
            }
        }

        let market = self.get_mut(id)?;
        let next = market.state.transition(MarketState::Resolving)?;
        let window_end = ctx
            .now
            .checked_add(ctx.params.uint(DISPUTE_WINDOW).min(u64::MAX as u128) as u64)
            .ok_or(MarketError::MathOverflow)?;

        market.state = next;
        let resolution = &mut market.resolution;
        resolution.proposed_outcome = Some(outcome);
        resolution.resolver = Some(caller.to_string());
        resolution.justification = Some(justification.clone());
        resolution.proposed_at = ctx.now;
        resolution.dispute_window_end = window_end;
        resolution.dispute_round += 1;
        resolution.dispute_weight = 0;
        resolution.dispute_count = 0;

        info!(
            "🔁 Market {} reopened with outcome {} (round {}), window until {}",
            id, outcome, resolution.dispute_round, window_end
        );
        ctx.events.emit(
            ctx.now,
            MarketEvent::DisputeResolved {
                market: id,
                admin: caller.to_string(),
                outcome,
                justification,
                finalized: false,
            },
        );
        Ok(DisputeOutcome::Reopened {
            dispute_window_end: window_end,
        })
    }

    /// Lock the candidate outcome once the dispute window has elapsed; callable by anyone
    pub fn finalize(&mut self, ctx: &mut Context<'_>, id: MarketId) -> Result<Outcome> {
        let market = self.get_mut(id)?;
        market.state.require(MarketState::Resolving)?;
        let ends_at = market.resolution.dispute_window_end;
        if ctx.now < ends_at {
            return Err(MarketError::DisputeWindowActive { ends_at });
        }
        let outcome = market
            .resolution
            .proposed_outcome
            .ok_or(MarketError::MarketNotResolving)?;

        self.lock_final_outcome(ctx, id, outcome, false)?;
        Ok(outcome)
    }

    /// Force finalization with `outcome`, bypassing the dispute timer
    pub fn admin_finalize(
        &mut self,
        ctx: &mut Context<'_>,
        id: MarketId,
        caller: &str,
        outcome: Outcome,
        justification: &str,
    ) -> Result<()> {
        ctx.roles.require_role(Role::Admin, caller)?;
        let justification = require_justification(justification)?;
        let market = self.get_mut(id)?;
        if market.state != MarketState::Disputed {
            market.state.require(MarketState::Resolving)?;
        }

        warn!(
            "🛑 Admin {} force-finalizing market {} to outcome {}: {}",
            caller, id, outcome, justification
        );
        self.lock_final_outcome(ctx, id, outcome, true)?;
        self.get_mut(id)?.resolution.justification = Some(justification);
        Ok(())
    }

    /// One-way move to FINALIZED, followed by a best-effort fee settlement
    fn lock_final_outcome(&mut self, ctx: &mut Context<'_>, id: MarketId, outcome: Outcome, overridden: bool) -> Result<()> {
        let market = self.get_mut(id)?;
        if market.resolution.final_outcome.is_some() {
            return Err(MarketError::MarketAlreadyFinalized);
        }
        market.state = market.state.transition(MarketState::Finalized)?;
        market.resolution.final_outcome = Some(outcome);
        market.resolution.proposed_outcome = Some(outcome);
        market.resolution.overridden = overridden;

        info!(
            "✅ Market {} finalized: outcome {} ({})",
            id, outcome, market.outcomes[outcome.index()]
        );
        ctx.events.emit(
            ctx.now,
            MarketEvent::MarketFinalized {
                market: id,
                outcome,
                overridden,
            },
        );

        self.try_collect_fees(ctx, id);
        Ok(())
    }
}
