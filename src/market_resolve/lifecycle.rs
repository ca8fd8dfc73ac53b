use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MarketError, Result};

// ============================================================================
// MARKET LIFECYCLE STATE
// ============================================================================

/// Market lifecycle state
///
/// Flow: Proposed → Approved → Active → Resolving → Finalized
///          ↓                              ↓    ↑
///       Rejected                        Disputed
///
/// Disputed may also go straight to Finalized under an administrative
/// correction. Finalized and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketState {
    /// Created with the creator's bond escrowed, awaiting governance
    /// - No trading
    /// - Operator may approve or reject
    Proposed,

    /// Passed governance, not yet open
    Approved,

    /// Trading is LIVE until the resolution deadline
    Active,

    /// Candidate outcome proposed, dispute window running
    /// - No trading
    Resolving,

    /// Dispute weight crossed the threshold; waiting on an admin correction
    Disputed,

    /// Final outcome locked, claims open
    Finalized,

    /// Rejected by governance, bond refunded
    Rejected,
}

/// Allowed transitions; anything else is rejected
const TRANSITIONS: &[(MarketState, MarketState)] = &[
    (MarketState::Proposed, MarketState::Approved),
    (MarketState::Proposed, MarketState::Rejected),
    (MarketState::Approved, MarketState::Active),
    (MarketState::Active, MarketState::Resolving),
    (MarketState::Resolving, MarketState::Disputed),
    (MarketState::Resolving, MarketState::Finalized),
    (MarketState::Disputed, MarketState::Resolving),
    (MarketState::Disputed, MarketState::Finalized),
];

impl MarketState {
    /// Check if trading is allowed in this state
    pub fn is_trading_open(&self) -> bool {
        matches!(self, MarketState::Active)
    }

    /// Check if the market has ended (no more changes possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, MarketState::Finalized | MarketState::Rejected)
    }

    pub fn can_transition_to(self, next: MarketState) -> bool {
        TRANSITIONS.contains(&(self, next))
    }

    /// Move to `next` if the table allows it
    pub fn transition(self, next: MarketState) -> Result<MarketState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(self.mismatch(next))
        }
    }

    /// Fail unless the market is currently in `expected`
    pub fn require(self, expected: MarketState) -> Result<()> {
        if self == expected {
            return Ok(());
        }
        Err(match (expected, self) {
            (_, MarketState::Rejected) => MarketError::MarketAlreadyRejected,
            (MarketState::Proposed, _) => MarketError::MarketAlreadyApproved,
            (MarketState::Approved, MarketState::Proposed) => MarketError::MarketNotApproved,
            (MarketState::Approved, _) => MarketError::MarketAlreadyActive,
            (MarketState::Active, _) => MarketError::MarketNotActive,
            (MarketState::Resolving, MarketState::Disputed) => MarketError::MarketDisputed,
            (MarketState::Resolving, MarketState::Finalized) => MarketError::MarketAlreadyFinalized,
            (MarketState::Resolving, _) => MarketError::MarketNotResolving,
            (MarketState::Disputed, _) => MarketError::MarketNotDisputed,
            (MarketState::Finalized, _) => MarketError::MarketNotFinalized,
            (MarketState::Rejected, _) => MarketError::InvalidTransition {
                from: self,
                to: expected,
            },
        })
    }

    /// Named error for a transition the table does not allow
    fn mismatch(self, next: MarketState) -> MarketError {
        match (self, next) {
            (MarketState::Rejected, _) => MarketError::MarketAlreadyRejected,
            (MarketState::Finalized, _) => MarketError::MarketAlreadyFinalized,
            (_, MarketState::Approved) | (_, MarketState::Rejected) => {
                MarketError::MarketAlreadyApproved
            }
            (MarketState::Proposed, MarketState::Active) => MarketError::MarketNotApproved,
            (_, MarketState::Active) => MarketError::MarketAlreadyActive,
            (MarketState::Proposed, MarketState::Resolving)
            | (MarketState::Approved, MarketState::Resolving)
            | (MarketState::Resolving, MarketState::Resolving) => MarketError::MarketNotActive,
            (MarketState::Disputed, MarketState::Disputed) => MarketError::MarketDisputed,
            (_, MarketState::Disputed) | (_, MarketState::Finalized) => {
                MarketError::MarketNotResolving
            }
            (from, to) => MarketError::InvalidTransition { from, to },
        }
    }

    /// Get emoji for state display
    pub fn emoji(&self) -> &'static str {
        match self {
            MarketState::Proposed => "📥",
            MarketState::Approved => "👍",
            MarketState::Active => "🟢",
            MarketState::Resolving => "⏳",
            MarketState::Disputed => "⚠️",
            MarketState::Finalized => "✅",
            MarketState::Rejected => "🚫",
        }
    }
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            MarketState::Proposed => "proposed",
            MarketState::Approved => "approved",
            MarketState::Active => "active",
            MarketState::Resolving => "resolving",
            MarketState::Disputed => "disputed",
            MarketState::Finalized => "finalized",
            MarketState::Rejected => "rejected",
        };
        write!(f, "{}", state_str)
    }
}

impl Default for MarketState {
    fn default() -> Self {
        MarketState::Proposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MarketState; 7] = [
        MarketState::Proposed,
        MarketState::Approved,
        MarketState::Active,
        MarketState::Resolving,
        MarketState::Disputed,
        MarketState::Finalized,
        MarketState::Rejected,
    ];

    #[test]
    fn test_happy_path() {
        let state = MarketState::Proposed
            .transition(MarketState::Approved)
            .and_then(|s| s.transition(MarketState::Active))
            .and_then(|s| s.transition(MarketState::Resolving))
            .and_then(|s| s.transition(MarketState::Finalized))
            .unwrap();
        assert_eq!(state, MarketState::Finalized);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for next in ALL {
            assert!(!MarketState::Finalized.can_transition_to(next));
            assert!(!MarketState::Rejected.can_transition_to(next));
        }
    }

    #[test]
    fn test_named_mismatch_errors() {
        assert_eq!(
            MarketState::Proposed.transition(MarketState::Active),
            Err(MarketError::MarketNotApproved)
        );
        assert_eq!(
            MarketState::Active.transition(MarketState::Approved),
            Err(MarketError::MarketAlreadyApproved)
        );
        assert_eq!(
            MarketState::Resolving.transition(MarketState::Resolving),
            Err(MarketError::MarketNotActive)
        );
        assert_eq!(
            MarketState::Rejected.transition(MarketState::Approved),
            Err(MarketError::MarketAlreadyRejected)
        );
        assert_eq!(
            MarketState::Finalized.transition(MarketState::Finalized),
            Err(MarketError::MarketAlreadyFinalized)
        );
        assert_eq!(
            MarketState::Active.transition(MarketState::Finalized),
            Err(MarketError::MarketNotResolving)
        );
    }

    #[test]
    fn test_require() {
        assert!(MarketState::Active.require(MarketState::Active).is_ok());
        assert_eq!(
            MarketState::Approved.require(MarketState::Active),
            Err(MarketError::MarketNotActive)
        );
        assert_eq!(
            MarketState::Resolving.require(MarketState::Finalized),
            Err(MarketError::MarketNotFinalized)
        );
        assert_eq!(
            MarketState::Disputed.require(MarketState::Resolving),
            Err(MarketError::MarketDisputed)
        );
    }

    #[test]
    fn test_only_active_trades() {
        for state in ALL {
            assert_eq!(state.is_trading_open(), state == MarketState::Active);
        }
    }
}
