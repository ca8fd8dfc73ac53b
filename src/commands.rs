//! Serializable operation requests
//!
//! Every engine operation has a `Command` variant so scripts, snapshots and
//! tests can drive the engine uniformly through `AppState::execute`. Token
//! amounts are written as decimal strings ("10", "0.25") and converted to
//! base units on dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::access::Role;
use crate::market_resolve::{BetReceipt, DisputeOutcome, MarketId, Outcome};
use crate::units::format_tokens;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Credit an account from outside the engine
    Deposit { account: String, amount: String },
    GrantRole { role: Role, identity: String },
    SetParam { key: String, value: String },
    CreateMarket {
        question: String,
        outcomes: [String; 2],
        category: String,
        resolution_deadline: u64,
        liquidity: String,
        bond: String,
    },
    ApproveMarket {
        market: MarketId,
        #[serde(default)]
        participation: u128,
    },
    RejectMarket { market: MarketId, reason: String },
    ActivateMarket { market: MarketId },
    PlaceBet {
        market: MarketId,
        outcome: Outcome,
        amount: String,
        #[serde(default)]
        min_expected_odds: u32,
        #[serde(default)]
        deadline: u64,
    },
    ProposeOutcome {
        market: MarketId,
        outcome: Outcome,
        justification: String,
    },
    SignalDispute { market: MarketId },
    ResolveDispute {
        market: MarketId,
        outcome: Outcome,
        justification: String,
    },
    Finalize { market: MarketId },
    AdminFinalize {
        market: MarketId,
        outcome: Outcome,
        justification: String,
    },
    ClaimWinnings { market: MarketId },
    CollectFees { market: MarketId },
    RefundCreatorBond { market: MarketId },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Deposit { .. } => "deposit",
            Command::GrantRole { .. } => "grant_role",
            Command::SetParam { .. } => "set_param",
            Command::CreateMarket { .. } => "create_market",
            Command::ApproveMarket { .. } => "approve_market",
            Command::RejectMarket { .. } => "reject_market",
            Command::ActivateMarket { .. } => "activate_market",
            Command::PlaceBet { .. } => "place_bet",
            Command::ProposeOutcome { .. } => "propose_outcome",
            Command::SignalDispute { .. } => "signal_dispute",
            Command::ResolveDispute { .. } => "resolve_dispute",
            Command::Finalize { .. } => "finalize",
            Command::AdminFinalize { .. } => "admin_finalize",
            Command::ClaimWinnings { .. } => "claim_winnings",
            Command::CollectFees { .. } => "collect_fees",
            Command::RefundCreatorBond { .. } => "refund_creator_bond",
        }
    }
}

/// Result of a successfully executed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutput {
    Done,
    MarketCreated(MarketId),
    Bet(BetReceipt),
    /// Tokens moved (claims, refunds, fees)
    Amount(u128),
    /// Dispute window end
    WindowEnd(u64),
    /// Whether the signal moved the market to DISPUTED
    Disputed(bool),
    DisputeResolved(DisputeOutcome),
    Finalized(Outcome),
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Done => write!(f, "ok"),
            CommandOutput::MarketCreated(id) => write!(f, "market {} created", id),
            CommandOutput::Bet(receipt) => write!(
                f,
                "{} shares of outcome {} for {} (price {} bps)",
                format_tokens(receipt.shares),
                receipt.outcome,
                format_tokens(receipt.amount),
                receipt.price_bps
            ),
            CommandOutput::Amount(amount) => write!(f, "{} tokens", format_tokens(*amount)),
            CommandOutput::WindowEnd(end) => write!(f, "dispute window until {}", end),
            CommandOutput::Disputed(true) => write!(f, "market disputed"),
            CommandOutput::Disputed(false) => write!(f, "dispute recorded"),
            CommandOutput::DisputeResolved(DisputeOutcome::Finalized) => write!(f, "finalized"),
            CommandOutput::DisputeResolved(DisputeOutcome::Reopened { dispute_window_end }) => {
                write!(f, "reopened until {}", dispute_window_end)
            }
            CommandOutput::Finalized(outcome) => write!(f, "finalized on outcome {}", outcome),
        }
    }
}

/// One step of a replay script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Unix time the clock is set to before the step runs
    pub at: u64,
    pub caller: String,
    pub op: Command,
}

pub fn parse_script(json: &str) -> serde_json::Result<Vec<ScriptStep>> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script = r#"[
            { "at": 100, "caller": "admin", "op": { "deposit": { "account": "alice", "amount": "50" } } },
            { "at": 200, "caller": "alice", "op": { "place_bet": { "market": 0, "outcome": 1, "amount": "10" } } },
            { "at": 300, "caller": "anyone", "op": { "finalize": { "market": 0 } } }
        ]"#;
        let steps = parse_script(script).unwrap();

        assert_eq!(steps.len(), 3);
        assert_eq!(
            steps[1].op,
            Command::PlaceBet {
                market: MarketId(0),
                outcome: Outcome::One,
                amount: "10".to_string(),
                min_expected_odds: 0,
                deadline: 0,
            }
        );
        assert_eq!(steps[2].op.name(), "finalize");
    }

    #[test]
    fn test_bad_outcome_rejected() {
        let script = r#"[{ "at": 1, "caller": "a", "op": { "place_bet": { "market": 0, "outcome": 3, "amount": "1" } } }]"#;
        assert!(parse_script(script).is_err());
    }
}
