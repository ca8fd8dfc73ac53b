//! Error types for market operations
//!
//! Every rejection the engine can produce is a named variant. Nothing is
//! retried internally; the caller decides whether to resubmit.

use thiserror::Error;

use crate::market_resolve::lifecycle::MarketState;
use crate::market_resolve::MarketId;

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Broad category of a rejection, used by callers to pick a retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input; resubmit with corrected values
    Validation,
    /// Wrong lifecycle state, role or timing; wait or gain authorization
    StateMismatch,
    /// Curve or arithmetic rejection; adjust trade size or price bound
    Numeric,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    // ===== VALIDATION =====
    #[error("question must not be empty")]
    InvalidQuestion,

    #[error("category must not be empty")]
    InvalidCategory,

    #[error("outcome labels must be non-empty and distinct")]
    InvalidOutcomeLabels,

    #[error("resolution deadline {deadline} is not after {now}")]
    InvalidResolutionTime { deadline: u64, now: u64 },

    #[error("creator bond {provided} is below the minimum {required}")]
    InsufficientBond { required: u128, provided: u128 },

    #[error("liquidity parameter {value} outside [{min}, {max}]")]
    InvalidLiquidityParam { value: u128, min: u128, max: u128 },

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("outcome {0} is not 1 or 2")]
    InvalidOutcome(u8),

    #[error("bet below minimum of {minimum}")]
    BetTooSmall { minimum: u128 },

    #[error("bet above maximum of {maximum}")]
    BetTooLarge { maximum: u128 },

    #[error("a rejection reason is required")]
    MissingReason,

    #[error("{account} holds {available}, needs {needed}")]
    InsufficientFunds { account: String, needed: u128, available: u128 },

    #[error("invalid token amount: {0}")]
    InvalidTokenAmount(String),

    #[error("unknown parameter key: {0}")]
    UnknownParameter(String),

    #[error("value {value} not allowed for parameter {key}")]
    InvalidParameterValue { key: String, value: u128 },

    // ===== STATE MISMATCH =====
    #[error("market {0} not found")]
    MarketNotFound(MarketId),

    #[error("market is not active")]
    MarketNotActive,

    #[error("market is not approved")]
    MarketNotApproved,

    #[error("market already approved")]
    MarketAlreadyApproved,

    #[error("market already rejected")]
    MarketAlreadyRejected,

    #[error("market already active")]
    MarketAlreadyActive,

    #[error("market is not resolving")]
    MarketNotResolving,

    #[error("market is not disputed")]
    MarketNotDisputed,

    #[error("market is disputed")]
    MarketDisputed,

    #[error("market is not finalized")]
    MarketNotFinalized,

    #[error("market already finalized")]
    MarketAlreadyFinalized,

    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition { from: MarketState, to: MarketState },

    #[error("{caller} lacks role {role}")]
    Unauthorized { role: String, caller: String },

    #[error("betting closed at the resolution deadline")]
    BettingClosed,

    #[error("trade deadline expired")]
    DeadlineExpired,

    #[error("resolution time not reached")]
    ResolutionTimeNotReached,

    #[error("dispute window closed")]
    ProposalWindowClosed,

    #[error("dispute window still active until {ends_at}")]
    DisputeWindowActive { ends_at: u64 },

    #[error("participation {actual} below required {required}")]
    ThresholdNotMet { required: u128, actual: u128 },

    #[error("position is on the other outcome")]
    CannotChangeBet,

    #[error("winnings already claimed")]
    AlreadyClaimed,

    #[error("nothing to claim")]
    NothingToClaim,

    #[error("no stake on the losing outcome")]
    NoStakeToDispute,

    #[error("dispute already signaled this round")]
    AlreadyDisputed,

    #[error("creator bond already refunded")]
    BondAlreadyRefunded,

    #[error("fees already collected")]
    FeesAlreadyCollected,

    #[error("fees not yet collected")]
    FeesNotCollected,

    // ===== NUMERIC =====
    #[error("payment too small to mint any share")]
    ShareAmountZero,

    #[error("payout odds {odds} bps below minimum {minimum} bps")]
    SlippageTooHigh { odds: u32, minimum: u32 },

    #[error("arithmetic overflow")]
    MathOverflow,

    #[error("market {market} escrow holds {available}, needs {needed}")]
    EscrowShortfall { market: MarketId, needed: u128, available: u128 },

    #[error("fee allocations {requested} exceed surplus {available}")]
    FeeAllocationExceedsSurplus { requested: u128, available: u128 },
}

impl MarketError {
    pub fn class(&self) -> ErrorClass {
        use MarketError::*;
        match self {
            InvalidQuestion
            | InvalidCategory
            | InvalidOutcomeLabels
            | InvalidResolutionTime { .. }
            | InsufficientBond { .. }
            | InvalidLiquidityParam { .. }
            | InvalidAmount
            | InvalidOutcome(_)
            | BetTooSmall { .. }
            | BetTooLarge { .. }
            | MissingReason
            | InsufficientFunds { .. }
            | InvalidTokenAmount(_)
            | UnknownParameter(_)
            | InvalidParameterValue { .. } => ErrorClass::Validation,

            ShareAmountZero
            | SlippageTooHigh { .. }
            | MathOverflow
            | EscrowShortfall { .. }
            | FeeAllocationExceedsSurplus { .. } => ErrorClass::Numeric,

            _ => ErrorClass::StateMismatch,
        }
    }
}

/// Errors from saving or loading a state snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
