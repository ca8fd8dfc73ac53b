// ============================================================================
// Market Resolve Module - Pricing, Market Lifecycle & Resolution
// ============================================================================
//
// This module contains the core prediction market functionality:
//   - fixed: WAD fixed-point arithmetic (exp, ln, checked mul/div)
//   - lmsr: Logarithmic Market Scoring Rule pricing curve
//   - lifecycle: market states and the allowed transition table
//   - markets: market book, bet placement, payouts and claims
//   - resolution: propose -> dispute window -> finalize protocol
//
// Every operation receives a `Context` carrying the collaborators it may
// touch and the current time; nothing here reads ambient global state.
//
// ============================================================================

pub mod fixed;
pub mod lmsr;
pub mod lifecycle;
pub mod markets;
pub mod resolution;

pub use lifecycle::*;
pub use lmsr::{LmsrCurve, Quote, MAX_LIQUIDITY_PARAM, MIN_LIQUIDITY_PARAM};
pub use markets::*;
pub use resolution::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::access::RoleChecker;
use crate::error::MarketError;
use crate::events::EventSink;
use crate::ledger::Vault;
use crate::params::ParameterStore;
use crate::rewards::FeeSink;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Index of a market in the market book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(pub u64);

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One of the two outcomes of a binary market, numbered 1 and 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Outcome {
    One,
    Two,
}

impl Outcome {
    /// Position in per-outcome arrays
    pub fn index(self) -> usize {
        match self {
            Outcome::One => 0,
            Outcome::Two => 1,
        }
    }

    pub fn other(self) -> Outcome {
        match self {
            Outcome::One => Outcome::Two,
            Outcome::Two => Outcome::One,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Outcome::One => 1,
            Outcome::Two => 2,
        }
    }
}

impl TryFrom<u8> for Outcome {
    type Error = MarketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Outcome::One),
            2 => Ok(Outcome::Two),
            other => Err(MarketError::InvalidOutcome(other)),
        }
    }
}

impl From<Outcome> for u8 {
    fn from(outcome: Outcome) -> u8 {
        outcome.number()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// ============================================================================
// CALL CONTEXT
// ============================================================================

/// Collaborators and time visible to a single operation
pub struct Context<'a> {
    /// Current time in unix seconds, read once per call
    pub now: u64,
    pub roles: &'a dyn RoleChecker,
    pub params: &'a dyn ParameterStore,
    pub vault: &'a mut dyn Vault,
    pub fees: &'a mut dyn FeeSink,
    pub events: &'a mut dyn EventSink,
}
