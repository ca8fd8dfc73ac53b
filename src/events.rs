//! Lifecycle notifications
//!
//! The engine emits one `MarketEvent` per successful state change. Failed
//! operations emit nothing. `EventLog` keeps them in a SHA-256 hash chain
//! so downstream indexers can detect gaps or tampering.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ledger::hash;
use crate::market_resolve::{MarketId, Outcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketEvent {
    MarketProposed {
        market: MarketId,
        creator: String,
        question: String,
        bond: u128,
        liquidity_param: u128,
        subsidy: u128,
        resolution_deadline: u64,
    },
    MarketApproved {
        market: MarketId,
        approver: String,
        participation: u128,
    },
    MarketRejected {
        market: MarketId,
        rejecter: String,
        reason: String,
        refunded: u128,
    },
    MarketActivated {
        market: MarketId,
        activator: String,
    },
    BetPlaced {
        market: MarketId,
        bettor: String,
        outcome: Outcome,
        amount: u128,
        shares: u128,
        price_bps: u32,
    },
    OutcomeProposed {
        market: MarketId,
        resolver: String,
        outcome: Outcome,
        justification: String,
        dispute_window_end: u64,
    },
    DisputeSignaled {
        market: MarketId,
        disputer: String,
        weight: u128,
        total_weight: u128,
        threshold: u128,
        disputed: bool,
    },
    DisputeResolved {
        market: MarketId,
        admin: String,
        outcome: Outcome,
        justification: String,
        finalized: bool,
    },
    MarketFinalized {
        market: MarketId,
        outcome: Outcome,
        overridden: bool,
    },
    WinningsClaimed {
        market: MarketId,
        claimant: String,
        amount: u128,
    },
    FeesCollected {
        market: MarketId,
        settled_volume: u128,
        total_fees: u128,
    },
    CreatorBondRefunded {
        market: MarketId,
        creator: String,
        amount: u128,
    },
}

impl MarketEvent {
    pub fn market(&self) -> MarketId {
        match self {
            MarketEvent::MarketProposed { market, .. }
            | MarketEvent::MarketApproved { market, .. }
            | MarketEvent::MarketRejected { market, .. }
            | MarketEvent::MarketActivated { market, .. }
            | MarketEvent::BetPlaced { market, .. }
            | MarketEvent::OutcomeProposed { market, .. }
            | MarketEvent::DisputeSignaled { market, .. }
            | MarketEvent::DisputeResolved { market, .. }
            | MarketEvent::MarketFinalized { market, .. }
            | MarketEvent::WinningsClaimed { market, .. }
            | MarketEvent::FeesCollected { market, .. }
            | MarketEvent::CreatorBondRefunded { market, .. } => *market,
        }
    }

    /// Short snake_case name, as used as the serialized variant key
    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::MarketProposed { .. } => "market_proposed",
            MarketEvent::MarketApproved { .. } => "market_approved",
            MarketEvent::MarketRejected { .. } => "market_rejected",
            MarketEvent::MarketActivated { .. } => "market_activated",
            MarketEvent::BetPlaced { .. } => "bet_placed",
            MarketEvent::OutcomeProposed { .. } => "outcome_proposed",
            MarketEvent::DisputeSignaled { .. } => "dispute_signaled",
            MarketEvent::DisputeResolved { .. } => "dispute_resolved",
            MarketEvent::MarketFinalized { .. } => "market_finalized",
            MarketEvent::WinningsClaimed { .. } => "winnings_claimed",
            MarketEvent::FeesCollected { .. } => "fees_collected",
            MarketEvent::CreatorBondRefunded { .. } => "creator_bond_refunded",
        }
    }
}

/// Receiver of lifecycle notifications
pub trait EventSink {
    fn emit(&mut self, timestamp: u64, event: MarketEvent);
}

/// A logged event with its position in the hash chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub timestamp: u64,
    pub prev_hash: String,
    pub hash: String,
    pub event: MarketEvent,
}

/// Hash of the empty chain
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Append-only, hash-chained event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    pub records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> &str {
        self.records
            .last()
            .map(|r| r.hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    fn link(prev_hash: &str, sequence: u64, timestamp: u64, event: &MarketEvent) -> String {
        let body = serde_json::to_string(event).unwrap_or_default();
        hash(format!("{}:{}:{}:{}", prev_hash, sequence, timestamp, body).as_bytes())
    }

    /// Recompute every link; false if any record was altered or reordered
    pub fn verify(&self) -> bool {
        let mut prev = GENESIS_HASH.to_string();
        for (i, record) in self.records.iter().enumerate() {
            if record.sequence != i as u64 || record.prev_hash != prev {
                return false;
            }
            if Self::link(&prev, record.sequence, record.timestamp, &record.event) != record.hash {
                return false;
            }
            prev = record.hash.clone();
        }
        true
    }

    /// Events for one market, oldest first
    pub fn for_market(&self, market: MarketId) -> impl Iterator<Item = &MarketEvent> {
        self.records
            .iter()
            .map(|r| &r.event)
            .filter(move |e| e.market() == market)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, timestamp: u64, event: MarketEvent) {
        let sequence = self.records.len() as u64;
        let prev_hash = self.head().to_string();
        let hash = Self::link(&prev_hash, sequence, timestamp, &event);

        info!("📣 [{}] market {} {}", sequence, event.market(), event.name());

        self.records.push(EventRecord {
            sequence,
            timestamp,
            prev_hash,
            hash,
            event,
        });
    }
}
