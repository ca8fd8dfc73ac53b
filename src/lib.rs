/// Binary Prediction Market
/// LMSR-priced two-outcome markets with a dispute-protected resolution protocol

pub mod market_resolve;
pub mod access;
pub mod app_state;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod params;
pub mod rewards;
pub mod units;

pub use market_resolve::{
    BetReceipt, BetRequest, DisputeOutcome, LmsrCurve, Market, MarketBook, MarketId, MarketParams,
    MarketState, Outcome, Payout, Position, Quote, Resolution,
};
pub use access::{AccessControl, Role, RoleChecker};
pub use app_state::{AppState, SharedState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{Command, CommandOutput, ScriptStep};
pub use config::EngineConfig;
pub use error::{ErrorClass, MarketError, Result, SnapshotError};
pub use events::{EventLog, EventSink, MarketEvent};
pub use ledger::{Ledger, LedgerStats, Transaction, TxType, Vault};
pub use params::{ParameterStorage, ParameterStore};
pub use rewards::{FeeAllocation, FeeSink, RewardDistributor, Settlement};
pub use units::{format_tokens, parse_tokens, WAD};
