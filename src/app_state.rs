// Application state management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::access::{AccessControl, Role, RoleChecker};
use crate::clock::Clock;
use crate::commands::{Command, CommandOutput};
use crate::config::EngineConfig;
use crate::error::{Result, SnapshotError};
use crate::events::EventLog;
use crate::ledger::Ledger;
use crate::market_resolve::{
    BetReceipt, BetRequest, Context, DisputeOutcome, Market, MarketBook, MarketId, MarketParams,
    Outcome, Payout,
};
use crate::params::{parse_value, ParameterStorage, CREATOR_FEE_BPS, PROTOCOL_FEE_BPS};
use crate::rewards::RewardDistributor;
use crate::units::parse_tokens;

pub type SharedState = Arc<Mutex<AppState>>;

/// Market engine wired to its default collaborators
pub struct AppState {
    pub markets: MarketBook,
    pub ledger: Ledger,
    pub access: AccessControl,
    pub params: ParameterStorage,
    pub rewards: RewardDistributor,
    pub events: EventLog,
    clock: Box<dyn Clock + Send + Sync>,
}

impl AppState {
    pub fn new(config: &EngineConfig, params: ParameterStorage, clock: impl Clock + Send + Sync + 'static) -> Self {
        info!("🚀 Initializing binary prediction market engine...");

        let rewards = RewardDistributor::from_params(&config.treasury, &params);
        Self {
            markets: MarketBook::new(),
            ledger: Ledger::new(),
            access: AccessControl::with_roles(&config.admin, &config.operator, &config.resolver),
            params,
            rewards,
            events: EventLog::new(),
            clock: Box::new(clock),
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn market(&self, id: MarketId) -> Result<&Market> {
        self.markets.get(id)
    }

    /// Run `op` against the market book with every collaborator borrowed
    fn with_context<T>(&mut self, op: impl FnOnce(&mut MarketBook, &mut Context<'_>) -> Result<T>) -> Result<T> {
        let mut ctx = Context {
            now: self.clock.now(),
            roles: &self.access,
            params: &self.params,
            vault: &mut self.ledger,
            fees: &mut self.rewards,
            events: &mut self.events,
        };
        op(&mut self.markets, &mut ctx)
    }

    // ===== MARKET =====

    pub fn create_market(&mut self, creator: &str, params: MarketParams) -> Result<MarketId> {
        self.with_context(|book, ctx| book.create_market(ctx, creator, params))
    }

    pub fn approve_market(&mut self, caller: &str, id: MarketId, participation: u128) -> Result<()> {
        self.with_context(|book, ctx| book.approve_market(ctx, id, caller, participation))
    }

    pub fn reject_market(&mut self, caller: &str, id: MarketId, reason: &str) -> Result<u128> {
        self.with_context(|book, ctx| book.reject_market(ctx, id, caller, reason))
    }

    pub fn activate_market(&mut self, caller: &str, id: MarketId) -> Result<()> {
        self.with_context(|book, ctx| book.activate_market(ctx, id, caller))
    }

    pub fn place_bet(&mut self, caller: &str, id: MarketId, request: BetRequest) -> Result<BetReceipt> {
        self.with_context(|book, ctx| book.place_bet(ctx, id, caller, request))
    }

    pub fn calculate_payout(&self, id: MarketId, participant: &str) -> Result<Payout> {
        self.markets.calculate_payout(id, participant)
    }

    pub fn claim_winnings(&mut self, caller: &str, id: MarketId) -> Result<u128> {
        self.with_context(|book, ctx| book.claim_winnings(ctx, id, caller))
    }

    pub fn collect_fees(&mut self, id: MarketId) -> Result<u128> {
        self.with_context(|book, ctx| book.collect_fees(ctx, id))
    }

    pub fn refund_creator_bond(&mut self, id: MarketId) -> Result<u128> {
        self.with_context(|book, ctx| book.refund_creator_bond(ctx, id))
    }

    /// Current odds in basis points
    pub fn odds(&self, id: MarketId) -> Result<[u32; 2]> {
        self.markets.odds(id)
    }

    // ===== RESOLUTION =====

    pub fn propose_outcome(&mut self, caller: &str, id: MarketId, outcome: Outcome, justification: &str) -> Result<u64> {
        self.with_context(|book, ctx| book.propose_outcome(ctx, id, caller, outcome, justification))
    }

    pub fn signal_dispute(&mut self, caller: &str, id: MarketId) -> Result<bool> {
        self.with_context(|book, ctx| book.signal_dispute(ctx, id, caller))
    }

    pub fn resolve_dispute(&mut self, caller: &str, id: MarketId, outcome: Outcome, justification: &str) -> Result<DisputeOutcome> {
        self.with_context(|book, ctx| book.resolve_dispute(ctx, id, caller, outcome, justification))
    }

    pub fn finalize(&mut self, id: MarketId) -> Result<Outcome> {
        self.with_context(|book, ctx| book.finalize(ctx, id))
    }

    pub fn admin_finalize(&mut self, caller: &str, id: MarketId, outcome: Outcome, justification: &str) -> Result<()> {
        self.with_context(|book, ctx| book.admin_finalize(ctx, id, caller, outcome, justification))
    }

    // ===== ADMINISTRATION =====

    /// Admin-gated parameter update; fee rates take effect for later settlements
    pub fn set_param(&mut self, caller: &str, key: &str, value: u128) -> Result<()> {
        self.params.set_uint(&self.access, caller, key, value)?;
        if key == PROTOCOL_FEE_BPS || key == CREATOR_FEE_BPS {
            self.rewards.refresh_rates(&self.params);
        }
        Ok(())
    }

    /// Dispatch a serialized command on behalf of `caller`
    pub fn execute(&mut self, caller: &str, command: Command) -> Result<CommandOutput> {
        debug!("▶️  {} by {}", command.name(), caller);

        let output = match command {
            Command::Deposit { account, amount } => {
                self.access.require_role(Role::Admin, caller)?;
                let amount = parse_tokens(&amount)?;
                self.ledger.deposit(&account, amount)?;
                CommandOutput::Amount(amount)
            }
            Command::GrantRole { role, identity } => {
                self.access.grant_role(caller, role, &identity)?;
                CommandOutput::Done
            }
            Command::SetParam { key, value } => {
                let value = parse_value(&key, &value)?;
                self.set_param(caller, &key, value)?;
                CommandOutput::Done
            }
            Command::CreateMarket {
                question,
                outcomes,
                category,
                resolution_deadline,
                liquidity,
                bond,
            } => {
                let params = MarketParams {
                    question,
                    outcomes,
                    category,
                    resolution_deadline,
                    liquidity_param: parse_tokens(&liquidity)?,
                    bond: parse_tokens(&bond)?,
                };
                CommandOutput::MarketCreated(self.create_market(caller, params)?)
            }
            Command::ApproveMarket { market, participation } => {
                self.approve_market(caller, market, participation)?;
                CommandOutput::Done
            }
            Command::RejectMarket { market, reason } => {
                CommandOutput::Amount(self.reject_market(caller, market, &reason)?)
            }
            Command::ActivateMarket { market } => {
                self.activate_market(caller, market)?;
                CommandOutput::Done
            }
            Command::PlaceBet {
                market,
                outcome,
                amount,
                min_expected_odds,
                deadline,
            } => {
                let request = BetRequest {
                    outcome,
                    amount: parse_tokens(&amount)?,
                    min_expected_odds,
                    deadline,
                };
                CommandOutput::Bet(self.place_bet(caller, market, request)?)
            }
            Command::ProposeOutcome {
                market,
                outcome,
                justification,
            } => CommandOutput::WindowEnd(self.propose_outcome(caller, market, outcome, &justification)?),
            Command::SignalDispute { market } => {
                CommandOutput::Disputed(self.signal_dispute(caller, market)?)
            }
            Command::ResolveDispute {
                market,
                outcome,
                justification,
            } => CommandOutput::DisputeResolved(self.resolve_dispute(caller, market, outcome, &justification)?),
            Command::Finalize { market } => CommandOutput::Finalized(self.finalize(market)?),
            Command::AdminFinalize {
                market,
                outcome,
                justification,
            } => {
                self.admin_finalize(caller, market, outcome, &justification)?;
                CommandOutput::Finalized(outcome)
            }
            Command::ClaimWinnings { market } => CommandOutput::Amount(self.claim_winnings(caller, market)?),
            Command::CollectFees { market } => CommandOutput::Amount(self.collect_fees(market)?),
            Command::RefundCreatorBond { market } => {
                CommandOutput::Amount(self.refund_creator_bond(market)?)
            }
        };
        Ok(output)
    }

    // ===== PERSISTENCE =====

    pub fn save_to_disk(&self, path: impl AsRef<Path>) -> std::result::Result<(), SnapshotError> {
        #[derive(Serialize)]
        struct PersistedState<'a> {
            saved_at: u64,
            markets: &'a MarketBook,
            ledger: &'a Ledger,
            access: &'a AccessControl,
            params: &'a ParameterStorage,
            rewards: &'a RewardDistributor,
            events: &'a EventLog,
        }

        let state = PersistedState {
            saved_at: self.now(),
            markets: &self.markets,
            ledger: &self.ledger,
            access: &self.access,
            params: &self.params,
            rewards: &self.rewards,
            events: &self.events,
        };

        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&state)?)?;

        info!("💾 State saved to {}", path.display());
        Ok(())
    }

    /// Restore a snapshot written by `save_to_disk`, driven by `clock`
    pub fn load_from_disk(path: impl AsRef<Path>, clock: impl Clock + Send + Sync + 'static) -> std::result::Result<Self, SnapshotError> {
        #[derive(Deserialize)]
        struct PersistedState {
            saved_at: u64,
            markets: MarketBook,
            ledger: Ledger,
            access: AccessControl,
            params: ParameterStorage,
            rewards: RewardDistributor,
            events: EventLog,
        }

        let path = path.as_ref();
        let state: PersistedState = serde_json::from_str(&fs::read_to_string(path)?)?;

        if !state.events.verify() {
            warn!("⚠️  Event log in {} fails hash verification", path.display());
        }
        info!(
            "✅ Loaded {} markets from {} (saved at {})",
            state.markets.len(),
            path.display(),
            state.saved_at
        );

        Ok(Self {
            markets: state.markets,
            ledger: state.ledger,
            access: state.access,
            params: state.params,
            rewards: state.rewards,
            events: state.events,
            clock: Box::new(clock),
        })
    }
}
