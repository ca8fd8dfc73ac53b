// Key-value parameter storage for market economics and timing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::access::{Role, RoleChecker};
use crate::error::{MarketError, Result};
use crate::market_resolve::{MAX_LIQUIDITY_PARAM, MIN_LIQUIDITY_PARAM};
use crate::units::{parse_tokens, BPS_SCALE, WAD};

// ============================================================================
// PARAMETER KEYS
// ============================================================================

/// Minimum creator bond, in base units
pub const MIN_CREATOR_BOND: &str = "minCreatorBond";
/// Smallest accepted bet, in base units
pub const MINIMUM_BET: &str = "minimumBet";
/// Largest accepted bet, in base units; 0 means unlimited
pub const MAXIMUM_BET: &str = "maximumBet";
/// Dispute window length in seconds
pub const DISPUTE_WINDOW: &str = "disputeWindow";
/// Share of the losing side's stake needed to dispute, in basis points
pub const DISPUTE_THRESHOLD_BPS: &str = "disputeThresholdBps";
/// 0 = a dispute correction finalizes, 1 = it reopens the window
pub const DISPUTE_RESOLUTION_POLICY: &str = "disputeResolutionPolicy";
pub const POLICY_FINALIZE: u128 = 0;
pub const POLICY_REOPEN: u128 = 1;
/// Minimum governance participation to approve a market
pub const APPROVAL_QUORUM: &str = "approvalQuorum";
/// Protocol fee on settled volume, in basis points
pub const PROTOCOL_FEE_BPS: &str = "protocolFeeBps";
/// Creator fee on settled volume, in basis points
pub const CREATOR_FEE_BPS: &str = "creatorFeeBps";
/// Lower bound for the curve liquidity parameter, in base units
pub const MIN_LIQUIDITY: &str = "minLiquidityParam";
/// Upper bound for the curve liquidity parameter, in base units
pub const MAX_LIQUIDITY: &str = "maxLiquidityParam";

/// Every recognized key with its default value
pub const DEFAULTS: &[(&str, u128)] = &[
    (MIN_CREATOR_BOND, WAD / 10),
    (MINIMUM_BET, WAD / 1_000),
    (MAXIMUM_BET, 0),
    (DISPUTE_WINDOW, 86_400),
    (DISPUTE_THRESHOLD_BPS, 4_000),
    (DISPUTE_RESOLUTION_POLICY, 0),
    (APPROVAL_QUORUM, 0),
    (PROTOCOL_FEE_BPS, 250),
    (CREATOR_FEE_BPS, 150),
    (MIN_LIQUIDITY, MIN_LIQUIDITY_PARAM),
    (MAX_LIQUIDITY, MAX_LIQUIDITY_PARAM),
];

/// Keys whose values are token amounts rather than plain integers
const TOKEN_KEYS: &[&str] = &[MIN_CREATOR_BOND, MINIMUM_BET, MAXIMUM_BET, MIN_LIQUIDITY, MAX_LIQUIDITY];

/// Default for `key`, or None if the key is unknown
pub fn default_value(key: &str) -> Option<u128> {
    DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

// ============================================================================
// PARAMETER STORE
// ============================================================================

/// Read-only configuration lookup consumed by the market engine
pub trait ParameterStore {
    fn get_uint(&self, key: &str) -> Option<u128>;

    /// Stored value, falling back to the built-in default (0 for unknown keys)
    fn uint(&self, key: &str) -> u128 {
        self.get_uint(key)
            .or_else(|| default_value(key))
            .unwrap_or(0)
    }
}

/// In-memory parameter storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterStorage {
    values: BTreeMap<String, u128>,
}

impl Default for ParameterStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStorage {
    /// Storage seeded with every default
    pub fn new() -> Self {
        let values = DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        Self { values }
    }

    /// Defaults overridden by `MARKET_PARAM_<KEY>` environment variables
    ///
    /// Token-valued keys accept decimal token amounts ("0.1"); the rest are
    /// plain integers. Malformed values are logged and ignored.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut storage = Self::new();
        for (key, _) in DEFAULTS {
            let var = format!("MARKET_PARAM_{}", key);
            let Ok(raw) = std::env::var(&var) else {
                continue;
            };
            match parse_value(key, &raw).and_then(|v| validate(key, v).map(|_| v)) {
                Ok(value) => {
                    info!("⚙️  {} = {} (from {})", key, value, var);
                    storage.values.insert(key.to_string(), value);
                }
                Err(e) => warn!("⚠️  Ignoring {}: {}", var, e),
            }
        }
        storage
    }

    /// Set a known key without an authorization check
    pub fn set(&mut self, key: &str, value: u128) -> Result<()> {
        if default_value(key).is_none() {
            return Err(MarketError::UnknownParameter(key.to_string()));
        }
        validate(key, value)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Admin-gated update
    pub fn set_uint(&mut self, roles: &dyn RoleChecker, caller: &str, key: &str, value: u128) -> Result<()> {
        roles.require_role(Role::Admin, caller)?;
        self.set(key, value)?;
        info!("⚙️  {} set {} = {}", caller, key, value);
        Ok(())
    }
}

impl ParameterStore for ParameterStorage {
    fn get_uint(&self, key: &str) -> Option<u128> {
        self.values.get(key).copied()
    }
}

/// Range checks for keys with a closed set of meaningful values
fn validate(key: &str, value: u128) -> Result<()> {
    let allowed = match key {
        DISPUTE_RESOLUTION_POLICY => value == POLICY_FINALIZE || value == POLICY_REOPEN,
        DISPUTE_THRESHOLD_BPS => value <= BPS_SCALE as u128,
        _ => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(MarketError::InvalidParameterValue {
            key: key.to_string(),
            value,
        })
    }
}

/// Parse a raw string for `key`, as tokens or as a plain integer
pub fn parse_value(key: &str, raw: &str) -> Result<u128> {
    if TOKEN_KEYS.contains(&key) {
        parse_tokens(raw)
    } else {
        raw.trim()
            .parse::<u128>()
            .map_err(|e| MarketError::InvalidTokenAmount(format!("{}: {}", raw, e)))
    }
}
