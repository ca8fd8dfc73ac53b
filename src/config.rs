// Engine configuration from the environment (.env supported)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_ADMIN: &str = "admin";
pub const DEFAULT_OPERATOR: &str = "operator";
pub const DEFAULT_RESOLVER: &str = "resolver";
pub const DEFAULT_TREASURY: &str = "treasury";
pub const DEFAULT_LOG: &str = "info";

/// Identities and paths the engine starts with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Holds ADMIN_ROLE; may grant the others
    pub admin: String,
    pub operator: String,
    pub resolver: String,
    /// Recipient of the protocol fee share
    pub treasury: String,
    /// Where snapshots are written, if anywhere
    pub snapshot_path: Option<PathBuf>,
    /// tracing level filter: error, warn, info, debug, trace
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin: DEFAULT_ADMIN.to_string(),
            operator: DEFAULT_OPERATOR.to_string(),
            resolver: DEFAULT_RESOLVER.to_string(),
            treasury: DEFAULT_TREASURY.to_string(),
            snapshot_path: None,
            log_level: DEFAULT_LOG.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables
    ///
    /// Reads MARKET_ADMIN, MARKET_OPERATOR, MARKET_RESOLVER, MARKET_TREASURY,
    /// MARKET_SNAPSHOT_PATH and MARKET_LOG; unset or empty variables keep
    /// their defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        Self {
            admin: read("MARKET_ADMIN", defaults.admin),
            operator: read("MARKET_OPERATOR", defaults.operator),
            resolver: read("MARKET_RESOLVER", defaults.resolver),
            treasury: read("MARKET_TREASURY", defaults.treasury),
            snapshot_path: lookup("MARKET_SNAPSHOT_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            log_level: read("MARKET_LOG", defaults.log_level),
        }
    }

    /// Level for the log subscriber: an explicit flag wins over MARKET_LOG
    pub fn effective_log_level<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
        flag.map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(self.log_level.as_str())
    }

    /// Log the configured identities once a subscriber is installed
    pub fn log_summary(&self) {
        info!(
            "⚙️  Roles: admin={} operator={} resolver={} treasury={} (log level {})",
            self.admin, self.operator, self.resolver, self.treasury, self.log_level
        );
    }
}
