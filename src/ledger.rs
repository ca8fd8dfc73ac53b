/// Token ledger backing market escrow
///
/// Tracks participant balances, per-market escrow and an append-only
/// transaction log:
/// - Deposits credit a participant from outside the engine
/// - Escrow moves funds from a participant into a market
/// - Release moves funds from a market back out to a participant
///
/// Every transaction id is the SHA-256 of its contents and sequence number,
/// so the log can be replayed and checked.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{MarketError, Result};
use crate::market_resolve::MarketId;
use crate::units::format_tokens;

// ============================================================================
// VAULT INTERFACE
// ============================================================================

/// Custody of market funds, as seen by the market engine
pub trait Vault {
    /// Move `amount` from `from` into the escrow of `market`
    fn escrow(&mut self, from: &str, market: MarketId, amount: u128) -> Result<()>;

    /// Move `amount` out of the escrow of `market` to `to`
    fn release(&mut self, market: MarketId, to: &str, amount: u128) -> Result<()>;

    /// Funds currently held for `market`
    fn escrowed(&self, market: MarketId) -> u128;
}

// ============================================================================
// CORE TYPES
// ============================================================================

/// Transaction types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TxType {
    Deposit,
    Escrow,
    Release,
}

/// A single ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub sequence: u64,
    pub tx_type: TxType,
    pub account: String,
    pub market_id: Option<MarketId>,
    pub amount: u128,
    pub description: String,
}

impl Transaction {
    fn new(sequence: u64, tx_type: TxType, account: &str, market_id: Option<MarketId>, amount: u128) -> Self {
        let description = match (tx_type, market_id) {
            (TxType::Deposit, _) => format!("Deposit {} to {}", format_tokens(amount), account),
            (TxType::Escrow, Some(m)) => format!("{} escrowed {} into market {}", account, format_tokens(amount), m),
            (TxType::Release, Some(m)) => format!("Market {} released {} to {}", m, format_tokens(amount), account),
            (_, None) => format!("{:?} {} for {}", tx_type, format_tokens(amount), account),
        };

        let payload = format!(
            "{}:{:?}:{}:{}:{}",
            sequence,
            tx_type,
            account,
            market_id.map(|m| m.0.to_string()).unwrap_or_default(),
            amount
        );

        Self {
            id: hash(payload.as_bytes()),
            sequence,
            tx_type,
            account: account.to_string(),
            market_id,
            amount,
            description,
        }
    }
}

/// Ledger summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerStats {
    pub accounts: usize,
    pub transactions: usize,
    pub total_balances: u128,
    pub total_escrowed: u128,
}

// ============================================================================
// LEDGER
// ============================================================================

/// In-memory ledger of balances, market escrow and transactions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Account balances (account -> base units)
    pub balances: BTreeMap<String, u128>,
    /// Escrow per market
    pub escrows: BTreeMap<MarketId, u128>,
    /// All transactions, oldest first
    pub transactions: Vec<Transaction>,
    /// Next transaction sequence number
    pub sequence: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: &str) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Credit an account from outside the engine
    pub fn deposit(&mut self, account: &str, amount: u128) -> Result<Transaction> {
        if amount == 0 {
            return Err(MarketError::InvalidAmount);
        }
        self.credit(account, amount)?;
        Ok(self.record(TxType::Deposit, account, None, amount))
    }

    fn credit(&mut self, account: &str, amount: u128) -> Result<()> {
        let balance = self.balances.entry(account.to_string()).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(MarketError::MathOverflow)?;
        Ok(())
    }

    fn record(&mut self, tx_type: TxType, account: &str, market: Option<MarketId>, amount: u128) -> Transaction {
        let tx = Transaction::new(self.sequence, tx_type, account, market, amount);
        self.sequence += 1;
        debug!("📒 {} [{}]", tx.description, &tx.id[..12]);
        self.transactions.push(tx.clone());
        tx
    }

    /// Transactions touching `account`, oldest first
    pub fn transactions_for(&self, account: &str) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.account == account)
            .collect()
    }

    /// Transactions touching `market`, oldest first
    pub fn market_transactions(&self, market: MarketId) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.market_id == Some(market))
            .collect()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            accounts: self.balances.len(),
            transactions: self.transactions.len(),
            total_balances: self.balances.values().sum(),
            total_escrowed: self.escrows.values().sum(),
        }
    }
}

impl Vault for Ledger {
    fn escrow(&mut self, from: &str, market: MarketId, amount: u128) -> Result<()> {
        let available = self.balance(from);
        if available < amount {
            return Err(MarketError::InsufficientFunds {
                account: from.to_string(),
                needed: amount,
                available,
            });
        }
        let held = self.escrowed(market);
        let new_held = held.checked_add(amount).ok_or(MarketError::MathOverflow)?;

        self.balances.insert(from.to_string(), available - amount);
        self.escrows.insert(market, new_held);
        self.record(TxType::Escrow, from, Some(market), amount);
        Ok(())
    }

    fn release(&mut self, market: MarketId, to: &str, amount: u128) -> Result<()> {
        let held = self.escrowed(market);
        if held < amount {
            return Err(MarketError::EscrowShortfall {
                market,
                needed: amount,
                available: held,
            });
        }
        self.credit(to, amount)?;
        self.escrows.insert(market, held - amount);
        self.record(TxType::Release, to, Some(market), amount);
        Ok(())
    }

    fn escrowed(&self, market: MarketId) -> u128 {
        self.escrows.get(&market).copied().unwrap_or(0)
    }
}

/// Hex-encoded SHA-256
pub fn hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::WAD;

    #[test]
    fn test_escrow_and_release() {
        let mut ledger = Ledger::new();
        let market = MarketId(0);
        ledger.deposit("ALICE", 1000 * WAD).unwrap();

        ledger.escrow("ALICE", market, 100 * WAD).unwrap();
        assert_eq!(ledger.balance("ALICE"), 900 * WAD);
        assert_eq!(ledger.escrowed(market), 100 * WAD);

        ledger.release(market, "BOB", 40 * WAD).unwrap();
        assert_eq!(ledger.balance("BOB"), 40 * WAD);
        assert_eq!(ledger.escrowed(market), 60 * WAD);

        let stats = ledger.stats();
        assert_eq!(stats.accounts, 2);
        assert_eq!(stats.transactions, 3);
        assert_eq!(stats.total_balances + stats.total_escrowed, 1000 * WAD);
        assert_eq!(ledger.market_transactions(market).len(), 2);
    }

    #[test]
    fn test_failures_leave_balances_untouched() {
        let mut ledger = Ledger::new();
        let market = MarketId(3);
        ledger.deposit("ALICE", 5 * WAD).unwrap();

        let err = ledger.escrow("ALICE", market, 6 * WAD).unwrap_err();
        assert!(matches!(err, MarketError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance("ALICE"), 5 * WAD);

        let err = ledger.release(market, "ALICE", 1).unwrap_err();
        assert!(matches!(err, MarketError::EscrowShortfall { .. }));
        assert_eq!(ledger.transactions.len(), 1);
    }

    #[test]
    fn test_transaction_ids_are_unique_hashes() {
        let mut ledger = Ledger::new();
        let a = ledger.deposit("ALICE", WAD).unwrap();
        let b = ledger.deposit("ALICE", WAD).unwrap();
        assert_eq!(a.id.len(), 64);
        assert_ne!(a.id, b.id);
        assert_eq!(ledger.transactions_for("ALICE").len(), 2);
    }
}
