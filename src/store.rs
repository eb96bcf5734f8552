// Snapshot repository
//
// All persistent tables sit behind one trait so the services stay storage
// agnostic and tests can interpose failures. The in-memory store keeps the
// whole world in plain maps, snapshots to disk as pretty JSON on shutdown
// and reloads the file at startup.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Bet, LedgerEntry, Market, Outcome, User};

// ===== ERRORS =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    DuplicateUser(String),
    MissingUser(String),
    Io(String),
    Corrupt(String),
    /// Generic write failure, also what failure-injecting test stores raise.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateUser(name) => write!(f, "user '{}' already exists", name),
            StoreError::MissingUser(name) => write!(f, "user '{}' does not exist", name),
            StoreError::Io(msg) => write!(f, "io error: {}", msg),
            StoreError::Corrupt(msg) => write!(f, "corrupt snapshot: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// ===== REPOSITORY TRAIT =====

/// Storage contract the services and the math pipeline consume.
///
/// Ordering contracts every implementation must honor:
/// `list_bets_for_market` returns (placed_at asc, id asc) and
/// `list_bets_ordered_globally` returns (market_id asc, placed_at asc,
/// id asc). The whole derived pipeline leans on those orders.
pub trait Repository {
    fn get_user(&self, username: &str) -> Option<User>;
    fn insert_user(&mut self, user: User) -> Result<(), StoreError>;
    fn list_users(&self) -> Vec<User>;

    fn allocate_market_id(&mut self) -> u64;
    /// Insert or replace by id.
    fn put_market(&mut self, market: Market) -> Result<(), StoreError>;
    fn get_market(&self, id: u64) -> Option<Market>;
    fn list_markets(&self) -> Vec<Market>;

    fn insert_bet(
        &mut self,
        username: &str,
        market_id: u64,
        amount: i64,
        outcome: Outcome,
        placed_at: DateTime<Utc>,
    ) -> Result<Bet, StoreError>;
    fn list_bets_for_market(&self, market_id: u64) -> Vec<Bet>;
    fn list_bets_ordered_globally(&self) -> Vec<Bet>;
    /// Whether the user has any bet (buy or sale) on the market.
    fn has_bet(&self, username: &str, market_id: u64) -> bool;

    /// Atomically set the user's balance to `entry.balance_after` and append
    /// the entry. This single call is the wallet's atomicity boundary.
    fn apply_wallet_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError>;
    fn list_ledger_entries(&self) -> Vec<LedgerEntry>;
    fn ledger_for_user(&self, username: &str) -> Vec<LedgerEntry>;
}

// ===== IN-MEMORY STORE =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    users: BTreeMap<String, User>,
    markets: BTreeMap<u64, Market>,
    bets: Vec<Bet>,
    ledger: Vec<LedgerEntry>,
    next_market_id: u64,
    next_bet_id: u64,
    next_entry_id: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: BTreeMap::new(),
            markets: BTreeMap::new(),
            bets: Vec::new(),
            ledger: Vec::new(),
            next_market_id: 1,
            next_bet_id: 1,
            next_entry_id: 1,
        }
    }

    /// Write the whole store to `path` as pretty JSON, creating parent
    /// directories as needed.
    pub fn save_to_disk(&self, path: &str) -> Result<(), StoreError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        fs::write(path, json).map_err(|e| StoreError::Io(e.to_string()))?;
        tracing::info!(path, "state snapshot written");
        Ok(())
    }

    pub fn load_from_disk(path: &str) -> Result<Self, StoreError> {
        let json = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

impl Repository for MemoryStore {
    fn get_user(&self, username: &str) -> Option<User> {
        self.users.get(username).cloned()
    }

    fn insert_user(&mut self, user: User) -> Result<(), StoreError> {
        if self.users.contains_key(&user.username) {
            return Err(StoreError::DuplicateUser(user.username));
        }
        self.users.insert(user.username.clone(), user);
        Ok(())
    }

    fn list_users(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    fn allocate_market_id(&mut self) -> u64 {
        let id = self.next_market_id;
        self.next_market_id += 1;
        id
    }

    fn put_market(&mut self, market: Market) -> Result<(), StoreError> {
        self.markets.insert(market.id, market);
        Ok(())
    }

    fn get_market(&self, id: u64) -> Option<Market> {
        self.markets.get(&id).cloned()
    }

    fn list_markets(&self) -> Vec<Market> {
        self.markets.values().cloned().collect()
    }

    fn insert_bet(
        &mut self,
        username: &str,
        market_id: u64,
        amount: i64,
        outcome: Outcome,
        placed_at: DateTime<Utc>,
    ) -> Result<Bet, StoreError> {
        let bet = Bet {
            id: self.next_bet_id,
            username: username.to_string(),
            market_id,
            amount,
            outcome,
            placed_at,
        };
        self.next_bet_id += 1;
        self.bets.push(bet.clone());
        Ok(bet)
    }

    fn list_bets_for_market(&self, market_id: u64) -> Vec<Bet> {
        let mut bets: Vec<Bet> = self
            .bets
            .iter()
            .filter(|b| b.market_id == market_id)
            .cloned()
            .collect();
        bets.sort_by(|a, b| a.placed_at.cmp(&b.placed_at).then(a.id.cmp(&b.id)));
        bets
    }

    fn list_bets_ordered_globally(&self) -> Vec<Bet> {
        let mut bets = self.bets.clone();
        bets.sort_by(|a, b| {
            a.market_id
                .cmp(&b.market_id)
                .then(a.placed_at.cmp(&b.placed_at))
                .then(a.id.cmp(&b.id))
        });
        bets
    }

    fn has_bet(&self, username: &str, market_id: u64) -> bool {
        self.bets
            .iter()
            .any(|b| b.username == username && b.market_id == market_id)
    }

    fn apply_wallet_entry(&mut self, mut entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        let user = self
            .users
            .get_mut(&entry.username)
            .ok_or_else(|| StoreError::MissingUser(entry.username.clone()))?;
        entry.id = self.next_entry_id;
        self.next_entry_id += 1;
        user.account_balance = entry.balance_after;
        self.ledger.push(entry.clone());
        Ok(entry)
    }

    fn list_ledger_entries(&self) -> Vec<LedgerEntry> {
        self.ledger.clone()
    }

    fn ledger_for_user(&self, username: &str) -> Vec<LedgerEntry> {
        self.ledger
            .iter()
            .filter(|e| e.username == username)
            .cloned()
            .collect()
    }
}
