/// Credence Prediction Market Engine
/// Exports all modules for use as a library crate
//
// Probability comes from a weighted average of the market's bets (the
// initial subsidy acts as a phantom bet at the starting probability);
// share allocation redistributes each market's volume across bets by
// how early and how right they were. All user-facing balances are
// whole credits backed by an append-only wallet ledger.

pub mod accounts;
pub mod app_state;
pub mod clock;
pub mod config;
pub mod dbpm;
pub mod errors;
pub mod handlers;
pub mod markets;
pub mod metrics;
pub mod models;
pub mod positions;
pub mod resolution;
pub mod store;
pub mod trade;
pub mod valuation;
pub mod wallet;
pub mod wpam;

// Re-export the types binaries and integration tests reach for
pub use app_state::{shared, AppState, SharedState};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BetFees, EconomicConfig, ServerConfig};
pub use errors::MarketError;
pub use models::{
    Bet, EntryKind, LedgerEntry, Market, MarketPosition, Outcome, ProbabilityChange, Resolution,
    User,
};
pub use store::{MemoryStore, Repository, StoreError};
