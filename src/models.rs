// Domain model for the credence prediction market
//
// Value types only. The math pipeline and the services operate on these;
// nothing in here touches storage or HTTP.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::MarketError;

// ===== OUTCOME =====

/// Side of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// Parse a wire outcome. Trimmed and case-insensitive; anything that is
    /// not YES or NO is rejected.
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        match raw.trim().to_uppercase().as_str() {
            "YES" => Ok(Outcome::Yes),
            "NO" => Ok(Outcome::No),
            _ => Err(MarketError::InvalidOutcome(raw.trim().to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== RESOLUTION =====

/// Resolution verdict of a market. `Unresolved` serializes to the empty
/// string so payloads and snapshots show resolutionResult: "" until a
/// verdict lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "")]
    Unresolved,
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Resolution {
    /// Parse a verdict from the wire. PROB is recognized but deliberately
    /// rejected; any other unknown string is rejected the same way.
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        match raw.trim().to_uppercase().as_str() {
            "YES" => Ok(Resolution::Yes),
            "NO" => Ok(Resolution::No),
            "N/A" => Ok(Resolution::NotApplicable),
            other => Err(MarketError::UnsupportedResolution(other.to_string())),
        }
    }

    /// The side that gets paid, when there is one.
    pub fn winning_outcome(&self) -> Option<Outcome> {
        match self {
            Resolution::Yes => Some(Outcome::Yes),
            Resolution::No => Some(Outcome::No),
            Resolution::Unresolved | Resolution::NotApplicable => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Unresolved => "",
            Resolution::Yes => "YES",
            Resolution::No => "NO",
            Resolution::NotApplicable => "N/A",
        }
    }
}

// ===== USER =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub account_balance: i64,
    pub created_at: DateTime<Utc>,
}

/// Username rules: lowercase ASCII alphanumeric, 3 to 30 characters.
pub fn validate_username(name: &str) -> Result<(), MarketError> {
    let length_ok = (3..=30).contains(&name.len());
    let charset_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if length_ok && charset_ok {
        Ok(())
    } else {
        Err(MarketError::InvalidRequest(format!(
            "username '{}' must be 3-30 lowercase alphanumeric characters",
            name
        )))
    }
}

// ===== MARKET =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: u64,
    pub creator_username: String,
    pub question_title: String,
    #[serde(default)]
    pub description: String,
    /// Trading deadline. Bets are accepted strictly before this instant.
    pub resolution_date_time: DateTime<Utc>,
    pub is_resolved: bool,
    pub resolution_result: Resolution,
    pub created_at: DateTime<Utc>,
}

impl Market {
    /// Trading gate: open while unresolved and before the deadline.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        !self.is_resolved && now < self.resolution_date_time
    }

    pub fn ensure_open(&self, now: DateTime<Utc>) -> Result<(), MarketError> {
        if self.is_open(now) {
            Ok(())
        } else {
            Err(MarketError::MarketClosed(self.id))
        }
    }
}

// ===== BET =====

/// One trade against a market. Positive amounts are buys in credits;
/// negative amounts are sales in shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: u64,
    pub username: String,
    pub market_id: u64,
    pub amount: i64,
    pub outcome: Outcome,
    pub placed_at: DateTime<Utc>,
}

impl Bet {
    pub fn is_buy(&self) -> bool {
        self.amount > 0
    }

    pub fn is_sale(&self) -> bool {
        self.amount < 0
    }
}

// ===== WALLET LEDGER =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    Buy,
    Sale,
    Win,
    Refund,
    Fee,
}

/// One balance mutation. `amount` is signed (debits negative) and
/// `balance_after` chains, so a user's ledger replays to their balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: u64,
    pub username: String,
    pub amount: i64,
    pub kind: EntryKind,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

// ===== DERIVED SNAPSHOTS =====

/// One point of a market's probability timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityChange {
    pub probability: f64,
    pub timestamp: DateTime<Utc>,
}

/// A user's computed standing in one market. Derived on demand, never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPosition {
    pub username: String,
    #[serde(rename = "yesSharesOwned")]
    pub yes_shares: i64,
    #[serde(rename = "noSharesOwned")]
    pub no_shares: i64,
    pub value: i64,
    pub total_spent: i64,
    pub total_spent_in_play: i64,
    pub is_resolved: bool,
    pub resolution_result: Resolution,
}
