// Error taxonomy for the economics core
//
// One enum, one stable machine-readable kind per variant. The HTTP layer
// maps kinds to status codes; nothing in here depends on axum, so the
// services and math stay usable from plain test code.

use std::fmt;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Outcome string was not YES or NO.
    InvalidOutcome(String),
    /// Amount failed validation (below minimum, non-positive, below the
    /// per-share value, ...).
    InvalidAmount(String),
    /// Request-shape validation outside the core taxonomy (bad username,
    /// blank title, past deadline, taken name).
    InvalidRequest(String),
    MarketNotFound(u64),
    UserNotFound(String),
    /// Market is resolved or past its deadline.
    MarketClosed(u64),
    /// Debit would push the balance through the debt floor.
    InsufficientBalance {
        username: String,
        required: i64,
        available: i64,
    },
    /// Seller holds nothing to sell.
    NoPosition(String),
    /// Sale would strand more dust than the configured cap.
    DustCapExceeded { cap: i64, requested: i64 },
    /// Resolution verdict the engine does not support (PROB, garbage).
    UnsupportedResolution(String),
    Storage(String),
}

impl MarketError {
    /// Stable machine-readable discriminator carried on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::InvalidOutcome(_) => "InvalidOutcome",
            MarketError::InvalidAmount(_) => "InvalidAmount",
            MarketError::InvalidRequest(_) => "InvalidRequest",
            MarketError::MarketNotFound(_) => "MarketNotFound",
            MarketError::UserNotFound(_) => "UserNotFound",
            MarketError::MarketClosed(_) => "MarketClosed",
            MarketError::InsufficientBalance { .. } => "InsufficientBalance",
            MarketError::NoPosition(_) => "NoPosition",
            MarketError::DustCapExceeded { .. } => "DustCapExceeded",
            MarketError::UnsupportedResolution(_) => "UnsupportedResolution",
            MarketError::Storage(_) => "Storage",
        }
    }

    /// HTTP status the wire layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            MarketError::InvalidOutcome(_)
            | MarketError::InvalidAmount(_)
            | MarketError::InvalidRequest(_)
            | MarketError::UnsupportedResolution(_) => 400,
            MarketError::MarketNotFound(_) | MarketError::UserNotFound(_) => 404,
            MarketError::MarketClosed(_) => 409,
            MarketError::InsufficientBalance { .. }
            | MarketError::NoPosition(_)
            | MarketError::DustCapExceeded { .. } => 422,
            MarketError::Storage(_) => 500,
        }
    }
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketError::InvalidOutcome(raw) => {
                write!(f, "invalid outcome '{}', expected YES or NO", raw)
            }
            MarketError::InvalidAmount(msg) => write!(f, "invalid amount: {}", msg),
            MarketError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            MarketError::MarketNotFound(id) => write!(f, "market {} not found", id),
            MarketError::UserNotFound(username) => write!(f, "user '{}' not found", username),
            MarketError::MarketClosed(id) => {
                write!(f, "market {} is closed to trading", id)
            }
            MarketError::InsufficientBalance {
                username,
                required,
                available,
            } => write!(
                f,
                "user '{}' cannot cover {} credits ({} available before the debt floor)",
                username, required, available
            ),
            MarketError::NoPosition(msg) => write!(f, "no position: {}", msg),
            MarketError::DustCapExceeded { cap, requested } => write!(
                f,
                "sale would leave {} credits of dust, cap is {}",
                requested, cap
            ),
            MarketError::UnsupportedResolution(raw) => {
                write!(f, "unsupported resolution '{}'", raw)
            }
            MarketError::Storage(msg) => write!(f, "storage failure: {}", msg),
        }
    }
}

impl std::error::Error for MarketError {}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        MarketError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(MarketError::MarketNotFound(7).kind(), "MarketNotFound");
        assert_eq!(
            MarketError::DustCapExceeded {
                cap: 1,
                requested: 3
            }
            .kind(),
            "DustCapExceeded"
        );
    }

    #[test]
    fn statuses_follow_the_wire_contract() {
        assert_eq!(MarketError::InvalidOutcome("MAYBE".into()).http_status(), 400);
        assert_eq!(MarketError::UserNotFound("bob".into()).http_status(), 404);
        assert_eq!(MarketError::MarketClosed(1).http_status(), 409);
        assert_eq!(
            MarketError::InsufficientBalance {
                username: "bob".into(),
                required: 10,
                available: 4,
            }
            .http_status(),
            422
        );
        assert_eq!(MarketError::Storage("disk gone".into()).http_status(), 500);
    }

    #[test]
    fn dust_cap_message_names_both_numbers() {
        let msg = MarketError::DustCapExceeded {
            cap: 2,
            requested: 3,
        }
        .to_string();
        assert!(msg.contains('2') && msg.contains('3'));
    }
}
