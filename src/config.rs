// Economics and server configuration
//
// Every knob the core consumes lives here, loaded once at startup. Defaults
// mirror the production setup; each field can be overridden through the
// environment (see .env.example). Tests build configs directly instead of
// reading the environment.

use serde::{Deserialize, Serialize};

/// Per-trade fee schedule, all amounts in integer credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BetFees {
    /// Charged once per (user, market) pair, on the user's first bet there.
    pub initial_bet_fee: i64,
    /// Charged on every buy.
    pub buy_shares_fee: i64,
    /// Charged on every completed sale.
    pub sell_shares_fee: i64,
}

impl Default for BetFees {
    fn default() -> Self {
        Self {
            initial_bet_fee: 1,
            buy_shares_fee: 0,
            sell_shares_fee: 0,
        }
    }
}

/// Economic parameters of the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EconomicConfig {
    /// Probability a market opens at.
    pub initial_market_probability: f64,
    /// Virtual subsidization credits damping early probability swings.
    pub initial_market_subsidization: i64,
    /// Virtual YES credits seeded into the probability formula.
    pub initial_market_yes: i64,
    /// Virtual NO credits seeded into the probability formula.
    pub initial_market_no: i64,
    /// Flat fee charged to a market's creator.
    pub create_market_cost: i64,
    pub trader_bonus: i64,
    /// How far below zero a balance may go.
    pub maximum_debt_allowed: i64,
    pub initial_account_balance: i64,
    /// Smallest accepted buy amount.
    pub minimum_bet: i64,
    pub bet_fees: BetFees,
    /// Largest unreturned remainder a sale may leave behind. Zero disables
    /// the check.
    pub max_dust_per_sale: i64,
}

impl Default for EconomicConfig {
    fn default() -> Self {
        Self {
            initial_market_probability: 0.5,
            initial_market_subsidization: 10,
            initial_market_yes: 0,
            initial_market_no: 0,
            create_market_cost: 10,
            trader_bonus: 1,
            maximum_debt_allowed: 500,
            initial_account_balance: 0,
            minimum_bet: 1,
            bet_fees: BetFees::default(),
            max_dust_per_sale: 1,
        }
    }
}

impl EconomicConfig {
    /// Defaults overlaid with any `CREDENCE_*` environment overrides.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            initial_market_probability: env_f64(
                "CREDENCE_INITIAL_PROBABILITY",
                base.initial_market_probability,
            ),
            initial_market_subsidization: env_i64(
                "CREDENCE_SUBSIDIZATION",
                base.initial_market_subsidization,
            ),
            initial_market_yes: env_i64("CREDENCE_INITIAL_YES", base.initial_market_yes),
            initial_market_no: env_i64("CREDENCE_INITIAL_NO", base.initial_market_no),
            create_market_cost: env_i64("CREDENCE_CREATE_MARKET_COST", base.create_market_cost),
            trader_bonus: env_i64("CREDENCE_TRADER_BONUS", base.trader_bonus),
            maximum_debt_allowed: env_i64("CREDENCE_MAX_DEBT", base.maximum_debt_allowed),
            initial_account_balance: env_i64(
                "CREDENCE_INITIAL_BALANCE",
                base.initial_account_balance,
            ),
            minimum_bet: env_i64("CREDENCE_MINIMUM_BET", base.minimum_bet),
            bet_fees: BetFees {
                initial_bet_fee: env_i64("CREDENCE_INITIAL_BET_FEE", base.bet_fees.initial_bet_fee),
                buy_shares_fee: env_i64("CREDENCE_BUY_FEE", base.bet_fees.buy_shares_fee),
                sell_shares_fee: env_i64("CREDENCE_SELL_FEE", base.bet_fees.sell_shares_fee),
            },
            max_dust_per_sale: env_i64("CREDENCE_MAX_DUST", base.max_dust_per_sale),
        }
    }
}

/// Network and persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub port: u16,
    /// Where the JSON snapshot lands on shutdown.
    pub state_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8086,
            state_file: "data/state.json".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            port: std::env::var("CREDENCE_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.port),
            state_file: std::env::var("CREDENCE_STATE_FILE").unwrap_or(base.state_file),
        }
    }
}

fn env_i64(key: &str, fallback: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn env_f64(key: &str, fallback: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EconomicConfig::default();
        assert_eq!(cfg.initial_market_probability, 0.5);
        assert_eq!(cfg.initial_market_subsidization, 10);
        assert_eq!(cfg.initial_market_yes, 0);
        assert_eq!(cfg.initial_market_no, 0);
        assert_eq!(cfg.create_market_cost, 10);
        assert_eq!(cfg.maximum_debt_allowed, 500);
        assert_eq!(cfg.initial_account_balance, 0);
        assert_eq!(cfg.minimum_bet, 1);
        assert_eq!(cfg.bet_fees.initial_bet_fee, 1);
        assert_eq!(cfg.bet_fees.buy_shares_fee, 0);
        assert_eq!(cfg.bet_fees.sell_shares_fee, 0);
        assert_eq!(cfg.max_dust_per_sale, 1);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: EconomicConfig =
            serde_json::from_str(r#"{"maximumDebtAllowed": 100, "betFees": {"initialBetFee": 5}}"#)
                .unwrap();
        assert_eq!(cfg.maximum_debt_allowed, 100);
        assert_eq!(cfg.bet_fees.initial_bet_fee, 5);
        assert_eq!(cfg.bet_fees.buy_shares_fee, 0);
        assert_eq!(cfg.create_market_cost, 10);
    }

    #[test]
    fn server_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8086);
        assert_eq!(cfg.state_file, "data/state.json");
    }
}
