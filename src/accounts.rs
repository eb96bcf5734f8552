// Account signup and wallet reads
//
// New accounts start at the configured initial balance with no ledger
// entry: account creation is not a wallet mutation, and the books verifier
// assumes the default of zero.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EconomicConfig;
use crate::errors::MarketError;
use crate::models::{validate_username, LedgerEntry, MarketPosition, User};
use crate::positions;
use crate::store::{Repository, StoreError};

pub fn create_user<R: Repository>(
    repo: &mut R,
    cfg: &EconomicConfig,
    now: DateTime<Utc>,
    username: &str,
) -> Result<User, MarketError> {
    validate_username(username)?;
    let user = User {
        username: username.to_string(),
        account_balance: cfg.initial_account_balance,
        created_at: now,
    };
    repo.insert_user(user.clone()).map_err(|err| match err {
        StoreError::DuplicateUser(name) => {
            MarketError::InvalidRequest(format!("username '{}' is taken", name))
        }
        other => MarketError::from(other),
    })?;
    tracing::info!(user = %username, "account created");
    Ok(user)
}

pub fn get_user<R: Repository>(repo: &R, username: &str) -> Result<User, MarketError> {
    repo.get_user(username)
        .ok_or_else(|| MarketError::UserNotFound(username.to_string()))
}

pub fn user_ledger<R: Repository>(
    repo: &R,
    username: &str,
) -> Result<Vec<LedgerEntry>, MarketError> {
    get_user(repo, username)?;
    Ok(repo.ledger_for_user(username))
}

/// One market the user holds (or held) something in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioEntry {
    pub market_id: u64,
    pub question_title: String,
    #[serde(flatten)]
    pub position: MarketPosition,
}

/// The user's position in every market they ever bet on.
pub fn user_portfolio<R: Repository>(
    repo: &R,
    cfg: &EconomicConfig,
    username: &str,
) -> Result<Vec<PortfolioEntry>, MarketError> {
    get_user(repo, username)?;
    let mut entries = Vec::new();
    for market in repo.list_markets() {
        let bets = repo.list_bets_for_market(market.id);
        if let Some(position) = positions::positions_for_bets(cfg, &market, &bets)
            .into_iter()
            .find(|p| p.username == username)
        {
            entries.push(PortfolioEntry {
                market_id: market.id,
                question_title: market.question_title.clone(),
                position,
            });
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn signup_starts_at_the_initial_balance_with_an_empty_ledger() {
        let mut repo = MemoryStore::new();
        let cfg = EconomicConfig::default();
        let user = create_user(&mut repo, &cfg, t0(), "alice").unwrap();
        assert_eq!(user.account_balance, 0);
        assert!(user_ledger(&repo, "alice").unwrap().is_empty());
    }

    #[test]
    fn taken_and_malformed_names_are_refused() {
        let mut repo = MemoryStore::new();
        let cfg = EconomicConfig::default();
        create_user(&mut repo, &cfg, t0(), "alice").unwrap();
        assert!(matches!(
            create_user(&mut repo, &cfg, t0(), "alice"),
            Err(MarketError::InvalidRequest(_))
        ));
        assert!(matches!(
            create_user(&mut repo, &cfg, t0(), "Alice!"),
            Err(MarketError::InvalidRequest(_))
        ));
    }

    #[test]
    fn ledger_and_portfolio_require_an_existing_user() {
        let repo = MemoryStore::new();
        let cfg = EconomicConfig::default();
        assert!(matches!(
            user_ledger(&repo, "ghost"),
            Err(MarketError::UserNotFound(_))
        ));
        assert!(matches!(
            user_portfolio(&repo, &cfg, "ghost"),
            Err(MarketError::UserNotFound(_))
        ));
    }

    #[test]
    fn portfolio_collects_positions_across_markets() {
        let mut repo = MemoryStore::new();
        let cfg = EconomicConfig {
            initial_market_subsidization: 1,
            ..EconomicConfig::default()
        };
        create_user(&mut repo, &cfg, t0(), "creator").unwrap();
        create_user(&mut repo, &cfg, t0(), "alice").unwrap();

        let m1 = crate::markets::create_market(
            &mut repo,
            &cfg,
            t0(),
            "creator",
            "first",
            "",
            t0() + chrono::Duration::days(7),
        )
        .unwrap();
        let m2 = crate::markets::create_market(
            &mut repo,
            &cfg,
            t0(),
            "creator",
            "second",
            "",
            t0() + chrono::Duration::days(7),
        )
        .unwrap();

        crate::trade::place_bet(
            &mut repo,
            &cfg,
            t0() + chrono::Duration::seconds(1),
            "alice",
            m1.id,
            10,
            "YES",
        )
        .unwrap();
        crate::trade::place_bet(
            &mut repo,
            &cfg,
            t0() + chrono::Duration::seconds(2),
            "alice",
            m2.id,
            5,
            "NO",
        )
        .unwrap();

        let portfolio = user_portfolio(&repo, &cfg, "alice").unwrap();
        assert_eq!(portfolio.len(), 2);
        assert_eq!(portfolio[0].market_id, m1.id);
        assert_eq!(portfolio[0].question_title, "first");
        assert_eq!(portfolio[1].market_id, m2.id);
        assert_eq!(portfolio[1].position.no_shares, 5);

        // creators without bets hold no positions
        assert!(user_portfolio(&repo, &cfg, "creator").unwrap().is_empty());

        // sanity: outcome survived the round trip
        let bets = repo.list_bets_for_market(m2.id);
        assert_eq!(bets[0].outcome, Outcome::No);
    }
}
