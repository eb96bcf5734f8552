// Position sells
//
// A sell converts a credits request into whole shares against the live
// valuation. Wallet first, bet second: the SALE credit lands before the
// share-removing bet is appended, and a failed append debits the credit
// straight back. The sell fee, when configured, comes off after the bet
// persists.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EconomicConfig;
use crate::errors::MarketError;
use crate::models::{EntryKind, Outcome};
use crate::positions;
use crate::store::Repository;
use crate::trade::{check_dust_cap, compute_sale};
use crate::wallet;

/// What a completed sale hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    pub market_id: u64,
    pub username: String,
    pub outcome: Outcome,
    pub shares_sold: i64,
    pub sale_value: i64,
    pub value_per_share: i64,
    pub dust: i64,
    pub transaction_at: DateTime<Utc>,
}

pub fn sell_position<R: Repository>(
    repo: &mut R,
    cfg: &EconomicConfig,
    now: DateTime<Utc>,
    username: &str,
    market_id: u64,
    credits_requested: i64,
    outcome: &str,
) -> Result<SaleReceipt, MarketError> {
    let outcome = Outcome::parse(outcome)?;
    if credits_requested <= 0 {
        return Err(MarketError::InvalidAmount(format!(
            "sale request must be positive, got {}",
            credits_requested
        )));
    }
    let market = repo
        .get_market(market_id)
        .ok_or(MarketError::MarketNotFound(market_id))?;
    market.ensure_open(now)?;
    if repo.get_user(username).is_none() {
        return Err(MarketError::UserNotFound(username.to_string()));
    }

    let position = positions::user_position(repo, cfg, &market, username).ok_or_else(|| {
        MarketError::NoPosition(format!(
            "'{}' holds nothing in market {}",
            username, market_id
        ))
    })?;
    let shares_owned = match outcome {
        Outcome::Yes => position.yes_shares,
        Outcome::No => position.no_shares,
    };
    if shares_owned <= 0 {
        return Err(MarketError::NoPosition(format!(
            "'{}' holds no {} shares in market {}",
            username, outcome, market_id
        )));
    }

    let calc = compute_sale(position.value, shares_owned, credits_requested)?;
    check_dust_cap(cfg, calc.dust)?;

    let sell_fee = cfg.bet_fees.sell_shares_fee;
    if sell_fee > 0 && calc.sale_value <= sell_fee {
        return Err(MarketError::InvalidAmount(format!(
            "sale value {} does not cover the sell fee of {}",
            calc.sale_value, sell_fee
        )));
    }

    wallet::credit(repo, now, username, calc.sale_value, EntryKind::Sale)?;

    if let Err(err) = repo.insert_bet(username, market_id, -calc.shares_to_sell, outcome, now) {
        if let Err(rollback_err) = wallet::debit(
            repo,
            now,
            username,
            calc.sale_value,
            cfg.maximum_debt_allowed,
            EntryKind::Buy,
        ) {
            tracing::error!(
                user = %username,
                market = market_id,
                error = %rollback_err,
                "sale rollback failed"
            );
        }
        return Err(MarketError::from(err));
    }

    if sell_fee > 0 {
        wallet::debit(
            repo,
            now,
            username,
            sell_fee,
            cfg.maximum_debt_allowed,
            EntryKind::Fee,
        )?;
    }

    tracing::info!(
        user = %username,
        market = market_id,
        shares = calc.shares_to_sell,
        value = calc.sale_value,
        dust = calc.dust,
        "position sold"
    );

    Ok(SaleReceipt {
        market_id,
        username: username.to_string(),
        outcome,
        shares_sold: calc.shares_to_sell,
        sale_value: calc.sale_value,
        value_per_share: calc.value_per_share,
        dust: calc.dust,
        transaction_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BetFees;
    use crate::models::{Market, Resolution, User};
    use crate::store::MemoryStore;
    use crate::trade::place_bet;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn cfg() -> EconomicConfig {
        EconomicConfig {
            initial_market_subsidization: 1,
            bet_fees: BetFees {
                initial_bet_fee: 1,
                buy_shares_fee: 0,
                sell_shares_fee: 0,
            },
            max_dust_per_sale: 0,
            ..EconomicConfig::default()
        }
    }

    fn setup(users: &[&str]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for user in users {
            store
                .insert_user(User {
                    username: user.to_string(),
                    account_balance: 0,
                    created_at: t0(),
                })
                .unwrap();
        }
        let id = store.allocate_market_id();
        store
            .put_market(Market {
                id,
                creator_username: users[0].to_string(),
                question_title: "q".to_string(),
                description: String::new(),
                resolution_date_time: t0() + Duration::days(30),
                is_resolved: false,
                resolution_result: Resolution::Unresolved,
                created_at: t0(),
            })
            .unwrap();
        store
    }

    #[test]
    fn sell_everything_round_trips_to_zero_shares() {
        let cfg = cfg();
        let mut repo = setup(&["alice"]);
        place_bet(&mut repo, &cfg, t0() + Duration::seconds(1), "alice", 1, 50, "YES").unwrap();

        // 50 shares at one credit each
        let receipt = sell_position(
            &mut repo,
            &cfg,
            t0() + Duration::seconds(2),
            "alice",
            1,
            50,
            "YES",
        )
        .unwrap();
        assert_eq!(receipt.shares_sold, 50);
        assert_eq!(receipt.sale_value, 50);
        assert_eq!(receipt.dust, 0);

        // only the initial bet fee is gone
        assert_eq!(repo.get_user("alice").unwrap().account_balance, -1);
        let position =
            positions::market_positions(&repo, &cfg, 1).unwrap();
        assert_eq!(position[0].yes_shares, 0);
        assert_eq!(position[0].value, 0);
    }

    #[test]
    fn partial_sale_keeps_the_remainder() {
        let cfg = cfg();
        let mut repo = setup(&["alice"]);
        place_bet(&mut repo, &cfg, t0() + Duration::seconds(1), "alice", 1, 50, "YES").unwrap();

        let receipt = sell_position(
            &mut repo,
            &cfg,
            t0() + Duration::seconds(2),
            "alice",
            1,
            20,
            "YES",
        )
        .unwrap();
        assert_eq!(receipt.shares_sold, 20);
        assert_eq!(receipt.sale_value, 20);

        let position = positions::market_positions(&repo, &cfg, 1).unwrap();
        assert_eq!(position[0].yes_shares, 30);
    }

    #[test]
    fn selling_the_unheld_side_is_refused() {
        let cfg = cfg();
        let mut repo = setup(&["alice"]);
        place_bet(&mut repo, &cfg, t0() + Duration::seconds(1), "alice", 1, 50, "YES").unwrap();

        let err = sell_position(
            &mut repo,
            &cfg,
            t0() + Duration::seconds(2),
            "alice",
            1,
            10,
            "NO",
        )
        .unwrap_err();
        assert!(matches!(err, MarketError::NoPosition(_)));
    }

    #[test]
    fn bystander_with_no_bets_cannot_sell() {
        let cfg = cfg();
        let mut repo = setup(&["alice", "bob"]);
        place_bet(&mut repo, &cfg, t0() + Duration::seconds(1), "alice", 1, 50, "YES").unwrap();

        let err = sell_position(
            &mut repo,
            &cfg,
            t0() + Duration::seconds(2),
            "bob",
            1,
            10,
            "YES",
        )
        .unwrap_err();
        assert!(matches!(err, MarketError::NoPosition(_)));
    }

    #[test]
    fn oversized_request_clamps_to_owned_shares() {
        let cfg = cfg();
        let mut repo = setup(&["alice"]);
        place_bet(&mut repo, &cfg, t0() + Duration::seconds(1), "alice", 1, 50, "YES").unwrap();

        let receipt = sell_position(
            &mut repo,
            &cfg,
            t0() + Duration::seconds(2),
            "alice",
            1,
            80,
            "YES",
        )
        .unwrap();
        assert_eq!(receipt.shares_sold, 50);
        assert_eq!(receipt.sale_value, 50);
        assert_eq!(receipt.dust, 30);
    }

    #[test]
    fn sell_fee_comes_off_after_the_sale() {
        let mut cfg = cfg();
        cfg.bet_fees.sell_shares_fee = 2;
        let mut repo = setup(&["alice"]);
        place_bet(&mut repo, &cfg, t0() + Duration::seconds(1), "alice", 1, 50, "YES").unwrap();

        sell_position(
            &mut repo,
            &cfg,
            t0() + Duration::seconds(2),
            "alice",
            1,
            10,
            "YES",
        )
        .unwrap();
        // -51 buy, +10 sale, -2 fee
        assert_eq!(repo.get_user("alice").unwrap().account_balance, -43);
        let kinds: Vec<EntryKind> = repo
            .ledger_for_user("alice")
            .iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![EntryKind::Buy, EntryKind::Sale, EntryKind::Fee]);
    }

    #[test]
    fn closed_market_rejects_sales() {
        let cfg = cfg();
        let mut repo = setup(&["alice"]);
        place_bet(&mut repo, &cfg, t0() + Duration::seconds(1), "alice", 1, 50, "YES").unwrap();

        let err = sell_position(
            &mut repo,
            &cfg,
            t0() + Duration::days(31),
            "alice",
            1,
            10,
            "YES",
        )
        .unwrap_err();
        assert_eq!(err, MarketError::MarketClosed(1));
    }
}
