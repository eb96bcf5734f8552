// Bet placement
//
// The order of effects is the contract: validate, gate, quote, debit,
// append. A success means both the BUY ledger entry and the bet row exist;
// a failed append refunds the debit before the error surfaces.

use chrono::{DateTime, Utc};

use crate::config::EconomicConfig;
use crate::errors::MarketError;
use crate::models::{Bet, EntryKind, Outcome};
use crate::store::Repository;
use crate::trade::quote_buy;
use crate::wallet;

pub fn place_bet<R: Repository>(
    repo: &mut R,
    cfg: &EconomicConfig,
    now: DateTime<Utc>,
    username: &str,
    market_id: u64,
    amount: i64,
    outcome: &str,
) -> Result<Bet, MarketError> {
    let outcome = Outcome::parse(outcome)?;
    if amount <= 0 || amount < cfg.minimum_bet {
        return Err(MarketError::InvalidAmount(format!(
            "bet amount {} is below the minimum of {}",
            amount, cfg.minimum_bet
        )));
    }
    let market = repo
        .get_market(market_id)
        .ok_or(MarketError::MarketNotFound(market_id))?;
    market.ensure_open(now)?;

    let first = !repo.has_bet(username, market_id);
    let cost = quote_buy(cfg, amount, first);

    wallet::debit(
        repo,
        now,
        username,
        cost.total(),
        cfg.maximum_debt_allowed,
        EntryKind::Buy,
    )?;

    match repo.insert_bet(username, market_id, amount, outcome, now) {
        Ok(bet) => {
            tracing::info!(
                user = %username,
                market = market_id,
                amount,
                outcome = %bet.outcome,
                "bet placed"
            );
            Ok(bet)
        }
        Err(err) => {
            if let Err(refund_err) =
                wallet::credit(repo, now, username, cost.total(), EntryKind::Refund)
            {
                tracing::error!(
                    user = %username,
                    market = market_id,
                    error = %refund_err,
                    "compensating refund failed"
                );
            }
            Err(MarketError::from(err))
        }
    }
}
