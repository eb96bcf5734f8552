// Position snapshots
//
// Composes the repository's ordered bet stream through the probability
// timeline, the share allocator and the valuation engine into the position
// snapshots the API serves. Also replays historical sale proceeds, so
// total_spent_in_play reflects the credits a user actually still has in the
// pot. Everything here is derived; nothing is stored.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::EconomicConfig;
use crate::dbpm;
use crate::errors::MarketError;
use crate::models::{Bet, Market, MarketPosition, Outcome};
use crate::store::Repository;
use crate::valuation::{self, ValuedShares};
use crate::wpam;

/// Market volume: the signed sum of every bet amount.
pub fn market_volume(bets: &[Bet]) -> i64 {
    bets.iter().map(|b| b.amount).sum()
}

fn first_bet_times(bets: &[Bet]) -> HashMap<String, DateTime<Utc>> {
    let mut times = HashMap::new();
    for bet in bets {
        times.entry(bet.username.clone()).or_insert(bet.placed_at);
    }
    times
}

/// Live valuation of a bet list: allocate, price at the current
/// probability, then close the books to the volume.
fn valued_live(cfg: &EconomicConfig, market: &Market, bets: &[Bet]) -> Vec<ValuedShares> {
    let changes = wpam::probability_changes(cfg, market.created_at, bets);
    let probability = changes
        .last()
        .map(|c| c.probability)
        .unwrap_or(cfg.initial_market_probability);
    let holdings = dbpm::allocate_shares(bets, &changes);
    let first_bets = first_bet_times(bets);

    let mut valued: Vec<ValuedShares> = holdings
        .iter()
        .map(|h| ValuedShares {
            username: h.username.clone(),
            yes_shares: h.yes_shares,
            no_shares: h.no_shares,
            value: valuation::unresolved_value(h, probability),
            first_bet_at: first_bets
                .get(&h.username)
                .copied()
                .unwrap_or(market.created_at),
        })
        .collect();
    valuation::adjust_to_target(&mut valued, market_volume(bets));
    valued
}

/// Resolved valuation: winning shares weigh, losers zero, and the whole pot
/// goes to the winning side.
fn valued_resolved(
    cfg: &EconomicConfig,
    market: &Market,
    bets: &[Bet],
    winning: Outcome,
) -> Vec<ValuedShares> {
    let changes = wpam::probability_changes(cfg, market.created_at, bets);
    let holdings = dbpm::allocate_shares(bets, &changes);
    let first_bets = first_bet_times(bets);

    let mut valued: Vec<ValuedShares> = holdings
        .iter()
        .map(|h| ValuedShares {
            username: h.username.clone(),
            yes_shares: h.yes_shares,
            no_shares: h.no_shares,
            value: valuation::resolved_value(h, winning),
            first_bet_at: first_bets
                .get(&h.username)
                .copied()
                .unwrap_or(market.created_at),
        })
        .collect();
    // no winning shareholders means a dead pot, never a spread to losers
    if valued.iter().any(|v| v.value > 0) {
        valuation::adjust_to_target(&mut valued, market_volume(bets));
    }
    valued
}

/// Voided markets (resolved N/A) value every holding at zero; refunds
/// already handed the pot back.
fn valued_void(cfg: &EconomicConfig, market: &Market, bets: &[Bet]) -> Vec<ValuedShares> {
    let mut valued = valued_live(cfg, market, bets);
    for v in &mut valued {
        v.value = 0;
    }
    valued
}

/// Replay the proceeds of one historical sale from the bets that preceded
/// it. Mirrors the quote the sell service gave at the time: integer value
/// per share from the seller's live position over the prefix, times the
/// shares actually sold.
fn replay_sale_proceeds(cfg: &EconomicConfig, market: &Market, prefix: &[Bet], sale: &Bet) -> i64 {
    let valued = valued_live(cfg, market, prefix);
    let position = match valued.iter().find(|v| v.username == sale.username) {
        Some(position) => position,
        None => return 0,
    };
    let shares_owned = match sale.outcome {
        Outcome::Yes => position.yes_shares,
        Outcome::No => position.no_shares,
    };
    if shares_owned <= 0 {
        return 0;
    }
    let value_per_share = position.value / shares_owned;
    if value_per_share <= 0 {
        return 0;
    }
    -sale.amount * value_per_share
}

/// Per-user (credits spent on buys, credits recovered through sales).
fn spent_totals(
    cfg: &EconomicConfig,
    market: &Market,
    bets: &[Bet],
) -> HashMap<String, (i64, i64)> {
    let mut totals: HashMap<String, (i64, i64)> = HashMap::new();
    for (i, bet) in bets.iter().enumerate() {
        if bet.amount > 0 {
            let entry = totals.entry(bet.username.clone()).or_insert((0, 0));
            entry.0 += bet.amount;
        } else if bet.amount < 0 {
            let proceeds = replay_sale_proceeds(cfg, market, &bets[..i], bet);
            let entry = totals.entry(bet.username.clone()).or_insert((0, 0));
            entry.1 += proceeds;
        }
    }
    totals
}

/// Positions from an explicit bet list, one entry per user who ever bet on
/// the market, in first-bet order. Zero-share users stay in the output.
pub fn positions_for_bets(
    cfg: &EconomicConfig,
    market: &Market,
    bets: &[Bet],
) -> Vec<MarketPosition> {
    if bets.is_empty() {
        return Vec::new();
    }
    let valued = match (market.is_resolved, market.resolution_result.winning_outcome()) {
        (true, Some(winning)) => valued_resolved(cfg, market, bets, winning),
        (true, None) => valued_void(cfg, market, bets),
        (false, _) => valued_live(cfg, market, bets),
    };
    let spent = spent_totals(cfg, market, bets);

    valued
        .into_iter()
        .map(|v| {
            let (total_spent, returned) = spent.get(&v.username).copied().unwrap_or((0, 0));
            MarketPosition {
                username: v.username,
                yes_shares: v.yes_shares,
                no_shares: v.no_shares,
                value: v.value,
                total_spent,
                total_spent_in_play: (total_spent - returned).max(0),
                is_resolved: market.is_resolved,
                resolution_result: market.resolution_result,
            }
        })
        .collect()
}

/// Positions for a stored market.
pub fn market_positions<R: Repository>(
    repo: &R,
    cfg: &EconomicConfig,
    market_id: u64,
) -> Result<Vec<MarketPosition>, MarketError> {
    let market = repo
        .get_market(market_id)
        .ok_or(MarketError::MarketNotFound(market_id))?;
    let bets = repo.list_bets_for_market(market_id);
    Ok(positions_for_bets(cfg, &market, &bets))
}

/// One user's live valued position, the quote basis for sells.
pub fn user_position<R: Repository>(
    repo: &R,
    cfg: &EconomicConfig,
    market: &Market,
    username: &str,
) -> Option<ValuedShares> {
    let bets = repo.list_bets_for_market(market.id);
    valued_live(cfg, market, &bets)
        .into_iter()
        .find(|v| v.username == username)
}
