// Valuation engine
//
// Prices net holdings into integer credits that sum exactly to a target:
// the market volume while trading, the whole pot spread over the winning
// side once resolved. Rounding drift settles one credit at a time over a
// deterministic holder ordering; that ordering is the tie-break backbone
// the metrics verifier leans on.

use chrono::{DateTime, Utc};

use crate::dbpm::{round_half_away, UserShares};
use crate::models::Outcome;

/// A holder's worth in one market, with the sort keys the adjustment walk
/// needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuedShares {
    pub username: String,
    pub yes_shares: i64,
    pub no_shares: i64,
    pub value: i64,
    pub first_bet_at: DateTime<Utc>,
}

/// Live pricing: YES holdings are worth shares * p, NO holdings
/// shares * (1 - p). Netting guarantees at most one side is populated.
pub fn unresolved_value(holding: &UserShares, probability: f64) -> i64 {
    if holding.yes_shares > 0 {
        round_half_away(holding.yes_shares as f64 * probability)
    } else if holding.no_shares > 0 {
        round_half_away(holding.no_shares as f64 * (1.0 - probability))
    } else {
        0
    }
}

/// Resolved pricing weight: winners carry their share count, losers zero.
pub fn resolved_value(holding: &UserShares, winning: Outcome) -> i64 {
    match winning {
        Outcome::Yes => holding.yes_shares.max(0),
        Outcome::No => holding.no_shares.max(0),
    }
}

/// Walk values to the target total. Ordering is strict: value descending,
/// then earliest first bet, then username; one credit per visit, wrapping.
/// Zero-valued holders are skipped unless nobody holds positive value, in
/// which case anyone with shares may receive. Subtraction never takes a
/// holder below zero.
pub fn adjust_to_target(positions: &mut [ValuedShares], target: i64) {
    let total: i64 = positions.iter().map(|p| p.value).sum();
    let mut delta = target - total;
    if delta == 0 || positions.is_empty() {
        return;
    }

    let mut order: Vec<usize> = (0..positions.len())
        .filter(|&i| positions[i].value > 0)
        .collect();
    if order.is_empty() {
        order = (0..positions.len())
            .filter(|&i| positions[i].yes_shares > 0 || positions[i].no_shares > 0)
            .collect();
    }
    if order.is_empty() {
        return;
    }
    order.sort_by(|&a, &b| {
        positions[b]
            .value
            .cmp(&positions[a].value)
            .then(positions[a].first_bet_at.cmp(&positions[b].first_bet_at))
            .then(positions[a].username.cmp(&positions[b].username))
    });

    let step = delta.signum();
    let mut cursor = 0usize;
    let mut stalled = 0usize;
    while delta != 0 && stalled < order.len() {
        let idx = order[cursor % order.len()];
        cursor += 1;
        if step < 0 && positions[idx].value <= 0 {
            stalled += 1;
            continue;
        }
        positions[idx].value += step;
        delta -= step;
        stalled = 0;
    }
}
