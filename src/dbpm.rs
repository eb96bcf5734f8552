// DBPM share allocator
//
// The divided bet payout model turns a market's bet history into integer
// share holdings. The pot splits into YES and NO share pools at the final
// probability; each bet earns a course payout from the distance between the
// probability it moved the market to and the final probability; payouts
// normalize into the pools, round to integers, and an adjustment walk
// settles the rounding drift newest bet first, so every pool tallies
// exactly. Users then aggregate and net, leaving nobody holding both sides.
//
// Every step is a pure function of the previous step's output:
// pool split -> course payouts -> normalization -> scaling -> adjustment ->
// aggregation -> netting.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Bet, Outcome, ProbabilityChange};

/// Half-away-from-zero integer rounding, the only float-to-credit bridge in
/// the system.
pub fn round_half_away(x: f64) -> i64 {
    x.round() as i64
}

// ===== POOL SPLIT =====

/// The YES and NO share pools after splitting the pot at the final
/// probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSplit {
    pub yes_shares: i64,
    pub no_shares: i64,
}

pub fn divide_pool_shares(volume: i64, final_probability: f64) -> PoolSplit {
    let volume = volume.max(0);
    let yes_shares = round_half_away(volume as f64 * final_probability);
    PoolSplit {
        yes_shares,
        no_shares: volume - yes_shares,
    }
}

// ===== COURSE PAYOUTS =====

/// One bet's pre-normalization payout weight, tagged with its side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourseBetPayout {
    pub payout: f64,
    pub outcome: Outcome,
}

/// Weight each bet by the signed distance between the probability it
/// established and the final probability R, times its amount: YES bets use
/// (p - R), NO bets (R - p). The multiplicative form stays finite at
/// degenerate probabilities, and the final bet always weighs zero since it
/// is the one that set R.
///
/// `changes` must be the full timeline: the initial point plus one point per
/// bet, so changes[i + 1] is the probability established by bets[i] and the
/// last point is R.
pub fn course_payouts(bets: &[Bet], changes: &[ProbabilityChange]) -> Vec<CourseBetPayout> {
    let r = match changes.last() {
        Some(change) => change.probability,
        None => return Vec::new(),
    };
    bets.iter()
        .enumerate()
        .map(|(i, bet)| {
            let p = changes.get(i + 1).map(|c| c.probability).unwrap_or(r);
            let distance = match bet.outcome {
                Outcome::Yes => p - r,
                Outcome::No => r - p,
            };
            CourseBetPayout {
                payout: distance * bet.amount as f64,
                outcome: bet.outcome,
            }
        })
        .collect()
}

// ===== NORMALIZATION =====

/// Per-side factors mapping payout mass onto the share pools. A side with
/// zero payout mass gets factor zero rather than an infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationFactors {
    pub yes: f64,
    pub no: f64,
}

pub fn normalization_factors(
    pools: PoolSplit,
    payouts: &[CourseBetPayout],
) -> NormalizationFactors {
    let total_yes: f64 = payouts
        .iter()
        .filter(|p| p.outcome == Outcome::Yes)
        .map(|p| p.payout)
        .sum();
    let total_no: f64 = payouts
        .iter()
        .filter(|p| p.outcome == Outcome::No)
        .map(|p| p.payout)
        .sum();
    NormalizationFactors {
        yes: if total_yes == 0.0 {
            0.0
        } else {
            pools.yes_shares as f64 / total_yes
        },
        no: if total_no == 0.0 {
            0.0
        } else {
            pools.no_shares as f64 / total_no
        },
    }
}

// ===== SCALING AND ADJUSTMENT =====

/// Integer share allocation for one bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledBetShares {
    pub bet_index: usize,
    pub shares: i64,
    pub outcome: Outcome,
}

pub fn scaled_allocations(
    payouts: &[CourseBetPayout],
    factors: NormalizationFactors,
) -> Vec<ScaledBetShares> {
    payouts
        .iter()
        .enumerate()
        .map(|(bet_index, p)| {
            let factor = match p.outcome {
                Outcome::Yes => factors.yes,
                Outcome::No => factors.no,
            };
            ScaledBetShares {
                bet_index,
                shares: round_half_away(p.payout * factor),
                outcome: p.outcome,
            }
        })
        .collect()
}

/// Settle per-side rounding drift: walk the side's bets newest first
/// (placed_at desc, id desc on ties), stepping each allocation by one credit
/// and wrapping until the side total equals its pool exactly. A side whose
/// pool is nonempty but has no bets cannot be adjusted and keeps the
/// shortfall as phantom shares; the valuation target closes the books there.
pub fn adjust_allocations(
    bets: &[Bet],
    pools: PoolSplit,
    mut scaled: Vec<ScaledBetShares>,
) -> Vec<ScaledBetShares> {
    adjust_side(bets, Outcome::Yes, pools.yes_shares, &mut scaled);
    adjust_side(bets, Outcome::No, pools.no_shares, &mut scaled);
    scaled
}

fn adjust_side(bets: &[Bet], side: Outcome, target: i64, scaled: &mut [ScaledBetShares]) {
    let mut order: Vec<usize> = (0..scaled.len())
        .filter(|&i| scaled[i].outcome == side)
        .collect();
    if order.is_empty() {
        return;
    }
    order.sort_by(|&a, &b| {
        let bet_a = &bets[scaled[a].bet_index];
        let bet_b = &bets[scaled[b].bet_index];
        bet_b
            .placed_at
            .cmp(&bet_a.placed_at)
            .then(bet_b.id.cmp(&bet_a.id))
    });

    let mut total: i64 = order.iter().map(|&i| scaled[i].shares).sum();
    let step = match target.cmp(&total) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => return,
    };
    let mut cursor = 0usize;
    while total != target {
        let idx = order[cursor % order.len()];
        scaled[idx].shares += step;
        total += step;
        cursor += 1;
    }
}

// ===== AGGREGATION AND NETTING =====

/// Net holdings for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserShares {
    pub username: String,
    pub yes_shares: i64,
    pub no_shares: i64,
}

/// Sum adjusted allocations per user, ordered by each user's first bet.
/// Users whose allocations cancel to zero stay in the output.
pub fn aggregate_user_shares(bets: &[Bet], adjusted: &[ScaledBetShares]) -> Vec<UserShares> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, (i64, i64)> = HashMap::new();
    for alloc in adjusted {
        let bet = &bets[alloc.bet_index];
        if !totals.contains_key(&bet.username) {
            order.push(bet.username.clone());
        }
        let entry = totals.entry(bet.username.clone()).or_insert((0, 0));
        match alloc.outcome {
            Outcome::Yes => entry.0 += alloc.shares,
            Outcome::No => entry.1 += alloc.shares,
        }
    }
    order
        .into_iter()
        .map(|username| {
            let (yes_shares, no_shares) = totals.remove(&username).unwrap_or((0, 0));
            UserShares {
                username,
                yes_shares,
                no_shares,
            }
        })
        .collect()
}

/// Collapse dual holdings: YES and NO shares cancel one for one, so every
/// user ends up on at most one side.
pub fn net_user_shares(aggregated: Vec<UserShares>) -> Vec<UserShares> {
    aggregated
        .into_iter()
        .map(|mut user| {
            let yes = user.yes_shares;
            let no = user.no_shares;
            user.yes_shares = (yes - no).max(0);
            user.no_shares = (no - yes).max(0);
            user
        })
        .collect()
}

/// The full allocator: bets plus probability timeline in, net per-user
/// holdings out.
pub fn allocate_shares(bets: &[Bet], changes: &[ProbabilityChange]) -> Vec<UserShares> {
    if bets.is_empty() {
        return Vec::new();
    }
    let r = match changes.last() {
        Some(change) => change.probability,
        None => return Vec::new(),
    };
    let volume: i64 = bets.iter().map(|b| b.amount).sum();
    let pools = divide_pool_shares(volume, r);
    let payouts = course_payouts(bets, changes);
    let factors = normalization_factors(pools, &payouts);
    let scaled = scaled_allocations(&payouts, factors);
    let adjusted = adjust_allocations(bets, pools, scaled);
    net_user_shares(aggregate_user_shares(bets, &adjusted))
}
