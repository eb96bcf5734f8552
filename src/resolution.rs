// Market resolution and payout
//
// Dispatch on the verdict: YES or NO pays the whole pot to the winning
// shareholders through the same valuation walk used for live pricing; N/A
// voids the market and refunds every user the credits they still had in
// play. The market is marked resolved before any credit moves, so payouts
// for an already-resolved market can never run twice.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EconomicConfig;
use crate::errors::MarketError;
use crate::models::{Bet, EntryKind, Market, Resolution};
use crate::positions;
use crate::store::Repository;
use crate::wallet;

/// One credit movement of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutLine {
    pub username: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReceipt {
    pub market_id: u64,
    pub resolution: Resolution,
    pub total_paid: i64,
    pub payouts: Vec<PayoutLine>,
}

/// Resolve a market. Early resolution (before the deadline) is allowed;
/// resolving twice is not.
pub fn resolve_market<R: Repository>(
    repo: &mut R,
    cfg: &EconomicConfig,
    now: DateTime<Utc>,
    market_id: u64,
    verdict: &str,
) -> Result<ResolutionReceipt, MarketError> {
    let resolution = Resolution::parse(verdict)?;
    let mut market = repo
        .get_market(market_id)
        .ok_or(MarketError::MarketNotFound(market_id))?;
    if market.is_resolved {
        return Err(MarketError::MarketClosed(market_id));
    }

    market.is_resolved = true;
    market.resolution_result = resolution;
    repo.put_market(market.clone())?;

    let bets = repo.list_bets_for_market(market_id);
    let payouts = match resolution {
        Resolution::Yes | Resolution::No => pay_winners(repo, cfg, now, &market, &bets)?,
        Resolution::NotApplicable => refund_in_play(repo, cfg, now, &market, &bets)?,
        // parse never yields this
        Resolution::Unresolved => {
            return Err(MarketError::UnsupportedResolution(verdict.to_string()))
        }
    };

    let total_paid = payouts.iter().map(|p| p.amount).sum();
    tracing::info!(
        market = market_id,
        resolution = resolution.as_str(),
        total_paid,
        "market resolved"
    );

    Ok(ResolutionReceipt {
        market_id,
        resolution,
        total_paid,
        payouts,
    })
}

/// Credit each winning holder their resolved position value as a WIN, in
/// position order so payout order replays deterministically.
fn pay_winners<R: Repository>(
    repo: &mut R,
    cfg: &EconomicConfig,
    now: DateTime<Utc>,
    market: &Market,
    bets: &[Bet],
) -> Result<Vec<PayoutLine>, MarketError> {
    let resolved = positions::positions_for_bets(cfg, market, bets);
    let mut payouts = Vec::new();
    for position in &resolved {
        if position.value > 0 {
            wallet::credit(repo, now, &position.username, position.value, EntryKind::Win)?;
            payouts.push(PayoutLine {
                username: position.username.clone(),
                amount: position.value,
            });
        }
    }
    Ok(payouts)
}

/// Void the market: one REFUND per user covering the credits they spent and
/// never recovered through sales.
fn refund_in_play<R: Repository>(
    repo: &mut R,
    cfg: &EconomicConfig,
    now: DateTime<Utc>,
    market: &Market,
    bets: &[Bet],
) -> Result<Vec<PayoutLine>, MarketError> {
    let resolved = positions::positions_for_bets(cfg, market, bets);
    let mut payouts = Vec::new();
    for position in &resolved {
        let refund = position.total_spent_in_play;
        if refund > 0 {
            wallet::credit(repo, now, &position.username, refund, EntryKind::Refund)?;
            payouts.push(PayoutLine {
                username: position.username.clone(),
                amount: refund,
            });
        }
    }
    Ok(payouts)
}
