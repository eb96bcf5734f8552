// Market creation and read models
//
// Creation charges the configured cost through the wallet before the market
// row lands, compensating with a refund if the insert fails. The read
// models bolt the live probability and volume onto the stored market for
// listings and detail views.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EconomicConfig;
use crate::errors::MarketError;
use crate::models::{EntryKind, Market, ProbabilityChange, Resolution};
use crate::positions;
use crate::store::Repository;
use crate::wallet;
use crate::wpam;

pub fn create_market<R: Repository>(
    repo: &mut R,
    cfg: &EconomicConfig,
    now: DateTime<Utc>,
    creator: &str,
    question_title: &str,
    description: &str,
    resolution_date_time: DateTime<Utc>,
) -> Result<Market, MarketError> {
    let title = question_title.trim();
    if title.is_empty() {
        return Err(MarketError::InvalidRequest(
            "market title must not be blank".to_string(),
        ));
    }
    if resolution_date_time <= now {
        return Err(MarketError::InvalidRequest(
            "resolution deadline must lie in the future".to_string(),
        ));
    }
    if repo.get_user(creator).is_none() {
        return Err(MarketError::UserNotFound(creator.to_string()));
    }

    if cfg.create_market_cost > 0 {
        wallet::debit(
            repo,
            now,
            creator,
            cfg.create_market_cost,
            cfg.maximum_debt_allowed,
            EntryKind::Fee,
        )?;
    }

    let id = repo.allocate_market_id();
    let market = Market {
        id,
        creator_username: creator.to_string(),
        question_title: title.to_string(),
        description: description.trim().to_string(),
        resolution_date_time,
        is_resolved: false,
        resolution_result: Resolution::Unresolved,
        created_at: now,
    };
    match repo.put_market(market.clone()) {
        Ok(()) => {
            tracing::info!(market = id, creator = %creator, "market created");
            Ok(market)
        }
        Err(err) => {
            if cfg.create_market_cost > 0 {
                if let Err(refund_err) =
                    wallet::credit(repo, now, creator, cfg.create_market_cost, EntryKind::Refund)
                {
                    tracing::error!(
                        creator = %creator,
                        error = %refund_err,
                        "creation fee refund failed"
                    );
                }
            }
            Err(MarketError::from(err))
        }
    }
}

// ===== READ MODELS =====

/// Listing view: the stored market plus live figures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    #[serde(flatten)]
    pub market: Market,
    pub current_probability: f64,
    pub volume: i64,
    pub total_bets: usize,
    pub unique_bettors: usize,
}

/// Detail view: the summary plus the full probability timeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDetail {
    #[serde(flatten)]
    pub summary: MarketSummary,
    pub probability_changes: Vec<ProbabilityChange>,
}

pub fn market_summary<R: Repository>(
    repo: &R,
    cfg: &EconomicConfig,
    market: &Market,
) -> MarketSummary {
    let bets = repo.list_bets_for_market(market.id);
    let unique_bettors = {
        let mut names: Vec<&str> = bets.iter().map(|b| b.username.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    };
    MarketSummary {
        market: market.clone(),
        current_probability: wpam::current_probability(cfg, market.created_at, &bets),
        volume: positions::market_volume(&bets),
        total_bets: bets.len(),
        unique_bettors,
    }
}

pub fn list_market_summaries<R: Repository>(repo: &R, cfg: &EconomicConfig) -> Vec<MarketSummary> {
    repo.list_markets()
        .iter()
        .map(|market| market_summary(repo, cfg, market))
        .collect()
}

pub fn market_detail<R: Repository>(
    repo: &R,
    cfg: &EconomicConfig,
    market_id: u64,
) -> Result<MarketDetail, MarketError> {
    let market = repo
        .get_market(market_id)
        .ok_or(MarketError::MarketNotFound(market_id))?;
    let bets = repo.list_bets_for_market(market_id);
    Ok(MarketDetail {
        summary: market_summary(repo, cfg, &market),
        probability_changes: wpam::probability_changes(cfg, market.created_at, &bets),
    })
}
