// WPAM probability timeline
//
// The weighted probability adjustment model prices a market as a subsidized
// running ratio of YES credits to all credits. Each bet appends one point to
// the timeline; the timeline always opens with the market's initial
// probability stamped at creation time.
//
// Sales enter the stream as negative amounts and pull their side's running
// total back down. The share allocator reads the same timeline, so a
// degenerate empty market never divides by zero here: the subsidization
// keeps the denominator positive, and if an operator zeroes every virtual
// parameter the formula falls back to the initial probability.

use chrono::{DateTime, Utc};

use crate::config::EconomicConfig;
use crate::models::{Bet, Outcome, ProbabilityChange};

/// Full probability timeline for a market: the initial point plus one point
/// per bet, in bet order.
pub fn probability_changes(
    cfg: &EconomicConfig,
    market_created_at: DateTime<Utc>,
    bets: &[Bet],
) -> Vec<ProbabilityChange> {
    let p0 = cfg.initial_market_probability;
    let i0 = cfg.initial_market_subsidization as f64;
    let y0 = cfg.initial_market_yes as f64;
    let n0 = cfg.initial_market_no as f64;

    let mut changes = Vec::with_capacity(bets.len() + 1);
    changes.push(ProbabilityChange {
        probability: p0,
        timestamp: market_created_at,
    });

    let mut total_yes: i64 = 0;
    let mut total_no: i64 = 0;
    for bet in bets {
        match bet.outcome {
            Outcome::Yes => total_yes += bet.amount,
            Outcome::No => total_no += bet.amount,
        }
        let denominator = i0 + y0 + n0 + total_yes as f64 + total_no as f64;
        let probability = if denominator == 0.0 {
            p0
        } else {
            (p0 * i0 + y0 + total_yes as f64) / denominator
        };
        changes.push(ProbabilityChange {
            probability,
            timestamp: bet.placed_at,
        });
    }
    changes
}

/// The market's probability after the last bet.
pub fn current_probability(
    cfg: &EconomicConfig,
    market_created_at: DateTime<Utc>,
    bets: &[Bet],
) -> f64 {
    probability_changes(cfg, market_created_at, bets)
        .last()
        .map(|c| c.probability)
        .unwrap_or(cfg.initial_market_probability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn bet(id: u64, amount: i64, outcome: Outcome, offset_secs: i64) -> Bet {
        Bet {
            id,
            username: "alice".to_string(),
            market_id: 1,
            amount,
            outcome,
            placed_at: t0() + Duration::seconds(offset_secs),
        }
    }

    fn cfg(subsidization: i64) -> EconomicConfig {
        EconomicConfig {
            initial_market_subsidization: subsidization,
            ..EconomicConfig::default()
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn empty_market_sits_at_the_initial_probability() {
        let changes = probability_changes(&cfg(10), t0(), &[]);
        assert_eq!(changes.len(), 1);
        assert_close(changes[0].probability, 0.5);
        assert_eq!(changes[0].timestamp, t0());
    }

    #[test]
    fn single_yes_bet_with_default_subsidization() {
        let bets = vec![bet(1, 50, Outcome::Yes, 10)];
        let changes = probability_changes(&cfg(10), t0(), &bets);
        assert_eq!(changes.len(), 2);
        // (0.5 * 10 + 50) / (10 + 50) = 55/60
        assert_close(changes[1].probability, 55.0 / 60.0);
        assert_eq!(changes[1].timestamp, bets[0].placed_at);
    }

    #[test]
    fn sales_walk_the_probability_back() {
        // buy 1 YES, sell 1 YES, buy 1 NO, sell 1 NO, buy 1 NO
        let bets = vec![
            bet(1, 1, Outcome::Yes, 1),
            bet(2, -1, Outcome::Yes, 2),
            bet(3, 1, Outcome::No, 3),
            bet(4, -1, Outcome::No, 4),
            bet(5, 1, Outcome::No, 5),
        ];
        let changes = probability_changes(&cfg(1), t0(), &bets);
        let probabilities: Vec<f64> = changes.iter().map(|c| c.probability).collect();
        let expected = [0.5, 0.75, 0.5, 0.25, 0.5, 0.25];
        assert_eq!(probabilities.len(), expected.len());
        for (actual, want) in probabilities.iter().zip(expected.iter()) {
            assert_close(*actual, *want);
        }
        assert_close(current_probability(&cfg(1), t0(), &bets), 0.25);
    }

    #[test]
    fn zero_denominator_falls_back_to_initial() {
        let zeroed = EconomicConfig {
            initial_market_subsidization: 0,
            ..EconomicConfig::default()
        };
        let bets = vec![
            bet(1, 1, Outcome::Yes, 1),
            bet(2, -1, Outcome::Yes, 2),
        ];
        let changes = probability_changes(&zeroed, t0(), &bets);
        // after the sale the pool is empty again
        assert_close(changes[2].probability, 0.5);
        assert!(changes.iter().all(|c| c.probability.is_finite()));
    }

    #[test]
    fn virtual_yes_and_no_credits_shift_the_open() {
        let seeded = EconomicConfig {
            initial_market_subsidization: 10,
            initial_market_yes: 5,
            initial_market_no: 5,
            ..EconomicConfig::default()
        };
        let bets = vec![bet(1, 10, Outcome::Yes, 1)];
        let changes = probability_changes(&seeded, t0(), &bets);
        // (0.5*10 + 5 + 10) / (10 + 5 + 5 + 10) = 20/30
        assert_close(changes[1].probability, 20.0 / 30.0);
    }
}
