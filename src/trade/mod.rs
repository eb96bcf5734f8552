// Trade services
//
// buy.rs and sell.rs orchestrate the wallet and the store; this module
// holds the pure money math both of them (and the snapshot replay) share.

pub mod buy;
pub mod sell;

pub use buy::place_bet;
pub use sell::{sell_position, SaleReceipt};

use serde::Serialize;

use crate::config::EconomicConfig;
use crate::errors::MarketError;

// ===== BUY QUOTE =====

/// Cost breakdown for a buy: the bet amount plus the fees charged with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetCost {
    pub amount: i64,
    pub initial_fee: i64,
    pub transaction_fee: i64,
}

impl BetCost {
    pub fn total(&self) -> i64 {
        self.amount + self.initial_fee + self.transaction_fee
    }
}

pub fn quote_buy(cfg: &EconomicConfig, amount: i64, first_bet_on_market: bool) -> BetCost {
    BetCost {
        amount,
        initial_fee: if first_bet_on_market {
            cfg.bet_fees.initial_bet_fee
        } else {
            0
        },
        transaction_fee: cfg.bet_fees.buy_shares_fee,
    }
}

// ===== SALE QUOTE =====

/// Integer sale quote. Only whole shares move; the unreturnable remainder
/// of the request surfaces as dust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleCalc {
    pub shares_to_sell: i64,
    pub sale_value: i64,
    pub value_per_share: i64,
    pub dust: i64,
}

/// Convert a credits request against a position into whole shares.
///
/// value_per_share is the integer quotient of position value over shares
/// owned. Requests below one share's value are rejected rather than rounded
/// down to a zero-share sale.
pub fn compute_sale(
    position_value: i64,
    shares_owned: i64,
    credits_requested: i64,
) -> Result<SaleCalc, MarketError> {
    if shares_owned <= 0 {
        return Err(MarketError::NoPosition("no shares held".to_string()));
    }
    let value_per_share = position_value / shares_owned;
    if value_per_share <= 0 {
        return Err(MarketError::NoPosition(
            "position carries no per-share value".to_string(),
        ));
    }
    if credits_requested < value_per_share {
        return Err(MarketError::InvalidAmount(format!(
            "request of {} credits is below the per-share value of {}",
            credits_requested, value_per_share
        )));
    }
    let shares_to_sell = (credits_requested / value_per_share).min(shares_owned);
    let sale_value = shares_to_sell * value_per_share;
    Ok(SaleCalc {
        shares_to_sell,
        sale_value,
        value_per_share,
        dust: credits_requested - sale_value,
    })
}

/// Dust-cap gate. A cap of zero disables the check.
pub fn check_dust_cap(cfg: &EconomicConfig, dust: i64) -> Result<(), MarketError> {
    if cfg.max_dust_per_sale > 0 && dust > cfg.max_dust_per_sale {
        return Err(MarketError::DustCapExceeded {
            cap: cfg.max_dust_per_sale,
            requested: dust,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BetFees;

    fn cfg(max_dust: i64) -> EconomicConfig {
        EconomicConfig {
            bet_fees: BetFees {
                initial_bet_fee: 1,
                buy_shares_fee: 2,
                sell_shares_fee: 0,
            },
            max_dust_per_sale: max_dust,
            ..EconomicConfig::default()
        }
    }

    #[test]
    fn first_bet_pays_the_initial_fee_once() {
        let first = quote_buy(&cfg(1), 20, true);
        assert_eq!(first.total(), 23);
        let repeat = quote_buy(&cfg(1), 20, false);
        assert_eq!(repeat.total(), 22);
    }

    #[test]
    fn whole_share_sale_leaves_no_dust() {
        let calc = compute_sale(100, 10, 30).unwrap();
        assert_eq!(calc.value_per_share, 10);
        assert_eq!(calc.shares_to_sell, 3);
        assert_eq!(calc.sale_value, 30);
        assert_eq!(calc.dust, 0);
    }

    #[test]
    fn fractional_request_rounds_down_and_reports_dust() {
        let calc = compute_sale(100, 10, 33).unwrap();
        assert_eq!(calc.shares_to_sell, 3);
        assert_eq!(calc.sale_value, 30);
        assert_eq!(calc.dust, 3);
    }

    #[test]
    fn request_clamps_to_the_shares_actually_owned() {
        let calc = compute_sale(100, 10, 500).unwrap();
        assert_eq!(calc.shares_to_sell, 10);
        assert_eq!(calc.sale_value, 100);
        assert_eq!(calc.dust, 400);
    }

    #[test]
    fn request_below_one_share_is_rejected() {
        let err = compute_sale(100, 10, 7).unwrap_err();
        assert!(matches!(err, MarketError::InvalidAmount(_)));
    }

    #[test]
    fn worthless_position_cannot_be_sold() {
        assert!(matches!(
            compute_sale(0, 10, 5),
            Err(MarketError::NoPosition(_))
        ));
        assert!(matches!(
            compute_sale(100, 0, 5),
            Err(MarketError::NoPosition(_))
        ));
    }

    #[test]
    fn dust_cap_blocks_only_above_the_cap() {
        let calc = compute_sale(100, 10, 33).unwrap();
        assert_eq!(
            check_dust_cap(&cfg(2), calc.dust),
            Err(MarketError::DustCapExceeded {
                cap: 2,
                requested: 3
            })
        );
        assert_eq!(check_dust_cap(&cfg(3), calc.dust), Ok(()));
        // zero disables the check entirely
        assert_eq!(check_dust_cap(&cfg(0), 400), Ok(()));
    }
}
