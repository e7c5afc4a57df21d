//! Sizing for the AMM's just-in-time participation in a maker fill.
//!
//! When a maker fills a taker during an auction the AMM may take part of the
//! maker's size to reduce its own inventory. It never takes more than half the
//! maker's size, far less when the fill looks like a wash, and nothing without a
//! valid oracle price.

use crate::amm::{is_imbalanced, standardize_base_asset_amount};
use crate::constants::MAX_AMM_JIT_INTENSITY;
use crate::error::MathResult;
use crate::market::PerpMarket;
use crate::precision::{BaseAmount, Price};
use crate::types::PositionDirection;

/// Base the AMM takes from a maker's `maker_base_asset_amount`, standardized to the
/// market's step size.
pub fn calculate_jit_base_asset_amount(
    market: &PerpMarket,
    maker_base_asset_amount: BaseAmount,
    auction_price: Price,
    valid_oracle_price: Option<Price>,
    taker_direction: PositionDirection,
) -> MathResult<BaseAmount> {
    let Some(oracle_price) = valid_oracle_price else {
        return Ok(BaseAmount::ZERO);
    };

    let mut max_jit_amount = maker_base_asset_amount.div_int(2)?;
    // a taker crossing on the wrong side of the oracle is likely trading with itself
    let likely_wash = match taker_direction {
        PositionDirection::Long => auction_price < oracle_price,
        PositionDirection::Short => auction_price > oracle_price,
    };
    if likely_wash {
        max_jit_amount = max_jit_amount.div_int(4)?;
    }

    let (bids, asks) = market.amm.market_open_bids_asks()?;
    let jit_base_asset_amount = if is_imbalanced(bids, asks)? {
        maker_base_asset_amount
    } else {
        maker_base_asset_amount.div_int(4)?
    };

    let clamped = calculate_clamped_jit_base_asset_amount(market, jit_base_asset_amount)?.min(max_jit_amount);
    standardize_base_asset_amount(clamped, market.amm.order_step_size)
}

/// Scale by `amm_jit_intensity` percent and bound by the AMM's net inventory.
pub fn calculate_clamped_jit_base_asset_amount(
    market: &PerpMarket,
    jit_base_asset_amount: BaseAmount,
) -> MathResult<BaseAmount> {
    let intensity = market.amm.amm_jit_intensity.min(MAX_AMM_JIT_INTENSITY) as i128;
    if intensity == 0 {
        return Ok(BaseAmount::ZERO);
    }
    let scaled = jit_base_asset_amount.mul_int(intensity)?.div_int(100)?;
    Ok(scaled.min(market.amm.net_base_asset_amount.abs()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm::Amm;
    use crate::constants::{BASE_PRECISION, PRICE_PRECISION};
    use crate::precision::{Peg, QuoteReserve};
    use crate::types::MarketIndex;

    fn base(units: i128) -> BaseAmount {
        BaseAmount::from_raw(units * BASE_PRECISION)
    }

    fn market(base_reserve: i128, intensity: u8, net_base: i128) -> PerpMarket {
        PerpMarket::new(
            MarketIndex(0),
            Amm {
                base_asset_reserve: base(base_reserve),
                quote_asset_reserve: QuoteReserve::from_raw(75 * BASE_PRECISION),
                min_base_asset_reserve: base(50),
                max_base_asset_reserve: base(100),
                net_base_asset_amount: base(net_base),
                amm_jit_intensity: intensity,
                ..Amm::balanced(75 * BASE_PRECISION, Peg::one())
            },
        )
    }

    #[test]
    fn clamped_by_intensity() {
        assert_eq!(calculate_clamped_jit_base_asset_amount(&market(75, 100, 1_000), base(100)).unwrap(), base(100));
        assert_eq!(calculate_clamped_jit_base_asset_amount(&market(75, 50, 1_000), base(100)).unwrap(), base(50));
        assert_eq!(calculate_clamped_jit_base_asset_amount(&market(75, 0, 1_000), base(100)).unwrap(), BaseAmount::ZERO);
    }

    #[test]
    fn clamped_by_net_inventory() {
        assert_eq!(calculate_clamped_jit_base_asset_amount(&market(75, 100, 0), base(100)).unwrap(), BaseAmount::ZERO);
        assert_eq!(calculate_clamped_jit_base_asset_amount(&market(75, 100, -10), base(100)).unwrap(), base(10));
    }

    #[test]
    fn balanced_amm_takes_a_quarter() {
        let oracle = Price::from_raw(PRICE_PRECISION);
        let jit = calculate_jit_base_asset_amount(
            &market(75, 100, 1_000),
            base(100),
            oracle,
            Some(oracle),
            PositionDirection::Long,
        )
        .unwrap();
        assert_eq!(jit, base(25));
    }

    #[test]
    fn imbalanced_amm_capped_at_half() {
        // 40 base of bids against 10 of asks
        let oracle = Price::from_raw(PRICE_PRECISION);
        let jit = calculate_jit_base_asset_amount(
            &market(90, 100, 1_000),
            base(100),
            oracle,
            Some(oracle),
            PositionDirection::Short,
        )
        .unwrap();
        assert_eq!(jit, base(50));
    }

    #[test]
    fn likely_wash_cuts_the_cap() {
        let oracle = Price::from_raw(PRICE_PRECISION);
        let jit = calculate_jit_base_asset_amount(
            &market(75, 100, 1_000),
            base(100),
            Price::from_raw(990_000),
            Some(oracle),
            PositionDirection::Long,
        )
        .unwrap();
        assert_eq!(jit.raw(), 12_500_000_000);
    }

    #[test]
    fn no_oracle_no_jit() {
        let jit = calculate_jit_base_asset_amount(
            &market(75, 100, 1_000),
            base(100),
            Price::from_raw(PRICE_PRECISION),
            None,
            PositionDirection::Long,
        )
        .unwrap();
        assert!(jit.is_zero());
    }
}
