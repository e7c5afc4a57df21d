// 7.0: taker fills against the AMM. the user is quoted off the spread reserves, the pool
// moves along its real reserves, and the difference is booked to the repeg budget. the
// AMM is repegged against the oracle before anything is priced.
// 7.1 limit handling: a limit caps the size at what moves the spread price to the limit.

use crate::amm::standardize_base_asset_amount;
use crate::error::{CoreResult, DomainError, MathResult};
use crate::market::{MarketStatus, PerpMarket};
use crate::oracle::OraclePriceData;
use crate::position::PositionDelta;
use crate::precision::{BaseAmount, BasePrecision, Price, PricePrecision, QuoteAmount};
use crate::repeg::calculate_updated_amm;
use crate::types::PositionDirection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderPrice {
    Market,
    Limit(Price),
    /// Limit at the oracle price plus this signed offset.
    OracleOffset(Price),
}

impl OrderPrice {
    pub fn limit_price(&self, oracle_price: Price) -> MathResult<Option<Price>> {
        match self {
            OrderPrice::Market => Ok(None),
            OrderPrice::Limit(price) => Ok(Some(*price)),
            OrderPrice::OracleOffset(offset) => Ok(Some(oracle_price.checked_add(*offset)?)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakerOrder {
    pub direction: PositionDirection,
    pub base_asset_amount: BaseAmount,
    pub price: OrderPrice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    /// Market after the fill: repegged, reserves moved, spread surplus booked.
    /// Position aggregates are left to `position::update_market_with_delta`.
    pub market: PerpMarket,
    pub delta: PositionDelta,
    pub base_asset_amount: BaseAmount,
    pub quote_asset_amount: QuoteAmount,
    pub entry_price: Price,
    pub spread_surplus: QuoteAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FillNoOpReason {
    MarketNotActive,
    LimitPriceNotReached,
    BelowOrderStepSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    Filled(Fill),
    NoOp(FillNoOpReason),
}

/// Average fill price, `quote / base`.
pub fn entry_price(quote_asset_amount: QuoteAmount, base_asset_amount: BaseAmount) -> MathResult<Price> {
    quote_asset_amount
        .abs()?
        .div_to::<BasePrecision, PricePrecision>(base_asset_amount.abs()?)
}

pub fn fill_with_amm(market: &PerpMarket, order: &TakerOrder, oracle: &OraclePriceData) -> CoreResult<FillOutcome> {
    if !order.base_asset_amount.is_positive() {
        return Err(DomainError::NonPositiveAmount(order.base_asset_amount.raw()).into());
    }
    if market.status != MarketStatus::Active {
        return Ok(FillOutcome::NoOp(FillNoOpReason::MarketNotActive));
    }

    let amm = calculate_updated_amm(&market.amm, oracle)?;
    let (spread_base, spread_quote) = amm.spread_reserves(order.direction)?;
    let spread_amm = amm.with_reserves(spread_base, spread_quote);

    let mut size = order.base_asset_amount;
    if let Some(limit) = order.price.limit_price(oracle.price)? {
        if !limit.is_positive() {
            return Err(DomainError::NonPositiveLimitPrice(limit.raw()).into());
        }
        match spread_amm.max_base_asset_amount_to_price(limit)? {
            Some((max_size, direction)) if direction == order.direction => size = size.min(max_size),
            _ => return Ok(FillOutcome::NoOp(FillNoOpReason::LimitPriceNotReached)),
        }
    }

    let size = standardize_base_asset_amount(size, amm.order_step_size)?;
    if !size.is_positive() {
        return Ok(FillOutcome::NoOp(FillNoOpReason::BelowOrderStepSize));
    }

    let swap_direction = order.direction.swap_direction();
    let quoted = spread_amm.swap_base_asset(size, swap_direction)?;
    let real = amm.swap_base_asset(size, swap_direction)?;

    // the user pays more (long) or receives less (short) than the pool moved
    let spread_surplus = match order.direction {
        PositionDirection::Long => quoted.quote_asset_amount.checked_sub(real.quote_asset_amount)?,
        PositionDirection::Short => real.quote_asset_amount.checked_sub(quoted.quote_asset_amount)?,
    }
    .max(QuoteAmount::ZERO);

    let mut filled_amm = amm.with_reserves(real.base_asset_reserve, real.quote_asset_reserve);
    filled_amm.total_fee_minus_distributions = filled_amm.total_fee_minus_distributions.checked_add(spread_surplus)?;

    let quote_asset_amount = quoted.quote_asset_amount;
    let delta = match order.direction {
        PositionDirection::Long => PositionDelta {
            base_asset_amount: size,
            quote_asset_amount: quote_asset_amount.checked_neg()?,
        },
        PositionDirection::Short => PositionDelta {
            base_asset_amount: size.checked_neg()?,
            quote_asset_amount,
        },
    };
    let entry_price = entry_price(quote_asset_amount, size)?;
    log::debug!(
        "fill {:?} {} base of market {} at {} (surplus {})",
        order.direction,
        size,
        market.market_index,
        entry_price,
        spread_surplus
    );

    Ok(FillOutcome::Filled(Fill {
        market: market.with_amm(filled_amm),
        delta,
        base_asset_amount: size,
        quote_asset_amount,
        entry_price,
        spread_surplus,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm::Amm;
    use crate::constants::{BASE_PRECISION, PRICE_PRECISION};
    use crate::precision::{Peg, QuoteReserve, Spread};
    use crate::types::MarketIndex;

    fn market(base: i128, quote: i128) -> PerpMarket {
        PerpMarket::new(
            MarketIndex(0),
            Amm {
                base_asset_reserve: BaseAmount::from_raw(base),
                quote_asset_reserve: QuoteReserve::from_raw(quote),
                ..Amm::balanced(500_000_000_000_000, Peg::one())
            },
        )
    }

    fn oracle() -> OraclePriceData {
        OraclePriceData::at(Price::from_raw(PRICE_PRECISION))
    }

    fn order(direction: PositionDirection, price: OrderPrice) -> TakerOrder {
        TakerOrder {
            direction,
            base_asset_amount: BaseAmount::from_raw(BASE_PRECISION),
            price,
        }
    }

    fn filled(outcome: FillOutcome) -> Fill {
        match outcome {
            FillOutcome::Filled(fill) => fill,
            FillOutcome::NoOp(reason) => panic!("expected a fill, got {:?}", reason),
        }
    }

    #[test]
    fn long_below_oracle_offset() {
        let market = market(550_000_000_000_000, 500_000_000_000_000);
        let order = order(PositionDirection::Long, OrderPrice::OracleOffset(Price::from_raw(-50_000)));
        let fill = filled(fill_with_amm(&market, &order, &oracle()).unwrap());

        assert_eq!(fill.quote_asset_amount.raw(), 909_093);
        assert_eq!(fill.entry_price.raw(), 909_093);
        assert_eq!(fill.delta.base_asset_amount.raw(), BASE_PRECISION);
        assert_eq!(fill.delta.quote_asset_amount.raw(), -909_093);
        assert_eq!(fill.market.amm.base_asset_reserve.raw(), 549_999_000_000_000);
        assert!(fill.spread_surplus.is_zero());
    }

    #[test]
    fn short_above_oracle_offset() {
        let market = market(500_000_000_000_000, 550_000_000_000_000);
        let order = order(PositionDirection::Short, OrderPrice::OracleOffset(Price::from_raw(50_000)));
        let fill = filled(fill_with_amm(&market, &order, &oracle()).unwrap());

        assert_eq!(fill.quote_asset_amount.raw(), 1_099_997);
        assert_eq!(fill.delta.base_asset_amount.raw(), -BASE_PRECISION);
        assert_eq!(fill.delta.quote_asset_amount.raw(), 1_099_997);
    }

    #[test]
    fn limit_on_wrong_side_is_a_noop() {
        // pool trades at 0.909; a long limited to 0.9 can't fill
        let market = market(550_000_000_000_000, 500_000_000_000_000);
        let order = order(PositionDirection::Long, OrderPrice::Limit(Price::from_raw(900_000)));
        assert_eq!(
            fill_with_amm(&market, &order, &oracle()).unwrap(),
            FillOutcome::NoOp(FillNoOpReason::LimitPriceNotReached)
        );
    }

    #[test]
    fn limit_caps_size() {
        let market = market(500_000_000_000_000, 500_000_000_000_000);
        let limit = Price::from_raw(1_000_100);
        let order = TakerOrder {
            direction: PositionDirection::Long,
            base_asset_amount: BaseAmount::from_raw(1_000 * BASE_PRECISION),
            price: OrderPrice::Limit(limit),
        };
        let fill = filled(fill_with_amm(&market, &order, &oracle()).unwrap());
        assert!(fill.base_asset_amount.raw() < 1_000 * BASE_PRECISION);
        assert!(fill.base_asset_amount.is_positive());
        assert!(fill.entry_price <= limit);
    }

    #[test]
    fn spread_surplus_funds_repeg_budget() {
        let mut market = market(500_000_000_000_000, 500_000_000_000_000);
        market.amm.long_spread = Spread::from_raw(1_000);
        let order = order(PositionDirection::Long, OrderPrice::Market);
        let fill = filled(fill_with_amm(&market, &order, &oracle()).unwrap());

        assert!(fill.spread_surplus.is_positive());
        assert_eq!(fill.market.amm.total_fee_minus_distributions, fill.spread_surplus);
        // reserves move by the real curve, not the spread curve
        assert_eq!(fill.market.amm.base_asset_reserve.raw(), 499_999_000_000_000);
        assert_eq!(fill.market.amm.quote_asset_reserve.raw(), 500_001_000_002_000);
    }

    #[test]
    fn step_size_rounds_down() {
        let mut market = market(500_000_000_000_000, 500_000_000_000_000);
        market.amm.order_step_size = BaseAmount::from_raw(10 * BASE_PRECISION);
        let order = order(PositionDirection::Long, OrderPrice::Market);
        assert_eq!(
            fill_with_amm(&market, &order, &oracle()).unwrap(),
            FillOutcome::NoOp(FillNoOpReason::BelowOrderStepSize)
        );
    }

    #[test]
    fn paused_market_does_not_fill() {
        let mut market = market(500_000_000_000_000, 500_000_000_000_000);
        market.status = MarketStatus::ReduceOnly;
        let order = order(PositionDirection::Long, OrderPrice::Market);
        assert_eq!(
            fill_with_amm(&market, &order, &oracle()).unwrap(),
            FillOutcome::NoOp(FillNoOpReason::MarketNotActive)
        );
    }
}
