//! Constant-product virtual AMM.
//!
//! The pool holds `base_asset_reserve * quote_asset_reserve = k`. A swap moves
//! along that curve and never changes `k`; only a repeg or a liquidity event may.
//! Prices come out of the reserves through the peg multiplier:
//! `price = quote_reserve * peg / base_reserve`.
//!
//! Every transform here takes `&self` and hands back new values. The caller
//! decides whether to commit them.

use crate::constants::{AMM_JIT_IMBALANCE_RATIO, SPREAD_PRECISION};
use crate::error::{CoreResult, DomainError, InvariantViolation, MathResult, ReserveSide};
use crate::precision::{
    div_round, BaseAmount, BasePrecision, Peg, Price, PricePrecision, QuoteAmount, QuoteReserve,
    QuoteReservePrecision, Rounding, Spread, SpreadPrecision, Wide,
};
use crate::types::{PositionDirection, SwapDirection};
use serde::{Deserialize, Serialize};

pub type CurveInvariant = Wide<BasePrecision, QuoteReservePrecision>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amm {
    pub base_asset_reserve: BaseAmount,
    pub quote_asset_reserve: QuoteReserve,
    pub peg_multiplier: Peg,
    // signed: positive when users are net long
    pub net_base_asset_amount: BaseAmount,
    pub quote_asset_amount_long: QuoteAmount,
    pub quote_asset_amount_short: QuoteAmount,
    pub cumulative_social_loss: QuoteAmount,
    pub base_spread: Spread,
    pub long_spread: Spread,
    pub short_spread: Spread,
    pub max_spread: Spread,
    pub min_base_asset_reserve: BaseAmount,
    pub max_base_asset_reserve: BaseAmount,
    pub order_step_size: BaseAmount,
    // 0..=100, percent of the optimal peg move taken per update
    pub curve_update_intensity: u8,
    pub amm_jit_intensity: u8,
    // fees earned minus fees paid out; funds repegs
    pub total_fee_minus_distributions: QuoteAmount,
    pub last_oracle_price: Price,
    pub last_oracle_price_twap: Price,
}

impl Default for Amm {
    fn default() -> Self {
        Self {
            base_asset_reserve: BaseAmount::ZERO,
            quote_asset_reserve: QuoteReserve::ZERO,
            peg_multiplier: Peg::one(),
            net_base_asset_amount: BaseAmount::ZERO,
            quote_asset_amount_long: QuoteAmount::ZERO,
            quote_asset_amount_short: QuoteAmount::ZERO,
            cumulative_social_loss: QuoteAmount::ZERO,
            base_spread: Spread::ZERO,
            long_spread: Spread::ZERO,
            short_spread: Spread::ZERO,
            max_spread: Spread::ZERO,
            min_base_asset_reserve: BaseAmount::ZERO,
            max_base_asset_reserve: BaseAmount::ZERO,
            order_step_size: BaseAmount::from_raw(1),
            curve_update_intensity: 0,
            amm_jit_intensity: 0,
            total_fee_minus_distributions: QuoteAmount::ZERO,
            last_oracle_price: Price::ZERO,
            last_oracle_price_twap: Price::ZERO,
        }
    }
}

/// Reserves after a swap, plus what moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutput {
    pub base_asset_reserve: BaseAmount,
    pub quote_asset_reserve: QuoteReserve,
    pub base_asset_amount: BaseAmount,
    pub quote_asset_amount: QuoteAmount,
}

impl Amm {
    /// Balanced pool: both reserves equal, priced at `peg`.
    pub fn balanced(reserve: i128, peg: Peg) -> Self {
        Self {
            base_asset_reserve: BaseAmount::from_raw(reserve),
            quote_asset_reserve: QuoteReserve::from_raw(reserve),
            peg_multiplier: peg,
            min_base_asset_reserve: BaseAmount::from_raw(reserve / 2),
            max_base_asset_reserve: BaseAmount::from_raw(reserve.saturating_mul(2)),
            ..Self::default()
        }
    }

    pub fn check_reserves(&self) -> MathResult<()> {
        if !self.base_asset_reserve.is_positive() {
            return Err(InvariantViolation::NonPositiveReserve(ReserveSide::Base));
        }
        if !self.quote_asset_reserve.is_positive() {
            return Err(InvariantViolation::NonPositiveReserve(ReserveSide::Quote));
        }
        Ok(())
    }

    pub fn k(&self) -> MathResult<CurveInvariant> {
        self.check_reserves()?;
        self.base_asset_reserve.checked_mul(self.quote_asset_reserve)
    }

    pub fn reserve_price(&self) -> MathResult<Price> {
        reserve_price(self.base_asset_reserve, self.quote_asset_reserve, self.peg_multiplier)
    }

    pub fn with_reserves(&self, base_asset_reserve: BaseAmount, quote_asset_reserve: QuoteReserve) -> Self {
        Self {
            base_asset_reserve,
            quote_asset_reserve,
            ..self.clone()
        }
    }

    /// Trade `base_asset_amount` of base against the pool. `Remove` takes base out
    /// (the user goes long) and rounds the quote owed up by one unit.
    pub fn swap_base_asset(
        &self,
        base_asset_amount: BaseAmount,
        direction: SwapDirection,
    ) -> CoreResult<SwapOutput> {
        if !base_asset_amount.is_positive() {
            return Err(DomainError::NonPositiveAmount(base_asset_amount.raw()).into());
        }
        let k = self.k()?;

        let new_base = match direction {
            SwapDirection::Add => self.base_asset_reserve.checked_add(base_asset_amount)?,
            SwapDirection::Remove => {
                if base_asset_amount >= self.base_asset_reserve {
                    return Err(DomainError::InsufficientReserves {
                        requested: base_asset_amount.raw(),
                        available: self.base_asset_reserve.raw(),
                    }
                    .into());
                }
                self.base_asset_reserve.checked_sub(base_asset_amount)?
            }
        };
        let new_quote: QuoteReserve = k.div_to(new_base)?;
        if !new_quote.is_positive() {
            return Err(InvariantViolation::NonPositiveReserve(ReserveSide::Quote).into());
        }

        let reserve_delta = new_quote.checked_sub(self.quote_asset_reserve)?.abs()?;
        let mut quote_asset_amount = reserve_to_quote(reserve_delta, self.peg_multiplier)?;
        if direction == SwapDirection::Remove {
            quote_asset_amount = quote_asset_amount.checked_add(QuoteAmount::from_raw(1))?;
        }

        Ok(SwapOutput {
            base_asset_reserve: new_base,
            quote_asset_reserve: new_quote,
            base_asset_amount,
            quote_asset_amount,
        })
    }

    /// Quote-denominated swap. `Add` puts quote in (the user goes long).
    /// The base handed out rounds in the pool's favour.
    pub fn swap_quote_asset(
        &self,
        quote_asset_amount: QuoteAmount,
        direction: SwapDirection,
    ) -> CoreResult<SwapOutput> {
        if !quote_asset_amount.is_positive() {
            return Err(DomainError::NonPositiveAmount(quote_asset_amount.raw()).into());
        }
        let k = self.k()?;
        let reserve_delta: QuoteReserve = quote_asset_amount.div_to(self.peg_multiplier)?;

        let (new_quote, rounding) = match direction {
            SwapDirection::Add => (self.quote_asset_reserve.checked_add(reserve_delta)?, Rounding::Ceil),
            SwapDirection::Remove => {
                if reserve_delta >= self.quote_asset_reserve {
                    return Err(DomainError::InsufficientReserves {
                        requested: reserve_delta.raw(),
                        available: self.quote_asset_reserve.raw(),
                    }
                    .into());
                }
                (self.quote_asset_reserve.checked_sub(reserve_delta)?, Rounding::Truncate)
            }
        };
        let new_base: BaseAmount = match rounding {
            Rounding::Ceil => k.div_to_ceil(new_quote)?,
            Rounding::Truncate => k.div_to(new_quote)?,
        };
        if !new_base.is_positive() {
            return Err(InvariantViolation::NonPositiveReserve(ReserveSide::Base).into());
        }

        Ok(SwapOutput {
            base_asset_reserve: new_base,
            quote_asset_reserve: new_quote,
            base_asset_amount: new_base.checked_sub(self.base_asset_reserve)?.abs()?,
            quote_asset_amount,
        })
    }

    /// Quote reserve once every open position is closed back into the pool.
    pub fn terminal_quote_asset_reserve(&self) -> MathResult<QuoteReserve> {
        let k = self.k()?;
        let terminal_base = self.base_asset_reserve.checked_add(self.net_base_asset_amount)?;
        if !terminal_base.is_positive() {
            return Err(InvariantViolation::NonPositiveReserve(ReserveSide::Base));
        }
        k.div_to(terminal_base)
    }

    /// Reserves used to quote one side of the book. Long (ask) shifts the quote
    /// reserve up by half the long spread, Short (bid) shifts it down by half the
    /// short spread. The base reserve is re-derived from `k`, floored for Long and
    /// ceiled for Short, so `bid <= reserve price <= ask` holds exactly.
    pub fn spread_reserves(&self, direction: PositionDirection) -> MathResult<(BaseAmount, QuoteReserve)> {
        let k = self.k()?;
        let spread = match direction {
            PositionDirection::Long => self.long_spread,
            PositionDirection::Short => self.short_spread,
        };
        let quote_delta: QuoteReserve = self
            .quote_asset_reserve
            .checked_mul(spread)?
            .rescale::<QuoteReservePrecision>()?
            .div_int(2)?;

        match direction {
            PositionDirection::Long => {
                let quote = self.quote_asset_reserve.checked_add(quote_delta)?;
                Ok((k.div_to(quote)?, quote))
            }
            PositionDirection::Short => {
                let quote = self.quote_asset_reserve.checked_sub(quote_delta)?;
                if !quote.is_positive() {
                    return Err(InvariantViolation::NonPositiveReserve(ReserveSide::Quote));
                }
                Ok((k.div_to_ceil(quote)?, quote))
            }
        }
    }

    /// Base liquidity the pool can still take on each side before hitting its
    /// reserve bounds. Bids are positive, asks negative.
    pub fn market_open_bids_asks(&self) -> MathResult<(BaseAmount, BaseAmount)> {
        let bids = self.base_asset_reserve.checked_sub(self.min_base_asset_reserve)?;
        let asks = self.max_base_asset_reserve.checked_sub(self.base_asset_reserve)?.checked_neg()?;
        Ok((bids.max(BaseAmount::ZERO), asks.min(BaseAmount::ZERO)))
    }

    /// Largest trade that moves the reserve price to `limit_price`, and the side
    /// that trade is on. `None` when the pool already sits at the limit.
    pub fn max_base_asset_amount_to_price(
        &self,
        limit_price: Price,
    ) -> MathResult<Option<(BaseAmount, PositionDirection)>> {
        let k = self.k()?;
        // price = k * peg / base^2  =>  base = sqrt(k * peg / price)
        let squared: Wide<BasePrecision, BasePrecision> = Wide::from_raw(
            div_round(
                k.raw()
                    .checked_mul(self.peg_multiplier.raw())
                    .ok_or(InvariantViolation::Overflow("max_base_asset_amount_to_price"))?,
                limit_price.raw(),
                Rounding::Truncate,
                "max_base_asset_amount_to_price",
            )?,
        );
        let new_base = squared.sqrt()?;

        if new_base > self.base_asset_reserve {
            Ok(Some((new_base.checked_sub(self.base_asset_reserve)?, PositionDirection::Short)))
        } else if new_base < self.base_asset_reserve {
            Ok(Some((self.base_asset_reserve.checked_sub(new_base)?, PositionDirection::Long)))
        } else {
            Ok(None)
        }
    }
}

pub fn reserve_price(base: BaseAmount, quote: QuoteReserve, peg: Peg) -> MathResult<Price> {
    if !base.is_positive() {
        return Err(InvariantViolation::NonPositiveReserve(ReserveSide::Base));
    }
    if !quote.is_positive() {
        return Err(InvariantViolation::NonPositiveReserve(ReserveSide::Quote));
    }
    quote.mul_div(peg, base)
}

/// Quote reserve units to quote amount through the peg, truncated.
pub fn reserve_to_quote(reserve: QuoteReserve, peg: Peg) -> MathResult<QuoteAmount> {
    reserve.checked_mul(peg)?.rescale()
}

/// Round `base_asset_amount` down to a multiple of `step_size`.
pub fn standardize_base_asset_amount(
    base_asset_amount: BaseAmount,
    step_size: BaseAmount,
) -> MathResult<BaseAmount> {
    if step_size.is_zero() {
        return Err(InvariantViolation::DivisionByZero("standardize_base_asset_amount"));
    }
    let remainder = base_asset_amount.raw() % step_size.raw();
    base_asset_amount.checked_sub(BaseAmount::from_raw(remainder))
}

/// Long and short spreads for the current state. Each side starts at half the
/// base spread; the side that would trade through the oracle is widened by the
/// divergence, the side that adds to the inventory skew is scaled by it, and the
/// total is clamped to `max_spread`.
pub fn calculate_spreads(amm: &Amm, oracle_price: Price) -> CoreResult<(Spread, Spread)> {
    if !oracle_price.is_positive() {
        return Err(DomainError::NonPositiveOraclePrice(oracle_price.raw()).into());
    }
    let half = amm.base_spread.div_int(2)?;
    let mut long_spread = half;
    let mut short_spread = half;

    let reserve_price = amm.reserve_price()?;
    let divergence: Spread = reserve_price
        .checked_sub(oracle_price)?
        .div_to::<PricePrecision, SpreadPrecision>(oracle_price)?;
    if divergence.is_negative() {
        long_spread = long_spread.checked_add(divergence.abs()?)?;
    } else {
        short_spread = short_spread.checked_add(divergence)?;
    }

    // skew as a fraction of the base reserve, capped at 10x
    let skew: Spread = amm
        .net_base_asset_amount
        .abs()?
        .div_to::<BasePrecision, SpreadPrecision>(amm.base_asset_reserve)?;
    let scale = Spread::from_raw(SPREAD_PRECISION)
        .checked_add(skew)?
        .min(Spread::from_raw(SPREAD_PRECISION * 10));
    if amm.net_base_asset_amount.is_positive() {
        long_spread = long_spread.checked_mul(scale)?.rescale()?;
    } else if amm.net_base_asset_amount.is_negative() {
        short_spread = short_spread.checked_mul(scale)?.rescale()?;
    }

    let total = long_spread.checked_add(short_spread)?;
    if total > amm.max_spread {
        if amm.max_spread.is_zero() || total.is_zero() {
            return Ok((Spread::ZERO, Spread::ZERO));
        }
        let clamped_long: Spread = long_spread.mul_div(amm.max_spread, total)?;
        let clamped_short = amm.max_spread.checked_sub(clamped_long)?;
        log::debug!(
            "spread clamped to max {}: long {} -> {}, short {} -> {}",
            amm.max_spread,
            long_spread,
            clamped_long,
            short_spread,
            clamped_short
        );
        return Ok((clamped_long, clamped_short));
    }
    Ok((long_spread, short_spread))
}

/// Amm with its long/short spreads refreshed against `oracle_price`.
pub fn update_spreads(amm: &Amm, oracle_price: Price) -> CoreResult<Amm> {
    let (long_spread, short_spread) = calculate_spreads(amm, oracle_price)?;
    Ok(Amm {
        long_spread,
        short_spread,
        ..amm.clone()
    })
}

/// One side of the open liquidity is at least `AMM_JIT_IMBALANCE_RATIO` times the
/// other. A pool with liquidity on one side only counts as imbalanced.
pub fn is_imbalanced(bids: BaseAmount, asks: BaseAmount) -> MathResult<bool> {
    let bids = bids.abs()?;
    let asks = asks.abs()?;
    let larger = bids.max(asks);
    let smaller = bids.min(asks);
    if smaller.is_zero() {
        return Ok(larger.is_positive());
    }
    Ok(larger >= smaller.mul_int(AMM_JIT_IMBALANCE_RATIO)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BASE_PRECISION, PEG_PRECISION, PRICE_PRECISION};

    fn market_amm() -> Amm {
        // 5e14 = 5e9 scaled by a 1e5 mantissa
        Amm::balanced(500_000_000_000_000, Peg::one())
    }

    #[test]
    fn balanced_pool_prices_at_peg() {
        let amm = market_amm();
        assert_eq!(amm.reserve_price().unwrap().raw(), PRICE_PRECISION);
    }

    #[test]
    fn long_swap_matches_fill_scenario() {
        let amm = market_amm().with_reserves(
            BaseAmount::from_raw(550_000_000_000_000),
            QuoteReserve::from_raw(500_000_000_000_000),
        );
        let out = amm
            .swap_base_asset(BaseAmount::from_raw(BASE_PRECISION), SwapDirection::Remove)
            .unwrap();
        assert_eq!(out.base_asset_reserve.raw(), 549_999_000_000_000);
        assert_eq!(out.quote_asset_amount.raw(), 909_093);
    }

    #[test]
    fn short_swap_matches_fill_scenario() {
        let amm = market_amm().with_reserves(
            BaseAmount::from_raw(500_000_000_000_000),
            QuoteReserve::from_raw(550_000_000_000_000),
        );
        let out = amm
            .swap_base_asset(BaseAmount::from_raw(BASE_PRECISION), SwapDirection::Add)
            .unwrap();
        assert_eq!(out.quote_asset_amount.raw(), 1_099_997);
    }

    #[test]
    fn swap_preserves_k() {
        let amm = market_amm();
        let k = amm.k().unwrap().raw();
        let out = amm
            .swap_base_asset(BaseAmount::from_raw(123_456_789_000), SwapDirection::Add)
            .unwrap();
        let after = out.base_asset_reserve.raw() * out.quote_asset_reserve.raw();
        assert!(after <= k);
        assert!(k - after < out.base_asset_reserve.raw());
    }

    #[test]
    fn swap_quote_mirrors_swap_base() {
        let amm = market_amm();
        let out = amm
            .swap_quote_asset(QuoteAmount::from_raw(1_000_000), SwapDirection::Add)
            .unwrap();
        assert!(out.base_asset_reserve < amm.base_asset_reserve);
        assert_eq!(out.quote_asset_reserve.raw(), 500_001_000_000_000);
        // slightly less than one base for one quote on a balanced pool
        assert_eq!(out.base_asset_reserve.raw(), 499_999_000_002_000);
        assert_eq!(out.base_asset_amount.raw(), 999_998_000);
    }

    #[test]
    fn removing_whole_reserve_is_rejected() {
        let amm = market_amm();
        let err = amm
            .swap_base_asset(amm.base_asset_reserve, SwapDirection::Remove)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Domain(DomainError::InsufficientReserves { .. })
        ));
    }

    #[test]
    fn zero_reserve_is_fatal() {
        let amm = Amm::default();
        let err = amm
            .swap_base_asset(BaseAmount::from_raw(1), SwapDirection::Add)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(
            amm.reserve_price(),
            Err(InvariantViolation::NonPositiveReserve(ReserveSide::Base))
        );
    }

    #[test]
    fn spread_reserves_bracket_reserve_price() {
        let amm = Amm {
            long_spread: Spread::from_raw(1_000),
            short_spread: Spread::from_raw(2_000),
            ..market_amm()
        };
        let mark = amm.reserve_price().unwrap();
        let (ab, aq) = amm.spread_reserves(PositionDirection::Long).unwrap();
        let (bb, bq) = amm.spread_reserves(PositionDirection::Short).unwrap();
        let ask = reserve_price(ab, aq, amm.peg_multiplier).unwrap();
        let bid = reserve_price(bb, bq, amm.peg_multiplier).unwrap();
        assert!(bid < mark && mark < ask, "{} {} {}", bid, mark, ask);
        // 0.1% spread halves to 5bps on the quote reserve, about 10bps on price
        assert_eq!(ask.raw(), 1_001_000);
    }

    #[test]
    fn open_bids_and_asks() {
        let amm = Amm {
            min_base_asset_reserve: BaseAmount::from_raw(50),
            max_base_asset_reserve: BaseAmount::from_raw(100),
            base_asset_reserve: BaseAmount::from_raw(75),
            quote_asset_reserve: QuoteReserve::from_raw(75),
            ..Amm::default()
        };
        let (bids, asks) = amm.market_open_bids_asks().unwrap();
        assert_eq!(bids.raw(), 25);
        assert_eq!(asks.raw(), -25);
    }

    #[test]
    fn standardize_to_step() {
        let step = BaseAmount::from_raw(BASE_PRECISION / 10);
        let amount = BaseAmount::from_raw(1_234_567_890);
        assert_eq!(standardize_base_asset_amount(amount, step).unwrap().raw(), 1_200_000_000);
        assert!(standardize_base_asset_amount(amount, BaseAmount::ZERO).is_err());
    }

    #[test]
    fn max_base_to_limit_price() {
        let amm = market_amm();
        let (size, direction) = amm
            .max_base_asset_amount_to_price(Price::from_raw(PRICE_PRECISION * 121 / 100))
            .unwrap()
            .unwrap();
        assert_eq!(direction, PositionDirection::Long);
        // sqrt(1/1.21) = 1/1.1 of the reserve remains
        let remaining = amm.base_asset_reserve.raw() - size.raw();
        assert!((remaining - 454_545_454_545_454).abs() <= 1);

        assert_eq!(
            amm.max_base_asset_amount_to_price(Price::from_raw(PEG_PRECISION)).unwrap(),
            None
        );
    }

    #[test]
    fn spreads_widen_toward_oracle_and_clamp() {
        let amm = Amm {
            base_spread: Spread::from_raw(1_000),
            max_spread: Spread::from_raw(10_000),
            ..market_amm()
        };
        let (long, short) = calculate_spreads(&amm, Price::from_raw(PRICE_PRECISION)).unwrap();
        assert_eq!((long.raw(), short.raw()), (500, 500));

        // oracle 1% above the pool: longs pay the divergence
        let (long, short) = calculate_spreads(&amm, Price::from_raw(1_010_000)).unwrap();
        assert!(long.raw() > 500 + 9_000);
        assert_eq!(long.raw() + short.raw(), 10_000);
        assert!(short.raw() < 500);
    }
}
