//! Margin requirement and collateral for a whole account.
//!
//! Initial margin gates new risk and grows with position size along the IMF
//! premium curve. Maintenance margin is the flat floor below which an account
//! can be liquidated. Collateral is weighted spot deposits plus weighted
//! unrealized perp pnl; requirement is perp notional times the margin ratio
//! plus weighted spot borrows.

use crate::account::{UserAccount, UserStatus};
use crate::constants::{
    IMF_PRECISION, IMF_SQRT_DIVISOR, SIZE_PREMIUM_BASE_FRACTION_DENOMINATOR,
    SIZE_PREMIUM_BASE_FRACTION_NUMERATOR,
};
use crate::error::{CoreResult, DomainError, InvariantViolation, MathResult};
use crate::market::PerpMarket;
use crate::position::{base_asset_value, calculate_unrealized_pnl, PerpPosition};
use crate::precision::{div_round, isqrt, BaseAmount, ImfFactor, Precision, Price, QuoteAmount, Rounding, Scaled};
use crate::snapshot::MarketSnapshot;
use crate::spot_market::SpotMarket;
use crate::spot_position::SpotPosition;
use crate::types::SpotBalanceType;
use serde::{Deserialize, Serialize};

pub use crate::types::MarginRequirementType;

// floor(sqrt(10 * |size| + 1)), size at base precision
fn size_sqrt(size: BaseAmount) -> MathResult<i128> {
    let n = size
        .abs()?
        .raw()
        .checked_mul(10)
        .and_then(|v| v.checked_add(1))
        .ok_or(InvariantViolation::Overflow("size_sqrt"))?;
    Ok(isqrt(n as u128) as i128)
}

/// Liability weight (or margin ratio) for a position of `size`:
/// `max(base, 0.8 * base + sqrt(10 * size + 1) * imf / (1e5 * IMF / P))`.
/// Returns `base` unchanged when `imf_factor` is zero.
pub fn calculate_size_premium_liability_weight<P: Precision>(
    size: BaseAmount,
    imf_factor: ImfFactor,
    liability_weight: Scaled<P>,
) -> MathResult<Scaled<P>> {
    if imf_factor.is_zero() {
        return Ok(liability_weight);
    }
    let sqrt = size_sqrt(size)?;
    let numerator = liability_weight
        .mul_int(SIZE_PREMIUM_BASE_FRACTION_NUMERATOR)?
        .div_int(SIZE_PREMIUM_BASE_FRACTION_DENOMINATOR)?;
    let denominator = div_round(
        IMF_SQRT_DIVISOR * IMF_PRECISION,
        P::SCALE,
        Rounding::Truncate,
        "size_premium_denominator",
    )?;
    let premium = sqrt
        .checked_mul(imf_factor.raw())
        .ok_or(InvariantViolation::Overflow("size_premium"))?;
    let premium = div_round(premium, denominator, Rounding::Truncate, "size_premium")?;
    let weight = numerator.checked_add(Scaled::from_raw(premium))?;
    Ok(weight.max(liability_weight))
}

/// Asset weight for a deposit (or positive pnl) of `size`:
/// `min(base, 1.1 * IMF * P / (IMF + sqrt(10 * size + 1) * imf / 1e5))`.
/// Returns `base` unchanged when `imf_factor` is zero.
pub fn calculate_size_discount_asset_weight<P: Precision>(
    size: BaseAmount,
    imf_factor: ImfFactor,
    asset_weight: Scaled<P>,
) -> MathResult<Scaled<P>> {
    if imf_factor.is_zero() {
        return Ok(asset_weight);
    }
    let sqrt = size_sqrt(size)?;
    let numerator = (IMF_PRECISION + IMF_PRECISION / 10)
        .checked_mul(P::SCALE)
        .ok_or(InvariantViolation::Overflow("size_discount"))?;
    let scaled_imf = sqrt
        .checked_mul(imf_factor.raw())
        .ok_or(InvariantViolation::Overflow("size_discount"))?;
    let denominator = IMF_PRECISION
        .checked_add(scaled_imf / IMF_SQRT_DIVISOR)
        .ok_or(InvariantViolation::Overflow("size_discount"))?;
    let weight = div_round(numerator, denominator, Rounding::Truncate, "size_discount")?;
    Ok(Scaled::from_raw(weight).min(asset_weight))
}

/// Requirement and collateral one position contributes, both in quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionMargin {
    pub margin_requirement: QuoteAmount,
    pub collateral: QuoteAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginCalculation {
    pub margin_type: MarginRequirementType,
    pub margin_requirement: QuoteAmount,
    pub total_collateral: QuoteAmount,
    pub num_perp_positions: u16,
    pub num_spot_liabilities: u16,
}

impl MarginCalculation {
    pub fn new(margin_type: MarginRequirementType) -> Self {
        Self {
            margin_type,
            margin_requirement: QuoteAmount::ZERO,
            total_collateral: QuoteAmount::ZERO,
            num_perp_positions: 0,
            num_spot_liabilities: 0,
        }
    }

    pub fn meets_margin_requirement(&self) -> bool {
        self.total_collateral >= self.margin_requirement
    }

    /// Collateral above the requirement, floored at zero.
    pub fn free_collateral(&self) -> MathResult<QuoteAmount> {
        Ok(self
            .total_collateral
            .checked_sub(self.margin_requirement)?
            .max(QuoteAmount::ZERO))
    }

    /// How far collateral is below the requirement, floored at zero.
    pub fn margin_shortage(&self) -> MathResult<QuoteAmount> {
        Ok(self
            .margin_requirement
            .checked_sub(self.total_collateral)?
            .max(QuoteAmount::ZERO))
    }

    fn add(&mut self, margin: PositionMargin) -> MathResult<()> {
        self.margin_requirement = self.margin_requirement.checked_add(margin.margin_requirement)?;
        self.total_collateral = self.total_collateral.checked_add(margin.collateral)?;
        Ok(())
    }
}

/// Notional at the oracle times the margin ratio, and unrealized pnl weighted
/// by the market's unrealized asset weight.
pub fn calculate_perp_position_margin(
    position: &PerpPosition,
    market: &PerpMarket,
    oracle_price: Price,
    margin_type: MarginRequirementType,
) -> MathResult<PositionMargin> {
    let notional = base_asset_value(position.base_asset_amount, oracle_price)?;
    let ratio = market.margin_ratio(position.base_asset_amount, margin_type)?;
    let margin_requirement: QuoteAmount = notional.checked_mul(ratio)?.rescale_ceil()?;

    let pnl = calculate_unrealized_pnl(position, oracle_price)?;
    let weight = market.unrealized_asset_weight(pnl, margin_type)?;
    let collateral: QuoteAmount = pnl.checked_mul(weight)?.rescale()?;

    Ok(PositionMargin {
        margin_requirement,
        collateral,
    })
}

/// Deposits count as weighted collateral, borrows as weighted requirement.
/// Borrow values round up, deposit values round down.
pub fn calculate_spot_position_margin(
    position: &SpotPosition,
    spot_market: &SpotMarket,
    oracle_price: Price,
    margin_type: MarginRequirementType,
) -> MathResult<PositionMargin> {
    let token_amount = position.token_amount(spot_market)?;
    match position.balance_type {
        SpotBalanceType::Deposit => {
            let value = token_amount.value_in_quote(oracle_price)?;
            let weight = spot_market.asset_weight(token_amount, margin_type)?;
            Ok(PositionMargin {
                margin_requirement: QuoteAmount::ZERO,
                collateral: value.checked_mul(weight)?.rescale()?,
            })
        }
        SpotBalanceType::Borrow => {
            let value = token_amount.value_in_quote_ceil(oracle_price)?;
            let weight = spot_market.liability_weight(token_amount, margin_type)?;
            Ok(PositionMargin {
                margin_requirement: value.checked_mul(weight)?.rescale_ceil()?,
                collateral: QuoteAmount::ZERO,
            })
        }
    }
}

pub fn calculate_margin_requirement_and_total_collateral(
    user: &UserAccount,
    snapshot: &MarketSnapshot,
    margin_type: MarginRequirementType,
) -> CoreResult<MarginCalculation> {
    let mut calculation = MarginCalculation::new(margin_type);

    for position in user.spot_positions.iter().filter(|p| !p.balance.is_zero()) {
        let spot_market = snapshot.spot_market(position.market_index)?;
        let price = snapshot.spot_oracle_price(position.market_index)?;
        calculation.add(calculate_spot_position_margin(position, spot_market, price, margin_type)?)?;
        if position.balance_type == SpotBalanceType::Borrow {
            calculation.num_spot_liabilities += 1;
        }
    }

    for position in user.perp_positions.iter().filter(|p| !p.is_available()) {
        let market = snapshot.perp_market(position.market_index)?;
        let oracle = snapshot.perp_oracle(position.market_index)?;
        if !oracle.price.is_positive() {
            return Err(DomainError::NonPositiveOraclePrice(oracle.price.raw()).into());
        }
        calculation.add(calculate_perp_position_margin(position, market, oracle.price, margin_type)?)?;
        calculation.num_perp_positions += 1;
    }

    Ok(calculation)
}

pub fn meets_margin_requirement(
    user: &UserAccount,
    snapshot: &MarketSnapshot,
    margin_type: MarginRequirementType,
) -> CoreResult<bool> {
    Ok(calculate_margin_requirement_and_total_collateral(user, snapshot, margin_type)?.meets_margin_requirement())
}

/// Below maintenance, or already being liquidated and still below initial.
pub fn can_be_liquidated(user: &UserAccount, snapshot: &MarketSnapshot) -> CoreResult<bool> {
    if !meets_margin_requirement(user, snapshot, MarginRequirementType::Maintenance)? {
        return Ok(true);
    }
    if user.status == UserStatus::BeingLiquidated {
        return Ok(!meets_margin_requirement(user, snapshot, MarginRequirementType::Initial)?);
    }
    Ok(false)
}
