//! Repeg: move the peg multiplier toward the oracle.
//!
//! A repeg changes the price of the existing curve without touching the
//! reserves, so `k` is unchanged. It is not free: if users are net long, raising
//! the peg pays them. That cost comes out of `total_fee_minus_distributions` and
//! a repeg the budget can't cover is shrunk until it can.

use crate::amm::Amm;
use crate::error::{CoreResult, DomainError, InvariantViolation, MathResult, ReserveSide};
use crate::oracle::OraclePriceData;
use crate::precision::{isqrt, Peg, Price, QuoteAmount, QuoteReserve};

/// Peg at which the current reserves would price at `oracle_price`. Never below one unit.
pub fn calculate_optimal_peg(amm: &Amm, oracle_price: Price) -> MathResult<Peg> {
    amm.check_reserves()?;
    let peg: Peg = oracle_price.mul_div(amm.base_asset_reserve, amm.quote_asset_reserve)?;
    Ok(peg.max(Peg::from_raw(1)))
}

/// What the pool pays users if every position were closed after moving the peg
/// to `new_peg`. Positive is a cost to the pool. Rounded up.
pub fn calculate_repeg_cost(amm: &Amm, new_peg: Peg) -> MathResult<QuoteAmount> {
    let terminal = amm.terminal_quote_asset_reserve()?;
    let reserve_delta = amm.quote_asset_reserve.checked_sub(terminal)?;
    let peg_delta = new_peg.checked_sub(amm.peg_multiplier)?;
    reserve_delta.checked_mul(peg_delta)?.rescale_ceil()
}

/// Amm repegged toward the oracle by `curve_update_intensity` percent of the gap,
/// clamped to the repeg budget. Returns the input unchanged when the intensity is
/// zero or the oracle price is not positive.
pub fn calculate_updated_amm(amm: &Amm, oracle: &OraclePriceData) -> MathResult<Amm> {
    if amm.curve_update_intensity == 0 || !oracle.price.is_positive() {
        return Ok(amm.clone());
    }

    let optimal_peg = calculate_optimal_peg(amm, oracle.price)?;
    let full_delta = optimal_peg.checked_sub(amm.peg_multiplier)?;
    let intensity = amm.curve_update_intensity.min(100) as i128;
    let mut peg_delta = full_delta.mul_int(intensity)?.div_int(100)?;

    let mut cost = calculate_repeg_cost(amm, amm.peg_multiplier.checked_add(peg_delta)?)?;
    let budget = amm.total_fee_minus_distributions.max(QuoteAmount::ZERO);
    if cost > budget {
        let terminal = amm.terminal_quote_asset_reserve()?;
        let reserve_delta = amm.quote_asset_reserve.checked_sub(terminal)?.abs()?;
        // cost = reserve_delta * peg_delta / 1e9  =>  peg_delta <= budget * 1e9 / reserve_delta
        let affordable: Peg = budget.div_to(reserve_delta)?;
        let clamped = affordable.mul_int(peg_delta.signum())?;
        log::debug!(
            "repeg clamped by budget {}: peg delta {} -> {}",
            budget,
            peg_delta,
            clamped
        );
        peg_delta = clamped;
        cost = calculate_repeg_cost(amm, amm.peg_multiplier.checked_add(peg_delta)?)?;
    }

    let new_peg = amm
        .peg_multiplier
        .checked_add(peg_delta)?
        .max(Peg::from_raw(1));

    Ok(Amm {
        peg_multiplier: new_peg,
        total_fee_minus_distributions: amm.total_fee_minus_distributions.checked_sub(cost)?,
        last_oracle_price: oracle.price,
        ..amm.clone()
    })
}

/// Redistribute the reserves so the reserve price lands on `target_price` with
/// the peg held fixed. `k` is kept to within one quote reserve's worth of rounding.
pub fn rebalance_reserves(amm: &Amm, target_price: Price) -> CoreResult<Amm> {
    if !target_price.is_positive() {
        return Err(DomainError::NonPositiveOraclePrice(target_price.raw()).into());
    }
    let k = amm.k()?;
    // price = quote * peg / base and base = k / quote  =>  quote = sqrt(k * price / peg)
    let squared = k
        .raw()
        .checked_mul(target_price.raw())
        .ok_or(InvariantViolation::Overflow("rebalance_reserves"))?
        .checked_div(amm.peg_multiplier.raw())
        .ok_or(InvariantViolation::DivisionByZero("rebalance_reserves"))?;
    if squared < 0 {
        return Err(InvariantViolation::NegativeBalance("rebalance_reserves").into());
    }
    let new_quote = QuoteReserve::from_raw(isqrt(squared as u128) as i128);
    if !new_quote.is_positive() {
        return Err(InvariantViolation::NonPositiveReserve(ReserveSide::Quote).into());
    }
    let new_base = k.div_to(new_quote)?;
    Ok(amm.with_reserves(new_base, new_quote))
}
