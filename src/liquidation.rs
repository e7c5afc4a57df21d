//! Liquidation sizing and settlement.
//!
//! An account is under-margined when its maintenance collateral is below the
//! maintenance requirement, or when it is already being liquidated and has not
//! yet climbed back above initial margin. Both operations here read a user and
//! a [`MarketSnapshot`], and hand back the post-liquidation user plus exactly
//! one [`LiquidationRecord`]. Nothing is committed; the caller serializes work
//! per account and applies the result to the ledger.

use crate::account::{UserAccount, UserStatus};
use crate::constants::LIQUIDATION_FEE_TO_MARGIN_PRECISION_RATIO;
use crate::error::{CoreResult, DomainError, InvariantViolation};
use crate::events::{LiquidatePerpPnlForDepositRecord, LiquidatePerpRecord, LiquidationKind, LiquidationRecord};
use crate::margin::{calculate_margin_requirement_and_total_collateral, MarginCalculation, MarginRequirementType};
use crate::market::PerpMarket;
use crate::oracle::OraclePriceData;
use crate::position::{apply_position_delta, base_asset_value, calculate_unrealized_pnl, PositionDelta};
use crate::precision::{
    BaseAmount, BasePrecision, LiquidationFee, Price, PricePrecision, QuoteAmount, Rounding, TokenAmount,
};
use crate::pricing::market_available_pnl;
use crate::snapshot::MarketSnapshot;
use crate::spot_position::update_spot_balances;
use crate::types::{AccountId, MarketIndex, PositionDirection, SpotBalanceType, Timestamp};
use serde::{Deserialize, Serialize};

/// Who is liquidating, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationContext {
    pub now: Timestamp,
    pub liquidator: AccountId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoOpReason {
    SufficientCollateral,
    PnlNotNegative,
    NoDepositInAssetMarket,
    NoPositionToLiquidate,
    NothingToTransfer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationOutcome {
    Liquidated {
        user: UserAccount,
        record: LiquidationRecord,
    },
    NoOp(NoOpReason),
}

impl LiquidationOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, LiquidationOutcome::NoOp(_))
    }
}

fn log_outcome(op: &str, user: &UserAccount, result: &CoreResult<LiquidationOutcome>) {
    match result {
        Ok(LiquidationOutcome::Liquidated { record, .. }) => log::info!(
            "{op}: user {} liquidation {} by {}, requirement {} collateral {}",
            user.account_id,
            record.liquidation_id,
            record.liquidator,
            record.margin_requirement,
            record.total_collateral
        ),
        Ok(LiquidationOutcome::NoOp(reason)) => {
            log::debug!("{op}: user {} not liquidated: {:?}", user.account_id, reason)
        }
        Err(e) if e.is_fatal() => log::error!("{op}: user {}: {}", user.account_id, e),
        Err(e) => log::warn!("{op}: user {}: {}", user.account_id, e),
    }
}

// the failing margin check, or None when the account is healthy
fn failing_margin_check(user: &UserAccount, snapshot: &MarketSnapshot) -> CoreResult<Option<MarginCalculation>> {
    let maintenance =
        calculate_margin_requirement_and_total_collateral(user, snapshot, MarginRequirementType::Maintenance)?;
    if !maintenance.meets_margin_requirement() {
        return Ok(Some(maintenance));
    }
    if user.status == UserStatus::BeingLiquidated {
        let initial =
            calculate_margin_requirement_and_total_collateral(user, snapshot, MarginRequirementType::Initial)?;
        if !initial.meets_margin_requirement() {
            return Ok(Some(initial));
        }
    }
    Ok(None)
}

fn checked_oracle(snapshot: &MarketSnapshot, market_index: MarketIndex) -> CoreResult<OraclePriceData> {
    let oracle = *snapshot.perp_oracle(market_index)?;
    if !oracle.price.is_positive() {
        return Err(DomainError::NonPositiveOraclePrice(oracle.price.raw()).into());
    }
    Ok(oracle)
}

// 1 + fee, at fee precision
fn fee_premium(fee: LiquidationFee) -> CoreResult<LiquidationFee> {
    Ok(LiquidationFee::one().checked_add(fee)?)
}

/// Settle a user's negative perp pnl against one of their deposits.
///
/// `pnl_transfer = min(loss, max_pnl_transfer, pool available pnl, deposit value)`.
/// The liquidator takes `pnl_transfer * (1 + liquidator_fee)` of the deposit at the
/// asset's oracle price, rounded up and capped at the whole deposit.
pub fn liquidate_perp_pnl_for_deposit(
    ctx: &LiquidationContext,
    user: &UserAccount,
    perp_market_index: MarketIndex,
    asset_market_index: MarketIndex,
    max_pnl_transfer: QuoteAmount,
    snapshot: &MarketSnapshot,
) -> CoreResult<LiquidationOutcome> {
    let result = pnl_for_deposit(ctx, user, perp_market_index, asset_market_index, max_pnl_transfer, snapshot);
    log_outcome("liquidate_perp_pnl_for_deposit", user, &result);
    result
}

fn pnl_for_deposit(
    ctx: &LiquidationContext,
    user: &UserAccount,
    perp_market_index: MarketIndex,
    asset_market_index: MarketIndex,
    max_pnl_transfer: QuoteAmount,
    snapshot: &MarketSnapshot,
) -> CoreResult<LiquidationOutcome> {
    if !max_pnl_transfer.is_positive() {
        return Err(DomainError::NonPositiveAmount(max_pnl_transfer.raw()).into());
    }
    let market = snapshot.perp_market(perp_market_index)?;
    let oracle = checked_oracle(snapshot, perp_market_index)?;
    let asset_market = snapshot.spot_market(asset_market_index)?;
    let asset_price = snapshot.spot_oracle_price(asset_market_index)?;

    let Some(margin) = failing_margin_check(user, snapshot)? else {
        return Ok(LiquidationOutcome::NoOp(NoOpReason::SufficientCollateral));
    };

    let position = user.get_perp_position(perp_market_index)?;
    let pnl = calculate_unrealized_pnl(position, oracle.price)?;
    if !pnl.is_negative() {
        return Ok(LiquidationOutcome::NoOp(NoOpReason::PnlNotNegative));
    }

    let Some(deposit) = user
        .get_spot_position(asset_market_index)
        .filter(|p| p.balance_type == SpotBalanceType::Deposit && !p.balance.is_zero())
    else {
        return Ok(LiquidationOutcome::NoOp(NoOpReason::NoDepositInAssetMarket));
    };
    let deposit_amount = deposit.token_amount(asset_market)?;

    let pool_available = pool_available_value(market, snapshot)?;
    let deposit_value = deposit_amount.value_in_quote(asset_price)?;
    let pnl_transfer = pnl
        .abs()?
        .min(max_pnl_transfer)
        .min(pool_available)
        .min(deposit_value);
    if !pnl_transfer.is_positive() {
        return Ok(LiquidationOutcome::NoOp(NoOpReason::NothingToTransfer));
    }

    let value_with_fee: QuoteAmount = pnl_transfer
        .checked_mul(fee_premium(market.liquidator_fee)?)?
        .rescale_ceil()?;
    let asset_transfer =
        TokenAmount::from_quote_value(value_with_fee, asset_price, asset_market.decimals, Rounding::Ceil)?
            .min(deposit_amount)?;

    let mut updated = user.clone();
    // the deposit moves to the liquidator, so the bank's totals net out; only the
    // user's side is returned
    let (_, debited) = update_spot_balances(asset_transfer, SpotBalanceType::Borrow, asset_market, deposit, false)?;
    if let Some(slot) = updated.get_spot_position_mut(asset_market_index) {
        *slot = debited;
    }
    let perp = updated.get_perp_position_mut(perp_market_index)?;
    perp.quote_asset_amount = perp.quote_asset_amount.checked_add(pnl_transfer)?;
    updated.status = UserStatus::BeingLiquidated;
    let liquidation_id = updated.take_liquidation_id();

    let record = LiquidationRecord {
        liquidation_id,
        ts: ctx.now,
        user: user.account_id,
        liquidator: ctx.liquidator,
        margin_requirement: margin.margin_requirement,
        total_collateral: margin.total_collateral,
        kind: LiquidationKind::LiquidatePerpPnlForDeposit(LiquidatePerpPnlForDepositRecord {
            perp_market_index,
            market_oracle_price: oracle.price,
            pnl_transfer,
            asset_market_index,
            asset_price,
            asset_transfer,
        }),
    };
    Ok(LiquidationOutcome::Liquidated { user: updated, record })
}

// what the market's pnl pool can pay, valued in quote
fn pool_available_value(market: &PerpMarket, snapshot: &MarketSnapshot) -> CoreResult<QuoteAmount> {
    let pool_index = market.pnl_pool.market_index;
    let bank = snapshot.spot_market(pool_index)?;
    let tokens = market_available_pnl(market, bank)?;
    Ok(tokens.value_in_quote(snapshot.spot_oracle_price(pool_index)?)?)
}

/// Move part of an under-margined perp position to the liquidator.
///
/// The liquidator takes base at the oracle price discounted by the market's
/// liquidator fee (premium for shorts). The size is the least of the position,
/// `max_base_transfer`, and what it takes to cover the margin shortage: each
/// base closed frees `oracle * (margin_ratio - liquidator_fee)` of requirement.
pub fn liquidate_perp(
    ctx: &LiquidationContext,
    user: &UserAccount,
    perp_market_index: MarketIndex,
    max_base_transfer: BaseAmount,
    snapshot: &MarketSnapshot,
) -> CoreResult<LiquidationOutcome> {
    let result = perp(ctx, user, perp_market_index, max_base_transfer, snapshot);
    log_outcome("liquidate_perp", user, &result);
    result
}

fn perp(
    ctx: &LiquidationContext,
    user: &UserAccount,
    perp_market_index: MarketIndex,
    max_base_transfer: BaseAmount,
    snapshot: &MarketSnapshot,
) -> CoreResult<LiquidationOutcome> {
    if !max_base_transfer.is_positive() {
        return Err(DomainError::NonPositiveAmount(max_base_transfer.raw()).into());
    }
    let market = snapshot.perp_market(perp_market_index)?;
    let oracle = checked_oracle(snapshot, perp_market_index)?;

    let Some(margin) = failing_margin_check(user, snapshot)? else {
        return Ok(LiquidationOutcome::NoOp(NoOpReason::SufficientCollateral));
    };

    let position = user.get_perp_position(perp_market_index)?;
    let Some(direction) = position.direction() else {
        return Ok(LiquidationOutcome::NoOp(NoOpReason::NoPositionToLiquidate));
    };
    let position_size = position.base_asset_amount.abs()?;

    let base_to_cover = base_to_cover_shortage(market, &margin, oracle.price)?.unwrap_or(position_size);
    let transfer = position_size.min(max_base_transfer).min(base_to_cover);
    if !transfer.is_positive() {
        return Ok(LiquidationOutcome::NoOp(NoOpReason::NothingToTransfer));
    }

    let fee = market.liquidator_fee;
    let (liquidation_price, quote_asset_amount) = match direction {
        PositionDirection::Long => {
            let price: Price = oracle
                .price
                .checked_mul(LiquidationFee::one().checked_sub(fee)?)?
                .rescale()?;
            (price, base_asset_value(transfer, price)?)
        }
        PositionDirection::Short => {
            let price: Price = oracle.price.checked_mul(fee_premium(fee)?)?.rescale_ceil()?;
            let paid: QuoteAmount = transfer.checked_mul(price)?.rescale_ceil()?;
            (price, paid.checked_neg()?)
        }
    };
    let oracle_value = base_asset_value(transfer, oracle.price)?;
    let liquidator_fee_amount = oracle_value.checked_sub(quote_asset_amount.abs()?)?.abs()?;
    log::debug!(
        "liquidate_perp: {} base of market {} at {} (oracle {})",
        transfer,
        perp_market_index,
        liquidation_price,
        oracle.price
    );

    let delta = PositionDelta {
        base_asset_amount: transfer.mul_int(-direction.sign())?,
        quote_asset_amount,
    };
    let update = apply_position_delta(position, &delta)?;

    let mut updated = user.clone();
    *updated.get_perp_position_mut(perp_market_index)? = update.position;
    updated.status = UserStatus::BeingLiquidated;
    let liquidation_id = updated.take_liquidation_id();

    let record = LiquidationRecord {
        liquidation_id,
        ts: ctx.now,
        user: user.account_id,
        liquidator: ctx.liquidator,
        margin_requirement: margin.margin_requirement,
        total_collateral: margin.total_collateral,
        kind: LiquidationKind::LiquidatePerp(LiquidatePerpRecord {
            market_index: perp_market_index,
            oracle_price: oracle.price,
            base_asset_amount: delta.base_asset_amount,
            quote_asset_amount,
            liquidator_fee: fee,
            liquidator_fee_amount,
        }),
    };
    Ok(LiquidationOutcome::Liquidated { user: updated, record })
}

// base that must be closed to cover the shortage, None when closing frees nothing
fn base_to_cover_shortage(
    market: &PerpMarket,
    margin: &MarginCalculation,
    oracle_price: Price,
) -> CoreResult<Option<BaseAmount>> {
    let ratio = match margin.margin_type {
        MarginRequirementType::Initial => market.margin_ratio_initial,
        MarginRequirementType::Maintenance => market.margin_ratio_maintenance,
    };
    let freed_fraction = ratio
        .raw()
        .checked_mul(LIQUIDATION_FEE_TO_MARGIN_PRECISION_RATIO)
        .map(LiquidationFee::from_raw)
        .ok_or(InvariantViolation::Overflow("freed_fraction"))?
        .checked_sub(market.liquidator_fee)?;
    if !freed_fraction.is_positive() {
        return Ok(None);
    }
    let freed_per_base: Price = oracle_price.checked_mul(freed_fraction)?.rescale()?;
    if !freed_per_base.is_positive() {
        return Ok(None);
    }
    let shortage = margin.margin_shortage()?;
    Ok(Some(shortage.div_to_ceil::<PricePrecision, BasePrecision>(freed_per_base)?))
}
