// 6.0: perp position tracking. a position is signed base plus two quote legs:
// quote_asset_amount is every cash flow so far (pnl lives here), quote_entry_amount is
// the cost basis of what's still open. pnl = base value at oracle + quote_asset_amount.
// 6.1 has open/increase/reduce/flip at the bottom.

use crate::amm::Amm;
use crate::error::MathResult;
use crate::precision::{BaseAmount, BasePrecision, Price, PricePrecision, QuoteAmount};
use crate::types::{MarketIndex, PositionDirection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpPosition {
    pub market_index: MarketIndex,
    pub base_asset_amount: BaseAmount,
    pub quote_asset_amount: QuoteAmount,
    pub quote_entry_amount: QuoteAmount,
}

impl PerpPosition {
    pub fn new(market_index: MarketIndex) -> Self {
        Self {
            market_index,
            base_asset_amount: BaseAmount::ZERO,
            quote_asset_amount: QuoteAmount::ZERO,
            quote_entry_amount: QuoteAmount::ZERO,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.base_asset_amount.is_zero()
    }

    /// Nothing open and nothing left to settle.
    pub fn is_available(&self) -> bool {
        !self.is_open() && self.quote_asset_amount.is_zero()
    }

    pub fn direction(&self) -> Option<PositionDirection> {
        if self.base_asset_amount.is_positive() {
            Some(PositionDirection::Long)
        } else if self.base_asset_amount.is_negative() {
            Some(PositionDirection::Short)
        } else {
            None
        }
    }

    /// Average entry price of the open base, from the cost basis.
    pub fn entry_price(&self) -> MathResult<Option<Price>> {
        if !self.is_open() {
            return Ok(None);
        }
        let price: Price = self
            .quote_entry_amount
            .abs()?
            .div_to::<BasePrecision, PricePrecision>(self.base_asset_amount.abs()?)?;
        Ok(Some(price))
    }

    pub fn unrealized_pnl(&self, oracle_price: Price) -> MathResult<QuoteAmount> {
        calculate_unrealized_pnl(self, oracle_price)
    }

    // flat positions book their quote on the long side
    fn is_long_for_accounting(&self) -> bool {
        !self.base_asset_amount.is_negative()
    }
}

/// `|base| * price`, truncated to quote precision.
pub fn base_asset_value(base_asset_amount: BaseAmount, price: Price) -> MathResult<QuoteAmount> {
    base_asset_amount.abs()?.checked_mul(price)?.rescale()
}

// 6.0.1: signed base value at the oracle plus all cash flows so far
pub fn calculate_unrealized_pnl(position: &PerpPosition, oracle_price: Price) -> MathResult<QuoteAmount> {
    let value = base_asset_value(position.base_asset_amount, oracle_price)?;
    let signed_value = if position.base_asset_amount.is_negative() {
        value.checked_neg()?
    } else {
        value
    };
    signed_value.checked_add(position.quote_asset_amount)
}

/// One fill from the user's side: base in is positive, quote paid is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDelta {
    pub base_asset_amount: BaseAmount,
    pub quote_asset_amount: QuoteAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionUpdateType {
    Open,
    Increase,
    Reduce,
    Close,
    Flip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    pub position: PerpPosition,
    pub update_type: PositionUpdateType,
    pub realized_pnl: QuoteAmount,
}

pub fn get_position_update_type(position: &PerpPosition, delta: &PositionDelta) -> PositionUpdateType {
    let base = position.base_asset_amount;
    let delta_base = delta.base_asset_amount;
    if base.is_zero() {
        PositionUpdateType::Open
    } else if base.signum() == delta_base.signum() {
        PositionUpdateType::Increase
    } else if delta_base.raw().abs() < base.raw().abs() {
        PositionUpdateType::Reduce
    } else if delta_base.raw().abs() == base.raw().abs() {
        PositionUpdateType::Close
    } else {
        PositionUpdateType::Flip
    }
}

// 6.1: apply a fill. the cash flow always lands in quote_asset_amount; the cost basis
// moves with the open base and whatever leaves it on a reduce is realized pnl.
pub fn apply_position_delta(position: &PerpPosition, delta: &PositionDelta) -> MathResult<PositionUpdate> {
    let update_type = get_position_update_type(position, delta);
    let base = position.base_asset_amount;
    let delta_base = delta.base_asset_amount;
    let delta_quote = delta.quote_asset_amount;

    let (quote_entry_amount, realized_pnl) = match update_type {
        PositionUpdateType::Open | PositionUpdateType::Increase => {
            (position.quote_entry_amount.checked_add(delta_quote)?, QuoteAmount::ZERO)
        }
        PositionUpdateType::Reduce | PositionUpdateType::Close => {
            // cost basis of the closed slice, pro rata
            let closed_entry = position
                .quote_entry_amount
                .mul_int(delta_base.raw().abs())?
                .div_int(base.raw().abs())?;
            (
                position.quote_entry_amount.checked_sub(closed_entry)?,
                delta_quote.checked_add(closed_entry)?,
            )
        }
        PositionUpdateType::Flip => {
            // split the fill: the part that closes the old base, the rest opens the new side
            let closing_quote = delta_quote
                .mul_int(base.raw().abs())?
                .div_int(delta_base.raw().abs())?;
            (
                delta_quote.checked_sub(closing_quote)?,
                closing_quote.checked_add(position.quote_entry_amount)?,
            )
        }
    };

    let new_base = base.checked_add(delta_base)?;
    let quote_entry_amount = if new_base.is_zero() {
        QuoteAmount::ZERO
    } else {
        quote_entry_amount
    };

    Ok(PositionUpdate {
        position: PerpPosition {
            market_index: position.market_index,
            base_asset_amount: new_base,
            quote_asset_amount: position.quote_asset_amount.checked_add(delta_quote)?,
            quote_entry_amount,
        },
        update_type,
        realized_pnl,
    })
}

/// AMM aggregates after `before` became `after`: net base and the per-side quote totals.
pub fn update_market_with_delta(amm: &Amm, before: &PerpPosition, after: &PerpPosition) -> MathResult<Amm> {
    let mut updated = amm.clone();
    let delta_base = after.base_asset_amount.checked_sub(before.base_asset_amount)?;
    updated.net_base_asset_amount = updated.net_base_asset_amount.checked_add(delta_base)?;

    if before.is_long_for_accounting() {
        updated.quote_asset_amount_long = updated.quote_asset_amount_long.checked_sub(before.quote_asset_amount)?;
    } else {
        updated.quote_asset_amount_short = updated.quote_asset_amount_short.checked_sub(before.quote_asset_amount)?;
    }
    if after.is_long_for_accounting() {
        updated.quote_asset_amount_long = updated.quote_asset_amount_long.checked_add(after.quote_asset_amount)?;
    } else {
        updated.quote_asset_amount_short = updated.quote_asset_amount_short.checked_add(after.quote_asset_amount)?;
    }
    Ok(updated)
}
