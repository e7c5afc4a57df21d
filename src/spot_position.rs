//! Spot positions: a balance on one side of a spot market plus open order tallies.
//!
//! All updates are pure. Each returns the new position (and spot market where
//! its totals move) for the caller to commit.

use crate::error::{CoreResult, DomainError, InvariantViolation, MathResult};
use crate::precision::{Balance, TokenAmount};
use crate::spot_market::{get_spot_balance, get_token_amount, SpotMarket};
use crate::types::{MarketIndex, PositionDirection, SpotBalanceType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotPosition {
    pub market_index: MarketIndex,
    pub balance_type: SpotBalanceType,
    pub balance: Balance,
    // token units; bids positive, asks negative
    pub open_bids: i128,
    pub open_asks: i128,
    pub cumulative_deposits: i128,
}

impl SpotPosition {
    pub fn new(market_index: MarketIndex) -> Self {
        Self {
            market_index,
            balance_type: SpotBalanceType::Deposit,
            balance: Balance::ZERO,
            open_bids: 0,
            open_asks: 0,
            cumulative_deposits: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.balance.is_zero() && self.open_bids == 0 && self.open_asks == 0
    }

    pub fn token_amount(&self, spot_market: &SpotMarket) -> MathResult<TokenAmount> {
        get_token_amount(self.balance, spot_market, self.balance_type)
    }

    /// Token amount signed by side: deposits positive, borrows negative.
    pub fn signed_token_amount(&self, spot_market: &SpotMarket) -> MathResult<TokenAmount> {
        let amount = self.token_amount(spot_market)?;
        match self.balance_type {
            SpotBalanceType::Deposit => Ok(amount),
            SpotBalanceType::Borrow => Ok(TokenAmount::new(
                amount
                    .amount
                    .checked_neg()
                    .ok_or(InvariantViolation::Overflow("signed_token_amount"))?,
                amount.decimals,
            )),
        }
    }
}

fn checked(value: Option<i128>, op: &'static str) -> MathResult<i128> {
    value.ok_or(InvariantViolation::Overflow(op))
}

pub fn increase_spot_open_bids_and_asks(
    position: &SpotPosition,
    direction: PositionDirection,
    base_asset_amount_unfilled: i128,
) -> MathResult<SpotPosition> {
    let mut updated = *position;
    match direction {
        PositionDirection::Long => {
            updated.open_bids = checked(updated.open_bids.checked_add(base_asset_amount_unfilled), "open_bids")?;
        }
        PositionDirection::Short => {
            updated.open_asks = checked(updated.open_asks.checked_sub(base_asset_amount_unfilled), "open_asks")?;
        }
    }
    Ok(updated)
}

pub fn decrease_spot_open_bids_and_asks(
    position: &SpotPosition,
    direction: PositionDirection,
    base_asset_amount_unfilled: i128,
) -> MathResult<SpotPosition> {
    let mut updated = *position;
    match direction {
        PositionDirection::Long => {
            updated.open_bids = checked(updated.open_bids.checked_sub(base_asset_amount_unfilled), "open_bids")?;
        }
        PositionDirection::Short => {
            updated.open_asks = checked(updated.open_asks.checked_add(base_asset_amount_unfilled), "open_asks")?;
        }
    }
    Ok(updated)
}

fn adjust_market_total(
    market: &mut SpotMarket,
    balance_type: SpotBalanceType,
    delta: Balance,
    increase: bool,
) -> MathResult<()> {
    let total = match balance_type {
        SpotBalanceType::Deposit => &mut market.deposit_balance,
        SpotBalanceType::Borrow => &mut market.borrow_balance,
    };
    let next = if increase {
        total.checked_add(delta)?
    } else {
        total.checked_sub(delta)?
    };
    if next.is_negative() {
        return Err(InvariantViolation::NegativeBalance(match balance_type {
            SpotBalanceType::Deposit => "deposit_balance",
            SpotBalanceType::Borrow => "borrow_balance",
        }));
    }
    *total = next;
    Ok(())
}

/// Move `token_amount` into the position in `update_direction`. A deposit into a
/// borrow pays it down first and flips the position to a deposit with whatever
/// is left, and the same the other way round. Balances added to a borrow round
/// up, balances added to a deposit round down, unless `force_round_up`.
pub fn update_spot_balances(
    token_amount: TokenAmount,
    update_direction: SpotBalanceType,
    spot_market: &SpotMarket,
    position: &SpotPosition,
    force_round_up: bool,
) -> MathResult<(SpotMarket, SpotPosition)> {
    if token_amount.decimals != spot_market.decimals {
        return Err(InvariantViolation::PrecisionMismatch {
            expected: spot_market.decimals,
            found: token_amount.decimals,
        });
    }
    let mut market = spot_market.clone();
    let mut updated = *position;
    let mut remaining = token_amount;

    if updated.balance_type != update_direction && !updated.balance.is_zero() {
        let existing = get_token_amount(updated.balance, &market, updated.balance_type)?;
        if remaining.amount <= existing.amount {
            // paying down a borrow removes balance rounded down, drawing a deposit rounds up
            let round_up = force_round_up || updated.balance_type == SpotBalanceType::Deposit;
            let removed = get_spot_balance(remaining, &market, updated.balance_type, round_up)?
                .min(updated.balance);
            updated.balance = updated.balance.checked_sub(removed)?;
            adjust_market_total(&mut market, updated.balance_type, removed, false)?;
            return Ok((market, updated));
        }
        let removed = updated.balance;
        adjust_market_total(&mut market, updated.balance_type, removed, false)?;
        updated.balance = Balance::ZERO;
        remaining = remaining.checked_sub(existing)?;
    }

    updated.balance_type = update_direction;
    let round_up = force_round_up || update_direction == SpotBalanceType::Borrow;
    let added = get_spot_balance(remaining, &market, update_direction, round_up)?;
    updated.balance = updated.balance.checked_add(added)?;
    adjust_market_total(&mut market, update_direction, added, true)?;
    Ok((market, updated))
}

/// [`update_spot_balances`] plus the running deposit tally.
pub fn update_spot_position_balance(
    token_amount: TokenAmount,
    update_direction: SpotBalanceType,
    spot_market: &SpotMarket,
    position: &SpotPosition,
    force_round_up: bool,
) -> MathResult<(SpotMarket, SpotPosition)> {
    let (market, mut updated) =
        update_spot_balances(token_amount, update_direction, spot_market, position, force_round_up)?;
    updated.cumulative_deposits = match update_direction {
        SpotBalanceType::Deposit => checked(
            updated.cumulative_deposits.checked_add(token_amount.amount),
            "cumulative_deposits",
        )?,
        SpotBalanceType::Borrow => checked(
            updated.cumulative_deposits.checked_sub(token_amount.amount),
            "cumulative_deposits",
        )?,
    };
    Ok((market, updated))
}

/// Move a deposit from one position to another in the same market.
pub fn transfer_spot_position_deposit(
    token_amount: TokenAmount,
    spot_market: &SpotMarket,
    from: &SpotPosition,
    to: &SpotPosition,
) -> CoreResult<(SpotMarket, SpotPosition, SpotPosition)> {
    if from.market_index != to.market_index {
        return Err(DomainError::SpotMarketMismatch {
            from: from.market_index,
            to: to.market_index,
        }
        .into());
    }
    let (market, from) =
        update_spot_position_balance(token_amount, SpotBalanceType::Borrow, spot_market, from, false)?;
    let (market, to) = update_spot_position_balance(token_amount, SpotBalanceType::Deposit, &market, to, false)?;
    Ok((market, from, to))
}
