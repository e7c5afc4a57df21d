//! Spot markets (banks) and balance <-> token conversion.
//!
//! Balances are stored scaled by the interest index of their side. The token
//! amount a balance is worth is `balance * index / 10^(19 - decimals)`, and the
//! deposit index must never be applied to a borrow or the other way round.

use crate::constants::{BALANCE_TIMES_INTEREST_DECIMALS, INTEREST_PRECISION, QUOTE_SPOT_MARKET_INDEX, WEIGHT_PRECISION};
use crate::error::{InvariantViolation, MathResult};
use crate::margin::{calculate_size_discount_asset_weight, calculate_size_premium_liability_weight};
use crate::precision::{
    div_round, pow10, Balance, BasePrecision, ImfFactor, InterestIndex, LiquidationFee, Rounding,
    TokenAmount, Weight,
};
use crate::types::{MarginRequirementType, MarketIndex, SpotBalanceType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotMarket {
    pub market_index: MarketIndex,
    pub decimals: u32,
    pub cumulative_deposit_interest: InterestIndex,
    pub cumulative_borrow_interest: InterestIndex,
    pub deposit_balance: Balance,
    pub borrow_balance: Balance,
    pub initial_asset_weight: Weight,
    pub maintenance_asset_weight: Weight,
    pub initial_liability_weight: Weight,
    pub maintenance_liability_weight: Weight,
    pub imf_factor: ImfFactor,
    pub liquidator_fee: LiquidationFee,
}

impl SpotMarket {
    /// The quote asset: six decimals, every weight at 100%.
    pub fn quote_market() -> Self {
        Self {
            market_index: QUOTE_SPOT_MARKET_INDEX,
            decimals: 6,
            cumulative_deposit_interest: InterestIndex::from_raw(INTEREST_PRECISION),
            cumulative_borrow_interest: InterestIndex::from_raw(INTEREST_PRECISION),
            deposit_balance: Balance::ZERO,
            borrow_balance: Balance::ZERO,
            initial_asset_weight: Weight::from_raw(WEIGHT_PRECISION),
            maintenance_asset_weight: Weight::from_raw(WEIGHT_PRECISION),
            initial_liability_weight: Weight::from_raw(WEIGHT_PRECISION),
            maintenance_liability_weight: Weight::from_raw(WEIGHT_PRECISION),
            imf_factor: ImfFactor::ZERO,
            liquidator_fee: LiquidationFee::ZERO,
        }
    }

    /// A volatile collateral asset with 80/90% asset and 120/110% liability weights.
    pub fn base_market(market_index: MarketIndex, decimals: u32) -> Self {
        Self {
            market_index,
            decimals,
            initial_asset_weight: Weight::from_raw(8_000),
            maintenance_asset_weight: Weight::from_raw(9_000),
            initial_liability_weight: Weight::from_raw(12_000),
            maintenance_liability_weight: Weight::from_raw(11_000),
            liquidator_fee: LiquidationFee::from_raw(5_000),
            ..Self::quote_market()
        }
    }

    pub fn is_quote_market(&self) -> bool {
        self.market_index == QUOTE_SPOT_MARKET_INDEX
    }

    pub fn interest_index(&self, balance_type: SpotBalanceType) -> InterestIndex {
        match balance_type {
            SpotBalanceType::Deposit => self.cumulative_deposit_interest,
            SpotBalanceType::Borrow => self.cumulative_borrow_interest,
        }
    }

    fn precision_decrease(&self) -> MathResult<i128> {
        let exp = BALANCE_TIMES_INTEREST_DECIMALS.checked_sub(self.decimals).ok_or(
            InvariantViolation::PrecisionMismatch {
                expected: BALANCE_TIMES_INTEREST_DECIMALS,
                found: self.decimals,
            },
        )?;
        Ok(pow10(exp))
    }

    /// Asset weight for a deposit of `size`. Initial shrinks with size along the
    /// discount curve; maintenance is flat.
    pub fn asset_weight(&self, size: TokenAmount, margin_type: MarginRequirementType) -> MathResult<Weight> {
        match margin_type {
            MarginRequirementType::Initial => calculate_size_discount_asset_weight(
                size.rescale::<BasePrecision>()?,
                self.imf_factor,
                self.initial_asset_weight,
            ),
            MarginRequirementType::Maintenance => Ok(self.maintenance_asset_weight),
        }
    }

    /// Liability weight for a borrow of `size`. Initial grows with size along the
    /// premium curve; maintenance is flat.
    pub fn liability_weight(&self, size: TokenAmount, margin_type: MarginRequirementType) -> MathResult<Weight> {
        match margin_type {
            MarginRequirementType::Initial => calculate_size_premium_liability_weight(
                size.rescale::<BasePrecision>()?,
                self.imf_factor,
                self.initial_liability_weight,
            ),
            MarginRequirementType::Maintenance => Ok(self.maintenance_liability_weight),
        }
    }
}

/// Token amount a stored balance is worth. Deposits truncate, borrows round up.
pub fn get_token_amount(
    balance: Balance,
    spot_market: &SpotMarket,
    balance_type: SpotBalanceType,
) -> MathResult<TokenAmount> {
    let index = spot_market.interest_index(balance_type);
    let rounding = match balance_type {
        SpotBalanceType::Deposit => Rounding::Truncate,
        SpotBalanceType::Borrow => Rounding::Ceil,
    };
    let product = balance.checked_mul(index)?.raw();
    let amount = div_round(product, spot_market.precision_decrease()?, rounding, "get_token_amount")?;
    Ok(TokenAmount::new(amount, spot_market.decimals))
}

/// Stored balance for a token amount, inverse of [`get_token_amount`].
pub fn get_spot_balance(
    token_amount: TokenAmount,
    spot_market: &SpotMarket,
    balance_type: SpotBalanceType,
    round_up: bool,
) -> MathResult<Balance> {
    if token_amount.decimals != spot_market.decimals {
        return Err(InvariantViolation::PrecisionMismatch {
            expected: spot_market.decimals,
            found: token_amount.decimals,
        });
    }
    let index = spot_market.interest_index(balance_type);
    let scaled = token_amount
        .amount
        .checked_mul(spot_market.precision_decrease()?)
        .ok_or(InvariantViolation::Overflow("get_spot_balance"))?;
    let rounding = if round_up { Rounding::Ceil } else { Rounding::Truncate };
    div_round(scaled, index.raw(), rounding, "get_spot_balance").map(Balance::from_raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BALANCE_PRECISION;

    #[test]
    fn deposit_and_borrow_use_their_own_index() {
        let market = SpotMarket {
            cumulative_deposit_interest: InterestIndex::from_raw(11_000_000_000),
            cumulative_borrow_interest: InterestIndex::from_raw(12_000_000_000),
            ..SpotMarket::quote_market()
        };
        let balance = Balance::from_raw(100 * BALANCE_PRECISION);

        let deposit = get_token_amount(balance, &market, SpotBalanceType::Deposit).unwrap();
        let borrow = get_token_amount(balance, &market, SpotBalanceType::Borrow).unwrap();
        assert_eq!(deposit, TokenAmount::new(110_000_000, 6));
        assert_eq!(borrow, TokenAmount::new(120_000_000, 6));
    }

    #[test]
    fn borrow_rounds_up() {
        let market = SpotMarket {
            cumulative_borrow_interest: InterestIndex::from_raw(10_000_000_001),
            cumulative_deposit_interest: InterestIndex::from_raw(10_000_000_001),
            ..SpotMarket::quote_market()
        };
        let balance = Balance::from_raw(1_000);
        assert_eq!(get_token_amount(balance, &market, SpotBalanceType::Deposit).unwrap().amount, 1);
        assert_eq!(get_token_amount(balance, &market, SpotBalanceType::Borrow).unwrap().amount, 2);
    }

    #[test]
    fn balance_round_trip() {
        let market = SpotMarket::quote_market();
        let tokens = TokenAmount::new(10_000_000, 6);
        let balance = get_spot_balance(tokens, &market, SpotBalanceType::Deposit, false).unwrap();
        assert_eq!(balance.raw(), 10 * BALANCE_PRECISION);
        assert_eq!(get_token_amount(balance, &market, SpotBalanceType::Deposit).unwrap(), tokens);
    }

    #[test]
    fn mismatched_decimals_rejected() {
        let market = SpotMarket::quote_market();
        let sol = TokenAmount::new(1, 9);
        assert!(get_spot_balance(sol, &market, SpotBalanceType::Deposit, false).is_err());
    }

    #[test]
    fn too_many_decimals_is_an_invariant_violation() {
        let market = SpotMarket {
            decimals: 20,
            ..SpotMarket::quote_market()
        };
        assert!(matches!(
            get_token_amount(Balance::from_raw(1), &market, SpotBalanceType::Deposit),
            Err(InvariantViolation::PrecisionMismatch { .. })
        ));
    }

    #[test]
    fn maintenance_weights_are_flat() {
        let market = SpotMarket {
            imf_factor: ImfFactor::from_raw(1_000),
            ..SpotMarket::base_market(MarketIndex(1), 9)
        };
        let big = TokenAmount::new(1_000_000 * 1_000_000_000, 9);
        assert_eq!(
            market.asset_weight(big, MarginRequirementType::Maintenance).unwrap(),
            market.maintenance_asset_weight
        );
        assert!(market.asset_weight(big, MarginRequirementType::Initial).unwrap() < market.initial_asset_weight);
        assert!(
            market.liability_weight(big, MarginRequirementType::Initial).unwrap()
                > market.initial_liability_weight
        );
    }
}
