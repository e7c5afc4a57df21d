//! Perp market configuration and state.
//!
//! A perp market owns exactly one AMM plus the parameters the margin engine
//! reads: margin ratios, IMF factors, unrealized pnl weights, and the pnl pool
//! that backs profit payouts.

use crate::amm::Amm;
use crate::constants::{
    DEFAULT_MARGIN_RATIO_INITIAL, DEFAULT_MARGIN_RATIO_MAINTENANCE, QUOTE_SPOT_MARKET_INDEX,
    WEIGHT_PRECISION,
};
use crate::error::MathResult;
use crate::margin::{calculate_size_discount_asset_weight, calculate_size_premium_liability_weight};
use crate::precision::{
    Balance, BaseAmount, BasePrecision, ImfFactor, LiquidationFee, MarginRatio, Peg, QuoteAmount, Weight,
};
use crate::pricing::net_user_pnl;
use crate::types::{MarginRequirementType, MarketIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarketStatus {
    #[default]
    Active,
    /// Fills paused; margin and liquidation still run.
    ReduceOnly,
    /// Settled at a fixed price; positions carry no margin requirement.
    Settlement,
}

/// Balance held in a spot market on behalf of the perp market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBalance {
    pub balance: Balance,
    pub market_index: MarketIndex,
}

impl Default for PoolBalance {
    fn default() -> Self {
        Self {
            balance: Balance::ZERO,
            market_index: QUOTE_SPOT_MARKET_INDEX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpMarket {
    pub market_index: MarketIndex,
    pub status: MarketStatus,
    pub amm: Amm,
    pub margin_ratio_initial: MarginRatio,
    pub margin_ratio_maintenance: MarginRatio,
    pub imf_factor: ImfFactor,
    pub unrealized_imf_factor: ImfFactor,
    pub unrealized_initial_asset_weight: Weight,
    pub unrealized_maintenance_asset_weight: Weight,
    // zero disables the imbalance scaling
    pub unrealized_max_imbalance: QuoteAmount,
    pub liquidator_fee: LiquidationFee,
    pub pnl_pool: PoolBalance,
}

impl PerpMarket {
    /// Market around a balanced AMM with 10%/5% margin and full pnl weights.
    pub fn new(market_index: MarketIndex, amm: Amm) -> Self {
        Self {
            market_index,
            status: MarketStatus::Active,
            amm,
            margin_ratio_initial: MarginRatio::from_raw(DEFAULT_MARGIN_RATIO_INITIAL),
            margin_ratio_maintenance: MarginRatio::from_raw(DEFAULT_MARGIN_RATIO_MAINTENANCE),
            imf_factor: ImfFactor::ZERO,
            unrealized_imf_factor: ImfFactor::ZERO,
            unrealized_initial_asset_weight: Weight::from_raw(WEIGHT_PRECISION),
            unrealized_maintenance_asset_weight: Weight::from_raw(WEIGHT_PRECISION),
            unrealized_max_imbalance: QuoteAmount::ZERO,
            liquidator_fee: LiquidationFee::ZERO,
            pnl_pool: PoolBalance::default(),
        }
    }

    pub fn with_amm(&self, amm: Amm) -> Self {
        Self {
            amm,
            ..self.clone()
        }
    }

    /// Margin ratio for a position of `size` base. Initial follows the size
    /// premium curve; maintenance is the flat configured ratio.
    pub fn margin_ratio(&self, size: BaseAmount, margin_type: MarginRequirementType) -> MathResult<MarginRatio> {
        if self.status == MarketStatus::Settlement {
            return Ok(MarginRatio::ZERO);
        }
        match margin_type {
            MarginRequirementType::Initial => {
                let premium =
                    calculate_size_premium_liability_weight(size.abs()?, self.imf_factor, self.margin_ratio_initial)?;
                Ok(premium.max(self.margin_ratio_initial))
            }
            MarginRequirementType::Maintenance => Ok(self.margin_ratio_maintenance),
        }
    }

    /// Weight applied to unrealized pnl when counting it as collateral.
    /// Losses always count in full.
    pub fn unrealized_asset_weight(
        &self,
        unrealized_pnl: QuoteAmount,
        margin_type: MarginRequirementType,
    ) -> MathResult<Weight> {
        if !unrealized_pnl.is_positive() {
            return Ok(Weight::from_raw(WEIGHT_PRECISION));
        }

        match margin_type {
            MarginRequirementType::Initial => {
                let mut weight = self.unrealized_initial_asset_weight;
                if weight.is_positive() && self.unrealized_max_imbalance.is_positive() {
                    let net_pnl = net_user_pnl(self, self.amm.last_oracle_price)?;
                    if net_pnl > self.unrealized_max_imbalance {
                        weight = weight
                            .checked_mul(self.unrealized_max_imbalance)?
                            .div_to(net_pnl)?;
                    }
                }
                if weight.is_zero() {
                    return Ok(Weight::ZERO);
                }
                calculate_size_discount_asset_weight(
                    unrealized_pnl.rescale::<BasePrecision>()?,
                    self.unrealized_imf_factor,
                    weight,
                )
            }
            MarginRequirementType::Maintenance => Ok(self.unrealized_maintenance_asset_weight),
        }
    }
}

impl Default for PerpMarket {
    fn default() -> Self {
        Self::new(MarketIndex(0), Amm::balanced(0, Peg::one()))
    }
}
