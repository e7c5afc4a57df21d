// 11.0 config.rs: caller-facing settings in one place. oracle guard rails, liquidation
// caps, priority fee policy. market parameters live on the markets themselves.
// 11.1 validate_margin / validate_margin_weights check market parameters before a market
// is listed or updated.

use serde::{Deserialize, Serialize};

use crate::constants::{
    BASE_PRECISION, IMF_PRECISION, LIQUIDATION_FEE_TO_MARGIN_PRECISION_RATIO, MAXIMUM_MARGIN_RATIO,
    MINIMUM_MARGIN_RATIO, QUOTE_PRECISION, QUOTE_SPOT_MARKET_INDEX, WEIGHT_PRECISION,
};
use crate::error::{CoreResult, DomainError};
use crate::oracle::OracleGuardRails;
use crate::precision::{BaseAmount, ImfFactor, LiquidationFee, MarginRatio, Percentage, QuoteAmount, Spread, Weight};
use crate::priority_fee::{FeeSample, PriorityFeeStrategy, PriorityFeeStrategyKind};
use crate::types::MarketIndex;

// Spread precision over margin precision
const SPREAD_TO_MARGIN_PRECISION_RATIO: i128 = 100;

/** 11.2: per-call caps handed to the liquidation entry points */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationConfig {
    // Max pnl settled against a deposit in one call
    pub max_pnl_transfer: QuoteAmount,
    // Max base taken over from a position in one call
    pub max_base_transfer: BaseAmount,
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            max_pnl_transfer: QuoteAmount::from_raw(1_000 * QUOTE_PRECISION), // $1000
            max_base_transfer: BaseAmount::from_raw(100 * BASE_PRECISION),
        }
    }
}

// Priority fee policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityFeeConfig {
    pub strategy: PriorityFeeStrategyKind,
    // Floor and ceiling applied to whatever the strategy returns
    pub min_fee: u64,
    pub max_fee: u64,
}

impl Default for PriorityFeeConfig {
    fn default() -> Self {
        Self {
            strategy: PriorityFeeStrategyKind::Average,
            min_fee: 0,
            max_fee: 1_000_000,
        }
    }
}

impl PriorityFeeConfig {
    pub fn priority_fee(&self, samples: &[FeeSample]) -> CoreResult<u64> {
        let fee = self.strategy.calculate(samples)?;
        Ok(fee.clamp(self.min_fee, self.max_fee.max(self.min_fee)))
    }
}

// The complete core configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    pub oracle_guard_rails: OracleGuardRails,
    pub liquidation: LiquidationConfig,
    pub priority_fee: PriorityFeeConfig,
}

impl CoreConfig {
    // Create a configuration preset for testnet
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.oracle_guard_rails.validity.slots_before_stale_for_amm = 25;
        config.oracle_guard_rails.validity.slots_before_stale_for_margin = 300;
        config.liquidation.max_pnl_transfer = QuoteAmount::from_raw(10_000 * QUOTE_PRECISION);
        config.priority_fee.strategy = PriorityFeeStrategyKind::Max;
        config
    }

    // Create a configuration preset for mainnet with conservative settings
    pub fn mainnet() -> Self {
        let mut config = Self::default();
        config.oracle_guard_rails.validity.confidence_interval_max_size = Percentage::from_raw(10_000); // 1%
        config.oracle_guard_rails.price_divergence.mark_oracle_divergence_numerator = 1;
        config.oracle_guard_rails.price_divergence.mark_oracle_divergence_denominator = 20; // 5%
        config.liquidation.max_base_transfer = BaseAmount::from_raw(10 * BASE_PRECISION);
        config.priority_fee = PriorityFeeConfig {
            strategy: PriorityFeeStrategyKind::Ewma { half_life_slots: 20 },
            min_fee: 1_000,
            max_fee: 2_000_000,
        };
        config
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let divergence = &self.oracle_guard_rails.price_divergence;
        if divergence.mark_oracle_divergence_denominator == 0
            || divergence.mark_oracle_divergence_numerator == 0
            || divergence.mark_oracle_divergence_numerator > divergence.mark_oracle_divergence_denominator
        {
            return Err(ConfigError::InvalidOracleGuardRails {
                reason: "divergence must be a fraction in (0, 1]".to_string(),
            });
        }

        let validity = &self.oracle_guard_rails.validity;
        if validity.slots_before_stale_for_amm < 0
            || validity.slots_before_stale_for_margin < validity.slots_before_stale_for_amm
        {
            return Err(ConfigError::InvalidOracleGuardRails {
                reason: "margin staleness must be at least amm staleness".to_string(),
            });
        }
        if !validity.confidence_interval_max_size.is_positive() || validity.too_volatile_ratio < 1 {
            return Err(ConfigError::InvalidOracleGuardRails {
                reason: "confidence and volatility limits must be positive".to_string(),
            });
        }

        if !self.liquidation.max_pnl_transfer.is_positive() || !self.liquidation.max_base_transfer.is_positive() {
            return Err(ConfigError::InvalidLiquidation {
                reason: "transfer caps must be positive".to_string(),
            });
        }

        if self.priority_fee.min_fee > self.priority_fee.max_fee {
            return Err(ConfigError::InvalidPriorityFee {
                reason: "min fee above max fee".to_string(),
            });
        }
        if let PriorityFeeStrategyKind::Ewma { half_life_slots: 0 } = self.priority_fee.strategy {
            return Err(ConfigError::InvalidPriorityFee {
                reason: "ewma half life must be positive".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid oracle guard rails: {reason}")]
    InvalidOracleGuardRails { reason: String },
    #[error("invalid liquidation config: {reason}")]
    InvalidLiquidation { reason: String },
    #[error("invalid priority fee config: {reason}")]
    InvalidPriorityFee { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> CoreConfig {
        match self {
            Environment::Development => CoreConfig::default(),
            Environment::Testnet => CoreConfig::testnet(),
            Environment::Mainnet => CoreConfig::mainnet(),
        }
    }
}

fn invalid_ratio(reason: String) -> Result<(), DomainError> {
    Err(DomainError::InvalidMarginRatio(reason))
}

/// Perp market margin parameters. Both ratios in [2%, 100%], initial at least
/// maintenance, the liquidator fee below maintenance and the max spread below initial.
pub fn validate_margin(
    margin_ratio_initial: MarginRatio,
    margin_ratio_maintenance: MarginRatio,
    liquidation_fee: LiquidationFee,
    max_spread: Spread,
) -> Result<(), DomainError> {
    let initial = margin_ratio_initial.raw();
    let maintenance = margin_ratio_maintenance.raw();
    let allowed = MINIMUM_MARGIN_RATIO..=MAXIMUM_MARGIN_RATIO;

    if !allowed.contains(&initial) {
        return invalid_ratio(format!("initial {} outside [{}, {}]", initial, MINIMUM_MARGIN_RATIO, MAXIMUM_MARGIN_RATIO));
    }
    if !allowed.contains(&maintenance) {
        return invalid_ratio(format!(
            "maintenance {} outside [{}, {}]",
            maintenance, MINIMUM_MARGIN_RATIO, MAXIMUM_MARGIN_RATIO
        ));
    }
    if initial < maintenance {
        return invalid_ratio(format!("initial {} below maintenance {}", initial, maintenance));
    }
    if maintenance * LIQUIDATION_FEE_TO_MARGIN_PRECISION_RATIO <= liquidation_fee.raw() {
        return invalid_ratio(format!(
            "liquidation fee {} not below maintenance {}",
            liquidation_fee.raw(),
            maintenance
        ));
    }
    if max_spread.raw() >= initial * SPREAD_TO_MARGIN_PRECISION_RATIO {
        return invalid_ratio(format!("max spread {} not below initial {}", max_spread.raw(), initial));
    }
    Ok(())
}

fn invalid_weights(reason: &str) -> Result<(), DomainError> {
    Err(DomainError::InvalidMarginWeights(reason.to_string()))
}

/// Spot market weights. The quote market is weighted at exactly 100% everywhere;
/// other markets discount assets below 100% and charge liabilities above it, initial
/// always stricter than maintenance.
pub fn validate_margin_weights(
    market_index: MarketIndex,
    initial_asset_weight: Weight,
    maintenance_asset_weight: Weight,
    initial_liability_weight: Weight,
    maintenance_liability_weight: Weight,
    imf_factor: ImfFactor,
) -> Result<(), DomainError> {
    let full = Weight::from_raw(WEIGHT_PRECISION);

    if market_index == QUOTE_SPOT_MARKET_INDEX {
        if [
            initial_asset_weight,
            maintenance_asset_weight,
            initial_liability_weight,
            maintenance_liability_weight,
        ]
        .iter()
        .any(|w| *w != full)
        {
            return invalid_weights("quote market weights must all be 100%");
        }
    } else {
        if initial_asset_weight >= full {
            return invalid_weights("initial asset weight must be below 100%");
        }
        if initial_asset_weight > maintenance_asset_weight {
            return invalid_weights("initial asset weight above maintenance");
        }
        if !maintenance_asset_weight.is_positive() || maintenance_asset_weight >= full {
            return invalid_weights("maintenance asset weight must be in (0%, 100%)");
        }
        if initial_liability_weight <= full {
            return invalid_weights("initial liability weight must be above 100%");
        }
        if initial_liability_weight < maintenance_liability_weight {
            return invalid_weights("initial liability weight below maintenance");
        }
        if maintenance_liability_weight <= full {
            return invalid_weights("maintenance liability weight must be above 100%");
        }
    }

    if imf_factor.raw() < 0 || imf_factor.raw() >= IMF_PRECISION {
        return invalid_weights("imf factor must be in [0, 1)");
    }
    Ok(())
}
