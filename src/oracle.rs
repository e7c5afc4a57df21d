// 4.0: oracle input and guard rails. the core never fetches a price. callers hand in a
// point-in-time OraclePriceData and may run it through oracle_validity first.
// 4.1 guard rails are plain config values; enforcing them is the caller's call.

use crate::constants::PERCENTAGE_PRECISION;
use crate::error::MathResult;
use crate::precision::{Percentage, PercentagePrecision, Price, PricePrecision};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePriceData {
    pub price: Price,
    pub confidence: Price,
    // slots since the oracle last published
    pub delay: i64,
    pub has_sufficient_number_of_data_points: bool,
}

impl OraclePriceData {
    /// Fresh, zero-confidence price. Mostly for tests and the quote asset.
    pub fn at(price: Price) -> Self {
        Self {
            price,
            confidence: Price::ZERO,
            delay: 0,
            has_sufficient_number_of_data_points: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDivergenceGuardRails {
    pub mark_oracle_divergence_numerator: u64,
    pub mark_oracle_divergence_denominator: u64,
}

impl Default for PriceDivergenceGuardRails {
    fn default() -> Self {
        Self {
            mark_oracle_divergence_numerator: 1,
            mark_oracle_divergence_denominator: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityGuardRails {
    pub slots_before_stale_for_amm: i64,
    pub slots_before_stale_for_margin: i64,
    // confidence / price, at PERCENTAGE precision
    pub confidence_interval_max_size: Percentage,
    // max(price, twap) / min(price, twap) above this is too volatile
    pub too_volatile_ratio: i64,
}

impl Default for ValidityGuardRails {
    fn default() -> Self {
        Self {
            slots_before_stale_for_amm: 10,
            slots_before_stale_for_margin: 120,
            confidence_interval_max_size: Percentage::from_raw(20_000), // 2%
            too_volatile_ratio: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleGuardRails {
    pub price_divergence: PriceDivergenceGuardRails,
    pub validity: ValidityGuardRails,
    pub use_for_liquidations: bool,
}

impl Default for OracleGuardRails {
    fn default() -> Self {
        Self {
            price_divergence: PriceDivergenceGuardRails::default(),
            validity: ValidityGuardRails::default(),
            use_for_liquidations: true,
        }
    }
}

// Worst first. A reading carries the first failure found in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleValidity {
    Invalid,
    TooVolatile,
    TooUncertain,
    StaleForMargin,
    InsufficientDataPoints,
    StaleForAmm,
    Valid,
}

impl OracleValidity {
    pub fn is_valid_for_amm(&self) -> bool {
        matches!(self, OracleValidity::Valid)
    }

    pub fn is_valid_for_margin(&self) -> bool {
        matches!(
            self,
            OracleValidity::Valid
                | OracleValidity::StaleForAmm
                | OracleValidity::InsufficientDataPoints
        )
    }
}

pub fn oracle_validity(
    oracle: &OraclePriceData,
    last_oracle_price_twap: Price,
    guard_rails: &ValidityGuardRails,
) -> MathResult<OracleValidity> {
    if !oracle.price.is_positive() {
        return Ok(OracleValidity::Invalid);
    }

    if last_oracle_price_twap.is_positive() {
        let larger = oracle.price.max(last_oracle_price_twap);
        let smaller = oracle.price.min(last_oracle_price_twap);
        let limit = smaller.mul_int(guard_rails.too_volatile_ratio as i128)?;
        if larger > limit {
            return Ok(OracleValidity::TooVolatile);
        }
    }

    let confidence_pct: Percentage = oracle
        .confidence
        .div_to::<PricePrecision, PercentagePrecision>(oracle.price)?;
    if confidence_pct > guard_rails.confidence_interval_max_size {
        return Ok(OracleValidity::TooUncertain);
    }

    if oracle.delay > guard_rails.slots_before_stale_for_margin {
        return Ok(OracleValidity::StaleForMargin);
    }

    if !oracle.has_sufficient_number_of_data_points {
        return Ok(OracleValidity::InsufficientDataPoints);
    }

    if oracle.delay > guard_rails.slots_before_stale_for_amm {
        return Ok(OracleValidity::StaleForAmm);
    }

    Ok(OracleValidity::Valid)
}

/// `|price_spread_pct|` at or beyond numerator/denominator.
pub fn is_oracle_mark_too_divergent(
    price_spread_pct: Percentage,
    guard_rails: &PriceDivergenceGuardRails,
) -> MathResult<bool> {
    let max_divergence = Percentage::from_raw(PERCENTAGE_PRECISION)
        .mul_int(guard_rails.mark_oracle_divergence_numerator as i128)?
        .div_int(guard_rails.mark_oracle_divergence_denominator as i128)?;
    Ok(price_spread_pct.abs()? >= max_divergence)
}
