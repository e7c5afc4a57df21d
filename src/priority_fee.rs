// 10.0: priority fee reduction. recent fee samples in, one fee out.
// samples arrive newest first with strictly decreasing slots; anything else is rejected.

use crate::error::{CoreResult, DomainError, InvariantViolation};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSample {
    pub slot: u64,
    pub fee: u64,
}

pub trait PriorityFeeStrategy {
    fn calculate(&self, samples: &[FeeSample]) -> CoreResult<u64>;
}

/// Non-empty and newest first. Returns the newest sample.
fn check_samples(samples: &[FeeSample]) -> Result<&FeeSample, DomainError> {
    let newest = samples.first().ok_or(DomainError::EmptyFeeSamples)?;
    if let Some(index) = samples.windows(2).position(|pair| pair[1].slot >= pair[0].slot) {
        return Err(DomainError::UnsortedFeeSamples { index: index + 1 });
    }
    Ok(newest)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AverageStrategy;

impl PriorityFeeStrategy for AverageStrategy {
    fn calculate(&self, samples: &[FeeSample]) -> CoreResult<u64> {
        check_samples(samples)?;
        let total: u128 = samples.iter().map(|s| s.fee as u128).sum();
        // mean of u64 values fits a u64
        Ok((total / samples.len() as u128) as u64)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaxStrategy;

impl PriorityFeeStrategy for MaxStrategy {
    fn calculate(&self, samples: &[FeeSample]) -> CoreResult<u64> {
        check_samples(samples)?;
        Ok(samples.iter().map(|s| s.fee).max().unwrap_or_default())
    }
}

/// Max over samples no more than `lookback_slots` older than the newest one.
#[derive(Debug, Clone, Copy)]
pub struct MaxOverSlotsStrategy {
    pub lookback_slots: u64,
}

impl PriorityFeeStrategy for MaxOverSlotsStrategy {
    fn calculate(&self, samples: &[FeeSample]) -> CoreResult<u64> {
        let newest = check_samples(samples)?;
        let oldest_slot = newest.slot.saturating_sub(self.lookback_slots);
        Ok(samples
            .iter()
            .take_while(|s| s.slot >= oldest_slot)
            .map(|s| s.fee)
            .max()
            .unwrap_or(newest.fee))
    }
}

/// Exponentially weighted mean. A sample `half_life_slots` older than the newest
/// counts half as much.
#[derive(Debug, Clone, Copy)]
pub struct EwmaStrategy {
    pub half_life_slots: u64,
}

impl PriorityFeeStrategy for EwmaStrategy {
    fn calculate(&self, samples: &[FeeSample]) -> CoreResult<u64> {
        if self.half_life_slots == 0 {
            return Err(DomainError::InvalidHalfLife.into());
        }
        let newest = check_samples(samples)?;
        let half_life = Decimal::from(self.half_life_slots);

        let mut weighted = Decimal::ZERO;
        let mut total_weight = Decimal::ZERO;
        for sample in samples {
            let age = Decimal::from(newest.slot - sample.slot);
            let weight = dec!(0.5)
                .checked_powd(age / half_life)
                .ok_or(InvariantViolation::Overflow("ewma weight"))?;
            weighted += weight * Decimal::from(sample.fee);
            total_weight += weight;
        }
        if total_weight.is_zero() {
            return Ok(newest.fee);
        }

        (weighted / total_weight)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u64()
            .ok_or_else(|| InvariantViolation::Overflow("ewma fee").into())
    }
}

/// Serializable choice of strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PriorityFeeStrategyKind {
    Average,
    Max,
    MaxOverSlots { lookback_slots: u64 },
    Ewma { half_life_slots: u64 },
}

impl PriorityFeeStrategy for PriorityFeeStrategyKind {
    fn calculate(&self, samples: &[FeeSample]) -> CoreResult<u64> {
        match *self {
            PriorityFeeStrategyKind::Average => AverageStrategy.calculate(samples),
            PriorityFeeStrategyKind::Max => MaxStrategy.calculate(samples),
            PriorityFeeStrategyKind::MaxOverSlots { lookback_slots } => {
                MaxOverSlotsStrategy { lookback_slots }.calculate(samples)
            }
            PriorityFeeStrategyKind::Ewma { half_life_slots } => EwmaStrategy { half_life_slots }.calculate(samples),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn samples(pairs: &[(u64, u64)]) -> Vec<FeeSample> {
        pairs.iter().map(|&(slot, fee)| FeeSample { slot, fee }).collect()
    }

    #[test]
    fn average_and_max() {
        let s = samples(&[(10, 100), (9, 200), (7, 600)]);
        assert_eq!(AverageStrategy.calculate(&s).unwrap(), 300);
        assert_eq!(MaxStrategy.calculate(&s).unwrap(), 600);
    }

    #[test]
    fn max_over_slots_ignores_old_samples() {
        let s = samples(&[(10, 100), (9, 200), (7, 600)]);
        assert_eq!(MaxOverSlotsStrategy { lookback_slots: 1 }.calculate(&s).unwrap(), 200);
        assert_eq!(MaxOverSlotsStrategy { lookback_slots: 0 }.calculate(&s).unwrap(), 100);
        assert_eq!(MaxOverSlotsStrategy { lookback_slots: 3 }.calculate(&s).unwrap(), 600);
    }

    #[test]
    fn ewma_halves_per_half_life() {
        // weights 1 and 0.5: (100 + 100) / 1.5
        let s = samples(&[(10, 100), (9, 200)]);
        assert_eq!(EwmaStrategy { half_life_slots: 1 }.calculate(&s).unwrap(), 133);

        let flat = samples(&[(10, 500), (5, 500), (1, 500)]);
        assert_eq!(EwmaStrategy { half_life_slots: 3 }.calculate(&flat).unwrap(), 500);
    }

    #[test]
    fn ewma_rejects_zero_half_life() {
        let s = samples(&[(10, 100)]);
        assert_eq!(
            EwmaStrategy { half_life_slots: 0 }.calculate(&s),
            Err(CoreError::Domain(DomainError::InvalidHalfLife))
        );
    }

    #[test]
    fn bad_samples_are_domain_errors() {
        assert_eq!(
            MaxStrategy.calculate(&[]),
            Err(CoreError::Domain(DomainError::EmptyFeeSamples))
        );
        let unsorted = samples(&[(10, 100), (11, 200), (9, 50)]);
        assert_eq!(
            AverageStrategy.calculate(&unsorted),
            Err(CoreError::Domain(DomainError::UnsortedFeeSamples { index: 1 }))
        );
        let duplicate = samples(&[(10, 100), (9, 200), (9, 50)]);
        assert_eq!(
            MaxStrategy.calculate(&duplicate),
            Err(CoreError::Domain(DomainError::UnsortedFeeSamples { index: 2 }))
        );
    }

    #[test]
    fn kind_dispatches_and_serializes() {
        let s = samples(&[(10, 100), (9, 200), (7, 600)]);
        let kind = PriorityFeeStrategyKind::MaxOverSlots { lookback_slots: 1 };
        assert_eq!(kind.calculate(&s).unwrap(), 200);

        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "{\"type\":\"maxOverSlots\",\"lookback_slots\":1}");
        let back: PriorityFeeStrategyKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}
