// 3.0: ids, directions and timestamps. amounts live in precision.rs.
// each id is a newtype so a perp market index can't be passed where an account is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketIndex(pub u16);

impl fmt::Display for MarketIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionDirection {
    Long,
    Short,
}

impl PositionDirection {
    pub fn sign(&self) -> i128 {
        match self {
            PositionDirection::Long => 1,
            PositionDirection::Short => -1,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            PositionDirection::Long => PositionDirection::Short,
            PositionDirection::Short => PositionDirection::Long,
        }
    }

    /// Direction that opens a position with this signed base amount.
    pub fn from_base(base_asset_amount: i128) -> Self {
        if base_asset_amount >= 0 {
            PositionDirection::Long
        } else {
            PositionDirection::Short
        }
    }

    /// A long takes base out of the pool, a short puts it back.
    pub fn swap_direction(&self) -> SwapDirection {
        match self {
            PositionDirection::Long => SwapDirection::Remove,
            PositionDirection::Short => SwapDirection::Add,
        }
    }
}

// 3.1: direction of a swap from the pool's point of view, for the asset being swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwapDirection {
    Add,
    Remove,
}

impl SwapDirection {
    pub fn opposite(&self) -> Self {
        match self {
            SwapDirection::Add => SwapDirection::Remove,
            SwapDirection::Remove => SwapDirection::Add,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarginRequirementType {
    Initial,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpotBalanceType {
    Deposit,
    Borrow,
}

impl SpotBalanceType {
    pub fn opposite(&self) -> Self {
        match self {
            SpotBalanceType::Deposit => SpotBalanceType::Borrow,
            SpotBalanceType::Borrow => SpotBalanceType::Deposit,
        }
    }
}

// 3.2: millisecond timestamp. the core never reads the clock itself; callers pass one in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_maps_to_swap() {
        assert_eq!(PositionDirection::Long.swap_direction(), SwapDirection::Remove);
        assert_eq!(PositionDirection::Short.swap_direction(), SwapDirection::Add);
        assert_eq!(PositionDirection::from_base(-5), PositionDirection::Short);
        assert_eq!(PositionDirection::Long.opposite().sign(), -1);
    }

    #[test]
    fn timestamp_formats_as_utc() {
        let ts = Timestamp::from_millis(0);
        assert_eq!(ts.to_string(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&MarketIndex(3)).unwrap(), "3");
        assert_eq!(
            serde_json::to_string(&SpotBalanceType::Deposit).unwrap(),
            "\"deposit\""
        );
    }
}
