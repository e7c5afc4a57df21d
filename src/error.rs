//! Error taxonomy.
//!
//! Three classes of failure leave this crate:
//!
//! - [`InvariantViolation`]: overflow, division by zero, non-positive reserves,
//!   precision mismatch. These mean the input snapshot is corrupt and the
//!   computation is aborted. They are never business conditions.
//! - [`DomainError`]: the caller passed something outside the domain of the
//!   operation (empty fee samples, a market that is not in the snapshot, a
//!   trade larger than the reserves). The caller may correct and retry.
//! - Business rejections ("account is healthy", "limit price not reached") are
//!   not errors at all. They come back as `NoOp` variants of the operation's
//!   outcome enum so callers can tell "nothing to do" from "failed".

use crate::types::MarketIndex;

pub type MathResult<T> = Result<T, InvariantViolation>;
pub type CoreResult<T> = Result<T, CoreError>;

/// Which side of the AMM held the bad reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveSide {
    Base,
    Quote,
}

impl std::fmt::Display for ReserveSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReserveSide::Base => write!(f, "base"),
            ReserveSide::Quote => write!(f, "quote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("amm {0} reserve is not positive")]
    NonPositiveReserve(ReserveSide),

    #[error("precision mismatch: expected {expected} decimals, found {found}")]
    PrecisionMismatch { expected: u32, found: u32 },

    #[error("balance went negative in {0}")]
    NegativeBalance(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("no fee samples supplied")]
    EmptyFeeSamples,

    #[error("fee samples must be ordered newest first; sample {index} is out of order")]
    UnsortedFeeSamples { index: usize },

    #[error("ewma half life must be positive")]
    InvalidHalfLife,

    #[error("perp market {0:?} not in snapshot")]
    PerpMarketNotFound(MarketIndex),

    #[error("spot market {0:?} not in snapshot")]
    SpotMarketNotFound(MarketIndex),

    #[error("no oracle price for market {0:?}")]
    OracleNotFound(MarketIndex),

    #[error("user has no position in market {0:?}")]
    PositionNotFound(MarketIndex),

    #[error("swap of {requested} exceeds reserve of {available}")]
    InsufficientReserves { requested: i128, available: i128 },

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i128),

    #[error("oracle price must be positive, got {0}")]
    NonPositiveOraclePrice(i128),

    #[error("limit price must be positive, got {0}")]
    NonPositiveLimitPrice(i128),

    #[error("spot positions belong to different markets: {from:?} and {to:?}")]
    SpotMarketMismatch { from: MarketIndex, to: MarketIndex },

    #[error("invalid margin parameters: {0}")]
    InvalidMarginRatio(String),

    #[error("invalid spot market weights: {0}")]
    InvalidMarginWeights(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("input out of domain: {0}")]
    Domain(#[from] DomainError),
}

impl CoreError {
    /// Invariant violations mean corrupt upstream state; callers must not retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Invariant(_))
    }
}
