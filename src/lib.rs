// vamm-core: numeric core of a virtual-AMM perpetuals exchange.
// exact fixed-point math for the curve, pricing, margin and liquidation.
// every function is pure and deterministic: snapshots in, new values out. no I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  precision.rs: Scaled<P>, Wide<P, Q>, TokenAmount, rounding
//   1.1  constants.rs: precision constants and protocol limits
//   1.2  error.rs: InvariantViolation, DomainError, CoreError
//   1.3  types.rs: MarketIndex, AccountId, directions, Timestamp
//   2.x  amm.rs: reserves, swaps, spread reserves, spreads
//   2.1  repeg.rs: optimal peg, repeg cost, budgeted repeg
//   2.2  amm_jit.rs: AMM share of a maker fill
//   3.x  pricing.rs: mark/bid/ask, net user pnl, available pnl
//   4.x  oracle.rs: oracle price data and guard rails
//   5.x  market.rs: perp market, pnl pool, margin ratio curve
//   5.1  spot_market.rs: spot market, interest index, token amounts
//   6.x  position.rs: perp positions, deltas, realized pnl
//   6.1  spot_position.rs: spot balances and open orders
//   6.2  account.rs: user account and liquidation status
//   7.x  fill.rs: taker fills against the AMM
//   8.x  margin.rs: size premium/discount, margin requirement, collateral
//   8.1  snapshot.rs: markets and oracles one computation runs over
//   9.x  liquidation.rs: liquidate perp, liquidate pnl for deposit
//   9.1  events.rs: liquidation records and sinks
//   10.x priority_fee.rs: fee sample reduction strategies
//   11.x config.rs: guard rails, liquidation caps, fee policy, param validation

// numeric base
pub mod constants;
pub mod error;
pub mod precision;
pub mod types;

// curve and pricing
pub mod amm;
pub mod amm_jit;
pub mod oracle;
pub mod pricing;
pub mod repeg;

// markets and accounts
pub mod account;
pub mod fill;
pub mod market;
pub mod position;
pub mod snapshot;
pub mod spot_market;
pub mod spot_position;

// risk
pub mod events;
pub mod liquidation;
pub mod margin;

// utilities
pub mod config;
pub mod priority_fee;

// re exports for convenience
pub use account::*;
pub use amm::*;
pub use amm_jit::*;
pub use constants::*;
pub use error::*;
pub use events::*;
pub use fill::*;
pub use liquidation::*;
pub use margin::*;
pub use market::*;
pub use oracle::*;
pub use position::*;
pub use precision::*;
pub use pricing::*;
pub use priority_fee::*;
pub use repeg::*;
pub use snapshot::*;
pub use spot_market::*;
pub use spot_position::*;
pub use types::*;
pub use config::{
    validate_margin, validate_margin_weights, ConfigError, CoreConfig, Environment, LiquidationConfig,
    PriorityFeeConfig,
};
