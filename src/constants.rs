// 2.0: named constants. raw values are at the precision in the name, so
// MARGIN_PRECISION is 10_000 and a margin ratio of 500 means 5%.

use crate::precision::{
    BalancePrecision, BasePrecision, ImfPrecision, InterestPrecision, LiquidationFeePrecision,
    MarginPrecision, PegPrecision, PercentagePrecision, Precision, PricePrecision,
    QuotePrecision, QuoteReservePrecision, SpreadPrecision, WeightPrecision,
};
use crate::types::MarketIndex;

pub const PRICE_PRECISION: i128 = PricePrecision::SCALE;
pub const QUOTE_PRECISION: i128 = QuotePrecision::SCALE;
pub const BASE_PRECISION: i128 = BasePrecision::SCALE;
pub const AMM_RESERVE_PRECISION: i128 = QuoteReservePrecision::SCALE;
pub const PEG_PRECISION: i128 = PegPrecision::SCALE;
pub const MARGIN_PRECISION: i128 = MarginPrecision::SCALE;
pub const WEIGHT_PRECISION: i128 = WeightPrecision::SCALE;
pub const IMF_PRECISION: i128 = ImfPrecision::SCALE;
pub const SPREAD_PRECISION: i128 = SpreadPrecision::SCALE;
pub const LIQUIDATION_FEE_PRECISION: i128 = LiquidationFeePrecision::SCALE;
pub const BALANCE_PRECISION: i128 = BalancePrecision::SCALE;
pub const INTEREST_PRECISION: i128 = InterestPrecision::SCALE;
pub const PERCENTAGE_PRECISION: i128 = PercentagePrecision::SCALE;

pub const AMM_TO_QUOTE_PRECISION_RATIO: i128 = AMM_RESERVE_PRECISION / QUOTE_PRECISION;
// reserve (9) * peg (6) / 1e9 = quote (6)
pub const AMM_TIMES_PEG_TO_QUOTE_PRECISION_RATIO: i128 =
    AMM_RESERVE_PRECISION * PEG_PRECISION / QUOTE_PRECISION;
pub const LIQUIDATION_FEE_TO_MARGIN_PRECISION_RATIO: i128 =
    LIQUIDATION_FEE_PRECISION / MARGIN_PRECISION;

// stored balance (9) * index (10) / 10^(19 - decimals) = token amount (decimals)
pub const BALANCE_TIMES_INTEREST_DECIMALS: u32 =
    BalancePrecision::DECIMALS + InterestPrecision::DECIMALS;

// size premium/discount curve shape
pub const SIZE_PREMIUM_BASE_FRACTION_NUMERATOR: i128 = 4;
pub const SIZE_PREMIUM_BASE_FRACTION_DENOMINATOR: i128 = 5;
pub const IMF_SQRT_DIVISOR: i128 = 100_000;

pub const MAX_CURVE_UPDATE_INTENSITY: u8 = 100;
pub const MAX_AMM_JIT_INTENSITY: u8 = 100;

// amm is treated as imbalanced once one side's open liquidity is this many times the other
pub const AMM_JIT_IMBALANCE_RATIO: i128 = 3;

// hard ceiling on market spreads, 10%
pub const MAX_SPREAD: i128 = SPREAD_PRECISION / 10;

pub const MINIMUM_MARGIN_RATIO: i128 = MARGIN_PRECISION / 50;
pub const MAXIMUM_MARGIN_RATIO: i128 = MARGIN_PRECISION;

// spot market 0 is the quote asset; its price is fixed at one
pub const QUOTE_SPOT_MARKET_INDEX: MarketIndex = MarketIndex(0);

pub const DEFAULT_MARGIN_RATIO_INITIAL: i128 = 1_000;
pub const DEFAULT_MARGIN_RATIO_MAINTENANCE: i128 = 500;
