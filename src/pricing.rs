// 5.0: market pricing. mark, bid and ask all come off the repegged AMM so they agree
// with what a fill would see. every function here is a read; market_after_trade hands
// back a new market and leaves the input alone.
// 5.1 pnl pool solvency: net_user_pnl and net_user_imbalance.

use crate::error::{CoreResult, DomainError, MathResult};
use crate::market::PerpMarket;
use crate::oracle::OraclePriceData;
use crate::precision::{
    BaseAmount, Percentage, PercentagePrecision, Price, PricePrecision, QuoteAmount, QuotePrecision,
    TokenAmount,
};
use crate::repeg::calculate_updated_amm;
use crate::spot_market::{get_token_amount, SpotMarket};
use crate::types::{PositionDirection, SpotBalanceType, SwapDirection};

/// Reserve price of the AMM after it has been repegged against `oracle`.
pub fn mark_price(market: &PerpMarket, oracle: &OraclePriceData) -> MathResult<Price> {
    calculate_updated_amm(&market.amm, oracle)?.reserve_price()
}

fn spread_price(market: &PerpMarket, oracle: &OraclePriceData, direction: PositionDirection) -> MathResult<Price> {
    let amm = calculate_updated_amm(&market.amm, oracle)?;
    let (base, quote) = amm.spread_reserves(direction)?;
    crate::amm::reserve_price(base, quote, amm.peg_multiplier)
}

/// Best price a taker can sell at.
pub fn bid_price(market: &PerpMarket, oracle: &OraclePriceData) -> MathResult<Price> {
    spread_price(market, oracle, PositionDirection::Short)
}

/// Best price a taker can buy at.
pub fn ask_price(market: &PerpMarket, oracle: &OraclePriceData) -> MathResult<Price> {
    spread_price(market, oracle, PositionDirection::Long)
}

pub fn bid_ask_prices(market: &PerpMarket, oracle: &OraclePriceData) -> MathResult<(Price, Price)> {
    Ok((bid_price(market, oracle)?, ask_price(market, oracle)?))
}

/// Positive when the venue trades above the oracle.
pub fn oracle_spread(price: Price, oracle: &OraclePriceData) -> MathResult<Price> {
    price.checked_sub(oracle.price)
}

/// [`oracle_spread`] as a fraction of the oracle price.
pub fn oracle_spread_pct(price: Price, oracle: &OraclePriceData) -> CoreResult<Percentage> {
    if !oracle.price.is_positive() {
        return Err(DomainError::NonPositiveOraclePrice(oracle.price.raw()).into());
    }
    Ok(oracle_spread(price, oracle)?.div_to::<PricePrecision, PercentagePrecision>(oracle.price)?)
}

/// Market with only its reserves replaced by the post-swap reserves.
pub fn market_after_trade(
    base_asset_amount: BaseAmount,
    direction: SwapDirection,
    market: &PerpMarket,
) -> CoreResult<PerpMarket> {
    let out = market.amm.swap_base_asset(base_asset_amount, direction)?;
    Ok(market.with_amm(
        market
            .amm
            .with_reserves(out.base_asset_reserve, out.quote_asset_reserve),
    ))
}

/// Spendable balance of the market's pnl pool.
pub fn market_available_pnl(market: &PerpMarket, bank: &SpotMarket) -> CoreResult<TokenAmount> {
    if bank.market_index != market.pnl_pool.market_index {
        return Err(DomainError::SpotMarketMismatch {
            from: market.pnl_pool.market_index,
            to: bank.market_index,
        }
        .into());
    }
    Ok(get_token_amount(market.pnl_pool.balance, bank, SpotBalanceType::Deposit)?)
}

/// What users are collectively owed if every position closed at `oracle_price`:
/// open interest notional plus the quote legs of every position.
pub fn net_user_pnl(market: &PerpMarket, oracle_price: Price) -> MathResult<QuoteAmount> {
    let amm = &market.amm;
    let notional: QuoteAmount = amm.net_base_asset_amount.checked_mul(oracle_price)?.rescale()?;
    notional
        .checked_add(amm.quote_asset_amount_long)?
        .checked_add(amm.quote_asset_amount_short)
}

/// Net user pnl less social loss and less what the pnl pool can pay.
/// Positive means the pool is short of what users are owed.
pub fn net_user_imbalance(
    market: &PerpMarket,
    bank: &SpotMarket,
    oracle: &OraclePriceData,
) -> CoreResult<QuoteAmount> {
    let available = market_available_pnl(market, bank)?.to_scaled::<QuotePrecision>()?;
    Ok(net_user_pnl(market, oracle.price)?
        .checked_sub(market.amm.cumulative_social_loss)?
        .checked_sub(available)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm::Amm;
    use crate::constants::{BALANCE_PRECISION, BASE_PRECISION, PRICE_PRECISION};
    use crate::market::PoolBalance;
    use crate::precision::{Balance, Peg, Spread};
    use crate::types::MarketIndex;

    fn market() -> PerpMarket {
        PerpMarket::new(
            MarketIndex(0),
            Amm {
                long_spread: Spread::from_raw(500),
                short_spread: Spread::from_raw(500),
                ..Amm::balanced(500_000_000_000_000, Peg::one())
            },
        )
    }

    #[test]
    fn bid_mark_ask_ordering() {
        let market = market();
        let oracle = OraclePriceData::at(Price::from_raw(PRICE_PRECISION));
        let mark = mark_price(&market, &oracle).unwrap();
        let (bid, ask) = bid_ask_prices(&market, &oracle).unwrap();
        assert!(bid <= mark && mark <= ask);
        assert_eq!(mark.raw(), PRICE_PRECISION);
    }

    #[test]
    fn mark_follows_repeg() {
        let mut market = market();
        market.amm.curve_update_intensity = 100;
        let oracle = OraclePriceData::at(Price::from_raw(2 * PRICE_PRECISION));
        assert_eq!(mark_price(&market, &oracle).unwrap().raw(), 2 * PRICE_PRECISION);
        // the input market is untouched
        assert_eq!(market.amm.peg_multiplier, Peg::one());
    }

    #[test]
    fn oracle_spread_sign() {
        let oracle = OraclePriceData::at(Price::from_raw(1_000_000));
        assert_eq!(oracle_spread(Price::from_raw(1_010_000), &oracle).unwrap().raw(), 10_000);
        assert_eq!(oracle_spread_pct(Price::from_raw(990_000), &oracle).unwrap().raw(), -10_000);
    }

    #[test]
    fn market_after_trade_only_moves_reserves() {
        let market = market();
        let after = market_after_trade(
            BaseAmount::from_raw(BASE_PRECISION),
            SwapDirection::Remove,
            &market,
        )
        .unwrap();
        assert!(after.amm.base_asset_reserve < market.amm.base_asset_reserve);
        assert!(after.amm.quote_asset_reserve > market.amm.quote_asset_reserve);
        assert_eq!(after.amm.net_base_asset_amount, market.amm.net_base_asset_amount);
        assert_eq!(after.margin_ratio_initial, market.margin_ratio_initial);
    }

    #[test]
    fn imbalance_is_notional_when_pool_covers_cost_basis() {
        let mut market = market();
        market.amm.net_base_asset_amount = BaseAmount::from_raw(3 * BASE_PRECISION);
        market.amm.quote_asset_amount_long = QuoteAmount::from_raw(-5_000_000);
        market.amm.quote_asset_amount_short = QuoteAmount::from_raw(2_000_000);
        // pool holds exactly the aggregate cost basis: -(long + short) = 3 USDC
        market.pnl_pool = PoolBalance {
            balance: Balance::from_raw(3 * BALANCE_PRECISION),
            ..PoolBalance::default()
        };
        let bank = SpotMarket::quote_market();
        let oracle = OraclePriceData::at(Price::from_raw(2 * PRICE_PRECISION));

        let imbalance = net_user_imbalance(&market, &bank, &oracle).unwrap();
        // 3 base at 2 = 6, minus 3 paid in, minus 3 in the pool
        assert_eq!(imbalance.raw(), 0);
        assert_eq!(market_available_pnl(&market, &bank).unwrap().amount, 3_000_000);
    }

    #[test]
    fn available_pnl_needs_the_pool_bank() {
        let market = market();
        let other = SpotMarket::base_market(MarketIndex(1), 9);
        assert!(market_available_pnl(&market, &other).is_err());
    }
}
