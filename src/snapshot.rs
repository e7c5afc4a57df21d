//! Point-in-time view of the markets and oracles an operation reads.
//!
//! The caller builds one snapshot per computation from state observed at the
//! same moment. Mixing a market from one read with an oracle from another is a
//! caller-side consistency violation: nothing in here can detect it.

use crate::constants::{PRICE_PRECISION, QUOTE_SPOT_MARKET_INDEX};
use crate::error::DomainError;
use crate::market::PerpMarket;
use crate::oracle::OraclePriceData;
use crate::precision::Price;
use crate::spot_market::SpotMarket;
use crate::types::MarketIndex;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub perp_markets: HashMap<MarketIndex, PerpMarket>,
    pub spot_markets: HashMap<MarketIndex, SpotMarket>,
    pub perp_oracles: HashMap<MarketIndex, OraclePriceData>,
    pub spot_oracles: HashMap<MarketIndex, OraclePriceData>,
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_perp_market(mut self, market: PerpMarket, oracle: OraclePriceData) -> Self {
        self.perp_oracles.insert(market.market_index, oracle);
        self.perp_markets.insert(market.market_index, market);
        self
    }

    /// The quote market needs no oracle; every other spot market does.
    pub fn with_spot_market(mut self, market: SpotMarket, oracle: Option<OraclePriceData>) -> Self {
        if let Some(oracle) = oracle {
            self.spot_oracles.insert(market.market_index, oracle);
        }
        self.spot_markets.insert(market.market_index, market);
        self
    }

    pub fn perp_market(&self, market_index: MarketIndex) -> Result<&PerpMarket, DomainError> {
        self.perp_markets
            .get(&market_index)
            .ok_or(DomainError::PerpMarketNotFound(market_index))
    }

    pub fn spot_market(&self, market_index: MarketIndex) -> Result<&SpotMarket, DomainError> {
        self.spot_markets
            .get(&market_index)
            .ok_or(DomainError::SpotMarketNotFound(market_index))
    }

    pub fn perp_oracle(&self, market_index: MarketIndex) -> Result<&OraclePriceData, DomainError> {
        self.perp_oracles
            .get(&market_index)
            .ok_or(DomainError::OracleNotFound(market_index))
    }

    /// Oracle price of a spot asset in quote. The quote asset is fixed at one.
    pub fn spot_oracle_price(&self, market_index: MarketIndex) -> Result<Price, DomainError> {
        if market_index == QUOTE_SPOT_MARKET_INDEX {
            return Ok(Price::from_raw(PRICE_PRECISION));
        }
        let oracle = self
            .spot_oracles
            .get(&market_index)
            .ok_or(DomainError::OracleNotFound(market_index))?;
        if !oracle.price.is_positive() {
            return Err(DomainError::NonPositiveOraclePrice(oracle.price.raw()));
        }
        Ok(oracle.price)
    }
}
