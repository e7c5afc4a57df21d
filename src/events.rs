// 9.0: liquidation records. every successful liquidation produces exactly one immutable
// record; the caller pushes it to a RecordSink and the ledger decides what to do with it.
// the serialized layout is consumed downstream, so field names and order are fixed:
// common fields first, then liquidationType, then the variant's own fields.

use crate::precision::{BaseAmount, LiquidationFee, Price, QuoteAmount, TokenAmount};
use crate::types::{AccountId, MarketIndex, Timestamp};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationRecord {
    pub liquidation_id: u64,
    pub ts: Timestamp,
    pub user: AccountId,
    pub liquidator: AccountId,
    // figures of the margin check that failed, taken before the transfer
    pub margin_requirement: QuoteAmount,
    pub total_collateral: QuoteAmount,
    #[serde(flatten)]
    pub kind: LiquidationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "liquidationType", rename_all = "camelCase")]
pub enum LiquidationKind {
    LiquidatePerp(LiquidatePerpRecord),
    LiquidatePerpPnlForDeposit(LiquidatePerpPnlForDepositRecord),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidatePerpRecord {
    pub market_index: MarketIndex,
    pub oracle_price: Price,
    // base moved from user to liquidator, signed from the user's side
    pub base_asset_amount: BaseAmount,
    pub quote_asset_amount: QuoteAmount,
    pub liquidator_fee: LiquidationFee,
    pub liquidator_fee_amount: QuoteAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidatePerpPnlForDepositRecord {
    pub perp_market_index: MarketIndex,
    pub market_oracle_price: Price,
    pub pnl_transfer: QuoteAmount,
    pub asset_market_index: MarketIndex,
    pub asset_price: Price,
    pub asset_transfer: TokenAmount,
}

impl LiquidationRecord {
    pub fn liquidation_type(&self) -> &'static str {
        match self.kind {
            LiquidationKind::LiquidatePerp(_) => "liquidatePerp",
            LiquidationKind::LiquidatePerpPnlForDeposit(_) => "liquidatePerpPnlForDeposit",
        }
    }
}

pub trait RecordSink {
    fn record(&mut self, record: LiquidationRecord);
}

/// In-memory sink, mostly for tests and replays.
#[derive(Debug, Default)]
pub struct RecordCollector {
    records: Vec<LiquidationRecord>,
}

impl RecordCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LiquidationRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl RecordSink for RecordCollector {
    fn record(&mut self, record: LiquidationRecord) {
        self.records.push(record);
    }
}
