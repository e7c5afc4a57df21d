//! User accounts as the core sees them.
//!
//! An account is a read-only snapshot handed in by the caller: its perp and spot
//! positions, its liquidation status, and the id the next liquidation record
//! will carry. Operations that change it return a new account.

use crate::error::DomainError;
use crate::position::PerpPosition;
use crate::spot_position::SpotPosition;
use crate::types::{AccountId, MarketIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserStatus {
    #[default]
    Active,
    BeingLiquidated,
    Bankrupt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub account_id: AccountId,
    pub perp_positions: Vec<PerpPosition>,
    pub spot_positions: Vec<SpotPosition>,
    pub status: UserStatus,
    pub next_liquidation_id: u64,
}

impl UserAccount {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            perp_positions: Vec::new(),
            spot_positions: Vec::new(),
            status: UserStatus::Active,
            next_liquidation_id: 1,
        }
    }

    pub fn is_being_liquidated(&self) -> bool {
        self.status == UserStatus::BeingLiquidated
    }

    pub fn is_bankrupt(&self) -> bool {
        self.status == UserStatus::Bankrupt
    }

    pub fn get_perp_position(&self, market_index: MarketIndex) -> Result<&PerpPosition, DomainError> {
        self.perp_positions
            .iter()
            .find(|p| p.market_index == market_index)
            .ok_or(DomainError::PositionNotFound(market_index))
    }

    pub fn get_perp_position_mut(&mut self, market_index: MarketIndex) -> Result<&mut PerpPosition, DomainError> {
        self.perp_positions
            .iter_mut()
            .find(|p| p.market_index == market_index)
            .ok_or(DomainError::PositionNotFound(market_index))
    }

    /// Existing position in `market_index`, or a fresh one appended for it.
    pub fn force_get_perp_position_mut(&mut self, market_index: MarketIndex) -> &mut PerpPosition {
        let index = match self.perp_positions.iter().position(|p| p.market_index == market_index) {
            Some(index) => index,
            None => {
                self.perp_positions.push(PerpPosition::new(market_index));
                self.perp_positions.len() - 1
            }
        };
        &mut self.perp_positions[index]
    }

    pub fn get_spot_position(&self, market_index: MarketIndex) -> Option<&SpotPosition> {
        self.spot_positions.iter().find(|p| p.market_index == market_index)
    }

    pub fn get_spot_position_mut(&mut self, market_index: MarketIndex) -> Option<&mut SpotPosition> {
        self.spot_positions.iter_mut().find(|p| p.market_index == market_index)
    }

    pub fn force_get_spot_position_mut(&mut self, market_index: MarketIndex) -> &mut SpotPosition {
        let index = match self.spot_positions.iter().position(|p| p.market_index == market_index) {
            Some(index) => index,
            None => {
                self.spot_positions.push(SpotPosition::new(market_index));
                self.spot_positions.len() - 1
            }
        };
        &mut self.spot_positions[index]
    }

    /// Take the current liquidation id and advance the counter.
    pub(crate) fn take_liquidation_id(&mut self) -> u64 {
        let id = self.next_liquidation_id;
        self.next_liquidation_id = self.next_liquidation_id.saturating_add(1);
        id
    }
}
