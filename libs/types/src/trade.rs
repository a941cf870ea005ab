//! Fill (executed trade) records
//!
//! A fill is emitted when a taker executes a maker's order. The record is
//! order-shaped with the taker account attached; the order's fields describe
//! the maker's terms, so side inference from a given account's perspective
//! has to invert when that account is the taker.

use crate::ids::{Address, OrderId};
use crate::order::{Order, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A completed match between a maker's order and a taker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// The matched order, as the maker created it.
    pub order: Order,
    /// Account that executed the match.
    pub taker: Address,
}

impl Fill {
    /// Id of the filled order.
    pub fn id(&self) -> OrderId {
        self.order.id
    }

    /// Execution timestamp, Unix seconds.
    pub fn timestamp(&self) -> i64 {
        self.order.timestamp
    }

    /// Execution price in native units per token.
    pub fn price(&self) -> Decimal {
        self.order.price()
    }

    /// Whether the given account took part in this fill on either side.
    pub fn involves(&self, account: &Address) -> bool {
        &self.order.maker == account || &self.taker == account
    }

    /// Side of the fill from the given account's perspective.
    ///
    /// The maker keeps the order's own side; the taker is on the logical
    /// inverse. Returns `None` for an uninvolved account.
    pub fn perspective_side(&self, account: &Address) -> Option<Side> {
        if &self.order.maker == account {
            Some(self.order.side())
        } else if &self.taker == account {
            Some(self.order.side().opposite())
        } else {
            None
        }
    }
}
