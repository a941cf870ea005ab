//! Order and cancellation records
//!
//! An order is created once by the ledger and never mutated; whether it is
//! still open is derived by the view builders from the fill and cancellation
//! collections, not stored on the order itself.

use crate::ids::{Address, OrderId};
use crate::numeric::{ratio_price, to_display};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side from the maker's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Giving native asset to receive tokens.
    Buy,
    /// Giving tokens to receive native asset.
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Sign used when presenting amounts from this side's perspective.
    pub fn sign(&self) -> char {
        match self {
            Side::Buy => '+',
            Side::Sell => '-',
        }
    }
}

/// An order as emitted by the ledger's Order event.
///
/// `amount_get`/`amount_give` are raw smallest-unit integers. One of
/// `token_get`/`token_give` is the native-asset sentinel; which one it is
/// determines the maker's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Ledger-assigned id, unique and monotonically increasing.
    pub id: OrderId,
    /// Account that created the order.
    pub maker: Address,
    /// Asset the maker wants to receive.
    pub token_get: Address,
    /// Raw amount of `token_get` wanted.
    pub amount_get: u128,
    /// Asset the maker offers.
    pub token_give: Address,
    /// Raw amount of `token_give` offered.
    pub amount_give: u128,
    /// Creation time, Unix seconds.
    pub timestamp: i64,
}

impl Order {
    /// Maker side: buying tokens when giving the native asset.
    pub fn side(&self) -> Side {
        if self.token_give.is_native() {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    /// Raw native-asset leg of the order.
    pub fn native_amount_raw(&self) -> u128 {
        match self.side() {
            Side::Buy => self.amount_give,
            Side::Sell => self.amount_get,
        }
    }

    /// Raw token leg of the order.
    pub fn token_amount_raw(&self) -> u128 {
        match self.side() {
            Side::Buy => self.amount_get,
            Side::Sell => self.amount_give,
        }
    }

    /// Price in native units per token, from the raw integer ratio.
    pub fn price(&self) -> Decimal {
        ratio_price(self.native_amount_raw(), self.token_amount_raw())
    }

    /// Native-asset leg in display units.
    pub fn native_amount(&self) -> Decimal {
        to_display(self.native_amount_raw())
    }

    /// Token leg in display units.
    pub fn token_amount(&self) -> Decimal {
        to_display(self.token_amount_raw())
    }
}

/// A cancellation as emitted by the ledger's Cancel event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Id of the cancelled order.
    pub order_id: OrderId,
    /// Account that cancelled, always the order's maker.
    pub maker: Address,
    /// Cancellation time, Unix seconds.
    pub timestamp: i64,
}
