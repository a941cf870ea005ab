//! Exchange deposit and withdrawal records
//!
//! Deposit/Withdraw events move funds between a wallet and the exchange's
//! internal ledger. They carry no order id and no timestamp; the balance
//! snapshot after the move is part of the event payload.

use crate::ids::Address;
use crate::numeric::to_display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a funds movement relative to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Deposit,
    Withdraw,
}

/// A deposit into or withdrawal out of the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub direction: TransferDirection,
    /// Asset moved; the native sentinel for the native asset.
    pub token: Address,
    /// Account whose exchange balance changed.
    pub account: Address,
    /// Raw amount moved.
    pub amount: u128,
    /// Raw exchange balance for (token, account) after the move.
    pub balance_after: u128,
}

impl Transfer {
    /// Amount moved, in display units.
    pub fn amount_display(&self) -> Decimal {
        to_display(self.amount)
    }

    /// Post-move exchange balance, in display units.
    pub fn balance_after_display(&self) -> Decimal {
        to_display(self.balance_after)
    }
}
