//! Personal view builder
//!
//! Account-relative projections of the shared collections: the fills an
//! account took part in (with side inferred from that account's
//! perspective) and the account's own open orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::Address;
use types::order::{Order, Side};
use types::trade::Fill;

use crate::order_book;
use crate::store::Store;
use crate::trades;

/// A fill decorated from one account's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalFill {
    pub fill: Fill,
    /// Buy or sell as experienced by the account, not by the maker.
    pub side: Side,
    pub price: Decimal,
    pub token_amount: Decimal,
    /// Token amount prefixed with the side's sign for display.
    pub sign: char,
}

/// An open order belonging to the account, decorated with side only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalOrder {
    pub order: Order,
    pub side: Side,
    pub price: Decimal,
    pub token_amount: Decimal,
}

/// Fills the account participated in, newest first.
///
/// The maker keeps the order's own side; the taker experienced the
/// opposite. Decoration walks the ascending sequence so any
/// chronology-dependent step sees fills in event order, then the result is
/// re-sorted for newest-first presentation.
pub fn fills(store: &Store, account: &Address) -> Vec<PersonalFill> {
    let mut mine: Vec<Fill> = trades::chronological(store)
        .into_iter()
        .filter(|fill| fill.involves(account))
        .collect();

    let mut decorated: Vec<PersonalFill> = mine
        .drain(..)
        .filter_map(|fill| {
            let side = fill.perspective_side(account)?;
            Some(PersonalFill {
                price: fill.price(),
                token_amount: fill.order.token_amount(),
                sign: side.sign(),
                side,
                fill,
            })
        })
        .collect();

    decorated.sort_by(|a, b| {
        (b.fill.timestamp(), b.fill.id()).cmp(&(a.fill.timestamp(), a.fill.id()))
    });
    decorated
}

/// The account's open orders, newest first.
pub fn open_orders(store: &Store, account: &Address) -> Vec<PersonalOrder> {
    let mut mine: Vec<PersonalOrder> = order_book::open_orders(store)
        .into_iter()
        .filter(|order| &order.maker == account)
        .map(|order| PersonalOrder {
            side: order.side(),
            price: order.price(),
            token_amount: order.token_amount(),
            order,
        })
        .collect();

    mine.sort_by(|a, b| (b.order.timestamp, b.order.id).cmp(&(a.order.timestamp, a.order.id)));
    mine
}
