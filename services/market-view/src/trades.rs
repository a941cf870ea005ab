//! Trade history builder
//!
//! Decorates each fill with a direction marker relative to the fill that
//! chronologically preceded it. The marker is assigned in one pass over the
//! ascending sequence and is fixed from then on; the list is only re-sorted
//! for newest-first presentation afterwards. Recomputing the marker against
//! the presentation order would invert every comparison.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::trade::Fill;

use crate::store::{Collection, Store};

/// Direction of a fill's price relative to the previous fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tick {
    /// Price at or above the previous fill. The first fill of the history
    /// compares against itself and is therefore up.
    Up,
    /// Price below the previous fill.
    Down,
}

/// A fill decorated for the trade history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedFill {
    pub fill: Fill,
    pub price: Decimal,
    pub token_amount: Decimal,
    pub native_amount: Decimal,
    pub tick: Tick,
}

/// All fills sorted ascending by (timestamp, id).
///
/// Order ids increase monotonically, so the id tie-break keeps the result
/// stable however the input happened to arrive.
pub fn chronological(store: &Store) -> Vec<Fill> {
    let mut fills: Vec<Fill> = store.fills().cloned().collect();
    fills.sort_by_key(|fill| (fill.timestamp(), fill.id()));
    fills
}

/// Build the trade history, newest first.
pub fn build(store: &Store) -> Vec<DecoratedFill> {
    let mut decorated = decorate_ascending(chronological(store));
    decorated.sort_by(|a, b| {
        (b.fill.timestamp(), b.fill.id()).cmp(&(a.fill.timestamp(), a.fill.id()))
    });
    decorated
}

/// Whether the fill history has been backfilled.
pub fn is_loaded(store: &Store) -> bool {
    store.is_loaded(Collection::Fills)
}

/// Single decorating walk over an ascending fill sequence.
fn decorate_ascending(fills: Vec<Fill>) -> Vec<DecoratedFill> {
    let mut previous_price: Option<Decimal> = None;
    fills
        .into_iter()
        .map(|fill| {
            let price = fill.price();
            let tick = match previous_price {
                Some(prev) if price < prev => Tick::Down,
                _ => Tick::Up,
            };
            previous_price = Some(price);
            DecoratedFill {
                price,
                token_amount: fill.order.token_amount(),
                native_amount: fill.order.native_amount(),
                tick,
                fill,
            }
        })
        .collect()
}
