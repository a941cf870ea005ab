//! Order book builder
//!
//! Derives the set of open orders from the three order-domain collections
//! and decorates them for display. An order is open exactly when its id
//! appears in neither the fill set nor the cancellation set; the ledger
//! emits no "order closed" event, so openness is always derived, never
//! stored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::order::{Order, Side};

use crate::store::Store;

/// An open order decorated for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedOrder {
    pub order: Order,
    pub side: Side,
    /// Token leg in display units.
    pub token_amount: Decimal,
    /// Native-asset leg in display units.
    pub native_amount: Decimal,
    /// Native units per token, from the raw integer ratio.
    pub price: Decimal,
}

/// Decorate an order with side, display amounts, and price.
pub fn decorate_order(order: Order) -> DecoratedOrder {
    let side = order.side();
    let token_amount = order.token_amount();
    let native_amount = order.native_amount();
    let price = order.price();
    DecoratedOrder {
        order,
        side,
        token_amount,
        native_amount,
        price,
    }
}

/// The open orders, partitioned by side.
///
/// Both partitions are sorted descending by price. That the sell side is
/// not ascending is a deliberate presentation convention carried over from
/// the system this view mirrors; keep it reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub buy_orders: Vec<DecoratedOrder>,
    pub sell_orders: Vec<DecoratedOrder>,
}

/// Orders whose id is absent from both the fill and cancellation sets.
pub fn open_orders(store: &Store) -> Vec<Order> {
    store
        .orders()
        .filter(|order| !store.has_fill(order.id) && !store.has_cancellation(order.id))
        .cloned()
        .collect()
}

/// Build the order book from the current store snapshot.
pub fn build(store: &Store) -> OrderBook {
    let mut book = OrderBook::default();
    for order in open_orders(store) {
        let decorated = decorate_order(order);
        match decorated.side {
            Side::Buy => book.buy_orders.push(decorated),
            Side::Sell => book.sell_orders.push(decorated),
        }
    }

    book.buy_orders.sort_by(|a, b| b.price.cmp(&a.price));
    book.sell_orders.sort_by(|a, b| b.price.cmp(&a.price));
    book
}

/// Whether every collection the book depends on has been backfilled.
pub fn is_loaded(store: &Store) -> bool {
    store.order_book_loaded()
}
