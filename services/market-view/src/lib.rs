//! Trading view derived from an external ledger's event log
//!
//! Reconstructs a live market view (order book, trade history, personal
//! orders and fills, hourly price chart) purely from the append-only event
//! log an exchange contract emits, and sequences state-changing
//! submissions back to that ledger. Matching happens on the ledger; this
//! crate only derives views of ledger truth and drives submission
//! lifecycles.
//!
//! # Architecture
//!
//! ```text
//!        ledger events                     user actions
//!              │                                │
//!         ┌────▼─────┐                    ┌─────▼─────┐
//!         │Ingestion │  backfill + live   │Dispatcher │ submit / confirm
//!         └────┬─────┘                    └─────┬─────┘
//!              │        appends                 │ optimistic appends,
//!         ┌────▼─────────────────────────────── ▼ refetch on confirm
//!         │                  Store                │
//!         └────┬─────────┬──────────┬────────────┘
//!              │         │          │
//!        ┌─────▼───┐ ┌───▼────┐ ┌───▼────┐
//!        │OrderBook│ │Trades /│ │Candles │   pure builders
//!        │         │ │Personal│ │        │
//!        └─────────┘ └────────┘ └────────┘
//! ```
//!
//! Builders are pure functions over a store snapshot; re-running one after
//! any interleaving of live events always reflects the store at that
//! instant.

pub mod balances;
pub mod candles;
pub mod dispatch;
pub mod events;
pub mod ingestion;
pub mod ledger;
pub mod order_book;
pub mod personal;
pub mod session;
pub mod sim;
pub mod store;
pub mod trades;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";

// --- Re-exports for ergonomic external use ---------------------------------

pub use balances::Balances;
pub use candles::{Candle, PriceChart, Trend};
pub use dispatch::{Dispatcher, FailureKind, TxFailure};
pub use events::{EventTopic, RawEvent};
pub use ledger::{
    BlockRange, Contract, IdentityProvider, LedgerClient, LedgerError, Subscription,
    TxHandle, TxReceipt, TxRequest, TxUpdate,
};
pub use order_book::{DecoratedOrder, OrderBook};
pub use personal::{PersonalFill, PersonalOrder};
pub use session::{Session, SessionError};
pub use sim::SimLedger;
pub use store::{Flag, Provenance, SharedStore, Store};
pub use trades::{DecoratedFill, Tick};
