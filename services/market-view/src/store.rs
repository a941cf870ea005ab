//! Session state store
//!
//! Single source of truth for everything the view builders derive from.
//! Four append-only collections (orders, cancellations, fills, transfers)
//! plus a handful of scalar flags. Records keyed by order id are
//! deduplicated on append: historical backfill and the live subscription
//! can both deliver the same event, and the dispatcher's optimistic local
//! records must yield to ledger truth on the next refetch.
//!
//! The store is created at session start and dropped at disconnect; it is
//! always passed explicitly, never held in a global.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use tracing::debug;
use types::ids::OrderId;
use types::order::{Cancellation, Order};
use types::trade::Fill;
use types::transfer::Transfer;

/// Record collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Collection {
    Orders,
    Cancellations,
    Fills,
    Transfers,
}

impl Collection {
    pub fn label(&self) -> &'static str {
        match self {
            Collection::Orders => "orders",
            Collection::Cancellations => "cancellations",
            Collection::Fills => "fills",
            Collection::Transfers => "transfers",
        }
    }
}

/// Scalar UI flags toggled by the dispatcher and the balance loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// A cancel-order action is in flight.
    OrderCancelling,
    /// A fill-order action is in flight.
    OrderFilling,
    /// Balances are being (re)loaded.
    BalancesLoading,
}

/// Where a record came from.
///
/// Ledger records are authoritative. Local records are optimistic
/// placeholders appended on transaction confirmation, valid only until the
/// next refetch delivers the ledger's own copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Ledger,
    Local,
}

/// Outcome of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// First record under this id.
    Inserted,
    /// A ledger record replaced a local placeholder.
    Superseded,
    /// Re-delivery of an already-stored id, dropped.
    Discarded,
}

#[derive(Debug, Clone)]
struct Stored<T> {
    record: T,
    provenance: Provenance,
}

fn upsert<T>(
    map: &mut BTreeMap<OrderId, Stored<T>>,
    id: OrderId,
    record: T,
    provenance: Provenance,
    collection: Collection,
) -> Appended {
    match map.entry(id) {
        Entry::Vacant(slot) => {
            slot.insert(Stored { record, provenance });
            Appended::Inserted
        }
        Entry::Occupied(mut slot) => {
            if slot.get().provenance == Provenance::Local && provenance == Provenance::Ledger {
                slot.insert(Stored { record, provenance });
                Appended::Superseded
            } else {
                debug!(
                    id = %id,
                    collection = collection.label(),
                    "discarding duplicate record"
                );
                Appended::Discarded
            }
        }
    }
}

/// Append-only record collections plus scalar flags.
#[derive(Debug, Default)]
pub struct Store {
    orders: BTreeMap<OrderId, Stored<Order>>,
    cancellations: BTreeMap<OrderId, Stored<Cancellation>>,
    fills: BTreeMap<OrderId, Stored<Fill>>,
    transfers: Vec<Transfer>,
    loaded: BTreeSet<Collection>,
    order_cancelling: bool,
    order_filling: bool,
    balances_loading: bool,
}

impl Store {
    /// Fresh store for a new session. Balances start as loading: nothing
    /// has been fetched yet.
    pub fn new() -> Self {
        Self {
            balances_loading: true,
            ..Self::default()
        }
    }

    pub fn append_order(&mut self, order: Order, provenance: Provenance) -> Appended {
        upsert(
            &mut self.orders,
            order.id,
            order,
            provenance,
            Collection::Orders,
        )
    }

    pub fn append_cancellation(
        &mut self,
        cancellation: Cancellation,
        provenance: Provenance,
    ) -> Appended {
        upsert(
            &mut self.cancellations,
            cancellation.order_id,
            cancellation,
            provenance,
            Collection::Cancellations,
        )
    }

    pub fn append_fill(&mut self, fill: Fill, provenance: Provenance) -> Appended {
        upsert(&mut self.fills, fill.id(), fill, provenance, Collection::Fills)
    }

    /// Transfers carry no ledger id, so they append without dedup.
    pub fn append_transfer(&mut self, transfer: Transfer) {
        self.transfers.push(transfer);
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::OrderCancelling => self.order_cancelling = value,
            Flag::OrderFilling => self.order_filling = value,
            Flag::BalancesLoading => self.balances_loading = value,
        }
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::OrderCancelling => self.order_cancelling,
            Flag::OrderFilling => self.order_filling,
            Flag::BalancesLoading => self.balances_loading,
        }
    }

    /// Mark a collection's historical backfill complete.
    pub fn mark_loaded(&mut self, collection: Collection) {
        self.loaded.insert(collection);
    }

    pub fn is_loaded(&self, collection: Collection) -> bool {
        self.loaded.contains(&collection)
    }

    /// Whether every collection the order book depends on is loaded.
    pub fn order_book_loaded(&self) -> bool {
        self.is_loaded(Collection::Orders)
            && self.is_loaded(Collection::Cancellations)
            && self.is_loaded(Collection::Fills)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> + '_ {
        self.orders.values().map(|stored| &stored.record)
    }

    pub fn cancellations(&self) -> impl Iterator<Item = &Cancellation> + '_ {
        self.cancellations.values().map(|stored| &stored.record)
    }

    pub fn fills(&self) -> impl Iterator<Item = &Fill> + '_ {
        self.fills.values().map(|stored| &stored.record)
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> + '_ {
        self.transfers.iter()
    }

    pub fn has_fill(&self, id: OrderId) -> bool {
        self.fills.contains_key(&id)
    }

    pub fn has_cancellation(&self, id: OrderId) -> bool {
        self.cancellations.contains_key(&id)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn cancellation_count(&self) -> usize {
        self.cancellations.len()
    }

    pub fn fill_count(&self) -> usize {
        self.fills.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.len()
    }
}

/// Store shared across the ingestion tasks, the dispatcher, and readers.
///
/// Critical sections are short: a single append or a pure derivation over
/// the locked snapshot. A poisoned lock yields its data instead of
/// panicking the whole session; appends are single inserts, so a writer
/// that panicked cannot have left a half-applied record.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<RwLock<Store>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Store::new())),
        }
    }

    /// Run a closure over a read-locked snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        match self.inner.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    /// Run a closure with write access.
    pub fn write<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        match self.inner.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
