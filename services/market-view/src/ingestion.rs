//! Event ingestion: historical backfill and live subscriptions
//!
//! `load_history` replays the full event log for the three order-domain
//! topics and marks each collection loaded; `subscribe_live` installs the
//! five persistent listeners and drains each on its own task. An event that
//! fails to decode is logged and skipped; the listener keeps running. A
//! broken stream ends its task without resubscription.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{
    decode_cancellation, decode_fill, decode_order, decode_transfer, EventDecodeError,
    EventTopic, RawEvent,
};
use crate::ledger::{BlockRange, LedgerClient, LedgerError, Subscription};
use crate::store::{Collection, Flag, Provenance, SharedStore};

/// Replay the historical event log into the store.
///
/// Queries the Cancel, Trade, and Order topics independently over the full
/// range. Append order across topics does not matter to the derived views,
/// but each collection's loaded mark gates readiness of the views that
/// depend on it.
pub async fn load_history(
    client: &dyn LedgerClient,
    store: &SharedStore,
) -> Result<(), LedgerError> {
    let cancels = client
        .fetch_events(EventTopic::Cancel, BlockRange::full())
        .await?;
    let appended = append_batch(store, &cancels);
    store.write(|s| s.mark_loaded(Collection::Cancellations));
    info!(count = appended, "cancellation history loaded");

    let trades = client
        .fetch_events(EventTopic::Trade, BlockRange::full())
        .await?;
    let appended = append_batch(store, &trades);
    store.write(|s| s.mark_loaded(Collection::Fills));
    info!(count = appended, "fill history loaded");

    let orders = client
        .fetch_events(EventTopic::Order, BlockRange::full())
        .await?;
    let appended = append_batch(store, &orders);
    store.write(|s| s.mark_loaded(Collection::Orders));
    info!(count = appended, "order history loaded");

    Ok(())
}

/// Decode and append a historical batch, skipping undecodable events.
fn append_batch(store: &SharedStore, batch: &[RawEvent]) -> usize {
    let mut appended = 0;
    for raw in batch {
        match apply_event(store, raw) {
            Ok(()) => appended += 1,
            Err(err) => warn!(
                topic = raw.topic().label(),
                error = %err,
                "skipping undecodable historical event"
            ),
        }
    }
    appended
}

/// Decode one event and apply it to the store.
///
/// Deposit and Withdraw events carry no order-domain payload; they record a
/// transfer and clear the balances-loading flag, which is the signal that
/// fresh balance values exist on the ledger.
pub(crate) fn apply_event(store: &SharedStore, raw: &RawEvent) -> Result<(), EventDecodeError> {
    match raw.topic() {
        EventTopic::Order => {
            let order = decode_order(raw)?;
            store.write(|s| s.append_order(order, Provenance::Ledger));
        }
        EventTopic::Cancel => {
            let cancellation = decode_cancellation(raw)?;
            store.write(|s| s.append_cancellation(cancellation, Provenance::Ledger));
        }
        EventTopic::Trade => {
            let fill = decode_fill(raw)?;
            store.write(|s| s.append_fill(fill, Provenance::Ledger));
        }
        EventTopic::Deposit | EventTopic::Withdraw => {
            let transfer = decode_transfer(raw)?;
            store.write(|s| {
                s.append_transfer(transfer);
                s.set_flag(Flag::BalancesLoading, false);
            });
        }
    }
    Ok(())
}

/// Handles to the live subscription drain tasks.
///
/// Held by the session; [`LiveFeeds::shutdown`] is the explicit
/// unsubscription at teardown.
#[derive(Debug)]
pub struct LiveFeeds {
    tasks: Vec<JoinHandle<()>>,
}

impl LiveFeeds {
    /// Number of active topic listeners.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every listener and wait for its task to finish.
    pub async fn shutdown(self) {
        for task in self.tasks {
            task.abort();
            let _ = task.await;
        }
        info!("live subscriptions torn down");
    }
}

/// Install live listeners for all five topics.
pub fn subscribe_live(
    client: &dyn LedgerClient,
    store: &SharedStore,
) -> Result<LiveFeeds, LedgerError> {
    let mut tasks = Vec::with_capacity(EventTopic::all().len());
    for &topic in EventTopic::all() {
        let subscription = client.subscribe(topic)?;
        let store = store.clone();
        tasks.push(tokio::spawn(drain(subscription, store)));
        debug!(topic = topic.label(), "live subscription installed");
    }
    info!(topics = tasks.len(), "live subscriptions installed");
    Ok(LiveFeeds { tasks })
}

async fn drain(mut subscription: Subscription, store: SharedStore) {
    let topic = subscription.topic();
    while let Some(raw) = subscription.recv().await {
        if let Err(err) = apply_event(&store, &raw) {
            warn!(
                topic = topic.label(),
                error = %err,
                "dropping undecodable live event"
            );
        }
    }
    debug!(topic = topic.label(), "live subscription stream ended");
}
