//! Session bootstrap and teardown
//!
//! A session wires the whole pipeline together for one account: resolve
//! the ledger connection and identity (both fatal when absent), resolve
//! the contracts on the connected network (absence degrades the affected
//! views instead of failing), backfill history, install live
//! subscriptions, and load balances. Everything derived is rebuilt from
//! scratch at the next connect; nothing is persisted locally.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use types::ids::Address;

use crate::balances::{load_balances, Balances};
use crate::candles::{self, PriceChart};
use crate::dispatch::Dispatcher;
use crate::ingestion::{load_history, subscribe_live, LiveFeeds};
use crate::ledger::{Contract, IdentityProvider, LedgerClient};
use crate::order_book::{self, OrderBook};
use crate::personal::{self, PersonalFill, PersonalOrder};
use crate::store::SharedStore;
use crate::trades::{self, DecoratedFill};

/// Fatal session bootstrap failures. Both call for user remediation, not
/// a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No ledger client is available.
    #[error("no ledger connection available; install or unlock a wallet provider")]
    ConnectionUnavailable,

    /// No account is signed in.
    #[error("no active account; sign in with the wallet provider")]
    AccountUnavailable,
}

/// A connected trading-view session for one account.
pub struct Session {
    client: Arc<dyn LedgerClient>,
    account: Address,
    token: Option<Address>,
    store: SharedStore,
    feeds: Option<LiveFeeds>,
    balances_tx: Arc<watch::Sender<Balances>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect a new session through the identity provider.
    pub async fn connect(identity: &dyn IdentityProvider) -> Result<Self, SessionError> {
        let client = identity
            .ledger_client()
            .ok_or(SessionError::ConnectionUnavailable)?;
        let account = identity
            .active_account()
            .ok_or(SessionError::AccountUnavailable)?;

        let token = client.contract_address(Contract::Token);
        if token.is_none() {
            warn!("token contract not deployed on this network; token views degraded");
        }
        let exchange = client.contract_address(Contract::Exchange);
        if exchange.is_none() {
            warn!("exchange contract not deployed on this network; order views degraded");
        }

        let store = SharedStore::new();

        // Without an exchange contract there is no event log to read; the
        // order-domain views stay empty and unloaded.
        let feeds = if exchange.is_some() {
            if let Err(err) = load_history(client.as_ref(), &store).await {
                warn!(error = %err, "historical backfill failed; views stay unloaded");
            }
            match subscribe_live(client.as_ref(), &store) {
                Ok(feeds) => Some(feeds),
                Err(err) => {
                    warn!(error = %err, "live subscription install failed");
                    None
                }
            }
        } else {
            None
        };

        let (balances_tx, _) = watch::channel(Balances::default());
        let balances_tx = Arc::new(balances_tx);
        let balances = load_balances(client.as_ref(), &account, token.as_ref(), &store).await;
        balances_tx.send_replace(balances);

        info!(account = %account, "session connected");
        Ok(Self {
            client,
            account,
            token,
            store,
            feeds,
            balances_tx,
        })
    }

    /// The signed-in account.
    pub fn account(&self) -> &Address {
        &self.account
    }

    /// The shared store, for direct snapshot access.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The current order book.
    pub fn order_book(&self) -> OrderBook {
        self.store.read(order_book::build)
    }

    /// Whether the order book's inputs are fully backfilled.
    pub fn order_book_loaded(&self) -> bool {
        self.store.read(order_book::is_loaded)
    }

    /// The decorated trade history, newest first.
    pub fn trade_history(&self) -> Vec<DecoratedFill> {
        self.store.read(trades::build)
    }

    /// Fills involving this session's account, newest first.
    pub fn my_fills(&self) -> Vec<PersonalFill> {
        self.store.read(|s| personal::fills(s, &self.account))
    }

    /// This session's open orders, newest first.
    pub fn my_open_orders(&self) -> Vec<PersonalOrder> {
        self.store.read(|s| personal::open_orders(s, &self.account))
    }

    /// The hourly price chart and headline price.
    pub fn price_chart(&self) -> PriceChart {
        self.store.read(candles::build)
    }

    /// Latest balances; the receiver updates after every reload.
    pub fn balances(&self) -> watch::Receiver<Balances> {
        self.balances_tx.subscribe()
    }

    /// A dispatcher submitting actions as this session's account.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.client.clone(),
            self.store.clone(),
            self.account.clone(),
            self.balances_tx.clone(),
        )
    }

    /// Reload balances on demand and publish the result.
    pub async fn reload_balances(&self) -> Balances {
        let balances = load_balances(
            self.client.as_ref(),
            &self.account,
            self.token.as_ref(),
            &self.store,
        )
        .await;
        self.balances_tx.send_replace(balances);
        balances
    }

    /// Tear the session down: unsubscribe every live feed. The store and
    /// everything derived from it are dropped with the session.
    pub async fn disconnect(self) {
        if let Some(feeds) = self.feeds {
            feeds.shutdown().await;
        }
        info!(account = %self.account, "session disconnected");
    }
}
