//! Ledger client abstraction
//!
//! Everything this service consumes from the outside world sits behind two
//! traits: [`LedgerClient`] for the chain itself (historical queries, live
//! subscriptions, balance reads, transaction submission) and
//! [`IdentityProvider`] for the signed-in account. Submissions return a
//! [`TxHandle`] that yields lifecycle updates in the order the ledger
//! observes them: hash, then receipt, or an error at any point.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use types::ids::{Address, OrderId, TxHash};

use crate::events::{EventTopic, RawEvent};

/// Contracts a session resolves on the connected network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contract {
    /// The traded token.
    Token,
    /// The exchange that owns the event log.
    Exchange,
}

/// Block range for a historical event query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    /// Upper bound; `None` means the latest block.
    pub to: Option<u64>,
}

impl BlockRange {
    /// The full range, genesis to latest.
    pub fn full() -> Self {
        Self { from: 0, to: None }
    }
}

/// Structured error code a ledger client may attach to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The account lacks funds for the requested action.
    InsufficientBalance,
    /// The RPC layer failed before or after submission.
    Rpc,
    /// The ledger rejected or reverted the transaction.
    Reverted,
}

/// Error delivered by the ledger client.
///
/// Carries a structured code when the client can produce one; the message
/// is the raw client text and is only pattern-matched as a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LedgerError {
    pub code: Option<ErrorCode>,
    pub message: String,
}

impl LedgerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Receipt delivered once a transaction is mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Block timestamp, Unix seconds.
    pub timestamp: i64,
    /// Events emitted by the transaction, e.g. the Order event a
    /// make-order call produces.
    pub logs: Vec<RawEvent>,
}

/// A lifecycle update for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxUpdate {
    /// The transaction reached the pending pool.
    Hash(TxHash),
    /// The transaction was mined.
    Receipt(TxReceipt),
    /// The submission failed; terminal.
    Failed(LedgerError),
}

/// Receiving side of a transaction lifecycle.
#[derive(Debug)]
pub struct TxHandle {
    rx: mpsc::UnboundedReceiver<TxUpdate>,
}

impl TxHandle {
    /// Create a connected feeder/handle pair.
    pub fn channel() -> (TxFeeder, TxHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TxFeeder { tx }, TxHandle { rx })
    }

    /// Next lifecycle update; `None` once the feeder is gone.
    pub async fn next_update(&mut self) -> Option<TxUpdate> {
        self.rx.recv().await
    }
}

/// Feeding side of a transaction lifecycle, held by the ledger client.
#[derive(Debug, Clone)]
pub struct TxFeeder {
    tx: mpsc::UnboundedSender<TxUpdate>,
}

impl TxFeeder {
    pub fn hash(&self, hash: TxHash) {
        let _ = self.tx.send(TxUpdate::Hash(hash));
    }

    pub fn receipt(&self, receipt: TxReceipt) {
        let _ = self.tx.send(TxUpdate::Receipt(receipt));
    }

    pub fn fail(&self, error: LedgerError) {
        let _ = self.tx.send(TxUpdate::Failed(error));
    }
}

/// A live event subscription for one topic.
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// closes the channel, which the client observes as an unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    topic: EventTopic,
    rx: mpsc::UnboundedReceiver<RawEvent>,
}

impl Subscription {
    /// Create a connected sender/subscription pair for a topic.
    pub fn channel(topic: EventTopic) -> (mpsc::UnboundedSender<RawEvent>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Subscription { topic, rx })
    }

    pub fn topic(&self) -> EventTopic {
        self.topic
    }

    /// Next delivered event; `None` once the stream ends.
    pub async fn recv(&mut self) -> Option<RawEvent> {
        self.rx.recv().await
    }

    /// Tear down the subscription.
    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

/// A state-changing action submitted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxRequest {
    DepositNative {
        amount: u128,
    },
    WithdrawNative {
        amount: u128,
    },
    /// Token allowance grant; precedes a token deposit.
    Approve {
        token: Address,
        spender: Address,
        amount: u128,
    },
    DepositToken {
        token: Address,
        amount: u128,
    },
    WithdrawToken {
        token: Address,
        amount: u128,
    },
    MakeOrder {
        token_get: Address,
        amount_get: u128,
        token_give: Address,
        amount_give: u128,
    },
    CancelOrder {
        order_id: OrderId,
    },
    FillOrder {
        order_id: OrderId,
    },
}

impl TxRequest {
    /// Request kind as a string label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            TxRequest::DepositNative { .. } => "deposit_native",
            TxRequest::WithdrawNative { .. } => "withdraw_native",
            TxRequest::Approve { .. } => "approve",
            TxRequest::DepositToken { .. } => "deposit_token",
            TxRequest::WithdrawToken { .. } => "withdraw_token",
            TxRequest::MakeOrder { .. } => "make_order",
            TxRequest::CancelOrder { .. } => "cancel_order",
            TxRequest::FillOrder { .. } => "fill_order",
        }
    }
}

/// Client for the external ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Historical events for a topic over a block range, oldest first.
    async fn fetch_events(
        &self,
        topic: EventTopic,
        range: BlockRange,
    ) -> Result<Vec<RawEvent>, LedgerError>;

    /// Install a live subscription for a topic.
    fn subscribe(&self, topic: EventTopic) -> Result<Subscription, LedgerError>;

    /// Wallet balance of the native asset.
    async fn native_balance(&self, account: &Address) -> Result<u128, LedgerError>;

    /// Wallet balance of a token.
    async fn token_balance(&self, token: &Address, account: &Address)
        -> Result<u128, LedgerError>;

    /// Balance held inside the exchange for (token, account); the native
    /// sentinel addresses the native asset.
    async fn exchange_balance(
        &self,
        token: &Address,
        account: &Address,
    ) -> Result<u128, LedgerError>;

    /// Address of a contract on the connected network, if deployed.
    fn contract_address(&self, contract: Contract) -> Option<Address>;

    /// Submit a state-changing action; lifecycle updates arrive on the
    /// returned handle.
    fn submit(&self, from: &Address, request: TxRequest) -> Result<TxHandle, LedgerError>;
}

/// Source of the signed-in identity and its ledger connection.
pub trait IdentityProvider {
    /// Live ledger client, if a connection exists.
    fn ledger_client(&self) -> Option<Arc<dyn LedgerClient>>;

    /// The active account, if one is signed in.
    fn active_account(&self) -> Option<Address>;
}
