//! Transaction dispatcher
//!
//! Submits state-changing actions to the ledger and drives each through
//! its lifecycle: submitted, pending once the hash is observed, then
//! confirmed on receipt or failed on error. Confirmation appends an
//! optimistic local record where the action has one, then refetches
//! history and reloads balances so ledger truth supersedes the placeholder.
//!
//! The in-flight flags are shared state. Two concurrent submissions of the
//! same action class will both toggle the same flag, and the first to
//! finish clears it while the other is still pending. Known limitation,
//! kept as-is.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use types::ids::{ActionId, Address};
use types::order::{Cancellation, Order, Side};
use types::trade::Fill;

use crate::balances::{load_balances, Balances};
use crate::events::{decode_order, EventTopic};
use crate::ingestion::load_history;
use crate::ledger::{
    Contract, ErrorCode, LedgerClient, LedgerError, TxReceipt, TxRequest, TxUpdate,
};
use crate::store::{Flag, Provenance, SharedStore};

/// Classified cause of a failed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    InsufficientBalance,
    RpcError,
    Generic,
}

/// A failed action, surfaced to the caller; never silently swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{notice}")]
pub struct TxFailure {
    pub kind: FailureKind,
    /// User-facing notice for the blocking error dialog.
    pub notice: String,
    /// Underlying ledger error.
    #[source]
    pub source: LedgerError,
}

/// Classify a ledger error, preferring the structured code and falling
/// back to message patterns only when no code was attached.
pub fn classify(error: &LedgerError) -> FailureKind {
    if let Some(code) = error.code {
        return match code {
            ErrorCode::InsufficientBalance => FailureKind::InsufficientBalance,
            ErrorCode::Rpc => FailureKind::RpcError,
            ErrorCode::Reverted => FailureKind::Generic,
        };
    }

    let message = error.message.to_ascii_lowercase();
    if message.contains("insufficient balance") {
        FailureKind::InsufficientBalance
    } else if message.contains("json-rpc") || message.contains("rpc error") {
        FailureKind::RpcError
    } else {
        FailureKind::Generic
    }
}

fn notice_for(kind: FailureKind, action: &str) -> String {
    match kind {
        FailureKind::InsufficientBalance => {
            "Insufficient balance in your exchange account to complete this action."
                .to_string()
        }
        FailureKind::RpcError => {
            "The ledger node reported an internal error. Please try again.".to_string()
        }
        FailureKind::Generic => format!("There was an error completing {action}."),
    }
}

/// Record to synthesize into the store once a receipt arrives.
enum LocalRecord {
    None,
    Cancellation(Order),
    Fill(Order),
    /// Decode the Order event out of the receipt's logs.
    OrderFromReceipt,
}

/// Submits actions for one account and drives their lifecycles.
pub struct Dispatcher {
    client: Arc<dyn LedgerClient>,
    store: SharedStore,
    account: Address,
    balances_tx: Arc<watch::Sender<Balances>>,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        store: SharedStore,
        account: Address,
        balances_tx: Arc<watch::Sender<Balances>>,
    ) -> Self {
        Self {
            client,
            store,
            account,
            balances_tx,
        }
    }

    /// Move native funds into the exchange.
    pub async fn deposit_native(&self, amount: u128) -> Result<TxReceipt, TxFailure> {
        let handle = self.submit(TxRequest::DepositNative { amount })?;
        self.drive("deposit_native", handle, Flag::BalancesLoading, LocalRecord::None)
            .await
    }

    /// Move native funds back out of the exchange.
    pub async fn withdraw_native(&self, amount: u128) -> Result<TxReceipt, TxFailure> {
        let handle = self.submit(TxRequest::WithdrawNative { amount })?;
        self.drive(
            "withdraw_native",
            handle,
            Flag::BalancesLoading,
            LocalRecord::None,
        )
        .await
    }

    /// Move tokens into the exchange.
    ///
    /// Two transactions: the exchange must first be approved to spend the
    /// tokens, and the deposit is only submitted once the approval has
    /// reached its own hash. An approval failure aborts the whole action
    /// with nothing deposited.
    pub async fn deposit_token(&self, amount: u128) -> Result<TxReceipt, TxFailure> {
        let token = self.resolved(Contract::Token, "deposit_token")?;
        let exchange = self.resolved(Contract::Exchange, "deposit_token")?;

        let mut approval = self.submit(TxRequest::Approve {
            token: token.clone(),
            spender: exchange,
            amount,
        })?;

        loop {
            match approval.next_update().await {
                Some(TxUpdate::Hash(hash)) => {
                    debug!(hash = %hash, "token approval pending");
                    break;
                }
                // A client may skip straight to the receipt; that implies
                // the hash was reached.
                Some(TxUpdate::Receipt(_)) => break,
                Some(TxUpdate::Failed(err)) => {
                    let kind = classify(&err);
                    warn!(error = %err, "token approval failed; deposit aborted");
                    return Err(TxFailure {
                        kind,
                        notice: "There was an error with the token approval.".to_string(),
                        source: err,
                    });
                }
                None => {
                    return Err(self.stream_ended("approve"));
                }
            }
        }

        let handle = self.submit(TxRequest::DepositToken { token, amount })?;
        self.drive("deposit_token", handle, Flag::BalancesLoading, LocalRecord::None)
            .await
    }

    /// Move tokens back out of the exchange.
    pub async fn withdraw_token(&self, amount: u128) -> Result<TxReceipt, TxFailure> {
        let token = self.resolved(Contract::Token, "withdraw_token")?;
        let handle = self.submit(TxRequest::WithdrawToken { token, amount })?;
        self.drive(
            "withdraw_token",
            handle,
            Flag::BalancesLoading,
            LocalRecord::None,
        )
        .await
    }

    /// Place an order. `token_amount` is the token leg, `native_amount`
    /// the native leg; which is given and which received follows the side.
    pub async fn make_order(
        &self,
        side: Side,
        token_amount: u128,
        native_amount: u128,
    ) -> Result<TxReceipt, TxFailure> {
        let token = self.resolved(Contract::Token, "make_order")?;
        let request = match side {
            Side::Buy => TxRequest::MakeOrder {
                token_get: token,
                amount_get: token_amount,
                token_give: Address::native(),
                amount_give: native_amount,
            },
            Side::Sell => TxRequest::MakeOrder {
                token_get: Address::native(),
                amount_get: native_amount,
                token_give: token,
                amount_give: token_amount,
            },
        };
        let handle = self.submit(request)?;
        self.drive(
            "make_order",
            handle,
            Flag::BalancesLoading,
            LocalRecord::OrderFromReceipt,
        )
        .await
    }

    /// Cancel one of this account's open orders.
    pub async fn cancel_order(&self, order: &Order) -> Result<TxReceipt, TxFailure> {
        let handle = self.submit(TxRequest::CancelOrder { order_id: order.id })?;
        self.drive(
            "cancel_order",
            handle,
            Flag::OrderCancelling,
            LocalRecord::Cancellation(order.clone()),
        )
        .await
    }

    /// Fill another account's open order.
    pub async fn fill_order(&self, order: &Order) -> Result<TxReceipt, TxFailure> {
        let handle = self.submit(TxRequest::FillOrder { order_id: order.id })?;
        self.drive(
            "fill_order",
            handle,
            Flag::OrderFilling,
            LocalRecord::Fill(order.clone()),
        )
        .await
    }

    fn submit(&self, request: TxRequest) -> Result<crate::ledger::TxHandle, TxFailure> {
        let action = request.label();
        self.client
            .submit(&self.account, request)
            .map_err(|err| TxFailure {
                kind: classify(&err),
                notice: notice_for(classify(&err), action),
                source: err,
            })
    }

    fn resolved(&self, contract: Contract, action: &str) -> Result<Address, TxFailure> {
        self.client.contract_address(contract).ok_or_else(|| {
            let source = LedgerError::new(match contract {
                Contract::Token => "token contract not deployed on this network",
                Contract::Exchange => "exchange contract not deployed on this network",
            });
            TxFailure {
                kind: FailureKind::Generic,
                notice: notice_for(FailureKind::Generic, action),
                source,
            }
        })
    }

    fn stream_ended(&self, action: &str) -> TxFailure {
        let source = LedgerError::new("transaction lifecycle stream ended before a receipt");
        TxFailure {
            kind: FailureKind::Generic,
            notice: notice_for(FailureKind::Generic, action),
            source,
        }
    }

    /// Drive one submission through its lifecycle.
    async fn drive(
        &self,
        action: &str,
        mut handle: crate::ledger::TxHandle,
        flag: Flag,
        local: LocalRecord,
    ) -> Result<TxReceipt, TxFailure> {
        let action_id = ActionId::new();
        info!(action, action_id = %action_id, "action submitted");

        loop {
            match handle.next_update().await {
                Some(TxUpdate::Hash(hash)) => {
                    self.store.write(|s| s.set_flag(flag, true));
                    info!(action, action_id = %action_id, hash = %hash, "transaction pending");
                }
                Some(TxUpdate::Receipt(receipt)) => {
                    self.apply_local_record(&local, &receipt);
                    self.store.write(|s| s.set_flag(flag, false));
                    self.reconcile().await;
                    info!(
                        action,
                        action_id = %action_id,
                        block = receipt.block_number,
                        "transaction confirmed"
                    );
                    return Ok(receipt);
                }
                Some(TxUpdate::Failed(err)) => {
                    let kind = classify(&err);
                    self.store.write(|s| s.set_flag(flag, false));
                    warn!(
                        action,
                        action_id = %action_id,
                        kind = ?kind,
                        error = %err,
                        "transaction failed"
                    );
                    return Err(TxFailure {
                        kind,
                        notice: notice_for(kind, action),
                        source: err,
                    });
                }
                None => {
                    self.store.write(|s| s.set_flag(flag, false));
                    warn!(action, action_id = %action_id, "lifecycle stream ended early");
                    return Err(self.stream_ended(action));
                }
            }
        }
    }

    /// Append the optimistic local record for a confirmed action.
    ///
    /// The record is a placeholder: the reconcile refetch that follows
    /// delivers the ledger's own copy, which supersedes it.
    fn apply_local_record(&self, local: &LocalRecord, receipt: &TxReceipt) {
        match local {
            LocalRecord::None => {}
            LocalRecord::Cancellation(order) => {
                let cancellation = Cancellation {
                    order_id: order.id,
                    maker: self.account.clone(),
                    timestamp: receipt.timestamp,
                };
                self.store
                    .write(|s| s.append_cancellation(cancellation, Provenance::Local));
            }
            LocalRecord::Fill(order) => {
                let fill = Fill {
                    order: order.clone(),
                    taker: self.account.clone(),
                };
                self.store.write(|s| s.append_fill(fill, Provenance::Local));
            }
            LocalRecord::OrderFromReceipt => {
                let order_event = receipt
                    .logs
                    .iter()
                    .find(|log| log.topic() == EventTopic::Order);
                match order_event.map(decode_order) {
                    Some(Ok(order)) => {
                        self.store.write(|s| s.append_order(order, Provenance::Local));
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "receipt order event undecodable; waiting for refetch")
                    }
                    None => {
                        debug!("receipt carried no order event; waiting for refetch")
                    }
                }
            }
        }
    }

    /// Reconcile against ledger truth after a confirmation: one full
    /// history refetch plus a balance reload. Failures degrade to a
    /// warning; the optimistic record stays until the next refetch.
    async fn reconcile(&self) {
        if let Err(err) = load_history(self.client.as_ref(), &self.store).await {
            warn!(error = %err, "post-confirmation history refetch failed");
        }
        let token = self.client.contract_address(Contract::Token);
        let balances = load_balances(
            self.client.as_ref(),
            &self.account,
            token.as_ref(),
            &self.store,
        )
        .await;
        self.balances_tx.send_replace(balances);
    }
}
