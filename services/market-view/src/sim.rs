//! In-memory ledger client
//!
//! A scriptable [`LedgerClient`] for tests and harnesses: history is
//! seeded, live events are pushed, balances are set directly, and
//! submitted transactions either wait for the caller to drive their
//! lifecycle or confirm automatically.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use types::ids::{Address, TxHash};

use crate::events::{EventTopic, RawEvent};
use crate::ledger::{
    BlockRange, Contract, LedgerClient, LedgerError, Subscription, TxFeeder, TxHandle,
    TxReceipt, TxRequest,
};

/// A transaction submitted to the sim, waiting for the caller to drive it.
#[derive(Debug)]
pub struct PendingTx {
    pub from: Address,
    pub request: TxRequest,
    pub feeder: TxFeeder,
}

/// A record of a submission, kept even after the lifecycle completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTx {
    pub from: Address,
    pub request: TxRequest,
}

#[derive(Default)]
struct SimState {
    history: BTreeMap<EventTopic, Vec<RawEvent>>,
    live: BTreeMap<EventTopic, Vec<mpsc::UnboundedSender<RawEvent>>>,
    native_balances: BTreeMap<Address, u128>,
    token_balances: BTreeMap<(Address, Address), u128>,
    exchange_balances: BTreeMap<(Address, Address), u128>,
    token: Option<Address>,
    exchange: Option<Address>,
    submissions: Vec<SubmittedTx>,
    pending: VecDeque<PendingTx>,
    fetch_counts: BTreeMap<EventTopic, u64>,
    auto_confirm: bool,
    clock: i64,
    next_block: u64,
}

/// In-memory ledger. All mutation goes through `&self`; the sim is shared
/// freely between the session under test and the test itself.
pub struct SimLedger {
    state: Mutex<SimState>,
}

impl SimLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                clock: 1_000,
                next_block: 1,
                ..SimState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Resolve the token contract at the given address.
    pub fn with_token(self, token: Address) -> Self {
        self.lock().token = Some(token);
        self
    }

    /// Resolve the exchange contract at the given address.
    pub fn with_exchange(self, exchange: Address) -> Self {
        self.lock().exchange = Some(exchange);
        self
    }

    /// Confirm every submission immediately with a hash and a receipt.
    pub fn with_auto_confirm(self) -> Self {
        self.lock().auto_confirm = true;
        self
    }

    /// Seed historical events; each lands in its topic's log.
    pub fn seed_history(&self, events: Vec<RawEvent>) {
        let mut state = self.lock();
        for event in events {
            state.history.entry(event.topic()).or_default().push(event);
        }
    }

    /// Deliver an event to every live subscriber of its topic.
    pub fn push_live(&self, event: RawEvent) {
        let mut state = self.lock();
        let topic = event.topic();
        if let Some(senders) = state.live.get_mut(&topic) {
            senders.retain(|sender| sender.send(event.clone()).is_ok());
        }
    }

    pub fn set_native_balance(&self, account: &Address, amount: u128) {
        self.lock().native_balances.insert(account.clone(), amount);
    }

    pub fn set_token_balance(&self, token: &Address, account: &Address, amount: u128) {
        self.lock()
            .token_balances
            .insert((token.clone(), account.clone()), amount);
    }

    pub fn set_exchange_balance(&self, token: &Address, account: &Address, amount: u128) {
        self.lock()
            .exchange_balances
            .insert((token.clone(), account.clone()), amount);
    }

    /// Every submission seen so far, in order.
    pub fn submissions(&self) -> Vec<SubmittedTx> {
        self.lock().submissions.clone()
    }

    /// Pop the oldest submission still waiting for its lifecycle.
    pub fn take_pending(&self) -> Option<PendingTx> {
        self.lock().pending.pop_front()
    }

    /// How many historical fetches have been issued for a topic.
    pub fn fetch_count(&self, topic: EventTopic) -> u64 {
        self.lock().fetch_counts.get(&topic).copied().unwrap_or(0)
    }

    /// A receipt stamped with the sim's logical clock.
    pub fn make_receipt(&self, logs: Vec<RawEvent>) -> TxReceipt {
        let mut state = self.lock();
        state.clock += 1;
        state.next_block += 1;
        TxReceipt {
            tx_hash: TxHash::new(format!("0x{:064x}", state.next_block)),
            block_number: state.next_block,
            timestamp: state.clock,
            logs,
        }
    }
}

impl Default for SimLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for SimLedger {
    async fn fetch_events(
        &self,
        topic: EventTopic,
        _range: BlockRange,
    ) -> Result<Vec<RawEvent>, LedgerError> {
        let mut state = self.lock();
        *state.fetch_counts.entry(topic).or_insert(0) += 1;
        Ok(state.history.get(&topic).cloned().unwrap_or_default())
    }

    fn subscribe(&self, topic: EventTopic) -> Result<Subscription, LedgerError> {
        let (sender, subscription) = Subscription::channel(topic);
        self.lock().live.entry(topic).or_default().push(sender);
        Ok(subscription)
    }

    async fn native_balance(&self, account: &Address) -> Result<u128, LedgerError> {
        Ok(self.lock().native_balances.get(account).copied().unwrap_or(0))
    }

    async fn token_balance(
        &self,
        token: &Address,
        account: &Address,
    ) -> Result<u128, LedgerError> {
        Ok(self
            .lock()
            .token_balances
            .get(&(token.clone(), account.clone()))
            .copied()
            .unwrap_or(0))
    }

    async fn exchange_balance(
        &self,
        token: &Address,
        account: &Address,
    ) -> Result<u128, LedgerError> {
        Ok(self
            .lock()
            .exchange_balances
            .get(&(token.clone(), account.clone()))
            .copied()
            .unwrap_or(0))
    }

    fn contract_address(&self, contract: Contract) -> Option<Address> {
        let state = self.lock();
        match contract {
            Contract::Token => state.token.clone(),
            Contract::Exchange => state.exchange.clone(),
        }
    }

    fn submit(&self, from: &Address, request: TxRequest) -> Result<TxHandle, LedgerError> {
        let (feeder, handle) = TxHandle::channel();
        let mut state = self.lock();
        state.submissions.push(SubmittedTx {
            from: from.clone(),
            request: request.clone(),
        });

        if state.auto_confirm {
            state.clock += 1;
            state.next_block += 1;
            let hash = TxHash::new(format!("0x{:064x}", state.next_block));
            feeder.hash(hash.clone());
            feeder.receipt(TxReceipt {
                tx_hash: hash,
                block_number: state.next_block,
                timestamp: state.clock,
                logs: vec![],
            });
        } else {
            state.pending.push_back(PendingTx {
                from: from.clone(),
                request,
                feeder,
            });
        }

        Ok(handle)
    }
}
