//! Balance loading
//!
//! Four queries per load: the wallet's native and token balances, and the
//! balances held inside the exchange for both assets. A single failing
//! query zeroes only its own entry; the others proceed and the
//! balances-loading flag clears either way, so the view never wedges on one
//! bad RPC call.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};
use types::ids::Address;
use types::numeric::to_display;

use crate::ledger::LedgerClient;
use crate::store::{Flag, SharedStore};

/// Current balances for the session account, raw smallest units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balances {
    /// Native asset held in the wallet.
    pub wallet_native: u128,
    /// Token held in the wallet.
    pub wallet_token: u128,
    /// Native asset held inside the exchange.
    pub exchange_native: u128,
    /// Token held inside the exchange.
    pub exchange_token: u128,
}

impl Balances {
    pub fn wallet_native_display(&self) -> Decimal {
        to_display(self.wallet_native)
    }

    pub fn wallet_token_display(&self) -> Decimal {
        to_display(self.wallet_token)
    }

    pub fn exchange_native_display(&self) -> Decimal {
        to_display(self.exchange_native)
    }

    pub fn exchange_token_display(&self) -> Decimal {
        to_display(self.exchange_token)
    }
}

/// Load all four balances for the account.
///
/// Token-denominated queries are skipped (left zero) when no token contract
/// is resolved on the connected network.
pub async fn load_balances(
    client: &dyn LedgerClient,
    account: &Address,
    token: Option<&Address>,
    store: &SharedStore,
) -> Balances {
    let mut balances = Balances::default();

    match client.native_balance(account).await {
        Ok(amount) => balances.wallet_native = amount,
        Err(err) => warn!(error = %err, "wallet native balance query failed"),
    }

    if let Some(token) = token {
        match client.token_balance(token, account).await {
            Ok(amount) => balances.wallet_token = amount,
            Err(err) => warn!(error = %err, "wallet token balance query failed"),
        }
        match client.exchange_balance(token, account).await {
            Ok(amount) => balances.exchange_token = amount,
            Err(err) => warn!(error = %err, "exchange token balance query failed"),
        }
    } else {
        debug!("token contract unresolved; token balances left at zero");
    }

    match client.exchange_balance(&Address::native(), account).await {
        Ok(amount) => balances.exchange_native = amount,
        Err(err) => warn!(error = %err, "exchange native balance query failed"),
    }

    store.write(|s| s.set_flag(Flag::BalancesLoading, false));
    balances
}
