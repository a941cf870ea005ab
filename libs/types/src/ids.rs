//! Identifier types for ledger entities
//!
//! Order ids are assigned by the ledger contract and increase monotonically,
//! so they double as a tie-break key for chronological sorts. Action ids are
//! locally generated UUID v7 values used to correlate dispatcher log lines.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an order, assigned by the ledger.
///
/// Monotonically increasing, so ordering by id matches creation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    /// Wrap a ledger-assigned id.
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Correlation identifier for a dispatched action
///
/// Uses UUID v7 so concurrent submissions sort by submission time in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(Uuid);

impl ActionId {
    /// Create a new ActionId with the current timestamp.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction hash returned by the ledger when a submission is accepted
/// into the pending pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised when parsing an account or contract address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),

    #[error("address must be 40 hex digits, got {0} digits")]
    BadLength(usize),

    #[error("address contains a non-hex digit: {0}")]
    BadDigit(String),
}

/// Account or contract address on the ledger.
///
/// Stored lowercased so that equality checks are case-insensitive; ledger
/// clients deliver addresses in mixed checksum casing. The all-zero address
/// is the sentinel for the ledger's native asset.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(String);

/// The native-asset sentinel, the all-zero address.
const NATIVE_SENTINEL: &str = "0x0000000000000000000000000000000000000000";

impl Address {
    /// Parse an address from a 0x-prefixed hex string.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let hex = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(raw.to_string()))?;

        if hex.len() != 40 {
            return Err(AddressError::BadLength(hex.len()));
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::BadDigit(raw.to_string()));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// The sentinel address representing the ledger's native asset.
    pub fn native() -> Self {
        Self(NATIVE_SENTINEL.to_string())
    }

    /// Whether this address is the native-asset sentinel.
    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
