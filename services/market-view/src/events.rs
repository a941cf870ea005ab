//! Raw ledger event definitions and decoding
//!
//! Defines the `RawEvent` enum covering every event topic this service
//! consumes from the exchange contract. Field values are chain-native: a
//! JSON-RPC log delivers addresses and integers as strings, so decoding into
//! typed records is fallible and reported per event.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::ids::{Address, OrderId};
use types::order::{Cancellation, Order};
use types::trade::Fill;
use types::transfer::{Transfer, TransferDirection};

/// Event topics emitted by the exchange contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum EventTopic {
    Order,
    Cancel,
    Trade,
    Deposit,
    Withdraw,
}

impl EventTopic {
    /// All topics a live session subscribes to.
    pub fn all() -> &'static [EventTopic] {
        &[
            EventTopic::Order,
            EventTopic::Cancel,
            EventTopic::Trade,
            EventTopic::Deposit,
            EventTopic::Withdraw,
        ]
    }

    /// Topic name as a string label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            EventTopic::Order => "Order",
            EventTopic::Cancel => "Cancel",
            EventTopic::Trade => "Trade",
            EventTopic::Deposit => "Deposit",
            EventTopic::Withdraw => "Withdraw",
        }
    }
}

/// A ledger event exactly as delivered, before decoding.
///
/// Variant fields mirror the contract event arguments; numeric values are
/// decimal strings as the RPC layer hands them over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic")]
pub enum RawEvent {
    #[serde(rename_all = "camelCase")]
    Order {
        id: String,
        user: String,
        token_get: String,
        amount_get: String,
        token_give: String,
        amount_give: String,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    Cancel {
        id: String,
        user: String,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    Trade {
        id: String,
        user: String,
        token_get: String,
        amount_get: String,
        token_give: String,
        amount_give: String,
        user_fill: String,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    Deposit {
        token: String,
        user: String,
        amount: String,
        balance: String,
    },
    #[serde(rename_all = "camelCase")]
    Withdraw {
        token: String,
        user: String,
        amount: String,
        balance: String,
    },
}

impl RawEvent {
    /// Topic this event was delivered under.
    pub fn topic(&self) -> EventTopic {
        match self {
            RawEvent::Order { .. } => EventTopic::Order,
            RawEvent::Cancel { .. } => EventTopic::Cancel,
            RawEvent::Trade { .. } => EventTopic::Trade,
            RawEvent::Deposit { .. } => EventTopic::Deposit,
            RawEvent::Withdraw { .. } => EventTopic::Withdraw,
        }
    }
}

/// Errors raised while decoding a raw event into a typed record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventDecodeError {
    #[error("field {field} is not a valid address: {source}")]
    BadAddress {
        field: &'static str,
        source: types::ids::AddressError,
    },

    #[error("field {field} is not a valid integer: {value}")]
    BadNumber { field: &'static str, value: String },

    #[error("expected a {expected} event, got {actual}")]
    WrongTopic {
        expected: &'static str,
        actual: &'static str,
    },
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, EventDecodeError> {
    Address::parse(value).map_err(|source| EventDecodeError::BadAddress { field, source })
}

fn parse_u128(field: &'static str, value: &str) -> Result<u128, EventDecodeError> {
    value.parse().map_err(|_| EventDecodeError::BadNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, EventDecodeError> {
    value.parse().map_err(|_| EventDecodeError::BadNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_i64(field: &'static str, value: &str) -> Result<i64, EventDecodeError> {
    value.parse().map_err(|_| EventDecodeError::BadNumber {
        field,
        value: value.to_string(),
    })
}

/// Decode an Order event into an [`Order`] record.
pub fn decode_order(raw: &RawEvent) -> Result<Order, EventDecodeError> {
    match raw {
        RawEvent::Order {
            id,
            user,
            token_get,
            amount_get,
            token_give,
            amount_give,
            timestamp,
        } => Ok(Order {
            id: OrderId::from_u64(parse_u64("id", id)?),
            maker: parse_address("user", user)?,
            token_get: parse_address("tokenGet", token_get)?,
            amount_get: parse_u128("amountGet", amount_get)?,
            token_give: parse_address("tokenGive", token_give)?,
            amount_give: parse_u128("amountGive", amount_give)?,
            timestamp: parse_i64("timestamp", timestamp)?,
        }),
        other => Err(EventDecodeError::WrongTopic {
            expected: "Order",
            actual: other.topic().label(),
        }),
    }
}

/// Decode a Cancel event into a [`Cancellation`] record.
pub fn decode_cancellation(raw: &RawEvent) -> Result<Cancellation, EventDecodeError> {
    match raw {
        RawEvent::Cancel {
            id,
            user,
            timestamp,
        } => Ok(Cancellation {
            order_id: OrderId::from_u64(parse_u64("id", id)?),
            maker: parse_address("user", user)?,
            timestamp: parse_i64("timestamp", timestamp)?,
        }),
        other => Err(EventDecodeError::WrongTopic {
            expected: "Cancel",
            actual: other.topic().label(),
        }),
    }
}

/// Decode a Trade event into a [`Fill`] record.
pub fn decode_fill(raw: &RawEvent) -> Result<Fill, EventDecodeError> {
    match raw {
        RawEvent::Trade {
            id,
            user,
            token_get,
            amount_get,
            token_give,
            amount_give,
            user_fill,
            timestamp,
        } => Ok(Fill {
            order: Order {
                id: OrderId::from_u64(parse_u64("id", id)?),
                maker: parse_address("user", user)?,
                token_get: parse_address("tokenGet", token_get)?,
                amount_get: parse_u128("amountGet", amount_get)?,
                token_give: parse_address("tokenGive", token_give)?,
                amount_give: parse_u128("amountGive", amount_give)?,
                timestamp: parse_i64("timestamp", timestamp)?,
            },
            taker: parse_address("userFill", user_fill)?,
        }),
        other => Err(EventDecodeError::WrongTopic {
            expected: "Trade",
            actual: other.topic().label(),
        }),
    }
}

/// Decode a Deposit or Withdraw event into a [`Transfer`] record.
pub fn decode_transfer(raw: &RawEvent) -> Result<Transfer, EventDecodeError> {
    let (direction, token, user, amount, balance) = match raw {
        RawEvent::Deposit {
            token,
            user,
            amount,
            balance,
        } => (TransferDirection::Deposit, token, user, amount, balance),
        RawEvent::Withdraw {
            token,
            user,
            amount,
            balance,
        } => (TransferDirection::Withdraw, token, user, amount, balance),
        other => {
            return Err(EventDecodeError::WrongTopic {
                expected: "Deposit/Withdraw",
                actual: other.topic().label(),
            })
        }
    };

    Ok(Transfer {
        direction,
        token: parse_address("token", token)?,
        account: parse_address("user", user)?,
        amount: parse_u128("amount", amount)?,
        balance_after: parse_u128("balance", balance)?,
    })
}
