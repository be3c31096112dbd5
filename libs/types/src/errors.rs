//! Error taxonomy for the virtual exchange simulator
//!
//! Closed error-kind enums using thiserror. Failing to match is never an
//! error: the confirmation engine reports a non-match as `None`, and only
//! malformed requests, store faults, and ledger invariant violations surface
//! here.

use crate::ids::PositionCode;
use crate::numeric::Quantity;
use crate::order::OrderStatus;
use thiserror::Error;

/// Top-level simulator error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Request validation errors
///
/// Surfaced immediately to the caller, never retried, no state mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid side")]
    InvalidSide,

    #[error("invalid execution condition")]
    InvalidExecutionCondition,

    #[error("invalid symbol code")]
    InvalidSymbolCode,

    #[error("invalid quantity")]
    InvalidQuantity,

    #[error("invalid limit price")]
    InvalidLimitPrice,

    #[error("invalid expiry")]
    InvalidExpiry,

    #[error("invalid stop condition")]
    InvalidStopCondition,

    #[error("invalid exit position list")]
    InvalidExitPositionList,

    #[error("invalid exit quantity")]
    InvalidExitQuantity,

    #[error("invalid trade type")]
    InvalidTradeType,

    #[error("invalid exchange")]
    InvalidExchange,

    #[error("price, bid, and ask timestamps are all absent")]
    InvalidPriceTimes,
}

/// Position quantity ledger errors
///
/// Returned from `hold`/`exit`/`release`; a failing call mutates nothing.
/// `position_code` names the offending position, or is `None` when an
/// aggregate check across several positions fell short.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient owned quantity: required {required}, available {available}")]
    InsufficientOwnedQuantity {
        position_code: Option<PositionCode>,
        required: Quantity,
        available: Quantity,
    },

    #[error("insufficient held quantity: required {required}, available {available}")]
    InsufficientHeldQuantity {
        position_code: Option<PositionCode>,
        required: Quantity,
        available: Quantity,
    },
}

/// Store lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    /// The price cache window elapsed; a fresh price must be registered
    /// before matching can proceed.
    #[error("expired")]
    Expired,
}

/// Entity state transition errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("order is not cancelable in status {status:?}")]
    NotCancelable { status: OrderStatus },
}
