//! Contract (fill) records
//!
//! A contract is the immutable record of one execution: which order filled,
//! against which position, at what price and quantity. Contracts are minted
//! only by the orchestration layer and never mutated afterwards.

use crate::ids::{ContractCode, OrderCode, PositionCode};
use crate::numeric::{Price, Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub code: ContractCode,
    pub order_code: OrderCode,
    pub position_code: PositionCode,
    pub price: Price,
    pub quantity: Quantity,
    pub contracted_at: DateTime<Utc>,
}

impl Contract {
    /// Create a new contract record
    pub fn new(
        order_code: OrderCode,
        position_code: PositionCode,
        price: Price,
        quantity: Quantity,
        contracted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            code: ContractCode::new(),
            order_code,
            position_code,
            price,
            quantity,
            contracted_at,
        }
    }

    /// Notional value of the fill (price × quantity)
    pub fn value(&self) -> rust_decimal::Decimal {
        self.price.as_decimal() * self.quantity.as_decimal()
    }
}
