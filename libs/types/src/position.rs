//! Position entity and its quantity ledger
//!
//! A position tracks how much of a fill's quantity is still owned and how
//! much of that is held (committed to a resting exit order). The ledger
//! invariant `0 <= held <= owned` holds before and after every operation,
//! including failed ones: a call that cannot complete returns an error
//! without touching either quantity.

use crate::errors::LedgerError;
use crate::ids::{OrderCode, PositionCode, SymbolCode};
use crate::numeric::{Price, Quantity};
use crate::order::{OrderKind, Side};
use crate::snapshot::ExchangeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A holding created by one entry fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub code: PositionCode,
    /// The entry order that created this position
    pub order_code: OrderCode,
    /// Product book the position lives in; stock exits never consume
    /// margin positions and vice versa
    pub kind: OrderKind,
    pub symbol: SymbolCode,
    pub exchange: ExchangeKind,
    pub side: Side,
    /// Quantity of the originating fill; never changes
    pub contracted_quantity: Quantity,
    /// Quantity still owned; decreases as exits consume it
    pub owned_quantity: Quantity,
    /// Quantity committed to resting exit orders
    pub held_quantity: Quantity,
    pub price: Price,
    pub contracted_at: DateTime<Utc>,
}

impl Position {
    /// Create a position owned entirely by one entry fill
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_code: OrderCode,
        kind: OrderKind,
        symbol: SymbolCode,
        exchange: ExchangeKind,
        side: Side,
        quantity: Quantity,
        price: Price,
        contracted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            code: PositionCode::new(),
            order_code,
            kind,
            symbol,
            exchange,
            side,
            contracted_quantity: quantity,
            owned_quantity: quantity,
            held_quantity: Quantity::zero(),
            price,
            contracted_at,
        }
    }

    /// Commit quantity to an exit order
    pub fn hold(&mut self, quantity: Quantity) -> Result<(), LedgerError> {
        let needed = self.held_quantity + quantity;
        if self.owned_quantity < needed {
            return Err(LedgerError::InsufficientOwnedQuantity {
                position_code: Some(self.code),
                required: needed,
                available: self.owned_quantity,
            });
        }
        self.held_quantity = needed;
        Ok(())
    }

    /// Consume held quantity on an exit fill
    pub fn exit(&mut self, quantity: Quantity) -> Result<(), LedgerError> {
        if self.owned_quantity < quantity {
            return Err(LedgerError::InsufficientOwnedQuantity {
                position_code: Some(self.code),
                required: quantity,
                available: self.owned_quantity,
            });
        }
        if self.held_quantity < quantity {
            return Err(LedgerError::InsufficientHeldQuantity {
                position_code: Some(self.code),
                required: quantity,
                available: self.held_quantity,
            });
        }
        self.owned_quantity = self
            .owned_quantity
            .checked_sub(quantity)
            .unwrap_or_else(Quantity::zero);
        self.held_quantity = self
            .held_quantity
            .checked_sub(quantity)
            .unwrap_or_else(Quantity::zero);
        Ok(())
    }

    /// Return held quantity to the orderable pool (e.g. on exit-order cancel)
    pub fn release(&mut self, quantity: Quantity) -> Result<(), LedgerError> {
        if self.held_quantity < quantity {
            return Err(LedgerError::InsufficientHeldQuantity {
                position_code: Some(self.code),
                required: quantity,
                available: self.held_quantity,
            });
        }
        self.held_quantity = self
            .held_quantity
            .checked_sub(quantity)
            .unwrap_or_else(Quantity::zero);
        Ok(())
    }

    /// Quantity available to commit to a new exit order
    pub fn orderable_quantity(&self) -> Quantity {
        self.owned_quantity
            .checked_sub(self.held_quantity)
            .unwrap_or_else(Quantity::zero)
    }

    /// Eligible for garbage collection once nothing is owned
    pub fn is_dead(&self) -> bool {
        self.owned_quantity.is_zero()
    }

    /// Ledger invariant: `0 <= held <= owned`
    pub fn check_invariant(&self) -> bool {
        self.held_quantity <= self.owned_quantity
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum LedgerOp {
        Hold(u64),
        Exit(u64),
        Release(u64),
    }

    fn ledger_op() -> impl Strategy<Value = LedgerOp> {
        prop_oneof![
            (0u64..500).prop_map(LedgerOp::Hold),
            (0u64..500).prop_map(LedgerOp::Exit),
            (0u64..500).prop_map(LedgerOp::Release),
        ]
    }

    proptest! {
        /// The ledger invariant survives any sequence of operations, and a
        /// failing operation leaves both quantities untouched.
        #[test]
        fn ledger_invariant_holds(initial in 0u64..1000, ops in prop::collection::vec(ledger_op(), 0..50)) {
            let mut position = Position::new(
                OrderCode::new(),
                OrderKind::Stock,
                SymbolCode::new("1320"),
                ExchangeKind::Stock,
                Side::Buy,
                Quantity::from_u64(initial),
                Price::from_u64(1000),
                Utc.with_ymd_and_hms(2024, 2, 16, 0, 30, 0).unwrap(),
            );

            for op in ops {
                let before = (position.owned_quantity, position.held_quantity);
                let result = match op {
                    LedgerOp::Hold(q) => position.hold(Quantity::from_u64(q)),
                    LedgerOp::Exit(q) => position.exit(Quantity::from_u64(q)),
                    LedgerOp::Release(q) => position.release(Quantity::from_u64(q)),
                };
                prop_assert!(position.check_invariant());
                if result.is_err() {
                    prop_assert_eq!(before, (position.owned_quantity, position.held_quantity));
                }
            }
        }
    }
}
