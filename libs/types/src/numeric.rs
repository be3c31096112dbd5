//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Both types are non-negative by construction; subtraction that would go
//! negative is only reachable through `checked_sub`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// Price of a security, always non-negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a price, panicking on negative input
    ///
    /// # Panics
    /// Panics if the value is negative
    pub fn new(value: Decimal) -> Self {
        assert!(!value.is_sign_negative(), "Price must be non-negative");
        Self(value)
    }

    /// Try to create a price, returning None for negative input
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Create from an integer number of currency units
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Get the backing decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s)?;
        Self::try_new(value)
            .ok_or_else(|| rust_decimal::Error::ErrorString("price must be non-negative".into()))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantity of a security, always non-negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a quantity, panicking on negative input
    ///
    /// # Panics
    /// Panics if the value is negative
    pub fn new(value: Decimal) -> Self {
        assert!(!value.is_sign_negative(), "Quantity must be non-negative");
        Self(value)
    }

    /// Try to create a quantity, returning None for negative input
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Create from an integer number of units
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// The zero quantity
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Check whether the quantity is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Get the backing decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Subtract, returning None if the result would be negative
    pub fn checked_sub(&self, other: Quantity) -> Option<Quantity> {
        Self::try_new(self.0 - other.0)
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, other: Quantity) -> Quantity {
        Quantity(self.0 + other.0)
    }
}

impl FromStr for Quantity {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s)?;
        Self::try_new(value)
            .ok_or_else(|| rust_decimal::Error::ErrorString("quantity must be non-negative".into()))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_creation() {
        let price = Price::from_u64(1000);
        assert_eq!(price.as_decimal(), Decimal::from(1000));
    }

    #[test]
    fn test_price_try_new_rejects_negative() {
        assert!(Price::try_new(Decimal::from(-1)).is_none());
        assert!(Price::try_new(Decimal::ZERO).is_some());
    }

    #[test]
    #[should_panic(expected = "Price must be non-negative")]
    fn test_price_new_negative_panics() {
        Price::new(Decimal::from(-1));
    }

    #[test]
    fn test_price_ordering() {
        assert!(Price::from_u64(999) < Price::from_u64(1000));
        assert_eq!(Price::from_u64(1000), Price::from_u64(1000));
    }

    #[test]
    fn test_quantity_zero() {
        assert!(Quantity::zero().is_zero());
        assert!(!Quantity::from_u64(100).is_zero());
    }

    #[test]
    fn test_quantity_add() {
        let total = Quantity::from_u64(100) + Quantity::from_u64(200);
        assert_eq!(total, Quantity::from_u64(300));
    }

    #[test]
    fn test_quantity_checked_sub() {
        let owned = Quantity::from_u64(300);
        assert_eq!(
            owned.checked_sub(Quantity::from_u64(100)),
            Some(Quantity::from_u64(200))
        );
        assert_eq!(owned.checked_sub(Quantity::from_u64(400)), None);
    }

    #[test]
    fn test_quantity_from_str() {
        let qty: Quantity = "100".parse().unwrap();
        assert_eq!(qty, Quantity::from_u64(100));
    }

    #[test]
    fn test_price_serialization() {
        let price = Price::from_u64(1000);
        let json = serde_json::to_string(&price).unwrap();
        let deserialized: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, deserialized);
    }
}
