//! Contract-Confirmation Simulator
//!
//! In-process simulator of a securities exchange's order execution: price
//! ticks enter, resting orders are asked whether they would have executed,
//! and order/position bookkeeping advances accordingly.
//!
//! **Key Invariants:**
//! - Matching is order-vs-price-tick, never order-vs-order
//! - The confirmation engine is pure: a non-match is a value, not an error
//! - Per-entity locking, never nested
//! - Oldest-first position consumption on exits
//!
//! # Data flow
//!
//! ```text
//! price tick
//!     │
//! ┌───▼──────┐   ┌───────────────┐
//! │classifier│──▶│  price store  │
//! └───┬──────┘   └───────────────┘
//!     │ snapshot
//! ┌───▼──────────────┐   per resting order
//! │confirmation      │──▶ expire → stop trigger → confirm
//! │engine (pure)     │
//! └───┬──────────────┘
//!     │ match
//! ┌───▼──────────────┐
//! │orchestration     │──▶ order fills, position ledger
//! └──────────────────┘
//! ```

pub mod calendar;
pub mod classifier;
pub mod matching;
pub mod models;
pub mod service;
pub mod session;
pub mod store;

pub use matching::{Confirmation, ConfirmationEngine};
pub use service::ExchangeSimulator;
pub use session::SessionWindows;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
