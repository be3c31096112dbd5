//! In-memory entity stores
//!
//! Each store is a coarse-locked ordered map handing out per-entity
//! `Arc<Mutex<_>>` handles. Entity state is only reachable through its own
//! mutex, so the per-entity locking discipline cannot be bypassed. Store
//! operations never touch an entity lock while holding the map lock:
//! handles are cloned out first, then inspected.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveTime, Utc};
use types::errors::StoreError;
use types::ids::{OrderCode, PositionCode, SymbolCode};
use types::order::Order;
use types::position::Position;
use types::snapshot::PriceSnapshot;

/// Shared handle to one order; lock it to read or mutate
pub type SharedOrder = Arc<Mutex<Order>>;

/// Shared handle to one position
pub type SharedPosition = Arc<Mutex<Position>>;

/// Order persistence boundary
pub trait OrderStore: Send + Sync {
    /// All orders, ordered by code (creation order)
    fn all(&self) -> Vec<SharedOrder>;
    fn by_code(&self, code: &OrderCode) -> Result<SharedOrder, StoreError>;
    /// Orders for one symbol, ordered by code
    fn by_symbol(&self, symbol: &SymbolCode) -> Vec<SharedOrder>;
    /// Insert the order, returning its shared handle
    fn save(&self, order: Order) -> SharedOrder;
    fn remove(&self, code: &OrderCode);
}

/// Position persistence boundary
pub trait PositionStore: Send + Sync {
    /// All positions, ordered by code (creation order)
    fn all(&self) -> Vec<SharedPosition>;
    fn by_code(&self, code: &PositionCode) -> Result<SharedPosition, StoreError>;
    /// Positions for one symbol, ordered by code — the oldest-first order
    /// the exit walk consumes them in
    fn by_symbol(&self, symbol: &SymbolCode) -> Vec<SharedPosition>;
    fn save(&self, position: Position) -> SharedPosition;
    fn remove(&self, code: &PositionCode);
}

/// Price snapshot store boundary
pub trait PriceStore: Send + Sync {
    /// The latest snapshot for a symbol
    ///
    /// `Expired` once the cache window has elapsed: the caller must
    /// re-register a fresh price before matching can proceed.
    fn by_symbol(&self, symbol: &SymbolCode, now: DateTime<Utc>)
        -> Result<PriceSnapshot, StoreError>;
    fn set(&self, snapshot: PriceSnapshot, now: DateTime<Utc>);
}

/// Default in-memory order store
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<BTreeMap<OrderCode, SharedOrder>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn all(&self) -> Vec<SharedOrder> {
        self.orders.lock().unwrap().values().cloned().collect()
    }

    fn by_code(&self, code: &OrderCode) -> Result<SharedOrder, StoreError> {
        self.orders
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn by_symbol(&self, symbol: &SymbolCode) -> Vec<SharedOrder> {
        let handles = self.all();
        handles
            .into_iter()
            .filter(|handle| handle.lock().unwrap().symbol == *symbol)
            .collect()
    }

    fn save(&self, order: Order) -> SharedOrder {
        let code = order.code;
        let handle = Arc::new(Mutex::new(order));
        self.orders.lock().unwrap().insert(code, handle.clone());
        handle
    }

    fn remove(&self, code: &OrderCode) {
        self.orders.lock().unwrap().remove(code);
    }
}

/// Default in-memory position store
#[derive(Default)]
pub struct InMemoryPositionStore {
    positions: Mutex<BTreeMap<PositionCode, SharedPosition>>,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for InMemoryPositionStore {
    fn all(&self) -> Vec<SharedPosition> {
        self.positions.lock().unwrap().values().cloned().collect()
    }

    fn by_code(&self, code: &PositionCode) -> Result<SharedPosition, StoreError> {
        self.positions
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn by_symbol(&self, symbol: &SymbolCode) -> Vec<SharedPosition> {
        let handles = self.all();
        handles
            .into_iter()
            .filter(|handle| handle.lock().unwrap().symbol == *symbol)
            .collect()
    }

    fn save(&self, position: Position) -> SharedPosition {
        let code = position.code;
        let handle = Arc::new(Mutex::new(position));
        self.positions.lock().unwrap().insert(code, handle.clone());
        handle
    }

    fn remove(&self, code: &PositionCode) {
        self.positions.lock().unwrap().remove(code);
    }
}

/// Hour at which cached prices lapse: a snapshot lives until the first
/// 08:00 after it was stored.
const EXPIRY_HOUR: u32 = 8;

struct StoredSnapshot {
    snapshot: PriceSnapshot,
    expires_at: DateTime<Utc>,
}

/// Default in-memory price store with the 08:00 TTL policy
#[derive(Default)]
pub struct InMemoryPriceStore {
    prices: Mutex<HashMap<SymbolCode, StoredSnapshot>>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
        let eight = NaiveTime::from_hms_opt(EXPIRY_HOUR, 0, 0).expect("valid literal time");
        let today_eight = now.date_naive().and_time(eight).and_utc();
        if now < today_eight {
            today_eight
        } else {
            today_eight + chrono::Duration::days(1)
        }
    }
}

impl PriceStore for InMemoryPriceStore {
    fn by_symbol(
        &self,
        symbol: &SymbolCode,
        now: DateTime<Utc>,
    ) -> Result<PriceSnapshot, StoreError> {
        let mut prices = self.prices.lock().unwrap();
        let stored = prices.get(symbol).ok_or(StoreError::NotFound)?;
        if now >= stored.expires_at {
            prices.remove(symbol);
            return Err(StoreError::Expired);
        }
        Ok(stored.snapshot.clone())
    }

    fn set(&self, snapshot: PriceSnapshot, now: DateTime<Utc>) {
        let symbol = snapshot.symbol.clone();
        let stored = StoredSnapshot {
            snapshot,
            expires_at: Self::next_expiry(now),
        };
        self.prices.lock().unwrap().insert(symbol, stored);
    }
}
