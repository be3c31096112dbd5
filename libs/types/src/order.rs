//! Order entity, execution conditions, and the order state machine
//!
//! An order owns its mutable fields; every mutating method is a complete
//! state transition. Callers serialize access through the order's lock (the
//! stores hand orders out as `Arc<Mutex<Order>>`), so a method never has to
//! reason about concurrent siblings.

use crate::contract::Contract;
use crate::errors::StateError;
use crate::ids::{OrderCode, PositionCode, SymbolCode};
use crate::numeric::{Price, Quantity};
use crate::snapshot::{ExchangeKind, PriceSnapshot};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Whether a margin order opens or closes positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Entry,
    Exit,
}

/// Account product an order trades under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Stock,
    Margin,
}

/// Fill policy of an order
///
/// A closed set: the confirmation engine matches on this exhaustively, so
/// adding a condition without teaching the engine about it is a compile
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionCondition {
    /// Market order, any window
    Market,
    /// Market-on-open, morning session only
    MarketOnMorningOpen,
    /// Market-on-open, afternoon session only
    MarketOnAfternoonOpen,
    /// Market-on-close, morning close auction only
    MarketOnMorningClose,
    /// Market-on-close, afternoon close auction only
    MarketOnAfternoonClose,
    /// Market order that is only offered its first tick
    IocMarket,
    /// Limit order, any window
    Limit,
    /// Limit-on-open, morning session only
    LimitOnMorningOpen,
    /// Limit-on-open, afternoon session only
    LimitOnAfternoonOpen,
    /// Limit-on-close, morning close auction only
    LimitOnMorningClose,
    /// Limit-on-close, afternoon close auction only
    LimitOnAfternoonClose,
    /// Limit intraday, market at the morning close
    FunariMorning,
    /// Limit intraday, market at the afternoon close
    FunariAfternoon,
    /// Limit order that is only offered its first tick
    IocLimit,
    /// Dormant until the stop trigger fires; never matches directly
    Stop,
}

impl ExecutionCondition {
    /// Market-priced conditions (no limit price carried)
    pub fn is_market_family(&self) -> bool {
        matches!(
            self,
            ExecutionCondition::Market
                | ExecutionCondition::MarketOnMorningOpen
                | ExecutionCondition::MarketOnAfternoonOpen
                | ExecutionCondition::MarketOnMorningClose
                | ExecutionCondition::MarketOnAfternoonClose
                | ExecutionCondition::IocMarket
        )
    }

    /// Limit-priced conditions (a limit price is required)
    pub fn is_limit_family(&self) -> bool {
        matches!(
            self,
            ExecutionCondition::Limit
                | ExecutionCondition::LimitOnMorningOpen
                | ExecutionCondition::LimitOnAfternoonOpen
                | ExecutionCondition::LimitOnMorningClose
                | ExecutionCondition::LimitOnAfternoonClose
                | ExecutionCondition::FunariMorning
                | ExecutionCondition::FunariAfternoon
                | ExecutionCondition::IocLimit
        )
    }

    /// Whether validation must see a limit price on the order
    pub fn requires_limit_price(&self) -> bool {
        self.is_limit_family()
    }

    /// Conditions that conclusively stop matching after their first
    /// confirmation check
    pub fn is_first_check_only(&self) -> bool {
        matches!(
            self,
            ExecutionCondition::MarketOnMorningOpen
                | ExecutionCondition::MarketOnAfternoonOpen
                | ExecutionCondition::MarketOnMorningClose
                | ExecutionCondition::MarketOnAfternoonClose
                | ExecutionCondition::IocMarket
                | ExecutionCondition::LimitOnMorningOpen
                | ExecutionCondition::LimitOnAfternoonOpen
                | ExecutionCondition::LimitOnMorningClose
                | ExecutionCondition::LimitOnAfternoonClose
                | ExecutionCondition::IocLimit
        )
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Unspecified,
    New,
    /// Stop order waiting for its trigger
    Wait,
    /// Resting, no fills yet
    InOrder,
    /// Partially filled
    Part,
    /// Completely filled (terminal)
    Done,
    /// Cancellation requested
    InCancel,
    /// Canceled (terminal)
    Canceled,
}

impl OrderStatus {
    /// Terminal statuses never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Unspecified | OrderStatus::Done | OrderStatus::Canceled
        )
    }

    /// Statuses from which a cancel is accepted
    pub fn is_cancelable(&self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::Wait | OrderStatus::InOrder | OrderStatus::Part
        )
    }

    /// Statuses eligible to be offered a price tick
    pub fn is_contractable(&self) -> bool {
        matches!(self, OrderStatus::InOrder | OrderStatus::Part)
    }
}

/// Which way the current price must break through the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopComparator {
    /// Trigger once the current price is at or above the trigger price
    PriceAtOrOver,
    /// Trigger once the current price is at or below the trigger price
    PriceAtOrUnder,
}

impl StopComparator {
    /// Check the trigger against a current price
    pub fn holds(&self, trigger: Price, current: Price) -> bool {
        match self {
            StopComparator::PriceAtOrOver => current >= trigger,
            StopComparator::PriceAtOrUnder => current <= trigger,
        }
    }
}

/// Trigger sub-record of a stop order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopCondition {
    pub trigger_price: Price,
    pub comparator: StopComparator,
    /// The condition the order adopts once triggered
    pub condition_after_hit: ExecutionCondition,
    /// Limit price after the trigger, for limit-family post-hit conditions
    pub limit_price_after_hit: Option<Price>,
    pub activated: bool,
    pub activated_at: Option<DateTime<Utc>>,
}

impl StopCondition {
    pub fn new(
        trigger_price: Price,
        comparator: StopComparator,
        condition_after_hit: ExecutionCondition,
        limit_price_after_hit: Option<Price>,
    ) -> Self {
        Self {
            trigger_price,
            comparator,
            condition_after_hit,
            limit_price_after_hit,
            activated: false,
            activated_at: None,
        }
    }
}

/// Exit target named by a margin exit order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitTarget {
    pub position_code: PositionCode,
    pub quantity: Quantity,
}

/// Complete order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub code: OrderCode,
    pub kind: OrderKind,
    pub symbol: SymbolCode,
    pub exchange: ExchangeKind,
    pub side: Side,
    pub condition: ExecutionCondition,
    pub order_quantity: Quantity,
    pub contracted_quantity: Quantity,
    pub canceled_quantity: Quantity,
    pub limit_price: Option<Price>,
    pub stop: Option<StopCondition>,
    pub expire_at: Option<DateTime<Utc>>,
    /// Margin orders only
    pub trade_type: Option<TradeType>,
    /// Margin exit orders only
    pub exit_targets: Vec<ExitTarget>,
    pub status: OrderStatus,
    pub message: String,
    /// How many price ticks this order has been offered
    pub confirming_count: u64,
    pub contracts: Vec<Contract>,
    pub ordered_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new stock order
    ///
    /// Stop orders start in `Wait`; everything else starts resting in
    /// `InOrder`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_stock(
        symbol: SymbolCode,
        exchange: ExchangeKind,
        side: Side,
        condition: ExecutionCondition,
        quantity: Quantity,
        limit_price: Option<Price>,
        stop: Option<StopCondition>,
        expire_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let status = if condition == ExecutionCondition::Stop {
            OrderStatus::Wait
        } else {
            OrderStatus::InOrder
        };
        Self {
            code: OrderCode::new(),
            kind: OrderKind::Stock,
            symbol,
            exchange,
            side,
            condition,
            order_quantity: quantity,
            contracted_quantity: Quantity::zero(),
            canceled_quantity: Quantity::zero(),
            limit_price,
            stop,
            expire_at,
            trade_type: None,
            exit_targets: Vec::new(),
            status,
            message: String::new(),
            confirming_count: 0,
            contracts: Vec::new(),
            ordered_at: now,
            canceled_at: None,
        }
    }

    /// Create a new margin order
    #[allow(clippy::too_many_arguments)]
    pub fn new_margin(
        symbol: SymbolCode,
        exchange: ExchangeKind,
        side: Side,
        trade_type: TradeType,
        condition: ExecutionCondition,
        quantity: Quantity,
        limit_price: Option<Price>,
        stop: Option<StopCondition>,
        exit_targets: Vec<ExitTarget>,
        expire_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut order = Self::new_stock(
            symbol, exchange, side, condition, quantity, limit_price, stop, expire_at, now,
        );
        order.kind = OrderKind::Margin;
        order.trade_type = Some(trade_type);
        order.exit_targets = exit_targets;
        order
    }

    /// The condition the engine should match this order under
    ///
    /// A triggered stop order is matched under its post-hit condition; until
    /// then the declared condition stands (and `Stop` never matches).
    pub fn effective_condition(&self) -> ExecutionCondition {
        match &self.stop {
            Some(stop) if stop.activated => stop.condition_after_hit,
            _ => self.condition,
        }
    }

    /// The limit price belonging to `effective_condition`
    pub fn effective_limit_price(&self) -> Option<Price> {
        match &self.stop {
            Some(stop) if stop.activated => stop.limit_price_after_hit,
            _ => self.limit_price,
        }
    }

    /// Whether this order has been offered at least one price tick
    pub fn already_confirmed(&self) -> bool {
        self.confirming_count > 0
    }

    /// Note that the order was offered a price tick
    pub fn note_confirmation(&mut self) {
        self.confirming_count += 1;
    }

    /// Eligible to be offered to the confirmation engine
    pub fn is_contractable(&self) -> bool {
        self.status.is_contractable()
    }

    /// Eligible for cancellation
    pub fn is_cancelable(&self) -> bool {
        self.status.is_cancelable()
    }

    /// Try to trigger a waiting stop order against a snapshot
    ///
    /// Requires `Wait` status, a configured and untriggered stop, a matching
    /// symbol, and a fresh current price the comparator accepts. No-op in
    /// every other case.
    pub fn activate_stop(&mut self, snapshot: &PriceSnapshot, now: DateTime<Utc>) {
        if self.status != OrderStatus::Wait {
            return;
        }
        let Some(stop) = self.stop.as_mut() else {
            return;
        };
        if stop.activated || snapshot.symbol != self.symbol {
            return;
        }
        let Some(current) = snapshot.fresh_current_price(now) else {
            return;
        };
        if !stop.comparator.holds(stop.trigger_price, current) {
            return;
        }
        stop.activated = true;
        stop.activated_at = Some(now);
        self.status = OrderStatus::InOrder;
    }

    /// Record a fill and advance the status
    ///
    /// # Panics
    /// Panics if the fill would exceed the order quantity
    pub fn record_contract(&mut self, contract: Contract) {
        if self.status.is_terminal() {
            return;
        }
        let new_contracted = self.contracted_quantity + contract.quantity;
        assert!(
            new_contracted <= self.order_quantity,
            "Fill would exceed order quantity"
        );

        self.contracted_quantity = new_contracted;
        self.contracts.push(contract);

        self.status = if self.contracted_quantity.is_zero() {
            OrderStatus::InOrder
        } else if self.contracted_quantity < self.order_quantity {
            OrderStatus::Part
        } else {
            OrderStatus::Done
        };
    }

    /// Cancel the order
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), StateError> {
        if !self.status.is_cancelable() {
            return Err(StateError::NotCancelable {
                status: self.status,
            });
        }
        self.canceled_quantity = self
            .order_quantity
            .checked_sub(self.contracted_quantity)
            .unwrap_or_else(Quantity::zero);
        self.canceled_at = Some(at);
        self.status = OrderStatus::Canceled;
        Ok(())
    }

    /// Cancel the order if its expiry has passed
    ///
    /// Cooperative: callers invoke this before contractability checks. No-op
    /// when no expiry is set, the expiry is still ahead, or the order is
    /// already past canceling.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        let Some(expire_at) = self.expire_at else {
            return;
        };
        if now <= expire_at || !self.status.is_cancelable() {
            return;
        }
        self.canceled_quantity = self
            .order_quantity
            .checked_sub(self.contracted_quantity)
            .unwrap_or_else(Quantity::zero);
        self.canceled_at = Some(now);
        self.message = "expired".to_string();
        self.status = OrderStatus::Canceled;
    }

    /// Garbage-collection predicate
    ///
    /// Dead once terminal and the last cancel/fill is over a calendar day
    /// old, or terminal with no cancel timestamp and no fills at all.
    pub fn is_dead(&self, now: DateTime<Utc>) -> bool {
        if !self.status.is_terminal() {
            return false;
        }
        let last_fill = self.contracts.last().map(|c| c.contracted_at);
        let last_activity = match (self.canceled_at, last_fill) {
            (Some(canceled), Some(filled)) => Some(canceled.max(filled)),
            (Some(canceled), None) => Some(canceled),
            (None, Some(filled)) => Some(filled),
            (None, None) => None,
        };
        match last_activity {
            Some(at) => now - at > Duration::days(1),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Session, SnapshotKind};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 16, 0, 30, 0).unwrap()
    }

    fn market_order(quantity: u64) -> Order {
        Order::new_stock(
            SymbolCode::new("1320"),
            ExchangeKind::Stock,
            Side::Buy,
            ExecutionCondition::Market,
            Quantity::from_u64(quantity),
            None,
            None,
            None,
            now(),
        )
    }

    fn stop_order(trigger: u64, comparator: StopComparator) -> Order {
        Order::new_stock(
            SymbolCode::new("1320"),
            ExchangeKind::Stock,
            Side::Buy,
            ExecutionCondition::Stop,
            Quantity::from_u64(100),
            None,
            Some(StopCondition::new(
                Price::from_u64(trigger),
                comparator,
                ExecutionCondition::Market,
                None,
            )),
            None,
            now(),
        )
    }

    fn snapshot(current: Option<u64>, at: DateTime<Utc>) -> PriceSnapshot {
        PriceSnapshot {
            symbol: SymbolCode::new("1320"),
            exchange: ExchangeKind::Stock,
            current_price: current.map(Price::from_u64),
            current_price_at: current.map(|_| at),
            bid: None,
            bid_at: None,
            ask: None,
            ask_at: None,
            kind: SnapshotKind::Regular,
            session: Some(Session::Morning),
            business_day: at.date_naive(),
        }
    }

    fn fill(order: &Order, quantity: u64) -> Contract {
        Contract::new(
            order.code,
            PositionCode::new(),
            Price::from_u64(1000),
            Quantity::from_u64(quantity),
            now(),
        )
    }

    #[test]
    fn test_order_starts_in_order() {
        let order = market_order(100);
        assert_eq!(order.status, OrderStatus::InOrder);
        assert!(order.is_contractable());
        assert!(!order.already_confirmed());
    }

    #[test]
    fn test_stop_order_starts_waiting() {
        let order = stop_order(1000, StopComparator::PriceAtOrOver);
        assert_eq!(order.status, OrderStatus::Wait);
        assert!(!order.is_contractable());
        assert!(order.is_cancelable());
    }

    #[test]
    fn test_record_contract_partial_then_done() {
        let mut order = market_order(300);

        let partial = fill(&order, 100);
        order.record_contract(partial);
        assert_eq!(order.status, OrderStatus::Part);
        assert_eq!(order.contracted_quantity, Quantity::from_u64(100));

        let rest = fill(&order, 200);
        order.record_contract(rest);
        assert_eq!(order.status, OrderStatus::Done);
        assert_eq!(order.contracted_quantity, order.order_quantity);
    }

    #[test]
    #[should_panic(expected = "Fill would exceed order quantity")]
    fn test_record_contract_overfill_panics() {
        let mut order = market_order(100);
        let too_big = fill(&order, 200);
        order.record_contract(too_big);
    }

    #[test]
    fn test_cancel_resting_order() {
        let mut order = market_order(100);
        order.cancel(now()).unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.canceled_quantity, Quantity::from_u64(100));
        assert!(order.canceled_at.is_some());
    }

    #[test]
    fn test_cancel_done_order_rejected() {
        let mut order = market_order(100);
        order.record_contract(fill(&order, 100));
        assert_eq!(order.status, OrderStatus::Done);

        let err = order.cancel(now()).unwrap_err();
        assert_eq!(
            err,
            StateError::NotCancelable {
                status: OrderStatus::Done
            }
        );
        assert_eq!(order.status, OrderStatus::Done);
    }

    #[test]
    fn test_partial_cancel_keeps_contracted_quantity() {
        let mut order = market_order(300);
        order.record_contract(fill(&order, 100));
        order.cancel(now()).unwrap();
        assert_eq!(order.canceled_quantity, Quantity::from_u64(200));
        assert_eq!(order.contracted_quantity, Quantity::from_u64(100));
    }

    #[test]
    fn test_expire_past_expiry() {
        let mut order = market_order(100);
        order.expire_at = Some(now());

        order.expire(now());
        assert_eq!(order.status, OrderStatus::InOrder, "expiry is exclusive");

        order.expire(now() + Duration::seconds(1));
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.message, "expired");
    }

    #[test]
    fn test_expire_without_expiry_is_noop() {
        let mut order = market_order(100);
        order.expire(now() + Duration::days(30));
        assert_eq!(order.status, OrderStatus::InOrder);
    }

    #[test]
    fn test_activate_stop_on_fresh_price() {
        let mut order = stop_order(1000, StopComparator::PriceAtOrOver);
        let tick = snapshot(Some(1000), now());

        order.activate_stop(&tick, now() + Duration::seconds(1));
        assert_eq!(order.status, OrderStatus::InOrder);
        let stop = order.stop.as_ref().unwrap();
        assert!(stop.activated);
        assert!(stop.activated_at.is_some());
        assert_eq!(order.effective_condition(), ExecutionCondition::Market);
    }

    #[test]
    fn test_activate_stop_stale_price_is_noop() {
        let mut order = stop_order(1000, StopComparator::PriceAtOrOver);
        let tick = snapshot(Some(1000), now());

        order.activate_stop(&tick, now() + Duration::seconds(5));
        assert_eq!(order.status, OrderStatus::Wait);
        assert!(!order.stop.as_ref().unwrap().activated);
    }

    #[test]
    fn test_activate_stop_comparator_not_met() {
        let mut order = stop_order(1000, StopComparator::PriceAtOrOver);
        let tick = snapshot(Some(999), now());

        order.activate_stop(&tick, now());
        assert_eq!(order.status, OrderStatus::Wait);
    }

    #[test]
    fn test_activate_stop_wrong_symbol_is_noop() {
        let mut order = stop_order(1000, StopComparator::PriceAtOrOver);
        let mut tick = snapshot(Some(1000), now());
        tick.symbol = SymbolCode::new("9999");

        order.activate_stop(&tick, now());
        assert_eq!(order.status, OrderStatus::Wait);
    }

    #[test]
    fn test_effective_condition_before_trigger() {
        let order = stop_order(1000, StopComparator::PriceAtOrUnder);
        assert_eq!(order.effective_condition(), ExecutionCondition::Stop);
    }

    #[test]
    fn test_is_dead() {
        let mut order = market_order(100);
        assert!(!order.is_dead(now()), "live orders are never dead");

        order.cancel(now()).unwrap();
        assert!(!order.is_dead(now() + Duration::hours(23)));
        assert!(order.is_dead(now() + Duration::hours(25)));
    }

    #[test]
    fn test_is_dead_terminal_without_activity() {
        let mut order = market_order(100);
        order.status = OrderStatus::Unspecified;
        assert!(order.is_dead(now()));
    }

    #[test]
    fn test_condition_predicates() {
        assert!(ExecutionCondition::Market.is_market_family());
        assert!(ExecutionCondition::IocMarket.is_first_check_only());
        assert!(ExecutionCondition::FunariMorning.is_limit_family());
        assert!(ExecutionCondition::FunariMorning.requires_limit_price());
        assert!(!ExecutionCondition::FunariMorning.is_first_check_only());
        assert!(!ExecutionCondition::Stop.is_market_family());
        assert!(!ExecutionCondition::Stop.is_limit_family());
    }

    #[test]
    fn test_order_serialization() {
        let order = market_order(100);
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
