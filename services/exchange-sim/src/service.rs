//! Orchestration service and public facade
//!
//! `ExchangeSimulator` wires the classifier, the confirmation engine, and
//! the stores together. Every public operation takes `now` explicitly; the
//! simulator has no hidden clock.
//!
//! Locking discipline: entity handles are locked one at a time, never
//! nested, and the (pure) confirmation engine is never invoked while a lock
//! is held — order state is read out into a profile first, the engine
//! decides, then mutation re-acquires the lock and re-checks.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use types::prelude::*;

use crate::calendar::{BusinessDayCalendar, WeekdayCalendar};
use crate::classifier;
use crate::matching::{Confirmation, ConfirmationEngine};
use crate::models::{
    MarginOrderRequest, OrderSummary, PositionSummary, RegisterPriceRequest, StockOrderRequest,
};
use crate::session::SessionWindows;
use crate::store::{
    InMemoryOrderStore, InMemoryPositionStore, InMemoryPriceStore, OrderStore, PositionStore,
    PriceStore, SharedOrder,
};

/// How a confirmed match advances the books
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    /// Open a brand-new position owned by this fill
    Entry,
    /// Consume the symbol's positions oldest-first
    ExitFifo,
    /// Consume the positions the order explicitly names
    ExitTargets,
}

/// Immutable view of an order taken under its lock, released before the
/// engine is consulted
struct OrderProfile {
    code: OrderCode,
    kind: OrderKind,
    symbol: SymbolCode,
    exchange: ExchangeKind,
    side: Side,
    intent: Intent,
    condition: ExecutionCondition,
    limit_price: Option<Price>,
    already_confirmed: bool,
    remaining: Quantity,
    exit_targets: Vec<ExitTarget>,
}

impl OrderProfile {
    fn read(order: &Order) -> Self {
        let intent = match (order.kind, order.trade_type, order.side) {
            (OrderKind::Margin, Some(TradeType::Exit), _) => Intent::ExitTargets,
            (OrderKind::Margin, _, _) => Intent::Entry,
            (OrderKind::Stock, _, Side::Buy) => Intent::Entry,
            (OrderKind::Stock, _, Side::Sell) => Intent::ExitFifo,
        };
        Self {
            code: order.code,
            kind: order.kind,
            symbol: order.symbol.clone(),
            exchange: order.exchange,
            side: order.side,
            intent,
            condition: order.effective_condition(),
            limit_price: order.effective_limit_price(),
            already_confirmed: order.already_confirmed(),
            remaining: order
                .order_quantity
                .checked_sub(order.contracted_quantity)
                .unwrap_or_else(Quantity::zero),
            exit_targets: order.exit_targets.clone(),
        }
    }
}

/// The simulator facade
pub struct ExchangeSimulator {
    engine: ConfirmationEngine,
    windows: SessionWindows,
    orders: Box<dyn OrderStore>,
    positions: Box<dyn PositionStore>,
    prices: Box<dyn PriceStore>,
    calendar: Box<dyn BusinessDayCalendar>,
}

impl Default for ExchangeSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeSimulator {
    /// Simulator with default windows, in-memory stores, and the weekday
    /// calendar
    pub fn new() -> Self {
        Self::with_windows(SessionWindows::default())
    }

    pub fn with_windows(windows: SessionWindows) -> Self {
        Self {
            engine: ConfirmationEngine::new(windows.clone()),
            windows,
            orders: Box::new(InMemoryOrderStore::new()),
            positions: Box::new(InMemoryPositionStore::new()),
            prices: Box::new(InMemoryPriceStore::new()),
            calendar: Box::new(WeekdayCalendar),
        }
    }

    /// Swap in a different calendar (e.g. one backed by a holiday feed)
    pub fn with_calendar(mut self, calendar: Box<dyn BusinessDayCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    /// Swap in alternative store implementations
    pub fn with_stores(
        mut self,
        orders: Box<dyn OrderStore>,
        positions: Box<dyn PositionStore>,
        prices: Box<dyn PriceStore>,
    ) -> Self {
        self.orders = orders;
        self.positions = positions;
        self.prices = prices;
        self
    }

    /// Register a price tick: validate, classify, store, then offer the
    /// tick to every resting order for the symbol
    pub fn register_price(
        &self,
        request: RegisterPriceRequest,
        now: DateTime<Utc>,
    ) -> Result<(), ExchangeError> {
        let tick = request.validate()?;
        let previous = self.prices.by_symbol(&tick.symbol, now).ok();
        let snapshot = classifier::classify(&tick, previous.as_ref(), &self.windows);
        self.prices.set(snapshot.clone(), now);
        debug!(symbol = %snapshot.symbol, kind = ?snapshot.kind, "price registered");

        for handle in self.orders.by_symbol(&snapshot.symbol) {
            self.offer_tick(&handle, &snapshot, now);
        }
        Ok(())
    }

    /// Place a cash-equity order
    ///
    /// Attempts an immediate match against the latest stored price when one
    /// is present and unexpired; rests the order either way.
    pub fn place_stock_order(
        &self,
        request: StockOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderCode, ExchangeError> {
        let order = request.validate(now, &*self.calendar)?;
        if order.side == Side::Sell {
            self.verify_fifo_cover(&order.symbol, order.side, order.order_quantity)?;
        }
        let code = order.code;
        let handle = self.orders.save(order);
        self.try_immediate_match(&handle, now);
        info!(order = %code, "stock order placed");
        Ok(code)
    }

    /// Place a margin order
    ///
    /// Exit orders validate every named target, then reserve (hold) the
    /// quantities; the holds are released on cancel or expiry.
    pub fn place_margin_order(
        &self,
        request: MarginOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderCode, ExchangeError> {
        let order = request.validate(now, &*self.calendar)?;
        if order.trade_type == Some(TradeType::Exit) {
            self.reserve_targets(&order)?;
        }
        let code = order.code;
        let handle = self.orders.save(order);
        self.try_immediate_match(&handle, now);
        info!(order = %code, "margin order placed");
        Ok(code)
    }

    /// Cancel an order
    ///
    /// `NotFound` for unknown codes, `NotCancelable` when the status does
    /// not permit cancellation. Canceling a margin exit releases its holds.
    pub fn cancel_order(&self, code: &OrderCode, now: DateTime<Utc>) -> Result<(), ExchangeError> {
        let handle = self.orders.by_code(code)?;
        let released = {
            let mut order = handle.lock().unwrap();
            order.cancel(now)?;
            if order.kind == OrderKind::Margin && order.trade_type == Some(TradeType::Exit) {
                unfilled_targets(&order)
            } else {
                Vec::new()
            }
        };
        self.release_targets(&released);
        info!(order = %code, "order canceled");
        Ok(())
    }

    /// List live orders, evicting dead ones as a side effect
    pub fn list_orders(&self, now: DateTime<Utc>) -> Vec<OrderSummary> {
        let mut summaries = Vec::new();
        let mut dead = Vec::new();
        for handle in self.orders.all() {
            let order = handle.lock().unwrap();
            if order.is_dead(now) {
                dead.push(order.code);
                continue;
            }
            summaries.push(OrderSummary::from(&*order));
        }
        for code in &dead {
            self.orders.remove(code);
            debug!(order = %code, "evicted dead order");
        }
        summaries
    }

    /// List live positions, evicting drained ones as a side effect
    pub fn list_positions(&self, _now: DateTime<Utc>) -> Vec<PositionSummary> {
        let mut summaries = Vec::new();
        let mut dead = Vec::new();
        for handle in self.positions.all() {
            let position = handle.lock().unwrap();
            if position.is_dead() {
                dead.push(position.code);
                continue;
            }
            summaries.push(PositionSummary::from(&*position));
        }
        for code in &dead {
            self.positions.remove(code);
            debug!(position = %code, "evicted dead position");
        }
        summaries
    }

    fn try_immediate_match(&self, handle: &SharedOrder, now: DateTime<Utc>) {
        let symbol = handle.lock().unwrap().symbol.clone();
        // No usable price (absent or expired): the order just rests.
        if let Ok(snapshot) = self.prices.by_symbol(&symbol, now) {
            self.offer_tick(handle, &snapshot, now);
        }
    }

    /// Offer one tick to one order: expire, try the stop trigger, then ask
    /// the engine and settle a confirmed match
    fn offer_tick(&self, handle: &SharedOrder, snapshot: &PriceSnapshot, now: DateTime<Utc>) {
        let (profile, expired_targets) = {
            let mut order = handle.lock().unwrap();
            let was_cancelable = order.status.is_cancelable();
            order.expire(now);
            let expired_targets = if was_cancelable
                && order.status == OrderStatus::Canceled
                && order.kind == OrderKind::Margin
                && order.trade_type == Some(TradeType::Exit)
            {
                unfilled_targets(&order)
            } else {
                Vec::new()
            };
            order.activate_stop(snapshot, now);
            if !order.is_contractable() {
                (None, expired_targets)
            } else {
                let profile = OrderProfile::read(&order);
                order.note_confirmation();
                (Some(profile), expired_targets)
            }
        };
        self.release_targets(&expired_targets);
        let Some(profile) = profile else {
            return;
        };

        let Some(confirmation) = self.engine.confirm(
            profile.condition,
            profile.side,
            profile.limit_price,
            profile.already_confirmed,
            Some(snapshot),
            now,
        ) else {
            return;
        };

        let result = match profile.intent {
            Intent::Entry => self.settle_entry(handle, &profile, &confirmation),
            Intent::ExitFifo => self.settle_exit_fifo(handle, &profile, &confirmation),
            Intent::ExitTargets => self.settle_exit_targets(handle, &profile, &confirmation),
        };
        if let Err(err) = result {
            warn!(order = %profile.code, error = %err, "contract settlement failed");
        }
    }

    /// Entry: one fill for the full remaining quantity, one new position
    fn settle_entry(
        &self,
        handle: &SharedOrder,
        profile: &OrderProfile,
        confirmation: &Confirmation,
    ) -> Result<(), ExchangeError> {
        let position = Position::new(
            profile.code,
            profile.kind,
            profile.symbol.clone(),
            profile.exchange,
            profile.side,
            profile.remaining,
            confirmation.price,
            confirmation.confirmed_at,
        );
        let contract = Contract::new(
            profile.code,
            position.code,
            confirmation.price,
            profile.remaining,
            confirmation.confirmed_at,
        );
        {
            let mut order = handle.lock().unwrap();
            // The order may have been canceled since the profile was read
            if !order.is_contractable() {
                return Ok(());
            }
            order.record_contract(contract);
        }
        self.positions.save(position);
        info!(
            order = %profile.code,
            price = %confirmation.price,
            quantity = %profile.remaining,
            "entry contracted"
        );
        Ok(())
    }

    /// Stock exit: verify the symbol's positions cover the quantity, then
    /// consume them oldest-first, one contract per position touched
    fn settle_exit_fifo(
        &self,
        handle: &SharedOrder,
        profile: &OrderProfile,
        confirmation: &Confirmation,
    ) -> Result<(), ExchangeError> {
        let candidates = self.positions.by_symbol(&profile.symbol);

        let mut total = Quantity::zero();
        for candidate in &candidates {
            let position = candidate.lock().unwrap();
            if position.kind != profile.kind || position.side != profile.side.opposite() {
                continue;
            }
            total = total + position.orderable_quantity();
        }
        if total < profile.remaining {
            return Err(LedgerError::InsufficientOwnedQuantity {
                position_code: None,
                required: profile.remaining,
                available: total,
            }
            .into());
        }

        // Verified above, so the hold+exit pairs below cannot fall short
        // barring a concurrent consumer; those are logged and skipped.
        let mut remaining = profile.remaining;
        let mut contracts = Vec::new();
        for candidate in &candidates {
            if remaining.is_zero() {
                break;
            }
            let mut position = candidate.lock().unwrap();
            if position.kind != profile.kind || position.side != profile.side.opposite() {
                continue;
            }
            let take = position.orderable_quantity().min(remaining);
            if take.is_zero() {
                continue;
            }
            if let Err(err) = position.hold(take).and_then(|()| position.exit(take)) {
                warn!(position = %position.code, error = %err, "exit commit failed after verification");
                continue;
            }
            contracts.push(Contract::new(
                profile.code,
                position.code,
                confirmation.price,
                take,
                confirmation.confirmed_at,
            ));
            remaining = remaining.checked_sub(take).unwrap_or_else(Quantity::zero);
        }

        let filled = contracts.len();
        {
            let mut order = handle.lock().unwrap();
            for contract in contracts {
                order.record_contract(contract);
            }
        }
        info!(
            order = %profile.code,
            price = %confirmation.price,
            positions = filled,
            "exit contracted"
        );
        Ok(())
    }

    /// Margin exit: consume exactly the targets named by the order; their
    /// quantities were held at placement
    fn settle_exit_targets(
        &self,
        handle: &SharedOrder,
        profile: &OrderProfile,
        confirmation: &Confirmation,
    ) -> Result<(), ExchangeError> {
        let mut contracts = Vec::new();
        for target in &profile.exit_targets {
            let candidate = match self.positions.by_code(&target.position_code) {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(position = %target.position_code, error = %err, "exit target missing");
                    continue;
                }
            };
            let mut position = candidate.lock().unwrap();
            if let Err(err) = position.exit(target.quantity) {
                // Held at placement, so this cannot fall short
                warn!(position = %target.position_code, error = %err, "held exit failed");
                continue;
            }
            contracts.push(Contract::new(
                profile.code,
                target.position_code,
                confirmation.price,
                target.quantity,
                confirmation.confirmed_at,
            ));
        }

        {
            let mut order = handle.lock().unwrap();
            for contract in contracts {
                order.record_contract(contract);
            }
        }
        info!(order = %profile.code, price = %confirmation.price, "margin exit contracted");
        Ok(())
    }

    /// Aggregate orderable-quantity check for stock sells
    fn verify_fifo_cover(
        &self,
        symbol: &SymbolCode,
        side: Side,
        quantity: Quantity,
    ) -> Result<(), ExchangeError> {
        let mut total = Quantity::zero();
        for handle in self.positions.by_symbol(symbol) {
            let position = handle.lock().unwrap();
            if position.kind != OrderKind::Stock || position.side != side.opposite() {
                continue;
            }
            total = total + position.orderable_quantity();
        }
        if total < quantity {
            return Err(LedgerError::InsufficientOwnedQuantity {
                position_code: None,
                required: quantity,
                available: total,
            }
            .into());
        }
        Ok(())
    }

    /// Validate every target of a margin exit, then hold them all
    ///
    /// No hold is taken until the full list has validated; a hold that
    /// still fails (concurrent consumer) rolls the earlier ones back.
    fn reserve_targets(&self, order: &Order) -> Result<(), ExchangeError> {
        let mut validated = Vec::with_capacity(order.exit_targets.len());
        for target in &order.exit_targets {
            let handle = self.positions.by_code(&target.position_code)?;
            {
                let position = handle.lock().unwrap();
                if position.kind != OrderKind::Margin
                    || position.symbol != order.symbol
                    || position.side != order.side.opposite()
                {
                    return Err(ValidationError::InvalidExitPositionList.into());
                }
                if position.orderable_quantity() < target.quantity {
                    return Err(LedgerError::InsufficientOwnedQuantity {
                        position_code: Some(position.code),
                        required: target.quantity,
                        available: position.orderable_quantity(),
                    }
                    .into());
                }
            }
            validated.push((handle, target.quantity));
        }

        let mut taken: Vec<(crate::store::SharedPosition, Quantity)> = Vec::new();
        for (handle, quantity) in validated {
            let result = handle.lock().unwrap().hold(quantity);
            match result {
                Ok(()) => taken.push((handle, quantity)),
                Err(err) => {
                    for (held, held_quantity) in taken {
                        let mut position = held.lock().unwrap();
                        if let Err(release_err) = position.release(held_quantity) {
                            warn!(position = %position.code, error = %release_err, "rollback release failed");
                        }
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    fn release_targets(&self, targets: &[ExitTarget]) {
        for target in targets {
            match self.positions.by_code(&target.position_code) {
                Ok(handle) => {
                    let mut position = handle.lock().unwrap();
                    if let Err(err) = position.release(target.quantity) {
                        warn!(position = %target.position_code, error = %err, "release failed");
                    }
                }
                Err(_) => {
                    warn!(position = %target.position_code, "release target not found");
                }
            }
        }
    }
}

/// Target quantities a margin exit still has held but not consumed
fn unfilled_targets(order: &Order) -> Vec<ExitTarget> {
    order
        .exit_targets
        .iter()
        .filter_map(|target| {
            let filled = order
                .contracts
                .iter()
                .filter(|contract| contract.position_code == target.position_code)
                .fold(Quantity::zero(), |acc, contract| acc + contract.quantity);
            let remaining = target
                .quantity
                .checked_sub(filled)
                .unwrap_or_else(Quantity::zero);
            if remaining.is_zero() {
                None
            } else {
                Some(ExitTarget {
                    position_code: target.position_code,
                    quantity: remaining,
                })
            }
        })
        .collect()
}
