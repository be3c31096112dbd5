//! Request and summary models for the facade
//!
//! Callers speak in loosely-typed requests; validation converts them into
//! the domain types the simulator works with. A request that fails
//! validation mutates nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use types::prelude::*;

use crate::calendar::BusinessDayCalendar;

/// A raw price tick as delivered by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterPriceRequest {
    pub exchange: Option<ExchangeKind>,
    pub symbol: String,
    pub current_price: Option<Price>,
    pub current_price_at: Option<DateTime<Utc>>,
    pub bid: Option<Price>,
    pub bid_at: Option<DateTime<Utc>>,
    pub ask: Option<Price>,
    pub ask_at: Option<DateTime<Utc>>,
}

impl RegisterPriceRequest {
    /// Validate into a classifiable tick
    ///
    /// Requires an exchange, a symbol, and at least one of the three
    /// timestamps.
    pub fn validate(self) -> Result<PriceTick, ValidationError> {
        let exchange = self.exchange.ok_or(ValidationError::InvalidExchange)?;
        let symbol =
            SymbolCode::try_new(self.symbol).ok_or(ValidationError::InvalidSymbolCode)?;
        let at = [self.current_price_at, self.bid_at, self.ask_at]
            .into_iter()
            .flatten()
            .max()
            .ok_or(ValidationError::InvalidPriceTimes)?;
        Ok(PriceTick {
            symbol,
            exchange,
            current_price: self.current_price,
            current_price_at: self.current_price_at,
            bid: self.bid,
            bid_at: self.bid_at,
            ask: self.ask,
            ask_at: self.ask_at,
            at,
        })
    }
}

/// A validated price tick
///
/// `at` is the latest of the present timestamps and is what the classifier
/// derives session and business day from.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTick {
    pub symbol: SymbolCode,
    pub exchange: ExchangeKind,
    pub current_price: Option<Price>,
    pub current_price_at: Option<DateTime<Utc>>,
    pub bid: Option<Price>,
    pub bid_at: Option<DateTime<Utc>>,
    pub ask: Option<Price>,
    pub ask_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

/// Stop trigger sub-request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopConditionRequest {
    pub trigger_price: Option<Price>,
    pub comparator: Option<StopComparator>,
    pub condition_after_hit: Option<ExecutionCondition>,
    pub limit_price_after_hit: Option<Price>,
}

impl StopConditionRequest {
    fn validate(self) -> Result<StopCondition, ValidationError> {
        let trigger_price = self
            .trigger_price
            .ok_or(ValidationError::InvalidStopCondition)?;
        let comparator = self
            .comparator
            .ok_or(ValidationError::InvalidStopCondition)?;
        let condition_after_hit = self
            .condition_after_hit
            .ok_or(ValidationError::InvalidStopCondition)?;
        // The post-hit condition must itself be matchable
        if condition_after_hit == ExecutionCondition::Stop {
            return Err(ValidationError::InvalidStopCondition);
        }
        if condition_after_hit.requires_limit_price() && self.limit_price_after_hit.is_none() {
            return Err(ValidationError::InvalidStopCondition);
        }
        if !condition_after_hit.requires_limit_price() && self.limit_price_after_hit.is_some() {
            return Err(ValidationError::InvalidStopCondition);
        }
        Ok(StopCondition::new(
            trigger_price,
            comparator,
            condition_after_hit,
            self.limit_price_after_hit,
        ))
    }
}

/// Request to place a cash-equity order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockOrderRequest {
    pub symbol: String,
    pub exchange: Option<ExchangeKind>,
    pub side: Option<Side>,
    pub condition: Option<ExecutionCondition>,
    pub quantity: Option<Quantity>,
    pub limit_price: Option<Price>,
    pub expire_at: Option<DateTime<Utc>>,
    pub stop: Option<StopConditionRequest>,
}

impl StockOrderRequest {
    /// Validate into an order entity
    pub fn validate(
        self,
        now: DateTime<Utc>,
        calendar: &dyn BusinessDayCalendar,
    ) -> Result<Order, ValidationError> {
        let symbol =
            SymbolCode::try_new(self.symbol).ok_or(ValidationError::InvalidSymbolCode)?;
        let exchange = self.exchange.ok_or(ValidationError::InvalidExchange)?;
        let side = self.side.ok_or(ValidationError::InvalidSide)?;
        let condition = self
            .condition
            .ok_or(ValidationError::InvalidExecutionCondition)?;
        let quantity = self.quantity.ok_or(ValidationError::InvalidQuantity)?;
        if quantity.is_zero() {
            return Err(ValidationError::InvalidQuantity);
        }
        let limit_price = validate_limit_price(condition, self.limit_price)?;
        let stop = validate_stop(condition, self.stop)?;
        validate_expiry(self.expire_at, now, calendar)?;

        Ok(Order::new_stock(
            symbol,
            exchange,
            side,
            condition,
            quantity,
            limit_price,
            stop,
            self.expire_at,
            now,
        ))
    }
}

/// Exit target named by a margin exit request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExitTargetRequest {
    pub position_code: Option<PositionCode>,
    pub quantity: Option<Quantity>,
}

/// Request to place a margin order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarginOrderRequest {
    pub symbol: String,
    pub exchange: Option<ExchangeKind>,
    pub side: Option<Side>,
    pub trade_type: Option<TradeType>,
    pub condition: Option<ExecutionCondition>,
    pub quantity: Option<Quantity>,
    pub limit_price: Option<Price>,
    pub expire_at: Option<DateTime<Utc>>,
    pub stop: Option<StopConditionRequest>,
    pub exit_targets: Vec<ExitTargetRequest>,
}

impl MarginOrderRequest {
    /// Validate into an order entity
    ///
    /// Exit orders must name at least one target, each with a code and a
    /// positive quantity, and the sum of target quantities must equal the
    /// order quantity.
    pub fn validate(
        self,
        now: DateTime<Utc>,
        calendar: &dyn BusinessDayCalendar,
    ) -> Result<Order, ValidationError> {
        let symbol =
            SymbolCode::try_new(self.symbol).ok_or(ValidationError::InvalidSymbolCode)?;
        let exchange = self.exchange.ok_or(ValidationError::InvalidExchange)?;
        let side = self.side.ok_or(ValidationError::InvalidSide)?;
        let trade_type = self.trade_type.ok_or(ValidationError::InvalidTradeType)?;
        let condition = self
            .condition
            .ok_or(ValidationError::InvalidExecutionCondition)?;
        let quantity = self.quantity.ok_or(ValidationError::InvalidQuantity)?;
        if quantity.is_zero() {
            return Err(ValidationError::InvalidQuantity);
        }
        let limit_price = validate_limit_price(condition, self.limit_price)?;
        let stop = validate_stop(condition, self.stop)?;
        validate_expiry(self.expire_at, now, calendar)?;

        let exit_targets = match trade_type {
            TradeType::Entry => {
                if !self.exit_targets.is_empty() {
                    return Err(ValidationError::InvalidExitPositionList);
                }
                Vec::new()
            }
            TradeType::Exit => {
                if self.exit_targets.is_empty() {
                    return Err(ValidationError::InvalidExitPositionList);
                }
                let mut targets = Vec::with_capacity(self.exit_targets.len());
                let mut total = Quantity::zero();
                for target in self.exit_targets {
                    let position_code = target
                        .position_code
                        .ok_or(ValidationError::InvalidExitPositionList)?;
                    let target_quantity = target
                        .quantity
                        .ok_or(ValidationError::InvalidExitQuantity)?;
                    if target_quantity.is_zero() {
                        return Err(ValidationError::InvalidExitQuantity);
                    }
                    total = total + target_quantity;
                    targets.push(ExitTarget {
                        position_code,
                        quantity: target_quantity,
                    });
                }
                if total != quantity {
                    return Err(ValidationError::InvalidExitQuantity);
                }
                targets
            }
        };

        Ok(Order::new_margin(
            symbol,
            exchange,
            side,
            trade_type,
            condition,
            quantity,
            limit_price,
            stop,
            exit_targets,
            self.expire_at,
            now,
        ))
    }
}

fn validate_limit_price(
    condition: ExecutionCondition,
    limit_price: Option<Price>,
) -> Result<Option<Price>, ValidationError> {
    if condition.requires_limit_price() {
        match limit_price {
            Some(price) if price > Price::from_u64(0) => Ok(Some(price)),
            _ => Err(ValidationError::InvalidLimitPrice),
        }
    } else {
        // Market-family and stop orders carry no top-level limit price
        // (a stop order's post-hit limit lives in its stop condition).
        if limit_price.is_some() {
            return Err(ValidationError::InvalidLimitPrice);
        }
        Ok(None)
    }
}

fn validate_stop(
    condition: ExecutionCondition,
    stop: Option<StopConditionRequest>,
) -> Result<Option<StopCondition>, ValidationError> {
    match (condition, stop) {
        (ExecutionCondition::Stop, Some(request)) => Ok(Some(request.validate()?)),
        (ExecutionCondition::Stop, None) => Err(ValidationError::InvalidStopCondition),
        (_, Some(_)) => Err(ValidationError::InvalidStopCondition),
        (_, None) => Ok(None),
    }
}

fn validate_expiry(
    expire_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    calendar: &dyn BusinessDayCalendar,
) -> Result<(), ValidationError> {
    let Some(expire_at) = expire_at else {
        return Ok(());
    };
    if expire_at <= now {
        return Err(ValidationError::InvalidExpiry);
    }
    if !calendar.is_business_day(expire_at.date_naive()) {
        return Err(ValidationError::InvalidExpiry);
    }
    Ok(())
}

/// External view of one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub code: OrderCode,
    pub kind: OrderKind,
    pub symbol: SymbolCode,
    pub side: Side,
    pub condition: ExecutionCondition,
    pub status: OrderStatus,
    pub order_quantity: Quantity,
    pub contracted_quantity: Quantity,
    pub canceled_quantity: Quantity,
    pub limit_price: Option<Price>,
    pub expire_at: Option<DateTime<Utc>>,
    /// Stop trigger activation instant; present only once the trigger has
    /// fired against a fresh current price
    pub activated_at: Option<DateTime<Utc>>,
    pub message: String,
    pub contracts: Vec<Contract>,
    pub ordered_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            code: order.code,
            kind: order.kind,
            symbol: order.symbol.clone(),
            side: order.side,
            condition: order.condition,
            status: order.status,
            order_quantity: order.order_quantity,
            contracted_quantity: order.contracted_quantity,
            canceled_quantity: order.canceled_quantity,
            limit_price: order.limit_price,
            expire_at: order.expire_at,
            activated_at: order
                .stop
                .as_ref()
                .filter(|stop| stop.activated)
                .and_then(|stop| stop.activated_at),
            message: order.message.clone(),
            contracts: order.contracts.clone(),
            ordered_at: order.ordered_at,
            canceled_at: order.canceled_at,
        }
    }
}

/// External view of one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub code: PositionCode,
    pub order_code: OrderCode,
    pub kind: OrderKind,
    pub symbol: SymbolCode,
    pub side: Side,
    pub price: Price,
    pub owned_quantity: Quantity,
    pub held_quantity: Quantity,
    pub orderable_quantity: Quantity,
    pub contracted_at: DateTime<Utc>,
}

impl From<&Position> for PositionSummary {
    fn from(position: &Position) -> Self {
        Self {
            code: position.code,
            order_code: position.order_code,
            kind: position.kind,
            symbol: position.symbol.clone(),
            side: position.side,
            price: position.price,
            owned_quantity: position.owned_quantity,
            held_quantity: position.held_quantity,
            orderable_quantity: position.orderable_quantity(),
            contracted_at: position.contracted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekdayCalendar;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        // A Friday
        Utc.with_ymd_and_hms(2024, 2, 16, 9, 30, 0).unwrap()
    }

    fn tick_request() -> RegisterPriceRequest {
        RegisterPriceRequest {
            exchange: Some(ExchangeKind::Stock),
            symbol: "1320".to_string(),
            current_price: Some(Price::from_u64(1000)),
            current_price_at: Some(now()),
            bid: Some(Price::from_u64(999)),
            bid_at: Some(now()),
            ask: Some(Price::from_u64(1001)),
            ask_at: Some(now()),
        }
    }

    fn stock_request() -> StockOrderRequest {
        StockOrderRequest {
            symbol: "1320".to_string(),
            exchange: Some(ExchangeKind::Stock),
            side: Some(Side::Buy),
            condition: Some(ExecutionCondition::Market),
            quantity: Some(Quantity::from_u64(100)),
            ..Default::default()
        }
    }

    #[test]
    fn test_tick_request_validates() {
        let tick = tick_request().validate().unwrap();
        assert_eq!(tick.symbol, SymbolCode::new("1320"));
        assert_eq!(tick.at, now());
    }

    #[test]
    fn test_tick_request_missing_exchange() {
        let mut request = tick_request();
        request.exchange = None;
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::InvalidExchange
        );
    }

    #[test]
    fn test_tick_request_all_timestamps_absent() {
        let request = RegisterPriceRequest {
            exchange: Some(ExchangeKind::Stock),
            symbol: "1320".to_string(),
            current_price: Some(Price::from_u64(1000)),
            ..Default::default()
        };
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::InvalidPriceTimes
        );
    }

    #[test]
    fn test_stock_request_validates() {
        let order = stock_request().validate(now(), &WeekdayCalendar).unwrap();
        assert_eq!(order.status, OrderStatus::InOrder);
        assert_eq!(order.kind, OrderKind::Stock);
    }

    #[test]
    fn test_stock_request_missing_side() {
        let mut request = stock_request();
        request.side = None;
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidSide
        );
    }

    #[test]
    fn test_stock_request_zero_quantity() {
        let mut request = stock_request();
        request.quantity = Some(Quantity::zero());
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidQuantity
        );
    }

    #[test]
    fn test_limit_condition_requires_limit_price() {
        let mut request = stock_request();
        request.condition = Some(ExecutionCondition::Limit);
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidLimitPrice
        );
    }

    #[test]
    fn test_market_condition_rejects_limit_price() {
        let mut request = stock_request();
        request.limit_price = Some(Price::from_u64(1000));
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidLimitPrice
        );
    }

    #[test]
    fn test_stop_condition_required_for_stop_orders() {
        let mut request = stock_request();
        request.condition = Some(ExecutionCondition::Stop);
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidStopCondition
        );
    }

    #[test]
    fn test_stop_order_validates() {
        let mut request = stock_request();
        request.condition = Some(ExecutionCondition::Stop);
        request.stop = Some(StopConditionRequest {
            trigger_price: Some(Price::from_u64(1100)),
            comparator: Some(StopComparator::PriceAtOrOver),
            condition_after_hit: Some(ExecutionCondition::Limit),
            limit_price_after_hit: Some(Price::from_u64(1105)),
        });
        let order = request.validate(now(), &WeekdayCalendar).unwrap();
        assert_eq!(order.status, OrderStatus::Wait);
    }

    #[test]
    fn test_stop_after_hit_cannot_be_stop() {
        let mut request = stock_request();
        request.condition = Some(ExecutionCondition::Stop);
        request.stop = Some(StopConditionRequest {
            trigger_price: Some(Price::from_u64(1100)),
            comparator: Some(StopComparator::PriceAtOrOver),
            condition_after_hit: Some(ExecutionCondition::Stop),
            limit_price_after_hit: None,
        });
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidStopCondition
        );
    }

    #[test]
    fn test_expiry_in_past_rejected() {
        let mut request = stock_request();
        request.expire_at = Some(now() - chrono::Duration::days(1));
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidExpiry
        );
    }

    #[test]
    fn test_expiry_on_weekend_rejected() {
        let mut request = stock_request();
        // 2024-02-17 is a Saturday
        request.expire_at = Some(Utc.with_ymd_and_hms(2024, 2, 17, 15, 0, 0).unwrap());
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidExpiry
        );
    }

    fn margin_exit_request(targets: Vec<ExitTargetRequest>) -> MarginOrderRequest {
        MarginOrderRequest {
            symbol: "1320".to_string(),
            exchange: Some(ExchangeKind::Stock),
            side: Some(Side::Sell),
            trade_type: Some(TradeType::Exit),
            condition: Some(ExecutionCondition::Market),
            quantity: Some(Quantity::from_u64(100)),
            exit_targets: targets,
            ..Default::default()
        }
    }

    #[test]
    fn test_margin_exit_requires_targets() {
        let request = margin_exit_request(Vec::new());
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidExitPositionList
        );
    }

    #[test]
    fn test_margin_exit_target_quantities_must_sum() {
        let request = margin_exit_request(vec![ExitTargetRequest {
            position_code: Some(PositionCode::new()),
            quantity: Some(Quantity::from_u64(60)),
        }]);
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidExitQuantity
        );
    }

    #[test]
    fn test_margin_exit_validates() {
        let request = margin_exit_request(vec![
            ExitTargetRequest {
                position_code: Some(PositionCode::new()),
                quantity: Some(Quantity::from_u64(60)),
            },
            ExitTargetRequest {
                position_code: Some(PositionCode::new()),
                quantity: Some(Quantity::from_u64(40)),
            },
        ]);
        let order = request.validate(now(), &WeekdayCalendar).unwrap();
        assert_eq!(order.trade_type, Some(TradeType::Exit));
        assert_eq!(order.exit_targets.len(), 2);
    }

    #[test]
    fn test_request_serialization_roundtrip() {
        let request = stock_request();
        let json = serde_json::to_string(&request).unwrap();
        let deserialized: StockOrderRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.symbol, request.symbol);
        assert_eq!(deserialized.side, request.side);
        assert_eq!(deserialized.quantity, request.quantity);
    }

    #[test]
    fn test_margin_entry_rejects_targets() {
        let mut request = margin_exit_request(vec![ExitTargetRequest {
            position_code: Some(PositionCode::new()),
            quantity: Some(Quantity::from_u64(100)),
        }]);
        request.trade_type = Some(TradeType::Entry);
        assert_eq!(
            request.validate(now(), &WeekdayCalendar).unwrap_err(),
            ValidationError::InvalidExitPositionList
        );
    }
}
