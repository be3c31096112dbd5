//! Contract confirmation engine
//!
//! A stateless rule set answering one question: would this order have
//! executed against this price snapshot at this instant, and at what price?
//! Failing to match is the common case and is a value (`None`), never an
//! error.
//!
//! Dispatch is a two-step table: a static per-condition eligibility set over
//! the four session windows, then the pricing regime selected by the
//! snapshot kind (itayose for opening/closing ticks, continuous for regular
//! ticks).

mod continuous;
mod itayose;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use types::numeric::Price;
use types::order::{ExecutionCondition, Side};
use types::snapshot::{PriceSnapshot, SnapshotKind};

use crate::session::{SessionWindows, Window};

/// A positive match decision
///
/// Transient: produced by the engine, consumed immediately by the
/// orchestration layer, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub price: Price,
    pub confirmed_at: DateTime<Utc>,
}

/// The confirmation engine: session window table plus the dispatch rules
#[derive(Debug, Clone, Default)]
pub struct ConfirmationEngine {
    windows: SessionWindows,
}

/// Which windows each execution condition may match in
fn eligible_windows(condition: ExecutionCondition) -> &'static [Window] {
    const ALL: &[Window] = &[
        Window::MorningContinuous,
        Window::MorningClose,
        Window::AfternoonContinuous,
        Window::AfternoonClose,
    ];
    match condition {
        ExecutionCondition::Market
        | ExecutionCondition::IocMarket
        | ExecutionCondition::Limit
        | ExecutionCondition::IocLimit
        | ExecutionCondition::FunariMorning
        | ExecutionCondition::FunariAfternoon
        | ExecutionCondition::Stop => ALL,
        ExecutionCondition::MarketOnMorningOpen | ExecutionCondition::LimitOnMorningOpen => {
            &[Window::MorningContinuous]
        }
        ExecutionCondition::MarketOnAfternoonOpen | ExecutionCondition::LimitOnAfternoonOpen => {
            &[Window::AfternoonContinuous]
        }
        ExecutionCondition::MarketOnMorningClose | ExecutionCondition::LimitOnMorningClose => {
            &[Window::MorningClose]
        }
        ExecutionCondition::MarketOnAfternoonClose | ExecutionCondition::LimitOnAfternoonClose => {
            &[Window::AfternoonClose]
        }
    }
}

impl ConfirmationEngine {
    pub fn new(windows: SessionWindows) -> Self {
        Self { windows }
    }

    /// Decide whether an order would have executed against a snapshot
    ///
    /// `limit_price` and `condition` are the order's *effective* terms (a
    /// triggered stop order is matched under its post-hit condition; an
    /// untriggered one never reaches the engine). `already_confirmed` is
    /// whether the order has been offered a tick before this one.
    ///
    /// Pure: identical inputs yield identical decisions.
    pub fn confirm(
        &self,
        condition: ExecutionCondition,
        side: Side,
        limit_price: Option<Price>,
        already_confirmed: bool,
        snapshot: Option<&PriceSnapshot>,
        now: DateTime<Utc>,
    ) -> Option<Confirmation> {
        let snapshot = snapshot?;
        let window = self.windows.window_of(now)?;
        if !eligible_windows(condition).contains(&window) {
            return None;
        }

        match condition {
            ExecutionCondition::Market => self.market_by_kind(side, snapshot, now),

            ExecutionCondition::IocMarket => {
                if already_confirmed {
                    return None;
                }
                self.market_by_kind(side, snapshot, now)
            }

            ExecutionCondition::MarketOnMorningOpen
            | ExecutionCondition::MarketOnAfternoonOpen => {
                if already_confirmed || !snapshot.kind.is_opening() {
                    return None;
                }
                itayose::market(side, snapshot, now)
            }

            ExecutionCondition::MarketOnMorningClose
            | ExecutionCondition::MarketOnAfternoonClose => {
                if already_confirmed || !snapshot.kind.is_closing() {
                    return None;
                }
                itayose::market(side, snapshot, now)
            }

            ExecutionCondition::Limit => {
                self.limit_by_kind(side, limit_price?, already_confirmed, snapshot, now)
            }

            ExecutionCondition::IocLimit => {
                if already_confirmed {
                    return None;
                }
                self.limit_by_kind(side, limit_price?, already_confirmed, snapshot, now)
            }

            ExecutionCondition::LimitOnMorningOpen
            | ExecutionCondition::LimitOnAfternoonOpen => {
                if already_confirmed || !snapshot.kind.is_opening() {
                    return None;
                }
                itayose::limit(side, limit_price?, snapshot, now)
            }

            ExecutionCondition::LimitOnMorningClose
            | ExecutionCondition::LimitOnAfternoonClose => {
                if already_confirmed || !snapshot.kind.is_closing() {
                    return None;
                }
                itayose::limit(side, limit_price?, snapshot, now)
            }

            ExecutionCondition::FunariMorning => {
                if window == Window::MorningClose && snapshot.kind.is_closing() {
                    return itayose::market(side, snapshot, now);
                }
                self.limit_by_kind(side, limit_price?, already_confirmed, snapshot, now)
            }

            ExecutionCondition::FunariAfternoon => {
                if window == Window::AfternoonClose && snapshot.kind.is_closing() {
                    return itayose::market(side, snapshot, now);
                }
                self.limit_by_kind(side, limit_price?, already_confirmed, snapshot, now)
            }

            // A stop order is resolved to its post-trigger condition before
            // it reaches the engine; the declared condition never matches.
            ExecutionCondition::Stop => None,
        }
    }

    fn market_by_kind(
        &self,
        side: Side,
        snapshot: &PriceSnapshot,
        now: DateTime<Utc>,
    ) -> Option<Confirmation> {
        match snapshot.kind {
            SnapshotKind::Opening | SnapshotKind::Closing | SnapshotKind::OpeningAndClosing => {
                itayose::market(side, snapshot, now)
            }
            SnapshotKind::Regular => continuous::market(side, snapshot, now),
            SnapshotKind::Unspecified => None,
        }
    }

    fn limit_by_kind(
        &self,
        side: Side,
        limit_price: Price,
        already_confirmed: bool,
        snapshot: &PriceSnapshot,
        now: DateTime<Utc>,
    ) -> Option<Confirmation> {
        match snapshot.kind {
            SnapshotKind::Opening | SnapshotKind::Closing | SnapshotKind::OpeningAndClosing => {
                itayose::limit(side, limit_price, snapshot, now)
            }
            SnapshotKind::Regular => {
                continuous::limit(side, limit_price, already_confirmed, snapshot, now)
            }
            SnapshotKind::Unspecified => None,
        }
    }
}
