//! Trading session time windows
//!
//! Named windows (continuous trading, close auctions) are half-open
//! `[from, to)` intervals over the 24h clock. Membership compares only the
//! time-of-day of an instant, ignoring the date, so the same table serves
//! every trading day. All times are exchange-local wall clock; callers keep
//! `now` in the same frame as the window table.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use types::snapshot::{ExchangeKind, Session};

/// Half-open `[from, to)` interval on the 24h clock
///
/// When `from >= to` the interval wraps past midnight and membership is
/// `t < to || t >= from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    from: NaiveTime,
    to: NaiveTime,
    wraps: bool,
}

impl TimeRange {
    /// Create a range; wrap-around is derived from `from >= to`
    pub fn new(from: NaiveTime, to: NaiveTime) -> Self {
        Self {
            from,
            to,
            wraps: from >= to,
        }
    }

    /// Membership test over a time-of-day
    ///
    /// `t == from` always matches, `t == to` never does.
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.wraps {
            t < self.to || t >= self.from
        } else {
            self.from <= t && t < self.to
        }
    }
}

/// Disjoint union of time ranges; membership is any-match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRanges(Vec<TimeRange>);

impl TimeRanges {
    pub fn new(ranges: Vec<TimeRange>) -> Self {
        Self(ranges)
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        self.0.iter().any(|range| range.contains(t))
    }
}

/// The four windows an execution condition can be eligible for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    MorningContinuous,
    MorningClose,
    AfternoonContinuous,
    AfternoonClose,
}

/// Session window table for one venue
///
/// The default is the Tokyo cash-equity day: continuous trading
/// 09:00–11:30 and 12:30–15:00, with five-second close auctions at the end
/// of each session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindows {
    pub morning_continuous: TimeRanges,
    pub morning_close: TimeRanges,
    pub afternoon_continuous: TimeRanges,
    pub afternoon_close: TimeRanges,
}

fn hms(hour: u32, min: u32, sec: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, min, sec).expect("valid literal time")
}

impl Default for SessionWindows {
    fn default() -> Self {
        Self {
            morning_continuous: TimeRanges::new(vec![TimeRange::new(hms(9, 0, 0), hms(11, 30, 0))]),
            morning_close: TimeRanges::new(vec![TimeRange::new(hms(11, 30, 0), hms(11, 30, 5))]),
            afternoon_continuous: TimeRanges::new(vec![TimeRange::new(
                hms(12, 30, 0),
                hms(15, 0, 0),
            )]),
            afternoon_close: TimeRanges::new(vec![TimeRange::new(hms(15, 0, 0), hms(15, 0, 5))]),
        }
    }
}

impl SessionWindows {
    /// The session half an instant falls in, if any
    ///
    /// A session includes its close auction, so 11:30:03 is still Morning.
    pub fn session_of(&self, now: DateTime<Utc>) -> Option<Session> {
        let t = now.time();
        if self.morning_continuous.contains(t) || self.morning_close.contains(t) {
            Some(Session::Morning)
        } else if self.afternoon_continuous.contains(t) || self.afternoon_close.contains(t) {
            Some(Session::Afternoon)
        } else {
            None
        }
    }

    /// The named window an instant falls in, if any
    pub fn window_of(&self, now: DateTime<Utc>) -> Option<Window> {
        let t = now.time();
        if self.morning_continuous.contains(t) {
            Some(Window::MorningContinuous)
        } else if self.morning_close.contains(t) {
            Some(Window::MorningClose)
        } else if self.afternoon_continuous.contains(t) {
            Some(Window::AfternoonContinuous)
        } else if self.afternoon_close.contains(t) {
            Some(Window::AfternoonClose)
        } else {
            None
        }
    }

    /// Whether the time-of-day falls in either close auction
    pub fn is_close_auction(&self, t: NaiveTime) -> bool {
        self.morning_close.contains(t) || self.afternoon_close.contains(t)
    }

    /// Whether the time-of-day falls in either continuous-trading window
    pub fn is_continuous(&self, t: NaiveTime) -> bool {
        self.morning_continuous.contains(t) || self.afternoon_continuous.contains(t)
    }
}

/// The business day an instant belongs to (truncated to midnight)
pub fn business_day_of(exchange: ExchangeKind, now: DateTime<Utc>) -> NaiveDate {
    match exchange {
        ExchangeKind::Stock => now.date_naive(),
        // TODO: derive the futures business day from the night-session
        // boundary once the futures window table is wired up.
        ExchangeKind::Future => now.date_naive(),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arbitrary_time() -> impl Strategy<Value = NaiveTime> {
        (0u32..24, 0u32..60, 0u32..60)
            .prop_map(|(h, m, s)| NaiveTime::from_hms_opt(h, m, s).unwrap())
    }

    proptest! {
        /// Wrap-around membership is exactly `t < to || t >= from`;
        /// non-wrapping membership is exactly `from <= t < to`.
        #[test]
        fn range_membership_matches_definition(
            from in arbitrary_time(),
            to in arbitrary_time(),
            t in arbitrary_time(),
        ) {
            let range = TimeRange::new(from, to);
            let expected = if from >= to {
                t < to || t >= from
            } else {
                from <= t && t < to
            };
            prop_assert_eq!(range.contains(t), expected);
        }

        /// Boundary semantics hold for every range: `from` in, `to` out.
        #[test]
        fn range_boundaries_hold(from in arbitrary_time(), to in arbitrary_time()) {
            let range = TimeRange::new(from, to);
            prop_assert!(range.contains(from));
            if from != to {
                prop_assert!(!range.contains(to));
            }
        }
    }
}
