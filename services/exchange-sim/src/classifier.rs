//! Price snapshot classification
//!
//! Labels each validated tick relative to the session around it: the first
//! tick of a business day or session opens it, a tick inside a close
//! auction closes it, and a tick in continuous trading is regular. The
//! labels drive which pricing regime the confirmation engine applies.

use tracing::debug;
use types::snapshot::{PriceSnapshot, SnapshotKind};

use crate::models::PriceTick;
use crate::session::{business_day_of, SessionWindows};

/// Classify a tick against the previously stored snapshot for its symbol
///
/// Opening is decided first (no previous snapshot, or the business day or
/// session changed). Independently, a close-auction tick is Closing
/// (OpeningAndClosing when it also opens), and a continuous-trading tick is
/// Regular unless it opens. Outside all windows the opening verdict stands,
/// possibly leaving the kind unspecified.
pub fn classify(
    tick: &PriceTick,
    previous: Option<&PriceSnapshot>,
    windows: &SessionWindows,
) -> PriceSnapshot {
    let business_day = business_day_of(tick.exchange, tick.at);
    let session = windows.session_of(tick.at);

    let opening = match previous {
        None => true,
        Some(prev) => prev.business_day != business_day || prev.session != session,
    };

    let mut kind = if opening {
        SnapshotKind::Opening
    } else {
        SnapshotKind::Unspecified
    };

    let time_of_day = tick.at.time();
    if windows.is_close_auction(time_of_day) {
        kind = if opening {
            SnapshotKind::OpeningAndClosing
        } else {
            SnapshotKind::Closing
        };
    } else if windows.is_continuous(time_of_day) && !opening {
        kind = SnapshotKind::Regular;
    }

    debug!(
        symbol = %tick.symbol,
        kind = ?kind,
        session = ?session,
        "classified price tick"
    );

    PriceSnapshot {
        symbol: tick.symbol.clone(),
        exchange: tick.exchange,
        current_price: tick.current_price,
        current_price_at: tick.current_price_at,
        bid: tick.bid,
        bid_at: tick.bid_at,
        ask: tick.ask,
        ask_at: tick.ask_at,
        kind,
        session,
        business_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use types::ids::SymbolCode;
    use types::numeric::Price;
    use types::snapshot::ExchangeKind;

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 16, hour, min, sec).unwrap()
    }

    fn tick(time: DateTime<Utc>) -> PriceTick {
        PriceTick {
            symbol: SymbolCode::new("1320"),
            exchange: ExchangeKind::Stock,
            current_price: Some(Price::from_u64(1000)),
            current_price_at: Some(time),
            bid: Some(Price::from_u64(999)),
            bid_at: Some(time),
            ask: Some(Price::from_u64(1001)),
            ask_at: Some(time),
            at: time,
        }
    }

    #[test]
    fn test_first_tick_is_opening() {
        let windows = SessionWindows::default();
        let snapshot = classify(&tick(at(9, 0, 1)), None, &windows);
        assert_eq!(snapshot.kind, SnapshotKind::Opening);
    }

    #[test]
    fn test_second_tick_same_session_is_regular() {
        let windows = SessionWindows::default();
        let first = classify(&tick(at(9, 0, 1)), None, &windows);
        let second = classify(&tick(at(9, 0, 2)), Some(&first), &windows);
        assert_eq!(second.kind, SnapshotKind::Regular);
    }

    #[test]
    fn test_session_change_reopens() {
        let windows = SessionWindows::default();
        let morning = classify(&tick(at(10, 0, 0)), None, &windows);
        let afternoon = classify(&tick(at(12, 30, 0)), Some(&morning), &windows);
        assert_eq!(afternoon.kind, SnapshotKind::Opening);
        assert_eq!(afternoon.session, Some(types::snapshot::Session::Afternoon));
    }

    #[test]
    fn test_business_day_change_reopens() {
        let windows = SessionWindows::default();
        let friday = classify(&tick(at(10, 0, 0)), None, &windows);
        let monday_time = Utc.with_ymd_and_hms(2024, 2, 19, 10, 0, 0).unwrap();
        let monday = classify(&tick(monday_time), Some(&friday), &windows);
        assert_eq!(monday.kind, SnapshotKind::Opening);
    }

    #[test]
    fn test_close_auction_tick_is_closing() {
        let windows = SessionWindows::default();
        let regular = classify(&tick(at(10, 0, 0)), None, &windows);
        let closing = classify(&tick(at(11, 30, 2)), Some(&regular), &windows);
        assert_eq!(closing.kind, SnapshotKind::Closing);
    }

    #[test]
    fn test_opening_inside_close_auction() {
        // First tick of the session landing straight in the close auction
        let windows = SessionWindows::default();
        let snapshot = classify(&tick(at(15, 0, 1)), None, &windows);
        assert_eq!(snapshot.kind, SnapshotKind::OpeningAndClosing);
    }

    #[test]
    fn test_tick_outside_windows_keeps_opening_verdict() {
        let windows = SessionWindows::default();
        let lunch_open = classify(&tick(at(12, 0, 0)), None, &windows);
        assert_eq!(lunch_open.kind, SnapshotKind::Opening);

        let lunch_follow = classify(&tick(at(12, 1, 0)), Some(&lunch_open), &windows);
        assert_eq!(lunch_follow.kind, SnapshotKind::Unspecified);
    }

    #[test]
    fn test_lunch_break_session_is_none_then_afternoon_opens() {
        let windows = SessionWindows::default();
        let morning = classify(&tick(at(11, 0, 0)), None, &windows);
        // During lunch the session is None, which itself differs from Morning
        let lunch = classify(&tick(at(12, 0, 0)), Some(&morning), &windows);
        assert_eq!(lunch.kind, SnapshotKind::Opening);
        assert_eq!(lunch.session, None);
    }
}
