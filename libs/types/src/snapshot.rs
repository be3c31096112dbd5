//! Classified price snapshots
//!
//! A snapshot is one symbol's latest known current price, best bid, and best
//! ask, labeled by the classifier with the session and business day it
//! belongs to and a kind (opening / regular / closing). Snapshots are owned
//! by the price store; the confirmation engine only reads them.

use crate::ids::SymbolCode;
use crate::numeric::Price;
use crate::order::Side;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A current price older than this is ignored by itayose pricing and by
/// stop-trigger activation. The boundary is exclusive: exactly 5 seconds
/// old is stale.
const FRESHNESS_SECONDS: i64 = 5;

/// Venue / instrument class a symbol trades on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExchangeKind {
    /// Cash equities
    Stock,
    /// Index futures (session table not yet wired up)
    Future,
}

/// Trading session half
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Session {
    Morning,
    Afternoon,
}

/// How a tick relates to the session around it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotKind {
    /// Outside every known window, and not a session opener
    Unspecified,
    /// First tick of a session or business day
    Opening,
    /// Continuous-trading tick
    Regular,
    /// Close-auction tick
    Closing,
    /// First tick of a session that is also a close-auction tick
    OpeningAndClosing,
}

impl SnapshotKind {
    /// True for opening and opening-and-closing ticks
    pub fn is_opening(&self) -> bool {
        matches!(self, SnapshotKind::Opening | SnapshotKind::OpeningAndClosing)
    }

    /// True for closing and opening-and-closing ticks
    pub fn is_closing(&self) -> bool {
        matches!(self, SnapshotKind::Closing | SnapshotKind::OpeningAndClosing)
    }

    /// True when itayose (auction) pricing applies
    pub fn is_auction(&self) -> bool {
        self.is_opening() || self.is_closing()
    }
}

/// One symbol's latest classified prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub symbol: SymbolCode,
    pub exchange: ExchangeKind,

    /// Last traded price, if one has printed
    pub current_price: Option<Price>,
    pub current_price_at: Option<DateTime<Utc>>,

    /// Best bid
    pub bid: Option<Price>,
    pub bid_at: Option<DateTime<Utc>>,

    /// Best ask
    pub ask: Option<Price>,
    pub ask_at: Option<DateTime<Utc>>,

    pub kind: SnapshotKind,
    pub session: Option<Session>,
    pub business_day: NaiveDate,
}

impl PriceSnapshot {
    /// The current price, if present and printed less than five seconds
    /// before `now`
    pub fn fresh_current_price(&self, now: DateTime<Utc>) -> Option<Price> {
        let price = self.current_price?;
        let at = self.current_price_at?;
        if now - at < Duration::seconds(FRESHNESS_SECONDS) {
            Some(price)
        } else {
            None
        }
    }

    /// The standing quote an order of `side` would trade against
    /// (buys lift the ask, sells hit the bid)
    pub fn quote_for(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }
}
