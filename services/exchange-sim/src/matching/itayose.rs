//! Itayose (auction) pricing rules
//!
//! Used when the snapshot is an opening or closing tick. A fresh last-traded
//! price is authoritative; without one the standing quote on the order's
//! opposite side decides.

use chrono::{DateTime, Utc};
use types::numeric::Price;
use types::order::Side;
use types::snapshot::PriceSnapshot;

use super::Confirmation;

/// The price an auction would discover for this order
///
/// The current price wins only while fresh (strictly under five seconds
/// old); otherwise buys look at the ask and sells at the bid.
pub(crate) fn discovered_price(
    side: Side,
    snapshot: &PriceSnapshot,
    now: DateTime<Utc>,
) -> Option<Price> {
    snapshot
        .fresh_current_price(now)
        .or_else(|| snapshot.quote_for(side))
}

/// Market order under auction pricing: matches at any discovered price
pub(crate) fn market(
    side: Side,
    snapshot: &PriceSnapshot,
    now: DateTime<Utc>,
) -> Option<Confirmation> {
    discovered_price(side, snapshot, now).map(|price| Confirmation {
        price,
        confirmed_at: now,
    })
}

/// Limit order under auction pricing: matches at the discovered price when
/// the limit satisfies it (`buy: limit >= price`, `sell: limit <= price`)
pub(crate) fn limit(
    side: Side,
    limit_price: Price,
    snapshot: &PriceSnapshot,
    now: DateTime<Utc>,
) -> Option<Confirmation> {
    let price = discovered_price(side, snapshot, now)?;
    let satisfied = match side {
        Side::Buy => limit_price >= price,
        Side::Sell => limit_price <= price,
    };
    satisfied.then_some(Confirmation {
        price,
        confirmed_at: now,
    })
}
