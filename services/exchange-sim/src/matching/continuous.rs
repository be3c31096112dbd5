//! Continuous-trading pricing rules
//!
//! Used for regular intraday ticks. Only the standing quote participates;
//! the last-traded price is never consulted.

use chrono::{DateTime, Utc};
use types::numeric::Price;
use types::order::Side;
use types::snapshot::PriceSnapshot;

use super::Confirmation;

/// Market order against the standing quote
pub(crate) fn market(
    side: Side,
    snapshot: &PriceSnapshot,
    now: DateTime<Utc>,
) -> Option<Confirmation> {
    snapshot.quote_for(side).map(|price| Confirmation {
        price,
        confirmed_at: now,
    })
}

/// Limit order against the standing quote
///
/// The quote must strictly cross the limit (`buy: limit > ask`,
/// `sell: limit < bid`). On the order's first confirmation check the fill
/// price is the quote — the order crossed the spread at list time and takes
/// the better book price; on later checks it fills at its own limit.
pub(crate) fn limit(
    side: Side,
    limit_price: Price,
    already_confirmed: bool,
    snapshot: &PriceSnapshot,
    now: DateTime<Utc>,
) -> Option<Confirmation> {
    let quote = snapshot.quote_for(side)?;
    let crosses = match side {
        Side::Buy => limit_price > quote,
        Side::Sell => limit_price < quote,
    };
    if !crosses {
        return None;
    }
    let price = if already_confirmed { limit_price } else { quote };
    Some(Confirmation {
        price,
        confirmed_at: now,
    })
}
