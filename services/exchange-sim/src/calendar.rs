//! Business-day calendar boundary
//!
//! The simulator only asks one question of the calendar: is a given date a
//! trading day? The default implementation treats every weekday as one;
//! deployments with an exchange holiday feed inject their own.

use chrono::{Datelike, NaiveDate, Weekday};

/// Calendar collaborator consulted during order validation
pub trait BusinessDayCalendar: Send + Sync {
    fn is_business_day(&self, date: NaiveDate) -> bool;
}

/// Monday-through-Friday calendar, no holidays
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekdayCalendar;

impl BusinessDayCalendar for WeekdayCalendar {
    fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
