//! ISO-8601 week anchoring for field records

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// ISO-8601 week number (1..=53) of a calendar date.
///
/// Weeks start on Monday and week 1 holds the year's first Thursday, so the
/// date is moved to the Thursday of its week and counted from January 1st
/// of that Thursday's year.
pub fn iso_week_number(date: NaiveDate) -> u32 {
    let weekday = i64::from(date.weekday().number_from_monday());
    match date.checked_add_signed(Duration::days(4 - weekday)) {
        Some(thursday) => thursday.ordinal0() / 7 + 1,
        None => date.iso_week().week(),
    }
}

/// Week attached to new records: follows the calendar until overridden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekState {
    pub value: i32,
    pub overridden: bool,
}

impl WeekState {
    /// Week of `today`, not overridden
    pub fn current(today: NaiveDate) -> Self {
        Self {
            value: iso_week_number(today) as i32,
            overridden: false,
        }
    }

    /// Manual edit; no range check, the value sticks until [`reset`](Self::reset)
    pub fn set_override(&mut self, value: i32) {
        self.value = value;
        self.overridden = true;
    }

    /// Drop any override and recompute from `today`
    pub fn reset(&mut self, today: NaiveDate) {
        *self = Self::current(today);
    }
}
