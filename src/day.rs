//! Day-key arithmetic for a day that starts at a configurable minute instead of midnight.
//!
//! A "day" runs from one boundary occurrence to the next. Instants are shifted
//! back by the boundary before taking their calendar date, so 01:30 with a 07:00
//! boundary still belongs to the previous day. All functions take local
//! wall-clock time (`NaiveDateTime`) and never fail: the boundary is normalized
//! into `[0, 1440)` before use.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration as StdDuration;

use crate::common::constants::MINUTES_PER_DAY;

/// Calendar date label for one boundary-to-boundary interval, formatted `YYYY-MM-DD`.
///
/// ISO formatting means lexical order equals chronological order, which the
/// daily log relies on for pruning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DayKey(String);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        DayKey(date.format("%Y-%m-%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the placeholder key of a state that has never been stamped.
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse back into a date; `None` for the unset key or foreign strings.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.0, "%Y-%m-%d").ok()
    }

    /// The key `days` calendar days earlier (negative moves forward).
    pub fn days_before(&self, days: i64) -> Option<DayKey> {
        self.date()
            .map(|d| DayKey::from_date(d - ChronoDuration::days(days)))
    }
}

impl From<String> for DayKey {
    fn from(value: String) -> Self {
        DayKey(value)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a boundary given in minutes into `[0, 1440)`.
pub fn normalize_boundary(boundary_minutes: i64) -> i64 {
    boundary_minutes.rem_euclid(MINUTES_PER_DAY)
}

/// The calendar date a given instant belongs to under the boundary.
pub fn day_date(instant: NaiveDateTime, boundary_minutes: i64) -> NaiveDate {
    let shift = ChronoDuration::minutes(normalize_boundary(boundary_minutes));
    (instant - shift).date()
}

/// Day key for `instant` with the day starting at `boundary_minutes`.
pub fn day_key(instant: NaiveDateTime, boundary_minutes: i64) -> DayKey {
    DayKey::from_date(day_date(instant, boundary_minutes))
}

/// Day key of the day before the one `instant` belongs to.
pub fn previous_day_key(instant: NaiveDateTime, boundary_minutes: i64) -> DayKey {
    DayKey::from_date(day_date(instant, boundary_minutes) - ChronoDuration::days(1))
}

/// The instant the day labelled `date` begins.
pub fn day_start(date: NaiveDate, boundary_minutes: i64) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + ChronoDuration::minutes(normalize_boundary(boundary_minutes))
}

/// Time left until the next boundary crossing.
///
/// If `instant` sits exactly on (or past) today's boundary occurrence, the
/// result points at tomorrow's, so the value is always strictly positive.
pub fn time_until_next_boundary(instant: NaiveDateTime, boundary_minutes: i64) -> StdDuration {
    let todays = day_start(instant.date(), boundary_minutes);
    let next = if instant >= todays {
        todays + ChronoDuration::days(1)
    } else {
        todays
    };
    (next - instant).to_std().unwrap_or(StdDuration::ZERO)
}
