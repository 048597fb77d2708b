//! Monday-aligned week keys.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of a Monday-aligned 7-day span.
///
/// Always holds a Monday; the only constructor is [`WeekKey::containing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct WeekKey(NaiveDate);

impl WeekKey {
    /// The week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let back = u64::from(date.weekday().num_days_from_monday());
        Self(date.checked_sub_days(Days::new(back)).unwrap_or(date))
    }

    /// The Monday this week starts on.
    pub fn start_date(self) -> NaiveDate {
        self.0
    }

    /// The date of ISO weekday `weekday` (1 = Monday) in this week.
    pub fn date_of(self, weekday: i32) -> Option<NaiveDate> {
        let offset = u64::try_from(weekday.checked_sub(1)?).ok()?;
        if offset > 6 {
            return None;
        }
        self.0.checked_add_days(Days::new(offset))
    }

    pub fn previous(self) -> Self {
        self.offset(-1)
    }

    pub fn next(self) -> Self {
        self.offset(1)
    }

    /// Shift by `weeks` whole weeks (negative goes back).
    pub fn offset(self, weeks: i64) -> Self {
        let days = Days::new(weeks.unsigned_abs() * 7);
        let shifted = if weeks >= 0 {
            self.0.checked_add_days(days)
        } else {
            self.0.checked_sub_days(days)
        };
        Self(shifted.unwrap_or(self.0))
    }

    /// Whole weeks from `self` to `other` (positive when `other` is later).
    pub fn weeks_until(self, other: WeekKey) -> i64 {
        (other.0 - self.0).num_days() / 7
    }

    pub fn is_current(self, today: NaiveDate) -> bool {
        self == Self::containing(today)
    }
}

impl From<WeekKey> for NaiveDate {
    fn from(key: WeekKey) -> Self {
        key.0
    }
}

impl TryFrom<NaiveDate> for WeekKey {
    type Error = String;

    fn try_from(date: NaiveDate) -> Result<Self, Self::Error> {
        let key = Self::containing(date);
        if key.0 == date {
            Ok(key)
        } else {
            Err(format!("{date} is not a Monday"))
        }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Parses `YYYY-MM-DD`; any date is accepted and snapped to its Monday.
impl FromStr for WeekKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
        Ok(Self::containing(date))
    }
}

/// Check that `weekday` is an ISO weekday (1 = Monday .. 7 = Sunday).
pub fn validate_weekday(weekday: i32) -> Result<i32, ValidationError> {
    if (1..=7).contains(&weekday) {
        Ok(weekday)
    } else {
        Err(ValidationError::Weekday(weekday))
    }
}

/// Check that a session index within a day is at least 1.
pub fn validate_order_in_day(order_in_day: i32) -> Result<i32, ValidationError> {
    if order_in_day >= 1 {
        Ok(order_in_day)
    } else {
        Err(ValidationError::OrderInDay(order_in_day))
    }
}
