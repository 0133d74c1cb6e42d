//! Weekly opening schedules with dated exceptions.
//!
//! Schedules are stored as JSON next to each place and evaluated in the
//! place's own IANA timezone, so "open now" does not depend on where the
//! device happens to be.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MINUTES_PER_HOUR: u16 = 60;
const MINUTES_PER_DAY: u16 = 24 * MINUTES_PER_HOUR;

wire_enum! {
    /// Day of the week as keyed in opening-hours payloads.
    pub enum Weekday: "weekday" {
        /// Monday.
        Mon => "mon",
        /// Tuesday.
        Tue => "tue",
        /// Wednesday.
        Wed => "wed",
        /// Thursday.
        Thu => "thu",
        /// Friday.
        Fri => "fri",
        /// Saturday.
        Sat => "sat",
        /// Sunday.
        Sun => "sun",
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Self::Mon,
            chrono::Weekday::Tue => Self::Tue,
            chrono::Weekday::Wed => Self::Wed,
            chrono::Weekday::Thu => Self::Thu,
            chrono::Weekday::Fri => Self::Fri,
            chrono::Weekday::Sat => Self::Sat,
            chrono::Weekday::Sun => Self::Sun,
        }
    }
}

/// Errors raised while parsing or evaluating opening hours.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpeningHoursError {
    /// A wall-clock time was not in `HH:MM` form.
    #[error("invalid time of day '{value}'; expected HH:MM between 00:00 and 24:00")]
    InvalidTime {
        /// Offending text.
        value: String,
    },
    /// The schedule named a timezone unknown to the tz database.
    #[error("unknown timezone '{timezone}'")]
    UnknownTimezone {
        /// Timezone identifier from the schedule.
        timezone: String,
    },
}

/// Minutes after local midnight, `00:00` through `24:00` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    /// Build a time from hours and minutes.
    ///
    /// # Errors
    /// Returns [`OpeningHoursError::InvalidTime`] for values past `24:00`.
    pub fn new(hours: u16, minutes: u16) -> Result<Self, OpeningHoursError> {
        let total = hours
            .checked_mul(MINUTES_PER_HOUR)
            .and_then(|h| h.checked_add(minutes));
        match total {
            Some(value) if minutes < MINUTES_PER_HOUR && value <= MINUTES_PER_DAY => Ok(Self(value)),
            _ => Err(OpeningHoursError::InvalidTime {
                value: format!("{hours:02}:{minutes:02}"),
            }),
        }
    }

    /// Minutes after midnight.
    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = OpeningHoursError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || OpeningHoursError::InvalidTime {
            value: value.to_owned(),
        };
        let (hours, minutes) = value.split_once(':').ok_or_else(invalid)?;
        if hours.len() != 2 || minutes.len() != 2 {
            return Err(invalid());
        }
        let h = hours.parse::<u16>().map_err(|_| invalid())?;
        let m = minutes.parse::<u16>().map_err(|_| invalid())?;
        Self::new(h, m).map_err(|_| invalid())
    }
}

impl TryFrom<String> for ClockTime {
    type Error = OpeningHoursError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for ClockTime {
    #[expect(
        clippy::integer_division,
        clippy::integer_division_remainder_used,
        reason = "splitting minutes into whole hours and the remainder is intended"
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hours, minutes) = (self.0 / MINUTES_PER_HOUR, self.0 % MINUTES_PER_HOUR);
        write!(f, "{hours:02}:{minutes:02}")
    }
}

/// A half-open `[start, end)` opening interval.
///
/// An `end` earlier than `start` describes a range that runs past midnight
/// into the following day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Opening time.
    pub start: ClockTime,
    /// Closing time.
    pub end: ClockTime,
}

impl TimeRange {
    fn covers_same_day(self, minute: u16) -> bool {
        if self.start < self.end {
            self.start.minutes() <= minute && minute < self.end.minutes()
        } else if self.start > self.end {
            minute >= self.start.minutes()
        } else {
            false
        }
    }

    fn covers_after_midnight(self, minute: u16) -> bool {
        self.start > self.end && minute < self.end.minutes()
    }
}

/// A date whose hours differ from the weekly schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursException {
    /// Local calendar date the exception applies to.
    pub date: NaiveDate,
    /// Closed for the whole day.
    #[serde(default)]
    pub closed: bool,
    /// Replacement ranges; empty means the weekly schedule still applies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<TimeRange>,
    /// Free-form note shown to the visitor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Weekly schedule plus dated exceptions for a place.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use compass_core::OpeningHours;
///
/// let hours: OpeningHours = serde_json::from_str(
///     r#"{"timezone":"Africa/Casablanca","weekly":{"mon":[{"start":"09:00","end":"18:00"}]}}"#,
/// )
/// .expect("valid schedule");
/// // 2026-06-01 is a Monday; 09:30 UTC is 10:30 in Marrakech.
/// let monday_morning = Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap();
/// assert_eq!(hours.is_open_at(monday_morning), Ok(true));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    /// IANA timezone the ranges are expressed in.
    pub timezone: String,
    /// Regular ranges per weekday; missing days are closed.
    #[serde(default)]
    pub weekly: BTreeMap<Weekday, Vec<TimeRange>>,
    /// Free-form note shown to the visitor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Dated overrides of the weekly schedule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<HoursException>,
}

impl OpeningHours {
    /// Whether the place is open at `instant`.
    ///
    /// Ranges that cross midnight are honoured from the previous day's
    /// schedule, including when that day is overridden by an exception.
    ///
    /// # Errors
    /// Returns [`OpeningHoursError::UnknownTimezone`] when the schedule names a
    /// timezone the tz database does not know.
    pub fn is_open_at(&self, instant: DateTime<Utc>) -> Result<bool, OpeningHoursError> {
        let tz = Tz::from_str(&self.timezone).map_err(|_| OpeningHoursError::UnknownTimezone {
            timezone: self.timezone.clone(),
        })?;
        let local = instant.with_timezone(&tz);
        let minute = u16::try_from(local.hour() * 60 + local.minute()).unwrap_or(MINUTES_PER_DAY);
        let today = local.date_naive();

        if self.ranges_on(today).iter().any(|r| r.covers_same_day(minute)) {
            return Ok(true);
        }
        Ok(today.pred_opt().is_some_and(|yesterday| {
            self.ranges_on(yesterday)
                .iter()
                .any(|r| r.covers_after_midnight(minute))
        }))
    }

    /// Ranges in force on `date`, after applying exceptions.
    #[must_use]
    pub fn ranges_on(&self, date: NaiveDate) -> &[TimeRange] {
        match self.exceptions.iter().find(|e| e.date == date) {
            Some(exception) if exception.closed => &[],
            Some(exception) if !exception.ranges.is_empty() => &exception.ranges,
            _ => self
                .weekly
                .get(&Weekday::from(date.weekday()))
                .map_or(&[], Vec::as_slice),
        }
    }
}
