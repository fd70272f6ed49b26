//! Wall-clock time-of-day arithmetic.
//!
//! All scheduling times are naive local "HH:MM" values. There is no date or
//! timezone attached: adding minutes past midnight wraps back to `00:00`, so a
//! 30-minute slot starting at `23:30` ends at `00:00` on the same date string.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINUTES_PER_HOUR: u32 = 60;
pub const MINUTES_PER_DAY: u32 = 24 * MINUTES_PER_HOUR;

static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("time pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("Invalid time format '{0}', expected HH:MM")]
    Format(String),

    #[error("Time out of range: hour must be 0-23 and minute 0-59 (got {hour}:{minute:02})")]
    OutOfRange { hour: u32, minute: u32 },
}

/// A minute-resolution time of day in `[00:00, 23:59]`.
///
/// Ordering follows the clock, so `Ord::cmp` is the before/equal/after
/// comparison used by range and alignment checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { minutes: 0 };

    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeParseError> {
        if hour > 23 || minute > 59 {
            return Err(TimeParseError::OutOfRange { hour, minute });
        }
        Ok(Self {
            minutes: (hour * MINUTES_PER_HOUR + minute) as u16,
        })
    }

    /// Builds a time from minutes since midnight, wrapping at 24:00.
    pub fn from_minutes(minutes: u32) -> Self {
        Self {
            minutes: (minutes % MINUTES_PER_DAY) as u16,
        }
    }

    /// Parses `H:MM` or `HH:MM`.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let captures = TIME_PATTERN
            .captures(input)
            .ok_or_else(|| TimeParseError::Format(input.to_string()))?;

        let hour = captures[1]
            .parse::<u32>()
            .map_err(|_| TimeParseError::Format(input.to_string()))?;
        let minute = captures[2]
            .parse::<u32>()
            .map_err(|_| TimeParseError::Format(input.to_string()))?;

        Self::new(hour, minute)
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.minutes) / MINUTES_PER_HOUR
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.minutes) % MINUTES_PER_HOUR
    }

    pub fn to_minutes(&self) -> u32 {
        u32::from(self.minutes)
    }

    /// Adds (or subtracts) minutes, wrapping around midnight in both directions.
    pub fn add_minutes(&self, delta: i64) -> Self {
        let wrapped = (i64::from(self.minutes) + delta).rem_euclid(i64::from(MINUTES_PER_DAY));
        Self {
            minutes: wrapped as u16,
        }
    }

    /// Minutes since midnight after adding `delta`, without wrapping (may reach 1440 or more).
    pub fn add_minutes_unwrapped(&self, delta: u32) -> u32 {
        u32::from(self.minutes) + delta
    }

    /// Signed distance in minutes from `earlier` to `self`, without wrapping.
    pub fn minutes_since(&self, earlier: TimeOfDay) -> i64 {
        i64::from(self.minutes) - i64::from(earlier.minutes)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeParseError;

    // Postgres `time` columns come back as HH:MM:SS; whole-minute values are accepted.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.strip_suffix(":00") {
            Some(trimmed) if value.len() == 8 => Self::parse(trimmed),
            _ => Self::parse(&value),
        }
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}
