//! Duration specs (`10m`, `30d`, `2days`, `1mo`) and `[now - d, now]` windows

use chrono::{DateTime, Months, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Days from `0000-01-01` to the Unix epoch
const DAYS_BEFORE_EPOCH: i64 = 719_528;

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s*(mo|m|days|day|d)$").expect("duration pattern is a valid regex")
});

/// Duration unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationUnit {
    Minutes,
    Days,
    /// Calendar months, not 30-day blocks
    Months,
}

impl DurationUnit {
    fn suffix(&self) -> &'static str {
        match self {
            DurationUnit::Minutes => "m",
            DurationUnit::Days => "d",
            DurationUnit::Months => "mo",
        }
    }

    fn millis_per_unit(&self) -> Option<i64> {
        match self {
            DurationUnit::Minutes => Some(60 * 1000),
            DurationUnit::Days => Some(24 * 60 * 60 * 1000),
            DurationUnit::Months => None,
        }
    }
}

/// A quantity of a unit, e.g. `30d`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DurationSpec {
    pub quantity: u32,
    pub unit: DurationUnit,
}

/// Inclusive time window `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Earliest instant with a four-digit RFC 3339 year, `0000-01-01T00:00:00Z`.
/// Window starts never go below it, so they stay valid on the wire.
pub fn earliest_instant() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH - TimeDelta::days(DAYS_BEFORE_EPOCH)
}

impl TimeWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

impl DurationSpec {
    pub fn new(quantity: u32, unit: DurationUnit) -> Self {
        Self { quantity, unit }
    }

    /// `now - self`. Months subtract calendar months; the other units are
    /// fixed millisecond arithmetic. Saturates at `earliest_instant()`.
    pub fn subtract_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = match self.unit.millis_per_unit() {
            Some(per_unit) => TimeDelta::try_milliseconds(per_unit * i64::from(self.quantity))
                .and_then(|delta| now.checked_sub_signed(delta)),
            None => now.checked_sub_months(Months::new(self.quantity)),
        };
        let earliest = earliest_instant();
        start.map_or(earliest, |start| start.max(earliest))
    }

    pub fn window(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow {
            start: self.subtract_from(now),
            end: now,
        }
    }
}

impl FromStr for DurationSpec {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = DURATION_PATTERN
            .captures(s.trim())
            .ok_or_else(|| QueryError::invalid_filter(format!("Invalid duration: '{}'", s)))?;

        let quantity = caps[1]
            .parse::<u32>()
            .map_err(|e| QueryError::invalid_filter(format!("Invalid duration '{}': {}", s, e)))?;
        let unit = match &caps[2] {
            "m" => DurationUnit::Minutes,
            "d" | "day" | "days" => DurationUnit::Days,
            "mo" => DurationUnit::Months,
            other => {
                return Err(QueryError::invalid_filter(format!(
                    "Invalid duration unit '{}'",
                    other
                )))
            }
        };

        Ok(Self { quantity, unit })
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.quantity, self.unit.suffix())
    }
}
