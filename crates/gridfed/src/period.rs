// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Calendar-aware time periods for grouping
//!
//! Periods are contiguous and gap-free: each one ends where the next starts,
//! the first starts at the requested start and the last is clipped to the
//! requested end. Year and month steps use calendar arithmetic; day and hour
//! steps are fixed durations.

use chrono::TimeDelta;
use std::fmt;
use std::str::FromStr;

use crate::calendar::CfDateTime;
use crate::error::{FederationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodUnit {
    Year,
    Month,
    Day,
    Hour,
}

impl PeriodUnit {
    fn suffix(self) -> char {
        match self {
            PeriodUnit::Year => 'Y',
            PeriodUnit::Month => 'M',
            PeriodUnit::Day => 'D',
            PeriodUnit::Hour => 'H',
        }
    }
}

/// Grouping step such as `10Y`, `1M`, `7D` or `6H`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupFrequency {
    count: u32,
    unit: PeriodUnit,
}

impl GroupFrequency {
    pub fn new(count: u32, unit: PeriodUnit) -> Result<Self> {
        if count == 0 {
            return Err(FederationError::UnsupportedFrequency {
                token: format!("0{}", unit.suffix()),
            });
        }
        Ok(Self { count, unit })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn unit(&self) -> PeriodUnit {
        self.unit
    }

    /// The `k`-th boundary after `origin`
    fn boundary(&self, origin: &CfDateTime, k: i64) -> Result<CfDateTime> {
        let steps = k
            .checked_mul(i64::from(self.count))
            .ok_or_else(|| FederationError::invalid_date("period boundary out of range"))?;
        match self.unit {
            PeriodUnit::Year => origin.add_years(steps),
            PeriodUnit::Month => origin.add_months(steps),
            PeriodUnit::Day => TimeDelta::try_days(steps)
                .ok_or_else(|| FederationError::invalid_date("period boundary out of range"))
                .and_then(|d| origin.checked_add(d)),
            PeriodUnit::Hour => TimeDelta::try_hours(steps)
                .ok_or_else(|| FederationError::invalid_date("period boundary out of range"))
                .and_then(|d| origin.checked_add(d)),
        }
    }
}

impl fmt::Display for GroupFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}

impl FromStr for GroupFrequency {
    type Err = FederationError;

    fn from_str(token: &str) -> Result<Self> {
        let unsupported = || FederationError::UnsupportedFrequency {
            token: token.to_string(),
        };
        let trimmed = token.trim();
        let suffix = trimmed.chars().last().ok_or_else(unsupported)?;
        let digits = &trimmed[..trimmed.len() - suffix.len_utf8()];
        let unit = match suffix {
            'Y' => PeriodUnit::Year,
            'M' => PeriodUnit::Month,
            'D' => PeriodUnit::Day,
            'H' => PeriodUnit::Hour,
            _ => return Err(unsupported()),
        };
        let count = if digits.is_empty() {
            1
        } else {
            digits.parse().map_err(|_| unsupported())?
        };
        Self::new(count, unit).map_err(|_| unsupported())
    }
}

/// Half-open window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriod {
    pub start: CfDateTime,
    pub end: CfDateTime,
}

impl TimePeriod {
    pub fn duration(&self) -> Result<TimeDelta> {
        self.end.signed_duration_since(&self.start)
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Lazily generated periods; see `plan_periods`
#[derive(Debug, Clone)]
pub struct Periods {
    origin: CfDateTime,
    end: CfDateTime,
    freq: GroupFrequency,
    current: CfDateTime,
    k: i64,
    done: bool,
}

impl Iterator for Periods {
    type Item = Result<TimePeriod>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.current >= self.end {
            self.done = true;
            return None;
        }
        self.k += 1;
        let next = match self.freq.boundary(&self.origin, self.k) {
            Ok(next) => next,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let period = TimePeriod {
            start: self.current,
            end: next.min(self.end),
        };
        self.current = next;
        Some(Ok(period))
    }
}

/// Periods covering `[start, end]` in steps of `freq`
///
/// Boundaries are `start + k * freq`, so a clamped month end (Jan 31 ->
/// Feb 29) does not shift later boundaries. `start >= end` yields nothing.
pub fn plan_periods(start: CfDateTime, end: CfDateTime, freq: GroupFrequency) -> Result<Periods> {
    if start.calendar() != end.calendar() {
        return Err(FederationError::CalendarMismatch {
            expected: start.calendar(),
            actual: end.calendar(),
        });
    }
    Ok(Periods {
        origin: start,
        end,
        freq,
        current: start,
        k: 0,
        done: false,
    })
}
