// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! CF calendars and calendar-aware timestamps
//!
//! `CfDateTime` carries its calendar, so every comparison and every piece of
//! arithmetic knows whether February has 28, 29 or 30 days. Gregorian dates
//! go through chrono; the fixed-length calendars (noleap, all_leap, 360_day)
//! and the Julian calendar count days directly.
//!
//! `standard`/`gregorian` is treated as proleptic Gregorian. Dates before the
//! 1582 reform therefore differ from the mixed Julian/Gregorian calendar.

use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{FederationError, Result};

pub const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Calendar {
    #[serde(rename = "standard", alias = "gregorian")]
    Standard,
    #[serde(rename = "proleptic_gregorian")]
    ProlepticGregorian,
    #[serde(rename = "julian")]
    Julian,
    #[serde(rename = "noleap", alias = "365_day")]
    NoLeap,
    #[serde(rename = "all_leap", alias = "366_day")]
    AllLeap,
    #[serde(rename = "360_day")]
    Day360,
}

impl Calendar {
    pub fn name(self) -> &'static str {
        match self {
            Calendar::Standard => "standard",
            Calendar::ProlepticGregorian => "proleptic_gregorian",
            Calendar::Julian => "julian",
            Calendar::NoLeap => "noleap",
            Calendar::AllLeap => "all_leap",
            Calendar::Day360 => "360_day",
        }
    }

    pub fn is_leap_year(self, year: i32) -> bool {
        match self {
            Calendar::Standard | Calendar::ProlepticGregorian => {
                (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
            }
            Calendar::Julian => year.rem_euclid(4) == 0,
            Calendar::NoLeap | Calendar::Day360 => false,
            Calendar::AllLeap => true,
        }
    }

    pub fn days_in_month(self, year: i32, month: u32) -> u32 {
        if self == Calendar::Day360 {
            return 30;
        }
        match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 if self.is_leap_year(year) => 29,
            2 => 28,
            _ => 0,
        }
    }

    fn days_before_month(self, year: i32, month: u32) -> i64 {
        (1..month).map(|m| i64::from(self.days_in_month(year, m))).sum()
    }

    /// Day number counted from 0001-01-01 (day 0) of this calendar
    fn day_number(self, year: i32, month: u32, day: u32) -> Result<i64> {
        let y = i64::from(year) - 1;
        let within_year = self.days_before_month(year, month) + i64::from(day) - 1;
        match self {
            Calendar::Standard | Calendar::ProlepticGregorian => NaiveDate::from_ymd_opt(year, month, day)
                .map(|d| i64::from(d.num_days_from_ce()) - 1)
                .ok_or_else(|| {
                    FederationError::invalid_date(format!("{year:04}-{month:02}-{day:02} out of range"))
                }),
            Calendar::Julian => Ok(365 * y + y.div_euclid(4) + within_year),
            Calendar::NoLeap => Ok(365 * y + within_year),
            Calendar::AllLeap => Ok(366 * y + within_year),
            Calendar::Day360 => Ok(360 * y + within_year),
        }
    }

    /// Inverse of `day_number`
    fn date_from_day_number(self, n: i64) -> Result<(i32, u32, u32)> {
        let out_of_range = || FederationError::invalid_date(format!("day number {n} out of range"));

        let (year, day_of_year) = match self {
            Calendar::Standard | Calendar::ProlepticGregorian => {
                let ce = i32::try_from(n + 1).map_err(|_| out_of_range())?;
                let date = NaiveDate::from_num_days_from_ce_opt(ce).ok_or_else(out_of_range)?;
                return Ok((date.year(), date.month(), date.day()));
            }
            Calendar::Julian => {
                let cycle = n.div_euclid(1461);
                let rem = n.rem_euclid(1461);
                let years_in = (rem / 365).min(3);
                (4 * cycle + years_in + 1, rem - 365 * years_in)
            }
            Calendar::NoLeap => (n.div_euclid(365) + 1, n.rem_euclid(365)),
            Calendar::AllLeap => (n.div_euclid(366) + 1, n.rem_euclid(366)),
            Calendar::Day360 => (n.div_euclid(360) + 1, n.rem_euclid(360)),
        };

        let year = i32::try_from(year).map_err(|_| out_of_range())?;
        let mut remaining = day_of_year;
        for month in 1..=12 {
            let len = i64::from(self.days_in_month(year, month));
            if remaining < len {
                return Ok((year, month, remaining as u32 + 1));
            }
            remaining -= len;
        }
        Err(out_of_range())
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Calendar {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Calendar::Standard),
            "proleptic_gregorian" => Ok(Calendar::ProlepticGregorian),
            "julian" => Ok(Calendar::Julian),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "366_day" => Ok(Calendar::AllLeap),
            "360_day" => Ok(Calendar::Day360),
            _ => Err(FederationError::UnknownCalendar { name: s.to_string() }),
        }
    }
}

/// A date and time of day on a specific CF calendar
///
/// Ordering is chronological for timestamps on the same calendar. Callers
/// that may hold mixed calendars must check `calendar()` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CfDateTime {
    calendar: Calendar,
    days: i64,
    time: NaiveTime,
    year: i32,
    month: u32,
    day: u32,
}

impl CfDateTime {
    pub fn new(calendar: Calendar, year: i32, month: u32, day: u32, time: NaiveTime) -> Result<Self> {
        if !(1..=12).contains(&month) || day == 0 || day > calendar.days_in_month(year, month) {
            return Err(FederationError::invalid_date(format!(
                "{year:04}-{month:02}-{day:02} does not exist in the {calendar} calendar"
            )));
        }
        let days = calendar.day_number(year, month, day)?;
        Ok(Self {
            calendar,
            days,
            time,
            year,
            month,
            day,
        })
    }

    pub fn from_ymd(calendar: Calendar, year: i32, month: u32, day: u32) -> Result<Self> {
        Self::new(calendar, year, month, day, NaiveTime::MIN)
    }

    pub fn from_ymd_hms(
        calendar: Calendar,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
            FederationError::invalid_date(format!("{hour:02}:{minute:02}:{second:02} is not a time of day"))
        })?;
        Self::new(calendar, year, month, day, time)
    }

    fn from_day_number(calendar: Calendar, days: i64, time: NaiveTime) -> Result<Self> {
        let (year, month, day) = calendar.date_from_day_number(days)?;
        Ok(Self {
            calendar,
            days,
            time,
            year,
            month,
            day,
        })
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    fn require_same_calendar(&self, other: &Self) -> Result<()> {
        if self.calendar == other.calendar {
            Ok(())
        } else {
            Err(FederationError::CalendarMismatch {
                expected: self.calendar,
                actual: other.calendar,
            })
        }
    }

    /// Elapsed time from `earlier` to `self`
    pub fn signed_duration_since(&self, earlier: &Self) -> Result<TimeDelta> {
        self.require_same_calendar(earlier)?;
        let day_seconds = (self.days - earlier.days)
            .checked_mul(SECONDS_PER_DAY)
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| FederationError::invalid_date("duration out of range"))?;
        day_seconds
            .checked_add(&(self.time - earlier.time))
            .ok_or_else(|| FederationError::invalid_date("duration out of range"))
    }

    /// Fixed-duration addition
    pub fn checked_add(&self, delta: TimeDelta) -> Result<Self> {
        let (time, overflow_seconds) = self.time.overflowing_add_signed(delta);
        let days = self
            .days
            .checked_add(overflow_seconds / SECONDS_PER_DAY)
            .ok_or_else(|| FederationError::invalid_date("timestamp out of range"))?;
        Self::from_day_number(self.calendar, days, time)
    }

    /// Calendar-aware month addition
    ///
    /// The day of month is kept when the target month has it and clamped to
    /// the month's last day otherwise (Jan 31 + 1 month = Feb 28/29).
    pub fn add_months(&self, months: i64) -> Result<Self> {
        let out_of_range = || FederationError::invalid_date("timestamp out of range");
        let total = (i64::from(self.year) * 12 + i64::from(self.month) - 1)
            .checked_add(months)
            .ok_or_else(out_of_range)?;
        let year = i32::try_from(total.div_euclid(12)).map_err(|_| out_of_range())?;
        let month = total.rem_euclid(12) as u32 + 1;
        let day = self.day.min(self.calendar.days_in_month(year, month));
        Self::new(self.calendar, year, month, day, self.time)
    }

    pub fn add_years(&self, years: i64) -> Result<Self> {
        let months = years
            .checked_mul(12)
            .ok_or_else(|| FederationError::invalid_date("timestamp out of range"))?;
        self.add_months(months)
    }

    /// Parse the reference part of a CF units string
    ///
    /// Accepts `Y-M-D`, `Y-M-D h:m:s[.f]`, `Y-M-DTh:m:s`, a trailing `Z` or
    /// `UTC`, and a numeric `+hh:mm` offset, which is folded into the result.
    pub fn parse(text: &str, calendar: Calendar) -> Result<Self> {
        let invalid = || FederationError::invalid_date(format!("cannot parse '{text}'"));

        let mut s = text.trim();
        for suffix in ["UTC", "utc", "Z", "z"] {
            if let Some(stripped) = s.strip_suffix(suffix) {
                s = stripped.trim_end();
                break;
            }
        }

        let split = s.find(|c: char| c == 'T' || c.is_whitespace());
        let (date_part, rest) = match split {
            Some(i) => (&s[..i], s[i + 1..].trim()),
            None => (s, ""),
        };

        let (negative, date_body) = match date_part.strip_prefix('-') {
            Some(body) => (true, body),
            None => (false, date_part),
        };
        let mut fields = date_body.split('-');
        let year: i32 = fields.next().and_then(|y| y.parse().ok()).ok_or_else(invalid)?;
        let year = if negative { -year } else { year };
        let month: u32 = match fields.next() {
            Some(m) => m.parse().map_err(|_| invalid())?,
            None => 1,
        };
        let day: u32 = match fields.next() {
            Some(d) => d.parse().map_err(|_| invalid())?,
            None => 1,
        };
        if fields.next().is_some() {
            return Err(invalid());
        }

        let (time_part, offset_part) = match rest.find(['+', '-']) {
            Some(i) => (rest[..i].trim(), Some(rest[i..].trim())),
            None => (rest, None),
        };

        let time = if time_part.is_empty() {
            NaiveTime::MIN
        } else {
            parse_time_of_day(time_part).ok_or_else(invalid)?
        };

        let local = Self::new(calendar, year, month, day, time)?;
        match offset_part {
            None => Ok(local),
            Some(offset) => {
                let seconds = parse_utc_offset(offset).ok_or_else(invalid)?;
                local.checked_add(TimeDelta::seconds(-seconds))
            }
        }
    }
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    let mut parts = text.split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    let (second, nanos) = match parts.next() {
        Some(s) => {
            let value: f64 = s.parse().ok()?;
            if !(0.0..60.0).contains(&value) {
                return None;
            }
            let whole = value.trunc();
            ((whole as u32), ((value - whole) * 1e9).round() as u32)
        }
        None => (0, 0),
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos.min(999_999_999))
}

fn parse_utc_offset(text: &str) -> Option<i64> {
    let (sign, body) = match text.split_at_checked(1)? {
        ("+", body) => (1, body),
        ("-", body) => (-1, body),
        _ => return None,
    };
    let digits: String = body.chars().filter(|c| *c != ':').collect();
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i64>().ok()?, 0),
        4 => (digits[..2].parse::<i64>().ok()?, digits[2..].parse::<i64>().ok()?),
        _ => return None,
    };
    Some(sign * (hours * 3600 + minutes * 60))
}

impl fmt::Display for CfDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = if self.time.nanosecond() == 0 {
            self.time.format("%H:%M:%S")
        } else {
            self.time.format("%H:%M:%S%.6f")
        };
        write!(f, "{:04}-{:02}-{:02} {}", self.year, self.month, self.day, time)
    }
}

impl Serialize for CfDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
