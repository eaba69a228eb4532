// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! CF time units (`"<unit> since <reference>"`) and timestamp decoding

use chrono::TimeDelta;
use std::fmt;

use crate::calendar::{Calendar, CfDateTime};
use crate::error::{FederationError, Result};

/// Unit part of a CF time units string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
}

impl TimeUnit {
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => Some(TimeUnit::Days),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(TimeUnit::Hours),
            "minutes" | "minute" | "mins" | "min" => Some(TimeUnit::Minutes),
            "seconds" | "second" | "secs" | "sec" | "s" => Some(TimeUnit::Seconds),
            "milliseconds" | "millisecond" | "msecs" | "msec" | "ms" => Some(TimeUnit::Milliseconds),
            "microseconds" | "microsecond" | "usecs" | "usec" | "us" => Some(TimeUnit::Microseconds),
            _ => None,
        }
    }

    pub fn seconds(self) -> f64 {
        match self {
            TimeUnit::Days => 86_400.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Seconds => 1.0,
            TimeUnit::Milliseconds => 1e-3,
            TimeUnit::Microseconds => 1e-6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeUnit::Days => "days",
            TimeUnit::Hours => "hours",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Microseconds => "microseconds",
        }
    }
}

/// Split a units string into its unit word and reference text
pub fn split_time_units(units: &str) -> Result<(&str, &str)> {
    let lower = units.to_ascii_lowercase();
    let idx = lower
        .find(" since ")
        .ok_or_else(|| FederationError::invalid_units(units, "expected '<unit> since <reference>'"))?;
    Ok((units[..idx].trim(), units[idx + " since ".len()..].trim()))
}

/// Parsed CF time units bound to a calendar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub reference: CfDateTime,
}

impl TimeUnits {
    pub fn parse(units: &str, calendar: Calendar) -> Result<Self> {
        let (unit_word, reference) = split_time_units(units)?;
        let unit = TimeUnit::parse(unit_word).ok_or_else(|| {
            FederationError::invalid_units(units, format!("unsupported unit '{unit_word}'"))
        })?;
        let reference = CfDateTime::parse(reference, calendar)
            .map_err(|e| FederationError::invalid_units(units, e.to_string()))?;
        Ok(Self { unit, reference })
    }

    /// Convert one numeric offset to a timestamp, rounded to the microsecond
    pub fn decode_value(&self, value: f64) -> Result<CfDateTime> {
        let seconds = value * self.unit.seconds();
        if !seconds.is_finite() {
            return Err(FederationError::invalid_date(format!("cannot decode {value}")));
        }
        let whole = seconds.floor();
        let micros = ((seconds - whole) * 1e6).round() as i64;
        let delta = TimeDelta::try_seconds(whole as i64)
            .and_then(|d| d.checked_add(&TimeDelta::microseconds(micros)))
            .ok_or_else(|| FederationError::invalid_date(format!("offset {value} out of range")))?;
        self.reference.checked_add(delta)
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} since {}", self.unit.name(), self.reference)
    }
}

/// Converts raw coordinate numbers into calendar-aware timestamps
pub trait TimestampDecoder: Send + Sync {
    fn decode(&self, values: &[f64], units: &str, calendar: &str) -> Result<Vec<CfDateTime>>;
}

/// Decoder for CF `"<unit> since <reference>"` units
#[derive(Debug, Clone, Copy, Default)]
pub struct CfDecoder;

impl TimestampDecoder for CfDecoder {
    fn decode(&self, values: &[f64], units: &str, calendar: &str) -> Result<Vec<CfDateTime>> {
        let calendar: Calendar = calendar.parse()?;
        let units = TimeUnits::parse(units, calendar)?;
        values.iter().map(|v| units.decode_value(*v)).collect()
    }
}
