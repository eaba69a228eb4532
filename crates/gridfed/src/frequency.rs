// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Sampling frequency of a time coordinate
//!
//! A frequency is stored on the federated time coordinate as the attribute
//! `frequency`, using offset-alias tokens: `1D`, `6H`, `15T`, `30S`.
//! Inference looks at the first few decoded timestamps only; an irregular
//! sample yields no frequency rather than an error.

use chrono::TimeDelta;
use std::fmt;
use std::str::FromStr;

use crate::error::{FederationError, Result};
use crate::units::{CfDecoder, TimestampDecoder};
use diagnostics::*;

/// Attribute key under which the inferred frequency is stored
pub const FREQUENCY_ATTR: &str = "frequency";

/// How many leading values are decoded during inference
pub const SAMPLE_SIZE: usize = 10;

/// Largest disagreement between consecutive deltas still treated as regular
const TOLERANCE_SECONDS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl FrequencyUnit {
    pub fn seconds(self) -> i64 {
        match self {
            FrequencyUnit::Second => 1,
            FrequencyUnit::Minute => 60,
            FrequencyUnit::Hour => 3_600,
            FrequencyUnit::Day => 86_400,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            FrequencyUnit::Second => "S",
            FrequencyUnit::Minute => "T",
            FrequencyUnit::Hour => "H",
            FrequencyUnit::Day => "D",
        }
    }

    fn word(self) -> &'static str {
        match self {
            FrequencyUnit::Second => "second",
            FrequencyUnit::Minute => "minute",
            FrequencyUnit::Hour => "hour",
            FrequencyUnit::Day => "day",
        }
    }
}

/// A regular sampling interval: `count` x `unit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frequency {
    count: u32,
    unit: FrequencyUnit,
}

impl Frequency {
    pub fn new(count: u32, unit: FrequencyUnit) -> Result<Self> {
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

    pub fn unit(&self) -> FrequencyUnit {
        self.unit
    }

    pub fn seconds(&self) -> i64 {
        i64::from(self.count) * self.unit.seconds()
    }

    pub fn to_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.seconds())
    }

    /// Canonical form of an exact number of seconds
    ///
    /// Days win over hours, hours over minutes, minutes over seconds, so
    /// 86400 s is `1D` and never `24H`.
    pub fn from_seconds(total: i64) -> Option<Self> {
        if total <= 0 {
            return None;
        }
        let unit = [
            FrequencyUnit::Day,
            FrequencyUnit::Hour,
            FrequencyUnit::Minute,
            FrequencyUnit::Second,
        ]
        .into_iter()
        .find(|unit| total % unit.seconds() == 0)?;
        let count = u32::try_from(total / unit.seconds()).ok()?;
        Some(Self { count, unit })
    }

    /// Human form, e.g. "1 day" or "3 hours"
    pub fn describe(&self) -> String {
        let plural = if self.count == 1 { "" } else { "s" };
        format!("{} {}{}", self.count, self.unit.word(), plural)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.unit.suffix())
    }
}

impl FromStr for Frequency {
    type Err = FederationError;

    fn from_str(token: &str) -> Result<Self> {
        let unsupported = || FederationError::UnsupportedFrequency {
            token: token.to_string(),
        };
        let trimmed = token.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(unsupported)?;
        let (digits, suffix) = trimmed.split_at(split);
        let count = if digits.is_empty() {
            1
        } else {
            digits.parse().map_err(|_| unsupported())?
        };
        let unit = match suffix {
            "S" | "s" => FrequencyUnit::Second,
            "T" | "min" => FrequencyUnit::Minute,
            "H" | "h" => FrequencyUnit::Hour,
            "D" | "d" => FrequencyUnit::Day,
            _ => return Err(unsupported()),
        };
        Self::new(count, unit).map_err(|_| unsupported())
    }
}

/// Infer the sampling frequency of a numeric time coordinate
///
/// Returns `None` for fewer than two values, undecodable values, irregular
/// spacing (consecutive deltas disagreeing by more than one second), or a
/// spacing that is not a whole number of seconds.
///
/// The step is taken from the first delta. Sub-second jitter on later steps
/// is tolerated, but a fractional first delta yields `None` even when every
/// delta agrees within the tolerance.
pub fn infer_frequency(
    decoder: &dyn TimestampDecoder,
    values: &[f64],
    units: &str,
    calendar: &str,
) -> Option<Frequency> {
    if values.len() < 2 {
        return None;
    }

    let sample = &values[..values.len().min(SAMPLE_SIZE)];
    let times = match decoder.decode(sample, units, calendar) {
        Ok(times) => times,
        Err(e) => {
            let reason = e.to_string();
            debug!("frequency inference skipped, cannot decode {units}: {reason}", units: units, reason: reason);
            return None;
        }
    };

    let mut deltas = Vec::with_capacity(times.len().saturating_sub(1));
    for pair in times.windows(2) {
        let delta = pair[1].signed_duration_since(&pair[0]).ok()?;
        deltas.push(delta_seconds(delta));
    }

    let first = *deltas.first()?;
    let (min, max) = deltas
        .iter()
        .fold((first, first), |(lo, hi), d| (lo.min(*d), hi.max(*d)));
    if max - min > TOLERANCE_SECONDS {
        debug!("irregular time sample under {units}, no frequency inferred", units: units);
        return None;
    }

    if first.fract() != 0.0 {
        return None;
    }
    let frequency = Frequency::from_seconds(first as i64)?;
    let token = frequency.to_string();
    debug!("inferred frequency {token} under {units}", token: token, units: units);
    Some(frequency)
}

/// `infer_frequency` with the CF decoder
pub fn infer_time_frequency(values: &[f64], units: &str, calendar: &str) -> Option<Frequency> {
    infer_frequency(&CfDecoder, values, units, calendar)
}

fn delta_seconds(delta: TimeDelta) -> f64 {
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaced(step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn test_hourly_sample() {
        let values = spaced(3600.0, 10);
        let freq = infer_time_frequency(&values, "seconds since 2000-01-01", "standard").unwrap();
        assert_eq!(freq.to_string(), "1H");
        assert_eq!(freq.describe(), "1 hour");

        let hours = spaced(1.0, 24);
        let freq = infer_time_frequency(&hours, "hours since 2000-01-01 00:00:00", "standard");
        assert_eq!(freq.map(|f| f.to_string()), Some("1H".to_string()));
    }

    #[test]
    fn test_perturbed_step_is_irregular() {
        let mut values = spaced(3600.0, 10);
        values[5] += 2.0;
        assert_eq!(
            infer_time_frequency(&values, "seconds since 2000-01-01", "standard"),
            None
        );

        let mut hours = spaced(1.0, 10);
        assert_eq!(
            infer_time_frequency(&hours, "hours since 2000-01-01", "standard").map(|f| f.to_string()),
            Some("1H".to_string())
        );
        hours[5] += 2.0 / 3600.0;
        assert_eq!(infer_time_frequency(&hours, "hours since 2000-01-01", "standard"), None);
    }

    #[test]
    fn test_sub_second_jitter_after_first_step_is_tolerated() {
        let mut values = spaced(3600.0, 10);
        values[4] += 0.4;
        let freq = infer_time_frequency(&values, "seconds since 2000-01-01", "standard");
        assert_eq!(freq.map(|f| f.to_string()), Some("1H".to_string()));
    }

    #[test]
    fn test_fractional_first_step_has_no_frequency() {
        let mut hours = spaced(1.0, 10);
        hours[1] += 0.4 / 3600.0;
        assert_eq!(infer_time_frequency(&hours, "hours since 2000-01-01", "standard"), None);
    }

    #[test]
    fn test_only_first_ten_values_are_sampled() {
        let mut values = spaced(1.0, 20);
        values[15] = 100.0;
        let freq = infer_time_frequency(&values, "days since 2000-01-01", "standard");
        assert_eq!(freq.map(|f| f.to_string()), Some("1D".to_string()));
    }

    #[test]
    fn test_unit_priority() {
        assert_eq!(Frequency::from_seconds(86_400).unwrap().to_string(), "1D");
        assert_eq!(Frequency::from_seconds(172_800).unwrap().to_string(), "2D");
        assert_eq!(Frequency::from_seconds(3 * 3600).unwrap().to_string(), "3H");
        assert_eq!(Frequency::from_seconds(36 * 3600).unwrap().to_string(), "36H");
        assert_eq!(Frequency::from_seconds(15 * 60).unwrap().to_string(), "15T");
        assert_eq!(Frequency::from_seconds(45).unwrap().to_string(), "45S");
        assert_eq!(Frequency::from_seconds(0), None);
    }

    #[test]
    fn test_daily_as_hours_reports_one_day() {
        let values = spaced(24.0, 5);
        let freq = infer_time_frequency(&values, "hours since 2000-01-01", "standard").unwrap();
        assert_eq!(freq.describe(), "1 day");
    }

    #[test]
    fn test_too_few_or_undecodable_values() {
        assert_eq!(infer_time_frequency(&[0.0], "days since 2000-01-01", "standard"), None);
        assert_eq!(infer_time_frequency(&[0.0, 1.0], "days after 2000", "standard"), None);
        assert_eq!(infer_time_frequency(&[0.0, 1.0], "days since 2000-01-01", "lunar"), None);
    }

    #[test]
    fn test_token_parsing() {
        assert_eq!("6H".parse::<Frequency>().unwrap().seconds(), 21_600);
        assert_eq!("D".parse::<Frequency>().unwrap().seconds(), 86_400);
        assert_eq!("15T".parse::<Frequency>().unwrap().describe(), "15 minutes");
        assert!("1M".parse::<Frequency>().is_err());
        assert!("0H".parse::<Frequency>().is_err());
    }
}
