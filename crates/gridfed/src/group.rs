// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Regroup a federated description into calendar periods
//!
//! Each group is an independent copy of the parent description with the
//! concatenation dimension resized to the number of whole steps that fit in
//! its period. Groups carry every registry entry of the parent; entries are
//! not filtered by period.

use chrono::TimeDelta;
use serde::Serialize;

use crate::calendar::{Calendar, CfDateTime};
use crate::error::{FederationError, Result};
use crate::frequency::{FREQUENCY_ATTR, Frequency, FrequencyUnit};
use crate::metadata::DatasetDescription;
use crate::period::{GroupFrequency, TimePeriod, plan_periods};
use crate::registry::FileRegistry;
use crate::units::{CfDecoder, TimestampDecoder};
use crate::value::AttrValue;
use diagnostics::*;

/// One period of a grouped dataset
#[derive(Debug, Clone, Serialize)]
pub struct TimeGroup {
    #[serde(serialize_with = "serialize_period")]
    pub period: TimePeriod,
    pub description: DatasetDescription,
}

fn serialize_period<S: serde::Serializer>(
    period: &TimePeriod,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    (&period.start, &period.end).serialize(serializer)
}

/// `YYYY-MM-DD HH:MM:SS`, as written in CF units
fn cf_timestamp(t: &CfDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {}",
        t.year(),
        t.month(),
        t.day(),
        t.time().format("%H:%M:%S")
    )
}

fn units_word(frequency: &Frequency) -> &'static str {
    match frequency.unit() {
        FrequencyUnit::Hour | FrequencyUnit::Minute | FrequencyUnit::Second => "hours",
        FrequencyUnit::Day => "days",
    }
}

/// Number of whole `frequency` steps in `period`; the remainder is dropped
fn steps_in(period: &TimePeriod, frequency: &Frequency) -> Result<usize> {
    let duration = period.duration()?;
    let step = frequency.seconds();
    let seconds = duration.num_seconds().max(0);
    let remainder = seconds % step;
    if remainder != 0 || duration.subsec_nanos() != 0 {
        let start = period.start.to_string();
        debug!("period starting {start} is not a whole number of steps, dropping {remainder}s", start: start, remainder: remainder);
    }
    usize::try_from(seconds / step)
        .map_err(|_| FederationError::invalid_date("period too long"))
}

/// Parent registry carried into a group: same dimension, every entry
fn carry_registry(parent: &FileRegistry) -> Result<FileRegistry> {
    let mut registry = FileRegistry::new();
    if let Some(dim) = parent.concat_dim() {
        registry.enable(dim);
        for entry in parent.entries() {
            registry.register(
                entry.source_id.clone(),
                entry.coord_range.clone(),
                entry.metadata.clone(),
            )?;
        }
    }
    Ok(registry)
}

/// Description of `parent` restricted to `period`
pub fn build_group(
    parent: &DatasetDescription,
    period: &TimePeriod,
    concat_dim: &str,
    frequency: &Frequency,
    normalize_units: bool,
) -> Result<DatasetDescription> {
    let size = steps_in(period, frequency)?;

    let mut group = DatasetDescription {
        dims: parent.dims.clone(),
        coords: parent.coords.clone(),
        variables: parent.variables.clone(),
        attrs: parent.attrs.clone(),
        registry: carry_registry(&parent.registry)?,
    };
    group.dims.insert(concat_dim.to_string(), size);
    group.refresh_shapes();

    if normalize_units {
        if let Some(coord) = group.coords.get_mut(concat_dim) {
            let units = format!("{} since {}", units_word(frequency), cf_timestamp(&period.start));
            coord.attrs.insert("units".to_string(), AttrValue::Text(units));
        }
    }
    Ok(group)
}

fn text_attr<'a>(description: &'a DatasetDescription, dim: &str, attr: &str) -> Option<&'a str> {
    description
        .coords
        .get(dim)
        .and_then(|c| c.attrs.get(attr))
        .and_then(AttrValue::as_str)
}

/// Split a federated description into one group per `group_freq` period
///
/// The time axis starts at the reference date of the coordinate's units and
/// spans `size x frequency`, where `frequency` is the attribute stored by
/// the open pipeline.
pub fn groupby_time(
    description: &DatasetDescription,
    group_freq: GroupFrequency,
    dim: &str,
    normalize_units: bool,
) -> Result<Vec<TimeGroup>> {
    groupby_time_with(&CfDecoder, description, group_freq, dim, normalize_units)
}

/// `groupby_time` with a caller-supplied timestamp decoder
pub fn groupby_time_with(
    decoder: &dyn TimestampDecoder,
    description: &DatasetDescription,
    group_freq: GroupFrequency,
    dim: &str,
    normalize_units: bool,
) -> Result<Vec<TimeGroup>> {
    let size = description
        .dim_size(dim)
        .ok_or_else(|| FederationError::DimensionNotFound { dim: dim.to_string() })?;
    if !description.coords.contains_key(dim) {
        return Err(FederationError::CoordinateNotFound { name: dim.to_string() });
    }
    let missing = |attr: &str| FederationError::MissingAttribute {
        name: dim.to_string(),
        attr: attr.to_string(),
    };
    let units = text_attr(description, dim, "units").ok_or_else(|| missing("units"))?;
    let frequency: Frequency = text_attr(description, dim, FREQUENCY_ATTR)
        .ok_or_else(|| missing(FREQUENCY_ATTR))?
        .parse()?;
    let calendar = text_attr(description, dim, "calendar").unwrap_or(Calendar::Standard.name());

    let start = decoder
        .decode(&[0.0], units, calendar)?
        .into_iter()
        .next()
        .ok_or_else(|| FederationError::invalid_units(units, "reference date did not decode"))?;
    let span = i64::try_from(size)
        .ok()
        .and_then(|n| n.checked_mul(frequency.seconds()))
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| FederationError::invalid_date("time axis out of range"))?;
    let end = start.checked_add(span)?;

    let mut groups = Vec::new();
    for period in plan_periods(start, end, group_freq)? {
        let period = period?;
        let group = build_group(description, &period, dim, &frequency, normalize_units)?;
        groups.push(TimeGroup {
            period,
            description: group,
        });
    }

    let count = groups.len();
    let freq = group_freq.to_string();
    info!("built {count} groups of {freq} along {dim}", count: count, freq: freq, dim: dim);
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ArrayMetadata, Dims};
    use crate::registry::CoordRange;
    use crate::value::Attrs;

    fn daily(size: usize, calendar: &str) -> DatasetDescription {
        let dims: Dims = [("time".to_string(), size), ("lat".to_string(), 2)].into();
        let mut time = ArrayMetadata::with_dims(vec!["time".into()], "float64", &dims);
        time.attrs.insert("units".into(), "days since 2000-01-01".into());
        time.attrs.insert("calendar".into(), calendar.into());
        time.attrs.insert(FREQUENCY_ATTR.into(), "1D".into());
        let tas = ArrayMetadata::with_dims(vec!["time".into(), "lat".into()], "float32", &dims);
        DatasetDescription {
            dims,
            coords: [("time".to_string(), time)].into(),
            variables: [("tas".to_string(), tas)].into(),
            ..Default::default()
        }
    }

    fn sizes(groups: &[TimeGroup]) -> Vec<usize> {
        groups.iter().map(|g| g.description.dims["time"]).collect()
    }

    #[test]
    fn test_month_groups_follow_calendar() {
        let month = "1M".parse().unwrap();

        let standard = groupby_time(&daily(91, "standard"), month, "time", true).unwrap();
        assert_eq!(sizes(&standard), vec![31, 29, 31]);

        let noleap = groupby_time(&daily(90, "noleap"), month, "time", true).unwrap();
        assert_eq!(sizes(&noleap), vec![31, 28, 31]);

        let day360 = groupby_time(&daily(90, "360_day"), month, "time", true).unwrap();
        assert_eq!(sizes(&day360), vec![30, 30, 30]);
    }

    #[test]
    fn test_units_are_rebased() {
        let groups = groupby_time(&daily(60, "standard"), "1M".parse().unwrap(), "time", true).unwrap();
        let units = &groups[1].description.coords["time"].attrs["units"];
        assert_eq!(units, &AttrValue::from("days since 2000-02-01 00:00:00"));
        assert_eq!(groups[1].description.variables["tas"].shape, vec![29, 2]);

        let kept = groupby_time(&daily(60, "standard"), "1M".parse().unwrap(), "time", false).unwrap();
        assert_eq!(
            kept[1].description.coords["time"].attrs["units"],
            AttrValue::from("days since 2000-01-01")
        );
    }

    #[test]
    fn test_hourly_units_and_truncation() {
        let parent = daily(1, "standard");
        let start = CfDateTime::from_ymd(Calendar::Standard, 2000, 1, 1).unwrap();
        let period = TimePeriod {
            start,
            end: start.checked_add(TimeDelta::minutes(150)).unwrap(),
        };
        let hourly: Frequency = "1H".parse().unwrap();
        let group = build_group(&parent, &period, "time", &hourly, true).unwrap();
        assert_eq!(group.dims["time"], 2);
        assert_eq!(
            group.coords["time"].attrs["units"],
            AttrValue::from("hours since 2000-01-01 00:00:00")
        );
    }

    #[test]
    fn test_registry_is_carried() {
        let mut parent = daily(60, "standard");
        parent.registry.enable("time");
        parent.registry.register("a.cdl", CoordRange::new(0.0, 29.0), Attrs::new()).unwrap();
        parent.registry.register("b.cdl", CoordRange::new(30.0, 59.0), Attrs::new()).unwrap();

        let groups = groupby_time(&parent, "1M".parse().unwrap(), "time", true).unwrap();
        for group in &groups {
            assert_eq!(group.description.registry.concat_dim(), Some("time"));
            assert_eq!(group.description.registry.query(None), vec!["a.cdl", "b.cdl"]);
        }

        let untracked = groupby_time(&daily(60, "standard"), "1M".parse().unwrap(), "time", true).unwrap();
        assert!(!untracked[0].description.registry.is_enabled());
    }

    #[test]
    fn test_required_structure() {
        let desc = daily(10, "standard");
        let month: GroupFrequency = "1M".parse().unwrap();
        assert!(matches!(
            groupby_time(&desc, month, "step", true),
            Err(FederationError::DimensionNotFound { .. })
        ));

        let mut no_coord = desc.clone();
        no_coord.coords.clear();
        assert!(matches!(
            groupby_time(&no_coord, month, "time", true),
            Err(FederationError::CoordinateNotFound { .. })
        ));

        let mut no_freq = desc.clone();
        if let Some(time) = no_freq.coords.get_mut("time") {
            time.attrs.remove(FREQUENCY_ATTR);
        }
        assert!(matches!(
            groupby_time(&no_freq, month, "time", true),
            Err(FederationError::MissingAttribute { attr, .. }) if attr == FREQUENCY_ATTR
        ));
    }
}
