// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Open many sources as one federated description
//!
//! Sources are read concurrently and put back into source order, validated
//! against each other, merged, and registered so that each slice of the
//! concatenation axis can be traced back to the file holding it.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::PathBuf;
use wax::Glob;

use crate::config::{OpenOptions, SourceSet};
use crate::error::{FederationError, Result};
use crate::frequency::{FREQUENCY_ATTR, infer_time_frequency};
use crate::merge::merge_metadata;
use crate::metadata::{DatasetDescription, PerFileMetadata};
use crate::reader::MetadataProvider;
use crate::validate::{validate_compatibility, validate_dimension_sizes};
use crate::value::{AttrValue, Attrs};
use diagnostics::*;

/// Source ids for a source set, in the order they will be read
pub fn expand_sources(sources: &SourceSet) -> Result<Vec<String>> {
    let (ids, pattern) = match sources {
        SourceSet::Paths(paths) => (paths.clone(), None),
        SourceSet::Pattern { pattern } => (expand_pattern(pattern)?, Some(pattern)),
    };
    if ids.is_empty() {
        return Err(FederationError::NoSources {
            pattern: pattern.cloned(),
        });
    }
    let count = ids.len();
    info!("expanded {count} sources", count: count);
    Ok(ids)
}

fn expand_pattern(pattern: &str) -> Result<Vec<String>> {
    let pattern_error = |message: String| FederationError::Pattern {
        pattern: pattern.to_string(),
        message,
    };
    let (prefix, glob) = Glob::new(pattern)
        .map_err(|e| pattern_error(e.to_string()))?
        .partition();
    let root = if prefix.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        prefix.clone()
    };

    let mut found = Vec::new();
    for entry in glob.walk(&root) {
        let entry = entry.map_err(|e| pattern_error(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        // Keep ids relative when the pattern was relative
        let path = if prefix.as_os_str().is_empty() {
            path.strip_prefix(".").unwrap_or(path)
        } else {
            path
        };
        found.push(path.to_string_lossy().to_string());
    }
    found.sort();
    Ok(found)
}

/// Registry metadata kept for one source
fn source_metadata(record: &PerFileMetadata) -> Attrs {
    let dims = record
        .dims
        .iter()
        .map(|(name, size)| (name.clone(), AttrValue::from(*size)))
        .collect();
    let variables = record.variables.keys().cloned().map(AttrValue::Text).collect();
    Attrs::from([
        ("dims".to_string(), AttrValue::Map(dims)),
        ("variables".to_string(), AttrValue::List(variables)),
        ("attrs".to_string(), AttrValue::Map(record.attrs.clone())),
    ])
}

/// Infer the sampling frequency from the first source and store it on the
/// concatenation coordinate
fn annotate_frequency(description: &mut DatasetDescription, first: &PerFileMetadata, concat_dim: &str) {
    let Some(coord) = description.coords.get_mut(concat_dim) else {
        return;
    };
    let Some(units) = coord.attrs.get("units").and_then(AttrValue::as_str) else {
        return;
    };
    if !units.contains("since") {
        return;
    }
    let calendar = coord
        .attrs
        .get("calendar")
        .and_then(AttrValue::as_str)
        .unwrap_or("standard");
    if let Some(frequency) = infer_time_frequency(&first.coord_sample, units, calendar) {
        coord
            .attrs
            .insert(FREQUENCY_ATTR.to_string(), AttrValue::Text(frequency.to_string()));
    }
}

/// Read, validate, merge and register every source of `sources`
pub async fn open_mfdataset(
    provider: &dyn MetadataProvider,
    sources: &SourceSet,
    options: &OpenOptions,
) -> Result<DatasetDescription> {
    let ids = expand_sources(sources)?;
    let concat_dim = options.concat_dim.as_str();

    let records: Vec<PerFileMetadata> = stream::iter(ids.iter())
        .map(|id| provider.read(id, concat_dim))
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

    validate_compatibility(&records, concat_dim)?;
    if options.strict_dimensions {
        validate_dimension_sizes(&records, concat_dim)?;
    }

    let mut description = merge_metadata(&records, concat_dim)?;
    if options.infer_frequency {
        if let Some(first) = records.first() {
            annotate_frequency(&mut description, first, concat_dim);
        }
    }

    description.registry.enable(concat_dim);
    for record in &records {
        description.registry.register(
            record.source.clone(),
            record.coord_range.clone(),
            source_metadata(record),
        )?;
    }

    let count = records.len();
    let size = description.dim_size(concat_dim).unwrap_or(0);
    info!("opened {count} sources, {size} steps along {concat_dim}", count: count, size: size, concat_dim: concat_dim);
    Ok(description)
}
