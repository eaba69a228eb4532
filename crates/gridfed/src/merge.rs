// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Merge validated per-source records into one description
//!
//! The concatenation dimension is summed in input order. Everything else,
//! including coordinate, variable and global attributes, is taken from the
//! first record; later records never override it.

use crate::error::{FederationError, Result};
use crate::metadata::{DatasetDescription, PerFileMetadata};

pub fn merge_metadata(records: &[PerFileMetadata], concat_dim: &str) -> Result<DatasetDescription> {
    let first = records
        .first()
        .ok_or(FederationError::NoSources { pattern: None })?;

    let mut total: usize = 0;
    for record in records {
        let size = record
            .dims
            .get(concat_dim)
            .copied()
            .ok_or_else(|| FederationError::MissingDimension {
                source_id: record.source.clone(),
                dim: concat_dim.to_string(),
            })?;
        total = total.checked_add(size).ok_or_else(|| FederationError::Parse {
            source_id: record.source.clone(),
            message: format!("size of '{concat_dim}' overflows"),
        })?;
    }

    let mut dims = first.dims.clone();
    dims.insert(concat_dim.to_string(), total);

    let mut description = DatasetDescription {
        dims,
        coords: first.coords.clone(),
        variables: first.variables.clone(),
        attrs: first.attrs.clone(),
        ..Default::default()
    };
    description.refresh_shapes();
    Ok(description)
}
