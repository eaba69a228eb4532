// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Cross-source compatibility checks
//!
//! Every record is compared against the first one. Records are checked in
//! order and, within a record, the concatenation dimension comes first, then
//! the variable set, then each variable's dimensions, so the reported error
//! is always the earliest violation.

use std::collections::BTreeSet;

use crate::error::{FederationError, Result};
use crate::metadata::PerFileMetadata;

/// Concat dim present, same variables, same per-variable dimensions
pub fn validate_compatibility(records: &[PerFileMetadata], concat_dim: &str) -> Result<()> {
    let Some(reference) = records.first() else {
        return Ok(());
    };
    let expected: BTreeSet<&String> = reference.variables.keys().collect();

    for (index, record) in records.iter().enumerate() {
        if !record.dims.contains_key(concat_dim) {
            return Err(FederationError::MissingDimension {
                source_id: record.source.clone(),
                dim: concat_dim.to_string(),
            });
        }

        let actual: BTreeSet<&String> = record.variables.keys().collect();
        if actual != expected {
            return Err(FederationError::VariableMismatch {
                source_index: index,
                source_id: record.source.clone(),
                missing: expected.difference(&actual).map(|s| s.to_string()).collect(),
                extra: actual.difference(&expected).map(|s| s.to_string()).collect(),
            });
        }

        for (name, array) in &record.variables {
            let reference_dims = &reference.variables[name].dims;
            if &array.dims != reference_dims {
                return Err(FederationError::DimensionShapeMismatch {
                    variable: name.clone(),
                    source_index: index,
                    source_id: record.source.clone(),
                    expected: reference_dims.clone(),
                    actual: array.dims.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Non-concat dimensions shared with the first record have the same size
pub fn validate_dimension_sizes(records: &[PerFileMetadata], concat_dim: &str) -> Result<()> {
    let Some(reference) = records.first() else {
        return Ok(());
    };
    for (index, record) in records.iter().enumerate().skip(1) {
        for (dim, &size) in &record.dims {
            if dim == concat_dim {
                continue;
            }
            if let Some(&expected) = reference.dims.get(dim) {
                if expected != size {
                    return Err(FederationError::DimensionSizeMismatch {
                        dim: dim.clone(),
                        source_index: index,
                        source_id: record.source.clone(),
                        expected,
                        actual: size,
                    });
                }
            }
        }
    }
    Ok(())
}
