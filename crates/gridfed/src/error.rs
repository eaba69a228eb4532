// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

// Error types for federation, registry and time-grouping operations
use std::collections::BTreeSet;

use crate::calendar::Calendar;

pub type Result<T> = std::result::Result<T, FederationError>;

#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    #[error("No source files found{}", .pattern.as_ref().map(|p| format!(" matching pattern: {p}")).unwrap_or_default())]
    NoSources { pattern: Option<String> },

    #[error("Concatenation dimension '{dim}' not found in file: {source_id}")]
    MissingDimension { source_id: String, dim: String },

    #[error("Variable mismatch in file {source_index} ({source_id}): missing {missing:?}, extra {extra:?}")]
    VariableMismatch {
        source_index: usize,
        source_id: String,
        missing: BTreeSet<String>,
        extra: BTreeSet<String>,
    },

    #[error("Dimension mismatch for variable '{variable}' in file {source_index} ({source_id}): expected {expected:?}, got {actual:?}")]
    DimensionShapeMismatch {
        variable: String,
        source_index: usize,
        source_id: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Size mismatch for dimension '{dim}' in file {source_index} ({source_id}): expected {expected}, got {actual}")]
    DimensionSizeMismatch {
        dim: String,
        source_index: usize,
        source_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("File tracking not enabled; call enable() first")]
    NotEnabled,

    #[error("File not tracked: {source_id}")]
    UnknownSource { source_id: String },

    #[error("Unsupported frequency: {token}")]
    UnsupportedFrequency { token: String },

    #[error("Dimension '{dim}' not found in dataset")]
    DimensionNotFound { dim: String },

    #[error("Coordinate '{name}' not found in dataset")]
    CoordinateNotFound { name: String },

    #[error("Coordinate '{name}' has no {attr} attribute")]
    MissingAttribute { name: String, attr: String },

    #[error("No values for coordinate '{coord}' in file: {source_id}")]
    MissingCoordinateValues { source_id: String, coord: String },

    #[error("Invalid time units '{units}': {reason}")]
    InvalidTimeUnits { units: String, reason: String },

    #[error("Unknown calendar: {name}")]
    UnknownCalendar { name: String },

    #[error("Invalid date: {message}")]
    InvalidDate { message: String },

    #[error("Calendar mismatch: expected {expected}, got {actual}")]
    CalendarMismatch { expected: Calendar, actual: Calendar },

    #[error("Parse error in {source_id}: {message}")]
    Parse { source_id: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml_ng::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_arrow::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FederationError {
    pub fn parse<S: Into<String>, M: Into<String>>(source_id: S, message: M) -> Self {
        FederationError::Parse {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn invalid_date<M: Into<String>>(message: M) -> Self {
        FederationError::InvalidDate {
            message: message.into(),
        }
    }

    pub fn invalid_units<U: Into<String>, R: Into<String>>(units: U, reason: R) -> Self {
        FederationError::InvalidTimeUnits {
            units: units.into(),
            reason: reason.into(),
        }
    }
}
