// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Registry of the sources backing a federated dataset
//!
//! Each source owns a `[low, high]` range of the concatenation coordinate.
//! Queries return the sources whose range overlaps a selector, always in the
//! order the sources were first registered.

use arrow::record_batch::RecordBatch;
use arrow::datatypes::{DataType, Field, FieldRef};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FederationError, Result};
use crate::value::{Attrs, CoordValue};
use diagnostics::*;

/// Explicit Arrow schema for rows serialized with `serde_arrow`
pub trait ForArrow {
    fn for_arrow() -> Vec<FieldRef>;
}

/// Closed interval of the concatenation coordinate held by one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordRange {
    pub low: CoordValue,
    pub high: CoordValue,
}

impl CoordRange {
    pub fn new(low: impl Into<CoordValue>, high: impl Into<CoordValue>) -> Self {
        Self {
            low: low.into(),
            high: high.into(),
        }
    }
}

/// Query window; a missing side is unbounded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeSelector {
    pub start: Option<CoordValue>,
    pub end: Option<CoordValue>,
}

impl RangeSelector {
    pub fn between(start: impl Into<CoordValue>, end: impl Into<CoordValue>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    pub fn starting_at(start: impl Into<CoordValue>) -> Self {
        Self {
            start: Some(start.into()),
            end: None,
        }
    }

    pub fn ending_at(end: impl Into<CoordValue>) -> Self {
        Self {
            start: None,
            end: Some(end.into()),
        }
    }
}

/// `a < b`, or `true` when the two values cannot be ordered
fn before_or_unknown(a: &CoordValue, b: &CoordValue) -> bool {
    match a.partial_cmp(b) {
        Some(ordering) => ordering == Ordering::Less,
        None => {
            let left = a.kind_name();
            let right = b.kind_name();
            debug!("cannot compare {left} with {right}, treating ranges as overlapping", left: left, right: right);
            true
        }
    }
}

impl CoordRange {
    /// Open-interval overlap: `low < sel.end && sel.start < high`
    pub fn overlaps(&self, selector: &RangeSelector) -> bool {
        let below_end = selector
            .end
            .as_ref()
            .is_none_or(|end| before_or_unknown(&self.low, end));
        let above_start = selector
            .start
            .as_ref()
            .is_none_or(|start| before_or_unknown(start, &self.high));
        below_end && above_start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRegistryEntry {
    pub source_id: String,
    pub coord_range: CoordRange,
    pub concat_dim: String,
    pub metadata: Attrs,
}

/// Source id -> coordinate range, in registration order
///
/// Disabled until `enable` is called. Mutation before that is an error;
/// queries simply find nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileRegistry {
    concat_dim: Option<String>,
    entries: Vec<FileRegistryEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking sources along `concat_dim`, discarding previous entries
    pub fn enable(&mut self, concat_dim: impl Into<String>) {
        self.concat_dim = Some(concat_dim.into());
        self.entries.clear();
        self.index.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.concat_dim.is_some()
    }

    pub fn concat_dim(&self) -> Option<&str> {
        self.concat_dim.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a source, or overwrite it in place if already registered
    pub fn register(
        &mut self,
        source_id: impl Into<String>,
        coord_range: CoordRange,
        metadata: Attrs,
    ) -> Result<()> {
        let concat_dim = self.concat_dim.clone().ok_or(FederationError::NotEnabled)?;
        let source_id = source_id.into();
        let entry = FileRegistryEntry {
            source_id: source_id.clone(),
            coord_range,
            concat_dim,
            metadata,
        };
        match self.index.get(&source_id) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.index.insert(source_id, self.entries.len());
                self.entries.push(entry);
            }
        }
        Ok(())
    }

    /// Sources overlapping `selector`, or all sources when it is `None`
    pub fn query(&self, selector: Option<&RangeSelector>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| selector.is_none_or(|sel| entry.coord_range.overlaps(sel)))
            .map(|entry| entry.source_id.clone())
            .collect()
    }

    pub fn info(&self, source_id: &str) -> Result<&FileRegistryEntry> {
        self.index
            .get(source_id)
            .map(|&pos| &self.entries[pos])
            .ok_or_else(|| FederationError::UnknownSource {
                source_id: source_id.to_string(),
            })
    }

    pub fn entries(&self) -> &[FileRegistryEntry] {
        &self.entries
    }

    /// Tabular view: one row per source, metadata as JSON text
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        self.query_batch(None)
    }

    /// Tabular view of the sources overlapping `selector`
    pub fn query_batch(&self, selector: Option<&RangeSelector>) -> Result<RecordBatch> {
        let rows = self
            .entries
            .iter()
            .filter(|entry| selector.is_none_or(|sel| entry.coord_range.overlaps(sel)))
            .map(RegistryRow::try_from)
            .collect::<Result<Vec<_>>>()?;
        let fields = RegistryRow::for_arrow();
        Ok(serde_arrow::to_record_batch(&fields, &rows)?)
    }
}

#[derive(Debug, Serialize)]
struct RegistryRow {
    source_id: String,
    concat_dim: String,
    range_start: String,
    range_end: String,
    metadata: String,
}

impl TryFrom<&FileRegistryEntry> for RegistryRow {
    type Error = FederationError;

    fn try_from(entry: &FileRegistryEntry) -> Result<Self> {
        Ok(Self {
            source_id: entry.source_id.clone(),
            concat_dim: entry.concat_dim.clone(),
            range_start: entry.coord_range.low.to_string(),
            range_end: entry.coord_range.high.to_string(),
            metadata: serde_json::to_string(&entry.metadata)?,
        })
    }
}

impl ForArrow for RegistryRow {
    fn for_arrow() -> Vec<FieldRef> {
        vec![
            Arc::new(Field::new("source_id", DataType::Utf8, false)),
            Arc::new(Field::new("concat_dim", DataType::Utf8, false)),
            Arc::new(Field::new("range_start", DataType::Utf8, false)),
            Arc::new(Field::new("range_end", DataType::Utf8, false)),
            Arc::new(Field::new("metadata", DataType::Utf8, false)), // JSON-encoded
        ]
    }
}
