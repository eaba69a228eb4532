// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Structural metadata: per-source records and the federated description

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::registry::{CoordRange, FileRegistry};
use crate::value::Attrs;

/// Dimension name -> size
pub type Dims = BTreeMap<String, usize>;

/// Structure of one coordinate or data variable, without its values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayMetadata {
    pub dims: Vec<String>,
    pub attrs: Attrs,
    pub dtype: String,
    pub shape: Vec<usize>,
}

impl ArrayMetadata {
    /// Shape from the given dimension sizes; unknown dimensions count as 0
    pub fn with_dims(dims: Vec<String>, dtype: impl Into<String>, sizes: &Dims) -> Self {
        let mut array = Self {
            dims,
            attrs: Attrs::new(),
            dtype: dtype.into(),
            shape: Vec::new(),
        };
        array.refresh_shape(sizes);
        array
    }

    pub fn refresh_shape(&mut self, sizes: &Dims) {
        self.shape = self
            .dims
            .iter()
            .map(|d| sizes.get(d).copied().unwrap_or(0))
            .collect();
    }
}

/// Everything read from one source; immutable once read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerFileMetadata {
    pub source: String,
    pub dims: Dims,
    pub coords: BTreeMap<String, ArrayMetadata>,
    pub variables: BTreeMap<String, ArrayMetadata>,
    pub attrs: Attrs,
    /// First and last raw value of the concatenation coordinate
    pub coord_range: CoordRange,
    /// Leading raw values of the concatenation coordinate
    pub coord_sample: Vec<f64>,
}

/// Structural summary of a (possibly federated) dataset
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetDescription {
    pub dims: Dims,
    pub coords: BTreeMap<String, ArrayMetadata>,
    pub variables: BTreeMap<String, ArrayMetadata>,
    pub attrs: Attrs,
    #[serde(skip_serializing_if = "FileRegistry::is_empty")]
    pub registry: FileRegistry,
}

/// A coordinate or variable that names a dimension the dataset lacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeclaredDimension {
    pub array: String,
    pub dim: String,
}

impl fmt::Display for UndeclaredDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' uses undeclared dimension '{}'", self.array, self.dim)
    }
}

impl DatasetDescription {
    /// Recompute every array's shape from `dims`
    pub fn refresh_shapes(&mut self) {
        let sizes = &self.dims;
        for array in self.coords.values_mut().chain(self.variables.values_mut()) {
            array.refresh_shape(sizes);
        }
    }

    /// Coordinates and variables referencing dimensions not in `dims`
    pub fn validate(&self) -> Vec<UndeclaredDimension> {
        self.coords
            .iter()
            .chain(self.variables.iter())
            .flat_map(|(name, array)| {
                array
                    .dims
                    .iter()
                    .filter(|d| !self.dims.contains_key(*d))
                    .map(move |d| UndeclaredDimension {
                        array: name.clone(),
                        dim: d.clone(),
                    })
            })
            .collect()
    }

    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.dims.get(dim).copied()
    }
}
