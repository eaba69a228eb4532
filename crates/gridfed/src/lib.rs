// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Metadata-only federation of gridded datasets
//!
//! Many on-disk sources are described as one dataset without loading their
//! payload: per-source structure is read, checked for compatibility and
//! merged along a concatenation dimension, and a registry records which
//! source backs which coordinate range. A regular time axis can then be
//! regrouped into calendar periods (decades, years, months).

pub mod calendar;
pub mod cdl;
pub mod config;
pub mod error;
pub mod frequency;
pub mod group;
pub mod merge;
pub mod metadata;
pub mod open;
pub mod period;
pub mod reader;
pub mod registry;
pub mod units;
pub mod validate;
pub mod value;

pub use calendar::{Calendar, CfDateTime};
pub use config::{OpenOptions, Recipe, SourceSet};
pub use error::{FederationError, Result};
pub use frequency::{Frequency, FrequencyUnit, infer_frequency, infer_time_frequency};
pub use group::{TimeGroup, build_group, groupby_time, groupby_time_with};
pub use merge::merge_metadata;
pub use metadata::{ArrayMetadata, DatasetDescription, Dims, PerFileMetadata};
pub use open::{expand_sources, open_mfdataset};
pub use period::{GroupFrequency, PeriodUnit, Periods, TimePeriod, plan_periods};
pub use reader::{CdlReader, MetadataProvider};
pub use registry::{CoordRange, FileRegistry, FileRegistryEntry, RangeSelector};
pub use units::{CfDecoder, TimestampDecoder};
pub use validate::{validate_compatibility, validate_dimension_sizes};
pub use value::{AttrValue, Attrs, CoordValue};
