// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use arrow::util::pretty::pretty_format_batches;

use crate::common::DatasetArgs;
use gridfed::{CoordValue, RangeSelector};

/// Sources command - a table of the sources backing a coordinate range
///
/// `start` and `end` are raw coordinate values along the concat dimension;
/// leaving both out lists every source.
pub async fn sources_command(
    args: &DatasetArgs,
    start: Option<f64>,
    end: Option<f64>,
) -> Result<String> {
    let dataset = args.resolve().await?;
    let description = dataset.open().await?;

    let selector = (start.is_some() || end.is_some()).then(|| RangeSelector {
        start: start.map(CoordValue::from),
        end: end.map(CoordValue::from),
    });
    let batch = description.registry.query_batch(selector.as_ref())?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}
