// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::common::{DatasetArgs, OutputFormat, render};
use gridfed::{AttrValue, GroupFrequency, TimeGroup, groupby_time};

/// One line per group, without the full descriptions
#[derive(Debug, Serialize)]
struct GroupSummary {
    start: String,
    end: String,
    steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    units: Option<String>,
}

impl GroupSummary {
    fn new(group: &TimeGroup, dim: &str) -> Self {
        Self {
            start: group.period.start.to_string(),
            end: group.period.end.to_string(),
            steps: group.description.dim_size(dim).unwrap_or(0),
            units: group
                .description
                .coords
                .get(dim)
                .and_then(|c| c.attrs.get("units"))
                .and_then(AttrValue::as_str)
                .map(str::to_string),
        }
    }
}

/// Groupby command - split the federated time axis into calendar periods
///
/// `freq` overrides the recipe's `group_freq`. Units are rebased to each
/// period start unless `keep_units` is set or the recipe turns it off.
/// Each group is summarized on one line; `full` prints whole descriptions.
pub async fn groupby_command(
    args: &DatasetArgs,
    freq: Option<&str>,
    keep_units: bool,
    full: bool,
    format: OutputFormat,
) -> Result<String> {
    let dataset = args.resolve().await?;
    let recipe = dataset.recipe.as_ref();

    let group_freq: GroupFrequency = match freq {
        Some(freq) => freq.parse()?,
        None => recipe
            .map(|r| r.group_frequency())
            .transpose()?
            .flatten()
            .ok_or_else(|| anyhow!("no group frequency: pass --freq or set group_freq in the recipe"))?,
    };
    let normalize_units = !keep_units && recipe.is_none_or(|r| r.normalize_units);

    let description = dataset.open().await?;
    let dim = dataset.options.concat_dim.as_str();
    let groups = groupby_time(&description, group_freq, dim, normalize_units)?;

    if full {
        render(&groups, format)
    } else {
        let rows: Vec<GroupSummary> = groups.iter().map(|g| GroupSummary::new(g, dim)).collect();
        render(&rows, format)
    }
}
