// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;

use crate::common::{DatasetArgs, OutputFormat, render};
use diagnostics::*;

/// Describe command - the merged description of all sources, registry included
pub async fn describe_command(args: &DatasetArgs, format: OutputFormat) -> Result<String> {
    let dataset = args.resolve().await?;
    let description = dataset.open().await?;

    let problems = description.validate();
    for problem in &problems {
        let problem = problem.to_string();
        warn!("{problem}", problem: problem);
    }
    render(&description, format)
}
