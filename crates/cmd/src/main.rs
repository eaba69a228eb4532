// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cmd::commands::{describe_command, groupby_command, sources_command};
use cmd::common::{DatasetArgs, OutputFormat};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "gridfed")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged description of a set of sources
    Describe {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
    /// List the sources overlapping a coordinate range
    Sources {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Lower bound, in raw coordinate values
        #[arg(long)]
        start: Option<f64>,

        /// Upper bound, in raw coordinate values
        #[arg(long)]
        end: Option<f64>,
    },
    /// Split the time axis into calendar periods (10Y, 1Y, 3M, 1D, 6H)
    Groupby {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Group frequency; defaults to the recipe's group_freq
        #[arg(long)]
        freq: Option<String>,

        /// Keep the original time units instead of rebasing them
        #[arg(long)]
        keep_units: bool,

        /// Print every group's full description instead of one line each
        #[arg(long)]
        full: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();

    let cli = Cli::parse();

    let output = match &cli.command {
        Commands::Describe { dataset, format } => describe_command(dataset, *format).await?,
        Commands::Sources {
            dataset,
            start,
            end,
        } => sources_command(dataset, *start, *end).await?,
        Commands::Groupby {
            dataset,
            freq,
            keep_units,
            full,
            format,
        } => groupby_command(dataset, freq.as_deref(), *keep_units, *full, *format).await?,
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        writeln!(stdout)?;
    }
    Ok(())
}
