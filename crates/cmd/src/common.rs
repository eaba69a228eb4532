// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

use gridfed::{CdlReader, DatasetDescription, OpenOptions, Recipe, SourceSet, open_mfdataset};

/// Where the sources of a dataset come from, shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct DatasetArgs {
    /// Source files, read in the order given
    pub sources: Vec<String>,

    /// Glob pattern; matching files are read in lexicographic order
    #[arg(short, long, conflicts_with = "sources")]
    pub pattern: Option<String>,

    /// YAML recipe with sources and open options; flags given here win
    #[arg(short, long)]
    pub recipe: Option<PathBuf>,

    /// Dimension the sources are concatenated along
    #[arg(long)]
    pub concat_dim: Option<String>,

    /// Maximum number of sources read at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Allow shared dimensions to differ in size between sources
    #[arg(long)]
    pub relaxed: bool,
}

/// Sources and options after merging the recipe with the command line
#[derive(Debug, Clone)]
pub struct ResolvedDataset {
    pub sources: SourceSet,
    pub options: OpenOptions,
    pub recipe: Option<Recipe>,
}

impl DatasetArgs {
    pub async fn resolve(&self) -> Result<ResolvedDataset> {
        let recipe = match &self.recipe {
            Some(path) => Some(Recipe::load(path).await?),
            None => None,
        };

        let sources = if !self.sources.is_empty() {
            SourceSet::paths(self.sources.iter().cloned())
        } else if let Some(pattern) = &self.pattern {
            SourceSet::pattern(pattern.clone())
        } else if let Some(recipe) = &recipe {
            recipe.sources.clone()
        } else {
            bail!("no sources given: pass source paths, --pattern or --recipe");
        };

        let mut options = recipe
            .as_ref()
            .map(|r| r.options.clone())
            .unwrap_or_default();
        if let Some(dim) = &self.concat_dim {
            options.concat_dim = dim.clone();
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }
        if self.relaxed {
            options.strict_dimensions = false;
        }

        Ok(ResolvedDataset {
            sources,
            options,
            recipe,
        })
    }
}

impl ResolvedDataset {
    pub async fn open(&self) -> Result<DatasetDescription> {
        let reader = CdlReader::new();
        Ok(open_mfdataset(&reader, &self.sources, &self.options).await?)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml_ng::to_string(value)?,
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
    })
}
