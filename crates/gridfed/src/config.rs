// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Open options and YAML recipes
//!
//! A recipe names the sources of a federated dataset together with the
//! options used to open it and, optionally, how to regroup it:
//!
//! ```yaml
//! sources:
//!   pattern: "data/tas_*.cdl"
//! concat_dim: time
//! concurrency: 4
//! group_freq: 10Y
//! normalize_units: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FederationError, Result};
use crate::period::GroupFrequency;

pub const DEFAULT_CONCAT_DIM: &str = "time";
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Which sources make up a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSet {
    /// Explicit list, kept in the given order
    Paths(Vec<String>),
    /// Glob pattern, expanded to regular files in lexicographic order
    Pattern { pattern: String },
}

impl SourceSet {
    pub fn paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SourceSet::Paths(paths.into_iter().map(Into::into).collect())
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        SourceSet::Pattern {
            pattern: pattern.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    pub concat_dim: String,
    /// Maximum number of sources read at once
    pub concurrency: usize,
    /// Reject sources whose shared non-concat dimensions differ in size
    pub strict_dimensions: bool,
    /// Store the inferred sampling frequency on the concat coordinate
    pub infer_frequency: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            concat_dim: DEFAULT_CONCAT_DIM.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            strict_dimensions: true,
            infer_frequency: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub sources: SourceSet,
    #[serde(flatten)]
    pub options: OpenOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_freq: Option<String>,
    #[serde(default = "default_true")]
    pub normalize_units: bool,
}

impl Recipe {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let recipe: Recipe = serde_yaml_ng::from_str(text)?;
        recipe.group_frequency()?;
        Ok(recipe)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FederationError::Read {
                path: path.display().to_string(),
                source: e,
            })?;
        Self::from_yaml(&text)
    }

    pub fn group_frequency(&self) -> Result<Option<GroupFrequency>> {
        self.group_freq.as_deref().map(str::parse).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options: OpenOptions = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(options, OpenOptions::default());
        assert_eq!(options.concat_dim, "time");
        assert_eq!(options.concurrency, 8);
    }

    #[test]
    fn test_pattern_recipe() {
        let recipe = Recipe::from_yaml(
            "sources:\n  pattern: \"data/*.cdl\"\nconcurrency: 2\ngroup_freq: 10Y\n",
        )
        .unwrap();
        assert_eq!(recipe.sources, SourceSet::pattern("data/*.cdl"));
        assert_eq!(recipe.options.concurrency, 2);
        assert!(recipe.options.strict_dimensions);
        assert!(recipe.normalize_units);
        assert_eq!(recipe.group_frequency().unwrap().unwrap().to_string(), "10Y");
    }

    #[test]
    fn test_list_recipe() {
        let recipe = Recipe::from_yaml(
            "sources: [b.cdl, a.cdl]\nconcat_dim: step\nnormalize_units: false\n",
        )
        .unwrap();
        assert_eq!(recipe.sources, SourceSet::paths(["b.cdl", "a.cdl"]));
        assert_eq!(recipe.options.concat_dim, "step");
        assert!(!recipe.normalize_units);
        assert!(recipe.group_frequency().unwrap().is_none());
    }

    #[test]
    fn test_bad_recipes() {
        assert!(matches!(
            Recipe::from_yaml("concat_dim: time\n"),
            Err(FederationError::Config(_))
        ));
        assert!(matches!(
            Recipe::from_yaml("sources: [a.cdl]\ngroup_freq: 3W\n"),
            Err(FederationError::UnsupportedFrequency { .. })
        ));
    }
}
