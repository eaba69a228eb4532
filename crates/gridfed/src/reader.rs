// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Per-source metadata readers

use async_trait::async_trait;
use std::path::Path;

use crate::cdl::parse_cdl;
use crate::error::{FederationError, Result};
use crate::metadata::PerFileMetadata;
use diagnostics::*;

/// Reads the structural metadata of one source
///
/// Implementations release whatever handle they open before returning and
/// never load payload beyond the concatenation coordinate.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn read(&self, source: &str, concat_dim: &str) -> Result<PerFileMetadata>;
}

/// Reads CDL text files (`ncdump` output) from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct CdlReader;

impl CdlReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataProvider for CdlReader {
    async fn read(&self, source: &str, concat_dim: &str) -> Result<PerFileMetadata> {
        let text = tokio::fs::read_to_string(Path::new(source))
            .await
            .map_err(|e| FederationError::Read {
                path: source.to_string(),
                source: e,
            })?;
        let meta = parse_cdl(source, &text, concat_dim)?;
        let size = meta.dims.get(concat_dim).copied().unwrap_or(0);
        debug!("read {source}: {size} steps along {concat_dim}", source: source, size: size, concat_dim: concat_dim);
        Ok(meta)
    }
}
