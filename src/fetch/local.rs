//! Local filesystem source fetcher

use super::{SourceFetcher, SourceKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;

/// Copies a file from a local or mounted filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileFetcher;

impl LocalFileFetcher {
    /// Copy `source` to `dest`
    pub async fn copy_file(&self, source: &Path, dest: &Path) -> Result<u64> {
        let bytes = tokio::fs::copy(source, dest).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to copy '{}': {}", source.display(), e),
            ))
        })?;

        tracing::debug!(source = %source.display(), bytes, dest = %dest.display(), "copied source");
        Ok(bytes)
    }
}

#[async_trait]
impl SourceFetcher for LocalFileFetcher {
    async fn fetch(&self, location: &str, dest: &Path) -> Result<u64> {
        match SourceKind::parse(location)? {
            SourceKind::Local(path) => self.copy_file(&path, dest).await,
            SourceKind::Http(url) => Err(Error::InvalidLocation(format!(
                "{} is not a local file",
                url
            ))),
        }
    }
}
