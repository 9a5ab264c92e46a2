//! Passthrough transformer that keeps the staged file as-is

use super::{Transformer, TransformerFactory};
use crate::error::Error;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Transformer that leaves the staged file in place and reports it
///
/// Used when the destination format is the source format, and as the default
/// when no domain transformer is configured. It still checks that the staged
/// file exists inside its own staging directory.
#[derive(Debug, Clone)]
pub struct PassthroughTransformer {
    staging_path: PathBuf,
}

impl PassthroughTransformer {
    /// Create a transformer bound to `staging_path`
    pub fn new(staging_path: impl Into<PathBuf>) -> Self {
        Self {
            staging_path: staging_path.into(),
        }
    }

    /// Staging directory this transformer is bound to
    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }
}

#[async_trait]
impl Transformer for PassthroughTransformer {
    async fn transform(&self, staged_file: &Path) -> crate::Result<String> {
        if !staged_file.starts_with(&self.staging_path) {
            return Err(Error::Transform(format!(
                "{} is outside staging directory {}",
                staged_file.display(),
                self.staging_path.display()
            )));
        }

        let metadata = tokio::fs::metadata(staged_file).await?;
        if !metadata.is_file() {
            return Err(Error::Transform(format!(
                "{} is not a regular file",
                staged_file.display()
            )));
        }

        Ok(format!(
            "staged {} ({} bytes)",
            staged_file.display(),
            metadata.len()
        ))
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

/// Factory producing a [`PassthroughTransformer`] per task
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransformerFactory;

impl TransformerFactory for PassthroughTransformerFactory {
    fn build(&self, staging_path: &Path) -> Arc<dyn Transformer> {
        Arc::new(PassthroughTransformer::new(staging_path))
    }
}
