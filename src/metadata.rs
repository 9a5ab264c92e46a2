//! Study registry access
//!
//! The [`MetadataProvider`] trait is the seam between the importer and whatever
//! holds the list of registered studies. [`StaticMetadataProvider`] is an
//! in-memory registry, optionally loaded from a JSON file.

use crate::error::{Error, Result};
use crate::types::{StudyId, StudyMetadata};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Source of registered studies, their source locations, and their metadata
///
/// Consumed read-only by the [`TaskResolver`](crate::resolver::TaskResolver).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Map of every registered study to its source file location
    async fn list_study_locations(&self) -> Result<HashMap<StudyId, String>>;

    /// Metadata for one study, or `None` when the registry has no entry for it
    async fn get_metadata(&self, study_id: &StudyId) -> Result<Option<StudyMetadata>>;
}

/// One study as written in a registry file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Study identifier
    pub study_id: StudyId,
    /// Source file location (URL or filesystem path)
    pub source_location: String,
    /// Directory name under the staging base
    pub download_directory: String,
}

/// In-memory study registry
///
/// Locations and metadata are kept in separate maps, mirroring registries
/// where the two are maintained independently and can drift apart.
///
/// # Examples
///
/// ```
/// use somatic_etl::metadata::StaticMetadataProvider;
///
/// let provider = StaticMetadataProvider::new()
///     .with_study("BRCA-UK", "https://dcc.example.org/ssm.BRCA-UK.tsv.gz", "brca_uk")
///     .with_study("PACA-CA", "https://dcc.example.org/ssm.PACA-CA.tsv.gz", "paca_ca");
/// assert_eq!(provider.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StaticMetadataProvider {
    locations: HashMap<StudyId, String>,
    metadata: HashMap<StudyId, StudyMetadata>,
}

impl StaticMetadataProvider {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a study with both its location and metadata
    pub fn with_study(
        mut self,
        study_id: impl Into<StudyId>,
        source_location: impl Into<String>,
        download_directory: impl Into<String>,
    ) -> Self {
        let study_id = study_id.into();
        self.metadata.insert(
            study_id.clone(),
            StudyMetadata {
                study_id: study_id.clone(),
                download_directory: download_directory.into(),
            },
        );
        self.locations.insert(study_id, source_location.into());
        self
    }

    /// Register a source location without metadata
    pub fn with_location(
        mut self,
        study_id: impl Into<StudyId>,
        source_location: impl Into<String>,
    ) -> Self {
        self.locations
            .insert(study_id.into(), source_location.into());
        self
    }

    /// Build a registry from entries
    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        entries.into_iter().fold(Self::new(), |provider, entry| {
            provider.with_study(
                entry.study_id,
                entry.source_location,
                entry.download_directory,
            )
        })
    }

    /// Load a registry from a JSON array of [`RegistryEntry`] values
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read registry '{}': {}", path.display(), e),
            ))
        })?;
        let entries: Vec<RegistryEntry> = serde_json::from_slice(&content)?;

        tracing::debug!(
            path = %path.display(),
            studies = entries.len(),
            "loaded study registry"
        );

        Ok(Self::from_entries(entries))
    }

    /// Number of studies with a registered location
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// True when no study is registered
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadataProvider {
    async fn list_study_locations(&self) -> Result<HashMap<StudyId, String>> {
        Ok(self.locations.clone())
    }

    async fn get_metadata(&self, study_id: &StudyId) -> Result<Option<StudyMetadata>> {
        Ok(self.metadata.get(study_id).cloned())
    }
}
