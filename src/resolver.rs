//! Turns the study registry into import tasks.

use crate::error::ResolutionError;
use crate::metadata::MetadataProvider;
use crate::transformer::TransformerFactory;
use crate::types::{ImportTask, StudyId};
use crate::utils::is_valid_download_directory;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Builds one [`ImportTask`] per registered study
pub struct TaskResolver {
    base_staging_path: PathBuf,
    provider: Arc<dyn MetadataProvider>,
    transformer_factory: Arc<dyn TransformerFactory>,
}

impl TaskResolver {
    /// Create a resolver staging under `base_staging_path`
    pub fn new(
        base_staging_path: impl Into<PathBuf>,
        provider: Arc<dyn MetadataProvider>,
        transformer_factory: Arc<dyn TransformerFactory>,
    ) -> Self {
        Self {
            base_staging_path: base_staging_path.into(),
            provider,
            transformer_factory,
        }
    }

    /// Base directory the staging paths are joined onto
    pub fn base_staging_path(&self) -> &Path {
        &self.base_staging_path
    }

    /// Resolve every registered study into an import task
    ///
    /// Each study's staging path is `base_staging_path/<download_directory>` and
    /// its transformer is built for that path. Tasks come back sorted by study id.
    ///
    /// # Errors
    ///
    /// Fails on the first inconsistency; no partial task list is returned:
    /// - [`ResolutionError::MissingMetadata`] - location registered without metadata
    /// - [`ResolutionError::InvalidDownloadDirectory`] - directory would leave the staging base
    /// - [`ResolutionError::StagingConflict`] - two staging paths are equal or nested
    /// - [`ResolutionError::Provider`] - the provider call itself failed
    pub async fn resolve(&self) -> Result<Vec<ImportTask>, ResolutionError> {
        let mut locations: Vec<(StudyId, String)> = self
            .provider
            .list_study_locations()
            .await?
            .into_iter()
            .collect();
        locations.sort_by(|a, b| a.0.cmp(&b.0));

        let mut claimed: BTreeMap<PathBuf, StudyId> = BTreeMap::new();
        let mut tasks = Vec::with_capacity(locations.len());

        for (study_id, source_location) in locations {
            let metadata = self.provider.get_metadata(&study_id).await?.ok_or_else(|| {
                ResolutionError::MissingMetadata {
                    study_id: study_id.clone(),
                }
            })?;

            if !is_valid_download_directory(&metadata.download_directory) {
                return Err(ResolutionError::InvalidDownloadDirectory {
                    study_id,
                    directory: metadata.download_directory,
                });
            }

            let staging_path = self.base_staging_path.join(&metadata.download_directory);
            if let Some((path, first)) = overlapping_claim(&claimed, &staging_path) {
                return Err(ResolutionError::StagingConflict {
                    path,
                    first,
                    second: study_id,
                });
            }
            claimed.insert(staging_path.clone(), study_id.clone());

            let transformer = self.transformer_factory.build(&staging_path);

            debug!(
                study_id = %study_id,
                staging_path = %staging_path.display(),
                source = %source_location,
                transformer = transformer.name(),
                "resolved import task"
            );

            tasks.push(ImportTask {
                study_id,
                staging_path,
                source_location,
                transformer,
            });
        }

        info!(tasks = tasks.len(), "resolved import tasks");
        Ok(tasks)
    }
}

/// Find a claimed staging path equal to, inside, or containing `path`
///
/// `claimed` never holds two overlapping paths. Paths order component-wise,
/// so an ancestor of `path` can only be its predecessor and a descendant
/// (or `path` itself) only its successor. Returns the outer of the two paths.
fn overlapping_claim(
    claimed: &BTreeMap<PathBuf, StudyId>,
    path: &Path,
) -> Option<(PathBuf, StudyId)> {
    let before = claimed
        .range::<Path, _>((Unbounded, Excluded(path)))
        .next_back()
        .filter(|(claimed_path, _)| path.starts_with(claimed_path))
        .map(|(claimed_path, study)| (claimed_path.clone(), study.clone()));

    before.or_else(|| {
        claimed
            .range::<Path, _>((Included(path), Unbounded))
            .next()
            .filter(|(claimed_path, _)| claimed_path.starts_with(path))
            .map(|(_, study)| (path.to_path_buf(), study.clone()))
    })
}
