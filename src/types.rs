//! Core types for somatic-etl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::transformer::Transformer;

/// Identifier of a registered study (e.g. "BRCA-UK")
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudyId(pub String);

impl StudyId {
    /// Create a new StudyId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StudyId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StudyId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for StudyId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StudyId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for StudyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-study metadata supplied by a [`MetadataProvider`](crate::metadata::MetadataProvider)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyMetadata {
    /// Study this metadata belongs to
    pub study_id: StudyId,
    /// Name of the study's directory under the base staging path
    pub download_directory: String,
}

/// Pipeline step of an import task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Retrieve the source file into the staging directory
    Fetch,
    /// Promote the partial file to its staged name
    Stage,
    /// Rewrite the staged file into the destination format
    Transform,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Stage => "stage",
            Stage::Transform => "transform",
        };
        f.write_str(name)
    }
}

/// One unit of work: fetch, stage and transform a single study's source file
///
/// Created once per study by the [`TaskResolver`](crate::resolver::TaskResolver)
/// and moved into the worker that executes it.
#[derive(Clone)]
pub struct ImportTask {
    /// Study this task imports
    pub study_id: StudyId,
    /// Directory holding the study's in-flight files
    pub staging_path: PathBuf,
    /// Where the source file is fetched from (URL or filesystem path)
    pub source_location: String,
    /// Transformer bound to `staging_path`
    pub transformer: Arc<dyn Transformer>,
}

impl std::fmt::Debug for ImportTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportTask")
            .field("study_id", &self.study_id)
            .field("staging_path", &self.staging_path)
            .field("source_location", &self.source_location)
            .field("transformer", &self.transformer.name())
            .finish()
    }
}

/// Terminal outcome of one import task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Study the task imported
    pub study_id: StudyId,
    /// Transformer message on success, failure message otherwise
    pub message: String,
    /// Whether the pipeline completed
    pub succeeded: bool,
    /// Step that failed (None on success, or when the worker itself aborted)
    pub failed_stage: Option<Stage>,
}

impl TaskResult {
    /// Successful outcome carrying the transformer's message
    pub fn success(study_id: StudyId, message: impl Into<String>) -> Self {
        Self {
            study_id,
            message: message.into(),
            succeeded: true,
            failed_stage: None,
        }
    }

    /// Failed outcome carrying the failure's message
    pub fn failure(study_id: StudyId, stage: Option<Stage>, message: impl Into<String>) -> Self {
        Self {
            study_id,
            message: message.into(),
            succeeded: false,
            failed_stage: stage,
        }
    }
}

/// A failed task as recorded in an [`AggregatedOutcome`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    /// Study whose task failed
    pub study_id: StudyId,
    /// Step that failed, if known
    pub stage: Option<Stage>,
    /// Failure message
    pub message: String,
}

/// Run-level result: every submitted task contributes exactly one entry
/// to either `successes` or `failures`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedOutcome {
    /// Success messages in completion order
    pub successes: Vec<String>,
    /// Failed tasks in completion order
    pub failures: Vec<FailedTask>,
    /// When aggregation started waiting
    pub started_at: DateTime<Utc>,
    /// When the last task settled
    pub finished_at: DateTime<Utc>,
}

impl AggregatedOutcome {
    /// Outcome of a run that had nothing to do
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Number of tasks that settled, successful or not
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Number of successful tasks
    pub fn succeeded(&self) -> usize {
        self.successes.len()
    }

    /// Number of failed tasks
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when no task failed
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Event emitted during an import run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Tasks resolved, submission about to begin
    RunStarted {
        /// Number of tasks in the run
        tasks: usize,
    },

    /// Task submitted and waiting for a worker
    TaskQueued {
        /// Study ID
        study_id: StudyId,
    },

    /// Task acquired a worker slot
    TaskStarted {
        /// Study ID
        study_id: StudyId,
    },

    /// Source file retrieved
    Fetched {
        /// Study ID
        study_id: StudyId,
        /// Bytes written to the partial file
        bytes: u64,
    },

    /// Source file promoted to its staged name
    Staged {
        /// Study ID
        study_id: StudyId,
        /// Path of the staged file
        path: PathBuf,
        /// Hex-encoded SHA-256 of the staged file
        sha256: String,
    },

    /// Transformer started
    Transforming {
        /// Study ID
        study_id: StudyId,
    },

    /// Task finished successfully
    TaskCompleted {
        /// Study ID
        study_id: StudyId,
        /// Transformer message
        message: String,
    },

    /// Task failed
    TaskFailed {
        /// Study ID
        study_id: StudyId,
        /// Failed step, if known
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<Stage>,
        /// Error message
        error: String,
    },

    /// Every task settled
    RunFinished {
        /// Number of successful tasks
        succeeded: usize,
        /// Number of failed tasks
        failed: usize,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_study_id_compares_with_str() {
        let id = StudyId::from("PACA-CA");
        assert_eq!(id, "PACA-CA");
        assert_eq!(id.to_string(), "PACA-CA");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::TaskFailed {
            study_id: StudyId::from("B"),
            stage: Some(Stage::Fetch),
            error: "B:fetch error".into(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_failed");
        assert_eq!(json["study_id"], "B");
        assert_eq!(json["stage"], "fetch");
    }

    #[test]
    fn test_outcome_counts() {
        let mut outcome = AggregatedOutcome::empty();
        outcome.successes.push("A:done".into());
        outcome.failures.push(FailedTask {
            study_id: StudyId::from("B"),
            stage: Some(Stage::Transform),
            message: "bad header".into(),
        });

        assert_eq!(outcome.total(), 2);
        assert_eq!(outcome.succeeded(), 1);
        assert_eq!(outcome.failed(), 1);
        assert!(!outcome.is_complete_success());
    }
}
