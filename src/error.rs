//! Error types for somatic-etl
//!
//! This module provides the error taxonomy for an import run:
//! - [`Error`] - the crate-wide error used by every collaborator
//! - [`ResolutionError`] - registry problems that abort a run before any task starts
//! - [`TaskFailure`] - a single study's fetch/stage/transform failure, recovered locally

use crate::types::{Stage, StudyId};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for somatic-etl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for somatic-etl
///
/// Each variant carries enough context to be useful in a single log line, since
/// per-task failures are only ever reported through logs and events.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "worker_count")
        key: Option<String>,
    },

    /// Task resolution failed; the run is aborted before submission
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Source could not be retrieved
    #[error("fetch failed for {location}: {reason}")]
    Fetch {
        /// The source location being fetched
        location: String,
        /// The reason the fetch failed
        reason: String,
    },

    /// Response body ended before the advertised length
    #[error("truncated body from {location}: expected {expected} bytes, received {received}")]
    Truncated {
        /// The source location being fetched
        location: String,
        /// Content-Length announced by the server
        expected: u64,
        /// Bytes actually written
        received: u64,
    },

    /// Source server answered with a non-success HTTP status
    #[error("HTTP {status} fetching {location}")]
    Http {
        /// The source location being fetched
        location: String,
        /// HTTP status code returned by the server
        status: u16,
    },

    /// Transformer rejected or failed to rewrite a staged file
    #[error("transform error: {0}")]
    Transform(String),

    /// Source location could not be interpreted
    #[error("invalid source location: {0}")]
    InvalidLocation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while turning the study registry into import tasks
///
/// Every variant is fatal for the run: no task is submitted once resolution fails.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// A study has a source location but no metadata (inconsistent registry)
    #[error("study {study_id} has a source location but no metadata")]
    MissingMetadata {
        /// The study whose metadata is missing
        study_id: StudyId,
    },

    /// The metadata provider itself failed
    #[error("metadata provider failed: {reason}")]
    Provider {
        /// The reason the provider call failed
        reason: String,
    },

    /// A download directory cannot be used as a staging sub-directory
    #[error("study {study_id} has invalid download directory {directory:?}")]
    InvalidDownloadDirectory {
        /// The study with the invalid directory
        study_id: StudyId,
        /// The directory name as supplied by the provider
        directory: String,
    },

    /// Two studies resolved to the same or nested staging paths
    #[error("staging paths of studies {first} and {second} overlap at {path}")]
    StagingConflict {
        /// The outer of the two overlapping staging paths
        path: PathBuf,
        /// The study that claimed the path first
        first: StudyId,
        /// The study that collided with it
        second: StudyId,
    },
}

impl From<Error> for ResolutionError {
    fn from(err: Error) -> Self {
        match err {
            Error::Resolution(inner) => inner,
            other => ResolutionError::Provider {
                reason: other.to_string(),
            },
        }
    }
}

/// Failure of one study's pipeline
///
/// Recovered by the worker pool: the display string becomes the message of a
/// failed [`TaskResult`](crate::types::TaskResult) and siblings keep running.
#[derive(Debug, Error)]
#[error("{stage} failed for study {study_id}: {source}")]
pub struct TaskFailure {
    /// The study whose task failed
    pub study_id: StudyId,
    /// The pipeline step that failed
    pub stage: Stage,
    /// The underlying error
    #[source]
    pub source: Error,
}

impl TaskFailure {
    /// Create a new task failure
    pub fn new(study_id: StudyId, stage: Stage, source: Error) -> Self {
        Self {
            study_id,
            stage,
            source,
        }
    }
}
