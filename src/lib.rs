//! # somatic-etl
//!
//! Concurrent importer for per-study somatic mutation files.
//!
//! ## Design Philosophy
//!
//! somatic-etl is designed to be:
//! - **Failure-isolated** - One study's broken file never stops the others
//! - **Bounded** - At most `worker_count` studies are fetched and transformed at once
//! - **Library-first** - No CLI or UI; collaborators are passed in, never looked up
//! - **Format-agnostic** - Parsing and rewriting belong to the [`Transformer`] you plug in
//!
//! An import run resolves one [`ImportTask`] per registered study, runs each
//! through fetch → stage → transform on a [`WorkerPool`], waits for all of
//! them, and returns the success messages. Failures are logged and available
//! through [`Orchestrator::run_with_outcome`] and the event stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use somatic_etl::{Config, Orchestrator, StaticMetadataProvider};
//! use somatic_etl::transformer::PassthroughTransformerFactory;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = StaticMetadataProvider::new()
//!         .with_study("BRCA-UK", "https://dcc.example.org/ssm.BRCA-UK.tsv.gz", "brca_uk")
//!         .with_study("PACA-CA", "https://dcc.example.org/ssm.PACA-CA.tsv.gz", "paca_ca");
//!
//!     let config = Config {
//!         worker_count: 4,
//!         ..Config::with_staging_path("/data/staging")
//!     };
//!
//!     let orchestrator = Orchestrator::new(
//!         config,
//!         Arc::new(provider),
//!         Arc::new(PassthroughTransformerFactory),
//!     )?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     for message in orchestrator.run().await? {
//!         println!("{}", message);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Result aggregation
pub mod aggregator;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Source fetching (HTTP and local files)
pub mod fetch;
/// Study registry access
pub mod metadata;
/// Import run orchestration
pub mod orchestrator;
/// Bounded-concurrency worker pool
pub mod pool;
/// Task resolution
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Transformer seam
pub mod transformer;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use aggregator::ResultAggregator;
pub use config::{Config, FetchConfig, RetryConfig};
pub use error::{Error, ResolutionError, Result, TaskFailure};
pub use fetch::{DefaultFetcher, HttpFetcher, LocalFileFetcher, SourceFetcher};
pub use metadata::{MetadataProvider, RegistryEntry, StaticMetadataProvider};
pub use orchestrator::Orchestrator;
pub use pool::{TaskHandle, WorkerPool};
pub use resolver::TaskResolver;
pub use transformer::{Transformer, TransformerFactory};
pub use types::{
    AggregatedOutcome, Event, FailedTask, ImportTask, Stage, StudyId, StudyMetadata, TaskResult,
};
