//! Import run orchestration
//!
//! Wires the [`TaskResolver`], [`WorkerPool`] and [`ResultAggregator`]
//! together: resolve every task, submit them all, then wait once for the
//! complete set of results.

use crate::aggregator::ResultAggregator;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{DefaultFetcher, SourceFetcher};
use crate::metadata::MetadataProvider;
use crate::pool::{TaskHandle, WorkerPool};
use crate::resolver::TaskResolver;
use crate::transformer::TransformerFactory;
use crate::types::{AggregatedOutcome, Event};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Entry point of an import run
///
/// # Example
///
/// ```no_run
/// use somatic_etl::{Config, Orchestrator, StaticMetadataProvider};
/// use somatic_etl::transformer::PassthroughTransformerFactory;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = StaticMetadataProvider::new()
///         .with_study("BRCA-UK", "https://dcc.example.org/ssm.BRCA-UK.tsv.gz", "brca_uk");
///
///     let orchestrator = Orchestrator::new(
///         Config::with_staging_path("/data/staging"),
///         Arc::new(provider),
///         Arc::new(PassthroughTransformerFactory),
///     )?;
///
///     for message in orchestrator.run().await? {
///         println!("{}", message);
///     }
///     Ok(())
/// }
/// ```
pub struct Orchestrator {
    resolver: TaskResolver,
    pool: WorkerPool,
    aggregator: ResultAggregator,
    event_tx: broadcast::Sender<Event>,
}

impl Orchestrator {
    /// Create an orchestrator that fetches with the [`DefaultFetcher`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration, or
    /// [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(
        config: Config,
        provider: Arc<dyn MetadataProvider>,
        transformer_factory: Arc<dyn TransformerFactory>,
    ) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(DefaultFetcher::new(&config.fetch)?);
        Self::with_fetcher(config, provider, transformer_factory, fetcher)
    }

    /// Create an orchestrator with a custom [`SourceFetcher`]
    pub fn with_fetcher(
        config: Config,
        provider: Arc<dyn MetadataProvider>,
        transformer_factory: Arc<dyn TransformerFactory>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let resolver = TaskResolver::new(
            config.base_staging_path.clone(),
            provider,
            transformer_factory,
        );
        let pool = WorkerPool::new(
            config.worker_count,
            fetcher,
            config.retry.clone(),
            event_tx.clone(),
        );

        Ok(Self {
            resolver,
            pool,
            aggregator: ResultAggregator::new(),
            event_tx,
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The worker pool tasks are submitted to
    pub fn worker_pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Import every registered study and return the success messages
    ///
    /// The list may be shorter than the number of studies: failed tasks are
    /// logged at error level and left out. Use [`run_with_outcome`](Self::run_with_outcome)
    /// to get the failures as well.
    ///
    /// # Errors
    ///
    /// Only [`Error::Resolution`]: when the registry cannot be resolved, no
    /// task is submitted at all.
    pub async fn run(&self) -> Result<Vec<String>> {
        Ok(self.run_with_outcome().await?.successes)
    }

    /// Import every registered study and return the full outcome
    pub async fn run_with_outcome(&self) -> Result<AggregatedOutcome> {
        let tasks = self.resolver.resolve().await.map_err(|e| {
            error!(error = %e, "task resolution failed, nothing submitted");
            Error::Resolution(e)
        })?;

        info!(
            tasks = tasks.len(),
            workers = self.pool.worker_count(),
            staging = %self.resolver.base_staging_path().display(),
            "starting import run"
        );
        let _ = self.event_tx.send(Event::RunStarted { tasks: tasks.len() });

        let handles: Vec<TaskHandle> = tasks
            .into_iter()
            .map(|task| self.pool.submit(task))
            .collect();

        let outcome = self.aggregator.await_all(handles).await;

        info!(
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            "import run finished"
        );
        let _ = self.event_tx.send(Event::RunFinished {
            succeeded: outcome.succeeded(),
            failed: outcome.failed(),
        });

        Ok(outcome)
    }
}
