//! Result aggregation: wait for every task, then report once.
//!
//! Handles are consumed by value, so a task's result can only ever be
//! observed and reported a single time.

use crate::pool::TaskHandle;
use crate::types::{AggregatedOutcome, FailedTask, TaskResult};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{error, info};

/// Collects [`TaskResult`]s into an [`AggregatedOutcome`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// Create an aggregator
    pub fn new() -> Self {
        Self
    }

    /// Wait until every handle has settled, then aggregate in one pass
    ///
    /// Results are collected in completion order. Each success is logged at
    /// info level and each failure at error level, exactly once per task.
    pub async fn await_all(
        &self,
        handles: impl IntoIterator<Item = TaskHandle>,
    ) -> AggregatedOutcome {
        let started_at = Utc::now();
        let mut pending: FuturesUnordered<TaskHandle> = handles.into_iter().collect();
        let mut settled = Vec::with_capacity(pending.len());

        while let Some(result) = pending.next().await {
            settled.push(result);
        }

        for result in &settled {
            if result.succeeded {
                info!(study_id = %result.study_id, "{}", result.message);
            } else {
                error!(study_id = %result.study_id, "{}", result.message);
            }
        }

        aggregate(settled, started_at, Utc::now())
    }
}

impl AggregatedOutcome {
    /// Aggregate already-settled results, keeping their order
    ///
    /// Pure: aggregating the same result set twice yields equal outcomes.
    pub fn from_results(results: &[TaskResult]) -> Self {
        let now = Utc::now();
        aggregate(results.iter().cloned(), now, now)
    }
}

fn aggregate(
    results: impl IntoIterator<Item = TaskResult>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> AggregatedOutcome {
    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for result in results {
        if result.succeeded {
            successes.push(result.message);
        } else {
            failures.push(FailedTask {
                study_id: result.study_id,
                stage: result.failed_stage,
                message: result.message,
            });
        }
    }

    AggregatedOutcome {
        successes,
        failures,
        started_at,
        finished_at,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::pool::WorkerPool;
    use crate::test_helpers::{Behavior, StubFetcher, StubTransformer, stub_task};
    use crate::types::{Stage, StudyId};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn create_pool(worker_count: usize, fetcher: StubFetcher) -> WorkerPool {
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        let retry = RetryConfig {
            max_attempts: 0,
            ..Default::default()
        };
        WorkerPool::new(worker_count, Arc::new(fetcher), retry, event_tx)
    }

    fn sample_results() -> Vec<TaskResult> {
        vec![
            TaskResult::success(StudyId::from("A"), "A:done"),
            TaskResult::failure(StudyId::from("B"), Some(Stage::Fetch), "B:fetch error"),
            TaskResult::success(StudyId::from("C"), "C:done"),
        ]
    }

    #[test]
    fn test_from_results_separates_successes_and_failures() {
        let outcome = AggregatedOutcome::from_results(&sample_results());

        assert_eq!(outcome.successes, vec!["A:done", "C:done"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].study_id, "B");
        assert_eq!(outcome.failures[0].stage, Some(Stage::Fetch));
        assert_eq!(outcome.failures[0].message, "B:fetch error");
    }

    #[test]
    fn test_from_results_is_idempotent() {
        let results = sample_results();

        let first = AggregatedOutcome::from_results(&results);
        let second = AggregatedOutcome::from_results(&results);

        assert_eq!(first.successes, second.successes);
        assert_eq!(first.failures, second.failures);
        assert_eq!(first.total(), results.len());
    }

    #[tokio::test]
    async fn test_await_all_with_no_handles() {
        let outcome = ResultAggregator::new().await_all(Vec::new()).await;

        assert_eq!(outcome.total(), 0);
        assert!(outcome.is_complete_success());
        assert!(outcome.finished_at >= outcome.started_at);
    }

    #[tokio::test]
    async fn test_await_all_accounts_for_every_handle() {
        let staging = tempdir().unwrap();
        let pool = create_pool(
            2,
            StubFetcher::new().failing("/sources/B.tsv", "B:fetch error"),
        );

        let handles: Vec<_> = ["A", "B", "C", "D"]
            .iter()
            .map(|study| {
                let transformer =
                    StubTransformer::new(Behavior::Succeed(format!("{}:done", study)));
                pool.submit(stub_task(staging.path(), study, transformer))
            })
            .collect();

        let outcome = ResultAggregator::new().await_all(handles).await;

        assert_eq!(outcome.total(), 4);
        assert_eq!(outcome.succeeded(), 3);
        assert_eq!(outcome.failed(), 1);

        let mut successes = outcome.successes.clone();
        successes.sort();
        assert_eq!(successes, vec!["A:done", "C:done", "D:done"]);
        assert!(
            outcome
                .successes
                .iter()
                .all(|m| !m.contains("B:fetch error"))
        );
    }

    #[tokio::test]
    async fn test_successes_are_in_completion_order() {
        let staging = tempdir().unwrap();
        let pool = create_pool(3, StubFetcher::new());

        // Submitted slow first; the fast task must be reported first
        let slow = StubTransformer::new(Behavior::Succeed("slow".into()))
            .with_delay(Duration::from_millis(200));
        let fast = StubTransformer::new(Behavior::Succeed("fast".into()));

        let handles = vec![
            pool.submit(stub_task(staging.path(), "SLOW", slow)),
            pool.submit(stub_task(staging.path(), "FAST", fast)),
        ];

        let outcome = ResultAggregator::new().await_all(handles).await;
        assert_eq!(outcome.successes, vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_await_all_waits_for_every_task() {
        let staging = tempdir().unwrap();
        let pool = create_pool(1, StubFetcher::new().with_delay(Duration::from_millis(20)));

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let transformer = StubTransformer::new(Behavior::Succeed(format!("{}", i)));
                pool.submit(stub_task(staging.path(), &format!("S{}", i), transformer))
            })
            .collect();

        let outcome = ResultAggregator::new().await_all(handles).await;

        assert_eq!(outcome.succeeded(), 5);
        assert_eq!(pool.active_workers(), 0, "nothing may still be running");
    }
}
