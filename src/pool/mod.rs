//! Bounded-concurrency execution of import tasks.
//!
//! Every submitted task is spawned immediately and waits for one of
//! `worker_count` semaphore permits before running its fetch, stage and
//! transform steps. Waiting tasks form an unbounded queue; there is no
//! backpressure towards the submitter.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinHandle;

use crate::config::RetryConfig;
use crate::fetch::SourceFetcher;
use crate::types::{Event, ImportTask, StudyId, TaskResult};

mod pipeline;


/// Collaborators shared by every task's pipeline
#[derive(Clone)]
pub(crate) struct PipelineContext {
    pub(crate) fetcher: Arc<dyn SourceFetcher>,
    pub(crate) retry: RetryConfig,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

/// Fixed-size executor for [`ImportTask`]s
///
/// Clones share the same worker slots.
#[derive(Clone)]
pub struct WorkerPool {
    worker_count: usize,
    /// One permit per worker slot
    permits: Arc<Semaphore>,
    /// Number of tasks currently holding a permit
    active: Arc<AtomicUsize>,
    ctx: PipelineContext,
}

impl WorkerPool {
    /// Create a pool running at most `worker_count` tasks at once
    ///
    /// A `worker_count` of zero is raised to one; [`Config::validate`](crate::Config::validate)
    /// rejects it before an orchestrator gets this far.
    pub fn new(
        worker_count: usize,
        fetcher: Arc<dyn SourceFetcher>,
        retry: RetryConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        let worker_count = worker_count.max(1);
        Self {
            worker_count,
            permits: Arc::new(Semaphore::new(worker_count)),
            active: Arc::new(AtomicUsize::new(0)),
            ctx: PipelineContext {
                fetcher,
                retry,
                event_tx,
            },
        }
    }

    /// Configured number of worker slots
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of tasks executing right now
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop handing out worker slots
    ///
    /// Tasks already running finish normally. Tasks still waiting for a slot,
    /// and tasks submitted afterwards, settle as failed results without a stage.
    pub fn close(&self) {
        self.permits.close();
    }

    /// True once [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Submit a task for execution
    ///
    /// Returns immediately. The task starts once a worker slot is free; the
    /// returned handle resolves exactly once with its [`TaskResult`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, task: ImportTask) -> TaskHandle {
        let study_id = task.study_id.clone();
        let permits = self.permits.clone();
        let active = self.active.clone();
        let ctx = self.ctx.clone();

        let _ = ctx.event_tx.send(Event::TaskQueued {
            study_id: study_id.clone(),
        });

        let inner = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let message = "worker pool closed";
                    let _ = ctx.event_tx.send(Event::TaskFailed {
                        study_id: task.study_id.clone(),
                        stage: None,
                        error: message.to_string(),
                    });
                    return TaskResult::failure(task.study_id, None, message);
                }
            };
            let _slot = ActiveSlot::enter(&active);

            let _ = ctx.event_tx.send(Event::TaskStarted {
                study_id: task.study_id.clone(),
            });

            pipeline::run_import_task(task, &ctx).await
        });

        TaskHandle { study_id, inner }
    }
}

/// Marks a worker slot busy for as long as it lives, including unwinding
struct ActiveSlot(Arc<AtomicUsize>);

impl ActiveSlot {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to a submitted task, resolving once with its [`TaskResult`]
///
/// A worker that panics resolves to a failed result instead of propagating
/// the panic.
#[must_use = "dropping a TaskHandle discards the task's result"]
#[derive(Debug)]
pub struct TaskHandle {
    study_id: StudyId,
    inner: JoinHandle<TaskResult>,
}

impl TaskHandle {
    /// Study the task belongs to
    pub fn study_id(&self) -> &StudyId {
        &self.study_id
    }

    /// True once the task has settled
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Future for TaskHandle {
    type Output = TaskResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    "worker panicked"
                } else {
                    "worker cancelled"
                };
                Poll::Ready(TaskResult::failure(
                    self.study_id.clone(),
                    None,
                    format!("{} while importing study {}", reason, self.study_id),
                ))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
