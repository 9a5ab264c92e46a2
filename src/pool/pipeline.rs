//! Per-task pipeline: fetch → stage → transform.

use super::PipelineContext;
use crate::error::{Error, TaskFailure};
use crate::retry::fetch_with_retry;
use crate::types::{Event, ImportTask, Stage, TaskResult};
use crate::utils::{partial_path, sha256_file, staged_file_name};
use tracing::debug;

/// Run one task to its terminal result
///
/// Never fails: every error is folded into a failed [`TaskResult`] whose
/// message is the [`TaskFailure`] display string.
pub(crate) async fn run_import_task(task: ImportTask, ctx: &PipelineContext) -> TaskResult {
    let study_id = task.study_id.clone();

    match execute(&task, ctx).await {
        Ok(message) => {
            debug!(study_id = %study_id, %message, "import task completed");
            let _ = ctx.event_tx.send(Event::TaskCompleted {
                study_id: study_id.clone(),
                message: message.clone(),
            });
            TaskResult::success(study_id, message)
        }
        Err(failure) => {
            let message = failure.to_string();
            debug!(study_id = %study_id, stage = %failure.stage, %message, "import task failed");
            let _ = ctx.event_tx.send(Event::TaskFailed {
                study_id: study_id.clone(),
                stage: Some(failure.stage),
                error: message.clone(),
            });
            TaskResult::failure(study_id, Some(failure.stage), message)
        }
    }
}

async fn execute(task: &ImportTask, ctx: &PipelineContext) -> Result<String, TaskFailure> {
    let fail = |stage: Stage| {
        let study_id = task.study_id.clone();
        move |source: Error| TaskFailure::new(study_id, stage, source)
    };

    let staged_file = task
        .staging_path
        .join(staged_file_name(&task.source_location));
    let partial = partial_path(&staged_file);

    // Fetch
    tokio::fs::create_dir_all(&task.staging_path)
        .await
        .map_err(|e| fail(Stage::Fetch)(e.into()))?;

    let bytes = fetch_with_retry(
        &ctx.retry,
        ctx.fetcher.as_ref(),
        &task.source_location,
        &partial,
    )
    .await
    .map_err(fail(Stage::Fetch))?;

    let _ = ctx.event_tx.send(Event::Fetched {
        study_id: task.study_id.clone(),
        bytes,
    });

    // Stage
    tokio::fs::rename(&partial, &staged_file)
        .await
        .map_err(|e| fail(Stage::Stage)(e.into()))?;
    let sha256 = sha256_file(&staged_file)
        .await
        .map_err(fail(Stage::Stage))?;

    debug!(
        study_id = %task.study_id,
        path = %staged_file.display(),
        bytes,
        %sha256,
        "staged source file"
    );
    let _ = ctx.event_tx.send(Event::Staged {
        study_id: task.study_id.clone(),
        path: staged_file.clone(),
        sha256,
    });

    // Transform
    let _ = ctx.event_tx.send(Event::Transforming {
        study_id: task.study_id.clone(),
    });
    task.transformer
        .transform(&staged_file)
        .await
        .map_err(fail(Stage::Transform))
}
