//! Per-task routine: cache check, step execution, result recording.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sweep_core::{ChangesetSpec, Task, build_changeset_spec};
use tokio::sync::watch;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

use super::{RoutineResult, Shared, TaskEntry};
use crate::error::{CacheError, ExecutionError, StepError};
use crate::log::TaskLog;
use crate::runner::RunContext;
use crate::status::TaskStatus;

/// What a task contributed, published with its final status.
#[derive(Default)]
struct Completion {
    cached: bool,
    spec: Option<ChangesetSpec>,
}

/// Runs one task to completion and publishes its final status exactly once.
pub(super) async fn run(
    shared: &Shared,
    entry: &TaskEntry,
    token: &CancellationToken,
) -> RoutineResult {
    let status = entry.status.as_ref();
    status.send_modify(|current| current.started_at = Some(Utc::now()));

    let mut completion = Completion::default();
    let result = execute(shared, &entry.task, status, token, &mut completion)
        .await
        .map_err(Arc::new);

    match &result {
        Ok(()) => tracing::info!(
            cached = completion.cached,
            produced_spec = completion.spec.is_some(),
            "task finished"
        ),
        Err(error) => tracing::warn!(%error, "task failed"),
    }

    let err = result.as_ref().err().cloned();
    status.send_modify(move |current| {
        current.finished_at = Some(Utc::now());
        current.currently_executing = None;
        current.cached = completion.cached;
        current.changeset_spec = completion.spec;
        current.err = err;
    });
    result
}

async fn execute(
    shared: &Shared,
    task: &Task,
    status: &watch::Sender<TaskStatus>,
    token: &CancellationToken,
    completion: &mut Completion,
) -> Result<(), ExecutionError> {
    let repository = &task.repository.name;
    let key = task.cache_key();

    if shared.config.clear_cache {
        tracing::debug!(%key, "clearing cache entry");
        cancellable(token, shared.cache.clear(&key))
            .await
            .map_err(|source| ExecutionError::CacheClear {
                repository: repository.clone(),
                source,
            })?;
    } else {
        let cached = cancellable(token, shared.cache.get(&key))
            .await
            .map_err(|source| ExecutionError::CacheLookup {
                repository: repository.clone(),
                source,
            })?;

        if let Some(cached) = cached {
            tracing::debug!(%key, "cache hit");
            completion.cached = true;
            let diff = cached.single_diff().unwrap_or_default();
            if !diff.is_empty() {
                let spec = build_changeset_spec(task, diff, shared.features);
                record(shared, completion, spec).await;
            }
            return Ok(());
        }
        tracing::debug!(%key, "cache miss");
    }

    let log = shared
        .logs
        .add_task(task)
        .await
        .map_err(|source| ExecutionError::LogFile {
            repository: repository.clone(),
            source,
        })?;
    let log_file = log.path().to_path_buf();
    status.send_modify(|current| current.log_file = Some(log_file.clone()));

    let result = run_and_record(shared, task, status, token, &log, completion).await;
    if result.is_err() {
        log.mark_errored();
    }
    if let Err(error) = log.close().await {
        tracing::warn!(%error, log_file = %log_file.display(), "closing task log failed");
    }
    result
}

async fn run_and_record(
    shared: &Shared,
    task: &Task,
    status: &watch::Sender<TaskStatus>,
    token: &CancellationToken,
    log: &TaskLog,
    completion: &mut Completion,
) -> Result<(), ExecutionError> {
    let repository = &task.repository.name;
    let timeout = shared.config.timeout();
    let ctx = RunContext::new(token.child_token(), Instant::now() + timeout);

    let progress = |step: &str| {
        status.send_modify(|current| current.currently_executing = Some(step.to_owned()));
    };
    let run = shared
        .runner
        .run_steps(&ctx, &task.repository, &task.steps, log, &progress);

    let diff = match timeout_at(ctx.deadline(), run).await {
        Ok(Ok(diff)) => diff,
        Ok(Err(source)) => {
            return Err(step_failure(source, &ctx, repository, log.path(), timeout));
        }
        Err(_elapsed) => {
            return Err(ExecutionError::Timeout {
                repository: repository.clone(),
                log_file: log.path().to_path_buf(),
                timeout,
            });
        }
    };

    let spec = build_changeset_spec(task, &diff, shared.features);
    // Outer token: an expired deadline must not lose a finished result.
    let cached = cancellable(token, shared.cache.set(&task.cache_key(), &spec)).await;

    if !diff.is_empty() {
        record(shared, completion, spec).await;
    }

    cached.map_err(|source| ExecutionError::CacheWrite {
        repository: repository.clone(),
        log_file: log.path().to_path_buf(),
        source,
    })
}

async fn record(shared: &Shared, completion: &mut Completion, spec: ChangesetSpec) {
    shared.specs.lock().await.push(spec.clone());
    completion.spec = Some(spec);
}

/// Classifies a step runner failure, separating deadline expiry from other
/// failures.
fn step_failure(
    source: StepError,
    ctx: &RunContext,
    repository: &str,
    log_file: &Path,
    timeout: Duration,
) -> ExecutionError {
    let timed_out = match &source {
        StepError::DeadlineExceeded => true,
        StepError::Killed { .. } => ctx.deadline_reached(),
        _ => false,
    };

    if timed_out {
        ExecutionError::Timeout {
            repository: repository.to_owned(),
            log_file: log_file.to_path_buf(),
            timeout,
        }
    } else {
        ExecutionError::Execution {
            repository: repository.to_owned(),
            log_file: log_file.to_path_buf(),
            source,
        }
    }
}

/// Runs a cache operation unless `token` is cancelled first.
async fn cancellable<T: Send>(
    token: &CancellationToken,
    operation: impl Future<Output = Result<T, CacheError>> + Send,
) -> Result<T, CacheError> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(CacheError::Canceled),
        result = operation => result,
    }
}
