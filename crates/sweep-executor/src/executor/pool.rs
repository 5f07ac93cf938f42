//! Bounded dispatch of task routines and collection of their results.

use std::mem::take;
use std::panic::resume_unwind;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use super::{ExecutionOutcome, Shared, TaskEntry, routine};

/// Spawns a routine per entry, holding at most `parallelism` permits at once.
///
/// Stops dispatching as soon as `token` is cancelled; undispatched tasks keep
/// their enqueued status. Signals `done_enqueuing` when finished.
pub(super) async fn dispatch(
    shared: Arc<Shared>,
    entries: Vec<TaskEntry>,
    token: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(shared.config.parallelism));

    for entry in entries {
        let permit = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!("dispatch canceled");
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(error) => {
                    tracing::warn!(%error, "concurrency limiter closed");
                    break;
                }
            },
        };

        let span = tracing::info_span!("task", repository = %entry.task.repository.name);
        let routine_shared = Arc::clone(&shared);
        let routine_token = token.clone();
        shared.running.lock().await.spawn(
            async move {
                let _permit = permit;
                if routine_token.is_cancelled() {
                    tracing::debug!("skipping task, canceled before start");
                    return Ok(());
                }
                routine::run(&routine_shared, &entry, &routine_token).await
            }
            .instrument(span),
        );
    }

    shared.done_enqueuing.send_replace(true);
}

/// Drains every spawned routine once dispatch has finished.
///
/// The first error in completion order is reported. A panicking routine is
/// re-raised on the caller.
pub(super) async fn collect(shared: &Shared) -> ExecutionOutcome {
    let mut done = shared.done_enqueuing.subscribe();
    if let Err(error) = done.wait_for(|enqueued| *enqueued).await {
        tracing::warn!(%error, "dispatch signal lost");
    }

    let mut running = take(&mut *shared.running.lock().await);
    let mut first_error = None;

    while let Some(joined) = running.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
            Err(join_error) if join_error.is_panic() => resume_unwind(join_error.into_panic()),
            Err(join_error) => tracing::warn!(error = %join_error, "task routine aborted"),
        }
    }

    ExecutionOutcome {
        specs: shared.specs.lock().await.clone(),
        error: first_error,
    }
}
