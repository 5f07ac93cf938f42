//! Task registry and the public executor surface.
//!
//! Tasks are registered with [`Executor::add_task`], dispatched by
//! [`Executor::start`] under a concurrency bound, and collected with
//! [`Executor::wait`].

/// Bounded dispatch and collection of task routines
mod pool;
/// Per-task execution routine
mod routine;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use sweep_core::{
    ChangesetSpec, ChangesetTemplate, ExecutorConfig, FeatureFlags, Repository, Step, Task,
};
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cache::ExecutionCache;
use crate::error::ExecutionError;
use crate::log::LogManager;
use crate::runner::StepRunner;
use crate::status::{StatusHandle, TaskStatus};

/// Result of a task routine as seen by the pool.
type RoutineResult = Result<(), Arc<ExecutionError>>;

/// Specs produced by a run together with the first failure, if any.
///
/// A failing task never prevents other tasks from contributing specs, so
/// `specs` is meaningful even when `error` is set.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    /// Specs of every task that produced a non-empty diff, in completion order
    pub specs: Vec<ChangesetSpec>,
    /// First task failure observed
    pub error: Option<Arc<ExecutionError>>,
}

impl ExecutionOutcome {
    /// Converts into a `Result`, discarding the specs on failure.
    ///
    /// # Errors
    /// Returns the first task failure, if any.
    pub fn into_result(self) -> Result<Vec<ChangesetSpec>, Arc<ExecutionError>> {
        self.error.map_or(Ok(self.specs), Err)
    }
}

/// A registered task and the write side of its status.
#[derive(Clone)]
struct TaskEntry {
    task: Arc<Task>,
    status: Arc<watch::Sender<TaskStatus>>,
}

/// State shared between the executor handle and every task routine.
struct Shared {
    config: ExecutorConfig,
    features: FeatureFlags,
    cache: Arc<dyn ExecutionCache>,
    runner: Arc<dyn StepRunner>,
    logs: LogManager,
    tasks: Mutex<Vec<TaskEntry>>,
    specs: AsyncMutex<Vec<ChangesetSpec>>,
    running: AsyncMutex<JoinSet<RoutineResult>>,
    started: AtomicBool,
    done_enqueuing: watch::Sender<bool>,
}

/// Runs one task per repository with bounded concurrency.
///
/// Cloning yields another handle to the same executor.
#[derive(Clone)]
pub struct Executor {
    shared: Arc<Shared>,
}

impl Executor {
    /// Creates an executor.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid.
    pub fn new(
        config: ExecutorConfig,
        features: FeatureFlags,
        cache: Arc<dyn ExecutionCache>,
        runner: Arc<dyn StepRunner>,
    ) -> sweep_core::Result<Self> {
        config.validate()?;
        let logs = LogManager::new(config.resolved_temp_dir(), config.keep_logs);
        let (done_enqueuing, _) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                features,
                cache,
                runner,
                logs,
                tasks: Mutex::new(Vec::new()),
                specs: AsyncMutex::new(Vec::new()),
                running: AsyncMutex::new(JoinSet::new()),
                started: AtomicBool::new(false),
                done_enqueuing,
            }),
        })
    }

    /// Registers a task and returns a handle to its live status.
    ///
    /// Tasks registered after [`start`](Self::start) are never dispatched.
    ///
    /// # Errors
    /// Returns an error if the template's publication policy carries a
    /// pattern that does not compile.
    pub fn add_task(
        &self,
        repository: Repository,
        steps: Vec<Step>,
        template: ChangesetTemplate,
    ) -> sweep_core::Result<StatusHandle> {
        template.published.validate()?;
        let task = Task::new(repository, steps, template);
        let (sender, receiver) = watch::channel(TaskStatus::enqueued(&task.repository.name));
        let handle = StatusHandle::new(task.id, receiver);

        if self.shared.started.load(Ordering::Acquire) {
            tracing::warn!(
                repository = %task.repository.name,
                "task added after start will not be executed"
            );
        }

        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TaskEntry {
                task: Arc::new(task),
                status: Arc::new(sender),
            });
        Ok(handle)
    }

    /// Snapshot of every registered task's status, in registration order.
    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| entry.status.borrow().clone())
            .collect()
    }

    /// Paths of every task log file created so far.
    pub fn log_files(&self) -> Vec<PathBuf> {
        self.shared.logs.log_files()
    }

    /// Begins dispatching the registered tasks and returns immediately.
    ///
    /// At most `parallelism` tasks run at once. Cancelling `token` stops
    /// dispatch of tasks that have not started and is observed by running
    /// tasks. Calling `start` more than once has no effect.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, token: CancellationToken) {
        if self.shared.started.swap(true, Ordering::AcqRel) {
            tracing::warn!("executor already started");
            return;
        }

        let entries = self
            .shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        tracing::debug!(tasks = entries.len(), "starting executor");

        tokio::spawn(pool::dispatch(Arc::clone(&self.shared), entries, token));
    }

    /// Waits for every dispatched task and returns the collected specs.
    ///
    /// Blocks until [`start`](Self::start) has finished dispatching.
    ///
    /// # Panics
    /// Re-raises the panic of any task routine that panicked.
    pub async fn wait(&self) -> ExecutionOutcome {
        pool::collect(&self.shared).await
    }
}
