//! Live task status snapshots and the handles that observe them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sweep_core::{ChangesetSpec, TaskId};
use tokio::sync::watch;

use crate::error::ExecutionError;

/// Progress and result of one task.
///
/// Timestamps only move forward: `enqueued_at <= started_at <= finished_at`
/// for every timestamp that is set.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    /// Repository the task runs against
    pub repo_name: String,
    /// Result was taken from the execution cache
    pub cached: bool,
    /// Log file, once one was opened
    pub log_file: Option<PathBuf>,
    /// When the task was registered
    pub enqueued_at: DateTime<Utc>,
    /// When the task was dispatched
    pub started_at: Option<DateTime<Utc>>,
    /// When the task was resolved
    pub finished_at: Option<DateTime<Utc>>,
    /// Step currently running
    pub currently_executing: Option<String>,
    /// Produced changeset spec
    pub changeset_spec: Option<ChangesetSpec>,
    /// Failure, when the task failed
    pub err: Option<Arc<ExecutionError>>,
}

impl TaskStatus {
    /// Fresh status for a task registered now.
    pub fn enqueued(repo_name: impl Into<String>) -> Self {
        Self {
            repo_name: repo_name.into(),
            cached: false,
            log_file: None,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            currently_executing: None,
            changeset_spec: None,
            err: None,
        }
    }

    /// Dispatched and not yet resolved.
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.finished_at.is_none()
    }

    /// Dispatched and resolved.
    pub fn is_completed(&self) -> bool {
        self.started_at.is_some() && self.finished_at.is_some()
    }

    /// Wall-clock execution time truncated to milliseconds.
    pub fn execution_time(&self) -> Option<Duration> {
        let elapsed = self.finished_at? - self.started_at?;
        u64::try_from(elapsed.num_milliseconds())
            .ok()
            .map(Duration::from_millis)
    }
}

/// Read side of a task's status.
///
/// Every read returns a complete snapshot; writers publish whole updates.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    task_id: TaskId,
    receiver: watch::Receiver<TaskStatus>,
}

impl StatusHandle {
    pub(crate) fn new(task_id: TaskId, receiver: watch::Receiver<TaskStatus>) -> Self {
        Self { task_id, receiver }
    }

    /// Identifier of the task this handle observes.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Current status.
    pub fn snapshot(&self) -> TaskStatus {
        self.receiver.borrow().clone()
    }

    /// Waits for the next published update.
    ///
    /// Returns `false` once the executor has been dropped and no further
    /// updates can arrive.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}
