//! Step execution inside isolated workspaces.

/// Shell-based step runner
pub mod shell;
/// Workspace creation
pub mod workspace;

use async_trait::async_trait;
use sweep_core::{Repository, Step};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::log::TaskLog;

pub use shell::ShellStepRunner;
pub use workspace::{DirectoryWorkspaceCreator, Workspace, WorkspaceCreator};

/// Cancellation and deadline a step runner must honour.
#[derive(Debug, Clone)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Instant,
}

impl RunContext {
    /// Creates a context cancelled through `token` and expiring at `deadline`.
    pub fn new(token: CancellationToken, deadline: Instant) -> Self {
        Self { token, deadline }
    }

    /// Cancellation token of this run.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Instant after which the run is abandoned.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether the deadline has passed.
    pub fn deadline_reached(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Resolves once the run must stop, with the reason.
    pub async fn done(&self) -> StepError {
        tokio::select! {
            () = self.token.cancelled() => StepError::Canceled,
            () = sleep_until(self.deadline) => StepError::DeadlineExceeded,
        }
    }
}

/// Runs a task's steps and returns the resulting diff.
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Runs `steps` against a fresh workspace of `repository`.
    ///
    /// All step output goes to `log`. `progress` is called with the step being
    /// started on every transition. The returned diff is empty when the steps
    /// changed nothing.
    ///
    /// # Errors
    /// Returns an error if the workspace cannot be prepared, a step fails, or
    /// the context is cancelled or expires.
    async fn run_steps(
        &self,
        ctx: &RunContext,
        repository: &Repository,
        steps: &[Step],
        log: &TaskLog,
        progress: &(dyn for<'step> Fn(&'step str) + Send + Sync),
    ) -> Result<String, StepError>;
}
