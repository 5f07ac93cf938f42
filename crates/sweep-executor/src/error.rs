//! Error types for the executor, cache, workspaces and step runners.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Failure of an [`ExecutionCache`](crate::ExecutionCache) operation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The operation was abandoned because the job was cancelled.
    #[error("cache operation canceled")]
    Canceled,

    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

/// Failure while preparing an isolated workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No source checkout exists for the repository.
    #[error("no source for {repository} at {}", .path.display())]
    MissingSource {
        /// Repository name
        repository: String,
        /// Where the source was expected
        path: PathBuf,
    },

    /// A git command exited unsuccessfully.
    #[error("git {command} failed: {stderr}")]
    Git {
        /// Arguments passed to git
        command: String,
        /// Captured standard error
        stderr: String,
    },
}

/// Failure reported by a [`StepRunner`](crate::StepRunner).
#[derive(Debug, Error)]
pub enum StepError {
    /// A step exited with a non-zero status.
    #[error("step {step} ({command}) exited with status {exit_code}: {stderr}")]
    StepFailed {
        /// One-based step index
        step: usize,
        /// Script the step ran
        command: String,
        /// Exit status
        exit_code: i32,
        /// Captured standard error
        stderr: String,
    },

    /// A step's process was terminated by a signal.
    #[error("step {step} ({command}) was killed")]
    Killed {
        /// One-based step index
        step: usize,
        /// Script the step ran
        command: String,
    },

    /// The run context's deadline expired.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The run context was cancelled.
    #[error("execution canceled")]
    Canceled,

    /// The workspace could not be prepared or diffed.
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// Writing the task log failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StepError {
    /// Compact one-line description of a failed step.
    pub fn single_line_error(&self) -> Option<String> {
        match self {
            Self::StepFailed {
                step,
                command,
                exit_code,
                stderr,
            } => {
                let command = command.lines().next().unwrap_or_default();
                let reason = stderr
                    .lines()
                    .rev()
                    .find(|line| !line.trim().is_empty())
                    .unwrap_or("no output");
                Some(format!(
                    "step {step} failed: {command}: exit {exit_code}: {reason}"
                ))
            }
            _ => None,
        }
    }
}

/// Failure of one task. Recorded on the task's status and never aborts
/// sibling tasks.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Clearing the cache entry failed.
    #[error("clearing cache for {repository:?}: {source}")]
    CacheClear {
        /// Repository name
        repository: String,
        /// Underlying cache failure
        source: CacheError,
    },

    /// Looking up the cache entry failed.
    #[error("checking cache for {repository:?}: {source}")]
    CacheLookup {
        /// Repository name
        repository: String,
        /// Underlying cache failure
        source: CacheError,
    },

    /// Storing the result failed after a successful run.
    #[error("caching result for {repository:?}: {source} (see {} for details)", .log_file.display())]
    CacheWrite {
        /// Repository name
        repository: String,
        /// Log holding the step output
        log_file: PathBuf,
        /// Underlying cache failure
        source: CacheError,
    },

    /// The task log file could not be created.
    #[error("creating log file for {repository:?}: {source}")]
    LogFile {
        /// Repository name
        repository: String,
        /// Underlying IO failure
        source: io::Error,
    },

    /// The steps failed.
    #[error("execution in {repository} failed: {source} (see {} for details)", .log_file.display())]
    Execution {
        /// Repository name
        repository: String,
        /// Log holding the step output
        log_file: PathBuf,
        /// Underlying step failure
        source: StepError,
    },

    /// The steps did not finish before the configured timeout.
    #[error(
        "execution in {repository} failed: Timeout reached. Execution took longer than {timeout:?}. (see {} for details)",
        .log_file.display()
    )]
    Timeout {
        /// Repository name
        repository: String,
        /// Log holding the step output
        log_file: PathBuf,
        /// Configured timeout
        timeout: Duration,
    },
}

impl ExecutionError {
    /// Name of the repository the failing task ran against.
    pub fn repository(&self) -> &str {
        match self {
            Self::CacheClear { repository, .. }
            | Self::CacheLookup { repository, .. }
            | Self::CacheWrite { repository, .. }
            | Self::LogFile { repository, .. }
            | Self::Execution { repository, .. }
            | Self::Timeout { repository, .. } => repository,
        }
    }

    /// Log file holding the task output, when one was opened.
    pub fn log_file(&self) -> Option<&Path> {
        match self {
            Self::CacheWrite { log_file, .. }
            | Self::Execution { log_file, .. }
            | Self::Timeout { log_file, .. } => Some(log_file),
            _ => None,
        }
    }

    /// Whether the task was stopped by its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Configured timeout carried by a timeout failure.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Timeout { timeout, .. } => Some(*timeout),
            _ => None,
        }
    }

    /// Short single-line summary suitable for a status line.
    pub fn status_text(&self) -> String {
        match self {
            Self::Execution { source, .. } => source
                .single_line_error()
                .unwrap_or_else(|| source.to_string()),
            Self::Timeout { timeout, .. } => {
                format!("Timeout reached. Execution took longer than {timeout:?}.")
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_failed() -> StepError {
        StepError::StepFailed {
            step: 2,
            command: "go fmt ./...\necho done".to_owned(),
            exit_code: 1,
            stderr: "compiling\nmain.go:3: syntax error\n\n".to_owned(),
        }
    }

    #[test]
    fn test_single_line_error_for_failed_step() {
        assert_eq!(
            step_failed().single_line_error().as_deref(),
            Some("step 2 failed: go fmt ./...: exit 1: main.go:3: syntax error")
        );
        assert_eq!(StepError::DeadlineExceeded.single_line_error(), None);
    }

    #[test]
    fn test_execution_error_display_and_status_text() {
        let error = ExecutionError::Execution {
            repository: "github.com/acme/api".to_owned(),
            log_file: PathBuf::from("/tmp/changeset-api.log"),
            source: step_failed(),
        };

        let display = error.to_string();
        assert!(display.starts_with("execution in github.com/acme/api failed: step 2"));
        assert!(display.ends_with("(see /tmp/changeset-api.log for details)"));
        assert_eq!(
            error.status_text(),
            "step 2 failed: go fmt ./...: exit 1: main.go:3: syntax error"
        );
        assert_eq!(error.repository(), "github.com/acme/api");
        assert!(!error.is_timeout());
    }

    #[test]
    fn test_timeout_error_carries_duration() {
        let error = ExecutionError::Timeout {
            repository: "github.com/acme/api".to_owned(),
            log_file: PathBuf::from("/tmp/changeset-api.log"),
            timeout: Duration::from_secs(90),
        };

        assert!(error.is_timeout());
        assert_eq!(error.timeout(), Some(Duration::from_secs(90)));
        assert_eq!(
            error.status_text(),
            "Timeout reached. Execution took longer than 90s."
        );
        assert_eq!(error.log_file(), Some(Path::new("/tmp/changeset-api.log")));
    }

    #[test]
    fn test_cache_error_context() {
        let error = ExecutionError::CacheLookup {
            repository: "github.com/acme/api".to_owned(),
            source: CacheError::Backend("disk full".to_owned()),
        };
        assert_eq!(
            error.to_string(),
            "checking cache for \"github.com/acme/api\": disk full"
        );
        assert_eq!(error.status_text(), error.to_string());
        assert_eq!(error.log_file(), None);
    }

    #[test]
    fn test_cache_write_keeps_log_file() {
        let error = ExecutionError::CacheWrite {
            repository: "github.com/acme/api".to_owned(),
            log_file: PathBuf::from("/tmp/changeset-api.log"),
            source: CacheError::Backend("disk full".to_owned()),
        };
        assert_eq!(
            error.to_string(),
            "caching result for \"github.com/acme/api\": disk full (see /tmp/changeset-api.log for details)"
        );
        assert_eq!(error.log_file(), Some(Path::new("/tmp/changeset-api.log")));
        assert!(!error.is_timeout());
    }
}
