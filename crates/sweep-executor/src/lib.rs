//! Bounded-concurrency execution engine for fleet-wide code transformations.
//!
//! An [`Executor`] takes one task per repository, runs the task's steps in an
//! isolated workspace through a [`StepRunner`], reuses results from an
//! [`ExecutionCache`] when the task fingerprint is unchanged, and collects the
//! produced changeset specs.

/// Execution cache contract and in-memory implementation.
pub mod cache;
/// Error types for cache, workspace, step, and task failures.
pub mod error;
/// Executor: task registry, dispatch, and per-task routine.
pub mod executor;
/// Per-task log files.
pub mod log;
/// Step runner contract, run context, and shell implementation.
pub mod runner;
/// Live per-task status records.
pub mod status;

pub use cache::{ExecutionCache, MemoryCache};
pub use error::{CacheError, ExecutionError, StepError, WorkspaceError};
pub use executor::{ExecutionOutcome, Executor};
pub use log::{LogManager, TaskLog};
pub use runner::{
    DirectoryWorkspaceCreator, RunContext, ShellStepRunner, StepRunner, Workspace,
    WorkspaceCreator,
};
pub use status::{StatusHandle, TaskStatus};
