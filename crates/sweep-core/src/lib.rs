//! Core types for fleet-wide code transformation jobs.
//!
//! This crate provides the task description, changeset template, changeset
//! spec payload, cache fingerprinting, configuration, and error handling shared
//! by the execution engine.

/// Changeset spec payload and the builder that produces it.
pub mod changeset;
/// Configuration loading and defaults.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Repository identity.
pub mod repository;
/// Tasks, steps, and cache fingerprints.
pub mod task;
/// Changeset templates and publication policies.
pub mod template;

pub use changeset::{
    ChangesetSpec, CreatedChangeset, DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, FeatureFlags,
    GitCommitDescription, build_changeset_spec,
};
pub use config::{ExecutorConfig, SweepConfig};
pub use error::{Error, Result};
pub use repository::Repository;
pub use task::{ExecutionCacheKey, Step, Task, TaskId};
pub use template::{
    ChangesetTemplate, CommitAuthor, CommitTemplate, Publication, PublicationRule, PublishedValue,
};
