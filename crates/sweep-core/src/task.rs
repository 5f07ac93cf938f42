//! Tasks, steps and the fingerprint used as a cache key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use uuid::Uuid;

use crate::repository::Repository;
use crate::template::ChangesetTemplate;

/// Unique identifier for a registered task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl Default for TaskId {
    fn default() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// One transformation action executed inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    /// Shell script run from the workspace root
    pub run: String,
    /// Extra environment variables; ordered so fingerprints are stable
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Step {
    /// Creates a step running `run` with no extra environment.
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            env: BTreeMap::new(),
        }
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Immutable description of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Unique identifier for this task
    pub id: TaskId,
    /// Repository the steps run against
    pub repository: Repository,
    /// Ordered steps
    pub steps: Vec<Step>,
    /// Template the produced changeset spec is built from
    pub template: ChangesetTemplate,
}

impl Task {
    /// Creates a task with a fresh identifier.
    pub fn new(repository: Repository, steps: Vec<Step>, template: ChangesetTemplate) -> Self {
        Self {
            id: TaskId::default(),
            repository,
            steps,
            template,
        }
    }

    /// Fingerprint used to look up and store cached results.
    pub fn cache_key(&self) -> ExecutionCacheKey {
        ExecutionCacheKey::from_task(self)
    }
}

/// Content-derived fingerprint of a task.
///
/// Covers the repository identity and base state plus the ordered steps. The
/// changeset template is excluded: editing a title must not invalidate a diff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionCacheKey(String);

impl ExecutionCacheKey {
    /// Derives the fingerprint of `task`.
    pub fn from_task(task: &Task) -> Self {
        let mut hasher = Sha256::new();
        let repository = &task.repository;
        for field in [
            &repository.id,
            &repository.name,
            &repository.base_ref,
            &repository.base_rev,
        ] {
            write_field(&mut hasher, field.as_bytes());
        }

        write_field(&mut hasher, &(task.steps.len() as u64).to_le_bytes());
        for step in &task.steps {
            write_field(&mut hasher, step.run.as_bytes());
            write_field(&mut hasher, &(step.env.len() as u64).to_le_bytes());
            for (key, value) in &step.env {
                write_field(&mut hasher, key.as_bytes());
                write_field(&mut hasher, value.as_bytes());
            }
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Hex-encoded SHA-256 digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Length-prefixes every field so adjacent fields cannot run into each other.
fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl fmt::Display for ExecutionCacheKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
