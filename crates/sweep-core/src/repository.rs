//! Repository identity.

use serde::{Deserialize, Serialize};

/// A repository a task runs against, pinned to a base branch and revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Stable identity assigned by the code host
    pub id: String,
    /// Human-readable name, e.g. `github.com/acme/api`
    pub name: String,
    /// Fully qualified base ref, e.g. `refs/heads/main`
    pub base_ref: String,
    /// Commit the base ref pointed at when the job was planned
    pub base_rev: String,
}

impl Repository {
    /// Creates a repository reference.
    ///
    /// A bare branch name is expanded to `refs/heads/<branch>`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_ref: impl Into<String>,
        base_rev: impl Into<String>,
    ) -> Self {
        let base_ref = base_ref.into();
        let base_ref = if base_ref.starts_with("refs/") {
            base_ref
        } else {
            format!("refs/heads/{base_ref}")
        };

        Self {
            id: id.into(),
            name: name.into(),
            base_ref,
            base_rev: base_rev.into(),
        }
    }

    /// Short branch name of the base ref.
    pub fn base_branch(&self) -> &str {
        self.base_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.base_ref)
    }

    /// Name with path separators replaced, safe to embed in file names.
    pub fn slug(&self) -> String {
        self.name
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' { ch } else { '-' })
            .collect()
    }
}
