//! Changeset spec payload and the builder that produces it from a task.

use serde::{Deserialize, Serialize};

use crate::task::Task;
use crate::template::PublishedValue;

/// Author name used when the template has none and defaults are enabled.
pub const DEFAULT_AUTHOR_NAME: &str = "Sweep";
/// Author email used when the template has none and defaults are enabled.
pub const DEFAULT_AUTHOR_EMAIL: &str = "sweep@noreply.localhost";

/// Feature toggles negotiated with the code-review server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Fill in a default commit author when the template has none
    #[serde(default)]
    pub include_auto_author_details: bool,
}

/// Submission payload for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetSpec {
    /// Repository the changeset targets
    pub base_repository: String,
    /// Changeset contents
    #[serde(flatten)]
    pub created: CreatedChangeset,
}

/// Contents of a changeset to be created on the code host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedChangeset {
    /// Base ref the changeset merges into
    pub base_ref: String,
    /// Revision of the base ref the diff applies to
    pub base_rev: String,
    /// Repository hosting the head ref
    pub head_repository: String,
    /// `refs/heads/<branch>`
    pub head_ref: String,
    /// Changeset title
    pub title: String,
    /// Changeset description
    pub body: String,
    /// Commits; exactly one is supported
    pub commits: Vec<GitCommitDescription>,
    /// Resolved publication value for this repository
    pub published: Option<PublishedValue>,
}

/// One commit of a changeset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitCommitDescription {
    /// Commit message
    pub message: String,
    /// Author name; empty when unknown
    pub author_name: String,
    /// Author email; empty when unknown
    pub author_email: String,
    /// Unified diff
    pub diff: String,
}

impl ChangesetSpec {
    /// Diff of the single commit, or `None` when the spec carries no commit.
    ///
    /// # Panics
    /// Panics when the spec carries more than one commit. Multi-commit
    /// changesets are never produced by [`build_changeset_spec`], so seeing one
    /// means a cache or builder corrupted its output.
    pub fn single_diff(&self) -> Option<&str> {
        match self.created.commits.as_slice() {
            [] => None,
            [commit] => Some(&commit.diff),
            commits => panic!(
                "changeset spec for {} carries {} commits; only one commit per changeset is supported",
                self.base_repository,
                commits.len()
            ),
        }
    }
}

/// Builds the changeset spec for `task` from a diff and the current template.
pub fn build_changeset_spec(task: &Task, diff: &str, features: FeatureFlags) -> ChangesetSpec {
    let repository = &task.repository;
    let template = &task.template;

    let (author_name, author_email) = match &template.commit.author {
        Some(author) => (author.name.clone(), author.email.clone()),
        None if features.include_auto_author_details => (
            DEFAULT_AUTHOR_NAME.to_owned(),
            DEFAULT_AUTHOR_EMAIL.to_owned(),
        ),
        None => (String::new(), String::new()),
    };

    ChangesetSpec {
        base_repository: repository.id.clone(),
        created: CreatedChangeset {
            base_ref: repository.base_ref.clone(),
            base_rev: repository.base_rev.clone(),
            head_repository: repository.id.clone(),
            head_ref: format!("refs/heads/{}", template.branch),
            title: template.title.clone(),
            body: template.body.clone(),
            commits: vec![GitCommitDescription {
                message: template.commit.message.clone(),
                author_name,
                author_email,
                diff: diff.to_owned(),
            }],
            published: template.published.value(&repository.name),
        },
    }
}
