//! Changeset templates describe what each produced changeset looks like,
//! independent of the diff the steps produce.

use core::result::Result as CoreResult;

use glob::Pattern;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Template shared by every task of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetTemplate {
    /// Changeset title
    pub title: String,
    /// Changeset description
    #[serde(default)]
    pub body: String,
    /// Head branch name, without the `refs/heads/` prefix
    pub branch: String,
    /// Commit metadata
    pub commit: CommitTemplate,
    /// Whether and where the changeset is published
    #[serde(default)]
    pub published: Publication,
}

impl ChangesetTemplate {
    /// Creates a template with an unpublished policy and no explicit author.
    pub fn new(
        title: impl Into<String>,
        branch: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body: String::new(),
            branch: branch.into(),
            commit: CommitTemplate {
                message: message.into(),
                author: None,
            },
            published: Publication::default(),
        }
    }

    /// Sets the changeset description.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets an explicit commit author.
    #[must_use]
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.commit.author = Some(CommitAuthor {
            name: name.into(),
            email: email.into(),
        });
        self
    }

    /// Sets the publication policy.
    #[must_use]
    pub fn with_published(mut self, published: Publication) -> Self {
        self.published = published;
        self
    }
}

/// Commit metadata of a changeset template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTemplate {
    /// Commit message
    pub message: String,
    /// Explicit author; when absent, feature flags decide the fallback
    #[serde(default)]
    pub author: Option<CommitAuthor>,
}

/// Author identity of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    /// Author name
    pub name: String,
    /// Author email
    pub email: String,
}

/// Publication state embedded into a changeset spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishedValue {
    /// Published (`true`) or kept unpublished (`false`)
    Bool(bool),
    /// Published as a draft
    Draft,
}

impl Serialize for PublishedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> CoreResult<S::Ok, S::Error> {
        match self {
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Draft => serializer.serialize_str("draft"),
        }
    }
}

impl<'de> Deserialize<'de> for PublishedValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> CoreResult<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(value) => Ok(Self::Bool(value)),
            Raw::Text(text) if text == "draft" => Ok(Self::Draft),
            Raw::Text(text) => Err(DeError::custom(format!(
                "invalid published value {text:?}, expected true, false or \"draft\""
            ))),
        }
    }
}

/// One `pattern: value` entry of a per-repository publication policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRule {
    /// Glob matched against the repository name
    pub pattern: String,
    /// Value used for matching repositories
    pub value: PublishedValue,
}

/// Publication policy of a changeset template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Publication {
    /// Same value for every repository
    Constant(PublishedValue),
    /// Evaluated per repository; the last matching rule wins
    PerRepository(Vec<PublicationRule>),
}

impl Default for Publication {
    fn default() -> Self {
        Self::Constant(PublishedValue::Bool(false))
    }
}

impl Publication {
    /// Checks that every rule pattern compiles.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPattern`] for the first pattern that does not compile.
    pub fn validate(&self) -> Result<()> {
        if let Self::PerRepository(rules) = self {
            for rule in rules {
                Pattern::new(&rule.pattern).map_err(|source| Error::InvalidPattern {
                    pattern: rule.pattern.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Resolves the publication value for `repository`.
    ///
    /// Rules whose pattern does not compile never match; call [`Self::validate`]
    /// up front to reject them.
    pub fn value(&self, repository: &str) -> Option<PublishedValue> {
        match self {
            Self::Constant(value) => Some(*value),
            Self::PerRepository(rules) => rules
                .iter()
                .rev()
                .find(|rule| {
                    Pattern::new(&rule.pattern).is_ok_and(|pattern| pattern.matches(repository))
                })
                .map(|rule| rule.value),
        }
    }
}
