//! Isolated per-task workspaces copied from a local source tree.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use async_trait::async_trait;
use sweep_core::Repository;
use tempfile::{Builder, TempDir};
use tokio::fs::{copy, create_dir_all, read_dir};
use tokio::process::Command;

use crate::error::WorkspaceError;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Identity used for the baseline commit of every workspace.
const BASELINE_AUTHOR: [&str; 4] = [
    "-c",
    "user.name=sweep",
    "-c",
    "user.email=sweep@noreply.localhost",
];

/// An isolated working copy, removed from disk when dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Wraps an already populated directory.
    pub fn new(dir: TempDir) -> Self {
        Self { dir }
    }

    /// Root of the working copy.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Produces isolated workspaces for repositories.
#[async_trait]
pub trait WorkspaceCreator: Send + Sync {
    /// Creates a workspace for `repository` below `temp_dir`.
    ///
    /// The workspace is a git working tree whose `HEAD` holds the base state,
    /// so that staged changes diff against it.
    ///
    /// # Errors
    /// Returns an error if the source is missing or cannot be copied.
    async fn create(
        &self,
        repository: &Repository,
        temp_dir: &Path,
    ) -> Result<Workspace, WorkspaceError>;
}

/// Creates workspaces by copying `<source_root>/<repository name>`.
#[derive(Debug, Clone)]
pub struct DirectoryWorkspaceCreator {
    source_root: PathBuf,
}

impl DirectoryWorkspaceCreator {
    /// Creates a creator reading sources below `source_root`.
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
        }
    }

    fn copy_dir_recursive(source: PathBuf, dest: PathBuf) -> BoxFuture<Result<(), WorkspaceError>> {
        Box::pin(async move {
            create_dir_all(&dest).await?;
            let mut entries = read_dir(&source).await?;

            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name();
                if matches!(
                    file_name.to_string_lossy().as_ref(),
                    ".git" | "target" | "node_modules"
                ) {
                    continue;
                }

                let file_type = entry.file_type().await?;
                let dest_path = dest.join(&file_name);
                if file_type.is_dir() {
                    Self::copy_dir_recursive(entry.path(), dest_path).await?;
                } else if file_type.is_file() {
                    copy(entry.path(), dest_path).await?;
                }
            }

            Ok(())
        })
    }
}

#[async_trait]
impl WorkspaceCreator for DirectoryWorkspaceCreator {
    async fn create(
        &self,
        repository: &Repository,
        temp_dir: &Path,
    ) -> Result<Workspace, WorkspaceError> {
        let source = self.source_root.join(&repository.name);
        if !source.is_dir() {
            return Err(WorkspaceError::MissingSource {
                repository: repository.name.clone(),
                path: source,
            });
        }

        create_dir_all(temp_dir).await?;
        let dir = Builder::new()
            .prefix(&format!("workspace-{}-", repository.slug()))
            .tempdir_in(temp_dir)?;

        Self::copy_dir_recursive(source, dir.path().to_path_buf()).await?;

        git(dir.path(), &["init", "--quiet"]).await?;
        git(dir.path(), &["add", "--all"]).await?;
        let mut commit = BASELINE_AUTHOR.to_vec();
        commit.extend(["commit", "--quiet", "--allow-empty", "-m", "baseline"]);
        git(dir.path(), &commit).await?;

        tracing::debug!(
            repository = %repository.name,
            path = %dir.path().display(),
            "workspace created"
        );
        Ok(Workspace::new(dir))
    }
}

/// Runs git in `dir` and returns its standard output.
///
/// # Errors
/// Returns an error if git cannot be spawned or exits unsuccessfully.
pub async fn git(dir: &Path, args: &[&str]) -> Result<String, WorkspaceError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(WorkspaceError::Git {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
