//! Shell step runner.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use sweep_core::{Repository, Step};
use tokio::io::{AsyncRead, AsyncReadExt as _};
use tokio::process::Command;

use super::workspace::{WorkspaceCreator, git};
use super::{RunContext, StepRunner};
use crate::error::StepError;
use crate::log::TaskLog;

/// Runs every step as a `bash -c` script inside a fresh workspace and diffs
/// the result against the base state.
pub struct ShellStepRunner {
    creator: Arc<dyn WorkspaceCreator>,
    temp_dir: PathBuf,
}

impl ShellStepRunner {
    /// Creates a runner that places workspaces under `temp_dir`.
    pub fn new(creator: Arc<dyn WorkspaceCreator>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            creator,
            temp_dir: temp_dir.into(),
        }
    }
}

#[async_trait]
impl StepRunner for ShellStepRunner {
    async fn run_steps(
        &self,
        ctx: &RunContext,
        repository: &Repository,
        steps: &[Step],
        log: &TaskLog,
        progress: &(dyn for<'step> Fn(&'step str) + Send + Sync),
    ) -> Result<String, StepError> {
        let workspace = tokio::select! {
            reason = ctx.done() => return Err(reason),
            created = self.creator.create(repository, &self.temp_dir) => created?,
        };

        for (index, step) in steps.iter().enumerate() {
            let number = index + 1;
            progress(&step.run);
            log.write_line(&format!("[step {number}] {}", step.run)).await?;

            let mut command = Command::new("bash");
            command
                .arg("-c")
                .arg(&step.run)
                .current_dir(workspace.path())
                .envs(&step.env)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let (status, stderr) = tokio::select! {
                reason = ctx.done() => {
                    tracing::debug!(step = number, %reason, "step interrupted");
                    return Err(reason);
                }
                finished = run_streaming(&mut command, log) => finished?,
            };

            match status.code() {
                Some(0) => {}
                Some(exit_code) => {
                    return Err(StepError::StepFailed {
                        step: number,
                        command: step.run.clone(),
                        exit_code,
                        stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    });
                }
                None => {
                    return Err(StepError::Killed {
                        step: number,
                        command: step.run.clone(),
                    });
                }
            }
        }

        git(workspace.path(), &["add", "--all"]).await?;
        let diff = git(
            workspace.path(),
            &["diff", "--cached", "--no-prefix", "--binary"],
        )
        .await?;
        Ok(diff)
    }
}

/// Spawns `command` and copies its output into `log` as it arrives.
///
/// Returns the exit status and the captured standard error. Dropping the
/// future kills the child; everything read up to that point is already in
/// the log.
async fn run_streaming(command: &mut Command, log: &TaskLog) -> io::Result<(ExitStatus, Vec<u8>)> {
    let mut child = command.spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let mut captured = Vec::new();
    let (stdout_copied, stderr_copied) = tokio::join!(
        copy_into_log(stdout, log, None),
        copy_into_log(stderr, log, Some(&mut captured)),
    );
    stdout_copied?;
    stderr_copied?;

    let status = child.wait().await?;
    Ok((status, captured))
}

async fn copy_into_log<R: AsyncRead + Unpin + Send>(
    reader: Option<R>,
    log: &TaskLog,
    mut capture: Option<&mut Vec<u8>>,
) -> io::Result<()> {
    let Some(mut stream) = reader else {
        return Ok(());
    };

    let mut buffer = vec![0_u8; 8192];
    loop {
        let read = stream.read(&mut buffer).await?;
        if read == 0 {
            return Ok(());
        }
        let chunk = &buffer[..read];
        log.write(chunk).await?;
        if let Some(captured) = capture.as_deref_mut() {
            captured.extend_from_slice(chunk);
        }
    }
}
