//! Per-task log files and their retention.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use sweep_core::Task;
use tempfile::Builder;
use tokio::fs::{File, create_dir_all, remove_file};
use tokio::io::AsyncWriteExt as _;
use tokio::sync::Mutex as AsyncMutex;

/// Creates and tracks one log file per executed task.
#[derive(Debug)]
pub struct LogManager {
    dir: PathBuf,
    keep_logs: bool,
    files: Mutex<Vec<PathBuf>>,
}

impl LogManager {
    /// Log files are created under `dir`. With `keep_logs` unset, logs of
    /// tasks that succeed are deleted when closed.
    pub fn new(dir: impl Into<PathBuf>, keep_logs: bool) -> Self {
        Self {
            dir: dir.into(),
            keep_logs,
            files: Mutex::new(Vec::new()),
        }
    }

    /// Opens a fresh log file for `task`.
    ///
    /// # Errors
    /// Returns an error if the log directory or file cannot be created.
    pub async fn add_task(&self, task: &Task) -> io::Result<TaskLog> {
        create_dir_all(&self.dir).await?;

        let prefix = format!("changeset-{}-", task.repository.slug());
        let (file, path) = Builder::new()
            .prefix(&prefix)
            .suffix(".log")
            .tempfile_in(&self.dir)?
            .keep()?;

        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.clone());

        Ok(TaskLog {
            path,
            keep: self.keep_logs,
            errored: AtomicBool::new(false),
            file: AsyncMutex::new(File::from_std(file)),
        })
    }

    /// Paths of every log file created so far.
    pub fn log_files(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Log file of a single task.
#[derive(Debug)]
pub struct TaskLog {
    path: PathBuf,
    keep: bool,
    errored: AtomicBool,
    file: AsyncMutex<File>,
}

impl TaskLog {
    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends raw output.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.file.lock().await.write_all(bytes).await
    }

    /// Appends a line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await
    }

    /// Keeps the log on close regardless of the manager's setting.
    pub fn mark_errored(&self) {
        self.errored.store(true, Ordering::Release);
    }

    /// Whether the task that owns this log failed.
    pub fn is_errored(&self) -> bool {
        self.errored.load(Ordering::Acquire)
    }

    /// Flushes the log and deletes it unless it must be kept.
    ///
    /// # Errors
    /// Returns an error if flushing or deleting the file fails.
    pub async fn close(self) -> io::Result<()> {
        let mut file = self.file.into_inner();
        file.flush().await?;
        drop(file);

        if !self.keep && !self.errored.load(Ordering::Acquire) {
            remove_file(&self.path).await?;
        }
        Ok(())
    }
}
