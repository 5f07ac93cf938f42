//! Configuration types for job execution.

use crate::changeset::FeatureFlags;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread::available_parallelism;
use std::time::Duration;

/// Complete sweep configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Executor configuration
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Server feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum number of tasks executing at once
    pub parallelism: usize,
    /// Per-task timeout in seconds
    pub timeout_seconds: u64,
    /// Drop cached results instead of reusing them
    pub clear_cache: bool,
    /// Keep log files of successful tasks
    pub keep_logs: bool,
    /// Directory for workspaces and log files; defaults to the system temp dir
    pub temp_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            parallelism: available_parallelism().map_or(4, NonZeroUsize::get),
            timeout_seconds: 3600,
            clear_cache: false,
            keep_logs: false,
            temp_dir: None,
        }
    }
}

impl ExecutorConfig {
    /// Per-task timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Directory for workspaces and log files.
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(env::temp_dir)
    }

    /// Checks that the configuration can drive an executor.
    ///
    /// # Errors
    /// Returns an error if parallelism or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(Error::Config("parallelism must be at least 1".to_owned()));
        }
        if self.timeout_seconds == 0 {
            return Err(Error::Config("timeout_seconds must be at least 1".to_owned()));
        }
        Ok(())
    }
}

impl SweepConfig {
    /// Get the default config directory path (`~/.sweep`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        use dirs::home_dir;
        let home = home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".sweep"))
    }

    /// Get the default config file path (`~/.sweep/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location (`~/.sweep/config.toml`)
    /// If the config doesn't exist, creates it with default values
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        use toml::from_str;
        let contents = fs::read_to_string(path)?;
        let config: Self = from_str(&contents)?;
        config.executor.validate()?;
        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        use toml::to_string_pretty;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = to_string_pretty(self)?;

        let header = "# Sweep Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))?;

        Ok(())
    }
}
