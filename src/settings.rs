//! Runtime configuration.
//!
//! Settings come from, in increasing priority: built-in defaults, an optional
//! `.git-safe.toml` at the working-tree root, and `GIT_SAFE_*` environment variables.
//! Nested keys use a double underscore, e.g. `GIT_SAFE_GPG__PROGRAM=/usr/bin/gpg2`.
//!
//! ```toml
//! filter_name = "git-safe"
//! backup = true
//! backup_dir = ".git/git-safe/backups"
//! jobs = 4
//!
//! [gpg]
//! program = "gpg"
//! timeout_secs = 30
//! ```

use crate::error::{GitSafeError, Result};
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = ".git-safe.toml";
pub const ENV_PREFIX: &str = "GIT_SAFE";
pub const DEFAULT_FILTER_NAME: &str = "git-safe";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Filter driver name that marks a path as in scope in `.gitattributes`.
    pub filter_name: String,
    /// Keep a timestamped copy of each file before it is rewritten.
    pub backup: bool,
    /// Where backups go. Relative paths are resolved against the working-tree root.
    pub backup_dir: Option<PathBuf>,
    /// Worker threads for batch operations.
    pub jobs: usize,
    pub gpg: GpgSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GpgSettings {
    pub program: PathBuf,
    pub timeout_secs: u64,
    pub homedir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filter_name: DEFAULT_FILTER_NAME.to_string(),
            backup: false,
            backup_dir: None,
            jobs: 1,
            gpg: GpgSettings::default(),
        }
    }
}

impl Default for GpgSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gpg"),
            timeout_secs: 30,
            homedir: None,
        }
    }
}

impl Settings {
    /// Load settings for the working tree rooted at `repo_root`.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(CONFIG_FILE);
        let config_path = config_path
            .to_str()
            .ok_or_else(|| GitSafeError::Config("Invalid config path".into()))?;

        let settings: Settings = Config::builder()
            .add_source(File::new(config_path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|err| GitSafeError::Config(format!("Failed to load config: {err}")))?
            .try_deserialize()
            .map_err(|err| GitSafeError::Config(format!("Invalid config: {err}")))?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.filter_name.trim().is_empty() {
            return Err(GitSafeError::Config("filter_name must not be empty".into()));
        }
        if self.jobs == 0 {
            return Err(GitSafeError::Config("jobs must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolved backup directory.
    pub fn backup_dir(&self, repo_root: &Path, git_dir: &Path) -> PathBuf {
        match &self.backup_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => repo_root.join(dir),
            None => git_dir.join("git-safe").join("backups"),
        }
    }
}
