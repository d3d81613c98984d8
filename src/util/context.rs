//! Global context for voicekit operations.
//!
//! Provides centralized access to per-user paths and the working directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;

/// Global context containing paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for voicekit data (~/.voicekit/)
    home: PathBuf,

    /// systemd user unit directory (~/.config/systemd/user)
    unit_dir: PathBuf,
}

impl GlobalContext {
    /// Create a new GlobalContext from the current user's directories.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let dirs = BaseDirs::new().context("could not determine the home directory")?;

        Ok(GlobalContext {
            cwd,
            home: dirs.home_dir().join(".voicekit"),
            unit_dir: dirs.config_dir().join("systemd").join("user"),
        })
    }

    /// Create a GlobalContext rooted at an explicit user home.
    ///
    /// Everything voicekit would place in the user's home lands under `home`
    /// instead.
    pub fn with_home(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref();
        GlobalContext {
            cwd: home.to_path_buf(),
            home: home.join(".voicekit"),
            unit_dir: home.join(".config").join("systemd").join("user"),
        }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the voicekit home directory (~/.voicekit/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the directory systemd reads user units from.
    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }
}
