//! Idempotency guard.
//!
//! The install directory on disk is the only record of a previous install.
//! The check looks for the backend's marker files and never mutates
//! anything; the purge is the one destructive operation in the installer.

use std::path::{Path, PathBuf};

use crate::builder::{install_markers, INSTALL_STAMP};
use crate::core::{InstallError, InstallRequest};
use crate::util::fs::{remove_dir_all_if_exists, write_string};

/// Outcome of the installed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Every marker exists and no reinstall was asked for.
    AlreadyInstalled { stamp: PathBuf },
    /// Continue with the install.
    Proceed,
}

/// Decide whether an existing install satisfies the request.
pub fn check(req: &InstallRequest) -> GuardDecision {
    if req.force_reinstall {
        return GuardDecision::Proceed;
    }
    match install_markers(req).into_iter().find(|m| !m.exists()) {
        None => {
            let stamp = req.install_dir.join(INSTALL_STAMP);
            tracing::info!(backend = %req.backend(), stamp = %stamp.display(), "already installed");
            GuardDecision::AlreadyInstalled { stamp }
        }
        Some(missing) => {
            if req.install_dir.exists() {
                tracing::info!(
                    missing = %missing.display(),
                    "existing install does not satisfy the request, resuming"
                );
            }
            GuardDecision::Proceed
        }
    }
}

/// Mark the install as complete. Called once every asset is in place.
pub fn record(req: &InstallRequest) -> Result<PathBuf, InstallError> {
    let stamp = req.install_dir.join(INSTALL_STAMP);
    let mut contents = format!("backend = \"{}\"\n", req.backend());
    if let Some(model) = req.model_path() {
        contents.push_str(&format!("model = \"{}\"\n", model.display()));
    }
    write_string(&stamp, &contents)?;
    Ok(stamp)
}

/// Remove a previous install. Returns whether anything was removed.
pub fn purge(install_dir: &Path) -> Result<bool, InstallError> {
    let removed = remove_dir_all_if_exists(install_dir)?;
    if removed {
        tracing::warn!("removed previous install at {}", install_dir.display());
    }
    Ok(removed)
}
