//! Command implementations

pub mod completions;
pub mod doctor;
pub mod install;
pub mod plan;

use std::time::Duration;

use anyhow::Result;

use crate::cli::GlobalArgs;
use voicekit::ops::InstallContext;
use voicekit::util::config::{load_config, project_config_path, Config};
use voicekit::util::{CancelToken, GlobalContext};

/// Build the install context for the current user, honoring the global flags.
pub fn install_context(global: &GlobalArgs) -> Result<InstallContext> {
    let gctx = GlobalContext::new()?;

    // Load configuration (global + project, or an explicit file)
    let config = match &global.config {
        Some(path) => {
            let mut config = Config::load_or_default(&gctx.config_path());
            config.merge(Config::load(path)?);
            config
        }
        None => load_config(&gctx.config_path(), &project_config_path(gctx.cwd())),
    };

    let cancel = match global.timeout {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    Ok(InstallContext::system(gctx, config)?
        .with_cancel(cancel)
        .show_progress(!global.json))
}
