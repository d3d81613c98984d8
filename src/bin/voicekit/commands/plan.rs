//! `voicekit plan` command
//!
//! Prints the steps an install would run on this machine.

use anyhow::Result;

use crate::cli::{BackendArgs, BackendCommand, GlobalArgs};
use voicekit::builder::{Recipe, ServiceStrategy};
use voicekit::core::{InstallRequest, PlatformProfile};
use voicekit::ops::plan;

pub fn execute(args: BackendArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = super::install_context(global)?;

    let req = match args.backend {
        BackendCommand::Whisper(args) => ctx.recognition_request(args.into_options()),
        BackendCommand::Kokoro(args) => ctx.synthesis_request(args.into_options()),
    };
    let (profile, recipe) = plan(&ctx, &req);

    print!("{}", render(&req, &profile, &recipe));
    Ok(())
}

fn render(req: &InstallRequest, profile: &PlatformProfile, recipe: &Recipe) -> String {
    let mut out = format!(
        "{} on {} (gpu: {})\n",
        req.backend(),
        profile.os,
        profile.acceleration.gpu_type().unwrap_or("none")
    );
    out.push_str(&format!("  install dir: {}\n", req.install_dir().display()));

    out.push_str("  steps:\n");
    for (i, step) in recipe.plan.steps.iter().enumerate() {
        out.push_str(&format!("    {}. {}\n", i + 1, step));
    }

    if !recipe.assets.is_empty() {
        out.push_str("  assets:\n");
        for asset in &recipe.assets {
            out.push_str(&format!("    {} -> {}\n", asset.url, asset.dest.display()));
        }
    }

    if let Some(verify) = &recipe.verify {
        out.push_str(&format!("  smoke test: {}\n", verify));
    }

    let service = &recipe.service;
    let how = match service.strategy {
        ServiceStrategy::Supervisor => format!("systemd user unit {}", service.unit_name()),
        ServiceStrategy::Direct => format!("background process {}", service.launcher.display()),
    };
    let when = if req.auto_start { "" } else { " (not started)" };
    out.push_str(&format!("  service: {} on {}{}\n", how, service.url(), when));
    out
}
