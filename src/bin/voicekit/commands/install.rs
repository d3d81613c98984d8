//! `voicekit install` command

use anyhow::Result;
use miette::{MietteDiagnostic, Report};

use crate::cli::{BackendArgs, BackendCommand, GlobalArgs};
use voicekit::core::{InstallResult, ServiceStatus};
use voicekit::ops::{install_recognition, install_synthesis};

pub fn execute(args: BackendArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = super::install_context(global)?;

    let result = match args.backend {
        BackendCommand::Whisper(args) => install_recognition(&ctx, args.into_options()),
        BackendCommand::Kokoro(args) => install_synthesis(&ctx, args.into_options()),
    };

    if global.json {
        println!("{}", result.to_json()?);
    } else if result.success {
        print_summary(&result);
    } else {
        eprintln!("{:?}", failure_report(&result));
    }

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}

fn print_summary(result: &InstallResult) {
    let verb = if result.already_installed {
        "Fresh"
    } else {
        "Installed"
    };
    eprintln!(
        "{:>12} {} -> {}",
        verb,
        result.backend,
        result.install_path.display()
    );
    if let Some(model) = &result.model_path {
        eprintln!("{:>12} {}", "Model", model.display());
    }
    if let Some(gpu) = &result.gpu_type {
        eprintln!("{:>12} {}", "GPU", gpu);
    }
    match (result.service_status, &result.service_url) {
        (ServiceStatus::NotStarted, _) => {}
        (_, Some(url)) => eprintln!("{:>12} {}", "Serving", url),
        (_, None) => eprintln!("{:>12} started, not answering yet", "Service"),
    }
    if let Some(unit) = &result.systemd_service {
        eprintln!("{:>12} {}", "Unit", unit.display());
    }
    if let Some(pid) = result.service_pid {
        eprintln!("{:>12} {}", "Pid", pid);
    }
    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }
}

fn failure_report(result: &InstallResult) -> Report {
    let mut diag = MietteDiagnostic::new(result.message.clone());
    if let Some(category) = result.error_category {
        diag = diag.with_code(format!("voicekit::{}", category));
    }
    if !result.missing.is_empty() {
        diag = diag.with_help("Install the listed tools and re-run, or check with `voicekit doctor`");
    }
    Report::new(diag)
}
