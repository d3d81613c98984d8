//! `voicekit doctor` command

use anyhow::Result;

use crate::cli::{DoctorArgs, GlobalArgs};
use voicekit::core::{Backend, OsKind};
use voicekit::ops::{doctor, format_report};
use voicekit::util::process::{PathLocator, SystemRunner};

pub fn execute(args: DoctorArgs, global: &GlobalArgs) -> Result<()> {
    let backends: Vec<Backend> = match args.backend {
        Some(backend) => vec![backend.into()],
        None => Backend::ALL.to_vec(),
    };

    let report = doctor(&backends, OsKind::host(), &SystemRunner, &PathLocator);

    print!("{}", format_report(&report, global.verbose));

    // Exit with error code if any prerequisite is missing
    if !report.all_passed() {
        std::process::exit(1);
    }

    Ok(())
}
