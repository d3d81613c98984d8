//! Prerequisite checks.
//!
//! Each backend declares the external tools it needs on each platform in
//! [`requirements`]. The same table drives two consumers:
//!
//! - the install pipeline, through [`verify_prerequisites`], which fails with
//!   every missing item at once;
//! - `voicekit doctor`, which prints the full report.
//!
//! All probes are read-only: a `PATH` lookup, a version query, or
//! `xcode-select -p`.

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use semver::Version;

use crate::core::{Backend, InstallError, OsKind};
use crate::util::process::{CommandRunner, ProcessBuilder, ToolLocator};

/// Oldest Python Kokoro-FastAPI runs on.
pub const MIN_PYTHON: Version = Version::new(3, 10, 0);

static PYTHON_VERSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Python (\d+)\.(\d+)(?:\.(\d+))?").ok());

/// How a requirement is probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Any one of these tools is on `PATH`.
    AnyTool(&'static [&'static str]),
    /// The command runs and exits 0.
    Command(&'static str, &'static [&'static str]),
    /// `python3` (or `python`) reports at least [`MIN_PYTHON`].
    Python,
}

/// One prerequisite of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Short label for reports.
    pub name: &'static str,
    pub probe: Probe,
    /// What to tell the user when the probe fails.
    pub missing: &'static str,
}

/// Prerequisites for `backend` on `os`, in check order.
pub fn requirements(backend: Backend, os: OsKind) -> Vec<Requirement> {
    let mut reqs = Vec::new();
    match backend {
        Backend::Recognition => {
            if os == OsKind::MacOs {
                reqs.push(Requirement {
                    name: "Xcode Command Line Tools",
                    probe: Probe::Command("xcode-select", &["-p"]),
                    missing: "Xcode Command Line Tools (run: xcode-select --install)",
                });
            }
            reqs.push(Requirement {
                name: "git",
                probe: Probe::AnyTool(&["git"]),
                missing: "git",
            });
            reqs.push(Requirement {
                name: "make",
                probe: Probe::AnyTool(&["make"]),
                missing: "make",
            });
            if os != OsKind::MacOs {
                reqs.push(Requirement {
                    name: "C++ compiler",
                    probe: Probe::AnyTool(&["c++", "g++", "clang++"]),
                    missing: "C++ compiler (g++ or clang++)",
                });
            }
        }
        Backend::Synthesis => {
            reqs.push(Requirement {
                name: "Python 3.10+",
                probe: Probe::Python,
                missing: "Python 3.10+ required",
            });
            reqs.push(Requirement {
                name: "git",
                probe: Probe::AnyTool(&["git"]),
                missing: "Git is required",
            });
        }
    }
    reqs
}

/// Result of a single health check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,

    /// Whether the check passed
    pub passed: bool,

    /// Human-readable status message; on failure, the missing item
    pub message: String,

    /// Path to the tool (if applicable)
    pub path: Option<PathBuf>,

    /// Version string (if applicable)
    pub version: Option<String>,

    /// How long the check took
    pub duration: Duration,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: true,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
        }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: false,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
        }
    }

    /// Set the tool path.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Checks for one backend.
#[derive(Debug, Clone)]
pub struct BackendReport {
    pub backend: Backend,
    pub checks: Vec<CheckResult>,
}

impl BackendReport {
    pub fn ready(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Missing items, in check order.
    pub fn missing(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.message.clone())
            .collect()
    }
}

/// Summary of all health checks.
#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub os: OsKind,

    /// Per-backend results
    pub backends: Vec<BackendReport>,

    /// Total time taken
    pub total_duration: Duration,
}

impl DoctorReport {
    /// Check if every backend is ready to install.
    pub fn all_passed(&self) -> bool {
        self.backends.iter().all(BackendReport::ready)
    }

    /// Get the count of passed checks.
    pub fn passed_count(&self) -> usize {
        self.checks().filter(|c| c.passed).count()
    }

    /// Get the count of failed checks.
    pub fn failed_count(&self) -> usize {
        self.checks().filter(|c| !c.passed).count()
    }

    fn checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.backends.iter().flat_map(|b| b.checks.iter())
    }
}

/// Probe every prerequisite of `backend`.
pub fn check_backend(
    backend: Backend,
    os: OsKind,
    runner: &dyn CommandRunner,
    tools: &dyn ToolLocator,
) -> BackendReport {
    let checks = requirements(backend, os)
        .iter()
        .map(|req| check_requirement(req, runner, tools))
        .collect();
    BackendReport { backend, checks }
}

/// Fail with every missing prerequisite of `backend`, or succeed.
pub fn verify_prerequisites(
    backend: Backend,
    os: OsKind,
    runner: &dyn CommandRunner,
    tools: &dyn ToolLocator,
) -> Result<(), InstallError> {
    let report = check_backend(backend, os, runner, tools);
    if report.ready() {
        return Ok(());
    }
    let missing = report.missing();
    tracing::warn!(backend = %backend, "missing prerequisites: {}", missing.join(", "));
    Err(InstallError::MissingDependency { missing })
}

/// Run the doctor for the given backends.
pub fn doctor(
    backends: &[Backend],
    os: OsKind,
    runner: &dyn CommandRunner,
    tools: &dyn ToolLocator,
) -> DoctorReport {
    let start = Instant::now();
    let backends = backends
        .iter()
        .map(|&b| check_backend(b, os, runner, tools))
        .collect();
    DoctorReport {
        os,
        backends,
        total_duration: start.elapsed(),
    }
}

/// Probe a single requirement.
pub fn check_requirement(
    req: &Requirement,
    runner: &dyn CommandRunner,
    tools: &dyn ToolLocator,
) -> CheckResult {
    let start = Instant::now();
    let result = match &req.probe {
        Probe::AnyTool(names) => match names.iter().find_map(|n| tools.find(n).map(|p| (n, p))) {
            Some((name, path)) => CheckResult::pass(req.name, format!("Found {}", name)).with_path(path),
            None => CheckResult::fail(req.name, req.missing),
        },
        Probe::Command(program, args) => {
            let cmd = ProcessBuilder::new(program).args(args.iter());
            match runner.output(&cmd) {
                Ok(output) if output.success() => {
                    let path = output.stdout.trim();
                    let result = CheckResult::pass(req.name, format!("`{}` succeeded", cmd.display_command()));
                    if path.is_empty() {
                        result
                    } else {
                        result.with_path(PathBuf::from(path))
                    }
                }
                _ => CheckResult::fail(req.name, req.missing),
            }
        }
        Probe::Python => check_python(req, runner, tools),
    };
    tracing::debug!(check = req.name, passed = result.passed, "{}", result.message);
    result.with_duration(start.elapsed())
}

fn check_python(req: &Requirement, runner: &dyn CommandRunner, tools: &dyn ToolLocator) -> CheckResult {
    let mut rejected = None;
    for program in ["python3", "python"] {
        let Some(path) = tools.find(program) else {
            continue;
        };
        match check_interpreter(req, runner, program, path) {
            Ok(pass) => return pass,
            Err(fail) => {
                tracing::debug!(program, "{}", fail.message);
                rejected.get_or_insert(fail);
            }
        }
    }
    rejected.unwrap_or_else(|| {
        CheckResult::fail(req.name, format!("{} (python3 not found)", req.missing))
    })
}

/// Check one interpreter. `Err` carries the failed check.
fn check_interpreter(
    req: &Requirement,
    runner: &dyn CommandRunner,
    program: &str,
    path: PathBuf,
) -> Result<CheckResult, CheckResult> {
    let output = match runner.output(&ProcessBuilder::new(program).arg("--version")) {
        Ok(output) if output.success() => output,
        _ => {
            return Err(CheckResult::fail(
                req.name,
                format!("{} ({} did not run)", req.missing, program),
            ))
        }
    };

    // Python 2 prints its version on stderr.
    let text = format!("{}{}", output.stdout, output.stderr);
    match parse_python_version(&text) {
        Some(version) if version >= MIN_PYTHON => Ok(CheckResult::pass(
            req.name,
            format!("Found {}", program),
        )
        .with_path(path)
        .with_version(version.to_string())),
        Some(version) => Err(CheckResult::fail(
            req.name,
            format!("{} (found {})", req.missing, version),
        )
        .with_path(path)
        .with_version(version.to_string())),
        None => Err(CheckResult::fail(
            req.name,
            format!("{} (found unrecognized version: {})", req.missing, text.trim()),
        )
        .with_path(path)),
    }
}

/// Extract the version from `python --version` output.
pub fn parse_python_version(text: &str) -> Option<Version> {
    let caps = PYTHON_VERSION.as_ref()?.captures(text)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    Some(Version::new(part(1)?, part(2)?, part(3).unwrap_or(0)))
}

/// Format the doctor report for display.
pub fn format_report(report: &DoctorReport, verbose: bool) -> String {
    ReportDisplay { report, verbose }.to_string()
}

struct ReportDisplay<'a> {
    report: &'a DoctorReport,
    verbose: bool,
}

impl fmt::Display for ReportDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        writeln!(f, "voicekit doctor")?;
        writeln!(f, "===============\n")?;

        if self.verbose {
            writeln!(f, "Environment:")?;
            writeln!(f, "  OS: {} ({})\n", report.os, std::env::consts::ARCH)?;
        }

        for backend in &report.backends {
            writeln!(f, "{}:", backend.backend)?;
            for check in &backend.checks {
                let status = if check.passed { "[OK]" } else { "[!!]" };
                writeln!(f, "  {} {}", status, check.name)?;

                if !check.passed || self.verbose {
                    writeln!(f, "      {}", check.message)?;
                }
                if self.verbose {
                    if let Some(path) = &check.path {
                        writeln!(f, "      Path: {}", path.display())?;
                    }
                    if let Some(version) = &check.version {
                        writeln!(f, "      Version: {}", version)?;
                    }
                }
            }
            writeln!(f)?;
        }

        writeln!(
            f,
            "Summary: {} passed, {} failed",
            report.passed_count(),
            report.failed_count()
        )?;

        let not_ready: Vec<_> = report
            .backends
            .iter()
            .filter(|b| !b.ready())
            .map(|b| b.backend.name())
            .collect();
        if not_ready.is_empty() {
            writeln!(f, "\nAll checks passed. Ready to install.")
        } else {
            writeln!(f, "\nNot ready to install: {}", not_ready.join(", "))
        }
    }
}
