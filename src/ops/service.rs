//! Service lifecycle.
//!
//! On Linux the backend is registered as a systemd user unit named after
//! the backend and port, so reinstalling on the same port reuses the same
//! unit. Elsewhere the launcher is spawned as a background process. Either
//! way the manager then polls the health endpoint for a bounded number of
//! attempts. An unready service is reported, not treated as a failed
//! install.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::builder::{ServiceSpec, ServiceStrategy};
use crate::core::{InstallError, ServiceStatus};
use crate::sources::HttpClient;
use crate::util::cancel::CancelToken;
use crate::util::fs::write_string;
use crate::util::process::{CommandRunner, ProcessBuilder};

/// What starting the service produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOutcome {
    pub status: ServiceStatus,
    pub pid: Option<u32>,
    pub unit_file: Option<PathBuf>,
    pub enabled: Option<bool>,
    pub ready: bool,
    /// Set only once the health check passed.
    pub url: Option<String>,
    pub warnings: Vec<String>,
}

/// A started service, held only for the duration of one install.
#[derive(Debug)]
enum ServiceHandle {
    Process { pid: u32 },
    Unit { path: PathBuf, enabled: bool, started: bool },
}

/// Starts backends and waits for them to answer.
pub struct ServiceManager<'a> {
    runner: &'a dyn CommandRunner,
    http: &'a dyn HttpClient,
    cancel: &'a CancelToken,
    unit_dir: &'a Path,
    attempts: u32,
    interval: Duration,
}

impl<'a> ServiceManager<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        http: &'a dyn HttpClient,
        cancel: &'a CancelToken,
        unit_dir: &'a Path,
    ) -> Self {
        ServiceManager {
            runner,
            http,
            cancel,
            unit_dir,
            attempts: 30,
            interval: Duration::from_secs(1),
        }
    }

    /// Set the readiness budget.
    pub fn readiness(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.interval = interval;
        self
    }

    /// Start the service described by `spec` and wait for it to be ready.
    pub fn start(&self, spec: &ServiceSpec) -> Result<ServiceOutcome, InstallError> {
        let mut warnings = Vec::new();
        let handle = match spec.strategy {
            ServiceStrategy::Supervisor => self.start_supervised(spec, &mut warnings)?,
            ServiceStrategy::Direct => self.start_direct(spec)?,
        };

        let mut outcome = match &handle {
            ServiceHandle::Process { pid } => ServiceOutcome {
                status: ServiceStatus::Running,
                pid: Some(*pid),
                unit_file: None,
                enabled: None,
                ready: false,
                url: None,
                warnings: Vec::new(),
            },
            ServiceHandle::Unit { path, enabled, .. } => ServiceOutcome {
                status: ServiceStatus::ManagedByServiceSupervisor,
                pid: None,
                unit_file: Some(path.clone()),
                enabled: Some(*enabled),
                ready: false,
                url: None,
                warnings: Vec::new(),
            },
        };

        let launched = !matches!(handle, ServiceHandle::Unit { started: false, .. });
        if launched {
            match self.wait_ready(spec) {
                Ok(()) => {
                    outcome.ready = true;
                    outcome.url = Some(spec.url());
                }
                Err(err @ InstallError::ServiceUnready { .. }) => {
                    tracing::warn!("{}", err);
                    warnings.push(err.to_string());
                }
                Err(err) => {
                    if let ServiceHandle::Process { pid } = handle {
                        self.stop_direct(pid);
                    }
                    return Err(err);
                }
            }
        }

        outcome.warnings = warnings;
        Ok(outcome)
    }

    fn start_supervised(
        &self,
        spec: &ServiceSpec,
        warnings: &mut Vec<String>,
    ) -> Result<ServiceHandle, InstallError> {
        let unit = spec.unit_name();
        let path = self.unit_dir.join(&unit);
        write_string(&path, &render_unit(spec))?;
        tracing::info!(unit = %unit, "wrote {}", path.display());

        let mut all_ok = true;
        let mut started = false;
        for args in [
            vec!["--user", "daemon-reload"],
            vec!["--user", "enable", unit.as_str()],
            vec!["--user", "start", unit.as_str()],
        ] {
            let is_start = args[1] == "start";
            let cmd = ProcessBuilder::new("systemctl").args(&args);
            let ok = match self.runner.output(&cmd) {
                Ok(output) if output.success() => true,
                Ok(output) => {
                    warnings.push(format!(
                        "`{}` failed: {}",
                        cmd.display_command(),
                        output.stderr.trim()
                    ));
                    false
                }
                Err(e) => {
                    warnings.push(format!("`{}` failed: {:#}", cmd.display_command(), e));
                    false
                }
            };
            if !ok {
                tracing::warn!("{}", warnings.last().map(String::as_str).unwrap_or_default());
            }
            all_ok &= ok;
            started |= is_start && ok;
        }

        Ok(ServiceHandle::Unit {
            path,
            enabled: all_ok,
            started,
        })
    }

    fn start_direct(&self, spec: &ServiceSpec) -> Result<ServiceHandle, InstallError> {
        let mut cmd = ProcessBuilder::new(&spec.launcher).cwd(&spec.working_dir);
        for (key, value) in &spec.env {
            cmd = cmd.env(key, value);
        }
        let pid = self
            .runner
            .spawn(&cmd)
            .map_err(|e| InstallError::CommandFailed {
                command: cmd.display_command(),
                code: None,
                stderr: format!("{:#}", e),
            })?;
        tracing::info!(pid, port = spec.port, "started {}", spec.backend);
        Ok(ServiceHandle::Process { pid })
    }

    /// Stop a process we spawned but will not hand back to the caller.
    fn stop_direct(&self, pid: u32) {
        let cmd = kill_command(pid);
        match self.runner.output(&cmd) {
            Ok(out) if out.success() => tracing::info!(pid, "stopped service"),
            Ok(out) => tracing::warn!(
                pid,
                "failed to stop service, it is still running: {}",
                out.stderr.trim()
            ),
            Err(e) => tracing::warn!(pid, "failed to stop service, it is still running: {:#}", e),
        }
    }

    /// Poll the health endpoint until it answers 2xx or the budget runs out.
    pub fn wait_ready(&self, spec: &ServiceSpec) -> Result<(), InstallError> {
        let url = spec.health_url();
        for attempt in 1..=self.attempts {
            if self.cancel.is_cancelled() {
                return Err(InstallError::cancelled("readiness check"));
            }
            match self.http.check(&url) {
                Ok(status) if (200..300).contains(&status) => {
                    tracing::info!(url = %url, attempt, "service is ready");
                    return Ok(());
                }
                Ok(status) => tracing::debug!(url = %url, attempt, status, "not ready"),
                Err(e) => tracing::debug!(url = %url, attempt, "not ready: {:#}", e),
            }
            if attempt < self.attempts {
                std::thread::sleep(self.interval);
            }
        }
        Err(InstallError::ServiceUnready {
            url,
            attempts: self.attempts,
        })
    }
}

#[cfg(unix)]
fn kill_command(pid: u32) -> ProcessBuilder {
    ProcessBuilder::new("kill").arg(pid.to_string())
}

#[cfg(not(unix))]
fn kill_command(pid: u32) -> ProcessBuilder {
    ProcessBuilder::new("taskkill").args(["/F", "/PID"]).arg(pid.to_string())
}

/// Render the systemd user unit for a backend.
pub fn render_unit(spec: &ServiceSpec) -> String {
    let mut env = String::new();
    for (key, value) in &spec.env {
        let _ = writeln!(env, "Environment={}={}", key, value);
    }
    format!(
        "[Unit]\n\
         Description=voicekit {backend} on port {port}\n\
         After=network.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         WorkingDirectory={dir}\n\
         ExecStart={exec}\n\
         {env}\
         Restart=on-failure\n\
         RestartSec=5\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n",
        backend = spec.backend,
        port = spec.port,
        dir = spec.working_dir.display(),
        exec = spec.launcher.display(),
        env = env,
    )
}
