//! Platform profile: operating system plus GPU acceleration.
//!
//! The profile is derived once per run and passed by value through the
//! pipeline. It selects the build plan variant and the service strategy,
//! and is echoed into the result, but never fails an install on its own.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::process::{CommandRunner, ProcessBuilder, ToolLocator};

/// GPU vendor diagnostic tool probed on Linux.
pub const CUDA_PROBE: &str = "nvidia-smi";

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsKind {
    MacOs,
    Linux,
    Other,
}

impl OsKind {
    /// The OS this binary was compiled for.
    pub fn host() -> Self {
        OsKind::from_os_name(std::env::consts::OS)
    }

    /// Classify a `std::env::consts::OS` style name.
    pub fn from_os_name(name: &str) -> Self {
        match name {
            "macos" => OsKind::MacOs,
            "linux" => OsKind::Linux,
            _ => OsKind::Other,
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsKind::MacOs => write!(f, "macos"),
            OsKind::Linux => write!(f, "linux"),
            OsKind::Other => write!(f, "other"),
        }
    }
}

/// Hardware acceleration available to the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acceleration {
    #[default]
    None,
    Metal,
    Cuda,
}

impl Acceleration {
    /// Name reported as `gpu_type`, if any.
    pub fn gpu_type(&self) -> Option<&'static str> {
        match self {
            Acceleration::None => None,
            Acceleration::Metal => Some("metal"),
            Acceleration::Cuda => Some("cuda"),
        }
    }
}

/// Detected platform for one installer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub os: OsKind,
    pub acceleration: Acceleration,
}

impl PlatformProfile {
    /// Pure classification from the OS and the outcome of the GPU probe.
    ///
    /// macOS always has Metal. Linux has CUDA only if the vendor tool ran
    /// successfully. Everything else gets no acceleration.
    pub fn classify(os: OsKind, gpu_probe_succeeded: bool) -> Self {
        let acceleration = match os {
            OsKind::MacOs => Acceleration::Metal,
            OsKind::Linux if gpu_probe_succeeded => Acceleration::Cuda,
            _ => Acceleration::None,
        };
        PlatformProfile { os, acceleration }
    }

    /// Probe the host and classify it.
    pub fn detect(os: OsKind, runner: &dyn CommandRunner, tools: &dyn ToolLocator) -> Self {
        let probe = os == OsKind::Linux && probe_cuda(runner, tools);
        let profile = PlatformProfile::classify(os, probe);
        tracing::debug!(
            os = %profile.os,
            gpu = profile.acceleration.gpu_type().unwrap_or("none"),
            "platform detected"
        );
        profile
    }

    /// Whether any GPU acceleration is in use.
    pub fn gpu_enabled(&self) -> bool {
        self.acceleration != Acceleration::None
    }
}

fn probe_cuda(runner: &dyn CommandRunner, tools: &dyn ToolLocator) -> bool {
    if !tools.has(CUDA_PROBE) {
        return false;
    }
    match runner.output(&ProcessBuilder::new(CUDA_PROBE)) {
        Ok(output) => output.success(),
        Err(e) => {
            tracing::debug!("{} probe failed: {:#}", CUDA_PROBE, e);
            false
        }
    }
}
