//! The result handed back to callers of an install.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::{Backend, ErrorCategory, InstallError};

/// State of the backend's service after the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[default]
    NotStarted,
    Running,
    ManagedByServiceSupervisor,
}

/// Outcome of one install, rendered as a flat JSON object.
///
/// `success == true` implies `install_path` existed on disk when the result
/// was assembled. `success == false` implies `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    pub success: bool,
    pub backend: Backend,
    pub install_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    pub already_installed: bool,
    pub gpu_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_type: Option<String>,
    pub service_status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systemd_service: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systemd_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl InstallResult {
    /// An unsuccessful, empty result for `backend` at `install_path`.
    pub fn new(backend: Backend, install_path: impl Into<PathBuf>) -> Self {
        InstallResult {
            success: false,
            backend,
            install_path: install_path.into(),
            model_path: None,
            already_installed: false,
            gpu_enabled: false,
            gpu_type: None,
            service_status: ServiceStatus::NotStarted,
            service_url: None,
            service_pid: None,
            service_ready: None,
            systemd_service: None,
            systemd_enabled: None,
            error: None,
            error_category: None,
            missing: Vec::new(),
            message: String::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a terminal failure.
    pub fn fail(&mut self, err: &InstallError) {
        let text = err.to_string();
        self.success = false;
        self.error_category = Some(err.category());
        self.missing = err.missing().to_vec();
        self.message = format!("{} install failed: {}", self.backend, text);
        self.error = Some(text);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
