//! Configuration file support for voicekit.
//!
//! voicekit reads two configuration file locations:
//! - Global: `~/.voicekit/config.toml` - User-wide defaults
//! - Project: `.voicekit/config.toml` - Directory-local overrides
//!
//! Project config takes precedence over global config. Command-line options
//! take precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::RecognitionModel;

/// Upstream whisper.cpp repository.
pub const DEFAULT_RECOGNITION_REPO: &str = "https://github.com/ggerganov/whisper.cpp.git";

/// Where ggml model weights are published.
pub const DEFAULT_MODEL_BASE_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Upstream Kokoro-FastAPI repository.
pub const DEFAULT_SYNTHESIS_REPO: &str = "https://github.com/remsky/Kokoro-FastAPI.git";

/// Raw file base for the Kokoro-FastAPI start scripts.
pub const DEFAULT_START_SCRIPT_BASE_URL: &str =
    "https://raw.githubusercontent.com/remsky/Kokoro-FastAPI/master";

/// Default number of health checks before giving up on a started service.
pub const DEFAULT_READINESS_ATTEMPTS: u32 = 30;

/// Default pause between health checks.
pub const DEFAULT_READINESS_INTERVAL_MS: u64 = 1000;

/// Default timeout for short control requests.
pub const DEFAULT_NET_TIMEOUT_SECS: u64 = 30;

/// voicekit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Install location settings
    pub install: InstallConfig,

    /// whisper.cpp settings
    pub recognition: RecognitionConfig,

    /// Kokoro-FastAPI settings
    pub synthesis: SynthesisConfig,

    /// Service startup settings
    pub service: ServiceConfig,

    /// Network settings
    pub net: NetConfig,
}

/// Install location configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Base directory for default install locations (default `~/.voicekit`)
    pub root: Option<PathBuf>,
}

/// Recognition backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Default model size
    pub model: Option<RecognitionModel>,

    /// Default server port
    pub port: Option<u16>,

    /// Git URL to clone from
    pub repo_url: Option<String>,

    /// Base URL for `ggml-<model>.bin` downloads
    pub model_base_url: Option<String>,
}

/// Synthesis backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Default service port
    pub port: Option<u16>,

    /// Where the service keeps its voice models
    pub models_dir: Option<PathBuf>,

    /// Git URL to clone from
    pub repo_url: Option<String>,

    /// Base URL for start script downloads
    pub start_script_base_url: Option<String>,
}

/// Service readiness configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Number of health checks
    pub readiness_attempts: Option<u32>,

    /// Milliseconds between health checks
    pub readiness_interval_ms: Option<u64>,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Timeout for control requests in seconds
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.install.root.is_some() {
            self.install.root = other.install.root;
        }

        if other.recognition.model.is_some() {
            self.recognition.model = other.recognition.model;
        }
        if other.recognition.port.is_some() {
            self.recognition.port = other.recognition.port;
        }
        if other.recognition.repo_url.is_some() {
            self.recognition.repo_url = other.recognition.repo_url;
        }
        if other.recognition.model_base_url.is_some() {
            self.recognition.model_base_url = other.recognition.model_base_url;
        }

        if other.synthesis.port.is_some() {
            self.synthesis.port = other.synthesis.port;
        }
        if other.synthesis.models_dir.is_some() {
            self.synthesis.models_dir = other.synthesis.models_dir;
        }
        if other.synthesis.repo_url.is_some() {
            self.synthesis.repo_url = other.synthesis.repo_url;
        }
        if other.synthesis.start_script_base_url.is_some() {
            self.synthesis.start_script_base_url = other.synthesis.start_script_base_url;
        }

        if other.service.readiness_attempts.is_some() {
            self.service.readiness_attempts = other.service.readiness_attempts;
        }
        if other.service.readiness_interval_ms.is_some() {
            self.service.readiness_interval_ms = other.service.readiness_interval_ms;
        }

        if other.net.timeout_secs.is_some() {
            self.net.timeout_secs = other.net.timeout_secs;
        }
    }

    pub fn recognition_repo(&self) -> &str {
        self.recognition
            .repo_url
            .as_deref()
            .unwrap_or(DEFAULT_RECOGNITION_REPO)
    }

    pub fn model_base_url(&self) -> &str {
        self.recognition
            .model_base_url
            .as_deref()
            .unwrap_or(DEFAULT_MODEL_BASE_URL)
    }

    pub fn synthesis_repo(&self) -> &str {
        self.synthesis
            .repo_url
            .as_deref()
            .unwrap_or(DEFAULT_SYNTHESIS_REPO)
    }

    pub fn start_script_base_url(&self) -> &str {
        self.synthesis
            .start_script_base_url
            .as_deref()
            .unwrap_or(DEFAULT_START_SCRIPT_BASE_URL)
    }

    /// Health check budget, never less than one attempt.
    pub fn readiness_attempts(&self) -> u32 {
        self.service
            .readiness_attempts
            .unwrap_or(DEFAULT_READINESS_ATTEMPTS)
            .max(1)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_millis(
            self.service
                .readiness_interval_ms
                .unwrap_or(DEFAULT_READINESS_INTERVAL_MS),
        )
    }

    pub fn net_timeout(&self) -> Duration {
        Duration::from_secs(self.net.timeout_secs.unwrap_or(DEFAULT_NET_TIMEOUT_SECS))
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.voicekit/config.toml)
/// 2. Global config (~/.voicekit/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the project config path (.voicekit/config.toml).
pub fn project_config_path(dir: &Path) -> PathBuf {
    dir.join(".voicekit").join("config.toml")
}
