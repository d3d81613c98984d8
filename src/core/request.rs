//! Install requests.
//!
//! Callers fill in a [`RecognitionOptions`] or [`SynthesisOptions`], leaving
//! anything unset to be taken from configuration. Resolving the options
//! produces an [`InstallRequest`] with every path, port, and URL concrete.
//! The request is never modified after that.

use std::path::{Path, PathBuf};

use crate::core::{Backend, RecognitionModel};
use crate::util::config::Config;
use crate::util::context::GlobalContext;

/// Caller-facing options for a whisper.cpp install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub install_dir: Option<PathBuf>,
    pub force_reinstall: bool,
    pub model: Option<RecognitionModel>,
    pub auto_start: bool,
    pub port: Option<u16>,
}

/// Caller-facing options for a Kokoro-FastAPI install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub install_dir: Option<PathBuf>,
    pub force_reinstall: bool,
    pub port: Option<u16>,
    pub install_models: bool,
    pub auto_start: bool,
    pub models_dir: Option<PathBuf>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        SynthesisOptions {
            install_dir: None,
            force_reinstall: false,
            port: None,
            install_models: true,
            auto_start: true,
            models_dir: None,
        }
    }
}

/// Backend-specific part of a resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Recognition {
        model: RecognitionModel,
        model_base_url: String,
    },
    Synthesis {
        install_models: bool,
        models_dir: PathBuf,
        start_script_base_url: String,
    },
}

/// A fully resolved install request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub install_dir: PathBuf,
    pub force_reinstall: bool,
    pub auto_start: bool,
    pub port: u16,
    pub repo_url: String,
    pub kind: RequestKind,
}

impl InstallRequest {
    /// Resolve whisper.cpp options against configuration.
    pub fn recognition(opts: RecognitionOptions, config: &Config, gctx: &GlobalContext) -> Self {
        let backend = Backend::Recognition;
        InstallRequest {
            install_dir: opts
                .install_dir
                .unwrap_or_else(|| install_root(config, gctx).join(backend.dir_name())),
            force_reinstall: opts.force_reinstall,
            auto_start: opts.auto_start,
            port: opts
                .port
                .or(config.recognition.port)
                .unwrap_or(backend.default_port()),
            repo_url: config.recognition_repo().to_string(),
            kind: RequestKind::Recognition {
                model: opts.model.or(config.recognition.model).unwrap_or_default(),
                model_base_url: config.model_base_url().to_string(),
            },
        }
    }

    /// Resolve Kokoro-FastAPI options against configuration.
    pub fn synthesis(opts: SynthesisOptions, config: &Config, gctx: &GlobalContext) -> Self {
        let backend = Backend::Synthesis;
        let root = install_root(config, gctx);
        InstallRequest {
            install_dir: opts
                .install_dir
                .unwrap_or_else(|| root.join(backend.dir_name())),
            force_reinstall: opts.force_reinstall,
            auto_start: opts.auto_start,
            port: opts
                .port
                .or(config.synthesis.port)
                .unwrap_or(backend.default_port()),
            repo_url: config.synthesis_repo().to_string(),
            kind: RequestKind::Synthesis {
                install_models: opts.install_models,
                models_dir: opts
                    .models_dir
                    .or_else(|| config.synthesis.models_dir.clone())
                    .unwrap_or_else(|| root.join("kokoro-models")),
                start_script_base_url: config.start_script_base_url().to_string(),
            },
        }
    }

    pub fn backend(&self) -> Backend {
        match self.kind {
            RequestKind::Recognition { .. } => Backend::Recognition,
            RequestKind::Synthesis { .. } => Backend::Synthesis,
        }
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Local endpoint the started service answers on.
    pub fn service_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Where the recognition model weights live, if this is a recognition
    /// request.
    pub fn model_path(&self) -> Option<PathBuf> {
        match &self.kind {
            RequestKind::Recognition { model, .. } => {
                Some(self.install_dir.join("models").join(model.file_name()))
            }
            RequestKind::Synthesis { .. } => None,
        }
    }
}

fn install_root(config: &Config, gctx: &GlobalContext) -> PathBuf {
    config
        .install
        .root
        .clone()
        .unwrap_or_else(|| gctx.home().to_path_buf())
}
