//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use voicekit::core::{Backend, RecognitionModel, RecognitionOptions, SynthesisOptions};

/// voicekit - install local speech recognition and synthesis backends
#[derive(Parser)]
#[command(name = "voicekit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every subcommand.
#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of .voicekit/config.toml
    #[arg(long, global = true, env = "VOICEKIT_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the install result as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Give up after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a backend
    Install(BackendArgs),

    /// Show what an install would do, without doing it
    Plan(BackendArgs),

    /// Check prerequisites
    Doctor(DoctorArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BackendArgs {
    #[command(subcommand)]
    pub backend: BackendCommand,
}

#[derive(Subcommand)]
pub enum BackendCommand {
    /// whisper.cpp speech recognition
    Whisper(WhisperArgs),

    /// Kokoro-FastAPI speech synthesis
    Kokoro(KokoroArgs),
}

#[derive(Args)]
pub struct WhisperArgs {
    /// Where to build (defaults to ~/.voicekit/whisper.cpp)
    #[arg(long, value_name = "PATH")]
    pub install_dir: Option<PathBuf>,

    /// Remove any previous install first
    #[arg(short, long)]
    pub force: bool,

    /// Model size, e.g. tiny, base.en, large-v3
    #[arg(short, long)]
    pub model: Option<RecognitionModel>,

    /// Start whisper-server once installed
    #[arg(long)]
    pub auto_start: bool,

    /// Port for whisper-server
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl WhisperArgs {
    pub fn into_options(self) -> RecognitionOptions {
        RecognitionOptions {
            install_dir: self.install_dir,
            force_reinstall: self.force,
            model: self.model,
            auto_start: self.auto_start,
            port: self.port,
        }
    }
}

#[derive(Args)]
pub struct KokoroArgs {
    /// Where to check out (defaults to ~/.voicekit/kokoro-fastapi)
    #[arg(long, value_name = "PATH")]
    pub install_dir: Option<PathBuf>,

    /// Remove any previous install first
    #[arg(short, long)]
    pub force: bool,

    /// Port for the API server
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Skip voice model setup
    #[arg(long)]
    pub no_models: bool,

    /// Do not start the service
    #[arg(long)]
    pub no_auto_start: bool,

    /// Where voice models are kept
    #[arg(long, value_name = "PATH")]
    pub models_dir: Option<PathBuf>,
}

impl KokoroArgs {
    pub fn into_options(self) -> SynthesisOptions {
        SynthesisOptions {
            install_dir: self.install_dir,
            force_reinstall: self.force,
            port: self.port,
            install_models: !self.no_models,
            auto_start: !self.no_auto_start,
            models_dir: self.models_dir,
        }
    }
}

#[derive(Args)]
pub struct DoctorArgs {
    /// Only check one backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum BackendArg {
    Whisper,
    Kokoro,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Whisper => Backend::Recognition,
            BackendArg::Kokoro => Backend::Synthesis,
        }
    }
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
