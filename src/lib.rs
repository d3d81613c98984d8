//! voicekit - installer for local speech recognition and synthesis backends
//!
//! This crate builds whisper.cpp from source, sets up Kokoro-FastAPI, fetches
//! the assets each needs, and optionally starts them as local services.

pub mod builder;
pub mod core;
pub mod ops;
pub mod sources;
pub mod util;

/// Test utilities and mocks for voicekit unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides mock implementations for process execution,
/// tool lookup, and HTTP operations.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    Backend, InstallError, InstallRequest, InstallResult, RecognitionModel, RecognitionOptions,
    SynthesisOptions,
};
pub use ops::{install_recognition, install_synthesis, InstallContext};
pub use util::context::GlobalContext;
