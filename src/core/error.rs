//! Install error taxonomy.

use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::process::{ProcessBuilder, ProcessOutput};

/// Number of trailing stderr lines kept in a command failure.
const STDERR_TAIL_LINES: usize = 40;

/// Failure of one install stage.
#[derive(Debug, Error, Diagnostic)]
pub enum InstallError {
    #[error("Missing dependencies: {}", .missing.join(", "))]
    #[diagnostic(
        code(voicekit::missing_dependency),
        help("Install the listed tools and re-run, or check with `voicekit doctor`")
    )]
    MissingDependency { missing: Vec<String> },

    #[error("Command failed: `{command}` ({}): {stderr}", exit_label(.code))]
    #[diagnostic(code(voicekit::command_failed))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Download of {url} failed: {message}")]
    #[diagnostic(
        code(voicekit::transport_error),
        help("Check your network connection; nothing partial was kept")
    )]
    Transport { url: String, message: String },

    #[error("Install cancelled during {stage}")]
    #[diagnostic(code(voicekit::cancelled))]
    Cancelled { stage: String },

    #[error("Service at {url} did not become ready after {attempts} health checks")]
    #[diagnostic(
        code(voicekit::service_unready),
        help("The service may still be starting; check its logs")
    )]
    ServiceUnready { url: String, attempts: u32 },

    #[error(transparent)]
    #[diagnostic(code(voicekit::internal_error))]
    Internal(#[from] anyhow::Error),
}

impl InstallError {
    /// Build a `CommandFailed` from a finished process.
    pub fn command_failed(cmd: &ProcessBuilder, output: &ProcessOutput) -> Self {
        InstallError::CommandFailed {
            command: cmd.display_command(),
            code: output.code,
            stderr: stderr_tail(&output.stderr),
        }
    }

    pub fn transport(url: impl Into<String>, message: impl fmt::Display) -> Self {
        InstallError::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn cancelled(stage: impl fmt::Display) -> Self {
        InstallError::Cancelled {
            stage: stage.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            InstallError::MissingDependency { .. } => ErrorCategory::MissingDependency,
            InstallError::CommandFailed { .. } => ErrorCategory::CommandFailed,
            InstallError::Transport { .. } => ErrorCategory::TransportError,
            InstallError::Cancelled { .. } => ErrorCategory::Cancelled,
            InstallError::ServiceUnready { .. } => ErrorCategory::ServiceUnready,
            InstallError::Internal(_) => ErrorCategory::InternalError,
        }
    }

    /// Missing dependency names, empty for every other kind.
    pub fn missing(&self) -> &[String] {
        match self {
            InstallError::MissingDependency { missing } => missing,
            _ => &[],
        }
    }
}

/// Error class reported in `InstallResult.error_category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    MissingDependency,
    CommandFailed,
    TransportError,
    Cancelled,
    ServiceUnready,
    InternalError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::MissingDependency => "missing_dependency",
            ErrorCategory::CommandFailed => "command_failed",
            ErrorCategory::TransportError => "transport_error",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::ServiceUnready => "service_unready",
            ErrorCategory::InternalError => "internal_error",
        };
        f.write_str(s)
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_lists_everything() {
        let err = InstallError::MissingDependency {
            missing: vec!["git".into(), "make".into()],
        };
        assert_eq!(err.to_string(), "Missing dependencies: git, make");
        assert_eq!(err.category(), ErrorCategory::MissingDependency);
        assert_eq!(err.missing(), ["git".to_string(), "make".to_string()]);
    }

    #[test]
    fn test_command_failed_message() {
        let cmd = ProcessBuilder::new("make").arg("-j4");
        let output = ProcessOutput {
            code: Some(2),
            stdout: String::new(),
            stderr: "ggml.c:1: error: boom\n".into(),
        };

        let err = InstallError::command_failed(&cmd, &output);
        assert_eq!(
            err.to_string(),
            "Command failed: `make -j4` (exit code 2): ggml.c:1: error: boom"
        );
        assert_eq!(err.category(), ErrorCategory::CommandFailed);
    }

    #[test]
    fn test_command_failed_keeps_stderr_tail() {
        let stderr: String = (0..100).map(|i| format!("line {}\n", i)).collect();
        let output = ProcessOutput {
            code: None,
            stdout: String::new(),
            stderr,
        };

        let msg = InstallError::command_failed(&ProcessBuilder::new("make"), &output).to_string();
        assert!(msg.contains("terminated by signal"));
        assert!(msg.contains("line 99"));
        assert!(!msg.contains("line 10\n"));
    }

    #[test]
    fn test_internal_from_anyhow() {
        let err: InstallError = anyhow::anyhow!("permission denied").into();
        assert_eq!(err.category(), ErrorCategory::InternalError);
        assert_eq!(err.to_string(), "permission denied");
    }

    #[test]
    fn test_category_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorCategory::TransportError).unwrap(),
            "\"transport_error\""
        );
        assert_eq!(ErrorCategory::Cancelled.to_string(), "cancelled");
    }
}
