//! Test fixtures for common test scenarios.
//!
//! [`HostFixture`] is a scripted host: a temporary home directory plus
//! mocks that behave like a machine with a working toolchain, reachable
//! upstreams, and services that answer their health checks immediately.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use super::{MockExecutor, MockHttpClient, MockHttpResponse, MockProcessOutput, MockToolLocator};
use crate::core::OsKind;
use crate::ops::InstallContext;
use crate::util::config::{self, Config};
use crate::util::context::GlobalContext;
use crate::util::process::ProcessBuilder;

/// Tools present on a fully provisioned host.
pub const HOST_TOOLS: &[&str] = &["git", "make", "g++", "python3", "uv"];

/// A fake machine for orchestrator tests.
pub struct HostFixture {
    pub home: TempDir,
    pub os: OsKind,
    pub exec: Arc<MockExecutor>,
    pub tools: Arc<MockToolLocator>,
    pub http: Arc<MockHttpClient>,
}

impl HostFixture {
    pub fn new(os: OsKind) -> Self {
        let home = TempDir::new().expect("failed to create temp home");

        let exec = MockExecutor::succeeding();
        exec.expect("python3 --version", MockProcessOutput::success("Python 3.11.4\n"));
        exec.on_prefix("git clone", fake_clone);
        exec.on_prefix("make -j", fake_make);

        let http = MockHttpClient::new();
        http.mock_url(config::DEFAULT_MODEL_BASE_URL, MockHttpResponse::ok(b"ggml".to_vec()));
        http.mock_url(
            config::DEFAULT_START_SCRIPT_BASE_URL,
            MockHttpResponse::ok(b"#!/bin/sh\nexec uv run api\n".to_vec()),
        );
        http.mock_url("http://127.0.0.1:", MockHttpResponse::ok(b"{}".to_vec()));

        HostFixture {
            home,
            os,
            exec: Arc::new(exec),
            tools: Arc::new(MockToolLocator::with_tools(HOST_TOOLS)),
            http: Arc::new(http),
        }
    }

    pub fn linux() -> Self {
        HostFixture::new(OsKind::Linux)
    }

    pub fn macos() -> Self {
        HostFixture::new(OsKind::MacOs)
    }

    /// Replace the installed tool set.
    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = Arc::new(MockToolLocator::with_tools(tools));
        self
    }

    /// A host where nothing is installed.
    pub fn without_tools(self) -> Self {
        self.with_tools(&[])
    }

    pub fn gctx(&self) -> GlobalContext {
        GlobalContext::with_home(self.home.path())
    }

    /// Default install root, `~/.voicekit`.
    pub fn install_root(&self) -> PathBuf {
        self.gctx().home().to_path_buf()
    }

    /// Configuration with an instant readiness poll.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.service.readiness_attempts = Some(2);
        config.service.readiness_interval_ms = Some(0);
        config
    }

    pub fn context(&self) -> InstallContext {
        InstallContext::new(
            self.gctx(),
            self.config(),
            self.exec.clone(),
            self.tools.clone(),
            self.http.clone(),
        )
        .with_os(self.os)
    }
}

/// `git clone <url> <dir>` creates `<dir>`.
fn fake_clone(cmd: &ProcessBuilder) {
    if let Some(dir) = cmd.get_args().last() {
        std::fs::create_dir_all(dir).expect("fake clone failed");
    }
}

/// `make -jN` in a checkout produces the `main` binary.
fn fake_make(cmd: &ProcessBuilder) {
    if let Some(dir) = cmd.get_cwd() {
        write_file(&dir.join("main"), "#!/bin/sh\n");
    }
}

/// Write a file, creating parents.
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create parent");
    }
    std::fs::write(path, contents).expect("failed to write file");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::process::CommandRunner;

    #[test]
    fn test_fake_clone_and_make() {
        let host = HostFixture::linux();
        let dir = host.install_root().join("whisper.cpp");

        host.exec
            .output(&ProcessBuilder::new("git").args(["clone", "url"]).arg(&dir))
            .unwrap();
        assert!(dir.is_dir());

        host.exec
            .output(&ProcessBuilder::new("make").arg("-j2").cwd(&dir))
            .unwrap();
        assert!(dir.join("main").exists());
    }

    #[test]
    fn test_context_uses_fixture_home() {
        let host = HostFixture::macos();
        let ctx = host.context();

        assert_eq!(ctx.os(), OsKind::MacOs);
        assert!(ctx.gctx().home().starts_with(host.home.path()));
        assert_eq!(ctx.config().readiness_attempts(), 2);
    }
}
