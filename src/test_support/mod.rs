//! Test utilities and mocks for voicekit unit tests.
//!
//! This module provides scripted implementations of the three seams the
//! installer talks to the outside world through: process execution, tool
//! lookup, and HTTP.
//!
//! # Example
//!
//! ```rust,ignore
//! use voicekit::test_support::{MockExecutor, MockProcessOutput, MockToolLocator};
//!
//! #[test]
//! fn test_example() {
//!     let exec = MockExecutor::succeeding();
//!     exec.expect_prefix("make -j", MockProcessOutput::failure(2, "Build error"));
//!
//!     let tools = MockToolLocator::with_tools(&["git", "make"]);
//!
//!     // Hand `&exec` and `&tools` to the code under test...
//! }
//! ```

pub mod fixtures;

use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::sources::{HttpClient, HttpResponse};
use crate::util::process::{CommandRunner, ProcessBuilder, ProcessOutput, ToolLocator};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Pid reported for every mocked background process.
pub const MOCK_PID: u32 = 12345;

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Create an output with both stdout and stderr.
    pub fn with_output(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    fn to_process_output(&self) -> ProcessOutput {
        ProcessOutput {
            code: Some(self.status),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

impl Default for MockProcessOutput {
    fn default() -> Self {
        MockProcessOutput::success("")
    }
}

/// Pattern for matching commands in MockExecutor.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match if command starts with prefix.
    StartsWith(String),
    /// Match if command contains substring.
    Contains(String),
    /// Match using a regex pattern.
    Regex(String),
    /// Match any command.
    Any,
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s),
            CommandPattern::Contains(s) => cmd.contains(s),
            CommandPattern::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(cmd))
                .unwrap_or(false),
            CommandPattern::Any => true,
        }
    }
}

type Hook = Box<dyn Fn(&ProcessBuilder) + Send + Sync>;

#[derive(Default)]
struct ExecutorState {
    expectations: Vec<(CommandPattern, MockProcessOutput)>,
    spawn_errors: Vec<CommandPattern>,
    hooks: Vec<(CommandPattern, Hook)>,
    default_output: Option<MockProcessOutput>,
    calls: Vec<String>,
    spawned: Vec<ProcessBuilder>,
}

/// Mock process executor for testing command execution.
///
/// The most recently added matching expectation wins, so a test can override
/// what a fixture registered. Commands that match nothing fall back to the
/// default output, or fail to start if no default is set.
#[derive(Default)]
pub struct MockExecutor {
    state: Mutex<ExecutorState>,
}

impl MockExecutor {
    /// Create a mock executor that rejects every unexpected command.
    pub fn new() -> Self {
        MockExecutor::default()
    }

    /// Create a mock executor where every unexpected command succeeds.
    pub fn succeeding() -> Self {
        let exec = MockExecutor::new();
        exec.set_default(MockProcessOutput::success(""));
        exec
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ExecutorState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Add an expectation for an exact command match.
    pub fn expect(&self, cmd: &str, output: MockProcessOutput) -> &Self {
        self.expect_pattern(CommandPattern::Exact(cmd.to_string()), output)
    }

    /// Add an expectation for a command starting with a prefix.
    pub fn expect_prefix(&self, prefix: &str, output: MockProcessOutput) -> &Self {
        self.expect_pattern(CommandPattern::StartsWith(prefix.to_string()), output)
    }

    /// Add an expectation for a command containing a substring.
    pub fn expect_contains(&self, substring: &str, output: MockProcessOutput) -> &Self {
        self.expect_pattern(CommandPattern::Contains(substring.to_string()), output)
    }

    /// Add a custom expectation.
    pub fn expect_pattern(&self, pattern: CommandPattern, output: MockProcessOutput) -> &Self {
        self.with_state(|s| s.expectations.push((pattern, output)));
        self
    }

    /// Make commands starting with `prefix` fail to start at all.
    pub fn expect_spawn_error(&self, prefix: &str) -> &Self {
        self.with_state(|s| {
            s.spawn_errors
                .push(CommandPattern::StartsWith(prefix.to_string()))
        });
        self
    }

    /// Set a default output for commands that don't match any expectation.
    pub fn set_default(&self, output: MockProcessOutput) -> &Self {
        self.with_state(|s| s.default_output = Some(output));
        self
    }

    /// Run `hook` after every successful command starting with `prefix`.
    ///
    /// Used to fake the filesystem side effects of tools like `git clone`.
    pub fn on_prefix(
        &self,
        prefix: &str,
        hook: impl Fn(&ProcessBuilder) + Send + Sync + 'static,
    ) -> &Self {
        self.with_state(|s| {
            s.hooks
                .push((CommandPattern::StartsWith(prefix.to_string()), Box::new(hook)))
        });
        self
    }

    /// Get all commands that were run to completion, in order.
    pub fn calls(&self) -> Vec<String> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn call_count(&self) -> usize {
        self.with_state(|s| s.calls.len())
    }

    /// Get every background process that was started.
    pub fn spawned(&self) -> Vec<ProcessBuilder> {
        self.with_state(|s| s.spawned.clone())
    }

    /// Assert that some command started with `prefix`.
    pub fn assert_called(&self, prefix: &str) {
        let calls = self.calls();
        assert!(
            calls.iter().any(|c| c.starts_with(prefix)),
            "expected a call starting with '{}', got {:?}",
            prefix,
            calls
        );
    }

    /// Assert that no command started with `prefix`.
    pub fn assert_not_called(&self, prefix: &str) {
        let calls = self.calls();
        assert!(
            !calls.iter().any(|c| c.starts_with(prefix)),
            "expected no call starting with '{}', got {:?}",
            prefix,
            calls
        );
    }
}

impl CommandRunner for MockExecutor {
    fn output(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput> {
        let line = cmd.display_command();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(line.clone());

        if state.spawn_errors.iter().any(|p| p.matches(&line)) {
            bail!("failed to spawn `{}`", line);
        }

        let output = state
            .expectations
            .iter()
            .rev()
            .find(|(pattern, _)| pattern.matches(&line))
            .map(|(_, output)| output.clone())
            .or_else(|| state.default_output.clone());
        let Some(output) = output else {
            bail!("unexpected command: {}", line);
        };

        if output.status == 0 {
            for (pattern, hook) in &state.hooks {
                if pattern.matches(&line) {
                    hook(cmd);
                }
            }
        }
        Ok(output.to_process_output())
    }

    fn spawn(&self, cmd: &ProcessBuilder) -> Result<u32> {
        let line = cmd.display_command();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.spawn_errors.iter().any(|p| p.matches(&line)) {
            bail!("failed to spawn `{}`", line);
        }
        state.spawned.push(cmd.clone());
        Ok(MOCK_PID)
    }
}

/// Mock HTTP response for testing downloads.
#[derive(Debug, Clone)]
pub struct MockHttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl MockHttpResponse {
    /// Create a successful response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        MockHttpResponse {
            status: 200,
            body: body.into(),
        }
    }

    /// Create a not found response.
    pub fn not_found() -> Self {
        MockHttpResponse {
            status: 404,
            body: b"Not Found".to_vec(),
        }
    }

    /// Create a server error response.
    pub fn server_error(message: &str) -> Self {
        MockHttpResponse {
            status: 500,
            body: message.as_bytes().to_vec(),
        }
    }

    /// Create a response with an arbitrary status.
    pub fn status(status: u16) -> Self {
        MockHttpResponse {
            status,
            body: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct HttpState {
    responses: HashMap<String, MockHttpResponse>,
    requests: Vec<String>,
    default_response: Option<MockHttpResponse>,
}

/// Mock HTTP client for testing downloads and health checks.
///
/// URLs are matched exactly first, then by the longest registered prefix.
/// A URL that matches nothing behaves like a refused connection.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    state: Mutex<HttpState>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        MockHttpClient::default()
    }

    /// Add a response for a URL or URL prefix.
    pub fn mock_url(&self, url: &str, response: MockHttpResponse) -> &Self {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.responses.insert(url.to_string(), response);
        self
    }

    /// Set a default response for unmatched URLs.
    pub fn set_default(&self, response: MockHttpResponse) -> &Self {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.default_response = Some(response);
        self
    }

    /// Get all requested URLs.
    pub fn requests(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.requests.clone()
    }
}

impl HttpClient for MockHttpClient {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.requests.push(url.to_string());

        let response = state
            .responses
            .get(url)
            .or_else(|| {
                state
                    .responses
                    .iter()
                    .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
                    .max_by_key(|(prefix, _)| prefix.len())
                    .map(|(_, response)| response)
            })
            .or(state.default_response.as_ref())
            .cloned();
        let Some(response) = response else {
            bail!("connection refused: {}", url);
        };

        Ok(HttpResponse {
            status: response.status,
            content_length: Some(response.body.len() as u64),
            body: Box::new(Cursor::new(response.body)),
        })
    }
}

/// Mock tool lookup that only knows the tools it was given.
#[derive(Debug, Default)]
pub struct MockToolLocator {
    tools: Mutex<BTreeSet<String>>,
}

impl MockToolLocator {
    /// Create a locator that finds nothing.
    pub fn new() -> Self {
        MockToolLocator::default()
    }

    /// Create a locator that finds exactly `tools`.
    pub fn with_tools(tools: &[&str]) -> Self {
        let locator = MockToolLocator::new();
        for tool in tools {
            locator.add(tool);
        }
        locator
    }

    pub fn add(&self, tool: &str) -> &Self {
        let mut tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        tools.insert(tool.to_string());
        self
    }
}

impl ToolLocator for MockToolLocator {
    fn find(&self, name: &str) -> Option<PathBuf> {
        let tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        tools
            .contains(name)
            .then(|| PathBuf::from("/usr/bin").join(name))
    }
}

/// Assertion helpers for testing.
pub mod assertions {
    use crate::core::{ErrorCategory, InstallResult};

    /// Assert that a result is Ok and return the value.
    pub fn assert_ok<T, E: std::fmt::Debug>(result: Result<T, E>) -> T {
        match result {
            Ok(v) => v,
            Err(e) => panic!("expected Ok, got Err: {:?}", e),
        }
    }

    /// Assert that a result is Err and return the error.
    pub fn assert_err<T: std::fmt::Debug, E>(result: Result<T, E>) -> E {
        match result {
            Ok(v) => panic!("expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    }

    /// Assert that an install failed with the given category.
    pub fn assert_failed_with(result: &InstallResult, category: ErrorCategory) {
        assert!(!result.success, "expected failure, got {:?}", result);
        assert_eq!(
            result.error_category,
            Some(category),
            "unexpected error: {:?}",
            result.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_mock_executor_basic() {
        let exec = MockExecutor::new();

        exec.expect("git --version", MockProcessOutput::success("git version 2.43.0"));
        exec.expect_prefix("make", MockProcessOutput::success("make output"));

        let result = exec.output(&ProcessBuilder::new("git").arg("--version")).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, "git version 2.43.0");

        let result = exec.output(&ProcessBuilder::new("make").arg("-j4")).unwrap();
        assert!(result.success());
        assert_eq!(exec.calls(), vec!["git --version", "make -j4"]);
    }

    #[test]
    fn test_latest_expectation_wins() {
        let exec = MockExecutor::new();
        exec.expect("python3 --version", MockProcessOutput::success("Python 3.11.4"));
        exec.expect("python3 --version", MockProcessOutput::success("Python 3.8.10"));

        let result = exec
            .output(&ProcessBuilder::new("python3").arg("--version"))
            .unwrap();
        assert_eq!(result.stdout, "Python 3.8.10");
    }

    #[test]
    fn test_mock_executor_unexpected() {
        let exec = MockExecutor::new();
        assert!(exec.output(&ProcessBuilder::new("unknown")).is_err());
        assert_eq!(exec.call_count(), 1);
    }

    #[test]
    fn test_mock_executor_hooks_run_on_success_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        let marker = tmp.path().join("cloned");
        let exec = MockExecutor::succeeding();
        exec.expect("git clone bad", MockProcessOutput::failure(128, "not found"));
        let target = marker.clone();
        exec.on_prefix("git clone", move |_| std::fs::write(&target, "").unwrap());

        exec.output(&ProcessBuilder::new("git").args(["clone", "bad"]))
            .unwrap();
        assert!(!marker.exists());

        exec.output(&ProcessBuilder::new("git").args(["clone", "good"]))
            .unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn test_mock_executor_spawn() {
        let exec = MockExecutor::new();
        exec.expect_spawn_error("broken");

        assert_eq!(exec.spawn(&ProcessBuilder::new("server")).unwrap(), MOCK_PID);
        assert!(exec.spawn(&ProcessBuilder::new("broken")).is_err());
        assert_eq!(exec.spawned().len(), 1);
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn test_mock_http_client() {
        let client = MockHttpClient::new();
        client.mock_url("https://example.com/", MockHttpResponse::ok(b"any".to_vec()));
        client.mock_url(
            "https://example.com/ggml-tiny.bin",
            MockHttpResponse::ok(b"weights".to_vec()),
        );

        let mut body = String::new();
        let mut response = client.get("https://example.com/ggml-tiny.bin").unwrap();
        response.body.read_to_string(&mut body).unwrap();
        assert!(response.is_success());
        assert_eq!(body, "weights");

        assert_eq!(client.check("https://example.com/other").unwrap(), 200);
        assert!(client.get("https://elsewhere.org/").is_err());
        assert_eq!(client.requests().len(), 3);
    }

    #[test]
    fn test_mock_tool_locator() {
        let tools = MockToolLocator::with_tools(&["git"]);
        assert_eq!(tools.find("git"), Some(PathBuf::from("/usr/bin/git")));
        assert!(!tools.has("make"));
        tools.add("make");
        assert!(tools.has("make"));
    }

    #[test]
    fn test_assertions() {
        use assertions::*;

        let ok_result: Result<i32, &str> = Ok(42);
        assert_eq!(assert_ok(ok_result), 42);

        let err_result: Result<i32, &str> = Err("error");
        assert_eq!(assert_err(err_result), "error");
    }
}
