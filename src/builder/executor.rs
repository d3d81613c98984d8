//! Build executor with progress reporting.

use std::time::{Duration, Instant};

use anyhow::anyhow;
use indicatif::{ProgressBar, ProgressStyle};

use crate::builder::plan::{BuildPlan, BuildStep, Expect, StepAction};
use crate::core::InstallError;
use crate::util::cancel::CancelToken;
use crate::util::fs::{ensure_dir, set_executable, write_string};
use crate::util::process::{CommandRunner, ToolLocator};

/// What happened to one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Ran,
    Skipped,
}

/// Counts of a finished plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub ran: usize,
    pub skipped: usize,
}

/// Runs a [`BuildPlan`] in order, stopping at the first failing step.
pub struct BuildExecutor<'a> {
    runner: &'a dyn CommandRunner,
    tools: &'a dyn ToolLocator,
    cancel: &'a CancelToken,
    show_progress: bool,
}

impl<'a> BuildExecutor<'a> {
    /// Create a new build executor.
    pub fn new(
        runner: &'a dyn CommandRunner,
        tools: &'a dyn ToolLocator,
        cancel: &'a CancelToken,
    ) -> Self {
        BuildExecutor {
            runner,
            tools,
            cancel,
            show_progress: false,
        }
    }

    /// Show a spinner per step.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Execute a build plan.
    pub fn execute(&self, plan: &BuildPlan) -> Result<ExecutionSummary, InstallError> {
        let start = Instant::now();
        let mut summary = ExecutionSummary::default();

        for (index, step) in plan.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(InstallError::cancelled(format!("build step `{}`", step.name)));
            }

            let pb = self.spinner(format!("[{}/{}] {}", index + 1, plan.len(), step.name));
            let outcome = self.run_step(step);
            pb.finish_and_clear();

            match outcome? {
                StepOutcome::Ran => summary.ran += 1,
                StepOutcome::Skipped => summary.skipped += 1,
            }
        }

        tracing::info!(
            backend = %plan.backend,
            ran = summary.ran,
            skipped = summary.skipped,
            "build finished in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        Ok(summary)
    }

    /// Run a single step, honoring its precondition and expectation.
    pub fn run_step(&self, step: &BuildStep) -> Result<StepOutcome, InstallError> {
        if !step.when.holds(self.tools) {
            tracing::debug!(step = %step.name, "skipped: precondition not met");
            return Ok(StepOutcome::Skipped);
        }
        tracing::info!(step = %step.name, "{}", step);

        match &step.action {
            StepAction::Run(cmd) => {
                let output = self.runner.output(cmd).map_err(|e| InstallError::CommandFailed {
                    command: cmd.display_command(),
                    code: None,
                    stderr: format!("{:#}", e),
                })?;
                if !output.success() {
                    return Err(InstallError::command_failed(cmd, &output));
                }
                if let Expect::Produces(path) = &step.expect {
                    if !path.exists() {
                        return Err(anyhow!(
                            "`{}` succeeded but did not create {}",
                            cmd.display_command(),
                            path.display()
                        )
                        .into());
                    }
                }
            }
            StepAction::MakeExecutable(path) => set_executable(path)?,
            StepAction::WriteScript { path, contents } => {
                write_string(path, contents)?;
                set_executable(path)?;
            }
            StepAction::CreateDir(path) => ensure_dir(path)?,
        }

        Ok(StepOutcome::Ran)
    }

    fn spinner(&self, msg: String) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::plan::Precondition;
    use crate::core::Backend;
    use crate::test_support::{MockExecutor, MockProcessOutput, MockToolLocator};
    use crate::util::process::ProcessBuilder;
    use tempfile::TempDir;

    fn plan(steps: Vec<BuildStep>) -> BuildPlan {
        BuildPlan {
            backend: Backend::Recognition,
            steps,
        }
    }

    #[test]
    fn test_stops_at_first_failure() {
        let tmp = TempDir::new().unwrap();
        let exec = MockExecutor::succeeding();
        exec.expect_prefix("make -j", MockProcessOutput::failure(2, "Build error"));
        let tools = MockToolLocator::new();
        let cancel = CancelToken::new();

        let plan = plan(vec![
            BuildStep::run("clean", tmp.path(), ProcessBuilder::new("make").arg("clean")),
            BuildStep::run("build", tmp.path(), ProcessBuilder::new("make").arg("-j4")),
            BuildStep::run("after", tmp.path(), ProcessBuilder::new("echo").arg("never")),
        ]);

        let err = BuildExecutor::new(&exec, &tools, &cancel)
            .execute(&plan)
            .unwrap_err();

        assert!(err.to_string().contains("Command failed"));
        assert!(err.to_string().contains("Build error"));
        assert_eq!(exec.call_count(), 2);
        exec.assert_not_called("echo never");
    }

    #[test]
    fn test_skips_steps_whose_precondition_fails() {
        let tmp = TempDir::new().unwrap();
        let exec = MockExecutor::new();
        let tools = MockToolLocator::with_tools(&["uv"]);
        let cancel = CancelToken::new();

        let plan = plan(vec![
            BuildStep::run("clone", tmp.path(), ProcessBuilder::new("git").arg("clone"))
                .when(Precondition::PathMissing(tmp.path().to_path_buf())),
            BuildStep::run("uv", tmp.path(), ProcessBuilder::new("sh"))
                .when(Precondition::ToolMissing("uv".into())),
        ]);

        let summary = BuildExecutor::new(&exec, &tools, &cancel)
            .execute(&plan)
            .unwrap();

        assert_eq!(summary, ExecutionSummary { ran: 0, skipped: 2 });
        assert_eq!(exec.call_count(), 0);
    }

    #[test]
    fn test_produces_expectation() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("checkout");
        let exec = MockExecutor::succeeding();
        let tools = MockToolLocator::new();
        let cancel = CancelToken::new();

        let step = BuildStep::run("clone", tmp.path(), ProcessBuilder::new("git").arg("clone"))
            .expect(Expect::Produces(target));

        let err = BuildExecutor::new(&exec, &tools, &cancel)
            .run_step(&step)
            .unwrap_err();
        assert!(matches!(err, InstallError::Internal(_)));
    }

    #[test]
    fn test_spawn_error_is_command_failed() {
        let tmp = TempDir::new().unwrap();
        let exec = MockExecutor::new();
        exec.expect_spawn_error("make");
        let tools = MockToolLocator::new();
        let cancel = CancelToken::new();

        let step = BuildStep::run("build", tmp.path(), ProcessBuilder::new("make"));
        let err = BuildExecutor::new(&exec, &tools, &cancel)
            .run_step(&step)
            .unwrap_err();
        assert!(matches!(err, InstallError::CommandFailed { code: None, .. }));
    }

    #[test]
    fn test_file_steps() {
        let tmp = TempDir::new().unwrap();
        let exec = MockExecutor::new();
        let tools = MockToolLocator::new();
        let cancel = CancelToken::new();
        let script = tmp.path().join("bin/start.sh");
        let models = tmp.path().join("models");

        let plan = plan(vec![
            BuildStep::write_script(&script, "#!/bin/sh\nexit 0\n".into()),
            BuildStep::create_dir(&models),
            BuildStep::make_executable(&tmp.path().join("absent")),
        ]);

        let summary = BuildExecutor::new(&exec, &tools, &cancel)
            .execute(&plan)
            .unwrap();

        assert_eq!(summary, ExecutionSummary { ran: 2, skipped: 1 });
        assert!(crate::util::fs::is_executable(&script));
        assert!(models.is_dir());
    }

    #[test]
    fn test_cancelled_before_first_step() {
        let tmp = TempDir::new().unwrap();
        let exec = MockExecutor::new();
        let tools = MockToolLocator::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let plan = plan(vec![BuildStep::run(
            "build",
            tmp.path(),
            ProcessBuilder::new("make"),
        )]);

        let err = BuildExecutor::new(&exec, &tools, &cancel)
            .execute(&plan)
            .unwrap_err();
        assert!(matches!(err, InstallError::Cancelled { .. }));
        assert_eq!(exec.call_count(), 0);
    }
}
