//! Build plan generation.
//!
//! A [`Recipe`] is everything needed to install one backend on one
//! platform: the ordered [`BuildPlan`], the assets to provision, an optional
//! smoke test, and how to run the installed service. [`recipe`] is the
//! dispatch table from (backend, platform) to a recipe; adding a platform or
//! backend means adding a row here rather than branching in the pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::{Acceleration, Backend, InstallRequest, OsKind, PlatformProfile, RequestKind};
use crate::sources::Asset;
use crate::util::process::{default_jobs, ProcessBuilder, ToolLocator};

/// Script that bootstraps the uv package manager.
pub const UV_INSTALL_SCRIPT: &str = "curl -LsSf https://astral.sh/uv/install.sh | sh";

/// Recognition launcher written into the install directory.
pub const RECOGNITION_START_SCRIPT: &str = "start-whisper-server.sh";

/// Sample clip used by the recognition smoke test.
pub const RECOGNITION_SAMPLE: &str = "samples/jfk.wav";

/// Written into the install directory once the build and its assets are complete.
pub const INSTALL_STAMP: &str = ".voicekit-installed";

/// When a step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Always,
    /// Only if the path does not exist yet.
    PathMissing(PathBuf),
    /// Only if the path exists.
    PathExists(PathBuf),
    /// Only if the tool cannot be found on `PATH`.
    ToolMissing(String),
}

impl Precondition {
    pub fn holds(&self, tools: &dyn ToolLocator) -> bool {
        match self {
            Precondition::Always => true,
            Precondition::PathMissing(path) => !path.exists(),
            Precondition::PathExists(path) => path.exists(),
            Precondition::ToolMissing(tool) => !tools.has(tool),
        }
    }
}

/// What a successful step looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    /// The command exits with status 0.
    ExitZero,
    /// The command exits with status 0 and leaves this path behind.
    Produces(PathBuf),
}

/// The effect of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Run(ProcessBuilder),
    MakeExecutable(PathBuf),
    WriteScript { path: PathBuf, contents: String },
    CreateDir(PathBuf),
}

/// One build step, with an explicit working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub name: String,
    pub cwd: PathBuf,
    pub action: StepAction,
    pub when: Precondition,
    pub expect: Expect,
}

impl BuildStep {
    /// A command step. The command runs in `cwd`.
    pub fn run(name: impl Into<String>, cwd: &Path, cmd: ProcessBuilder) -> Self {
        BuildStep {
            name: name.into(),
            cwd: cwd.to_path_buf(),
            action: StepAction::Run(cmd.cwd(cwd)),
            when: Precondition::Always,
            expect: Expect::ExitZero,
        }
    }

    fn file(name: impl Into<String>, path: &Path, action: StepAction) -> Self {
        BuildStep {
            name: name.into(),
            cwd: path.parent().unwrap_or(path).to_path_buf(),
            action,
            when: Precondition::Always,
            expect: Expect::ExitZero,
        }
    }

    pub fn make_executable(path: &Path) -> Self {
        BuildStep::file("chmod", path, StepAction::MakeExecutable(path.to_path_buf()))
            .when(Precondition::PathExists(path.to_path_buf()))
    }

    pub fn write_script(path: &Path, contents: String) -> Self {
        BuildStep::file(
            "write launcher",
            path,
            StepAction::WriteScript {
                path: path.to_path_buf(),
                contents,
            },
        )
    }

    pub fn create_dir(path: &Path) -> Self {
        BuildStep::file("create directory", path, StepAction::CreateDir(path.to_path_buf()))
    }

    pub fn when(mut self, when: Precondition) -> Self {
        self.when = when;
        self
    }

    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }

    /// The command, if this step runs one.
    pub fn command(&self) -> Option<&ProcessBuilder> {
        match &self.action {
            StepAction::Run(cmd) => Some(cmd),
            _ => None,
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            StepAction::Run(cmd) => write!(f, "{}", cmd.display_command())?,
            StepAction::MakeExecutable(path) => write!(f, "chmod +x {}", path.display())?,
            StepAction::WriteScript { path, .. } => write!(f, "write {}", path.display())?,
            StepAction::CreateDir(path) => write!(f, "mkdir -p {}", path.display())?,
        }
        match &self.when {
            Precondition::Always => Ok(()),
            Precondition::PathMissing(path) => write!(f, "  [if {} is missing]", path.display()),
            Precondition::PathExists(path) => write!(f, "  [if {} exists]", path.display()),
            Precondition::ToolMissing(tool) => write!(f, "  [if `{}` is not installed]", tool),
        }
    }
}

/// Ordered steps for one backend on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub backend: Backend,
    pub steps: Vec<BuildStep>,
}

impl BuildPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// How the installed service is kept running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStrategy {
    /// Register a per-port systemd user unit.
    Supervisor,
    /// Spawn the launcher as a background process.
    Direct,
}

impl ServiceStrategy {
    pub fn for_os(os: OsKind) -> Self {
        match os {
            OsKind::Linux => ServiceStrategy::Supervisor,
            OsKind::MacOs | OsKind::Other => ServiceStrategy::Direct,
        }
    }
}

/// Everything the service manager needs to start a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub backend: Backend,
    pub strategy: ServiceStrategy,
    pub port: u16,
    pub working_dir: PathBuf,
    pub launcher: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl ServiceSpec {
    /// Deterministic unit name, e.g. `kokoro-fastapi-8880.service`.
    pub fn unit_name(&self) -> String {
        format!("{}-{}.service", self.backend.unit_prefix(), self.port)
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.url())
    }
}

/// A complete install recipe for one backend on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub plan: BuildPlan,
    pub assets: Vec<Asset>,
    /// Advisory smoke test run after assets are in place.
    pub verify: Option<BuildStep>,
    pub service: ServiceSpec,
}

/// Files that must all exist for an existing install to satisfy `req`.
///
/// The stamp is written only after assets are provisioned. Recognition also
/// needs the binary and the requested model, which can differ between runs.
pub fn install_markers(req: &InstallRequest) -> Vec<PathBuf> {
    let dir = &req.install_dir;
    let mut markers = vec![dir.join(INSTALL_STAMP)];
    if req.backend() == Backend::Recognition {
        markers.push(dir.join("main"));
        markers.extend(req.model_path());
    }
    markers
}

/// Launcher Kokoro-FastAPI ships for this platform.
pub fn synthesis_start_script(profile: &PlatformProfile) -> &'static str {
    match (profile.os, profile.acceleration) {
        (OsKind::MacOs, _) => "start-gpu_mac.sh",
        (OsKind::Linux, Acceleration::Cuda) => "start-gpu.sh",
        _ => "start-cpu.sh",
    }
}

/// Look up the recipe for a request on a platform.
pub fn recipe(req: &InstallRequest, profile: &PlatformProfile) -> Recipe {
    match &req.kind {
        RequestKind::Recognition {
            model,
            model_base_url,
        } => {
            let model_path = req.install_dir.join("models").join(model.file_name());
            Recipe {
                plan: recognition_plan(req, profile, &model_path),
                assets: vec![Asset::new(
                    format!("{}/{}", model_base_url.trim_end_matches('/'), model.file_name()),
                    model_path.clone(),
                )],
                verify: Some(recognition_smoke_test(&req.install_dir, &model_path)),
                service: service_spec(req, profile, req.install_dir.join(RECOGNITION_START_SCRIPT)),
            }
        }
        RequestKind::Synthesis {
            install_models,
            models_dir,
            start_script_base_url,
        } => {
            let script = synthesis_start_script(profile);
            let launcher = req.install_dir.join(script);
            let assets = if *install_models {
                vec![Asset::new(
                    format!("{}/{}", start_script_base_url.trim_end_matches('/'), script),
                    launcher.clone(),
                )
                .executable()]
            } else {
                Vec::new()
            };
            let mut service = service_spec(req, profile, launcher.clone());
            service
                .env
                .insert("MODEL_DIR".to_string(), models_dir.display().to_string());
            Recipe {
                plan: synthesis_plan(req, *install_models, models_dir, &launcher),
                assets,
                verify: None,
                service,
            }
        }
    }
}

fn recognition_plan(req: &InstallRequest, profile: &PlatformProfile, model_path: &Path) -> BuildPlan {
    let dir = &req.install_dir;
    let mut make = ProcessBuilder::new("make").arg(format!("-j{}", default_jobs()));
    match profile.acceleration {
        Acceleration::Metal => make = make.arg("GGML_METAL=1"),
        Acceleration::Cuda => make = make.arg("GGML_CUDA=1"),
        Acceleration::None => {}
    }

    BuildPlan {
        backend: Backend::Recognition,
        steps: vec![
            clone_step(&req.repo_url, dir),
            BuildStep::run("clean", dir, ProcessBuilder::new("make").arg("clean")),
            BuildStep::run("build", dir, make),
            BuildStep::make_executable(&dir.join("main")),
            BuildStep::write_script(
                &dir.join(RECOGNITION_START_SCRIPT),
                recognition_launcher(model_path, req.port),
            ),
        ],
    }
}

fn synthesis_plan(
    req: &InstallRequest,
    install_models: bool,
    models_dir: &Path,
    launcher: &Path,
) -> BuildPlan {
    let dir = &req.install_dir;
    let mut steps = vec![
        clone_step(&req.repo_url, dir),
        BuildStep::run(
            "bootstrap uv",
            dir,
            ProcessBuilder::new("sh").args(["-c", UV_INSTALL_SCRIPT]),
        )
        .when(Precondition::ToolMissing("uv".to_string())),
    ];
    if install_models {
        steps.push(BuildStep::create_dir(models_dir));
    }
    steps.push(BuildStep::make_executable(launcher));

    BuildPlan {
        backend: Backend::Synthesis,
        steps,
    }
}

fn clone_step(repo_url: &str, dir: &Path) -> BuildStep {
    let parent = dir.parent().unwrap_or(dir);
    BuildStep::run(
        "clone",
        parent,
        ProcessBuilder::new("git").arg("clone").arg(repo_url).arg(dir),
    )
    .when(Precondition::PathMissing(dir.to_path_buf()))
    .expect(Expect::Produces(dir.to_path_buf()))
}

fn recognition_smoke_test(dir: &Path, model_path: &Path) -> BuildStep {
    BuildStep::run(
        "smoke test",
        dir,
        ProcessBuilder::new(dir.join("main"))
            .arg("-m")
            .arg(model_path)
            .args(["-f", RECOGNITION_SAMPLE, "-np"]),
    )
    .when(Precondition::PathExists(dir.join(RECOGNITION_SAMPLE)))
}

fn recognition_launcher(model_path: &Path, port: u16) -> String {
    format!(
        "#!/bin/sh\n\
         # Generated by voicekit.\n\
         cd \"$(dirname \"$0\")\" || exit 1\n\
         exec ./server --host 127.0.0.1 --port \"${{PORT:-{}}}\" -m \"{}\"\n",
        port,
        model_path.display()
    )
}

fn service_spec(req: &InstallRequest, profile: &PlatformProfile, launcher: PathBuf) -> ServiceSpec {
    let mut env = BTreeMap::new();
    env.insert("PORT".to_string(), req.port.to_string());
    ServiceSpec {
        backend: req.backend(),
        strategy: ServiceStrategy::for_os(profile.os),
        port: req.port,
        working_dir: req.install_dir.clone(),
        launcher,
        env,
    }
}
