//! Install orchestration.
//!
//! An install runs a fixed sequence of stages over one resolved
//! [`InstallRequest`]. Every stage has the same shape: it reads the
//! pipeline, records what it learned in [`Progress`], and either continues,
//! short-circuits to assembly, or fails with a typed [`InstallError`]. The
//! cancellation token is checked between stages.
//!
//! Only [`assemble`] marks a result successful.

use std::sync::Arc;

use anyhow::anyhow;

use crate::builder::{recipe, BuildExecutor, Recipe};
use crate::core::{
    InstallError, InstallRequest, InstallResult, OsKind, PlatformProfile, RecognitionOptions,
    SynthesisOptions,
};
use crate::ops::doctor::verify_prerequisites;
use crate::ops::guard::{self, GuardDecision};
use crate::ops::service::ServiceManager;
use crate::sources::{AssetProvisioner, HttpClient, Provisioned, ReqwestClient};
use crate::util::cancel::CancelToken;
use crate::util::config::Config;
use crate::util::context::GlobalContext;
use crate::util::process::{CommandRunner, PathLocator, SystemRunner, ToolLocator};

/// Collaborators and settings shared by every install.
pub struct InstallContext {
    runner: Arc<dyn CommandRunner>,
    tools: Arc<dyn ToolLocator>,
    http: Arc<dyn HttpClient>,
    os: OsKind,
    gctx: GlobalContext,
    config: Config,
    cancel: CancelToken,
    show_progress: bool,
}

impl InstallContext {
    /// Assemble a context from explicit collaborators.
    pub fn new(
        gctx: GlobalContext,
        config: Config,
        runner: Arc<dyn CommandRunner>,
        tools: Arc<dyn ToolLocator>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        InstallContext {
            runner,
            tools,
            http,
            os: OsKind::host(),
            gctx,
            config,
            cancel: CancelToken::new(),
            show_progress: false,
        }
    }

    /// A context wired to the real host: `std::process`, `PATH`, reqwest.
    pub fn system(gctx: GlobalContext, config: Config) -> anyhow::Result<Self> {
        let http = ReqwestClient::new(config.net_timeout())?;
        Ok(InstallContext::new(
            gctx,
            config,
            Arc::new(SystemRunner),
            Arc::new(PathLocator),
            Arc::new(http),
        ))
    }

    /// Pretend to run on `os`.
    pub fn with_os(mut self, os: OsKind) -> Self {
        self.os = os;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Render spinners and download bars on stderr.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn os(&self) -> OsKind {
        self.os
    }

    pub fn gctx(&self) -> &GlobalContext {
        &self.gctx
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn tools(&self) -> &dyn ToolLocator {
        self.tools.as_ref()
    }

    /// Resolve whisper.cpp options against this context's configuration.
    pub fn recognition_request(&self, opts: RecognitionOptions) -> InstallRequest {
        InstallRequest::recognition(opts, &self.config, &self.gctx)
    }

    /// Resolve Kokoro-FastAPI options against this context's configuration.
    pub fn synthesis_request(&self, opts: SynthesisOptions) -> InstallRequest {
        InstallRequest::synthesis(opts, &self.config, &self.gctx)
    }
}

/// Install whisper.cpp.
pub fn install_recognition(ctx: &InstallContext, opts: RecognitionOptions) -> InstallResult {
    install(ctx, ctx.recognition_request(opts))
}

/// Install Kokoro-FastAPI.
pub fn install_synthesis(ctx: &InstallContext, opts: SynthesisOptions) -> InstallResult {
    install(ctx, ctx.synthesis_request(opts))
}

/// Run the full pipeline for a resolved request.
///
/// Never fails: every error is folded into the returned result.
pub fn install(ctx: &InstallContext, req: InstallRequest) -> InstallResult {
    let backend = req.backend();
    tracing::info!(backend = %backend, dir = %req.install_dir.display(), "installing");

    let pipeline = Pipeline { ctx, req };
    let mut progress = Progress::new(&pipeline.req);

    match pipeline.drive(&mut progress) {
        Ok(()) => assemble(&pipeline.req, progress),
        Err(err) => {
            tracing::error!(backend = %backend, "{}", err);
            progress.result.fail(&err);
            progress.result
        }
    }
}

/// Detect the platform and look up the recipe without running anything.
pub fn plan(ctx: &InstallContext, req: &InstallRequest) -> (PlatformProfile, Recipe) {
    let profile = PlatformProfile::detect(ctx.os, ctx.runner(), ctx.tools());
    let recipe = recipe(req, &profile);
    (profile, recipe)
}

/// Whether the pipeline keeps going after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Skip the remaining stages and assemble what we have.
    ShortCircuit,
}

type Stage = fn(&Pipeline<'_>, &mut Progress) -> Result<Flow, InstallError>;

const STAGES: &[(&str, Stage)] = &[
    ("guard", guard_stage),
    ("prerequisite check", prereq_stage),
    ("purge", purge_stage),
    ("platform detection", detect_stage),
    ("build", build_stage),
    ("asset provisioning", provision_stage),
    ("install record", record_stage),
    ("verification", verify_stage),
    ("service start", service_stage),
];

struct Pipeline<'a> {
    ctx: &'a InstallContext,
    req: InstallRequest,
}

/// Partial contributions collected by the stages.
struct Progress {
    result: InstallResult,
    recipe: Option<Recipe>,
}

impl Progress {
    fn new(req: &InstallRequest) -> Self {
        let mut result = InstallResult::new(req.backend(), req.install_dir());
        result.model_path = req.model_path();
        Progress {
            result,
            recipe: None,
        }
    }

    fn recipe(&self) -> Result<&Recipe, InstallError> {
        self.recipe
            .as_ref()
            .ok_or_else(|| anyhow!("platform was not detected before it was needed").into())
    }
}

impl Pipeline<'_> {
    fn drive(&self, progress: &mut Progress) -> Result<(), InstallError> {
        for (name, stage) in STAGES {
            if self.ctx.cancel.is_cancelled() {
                return Err(InstallError::cancelled(name));
            }
            let _span = tracing::info_span!("stage", stage = *name).entered();
            tracing::debug!("entering");
            if stage(self, progress)? == Flow::ShortCircuit {
                break;
            }
        }
        Ok(())
    }

    fn executor(&self) -> BuildExecutor<'_> {
        BuildExecutor::new(self.ctx.runner(), self.ctx.tools(), &self.ctx.cancel)
            .show_progress(self.ctx.show_progress)
    }
}

fn guard_stage(p: &Pipeline<'_>, progress: &mut Progress) -> Result<Flow, InstallError> {
    match guard::check(&p.req) {
        GuardDecision::AlreadyInstalled { .. } => {
            progress.result.already_installed = true;
            Ok(Flow::ShortCircuit)
        }
        GuardDecision::Proceed => Ok(Flow::Continue),
    }
}

fn prereq_stage(p: &Pipeline<'_>, _: &mut Progress) -> Result<Flow, InstallError> {
    verify_prerequisites(p.req.backend(), p.ctx.os, p.ctx.runner(), p.ctx.tools())?;
    Ok(Flow::Continue)
}

fn purge_stage(p: &Pipeline<'_>, _: &mut Progress) -> Result<Flow, InstallError> {
    if p.req.force_reinstall {
        guard::purge(p.req.install_dir())?;
    }
    Ok(Flow::Continue)
}

fn detect_stage(p: &Pipeline<'_>, progress: &mut Progress) -> Result<Flow, InstallError> {
    let (profile, recipe) = plan(p.ctx, &p.req);
    progress.result.gpu_enabled = profile.gpu_enabled();
    progress.result.gpu_type = profile.acceleration.gpu_type().map(str::to_string);
    progress.recipe = Some(recipe);
    Ok(Flow::Continue)
}

fn build_stage(p: &Pipeline<'_>, progress: &mut Progress) -> Result<Flow, InstallError> {
    p.executor().execute(&progress.recipe()?.plan)?;
    Ok(Flow::Continue)
}

fn provision_stage(p: &Pipeline<'_>, progress: &mut Progress) -> Result<Flow, InstallError> {
    let provisioner = AssetProvisioner::new(p.ctx.http.as_ref(), &p.ctx.cancel)
        .show_progress(p.ctx.show_progress);
    for asset in &progress.recipe()?.assets {
        if let Provisioned::Downloaded { bytes } = provisioner.provision(asset)? {
            tracing::debug!(bytes, "fetched {}", asset.url);
        }
    }
    Ok(Flow::Continue)
}

fn record_stage(p: &Pipeline<'_>, _: &mut Progress) -> Result<Flow, InstallError> {
    let stamp = guard::record(&p.req)?;
    tracing::debug!(stamp = %stamp.display(), "install recorded");
    Ok(Flow::Continue)
}

fn verify_stage(p: &Pipeline<'_>, progress: &mut Progress) -> Result<Flow, InstallError> {
    let Some(step) = progress.recipe()?.verify.clone() else {
        return Ok(Flow::Continue);
    };
    match p.executor().run_step(&step) {
        Ok(_) => {}
        Err(err @ InstallError::Cancelled { .. }) => return Err(err),
        Err(err) => {
            tracing::warn!("smoke test failed: {}", err);
            progress.result.warnings.push(format!("Smoke test failed: {}", err));
        }
    }
    Ok(Flow::Continue)
}

fn service_stage(p: &Pipeline<'_>, progress: &mut Progress) -> Result<Flow, InstallError> {
    if !p.req.auto_start {
        return Ok(Flow::Continue);
    }
    let outcome = ServiceManager::new(
        p.ctx.runner(),
        p.ctx.http.as_ref(),
        &p.ctx.cancel,
        p.ctx.gctx.unit_dir(),
    )
    .readiness(
        p.ctx.config.readiness_attempts(),
        p.ctx.config.readiness_interval(),
    )
    .start(&progress.recipe()?.service)?;

    let result = &mut progress.result;
    result.service_status = outcome.status;
    result.service_pid = outcome.pid;
    result.systemd_service = outcome.unit_file;
    result.systemd_enabled = outcome.enabled;
    result.service_ready = Some(outcome.ready);
    result.service_url = outcome.url;
    result.warnings.extend(outcome.warnings);
    Ok(Flow::Continue)
}

/// Merge the stage contributions into the final, successful result.
fn assemble(req: &InstallRequest, progress: Progress) -> InstallResult {
    let mut result = progress.result;
    if !result.install_path.exists() {
        result.fail(&InstallError::Internal(anyhow!(
            "install finished but {} does not exist",
            result.install_path.display()
        )));
        return result;
    }

    result.success = true;
    result.message = if result.already_installed {
        format!(
            "{} is already installed at {}",
            result.backend,
            result.install_path.display()
        )
    } else {
        match &result.service_url {
            Some(url) => format!(
                "{} installed at {} and serving on {}",
                result.backend,
                result.install_path.display(),
                url
            ),
            None => format!(
                "{} installed at {}",
                result.backend,
                result.install_path.display()
            ),
        }
    };
    tracing::info!(backend = %req.backend(), "{}", result.message);
    result
}
