//! The provisioning pipeline.
//!
//! A run validates its two version parameters, then executes the eight
//! stages strictly in order:
//!
//! ```text
//! Validating ─► InstallDependencies ─► SetupEnvironment ─► ResolvePaths ─► FetchSource
//!                                                                              │
//!        Done ◄─ Package ◄─ Install ◄─ Build ◄─ Configure ◄────────────────────┘
//!
//! (every state) ──► Failed
//! ```
//!
//! The first failure ends the run. Nothing is retried.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::artifact::{partial_path, Artifact};
use crate::config::PipelineConfig;
use crate::context::{AbortHandle, PipelineCallback, SilentCallback, StageContext};
use crate::environment::BuildEnvironment;
use crate::error::{Error, Result};
use crate::matrix::BuildOptionMatrix;
use crate::paths::{remove_path, reset_dir, WorkDirs, INSTALL_DIR_NAME};
use crate::runner::{Invocation, ToolOutput, ToolRunner};
use crate::stage::{Failure, PipelineState, Stage};
use crate::status::StatusLog;
use crate::version::VersionSpec;

/// What a run would do, computed without side effects.
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub versions: VersionSpec,
    pub work_dir: PathBuf,
    pub artifact: PathBuf,
    pub source_url: String,
    pub jobs: usize,
    pub stages: Vec<&'static str>,
    pub options: BuildOptionMatrix,
}

/// Builds and packages ROOT for one pair of versions.
pub struct Pipeline<R: ToolRunner> {
    config: PipelineConfig,
    runner: R,
    matrix: BuildOptionMatrix,
    callback: Box<dyn PipelineCallback>,
    abort: AbortHandle,
}

impl<R: ToolRunner> Pipeline<R> {
    pub fn new(config: PipelineConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            matrix: BuildOptionMatrix::root_default(),
            callback: Box::new(SilentCallback),
            abort: AbortHandle::new(),
        }
    }

    /// Report progress to `callback`.
    pub fn with_callback(mut self, callback: impl PipelineCallback + 'static) -> Self {
        self.callback = Box::new(callback);
        self
    }

    /// Stop between stages once `abort` fires.
    ///
    /// Pass the same handle to [`crate::runner::SystemRunner`] to also kill
    /// the tool that is running at that moment.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn matrix(&self) -> &BuildOptionMatrix {
        &self.matrix
    }

    /// Validate the inputs and describe the run.
    pub fn plan(&self, runtime: &str, target: &str) -> Result<RunPlan> {
        let versions = VersionSpec::parse(runtime, target)?;
        let dirs = WorkDirs::new(&self.config.work_dir)?;

        Ok(RunPlan {
            artifact: dirs
                .artifacts_dir
                .join(self.config.artifact.file_name(&versions)),
            source_url: self.config.source_url_for(&versions.target),
            work_dir: dirs.root,
            jobs: self.config.jobs,
            stages: Stage::ALL.iter().map(|s| s.name()).collect(),
            options: self.matrix.clone(),
            versions,
        })
    }

    /// Run the whole pipeline.
    ///
    /// Both versions are validated before anything touches the host. On
    /// success exactly one archive exists at the returned path.
    pub fn run(&self, runtime: &str, target: &str) -> Result<Artifact> {
        let versions = VersionSpec::parse(runtime, target)?;
        let dirs = WorkDirs::new(&self.config.work_dir)?;

        dirs.create()?;
        let mut log = StatusLog::create(&dirs.log_file)?;
        log.line(format_args!(
            "ROOT {} for Python {} in {} ({} jobs)",
            versions.target,
            versions.runtime,
            dirs.root.display(),
            self.config.jobs
        ));

        let mut run = Run {
            pipeline: self,
            versions: &versions,
            dirs: &dirs,
            log,
        };
        run.execute()
    }
}

/// State of one run in progress.
struct Run<'a, R: ToolRunner> {
    pipeline: &'a Pipeline<R>,
    versions: &'a VersionSpec,
    dirs: &'a WorkDirs,
    log: StatusLog,
}

impl<'a, R: ToolRunner> Run<'a, R> {
    fn execute(&mut self) -> Result<Artifact> {
        self.stage(Stage::InstallDependencies, Self::install_dependencies)?;
        self.stage(Stage::SetupEnvironment, Self::setup_environment)?;
        let env = self.stage(Stage::ResolvePaths, Self::resolve_paths)?;
        self.stage(Stage::FetchSource, Self::fetch_source)?;
        self.stage(Stage::Configure, |run, ctx| run.configure(ctx, &env))?;
        self.stage(Stage::Build, Self::build)?;
        self.stage(Stage::Install, Self::install)?;
        let artifact = self.stage(Stage::Package, Self::package)?;

        self.log.transition(PipelineState::Done);
        self.log.line(format_args!("artifact: {}", artifact.path.display()));
        Ok(artifact)
    }

    /// Run one stage inside its own context.
    fn stage<T>(
        &mut self,
        stage: Stage,
        body: impl FnOnce(&mut Self, &mut StageContext) -> Result<T>,
    ) -> Result<T> {
        let pipeline = self.pipeline;
        let callback = &pipeline.callback;

        if let Err(e) = pipeline.abort.check() {
            let e = e.in_stage(stage);
            self.log.line(format_args!("error: {}", e));
            self.log.transition(PipelineState::Failed(Some(stage)));
            callback.on_stage_failed(stage, &e);
            return Err(e);
        }

        self.log.transition(PipelineState::Running(stage));
        callback.on_stage_started(stage);

        let started = Instant::now();
        let mut ctx = StageContext::new(stage);

        match body(self, &mut ctx) {
            Ok(value) => {
                ctx.commit();
                let elapsed = started.elapsed();
                self.log.line(format_args!(
                    "{} finished in {:.1}s",
                    stage,
                    elapsed.as_secs_f64()
                ));
                callback.on_stage_completed(stage, elapsed);
                Ok(value)
            }
            Err(e) => {
                let e = e.in_stage(stage);
                self.log.line(format_args!("error: {}", e));
                self.log.transition(PipelineState::Failed(Some(stage)));

                if pipeline.config.cleanup_on_failure {
                    self.log.line(format_args!("cleaning up after {}", stage));
                    ctx.rollback();
                } else {
                    ctx.commit();
                }

                callback.on_stage_failed(stage, &e);
                Err(e)
            }
        }
    }

    /// Log and run one external command. Its output goes to the status log.
    fn exec(&mut self, invocation: Invocation) -> Result<ToolOutput> {
        let pipeline = self.pipeline;
        let line = invocation.command_line();
        self.log.line(format_args!("$ {}", line));
        pipeline.callback.on_command(&line);

        let log = &mut self.log;
        pipeline
            .runner
            .run_with_output(&invocation, &mut |output: &str| log.output(output))
    }

    fn install_dependencies(&mut self, _ctx: &mut StageContext) -> Result<()> {
        let pipeline = self.pipeline;
        let config = &pipeline.config;
        let sudo = config.use_sudo;

        for source in &config.package_sources {
            self.exec(
                Invocation::new("add-apt-repository")
                    .args(["-y", source.as_str()])
                    .elevated(sudo),
            )?;
        }

        self.exec(apt_get().arg("update").elevated(sudo))?;
        self.exec(
            apt_get()
                .args(["install", "-y", "--no-install-recommends"])
                .args(config.packages_for(&self.versions.runtime))
                .elevated(sudo),
        )?;
        Ok(())
    }

    fn setup_environment(&mut self, ctx: &mut StageContext) -> Result<()> {
        let dirs = self.dirs;
        let venv = &dirs.venv_dir;
        remove_path(venv)?;
        cleanup_path(ctx, venv);

        self.exec(
            Invocation::new(self.versions.runtime.interpreter())
                .args(["-m", "venv"])
                .path_arg(venv),
        )?;

        let python = dirs.venv_python();
        self.exec(pip(&python).args(["install", "--upgrade", "pip"]))?;

        let pipeline = self.pipeline;
        let packages = &pipeline.config.python_packages;
        if !packages.is_empty() {
            self.exec(pip(&python).arg("install").args(packages.iter().cloned()))?;
        }
        Ok(())
    }

    fn resolve_paths(&mut self, _ctx: &mut StageContext) -> Result<BuildEnvironment> {
        let env = BuildEnvironment::resolve(&self.pipeline.runner, &self.dirs.venv_python())?;

        self.log.line(format_args!("interpreter: {}", env.interpreter.display()));
        self.log.line(format_args!("library: {}", env.library.display()));
        self.log.line(format_args!("include: {}", env.include_dir.display()));
        self.log.line(format_args!("numpy include: {}", env.numpy_include_dir.display()));
        Ok(env)
    }

    fn fetch_source(&mut self, ctx: &mut StageContext) -> Result<()> {
        let archive = self.dirs.source_archive(&self.versions.target);
        remove_path(&archive)?;
        cleanup_path(ctx, &archive);

        let url = self.pipeline.config.source_url_for(&self.versions.target);
        self.exec(
            Invocation::new("wget")
                .args(["-q", "-O"])
                .path_arg(&archive)
                .arg(url),
        )?;

        let dirs = self.dirs;
        let source_dir = &dirs.source_dir;
        reset_dir(source_dir)?;
        cleanup_path(ctx, source_dir);

        self.exec(
            Invocation::new("tar")
                .arg("-xzf")
                .path_arg(&archive)
                .arg("-C")
                .path_arg(source_dir)
                .arg("--strip-components=1"),
        )
        .map_err(|e| {
            if e.is_interruption() {
                e
            } else {
                e.in_stage_as(Stage::FetchSource, Failure::ExtractFailed)
            }
        })?;
        Ok(())
    }

    fn configure(&mut self, ctx: &mut StageContext, env: &BuildEnvironment) -> Result<()> {
        let dirs = self.dirs;
        reset_dir(&dirs.build_dir)?;
        reset_dir(&dirs.install_dir)?;
        cleanup_path(ctx, &dirs.build_dir);
        cleanup_path(ctx, &dirs.install_dir);

        self.exec(
            Invocation::new("cmake")
                .args(["-G", "Ninja", "-S"])
                .path_arg(&dirs.source_dir)
                .arg("-B")
                .path_arg(&dirs.build_dir)
                .arg(format!("-DCMAKE_INSTALL_PREFIX={}", dirs.install_dir.display()))
                .args(self.pipeline.matrix.cmake_args())
                .args(env.cmake_args()),
        )?;
        Ok(())
    }

    fn build(&mut self, _ctx: &mut StageContext) -> Result<()> {
        self.exec(
            Invocation::new("ninja")
                .arg("-C")
                .path_arg(&self.dirs.build_dir)
                .arg("-j")
                .arg(self.pipeline.config.jobs.to_string()),
        )?;
        Ok(())
    }

    fn install(&mut self, ctx: &mut StageContext) -> Result<()> {
        cleanup_path(ctx, &self.dirs.install_dir);
        self.exec(
            Invocation::new("ninja")
                .arg("-C")
                .path_arg(&self.dirs.build_dir)
                .arg("install"),
        )?;
        Ok(())
    }

    fn package(&mut self, ctx: &mut StageContext) -> Result<Artifact> {
        let pipeline = self.pipeline;
        let naming = &pipeline.config.artifact;
        let final_path = self
            .dirs
            .artifacts_dir
            .join(naming.file_name(self.versions));
        let partial = partial_path(&final_path);

        remove_path(&final_path)?;
        remove_path(&partial)?;
        cleanup_path(ctx, &partial);

        self.exec(
            naming
                .format
                .invocation(&self.dirs.root, INSTALL_DIR_NAME, &partial),
        )?;

        if !partial.is_file() {
            return Err(Error::MissingArchive(partial));
        }
        fs::rename(&partial, &final_path)?;

        Ok(Artifact {
            path: final_path,
            format: naming.format,
        })
    }
}

fn apt_get() -> Invocation {
    Invocation::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
}

fn pip(python: &Path) -> Invocation {
    Invocation::new(python.display().to_string()).args(["-m", "pip"])
}

/// Remove `path` if the stage is rolled back.
fn cleanup_path(ctx: &mut StageContext, path: &Path) {
    let path = path.to_path_buf();
    ctx.on_cleanup(move || {
        if let Err(e) = remove_path(&path) {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    });
}
