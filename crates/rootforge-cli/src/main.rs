//! rootforge CLI - build and package ROOT for a Python version.

mod colors;
mod plan;
mod progress;
mod run;

use std::path::PathBuf;

use clap::Parser;
use clap::error::ErrorKind;
use rootforge_core::{ArchiveFormat, PipelineConfig, VersionSpec};

#[derive(Parser)]
#[command(name = "rootforge")]
#[command(about = "Build ROOT against a Python version and package the install tree")]
#[command(version)]
struct Cli {
    /// Python version to build against, e.g. 3.11
    runtime_version: String,

    /// ROOT version to build, e.g. 6.32.04
    target_version: String,

    /// Parallel build jobs (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Directory to work in
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Archive format of the artifact (zip, tar.gz, tar.xz)
    #[arg(long)]
    format: Option<ArchiveFormat>,

    /// Remove the failing stage's working files before exiting
    #[arg(long)]
    cleanup_on_failure: bool,

    /// Abort the run after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print the run plan as JSON and exit without doing anything
    #[arg(long)]
    plan: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Defaults, config file and environment, then command-line flags.
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.config.as_deref())?;

        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(dir) = &self.work_dir {
            config.work_dir = dir.clone();
        }
        if let Some(format) = self.format {
            config.artifact.format = format;
        }
        if self.cleanup_on_failure {
            config.cleanup_on_failure = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Usage errors exit with 1 like every other failure
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format rootforge-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<rootforge_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    // Nothing below may run for malformed versions
    VersionSpec::parse(&cli.runtime_version, &cli.target_version)
        .map_err(|e| format_error(e.into()))?;

    let config = cli.pipeline_config().map_err(format_error)?;

    if cli.plan {
        plan::execute(config, &cli.runtime_version, &cli.target_version).map_err(format_error)?;
    } else {
        run::execute(config, cli.runtime_version, cli.target_version, cli.timeout)
            .await
            .map_err(format_error)?;
    }

    Ok(())
}
