//! Run command implementation for the rootforge CLI.
//!
//! Drives the blocking pipeline on a worker thread while the async side
//! listens for Ctrl-C.

use std::time::{Duration, Instant};

use rootforge_core::{AbortHandle, Pipeline, PipelineConfig, SystemRunner};

use crate::colors;
use crate::progress::ProgressPrinter;

/// Build and package ROOT `target` for Python `runtime`.
pub async fn execute(
    config: PipelineConfig,
    runtime: String,
    target: String,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let abort = match timeout {
        Some(secs) => AbortHandle::new().with_timeout(Duration::from_secs(secs)),
        None => AbortHandle::new(),
    };

    println!(
        "\n{}rootforge{} - Building ROOT {}{}{} for Python {}{}{}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        target,
        colors::RESET,
        colors::CYAN,
        runtime,
        colors::RESET
    );
    println!(
        "{}Work dir:{} {}  {}Jobs:{} {}",
        colors::DIM,
        colors::RESET,
        config.work_dir.display(),
        colors::DIM,
        colors::RESET,
        config.jobs
    );

    let pipeline = Pipeline::new(config, SystemRunner::new(abort.clone()))
        .with_callback(ProgressPrinter)
        .with_abort_handle(abort.clone());

    let signal_abort = abort.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{}Interrupted, stopping the current stage...{}",
                colors::YELLOW,
                colors::RESET
            );
            signal_abort.abort();
        }
    });

    let result = tokio::task::spawn_blocking(move || pipeline.run(&runtime, &target)).await;
    signal_task.abort();

    let artifact = result??;

    println!();
    println!(
        "{}Artifact:{} {}",
        colors::GREEN,
        colors::RESET,
        artifact.path.display()
    );
    println!(
        "{}Time:{} {:.2}s",
        colors::DIM,
        colors::RESET,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
