//! Plan output: what a run would do, as JSON.

use rootforge_core::{Pipeline, PipelineConfig, SystemRunner};

/// Print the run plan without touching the host.
pub fn execute(config: PipelineConfig, runtime: &str, target: &str) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config, SystemRunner::default());
    let plan = pipeline.plan(runtime, target)?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
