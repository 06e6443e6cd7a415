//! Terminal progress output for pipeline runs.

use std::time::Duration;

use rootforge_core::{Error, PipelineCallback, Stage};

use crate::colors;

/// Prints one block per stage and echoes each command before it runs.
pub struct ProgressPrinter;

impl PipelineCallback for ProgressPrinter {
    fn on_stage_started(&self, stage: Stage) {
        println!(
            "\n{}  ◆ [{}/{}] {}{}",
            colors::BLUE,
            stage.position(),
            Stage::ALL.len(),
            stage.description(),
            colors::RESET
        );
    }

    fn on_stage_completed(&self, stage: Stage, elapsed: Duration) {
        println!(
            "{}  ✓ {}{} ({:.1}s)",
            colors::GREEN,
            stage,
            colors::RESET,
            elapsed.as_secs_f64()
        );
    }

    fn on_stage_failed(&self, stage: Stage, _error: &Error) {
        eprintln!("{}  ✗ {} failed{}", colors::RED, stage, colors::RESET);
    }

    fn on_command(&self, command_line: &str) {
        println!("{}    $ {}{}", colors::DIM, command_line, colors::RESET);
    }
}
