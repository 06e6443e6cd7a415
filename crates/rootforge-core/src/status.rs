//! Human-readable status log of a run.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::error::Result;
use crate::stage::PipelineState;

/// Line-oriented log with elapsed-time stamps, mirrored to `tracing`.
///
/// Write failures are reported once through `tracing` and otherwise
/// ignored; a full disk must not turn a good build into a failed one.
pub struct StatusLog {
    out: Option<BufWriter<File>>,
    started: Instant,
    state: PipelineState,
}

impl StatusLog {
    /// Create (truncating) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: Some(BufWriter::new(file)),
            started: Instant::now(),
            state: PipelineState::Validating,
        })
    }

    /// A log that only forwards to `tracing`.
    pub fn detached() -> Self {
        Self {
            out: None,
            started: Instant::now(),
            state: PipelineState::Validating,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Append one line.
    pub fn line(&mut self, message: impl Display) {
        tracing::info!("{}", message);
        self.write(message);
    }

    /// Append one line of tool output.
    ///
    /// Not mirrored to `tracing`; the runner already echoes it.
    pub fn output(&mut self, line: &str) {
        self.write(format_args!("  | {}", line));
    }

    fn write(&mut self, message: impl Display) {
        let elapsed = self.started.elapsed().as_secs_f64();
        if let Some(out) = &mut self.out {
            let written = writeln!(out, "[{:>9.1}s] {}", elapsed, message).and_then(|_| out.flush());
            if let Err(e) = written {
                tracing::warn!("Status log disabled after write error: {}", e);
                self.out = None;
            }
        }
    }

    /// Record a state transition.
    ///
    /// Illegal transitions are logged and ignored.
    pub fn transition(&mut self, next: PipelineState) {
        if !self.state.can_advance_to(next) {
            tracing::error!("Ignoring illegal transition {} -> {}", self.state, next);
            return;
        }
        let current = self.state;
        self.line(format_args!("state: {} -> {}", current, next));
        self.state = next;
    }
}
