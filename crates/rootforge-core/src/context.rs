//! Run context and callbacks for the pipeline.
//!
//! Provides progress reporting, per-stage cleanup hooks, and cooperative
//! cancellation of a running pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::stage::Stage;

/// Handle for cancelling a pipeline run.
///
/// `AbortHandle` can be cloned and shared across threads; any clone can
/// trigger the abort and all clones observe it. An optional deadline turns
/// into a timeout once it passes.
///
/// # Example
///
/// ```
/// use rootforge_core::context::AbortHandle;
///
/// let handle = AbortHandle::new();
/// let handle_clone = handle.clone();
///
/// assert!(handle.check().is_ok());
/// handle_clone.abort();
/// assert!(handle.check().is_err());
/// ```
#[derive(Clone, Default)]
pub struct AbortHandle {
    /// Shared abort flag.
    aborted: Arc<AtomicBool>,
    /// Point in time after which the run counts as timed out.
    deadline: Option<Instant>,
}

impl AbortHandle {
    /// Create a new abort handle without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Request abort of the run.
    ///
    /// Running tools are killed the next time the runner polls them.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` after an abort, `Err(TimedOut)` past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.is_aborted() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(Error::TimedOut);
        }
        Ok(())
    }
}

/// Callback trait for pipeline progress reporting.
pub trait PipelineCallback: Send + Sync {
    /// Called when a stage starts.
    fn on_stage_started(&self, stage: Stage);

    /// Called when a stage completes successfully.
    fn on_stage_completed(&self, stage: Stage, elapsed: Duration);

    /// Called when a stage fails. No further stages run afterwards.
    fn on_stage_failed(&self, stage: Stage, error: &Error);

    /// Called before every external tool invocation.
    fn on_command(&self, _command_line: &str) {}
}

/// Callback that reports nothing.
pub struct SilentCallback;

impl PipelineCallback for SilentCallback {
    fn on_stage_started(&self, _stage: Stage) {}
    fn on_stage_completed(&self, _stage: Stage, _elapsed: Duration) {}
    fn on_stage_failed(&self, _stage: Stage, _error: &Error) {}
}

/// Context for one running stage.
///
/// Stages register cleanup handlers for the resources they create. The
/// handlers only run when the stage fails and cleanup was requested; a
/// committed stage drops them unrun.
pub struct StageContext {
    stage: Stage,
    /// Registered cleanup handlers
    cleanup_handlers: Vec<Box<dyn FnOnce() + Send>>,
}

impl StageContext {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            cleanup_handlers: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Register a handler that undoes part of this stage's work.
    ///
    /// Cleanup handlers are called in reverse order of registration.
    pub fn on_cleanup(&mut self, handler: impl FnOnce() + Send + 'static) {
        self.cleanup_handlers.push(Box::new(handler));
    }

    /// Forget the handlers; the stage's resources are kept.
    pub fn commit(mut self) {
        self.cleanup_handlers.clear();
    }

    /// Run all cleanup handlers.
    pub fn rollback(mut self) {
        while let Some(handler) = self.cleanup_handlers.pop() {
            // Catch panics to ensure all handlers run
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(handler));
            if let Err(e) = result {
                tracing::error!(
                    "Cleanup handler for stage {} panicked: {:?}",
                    self.stage,
                    e
                );
            }
        }
    }
}
