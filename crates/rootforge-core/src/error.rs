//! Error types for rootforge-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::stage::{Failure, Stage};

/// Result type for rootforge-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Input parameters have the wrong shape. Raised before any side effect.
    #[error("invalid {field} '{value}': expected {expected}")]
    Validation {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// An external tool could not be started.
    #[error("failed to start '{program}': {message}")]
    Spawn { program: String, message: String },

    /// An external tool exited with a non-zero status.
    #[error("'{program}' exited with {status}{}", format_tail(tail))]
    Tool {
        program: String,
        status: String,
        tail: Vec<String>,
    },

    /// A value could not be read back from the provisioned environment.
    #[error("could not resolve {query}: {message}")]
    EnvironmentQuery { query: &'static str, message: String },

    /// A stage failed; wraps the underlying cause.
    #[error("stage '{stage}' failed ({failure}): {source}")]
    Stage {
        stage: Stage,
        failure: Failure,
        #[source]
        source: Box<Error>,
    },

    /// The archiving tool succeeded but left no archive behind.
    #[error("archive {0} was not produced")]
    MissingArchive(PathBuf),

    /// The run was interrupted.
    #[error("run cancelled")]
    Cancelled,

    /// The run exceeded its deadline.
    #[error("run exceeded its time limit")]
    TimedOut,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed configuration file.
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_tail(tail: &[String]) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!("; last output:\n{}", tail.join("\n"))
    }
}

impl Error {
    /// Wrap this error as the failure of `stage`.
    pub fn in_stage(self, stage: Stage) -> Self {
        self.in_stage_as(stage, stage.failure())
    }

    /// Wrap this error as the failure of `stage` with an explicit code.
    pub fn in_stage_as(self, stage: Stage, failure: Failure) -> Self {
        match self {
            already @ Error::Stage { .. } => already,
            other => Error::Stage {
                stage,
                failure,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was raised in, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The failure code, if this error came out of a stage.
    pub fn failure(&self) -> Option<Failure> {
        match self {
            Error::Stage { failure, .. } => Some(*failure),
            _ => None,
        }
    }

    /// Innermost cause, skipping stage wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the run was stopped rather than a tool failing.
    pub fn is_interruption(&self) -> bool {
        matches!(self.root_cause(), Error::Cancelled | Error::TimedOut)
    }

    /// Whether this is an input validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Render the error with a recovery hint for the user.
    pub fn with_hint(&self) -> String {
        let hint = match self.root_cause() {
            Error::Validation { .. } => {
                Some("usage: rootforge <RUNTIME_VERSION> <TARGET_VERSION>, e.g. rootforge 3.11 6.32.04")
            }
            Error::Spawn { .. } => Some("check that the tool is installed and on PATH"),
            Error::EnvironmentQuery { .. } => {
                Some("the virtual environment may be broken; rerun to recreate it")
            }
            Error::Cancelled => Some("working directories were left in place; rerun to start over"),
            Error::TimedOut => Some("raise --timeout or lower the parallel job count"),
            Error::Tool { .. } => match self.stage() {
                Some(Stage::InstallDependencies) => Some("check package sources and sudo access"),
                Some(Stage::FetchSource) => Some("check that the target version exists upstream"),
                Some(Stage::Build) => Some("see the output above; lowering --jobs helps on memory-bound hosts"),
                _ => None,
            },
            _ => None,
        };

        match hint {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}
