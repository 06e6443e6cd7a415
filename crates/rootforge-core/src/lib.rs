//! Core of rootforge: builds ROOT for a given Python ABI and packages it.
//!
//! This crate provides:
//! - Version validation for the two run parameters
//! - The fixed build-option matrix
//! - External tool invocation with cancellation
//! - The eight-stage provisioning pipeline
//! - Artifact naming and atomic packaging

pub mod artifact;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod matrix;
pub mod paths;
pub mod pipeline;
pub mod runner;
pub mod stage;
pub mod status;
pub mod version;

pub use artifact::{ArchiveFormat, Artifact, ArtifactNaming};
pub use config::PipelineConfig;
pub use context::{AbortHandle, PipelineCallback, SilentCallback, StageContext};
pub use environment::BuildEnvironment;
pub use error::{Error, Result};
pub use matrix::{BuildOption, BuildOptionMatrix, Setting};
pub use paths::WorkDirs;
pub use pipeline::{Pipeline, RunPlan};
pub use runner::{Invocation, SystemRunner, ToolOutput, ToolRunner};
pub use stage::{Failure, PipelineState, Stage};
pub use status::StatusLog;
pub use version::{RuntimeVersion, TargetVersion, VersionSpec};
