//! Pipeline configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional JSON file, `ROOTFORGE_*` environment variables, and whatever the
//! caller sets afterwards (the CLI applies its flags last).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactNaming;
use crate::error::{Error, Result};
use crate::version::{RuntimeVersion, TargetVersion};

/// Default upstream location of ROOT source releases.
pub const DEFAULT_SOURCE_URL: &str = "https://root.cern/download/root_v{version}.source.tar.gz";

/// System packages installed for every build.
const BASE_PACKAGES: &[&str] = &[
    "dpkg-dev",
    "cmake",
    "ninja-build",
    "g++",
    "gcc",
    "binutils",
    "gfortran",
    "wget",
    "zip",
    "libx11-dev",
    "libxpm-dev",
    "libxft-dev",
    "libxext-dev",
    "libssl-dev",
    "libxml2-dev",
    "libgsl-dev",
    "libpcre3-dev",
    "libfftw3-dev",
    "libdavix-dev",
    "libpythia8-dev",
    "libtbb-dev",
    "libzstd-dev",
    "liblz4-dev",
    "libxxhash-dev",
    "nlohmann-json3-dev",
    "uuid-dev",
];

/// Configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory all work happens in.
    pub work_dir: PathBuf,

    /// Parallel build workers for the compilation stage.
    pub jobs: usize,

    /// Prefix privileged commands with `sudo`.
    pub use_sudo: bool,

    /// Extra package sources registered before installing.
    pub package_sources: Vec<String>,

    /// System packages installed in addition to the interpreter packages.
    pub packages: Vec<String>,

    /// Python packages installed into the virtual environment.
    pub python_packages: Vec<String>,

    /// Source URL template; `{version}` is replaced by the target version.
    pub source_url: String,

    /// Artifact naming and archive format.
    pub artifact: ArtifactNaming,

    /// Undo the failing stage's work before reporting the failure.
    pub cleanup_on_failure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            jobs: default_jobs(),
            use_sudo: true,
            package_sources: vec!["ppa:deadsnakes/ppa".to_string()],
            packages: BASE_PACKAGES.iter().map(|p| p.to_string()).collect(),
            python_packages: vec!["numpy".to_string()],
            source_url: DEFAULT_SOURCE_URL.to_string(),
            artifact: ArtifactNaming::default(),
            cleanup_on_failure: false,
        }
    }
}

/// Number of processing units available to this process.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults or `path`, then environment overrides.
    ///
    /// Not validated: callers layer their own settings on top and call
    /// [`PipelineConfig::validate`] once they are done.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `ROOTFORGE_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(jobs) = lookup("ROOTFORGE_JOBS") {
            self.jobs = jobs.trim().parse().map_err(|_| {
                Error::Config(format!("ROOTFORGE_JOBS must be a positive integer, got '{}'", jobs))
            })?;
        }
        if let Some(dir) = lookup("ROOTFORGE_WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("ROOTFORGE_SOURCE_URL") {
            self.source_url = url;
        }
        if let Some(sudo) = lookup("ROOTFORGE_SUDO") {
            self.use_sudo = parse_switch(&sudo).ok_or_else(|| {
                Error::Config(format!(
                    "ROOTFORGE_SUDO must be one of 1/0, true/false, yes/no, on/off, got '{}'",
                    sudo
                ))
            })?;
        }
        Ok(())
    }

    /// Reject settings no run can succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(Error::Config("jobs must be at least 1".to_string()));
        }
        if !self.source_url.contains("{version}") {
            return Err(Error::Config(format!(
                "source_url '{}' has no {{version}} placeholder",
                self.source_url
            )));
        }
        if self.artifact.product.is_empty() {
            return Err(Error::Config("artifact product name is empty".to_string()));
        }
        Ok(())
    }

    /// Download URL of the sources for `target`.
    pub fn source_url_for(&self, target: &TargetVersion) -> String {
        self.source_url.replace("{version}", target.as_str())
    }

    /// Full package list for a runtime version, interpreter packages last.
    pub fn packages_for(&self, runtime: &RuntimeVersion) -> Vec<String> {
        let python = runtime.interpreter();
        let mut packages = self.packages.clone();
        packages.push(python.clone());
        packages.push(format!("{}-dev", python));
        packages.push(format!("{}-venv", python));
        packages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.jobs >= 1);
        assert!(config.use_sudo);
        assert!(!config.cleanup_on_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rootforge.json");
        fs::write(&path, r#"{ "jobs": 3, "artifact": { "format": "tar.gz" } }"#).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.jobs, 3);
        assert_eq!(config.artifact.format.extension(), "tar.gz");
        assert_eq!(config.artifact.product, "root");
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn test_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rootforge.json");
        fs::write(&path, "{ jobs: ").unwrap();

        let err = PipelineConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("ROOTFORGE_JOBS", "6"), ("ROOTFORGE_SUDO", "0")]
            .into_iter()
            .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.jobs, 6);
        assert!(!config.use_sudo);

        let err = config.apply_env(|key| (key == "ROOTFORGE_JOBS").then(|| "many".to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn test_env_sudo_switch() {
        let mut config = PipelineConfig::default();
        for (value, expected) in [("TRUE", true), ("off", false), (" Yes ", true), ("0", false)] {
            config
                .apply_env(|key| (key == "ROOTFORGE_SUDO").then(|| value.to_string()))
                .unwrap();
            assert_eq!(config.use_sudo, expected, "{value:?}");
        }

        config.use_sudo = true;
        for value in ["y", "enabled", ""] {
            let err = config
                .apply_env(|key| (key == "ROOTFORGE_SUDO").then(|| value.to_string()))
                .unwrap_err();
            assert!(err.to_string().contains("ROOTFORGE_SUDO"), "{value:?}");
            assert!(config.use_sudo, "rejected value must not change the setting");
        }
    }

    #[test]
    fn test_env_invalid_jobs_left_to_later_layers() {
        let mut config = PipelineConfig::default();
        config
            .apply_env(|key| (key == "ROOTFORGE_JOBS").then(|| "0".to_string()))
            .unwrap();
        assert!(config.validate().is_err());

        // A later layer can still repair it
        config.jobs = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let config = PipelineConfig {
            jobs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            source_url: "https://example.org/root.tar.gz".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_values() {
        let config = PipelineConfig::default();
        let target = "6.32.04".parse().unwrap();
        assert_eq!(
            config.source_url_for(&target),
            "https://root.cern/download/root_v6.32.04.source.tar.gz"
        );

        let runtime = "3.11".parse().unwrap();
        let packages = config.packages_for(&runtime);
        assert!(packages.ends_with(&[
            "python3.11".to_string(),
            "python3.11-dev".to_string(),
            "python3.11-venv".to_string(),
        ]));
    }
}
