//! Working directory layout.
//!
//! Every run works below a single root directory:
//!
//! ```text
//! <work>/
//! ├── venv/                          # Python environment for the run
//! ├── root_v<target>.source.tar.gz   # Downloaded source archive
//! ├── root_src/                      # Extracted sources
//! ├── root_build/                    # CMake/Ninja build tree
//! ├── root_install/                  # Install prefix, packaged at the end
//! ├── artifacts/                     # Final archive
//! └── rootforge.log                  # Status log of the last run
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::version::TargetVersion;

/// Name of the install directory, as it appears inside the archive.
pub const INSTALL_DIR_NAME: &str = "root_install";

/// Directory structure of one pipeline run.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    /// The work root itself (absolute).
    pub root: PathBuf,

    /// Virtual Python environment.
    pub venv_dir: PathBuf,

    /// Extracted source tree.
    pub source_dir: PathBuf,

    /// Out-of-source build tree.
    pub build_dir: PathBuf,

    /// Install prefix.
    pub install_dir: PathBuf,

    /// Output directory for the archive.
    pub artifacts_dir: PathBuf,

    /// Human-readable status log.
    pub log_file: PathBuf,
}

impl WorkDirs {
    /// Compute the layout below `root`. Nothing is created.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = std::path::absolute(root.as_ref())?;

        Ok(Self {
            venv_dir: root.join("venv"),
            source_dir: root.join("root_src"),
            build_dir: root.join("root_build"),
            install_dir: root.join(INSTALL_DIR_NAME),
            artifacts_dir: root.join("artifacts"),
            log_file: root.join("rootforge.log"),
            root,
        })
    }

    /// Path of the downloaded source archive for `target`.
    pub fn source_archive(&self, target: &TargetVersion) -> PathBuf {
        self.root.join(format!("root_v{}.source.tar.gz", target))
    }

    /// Interpreter inside the virtual environment.
    pub fn venv_python(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_dir.join("Scripts").join("python.exe")
        } else {
            self.venv_dir.join("bin").join("python")
        }
    }

    /// Create the work root and the artifacts directory.
    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(&self.artifacts_dir)?;
        Ok(())
    }
}

/// Remove a file or directory tree if it exists.
pub fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Remove `dir` if present and create it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    remove_path(dir)?;
    fs::create_dir_all(dir)?;
    Ok(())
}
