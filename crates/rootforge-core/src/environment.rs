//! Paths read back from the provisioned Python environment.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::runner::{Invocation, ToolRunner};

const INTERPRETER_QUERY: &str = "import sys; print(sys.executable)";
const LIBRARY_QUERY: &str = "import os, sysconfig; \
    print(os.path.join(sysconfig.get_config_var('LIBDIR') or '', sysconfig.get_config_var('LDLIBRARY') or ''))";
const INCLUDE_QUERY: &str = "import sysconfig; print(sysconfig.get_paths()['include'])";
const NUMPY_QUERY: &str = "import numpy; print(numpy.get_include())";

/// Interpreter paths the configure stage points CMake at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildEnvironment {
    pub interpreter: PathBuf,
    pub library: PathBuf,
    pub include_dir: PathBuf,
    pub numpy_include_dir: PathBuf,
}

impl BuildEnvironment {
    /// Ask `python` for each path. Any failed or empty answer is an error.
    pub fn resolve(runner: &dyn ToolRunner, python: &Path) -> Result<Self> {
        Ok(Self {
            interpreter: query(runner, python, "interpreter path", INTERPRETER_QUERY)?,
            library: query(runner, python, "Python library path", LIBRARY_QUERY)?,
            include_dir: query(runner, python, "Python include directory", INCLUDE_QUERY)?,
            numpy_include_dir: query(runner, python, "numpy include directory", NUMPY_QUERY)?,
        })
    }

    /// CMake definitions for the resolved paths.
    pub fn cmake_args(&self) -> Vec<String> {
        vec![
            format!("-DPYTHON_EXECUTABLE={}", self.interpreter.display()),
            format!("-DPython3_EXECUTABLE={}", self.interpreter.display()),
            format!("-DPYTHON_LIBRARY={}", self.library.display()),
            format!("-DPYTHON_INCLUDE_DIR={}", self.include_dir.display()),
            format!("-DNUMPY_INCLUDE_DIR={}", self.numpy_include_dir.display()),
        ]
    }
}

fn query(runner: &dyn ToolRunner, python: &Path, what: &'static str, code: &str) -> Result<PathBuf> {
    let invocation = Invocation::new(python.display().to_string())
        .args(["-c", code])
        .capture();

    let output = runner.run(&invocation).map_err(|e| Error::EnvironmentQuery {
        query: what,
        message: e.to_string(),
    })?;

    let value = output.stdout.lines().last().unwrap_or("").trim();
    if value.is_empty() {
        return Err(Error::EnvironmentQuery {
            query: what,
            message: "interpreter printed nothing".to_string(),
        });
    }

    tracing::debug!("Resolved {}: {}", what, value);
    Ok(PathBuf::from(value))
}
