//! Version parameters of a pipeline run.
//!
//! Versions are kept in their original textual form: `6.32.04` is
//! interpolated into download URLs and artifact names as given, leading zero
//! included.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

/// Python ABI version the build links against, shaped `<digits>.<digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RuntimeVersion(String);

/// ROOT release to build, shaped `<digits>.<digits>.<digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetVersion(String);

/// Check that `value` is exactly `parts` non-empty ASCII digit groups
/// separated by dots.
fn is_dotted_digits(value: &str, parts: usize) -> bool {
    let groups: Vec<&str> = value.split('.').collect();
    groups.len() == parts
        && groups
            .iter()
            .all(|g| !g.is_empty() && g.bytes().all(|b| b.is_ascii_digit()))
}

impl FromStr for RuntimeVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if is_dotted_digits(s, 2) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::Validation {
                field: "runtime version",
                value: s.to_string(),
                expected: "<digits>.<digits> (e.g. 3.11)",
            })
        }
    }
}

impl FromStr for TargetVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if is_dotted_digits(s, 3) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::Validation {
                field: "target version",
                value: s.to_string(),
                expected: "<digits>.<digits>.<digits> (e.g. 6.32.04)",
            })
        }
    }
}

impl RuntimeVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Versioned interpreter name, e.g. `python3.11`.
    pub fn interpreter(&self) -> String {
        format!("python{}", self.0)
    }
}

impl TargetVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated pair of versions for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSpec {
    pub runtime: RuntimeVersion,
    pub target: TargetVersion,
}

impl VersionSpec {
    /// Validate both parameters. Nothing else happens here.
    pub fn parse(runtime: &str, target: &str) -> Result<Self> {
        Ok(Self {
            runtime: runtime.parse()?,
            target: target.parse()?,
        })
    }
}
