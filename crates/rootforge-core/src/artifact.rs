//! Artifact naming and archiving.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::runner::Invocation;
use crate::version::VersionSpec;

/// Archive format of the packaged install tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar.gz")]
    TarGz,
    #[serde(rename = "tar.xz")]
    TarXz,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarXz => "tar.xz",
        }
    }

    /// Command that archives `dir_name` (relative to `cwd`) into `output`.
    pub fn invocation(self, cwd: &Path, dir_name: &str, output: &Path) -> Invocation {
        let inv = match self {
            ArchiveFormat::Zip => Invocation::new("zip").args(["-r", "-q", "-y"]).path_arg(output),
            ArchiveFormat::TarGz => Invocation::new("tar").arg("-czf").path_arg(output),
            ArchiveFormat::TarXz => Invocation::new("tar").arg("-cJf").path_arg(output),
        };
        inv.arg(dir_name).current_dir(cwd)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            "tar.xz" | "txz" => Ok(ArchiveFormat::TarXz),
            other => Err(Error::Config(format!(
                "unknown archive format '{}' (expected zip, tar.gz or tar.xz)",
                other
            ))),
        }
    }
}

/// Naming policy for artifacts.
///
/// The file name is
/// `<product>_v<target>_<platform>_<runtime_tag><runtime>.<ext>`; release
/// tooling matches on it, so separators and casing are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactNaming {
    pub product: String,
    pub platform: String,
    pub runtime_tag: String,
    pub format: ArchiveFormat,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            product: "root".to_string(),
            platform: "Ubuntu".to_string(),
            runtime_tag: "Python".to_string(),
            format: ArchiveFormat::Zip,
        }
    }
}

impl ArtifactNaming {
    pub fn file_name(&self, spec: &VersionSpec) -> String {
        format!(
            "{}_v{}_{}_{}{}.{}",
            self.product,
            spec.target,
            self.platform,
            self.runtime_tag,
            spec.runtime,
            self.format.extension()
        )
    }
}

/// The packaged result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub format: ArchiveFormat,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Temporary path the archiver writes to before the final rename.
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    final_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> VersionSpec {
        VersionSpec::parse("3.11", "6.32.04").unwrap()
    }

    #[test]
    fn test_default_name() {
        let name = ArtifactNaming::default().file_name(&spec());
        assert_eq!(name, "root_v6.32.04_Ubuntu_Python3.11.zip");
    }

    #[test]
    fn test_custom_policy() {
        let naming = ArtifactNaming {
            platform: "ubuntu-22.04".to_string(),
            runtime_tag: "py".to_string(),
            format: ArchiveFormat::TarXz,
            ..Default::default()
        };
        assert_eq!(naming.file_name(&spec()), "root_v6.32.04_ubuntu-22.04_py3.11.tar.xz");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("zip".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!("tgz".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::TarGz);
        assert!("rar".parse::<ArchiveFormat>().is_err());

        let format: ArchiveFormat = serde_json::from_str("\"tar.xz\"").unwrap();
        assert_eq!(format, ArchiveFormat::TarXz);
    }

    #[test]
    fn test_partial_path() {
        let path = Path::new("/w/artifacts/root_v6.32.04_Ubuntu_Python3.11.zip");
        assert_eq!(
            partial_path(path),
            Path::new("/w/artifacts/root_v6.32.04_Ubuntu_Python3.11.zip.partial")
        );
    }

    #[test]
    fn test_archive_invocation() {
        let inv = ArchiveFormat::TarGz.invocation(
            Path::new("/w"),
            "root_install",
            Path::new("/w/artifacts/x.tar.gz.partial"),
        );
        assert_eq!(inv.program, "tar");
        assert_eq!(inv.args, vec!["-czf", "/w/artifacts/x.tar.gz.partial", "root_install"]);
        assert_eq!(inv.cwd.as_deref(), Some(Path::new("/w")));
    }
}
