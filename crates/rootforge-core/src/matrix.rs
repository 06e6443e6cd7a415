//! The fixed ROOT build-option matrix.
//!
//! Which ROOT features get compiled is policy, not a per-run choice. The
//! whole policy lives in [`BuildOptionMatrix::root_default`] and is turned
//! into CMake `-D` arguments by [`BuildOptionMatrix::cmake_args`].

use serde::Serialize;

/// Setting of a single build option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    Enabled,
    Disabled,
    Value(String),
}

impl Setting {
    fn as_cmake(&self) -> &str {
        match self {
            Setting::Enabled => "ON",
            Setting::Disabled => "OFF",
            Setting::Value(value) => value,
        }
    }
}

/// A named entry of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOption {
    pub key: &'static str,
    #[serde(serialize_with = "serialize_setting")]
    pub setting: Setting,
    pub concern: &'static str,
}

fn serialize_setting<S: serde::Serializer>(setting: &Setting, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(setting.as_cmake())
}

impl BuildOption {
    const fn on(key: &'static str, concern: &'static str) -> Self {
        Self {
            key,
            setting: Setting::Enabled,
            concern,
        }
    }

    const fn off(key: &'static str, concern: &'static str) -> Self {
        Self {
            key,
            setting: Setting::Disabled,
            concern,
        }
    }

    fn value(key: &'static str, value: &str, concern: &'static str) -> Self {
        Self {
            key,
            setting: Setting::Value(value.to_string()),
            concern,
        }
    }

    /// `-D<key>=<value>`
    pub fn cmake_arg(&self) -> String {
        format!("-D{}={}", self.key, self.setting.as_cmake())
    }
}

/// Ordered table of build options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildOptionMatrix {
    options: Vec<BuildOption>,
}

impl BuildOptionMatrix {
    /// The policy every release is built with.
    pub fn root_default() -> Self {
        let options = vec![
            BuildOption::value("CMAKE_BUILD_TYPE", "Release", "build type"),
            BuildOption::value("CMAKE_CXX_STANDARD", "17", "C++ standard"),
            BuildOption::value("CMAKE_INSTALL_RPATH_USE_LINK_PATH", "ON", "runtime path"),
            BuildOption::on("rpath", "runtime path"),
            // enabled features
            BuildOption::on("roofit", "statistical analysis"),
            BuildOption::on("minuit2", "statistical analysis"),
            BuildOption::on("mathmore", "extended math"),
            BuildOption::on("imt", "multithreading"),
            BuildOption::on("ssl", "TLS"),
            BuildOption::on("xml", "XML"),
            BuildOption::on("davix", "distributed storage client"),
            BuildOption::on("x11", "graphics"),
            BuildOption::on("pythia8", "physics simulation"),
            BuildOption::on("fortran", "Fortran interop"),
            BuildOption::on("pyroot", "Python bindings"),
            // always off
            BuildOption::off("vc", "legacy vector math"),
            BuildOption::off("opengl", "OpenGL"),
            BuildOption::off("ccache", "compiler caching"),
            BuildOption::off("runtime_cxxmodules", "module caching"),
            BuildOption::off("testing", "test suite"),
            BuildOption::off("roottest", "test suite"),
            BuildOption::off("table", "table"),
            BuildOption::off("sqlite", "SQLite"),
            BuildOption::off("gdml", "geometry description markup"),
            BuildOption::off("xrootd", "remote file access"),
            BuildOption::off("fitsio", "FITS"),
        ];

        Self { options }
    }

    pub fn options(&self) -> &[BuildOption] {
        &self.options
    }

    /// Look up an option by key.
    pub fn get(&self, key: &str) -> Option<&Setting> {
        self.options
            .iter()
            .find(|opt| opt.key == key)
            .map(|opt| &opt.setting)
    }

    /// Keys of all enabled feature toggles.
    pub fn enabled(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.options
            .iter()
            .filter(|opt| opt.setting == Setting::Enabled)
            .map(|opt| opt.key)
    }

    /// Keys of all disabled feature toggles.
    pub fn disabled(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.options
            .iter()
            .filter(|opt| opt.setting == Setting::Disabled)
            .map(|opt| opt.key)
    }

    /// CMake arguments for the whole table, in table order.
    pub fn cmake_args(&self) -> Vec<String> {
        self.options.iter().map(BuildOption::cmake_arg).collect()
    }
}

impl Default for BuildOptionMatrix {
    fn default() -> Self {
        Self::root_default()
    }
}
