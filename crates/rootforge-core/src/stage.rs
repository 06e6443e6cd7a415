//! Pipeline stages and the run state machine.

use std::fmt;

/// One ordered unit of work in a pipeline run.
///
/// The declaration order is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    InstallDependencies,
    SetupEnvironment,
    ResolvePaths,
    FetchSource,
    Configure,
    Build,
    Install,
    Package,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 8] = [
        Stage::InstallDependencies,
        Stage::SetupEnvironment,
        Stage::ResolvePaths,
        Stage::FetchSource,
        Stage::Configure,
        Stage::Build,
        Stage::Install,
        Stage::Package,
    ];

    /// Short machine-friendly name, used in logs and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Stage::InstallDependencies => "install-deps",
            Stage::SetupEnvironment => "setup-env",
            Stage::ResolvePaths => "resolve-paths",
            Stage::FetchSource => "fetch-source",
            Stage::Configure => "configure",
            Stage::Build => "build",
            Stage::Install => "install",
            Stage::Package => "package",
        }
    }

    /// Progress label shown while the stage runs.
    pub fn description(self) -> &'static str {
        match self {
            Stage::InstallDependencies => "Installing system dependencies",
            Stage::SetupEnvironment => "Setting up Python environment",
            Stage::ResolvePaths => "Resolving interpreter paths",
            Stage::FetchSource => "Fetching ROOT sources",
            Stage::Configure => "Configuring build",
            Stage::Build => "Compiling",
            Stage::Install => "Installing",
            Stage::Package => "Packaging",
        }
    }

    /// 1-based position of the stage in the run.
    pub fn position(self) -> usize {
        self as usize + 1
    }

    /// Failure code reported when this stage fails.
    ///
    /// `FetchSource` reports `ExtractFailed` instead when the download
    /// succeeded and unpacking did not.
    pub fn failure(self) -> Failure {
        match self {
            Stage::InstallDependencies => Failure::DependencyInstallFailed,
            Stage::SetupEnvironment => Failure::EnvironmentSetupFailed,
            Stage::ResolvePaths => Failure::EnvironmentQueryFailed,
            Stage::FetchSource => Failure::DownloadFailed,
            Stage::Configure => Failure::ConfigureFailed,
            Stage::Build => Failure::BuildFailed,
            Stage::Install => Failure::InstallFailed,
            Stage::Package => Failure::PackageFailed,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal failure code of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    DependencyInstallFailed,
    EnvironmentSetupFailed,
    EnvironmentQueryFailed,
    DownloadFailed,
    ExtractFailed,
    ConfigureFailed,
    BuildFailed,
    InstallFailed,
    PackageFailed,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State of a pipeline run.
///
/// Runs move strictly forward through the stages. Any state may move to
/// `Failed`, which is terminal; there are no edges back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Validating,
    Running(Stage),
    Done,
    Failed(Option<Stage>),
}

impl PipelineState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;

        match (self, next) {
            (Done, _) | (Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Validating, Running(Stage::InstallDependencies)) => true,
            (Running(Stage::Package), Done) => true,
            (Running(current), Running(following)) => {
                following.position() == current.position() + 1
            }
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Validating => f.write_str("validating"),
            PipelineState::Running(stage) => write!(f, "running {}", stage),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(Some(stage)) => write!(f, "failed in {}", stage),
            PipelineState::Failed(None) => f.write_str("failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let positions: Vec<usize> = Stage::ALL.iter().map(|s| s.position()).collect();
        assert_eq!(positions, (1..=8).collect::<Vec<_>>());
        assert!(Stage::Build < Stage::Install);
    }

    #[test]
    fn test_transitions_are_linear() {
        use PipelineState::*;

        assert!(Validating.can_advance_to(Running(Stage::InstallDependencies)));
        assert!(Running(Stage::Build).can_advance_to(Running(Stage::Install)));
        assert!(Running(Stage::Package).can_advance_to(Done));

        assert!(!Validating.can_advance_to(Running(Stage::Build)));
        assert!(!Running(Stage::Install).can_advance_to(Running(Stage::Build)));
        assert!(!Running(Stage::Configure).can_advance_to(Done));
    }

    #[test]
    fn test_failed_is_terminal() {
        use PipelineState::*;

        assert!(Running(Stage::Build).can_advance_to(Failed(Some(Stage::Build))));
        assert!(Validating.can_advance_to(Failed(None)));
        assert!(!Failed(Some(Stage::Build)).can_advance_to(Running(Stage::Build)));
        assert!(!Done.can_advance_to(Failed(None)));
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(Stage::Build.failure(), Failure::BuildFailed);
        assert_eq!(Stage::FetchSource.failure().to_string(), "DownloadFailed");
    }
}
