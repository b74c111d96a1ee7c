use std::path::{Path, PathBuf};

use crate::distribution::GradleDistribution;
use crate::project::ProjectConfiguration;

/// The per-launch values stored with a run configuration.
///
/// Mirrors the build-level properties one layer up: the values only take
/// effect while `override_build_settings` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfigurationProperties {
    pub tasks: Vec<String>,
    pub gradle_distribution: GradleDistribution,
    pub gradle_user_home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub jvm_arguments: Vec<String>,
    pub arguments: Vec<String>,
    pub show_console_view: bool,
    pub show_executions_view: bool,
    pub override_build_settings: bool,
    pub build_scans_enabled: bool,
    pub offline_mode: bool,
}

/// The raw fields a host launch definition supplies.
///
/// Enough to build a run configuration even when the working directory is
/// not (or no longer) a known project.
#[derive(Debug, Clone, Default)]
pub struct LaunchAttributes {
    pub working_dir: PathBuf,
    pub tasks: Vec<String>,
    pub gradle_distribution: GradleDistribution,
    pub gradle_user_home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub jvm_arguments: Vec<String>,
    pub arguments: Vec<String>,
    pub show_console_view: bool,
    pub show_executions_view: bool,
    pub override_build_settings: bool,
    pub build_scans_enabled: bool,
    pub offline_mode: bool,
}

impl RunConfigurationProperties {
    pub(crate) fn from_attributes(attributes: &LaunchAttributes) -> Self {
        Self {
            tasks: attributes.tasks.clone(),
            gradle_distribution: attributes.gradle_distribution.clone(),
            gradle_user_home: attributes.gradle_user_home.clone(),
            java_home: attributes.java_home.clone(),
            jvm_arguments: attributes.jvm_arguments.clone(),
            arguments: attributes.arguments.clone(),
            show_console_view: attributes.show_console_view,
            show_executions_view: attributes.show_executions_view,
            override_build_settings: attributes.override_build_settings,
            build_scans_enabled: attributes.build_scans_enabled,
            offline_mode: attributes.offline_mode,
        }
    }
}

/// A launch paired with the project it runs in.
///
/// Accessors resolve against the *effective* build configuration, so the
/// run → build → workspace chain composes without this layer ever touching
/// workspace state directly.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    project_configuration: ProjectConfiguration,
    properties: RunConfigurationProperties,
}

impl RunConfiguration {
    pub fn new(
        project_configuration: ProjectConfiguration,
        properties: RunConfigurationProperties,
    ) -> Self {
        Self {
            project_configuration,
            properties,
        }
    }

    pub fn project_configuration(&self) -> &ProjectConfiguration {
        &self.project_configuration
    }

    pub fn properties(&self) -> &RunConfigurationProperties {
        &self.properties
    }

    pub fn tasks(&self) -> &[String] {
        &self.properties.tasks
    }

    pub fn override_build_settings(&self) -> bool {
        self.properties.override_build_settings
    }

    pub fn gradle_distribution(&self) -> &GradleDistribution {
        if self.properties.override_build_settings {
            &self.properties.gradle_distribution
        } else {
            self.project_configuration
                .build_configuration()
                .gradle_distribution()
        }
    }

    pub fn gradle_user_home(&self) -> Option<&Path> {
        if self.properties.override_build_settings {
            self.properties.gradle_user_home.as_deref()
        } else {
            self.project_configuration
                .build_configuration()
                .gradle_user_home()
        }
    }

    pub fn java_home(&self) -> Option<&Path> {
        if self.properties.override_build_settings {
            self.properties.java_home.as_deref()
        } else {
            self.project_configuration.build_configuration().java_home()
        }
    }

    pub fn jvm_arguments(&self) -> &[String] {
        if self.properties.override_build_settings {
            &self.properties.jvm_arguments
        } else {
            self.project_configuration
                .build_configuration()
                .jvm_arguments()
        }
    }

    pub fn arguments(&self) -> &[String] {
        if self.properties.override_build_settings {
            &self.properties.arguments
        } else {
            self.project_configuration.build_configuration().arguments()
        }
    }

    pub fn build_scans_enabled(&self) -> bool {
        if self.properties.override_build_settings {
            self.properties.build_scans_enabled
        } else {
            self.project_configuration
                .build_configuration()
                .build_scans_enabled()
        }
    }

    pub fn offline_mode(&self) -> bool {
        if self.properties.override_build_settings {
            self.properties.offline_mode
        } else {
            self.project_configuration
                .build_configuration()
                .offline_mode()
        }
    }

    pub fn show_console_view(&self) -> bool {
        if self.properties.override_build_settings {
            self.properties.show_console_view
        } else {
            self.project_configuration
                .build_configuration()
                .show_console_view()
        }
    }

    pub fn show_executions_view(&self) -> bool {
        if self.properties.override_build_settings {
            self.properties.show_executions_view
        } else {
            self.project_configuration
                .build_configuration()
                .show_executions_view()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildConfiguration, BuildConfigurationProperties};
    use crate::project::ProjectPath;
    use crate::workspace::WorkspaceConfiguration;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn three_layer_fixture(
        run_overrides: bool,
        build_overrides: bool,
    ) -> RunConfiguration {
        let dir = tempdir().unwrap();
        let workspace = WorkspaceConfiguration {
            gradle_distribution: GradleDistribution::Wrapper,
            gradle_user_home: Some(PathBuf::from("/workspace/home")),
            offline_mode: false,
            ..WorkspaceConfiguration::default()
        };
        let mut build_properties = BuildConfigurationProperties::new(dir.path());
        build_properties.override_workspace_settings = build_overrides;
        build_properties.gradle_distribution = GradleDistribution::Version("8.0".to_owned());
        build_properties.gradle_user_home = Some(PathBuf::from("/build/home"));
        build_properties.offline_mode = true;
        let build = BuildConfiguration::new(build_properties, workspace);
        let project = ProjectConfiguration::new(dir.path(), ProjectPath::root(), build);

        let properties = RunConfigurationProperties {
            gradle_distribution: GradleDistribution::Version("9.0".to_owned()),
            gradle_user_home: None,
            offline_mode: false,
            override_build_settings: run_overrides,
            ..RunConfigurationProperties::default()
        };
        RunConfiguration::new(project, properties)
    }

    #[test]
    fn run_overrides_win_when_enabled() {
        let run = three_layer_fixture(true, true);
        assert_eq!(
            run.gradle_distribution(),
            &GradleDistribution::Version("9.0".to_owned())
        );
        // The run layer stored an explicit `None` user home.
        assert_eq!(run.gradle_user_home(), None);
        assert!(!run.offline_mode());
    }

    #[test]
    fn run_without_overrides_resolves_to_the_effective_build_values() {
        // Build overrides enabled: the run sees the build's stored values,
        // not the workspace's.
        let run = three_layer_fixture(false, true);
        assert_eq!(
            run.gradle_distribution(),
            &GradleDistribution::Version("8.0".to_owned())
        );
        assert_eq!(run.gradle_user_home(), Some(Path::new("/build/home")));
        assert!(run.offline_mode());
    }

    #[test]
    fn run_without_overrides_falls_through_to_the_workspace() {
        // Build overrides disabled as well: workspace values flow all the
        // way up.
        let run = three_layer_fixture(false, false);
        assert_eq!(run.gradle_distribution(), &GradleDistribution::Wrapper);
        assert_eq!(run.gradle_user_home(), Some(Path::new("/workspace/home")));
        assert!(!run.offline_mode());
    }
}
