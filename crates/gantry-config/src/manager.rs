use std::path::{Path, PathBuf};
use std::sync::Arc;

use gantry_core::{paths, ProjectHandle, ProjectRegistry};
use gantry_prefs::ScopedPreferences;

use crate::build::{BuildConfiguration, BuildConfigurationPersistence, BuildConfigurationProperties};
use crate::distribution::GradleDistribution;
use crate::error::{with_fallback, ConfigError};
use crate::project::{
    DefaultProjectConfigurationPersistence, LegacyAwareProjectConfigurationPersistence,
    ProjectConfiguration, ProjectConfigurationPersistence, ProjectConfigurationProperties,
    ProjectPath,
};
use crate::run::{LaunchAttributes, RunConfiguration, RunConfigurationProperties};
use crate::workspace::{WorkspaceConfiguration, WorkspaceConfigurationPersistence};

/// Per-build values supplied when a build is first imported.
#[derive(Debug, Clone, Default)]
pub struct BuildConfigurationOpts {
    pub override_workspace_settings: bool,
    pub gradle_distribution: GradleDistribution,
    pub gradle_user_home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub build_scans_enabled: bool,
    pub offline_mode: bool,
    pub auto_sync: bool,
    pub arguments: Vec<String>,
    pub jvm_arguments: Vec<String>,
    pub show_console_view: bool,
    pub show_executions_view: bool,
}

/// The facade tying configuration loading, resolution and persistence
/// together.
///
/// All operations are synchronous and touch at most a couple of small files;
/// callers needing stronger guarantees than last-flush-wins must serialize
/// externally.
pub struct ConfigurationManager {
    registry: Arc<dyn ProjectRegistry>,
    workspace_persistence: WorkspaceConfigurationPersistence,
    build_persistence: BuildConfigurationPersistence,
    project_persistence:
        LegacyAwareProjectConfigurationPersistence<DefaultProjectConfigurationPersistence>,
}

impl ConfigurationManager {
    /// Creates a manager persisting workspace-level state under
    /// `workspace_state_dir` and project-level state through `scope`.
    pub fn new(
        workspace_state_dir: impl Into<PathBuf>,
        registry: Arc<dyn ProjectRegistry>,
        scope: Arc<dyn ScopedPreferences>,
    ) -> Self {
        Self {
            registry,
            workspace_persistence: WorkspaceConfigurationPersistence::new(workspace_state_dir),
            build_persistence: BuildConfigurationPersistence::new(scope.clone()),
            project_persistence: LegacyAwareProjectConfigurationPersistence::new(
                DefaultProjectConfigurationPersistence::new(scope.clone()),
                scope,
            ),
        }
    }

    pub fn load_workspace_configuration(&self) -> Result<WorkspaceConfiguration, ConfigError> {
        self.workspace_persistence.read()
    }

    pub fn save_workspace_configuration(
        &self,
        configuration: &WorkspaceConfiguration,
    ) -> Result<(), ConfigError> {
        self.workspace_persistence.save(configuration)
    }

    /// Builds an in-memory build configuration for `root_dir`. Nothing is
    /// persisted until [`save_build_configuration`](Self::save_build_configuration).
    pub fn create_build_configuration(
        &self,
        root_dir: &Path,
        opts: BuildConfigurationOpts,
    ) -> Result<BuildConfiguration, ConfigError> {
        let mut properties = BuildConfigurationProperties::new(root_dir);
        properties.override_workspace_settings = opts.override_workspace_settings;
        properties.gradle_distribution = opts.gradle_distribution;
        properties.gradle_user_home = opts.gradle_user_home;
        properties.java_home = opts.java_home;
        properties.build_scans_enabled = opts.build_scans_enabled;
        properties.offline_mode = opts.offline_mode;
        properties.auto_sync = opts.auto_sync;
        properties.arguments = opts.arguments;
        properties.jvm_arguments = opts.jvm_arguments;
        properties.show_console_view = opts.show_console_view;
        properties.show_executions_view = opts.show_executions_view;
        Ok(BuildConfiguration::new(
            properties,
            self.load_workspace_configuration()?,
        ))
    }

    /// Loads the stored configuration of the build rooted at `root_dir`.
    pub fn load_build_configuration(
        &self,
        root_dir: &Path,
    ) -> Result<BuildConfiguration, ConfigError> {
        if !root_dir.exists() {
            return Err(ConfigError::DirectoryNotFound {
                path: root_dir.to_path_buf(),
            });
        }
        let properties = match self.accessible_project_at(root_dir) {
            Some(project) => with_fallback(
                "load build configuration",
                || self.build_persistence.read_for_project(&*project),
                || self.build_persistence.read_for_directory(root_dir),
            )?,
            None => self.build_persistence.read_for_directory(root_dir)?,
        };
        Ok(BuildConfiguration::new(
            properties,
            self.load_workspace_configuration()?,
        ))
    }

    pub fn save_build_configuration(
        &self,
        configuration: &BuildConfiguration,
    ) -> Result<(), ConfigError> {
        let root_dir = configuration.root_project_dir();
        match self.accessible_project_at(root_dir) {
            Some(project) => with_fallback(
                "save build configuration",
                || {
                    self.build_persistence
                        .save_for_project(&*project, configuration.properties())
                },
                || {
                    self.build_persistence
                        .save_for_directory(root_dir, configuration.properties())
                },
            ),
            None => self
                .build_persistence
                .save_for_directory(root_dir, configuration.properties()),
        }
    }

    pub fn create_project_configuration(
        &self,
        configuration: BuildConfiguration,
        project_dir: impl Into<PathBuf>,
        project_path: ProjectPath,
    ) -> ProjectConfiguration {
        ProjectConfiguration::new(project_dir, project_path, configuration)
    }

    /// Loads the configuration of a member project: the stored build-root
    /// reference resolved back to a full build configuration.
    pub fn load_project_configuration(
        &self,
        project: &dyn ProjectHandle,
    ) -> Result<ProjectConfiguration, ConfigError> {
        let properties = self.project_persistence.read_for_project(project)?;
        let build = self.load_build_configuration(&properties.root_project_dir)?;
        Ok(ProjectConfiguration::new(
            paths::canonicalize(project.location()),
            properties.project_path,
            build,
        ))
    }

    fn load_project_configuration_from_dir(
        &self,
        project_dir: &Path,
    ) -> Result<ProjectConfiguration, ConfigError> {
        let properties = match self.accessible_project_at(project_dir) {
            Some(project) => self.project_persistence.read_for_project(&*project)?,
            None => self.project_persistence.read_for_directory(project_dir)?,
        };
        let build = self.load_build_configuration(&properties.root_project_dir)?;
        Ok(ProjectConfiguration::new(
            paths::canonicalize(project_dir),
            properties.project_path,
            build,
        ))
    }

    /// Like [`load_project_configuration`](Self::load_project_configuration)
    /// but swallowing failures; used where stale metadata must not abort the
    /// caller.
    pub fn try_load_project_configuration(
        &self,
        project: &dyn ProjectHandle,
    ) -> Option<ProjectConfiguration> {
        match self.load_project_configuration(project) {
            Ok(configuration) => Some(configuration),
            Err(err) => {
                tracing::trace!(
                    project = project.name(),
                    error = %err,
                    "cannot load project configuration"
                );
                None
            }
        }
    }

    /// Persists the project → build-root mapping, then the build
    /// configuration itself.
    pub fn save_project_configuration(
        &self,
        configuration: &ProjectConfiguration,
    ) -> Result<(), ConfigError> {
        let properties = ProjectConfigurationProperties {
            project_path: configuration.project_path().clone(),
            root_project_dir: configuration
                .build_configuration()
                .root_project_dir()
                .to_path_buf(),
            gradle_distribution: None,
        };
        let project_dir = configuration.project_dir();
        match self.accessible_project_at(project_dir) {
            Some(project) => self
                .project_persistence
                .save_for_project(&*project, &properties)?,
            None => self
                .project_persistence
                .save_for_directory(project_dir, &properties)?,
        }
        self.save_build_configuration(configuration.build_configuration())
    }

    pub fn delete_project_configuration(
        &self,
        project: &dyn ProjectHandle,
    ) -> Result<(), ConfigError> {
        if project.is_accessible() {
            self.project_persistence.delete_for_project(project)
        } else {
            self.project_persistence
                .delete_for_directory(project.location())
        }
    }

    /// Builds the run configuration for a launch.
    ///
    /// When the working directory resolves to a known project, the launch
    /// layers on that project's build configuration. Any resolution failure
    /// (stale metadata, missing project, unreadable store) falls back to
    /// ephemeral build properties taken from the launch attributes, so a
    /// launch always has something usable.
    pub fn load_run_configuration(
        &self,
        attributes: &LaunchAttributes,
    ) -> Result<RunConfiguration, ConfigError> {
        let project_configuration =
            match self.load_project_configuration_from_dir(&attributes.working_dir) {
                Ok(configuration) => configuration,
                Err(err) => {
                    tracing::trace!(
                        working_dir = %attributes.working_dir.display(),
                        error = %err,
                        "cannot resolve project configuration for launch, using launch attributes"
                    );
                    let mut properties = BuildConfigurationProperties::new(&attributes.working_dir);
                    properties.override_workspace_settings = attributes.override_build_settings;
                    properties.gradle_distribution = attributes.gradle_distribution.clone();
                    properties.gradle_user_home = attributes.gradle_user_home.clone();
                    properties.java_home = attributes.java_home.clone();
                    properties.build_scans_enabled = attributes.build_scans_enabled;
                    properties.offline_mode = attributes.offline_mode;
                    properties.arguments = attributes.arguments.clone();
                    properties.jvm_arguments = attributes.jvm_arguments.clone();
                    properties.show_console_view = attributes.show_console_view;
                    properties.show_executions_view = attributes.show_executions_view;
                    let build =
                        BuildConfiguration::new(properties, self.load_workspace_configuration()?);
                    ProjectConfiguration::new(
                        paths::canonicalize(&attributes.working_dir),
                        ProjectPath::root(),
                        build,
                    )
                }
            };
        Ok(RunConfiguration::new(
            project_configuration,
            RunConfigurationProperties::from_attributes(attributes),
        ))
    }

    /// A run configuration with no tasks and no overrides, rooted at the
    /// build itself.
    pub fn create_default_run_configuration(
        &self,
        configuration: BuildConfiguration,
    ) -> RunConfiguration {
        self.create_run_configuration(configuration, RunConfigurationProperties::default())
    }

    pub fn create_run_configuration(
        &self,
        configuration: BuildConfiguration,
        properties: RunConfigurationProperties,
    ) -> RunConfiguration {
        let root_dir = configuration.root_project_dir().to_path_buf();
        let project = ProjectConfiguration::new(root_dir, ProjectPath::root(), configuration);
        RunConfiguration::new(project, properties)
    }

    fn accessible_project_at(&self, dir: &Path) -> Option<Arc<dyn ProjectHandle>> {
        self.registry
            .project_at(dir)
            .filter(|project| project.is_accessible())
    }
}
