use std::path::{Path, PathBuf};
use std::sync::Arc;

use gantry_core::{paths, ProjectHandle};
use gantry_prefs::{PreferenceStore, ProjectScopeStore, PropertiesFileStore, ScopedPreferences};

use crate::distribution::GradleDistribution;
use crate::error::ConfigError;
use crate::workspace::WorkspaceConfiguration;
use crate::PREF_NODE;

pub(crate) const CONNECTION_GRADLE_DISTRIBUTION: &str = "connection.gradle.distribution";
const OVERRIDE_WORKSPACE_SETTINGS: &str = "override.workspace.settings";
const GRADLE_USER_HOME: &str = "gradle.user.home";
const JAVA_HOME: &str = "java.home";
const BUILD_SCANS_ENABLED: &str = "build.scans.enabled";
const OFFLINE_MODE: &str = "offline.mode";
const AUTO_SYNC: &str = "auto.sync";
const ARGUMENTS: &str = "arguments";
const JVM_ARGUMENTS: &str = "jvm.arguments";
const SHOW_CONSOLE_VIEW: &str = "show.console.view";
const SHOW_EXECUTIONS_VIEW: &str = "show.executions.view";

/// Keys that only carry meaning while workspace overrides are enabled.
/// They are deleted, not left stale, when the override flag goes off.
const OVERRIDE_ONLY_KEYS: [&str; 11] = [
    OVERRIDE_WORKSPACE_SETTINGS,
    CONNECTION_GRADLE_DISTRIBUTION,
    GRADLE_USER_HOME,
    JAVA_HOME,
    BUILD_SCANS_ENABLED,
    OFFLINE_MODE,
    AUTO_SYNC,
    ARGUMENTS,
    JVM_ARGUMENTS,
    SHOW_CONSOLE_VIEW,
    SHOW_EXECUTIONS_VIEW,
];

/// The stored, per-build-root configuration values.
///
/// The root directory is canonicalized at construction and serves as the
/// build's identity; everything else only takes effect while
/// `override_workspace_settings` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfigurationProperties {
    root_project_dir: PathBuf,
    pub gradle_distribution: GradleDistribution,
    pub gradle_user_home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub override_workspace_settings: bool,
    pub build_scans_enabled: bool,
    pub offline_mode: bool,
    pub auto_sync: bool,
    pub arguments: Vec<String>,
    pub jvm_arguments: Vec<String>,
    pub show_console_view: bool,
    pub show_executions_view: bool,
}

impl BuildConfigurationProperties {
    /// Creates properties for a build root with all values at their
    /// defaults and overrides disabled.
    pub fn new(root_project_dir: impl AsRef<Path>) -> Self {
        Self {
            root_project_dir: paths::canonicalize(root_project_dir.as_ref()),
            gradle_distribution: GradleDistribution::default(),
            gradle_user_home: None,
            java_home: None,
            override_workspace_settings: false,
            build_scans_enabled: false,
            offline_mode: false,
            auto_sync: false,
            arguments: Vec::new(),
            jvm_arguments: Vec::new(),
            show_console_view: false,
            show_executions_view: false,
        }
    }

    pub fn root_project_dir(&self) -> &Path {
        &self.root_project_dir
    }
}

/// A build configuration as seen by the rest of the system: the stored
/// per-build values paired with the workspace defaults they may override.
///
/// Every accessor consults the override flag and falls back to the
/// workspace value field-by-field; no accessor ever mixes the two sources.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfiguration {
    properties: BuildConfigurationProperties,
    workspace_configuration: WorkspaceConfiguration,
}

impl BuildConfiguration {
    pub fn new(
        properties: BuildConfigurationProperties,
        workspace_configuration: WorkspaceConfiguration,
    ) -> Self {
        Self {
            properties,
            workspace_configuration,
        }
    }

    pub fn root_project_dir(&self) -> &Path {
        self.properties.root_project_dir()
    }

    pub fn override_workspace_settings(&self) -> bool {
        self.properties.override_workspace_settings
    }

    pub fn gradle_distribution(&self) -> &GradleDistribution {
        if self.properties.override_workspace_settings {
            &self.properties.gradle_distribution
        } else {
            &self.workspace_configuration.gradle_distribution
        }
    }

    pub fn gradle_user_home(&self) -> Option<&Path> {
        if self.properties.override_workspace_settings {
            self.properties.gradle_user_home.as_deref()
        } else {
            self.workspace_configuration.gradle_user_home.as_deref()
        }
    }

    pub fn java_home(&self) -> Option<&Path> {
        if self.properties.override_workspace_settings {
            self.properties.java_home.as_deref()
        } else {
            self.workspace_configuration.java_home.as_deref()
        }
    }

    pub fn build_scans_enabled(&self) -> bool {
        if self.properties.override_workspace_settings {
            self.properties.build_scans_enabled
        } else {
            self.workspace_configuration.build_scans_enabled
        }
    }

    pub fn offline_mode(&self) -> bool {
        if self.properties.override_workspace_settings {
            self.properties.offline_mode
        } else {
            self.workspace_configuration.offline_mode
        }
    }

    pub fn auto_sync(&self) -> bool {
        if self.properties.override_workspace_settings {
            self.properties.auto_sync
        } else {
            self.workspace_configuration.auto_sync
        }
    }

    pub fn arguments(&self) -> &[String] {
        if self.properties.override_workspace_settings {
            &self.properties.arguments
        } else {
            &self.workspace_configuration.arguments
        }
    }

    pub fn jvm_arguments(&self) -> &[String] {
        if self.properties.override_workspace_settings {
            &self.properties.jvm_arguments
        } else {
            &self.workspace_configuration.jvm_arguments
        }
    }

    pub fn show_console_view(&self) -> bool {
        if self.properties.override_workspace_settings {
            self.properties.show_console_view
        } else {
            self.workspace_configuration.show_console_view
        }
    }

    pub fn show_executions_view(&self) -> bool {
        if self.properties.override_workspace_settings {
            self.properties.show_executions_view
        } else {
            self.workspace_configuration.show_executions_view
        }
    }

    pub fn properties(&self) -> &BuildConfigurationProperties {
        &self.properties
    }

    pub fn workspace_configuration(&self) -> &WorkspaceConfiguration {
        &self.workspace_configuration
    }
}

/// Reads and saves build configuration properties on a target project.
pub(crate) struct BuildConfigurationPersistence {
    scope: Arc<dyn ScopedPreferences>,
}

impl BuildConfigurationPersistence {
    pub(crate) fn new(scope: Arc<dyn ScopedPreferences>) -> Self {
        Self { scope }
    }

    pub(crate) fn read_for_project(
        &self,
        project: &dyn ProjectHandle,
    ) -> Result<BuildConfigurationProperties, ConfigError> {
        let store = ProjectScopeStore::open(&*self.scope, project, PREF_NODE)?;
        read_preferences(&store, project.location())
    }

    pub(crate) fn read_for_directory(
        &self,
        dir: &Path,
    ) -> Result<BuildConfigurationProperties, ConfigError> {
        let store = PropertiesFileStore::for_project_directory(dir, PREF_NODE)?;
        read_preferences(&store, dir)
    }

    pub(crate) fn save_for_project(
        &self,
        project: &dyn ProjectHandle,
        properties: &BuildConfigurationProperties,
    ) -> Result<(), ConfigError> {
        let mut store = ProjectScopeStore::open(&*self.scope, project, PREF_NODE)?;
        save_preferences(properties, &mut store)
    }

    pub(crate) fn save_for_directory(
        &self,
        dir: &Path,
        properties: &BuildConfigurationProperties,
    ) -> Result<(), ConfigError> {
        let mut store = PropertiesFileStore::for_project_directory(dir, PREF_NODE)?;
        save_preferences(properties, &mut store)
    }
}

fn read_preferences(
    store: &dyn PreferenceStore,
    root_dir: &Path,
) -> Result<BuildConfigurationProperties, ConfigError> {
    let mut properties = BuildConfigurationProperties::new(root_dir);
    properties.override_workspace_settings = store.read_bool(OVERRIDE_WORKSPACE_SETTINGS, false);
    if !properties.override_workspace_settings {
        return Ok(properties);
    }

    // With overrides enabled the distribution is mandatory; its absence
    // means the stored configuration is corrupt.
    let corrupt = || ConfigError::CorruptConfiguration {
        path: root_dir.to_path_buf(),
    };
    let distribution = store
        .read_or(CONNECTION_GRADLE_DISTRIBUTION, None)
        .ok_or_else(corrupt)?;
    properties.gradle_distribution = distribution.parse().map_err(|_| corrupt())?;

    properties.gradle_user_home = read_path(store, GRADLE_USER_HOME);
    properties.java_home = read_path(store, JAVA_HOME);
    properties.build_scans_enabled = store.read_bool(BUILD_SCANS_ENABLED, false);
    properties.offline_mode = store.read_bool(OFFLINE_MODE, false);
    properties.auto_sync = store.read_bool(AUTO_SYNC, false);
    properties.arguments = read_list(store, ARGUMENTS);
    properties.jvm_arguments = read_list(store, JVM_ARGUMENTS);
    properties.show_console_view = store.read_bool(SHOW_CONSOLE_VIEW, false);
    properties.show_executions_view = store.read_bool(SHOW_EXECUTIONS_VIEW, false);
    Ok(properties)
}

fn save_preferences(
    properties: &BuildConfigurationProperties,
    store: &mut dyn PreferenceStore,
) -> Result<(), ConfigError> {
    if properties.override_workspace_settings {
        store.write_bool(OVERRIDE_WORKSPACE_SETTINGS, true);
        store.write(
            CONNECTION_GRADLE_DISTRIBUTION,
            Some(&properties.gradle_distribution.to_string()),
        );
        write_path(store, GRADLE_USER_HOME, properties.gradle_user_home.as_deref());
        write_path(store, JAVA_HOME, properties.java_home.as_deref());
        store.write_bool(BUILD_SCANS_ENABLED, properties.build_scans_enabled);
        store.write_bool(OFFLINE_MODE, properties.offline_mode);
        store.write_bool(AUTO_SYNC, properties.auto_sync);
        store.write(ARGUMENTS, Some(&properties.arguments.join(" ")));
        store.write(JVM_ARGUMENTS, Some(&properties.jvm_arguments.join(" ")));
        store.write_bool(SHOW_CONSOLE_VIEW, properties.show_console_view);
        store.write_bool(SHOW_EXECUTIONS_VIEW, properties.show_executions_view);
    } else {
        for key in OVERRIDE_ONLY_KEYS {
            store.delete(key);
        }
    }
    store.flush()?;
    Ok(())
}

fn read_path(store: &dyn PreferenceStore, key: &str) -> Option<PathBuf> {
    store
        .read_or(key, None)
        .filter(|value| !value.is_empty())
        .map(|value| paths::from_portable_string(&value))
}

fn write_path(store: &mut dyn PreferenceStore, key: &str, value: Option<&Path>) {
    store.write(key, value.map(paths::to_portable_string).as_deref());
}

// Build-level argument lists are space-separated in storage.
fn read_list(store: &dyn PreferenceStore, key: &str) -> Vec<String> {
    store
        .read_or(key, Some(""))
        .map(|raw| {
            raw.split(' ')
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn overriding_properties(root: &Path) -> BuildConfigurationProperties {
        BuildConfigurationProperties {
            gradle_distribution: GradleDistribution::Version("8.4".to_owned()),
            gradle_user_home: Some(PathBuf::from("/custom/gradle-home")),
            java_home: Some(PathBuf::from("/usr/lib/jvm/java-21")),
            override_workspace_settings: true,
            build_scans_enabled: true,
            offline_mode: true,
            auto_sync: true,
            arguments: vec!["--info".to_owned()],
            jvm_arguments: vec!["-Xmx1g".to_owned()],
            show_console_view: true,
            show_executions_view: true,
            ..BuildConfigurationProperties::new(root)
        }
    }

    fn distinct_workspace() -> WorkspaceConfiguration {
        WorkspaceConfiguration {
            gradle_distribution: GradleDistribution::Wrapper,
            gradle_user_home: Some(PathBuf::from("/workspace/gradle-home")),
            java_home: None,
            offline_mode: false,
            build_scans_enabled: false,
            auto_sync: false,
            arguments: vec!["--quiet".to_owned()],
            jvm_arguments: Vec::new(),
            show_console_view: true,
            show_executions_view: true,
            experimental_module_support: false,
        }
    }

    #[test]
    fn effective_values_follow_the_override_flag_per_field() {
        let dir = tempdir().unwrap();
        let workspace = distinct_workspace();

        let overriding = BuildConfiguration::new(overriding_properties(dir.path()), workspace.clone());
        assert_eq!(
            overriding.gradle_distribution(),
            &GradleDistribution::Version("8.4".to_owned())
        );
        assert_eq!(
            overriding.gradle_user_home(),
            Some(Path::new("/custom/gradle-home"))
        );
        assert_eq!(overriding.java_home(), Some(Path::new("/usr/lib/jvm/java-21")));
        assert!(overriding.offline_mode());
        assert!(overriding.build_scans_enabled());
        assert!(overriding.auto_sync());
        assert_eq!(overriding.arguments(), ["--info".to_owned()]);

        let mut properties = overriding_properties(dir.path());
        properties.override_workspace_settings = false;
        let inheriting = BuildConfiguration::new(properties, workspace.clone());
        assert_eq!(inheriting.gradle_distribution(), &GradleDistribution::Wrapper);
        assert_eq!(
            inheriting.gradle_user_home(),
            Some(Path::new("/workspace/gradle-home"))
        );
        assert_eq!(inheriting.java_home(), None);
        assert!(!inheriting.offline_mode());
        assert!(!inheriting.build_scans_enabled());
        assert_eq!(inheriting.arguments(), ["--quiet".to_owned()]);
        assert!(inheriting.show_console_view());
    }

    #[test]
    fn directory_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let persistence = BuildConfigurationPersistence::new(Arc::new(
            gantry_prefs::FileSystemPreferences::new(),
        ));

        let properties = overriding_properties(dir.path());
        persistence.save_for_directory(dir.path(), &properties).unwrap();
        let loaded = persistence.read_for_directory(dir.path()).unwrap();
        assert_eq!(loaded, properties);
    }

    #[test]
    fn disabling_overrides_deletes_stale_keys() {
        let dir = tempdir().unwrap();
        let persistence = BuildConfigurationPersistence::new(Arc::new(
            gantry_prefs::FileSystemPreferences::new(),
        ));

        persistence
            .save_for_directory(dir.path(), &overriding_properties(dir.path()))
            .unwrap();

        let mut properties = overriding_properties(dir.path());
        properties.override_workspace_settings = false;
        persistence.save_for_directory(dir.path(), &properties).unwrap();

        let store = PropertiesFileStore::for_project_directory(dir.path(), PREF_NODE).unwrap();
        for key in OVERRIDE_ONLY_KEYS {
            assert!(store.read(key).is_err(), "stale key survived: {key}");
        }

        let loaded = persistence.read_for_directory(dir.path()).unwrap();
        assert!(!loaded.override_workspace_settings);
        assert_eq!(loaded.gradle_distribution, GradleDistribution::Wrapper);
    }

    #[test]
    fn override_without_distribution_is_corrupt() {
        let dir = tempdir().unwrap();
        let mut store = PropertiesFileStore::for_project_directory(dir.path(), PREF_NODE).unwrap();
        store.write_bool(OVERRIDE_WORKSPACE_SETTINGS, true);
        store.flush().unwrap();

        let persistence = BuildConfigurationPersistence::new(Arc::new(
            gantry_prefs::FileSystemPreferences::new(),
        ));
        let err = persistence.read_for_directory(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::CorruptConfiguration { .. }));
    }

    #[test]
    fn unparseable_distribution_with_override_is_corrupt() {
        let dir = tempdir().unwrap();
        let mut store = PropertiesFileStore::for_project_directory(dir.path(), PREF_NODE).unwrap();
        store.write_bool(OVERRIDE_WORKSPACE_SETTINGS, true);
        store.write(CONNECTION_GRADLE_DISTRIBUTION, Some("not-a-descriptor"));
        store.flush().unwrap();

        let persistence = BuildConfigurationPersistence::new(Arc::new(
            gantry_prefs::FileSystemPreferences::new(),
        ));
        let err = persistence.read_for_directory(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::CorruptConfiguration { .. }));
    }

    #[test]
    fn cleared_user_home_round_trips_as_none() {
        let dir = tempdir().unwrap();
        let persistence = BuildConfigurationPersistence::new(Arc::new(
            gantry_prefs::FileSystemPreferences::new(),
        ));

        let mut properties = overriding_properties(dir.path());
        properties.gradle_user_home = None;
        persistence.save_for_directory(dir.path(), &properties).unwrap();

        let loaded = persistence.read_for_directory(dir.path()).unwrap();
        assert_eq!(loaded.gradle_user_home, None);

        // The key exists with the sentinel, distinguishing "cleared" from
        // "never written".
        let store = PropertiesFileStore::for_project_directory(dir.path(), PREF_NODE).unwrap();
        assert_eq!(store.read(GRADLE_USER_HOME).unwrap(), None);
    }
}
