use std::path::{Path, PathBuf};

use gantry_prefs::{PreferenceStore, PropertiesFileStore};

use crate::distribution::GradleDistribution;
use crate::error::ConfigError;
use crate::PREF_NODE;

const GRADLE_DISTRIBUTION: &str = "gradle.distribution";
const GRADLE_USER_HOME: &str = "gradle.user.home";
const JAVA_HOME: &str = "java.home";
const GRADLE_OFFLINE_MODE: &str = "gradle.offline.mode";
const GRADLE_BUILD_SCANS: &str = "gradle.build.scans";
const AUTO_SYNC: &str = "auto.sync";
const ARGUMENTS: &str = "arguments";
const JVM_ARGUMENTS: &str = "jvm.arguments";
const SHOW_CONSOLE_VIEW: &str = "show.console.view";
const SHOW_EXECUTIONS_VIEW: &str = "show.executions.view";
const EXPERIMENTAL_MODULE_SUPPORT: &str = "experimental.module.support";

/// Workspace-level argument lists are joined on the platform path-list
/// separator so individual arguments may contain spaces.
#[cfg(windows)]
const LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
const LIST_SEPARATOR: char = ':';

/// The process-wide default configuration every build starts from.
///
/// There is exactly one logical instance per workspace; it is loaded at
/// startup and mutated only through
/// [`ConfigurationManager::save_workspace_configuration`](crate::ConfigurationManager::save_workspace_configuration).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceConfiguration {
    pub gradle_distribution: GradleDistribution,
    pub gradle_user_home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub offline_mode: bool,
    pub build_scans_enabled: bool,
    pub auto_sync: bool,
    pub arguments: Vec<String>,
    pub jvm_arguments: Vec<String>,
    pub show_console_view: bool,
    pub show_executions_view: bool,
    pub experimental_module_support: bool,
}

impl Default for WorkspaceConfiguration {
    fn default() -> Self {
        Self {
            gradle_distribution: GradleDistribution::default(),
            gradle_user_home: None,
            java_home: None,
            offline_mode: false,
            build_scans_enabled: false,
            auto_sync: false,
            arguments: Vec::new(),
            jvm_arguments: Vec::new(),
            show_console_view: true,
            show_executions_view: true,
            experimental_module_support: false,
        }
    }
}

/// Reads and writes the workspace configuration in the workspace state
/// directory.
pub(crate) struct WorkspaceConfigurationPersistence {
    state_dir: PathBuf,
}

impl WorkspaceConfigurationPersistence {
    pub(crate) fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub(crate) fn read(&self) -> Result<WorkspaceConfiguration, ConfigError> {
        let store = self.open_store()?;
        let defaults = WorkspaceConfiguration::default();

        // An unparseable stored distribution falls back to the default
        // rather than making the whole workspace unusable.
        let gradle_distribution = store
            .read_or(GRADLE_DISTRIBUTION, None)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();

        Ok(WorkspaceConfiguration {
            gradle_distribution,
            gradle_user_home: read_path(&store, GRADLE_USER_HOME),
            java_home: read_path(&store, JAVA_HOME),
            offline_mode: store.read_bool(GRADLE_OFFLINE_MODE, defaults.offline_mode),
            build_scans_enabled: store.read_bool(GRADLE_BUILD_SCANS, defaults.build_scans_enabled),
            auto_sync: store.read_bool(AUTO_SYNC, defaults.auto_sync),
            arguments: read_list(&store, ARGUMENTS),
            jvm_arguments: read_list(&store, JVM_ARGUMENTS),
            show_console_view: store.read_bool(SHOW_CONSOLE_VIEW, defaults.show_console_view),
            show_executions_view: store
                .read_bool(SHOW_EXECUTIONS_VIEW, defaults.show_executions_view),
            experimental_module_support: store
                .read_bool(EXPERIMENTAL_MODULE_SUPPORT, defaults.experimental_module_support),
        })
    }

    pub(crate) fn save(&self, config: &WorkspaceConfiguration) -> Result<(), ConfigError> {
        let mut store = self.open_store()?;
        store.write(
            GRADLE_DISTRIBUTION,
            Some(&config.gradle_distribution.to_string()),
        );
        write_path(&mut store, GRADLE_USER_HOME, config.gradle_user_home.as_deref());
        write_path(&mut store, JAVA_HOME, config.java_home.as_deref());
        store.write_bool(GRADLE_OFFLINE_MODE, config.offline_mode);
        store.write_bool(GRADLE_BUILD_SCANS, config.build_scans_enabled);
        store.write_bool(AUTO_SYNC, config.auto_sync);
        store.write(ARGUMENTS, Some(&join_list(&config.arguments)));
        store.write(JVM_ARGUMENTS, Some(&join_list(&config.jvm_arguments)));
        store.write_bool(SHOW_CONSOLE_VIEW, config.show_console_view);
        store.write_bool(SHOW_EXECUTIONS_VIEW, config.show_executions_view);
        store.write_bool(EXPERIMENTAL_MODULE_SUPPORT, config.experimental_module_support);
        store.flush()?;
        Ok(())
    }

    fn open_store(&self) -> Result<PropertiesFileStore, ConfigError> {
        Ok(PropertiesFileStore::for_project_directory(
            &self.state_dir,
            PREF_NODE,
        )?)
    }
}

fn read_path(store: &PropertiesFileStore, key: &str) -> Option<PathBuf> {
    store
        .read_or(key, None)
        .filter(|value| !value.is_empty())
        .map(|value| gantry_core::paths::from_portable_string(&value))
}

// Instance-scope values have no sentinel convention: absence encodes `None`.
fn write_path(store: &mut PropertiesFileStore, key: &str, value: Option<&Path>) {
    match value {
        Some(path) => store.write(key, Some(&gantry_core::paths::to_portable_string(path))),
        None => store.delete(key),
    }
}

fn read_list(store: &PropertiesFileStore, key: &str) -> Vec<String> {
    store
        .read_or(key, Some(""))
        .map(|raw| split_list(&raw))
        .unwrap_or_default()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(LIST_SEPARATOR)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn join_list(items: &[String]) -> String {
    items.join(&LIST_SEPARATOR.to_string())
}
