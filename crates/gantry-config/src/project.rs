use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use gantry_core::{paths, ProjectHandle};
use gantry_prefs::{PreferenceStore, ProjectScopeStore, PropertiesFileStore, ScopedPreferences};

use crate::build::{BuildConfiguration, CONNECTION_GRADLE_DISTRIBUTION};
use crate::distribution::GradleDistribution;
use crate::error::{with_fallback, ConfigError};
use crate::PREF_NODE;

const PROJECT_PATH: &str = "project.path";
const CONNECTION_PROJECT_DIR: &str = "connection.project.dir";

/// Keys from the single-build-root format that predates build-level
/// storage. Removed on every successful save so nothing reads them stale.
const DEPRECATED_KEYS: [&str; 4] = [
    "connection.gradle.user.home",
    "connection.java.home",
    "connection.jvm.arguments",
    "connection.arguments",
];

/// Location of the legacy JSON marker file, relative to the project.
const LEGACY_MARKER: &str = ".settings/gradle.prefs";
/// The preference node the host auto-registers for the legacy marker.
const LEGACY_NODE: &str = "gradle";
const LEGACY_FORMAT_VERSION: &str = "1.0";

/// A project's position in its build's project tree; the root is `":"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPath(String);

impl ProjectPath {
    pub fn root() -> Self {
        Self(":".to_owned())
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ":"
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The stored per-member-project values: where the project sits in its
/// build, and where that build's root is.
///
/// The root directory is absolute in memory but persisted relative to the
/// project so checked-in metadata survives moving the tree. The
/// distribution descriptor is populated from legacy formats only; current
/// saves never write it; the owning build configuration is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfigurationProperties {
    pub project_path: ProjectPath,
    pub root_project_dir: PathBuf,
    pub gradle_distribution: Option<GradleDistribution>,
}

/// A member project paired with the effective configuration of the build it
/// belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfiguration {
    project_dir: PathBuf,
    project_path: ProjectPath,
    build_configuration: BuildConfiguration,
}

impl ProjectConfiguration {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        project_path: ProjectPath,
        build_configuration: BuildConfiguration,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            project_path,
            build_configuration,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn project_path(&self) -> &ProjectPath {
        &self.project_path
    }

    pub fn build_configuration(&self) -> &BuildConfiguration {
        &self.build_configuration
    }
}

/// Reading, saving and deleting the persisted project → build-root mapping.
///
/// Implemented by the current-format persistence and wrapped by
/// [`LegacyAwareProjectConfigurationPersistence`] for transparent migration.
pub(crate) trait ProjectConfigurationPersistence {
    fn read_for_project(
        &self,
        project: &dyn ProjectHandle,
    ) -> Result<ProjectConfigurationProperties, ConfigError>;

    fn read_for_directory(
        &self,
        dir: &Path,
    ) -> Result<ProjectConfigurationProperties, ConfigError>;

    fn save_for_project(
        &self,
        project: &dyn ProjectHandle,
        properties: &ProjectConfigurationProperties,
    ) -> Result<(), ConfigError>;

    fn save_for_directory(
        &self,
        dir: &Path,
        properties: &ProjectConfigurationProperties,
    ) -> Result<(), ConfigError>;

    fn delete_for_project(&self, project: &dyn ProjectHandle) -> Result<(), ConfigError>;

    fn delete_for_directory(&self, dir: &Path) -> Result<(), ConfigError>;
}

/// Current-format persistence through the preference stores.
pub(crate) struct DefaultProjectConfigurationPersistence {
    scope: Arc<dyn ScopedPreferences>,
}

impl DefaultProjectConfigurationPersistence {
    pub(crate) fn new(scope: Arc<dyn ScopedPreferences>) -> Self {
        Self { scope }
    }
}

impl ProjectConfigurationPersistence for DefaultProjectConfigurationPersistence {
    fn read_for_project(
        &self,
        project: &dyn ProjectHandle,
    ) -> Result<ProjectConfigurationProperties, ConfigError> {
        with_fallback(
            "read project configuration",
            || {
                let store = ProjectScopeStore::open(&*self.scope, project, PREF_NODE)?;
                read_from_store(&store, project.location(), project.name())
            },
            || self.read_for_directory(project.location()),
        )
    }

    fn read_for_directory(
        &self,
        dir: &Path,
    ) -> Result<ProjectConfigurationProperties, ConfigError> {
        let store = PropertiesFileStore::for_project_directory(dir, PREF_NODE)?;
        read_from_store(&store, dir, &dir.display().to_string())
    }

    fn save_for_project(
        &self,
        project: &dyn ProjectHandle,
        properties: &ProjectConfigurationProperties,
    ) -> Result<(), ConfigError> {
        let mut store = ProjectScopeStore::open(&*self.scope, project, PREF_NODE)?;
        save_to_store(&mut store, project.location(), properties)
    }

    fn save_for_directory(
        &self,
        dir: &Path,
        properties: &ProjectConfigurationProperties,
    ) -> Result<(), ConfigError> {
        let mut store = PropertiesFileStore::for_project_directory(dir, PREF_NODE)?;
        save_to_store(&mut store, dir, properties)
    }

    fn delete_for_project(&self, project: &dyn ProjectHandle) -> Result<(), ConfigError> {
        let mut store = ProjectScopeStore::open(&*self.scope, project, PREF_NODE)?;
        delete_from_store(&mut store)
    }

    fn delete_for_directory(&self, dir: &Path) -> Result<(), ConfigError> {
        let mut store = PropertiesFileStore::for_project_directory(dir, PREF_NODE)?;
        delete_from_store(&mut store)
    }
}

fn read_from_store(
    store: &dyn PreferenceStore,
    project_dir: &Path,
    context: &str,
) -> Result<ProjectConfigurationProperties, ConfigError> {
    let path_to_root =
        store
            .read_or(CONNECTION_PROJECT_DIR, None)
            .ok_or_else(|| ConfigError::MissingRootPath {
                project: context.to_owned(),
            })?;
    let root_project_dir = paths::resolve(project_dir, &paths::from_portable_string(&path_to_root));

    let project_path = store
        .read_or(PROJECT_PATH, None)
        .map(ProjectPath::new)
        .unwrap_or_else(ProjectPath::root);

    // Only present in configurations written by old versions; current saves
    // leave the build configuration as the single source of truth.
    let gradle_distribution = store
        .read_or(CONNECTION_GRADLE_DISTRIBUTION, None)
        .and_then(|raw| raw.parse().ok());

    Ok(ProjectConfigurationProperties {
        project_path,
        root_project_dir,
        gradle_distribution,
    })
}

fn save_to_store(
    store: &mut dyn PreferenceStore,
    project_dir: &Path,
    properties: &ProjectConfigurationProperties,
) -> Result<(), ConfigError> {
    let path_to_root = match paths::relative_path(project_dir, &properties.root_project_dir) {
        Ok(relative) => paths::to_portable_string(&relative),
        // No common root (e.g. different drives): fall back to the absolute
        // location.
        Err(_) => paths::to_portable_string(&properties.root_project_dir),
    };
    store.write(PROJECT_PATH, Some(properties.project_path.as_str()));
    store.write(CONNECTION_PROJECT_DIR, Some(&path_to_root));
    store.flush()?;
    Ok(())
}

fn delete_from_store(store: &mut dyn PreferenceStore) -> Result<(), ConfigError> {
    store.delete(PROJECT_PATH);
    store.delete(CONNECTION_PROJECT_DIR);
    store.flush()?;
    Ok(())
}

/// Decorates the current-format persistence with detection, migration and
/// cleanup of the legacy JSON marker format.
///
/// Reads prefer a legacy marker when one is present but never modify it;
/// the migration itself happens on the next successful save, after which
/// the configuration can only ever be in the current format.
pub(crate) struct LegacyAwareProjectConfigurationPersistence<P> {
    delegate: P,
    scope: Arc<dyn ScopedPreferences>,
}

impl<P: ProjectConfigurationPersistence> LegacyAwareProjectConfigurationPersistence<P> {
    pub(crate) fn new(delegate: P, scope: Arc<dyn ScopedPreferences>) -> Self {
        Self { delegate, scope }
    }

    fn remove_legacy_marker(
        &self,
        project: Option<&dyn ProjectHandle>,
        marker: &Path,
    ) -> Result<(), ConfigError> {
        // The host auto-loads `.settings/*.prefs` files as preference
        // nodes; the node must be unregistered before the file disappears
        // or the host's backing store is left pointing at nothing.
        if let Some(project) = project {
            self.scope.remove_node(project, LEGACY_NODE)?;
        }
        match fs::remove_file(marker) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ConfigError::Io {
                path: marker.to_path_buf(),
                source: err,
            }),
        }
    }

    fn cleanup_deprecated_keys(&self, project: Option<&dyn ProjectHandle>, dir: &Path) {
        let result = (|| -> Result<(), ConfigError> {
            match project {
                Some(project) => {
                    let mut store = ProjectScopeStore::open(&*self.scope, project, PREF_NODE)?;
                    delete_deprecated(&mut store)
                }
                None => {
                    let mut store = PropertiesFileStore::for_project_directory(dir, PREF_NODE)?;
                    delete_deprecated(&mut store)
                }
            }
        })();
        if let Err(err) = result {
            tracing::warn!(
                project = %dir.display(),
                error = %err,
                "cannot clean up deprecated configuration keys"
            );
        }
    }
}

fn delete_deprecated(store: &mut dyn PreferenceStore) -> Result<(), ConfigError> {
    for key in DEPRECATED_KEYS {
        store.delete(key);
    }
    store.flush()?;
    Ok(())
}

fn legacy_marker(project_dir: &Path) -> PathBuf {
    project_dir.join(LEGACY_MARKER)
}

#[derive(Debug, Deserialize)]
struct LegacyProjectConfig {
    project_path: Option<String>,
    connection_project_dir: Option<String>,
    connection_gradle_distribution: Option<String>,
}

fn read_legacy(
    project_dir: &Path,
    context: &str,
) -> Result<ProjectConfigurationProperties, ConfigError> {
    let path = legacy_marker(project_dir);
    let text = fs::read_to_string(&path).map_err(|err| ConfigError::Io {
        path: path.clone(),
        source: err,
    })?;

    let versions: std::collections::BTreeMap<String, LegacyProjectConfig> =
        serde_json::from_str(&text).map_err(|err| ConfigError::LegacyFormat {
            path: path.clone(),
            source: err,
        })?;
    let config = versions
        .get(LEGACY_FORMAT_VERSION)
        .ok_or(ConfigError::LegacyVersion { path })?;

    let raw_root =
        config
            .connection_project_dir
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRootPath {
                project: context.to_owned(),
            })?;
    let root_project_dir = paths::resolve(project_dir, &paths::from_portable_string(raw_root));

    Ok(ProjectConfigurationProperties {
        project_path: config
            .project_path
            .clone()
            .map(ProjectPath::new)
            .unwrap_or_else(ProjectPath::root),
        root_project_dir,
        gradle_distribution: config
            .connection_gradle_distribution
            .as_deref()
            .and_then(|raw| raw.parse().ok()),
    })
}

impl<P: ProjectConfigurationPersistence> ProjectConfigurationPersistence
    for LegacyAwareProjectConfigurationPersistence<P>
{
    fn read_for_project(
        &self,
        project: &dyn ProjectHandle,
    ) -> Result<ProjectConfigurationProperties, ConfigError> {
        if legacy_marker(project.location()).exists() {
            return read_legacy(project.location(), project.name());
        }
        self.delegate.read_for_project(project)
    }

    fn read_for_directory(
        &self,
        dir: &Path,
    ) -> Result<ProjectConfigurationProperties, ConfigError> {
        if legacy_marker(dir).exists() {
            return read_legacy(dir, &dir.display().to_string());
        }
        self.delegate.read_for_directory(dir)
    }

    fn save_for_project(
        &self,
        project: &dyn ProjectHandle,
        properties: &ProjectConfigurationProperties,
    ) -> Result<(), ConfigError> {
        let marker = legacy_marker(project.location());
        if marker.exists() {
            self.remove_legacy_marker(Some(project), &marker)?;
            tracing::debug!(
                project = project.name(),
                "migrated legacy project configuration"
            );
        }
        self.delegate.save_for_project(project, properties)?;
        self.cleanup_deprecated_keys(Some(project), project.location());
        Ok(())
    }

    fn save_for_directory(
        &self,
        dir: &Path,
        properties: &ProjectConfigurationProperties,
    ) -> Result<(), ConfigError> {
        let marker = legacy_marker(dir);
        if marker.exists() {
            self.remove_legacy_marker(None, &marker)?;
            tracing::debug!(
                project = %dir.display(),
                "migrated legacy project configuration"
            );
        }
        self.delegate.save_for_directory(dir, properties)?;
        self.cleanup_deprecated_keys(None, dir);
        Ok(())
    }

    fn delete_for_project(&self, project: &dyn ProjectHandle) -> Result<(), ConfigError> {
        self.delegate.delete_for_project(project)?;
        let marker = legacy_marker(project.location());
        if marker.exists() {
            self.remove_legacy_marker(Some(project), &marker)?;
        }
        Ok(())
    }

    fn delete_for_directory(&self, dir: &Path) -> Result<(), ConfigError> {
        self.delegate.delete_for_directory(dir)?;
        let marker = legacy_marker(dir);
        if marker.exists() {
            self.remove_legacy_marker(None, &marker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_prefs::FileSystemPreferences;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    struct FakeProject {
        name: String,
        location: PathBuf,
        accessible: bool,
    }

    impl ProjectHandle for FakeProject {
        fn location(&self) -> &Path {
            &self.location
        }

        fn is_accessible(&self) -> bool {
            self.accessible
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn scope() -> Arc<dyn ScopedPreferences> {
        Arc::new(FileSystemPreferences::new())
    }

    fn current_persistence() -> DefaultProjectConfigurationPersistence {
        DefaultProjectConfigurationPersistence::new(scope())
    }

    fn legacy_aware(
    ) -> LegacyAwareProjectConfigurationPersistence<DefaultProjectConfigurationPersistence> {
        LegacyAwareProjectConfigurationPersistence::new(current_persistence(), scope())
    }

    #[test]
    fn round_trips_and_stores_a_relative_root_path() {
        let dir = tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let root = base.join("build");
        let project_dir = root.join("sub").join("app");
        fs::create_dir_all(&project_dir).unwrap();

        let persistence = current_persistence();
        let properties = ProjectConfigurationProperties {
            project_path: ProjectPath::new(":sub:app"),
            root_project_dir: paths::canonicalize(&root),
            gradle_distribution: None,
        };
        persistence
            .save_for_directory(&project_dir, &properties)
            .unwrap();

        let store = PropertiesFileStore::for_project_directory(&project_dir, PREF_NODE).unwrap();
        assert_eq!(
            store.read(CONNECTION_PROJECT_DIR).unwrap(),
            Some("../..".to_owned())
        );

        let loaded = persistence.read_for_directory(&project_dir).unwrap();
        assert_eq!(loaded.project_path, ProjectPath::new(":sub:app"));
        assert_eq!(loaded.root_project_dir, paths::canonicalize(&root));
    }

    #[test]
    fn missing_root_path_is_an_error() {
        let dir = tempdir().unwrap();
        let err = current_persistence()
            .read_for_directory(dir.path())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRootPath { .. }));
    }

    #[test]
    fn inaccessible_project_falls_back_to_the_flat_file() {
        let dir = tempdir().unwrap();
        let persistence = current_persistence();

        let properties = ProjectConfigurationProperties {
            project_path: ProjectPath::root(),
            root_project_dir: paths::canonicalize(dir.path()),
            gradle_distribution: None,
        };
        persistence
            .save_for_directory(dir.path(), &properties)
            .unwrap();

        let importing = FakeProject {
            name: "app".to_owned(),
            location: dir.path().to_path_buf(),
            accessible: false,
        };
        let loaded = persistence.read_for_project(&importing).unwrap();
        assert_eq!(loaded, properties);
    }

    fn write_legacy_marker(project_dir: &Path, connection_project_dir: &str) {
        let settings = project_dir.join(".settings");
        fs::create_dir_all(&settings).unwrap();
        fs::write(
            settings.join("gradle.prefs"),
            format!(
                concat!(
                    "{{\n  \"1.0\": {{\n",
                    "    \"project_path\": \":\",\n",
                    "    \"project_dir\": \"{dir}\",\n",
                    "    \"connection_project_dir\": \"{root}\",\n",
                    "    \"connection_gradle_user_home\": null,\n",
                    "    \"connection_gradle_distribution\": \"GRADLE_DISTRIBUTION(VERSION(2.3))\",\n",
                    "    \"connection_java_home\": null,\n",
                    "    \"connection_jvm_arguments\": \"\",\n",
                    "    \"connection_arguments\": \"\"\n",
                    "  }}\n}}\n"
                ),
                dir = project_dir.display(),
                root = connection_project_dir,
            ),
        )
        .unwrap();
    }

    #[test]
    fn legacy_marker_wins_on_read_and_is_not_deleted() {
        let dir = tempdir().unwrap();
        write_legacy_marker(dir.path(), ".");

        let persistence = legacy_aware();
        let loaded = persistence.read_for_directory(dir.path()).unwrap();
        assert!(loaded.project_path.is_root());
        assert_eq!(loaded.root_project_dir, paths::normalize(dir.path()));
        assert_eq!(
            loaded.gradle_distribution,
            Some(GradleDistribution::Version("2.3".to_owned()))
        );
        assert!(legacy_marker(dir.path()).exists());
    }

    #[test]
    fn save_migrates_the_legacy_marker() {
        let dir = tempdir().unwrap();
        write_legacy_marker(dir.path(), ".");

        let project = FakeProject {
            name: "app".to_owned(),
            location: dir.path().to_path_buf(),
            accessible: true,
        };
        let persistence = legacy_aware();
        let before = persistence.read_for_project(&project).unwrap();

        // Seed a deprecated key so cleanup is observable.
        let scope = scope();
        let mut store = ProjectScopeStore::open(&*scope, &project, PREF_NODE).unwrap();
        store.write("connection.java.home", Some("/usr/lib/jvm/java-8"));
        store.flush().unwrap();

        let properties = ProjectConfigurationProperties {
            project_path: before.project_path.clone(),
            root_project_dir: before.root_project_dir.clone(),
            gradle_distribution: None,
        };
        persistence.save_for_project(&project, &properties).unwrap();

        assert!(!legacy_marker(dir.path()).exists());
        let store = PropertiesFileStore::for_project_directory(dir.path(), PREF_NODE).unwrap();
        assert_eq!(store.read(PROJECT_PATH).unwrap(), Some(":".to_owned()));
        assert!(store.read(CONNECTION_PROJECT_DIR).is_ok());
        for key in DEPRECATED_KEYS {
            assert!(store.read(key).is_err(), "deprecated key survived: {key}");
        }

        // The logical configuration is unchanged by the migration.
        let after = persistence.read_for_project(&project).unwrap();
        assert_eq!(after.project_path, before.project_path);
        assert_eq!(after.root_project_dir, before.root_project_dir);
    }

    #[test]
    fn legacy_file_without_known_version_is_rejected() {
        let dir = tempdir().unwrap();
        let settings = dir.path().join(".settings");
        fs::create_dir_all(&settings).unwrap();
        fs::write(settings.join("gradle.prefs"), "{\"0.9\": {}}").unwrap();

        let err = legacy_aware().read_for_directory(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::LegacyVersion { .. }));
    }

    #[test]
    fn delete_removes_current_keys_and_any_legacy_marker() {
        let dir = tempdir().unwrap();
        let persistence = legacy_aware();

        let properties = ProjectConfigurationProperties {
            project_path: ProjectPath::root(),
            root_project_dir: paths::canonicalize(dir.path()),
            gradle_distribution: None,
        };
        persistence
            .save_for_directory(dir.path(), &properties)
            .unwrap();
        write_legacy_marker(dir.path(), ".");

        persistence.delete_for_directory(dir.path()).unwrap();
        assert!(!legacy_marker(dir.path()).exists());
        let store = PropertiesFileStore::for_project_directory(dir.path(), PREF_NODE).unwrap();
        assert!(store.read(PROJECT_PATH).is_err());
        assert!(store.read(CONNECTION_PROJECT_DIR).is_err());
    }
}
