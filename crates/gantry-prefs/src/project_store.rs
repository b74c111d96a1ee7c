use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use gantry_core::ProjectHandle;

use crate::file_store::preference_file;
use crate::{properties, PreferenceStore, PrefsError};

/// The host's project-scoped preference storage.
///
/// Hosts keep one key/value namespace ("node") per project and preference
/// owner. Gantry only ever talks to it through this seam, so any concrete
/// host integration is a pluggable adapter; [`FileSystemPreferences`] is the
/// dependency-free reference implementation.
pub trait ScopedPreferences: Send + Sync {
    /// Loads every entry of `node` for `project`.
    ///
    /// Fails when the namespace cannot be opened, e.g. while the project is
    /// still being imported and the host has not indexed it yet. A node that
    /// was never written is an empty map, not an error.
    fn load_node(
        &self,
        project: &dyn ProjectHandle,
        node: &str,
    ) -> Result<BTreeMap<String, String>, PrefsError>;

    /// Replaces the contents of `node` for `project`.
    fn save_node(
        &self,
        project: &dyn ProjectHandle,
        node: &str,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), PrefsError>;

    /// Unregisters `node` for `project`, discarding its backing storage.
    ///
    /// Hosts auto-register every `.settings/*.prefs` file as a node;
    /// deleting such a file while its node is live corrupts host metadata,
    /// so legacy cleanup must go through this operation first.
    fn remove_node(&self, project: &dyn ProjectHandle, node: &str) -> Result<(), PrefsError>;
}

/// Structured per-project preference store.
///
/// Loads the node eagerly at construction, so an inaccessible namespace
/// fails fast, and buffers writes until `flush`.
pub struct ProjectScopeStore<'a> {
    scope: &'a dyn ScopedPreferences,
    project: &'a dyn ProjectHandle,
    node: &'a str,
    entries: BTreeMap<String, String>,
}

impl std::fmt::Debug for ProjectScopeStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectScopeStore")
            .field("node", &self.node)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl<'a> ProjectScopeStore<'a> {
    pub fn open(
        scope: &'a dyn ScopedPreferences,
        project: &'a dyn ProjectHandle,
        node: &'a str,
    ) -> Result<Self, PrefsError> {
        let entries = scope.load_node(project, node)?;
        Ok(Self {
            scope,
            project,
            node,
            entries,
        })
    }
}

impl PreferenceStore for ProjectScopeStore<'_> {
    fn describe(&self) -> String {
        format!("node `{}` of project `{}`", self.node, self.project.name())
    }

    fn get_raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn set_raw(&mut self, key: &str, raw: String) {
        self.entries.insert(key.to_owned(), raw);
    }

    fn remove_raw(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn flush(&mut self) -> Result<(), PrefsError> {
        self.scope.save_node(self.project, self.node, &self.entries)
    }
}

/// Reference [`ScopedPreferences`] implementation persisting each node at
/// `<project location>/.settings/<node>.prefs`.
///
/// Refuses to touch projects that are not accessible, which is exactly the
/// failure persistence layers recover from by switching to raw file I/O.
#[derive(Debug, Default)]
pub struct FileSystemPreferences;

impl FileSystemPreferences {
    pub fn new() -> Self {
        Self
    }

    fn node_file(project: &dyn ProjectHandle, node: &str) -> PathBuf {
        preference_file(project.location(), node)
    }

    fn require_accessible(project: &dyn ProjectHandle) -> Result<(), PrefsError> {
        if project.is_accessible() {
            Ok(())
        } else {
            Err(PrefsError::ProjectInaccessible {
                project: project.name().to_owned(),
            })
        }
    }
}

impl ScopedPreferences for FileSystemPreferences {
    fn load_node(
        &self,
        project: &dyn ProjectHandle,
        node: &str,
    ) -> Result<BTreeMap<String, String>, PrefsError> {
        Self::require_accessible(project)?;
        let path = Self::node_file(project, node);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(properties::parse(&text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(PrefsError::Load { path, source: err }),
        }
    }

    fn save_node(
        &self,
        project: &dyn ProjectHandle,
        node: &str,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), PrefsError> {
        Self::require_accessible(project)?;
        let path = Self::node_file(project, node);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| PrefsError::Store {
                path: path.clone(),
                source: err,
            })?;
        }
        fs::write(&path, properties::serialize(entries)).map_err(|err| PrefsError::Store {
            path,
            source: err,
        })
    }

    fn remove_node(&self, project: &dyn ProjectHandle, node: &str) -> Result<(), PrefsError> {
        Self::require_accessible(project)?;
        let path = Self::node_file(project, node);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PrefsError::Store { path, source: err }),
        }
    }
}
