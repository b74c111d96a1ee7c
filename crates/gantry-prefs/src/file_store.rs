use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{properties, PreferenceStore, PrefsError};

/// The directory holding per-project preference files.
pub(crate) const SETTINGS_DIR: &str = ".settings";

/// Flat-file preference store at `<dir>/.settings/<node>.prefs`.
///
/// The file is read in full at construction and rewritten in full on
/// [`flush`](PreferenceStore::flush); no handle is kept in between. A
/// missing file is an empty store (reads of required keys then fail with
/// `KeyNotFound`); an unreadable existing file fails construction.
#[derive(Debug)]
pub struct PropertiesFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl PropertiesFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => properties::parse(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(PrefsError::Load { path, source: err });
            }
        };
        Ok(Self { path, entries })
    }

    /// Opens the store for `node` under a project directory.
    pub fn for_project_directory(dir: &Path, node: &str) -> Result<Self, PrefsError> {
        Self::new(preference_file(dir, node))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The preference file backing `node` under `dir`.
pub fn preference_file(dir: &Path, node: &str) -> PathBuf {
    dir.join(SETTINGS_DIR).join(format!("{node}.prefs"))
}

impl PreferenceStore for PropertiesFileStore {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
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
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| PrefsError::Store {
                path: self.path.clone(),
                source: err,
            })?;
        }
        fs::write(&self.path, properties::serialize(&self.entries)).map_err(|err| {
            PrefsError::Store {
                path: self.path.clone(),
                source: err,
            }
        })
    }
}
