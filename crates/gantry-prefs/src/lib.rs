//! Key/value preference storage for Gantry.
//!
//! Configuration is persisted through the [`PreferenceStore`] contract,
//! which has two backends:
//!
//! - [`ProjectScopeStore`]: the host's structured per-project preference
//!   namespace, reached through the pluggable [`ScopedPreferences`] seam;
//! - [`PropertiesFileStore`]: a flat `key=value` file at
//!   `<dir>/.settings/<node>.prefs`, used directly for directories without a
//!   live project handle and as the fallback while a project is still being
//!   imported.
//!
//! Both backends read their entire contents eagerly at construction and
//! buffer writes until [`PreferenceStore::flush`], so a store instance is
//! cheap to create per operation and never holds an open file handle.
//!
//! A stored literal `"null"` round-trips to an absent value, which lets
//! "explicitly cleared" be distinguished from "never written".

use std::io;
use std::path::PathBuf;

use thiserror::Error;

mod file_store;
mod project_store;
pub mod properties;

pub use file_store::PropertiesFileStore;
pub use project_store::{FileSystemPreferences, ProjectScopeStore, ScopedPreferences};

/// The raw representation of an absent value.
const NULL_SENTINEL: &str = "null";

/// Translates a raw stored value into a logical one.
pub fn from_raw_value(raw: &str) -> Option<String> {
    if raw == NULL_SENTINEL {
        None
    } else {
        Some(raw.to_owned())
    }
}

/// Translates a logical value into its raw stored representation.
pub fn to_raw_value(value: Option<&str>) -> String {
    value.unwrap_or(NULL_SENTINEL).to_owned()
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("preference key `{key}` is missing from {store}")]
    KeyNotFound { key: String, store: String },

    #[error("project `{project}` is not accessible")]
    ProjectInaccessible { project: String },

    #[error("cannot read preferences from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot store preferences in {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("preference node `{node}` of project `{project}`: {message}")]
    Node {
        node: String,
        project: String,
        message: String,
    },
}

impl PrefsError {
    /// Whether this failure means the store could not be *opened*, the one
    /// situation persistence layers may recover from by switching to the
    /// flat-file backend. Write failures and missing keys are not
    /// recoverable: masking them would hide corruption.
    pub fn is_recoverable_open_failure(&self) -> bool {
        matches!(
            self,
            PrefsError::ProjectInaccessible { .. }
                | PrefsError::Load { .. }
                | PrefsError::Node { .. }
        )
    }
}

/// Uniform access to a named preference namespace.
///
/// Backends implement the four raw accessors; the typed read/write helpers
/// are shared so the `"null"` sentinel and boolean conventions behave
/// identically everywhere.
pub trait PreferenceStore {
    /// Human-readable identity of this store, used in error messages.
    fn describe(&self) -> String;

    fn get_raw(&self, key: &str) -> Option<&str>;

    fn set_raw(&mut self, key: &str, raw: String);

    fn remove_raw(&mut self, key: &str);

    /// Persists all buffered changes.
    fn flush(&mut self) -> Result<(), PrefsError>;

    /// Reads a value. Fails with [`PrefsError::KeyNotFound`] when the key is
    /// absent; returns `Ok(None)` when the stored value is the `"null"`
    /// sentinel.
    fn read(&self, key: &str) -> Result<Option<String>, PrefsError> {
        match self.get_raw(key) {
            Some(raw) => Ok(from_raw_value(raw)),
            None => Err(PrefsError::KeyNotFound {
                key: key.to_owned(),
                store: self.describe(),
            }),
        }
    }

    /// Reads a value, substituting `default` when the key is absent. The
    /// sentinel translation applies to the default as well.
    fn read_or(&self, key: &str, default: Option<&str>) -> Option<String> {
        match self.get_raw(key) {
            Some(raw) => from_raw_value(raw),
            None => default.and_then(from_raw_value),
        }
    }

    /// Reads a boolean. Missing keys yield `default`; any stored value other
    /// than `true` (case-insensitive) is `false`.
    fn read_bool(&self, key: &str, default: bool) -> bool {
        match self.get_raw(key) {
            Some(raw) => raw.eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    /// Writes a value; `None` is stored as the `"null"` sentinel.
    fn write(&mut self, key: &str, value: Option<&str>) {
        self.set_raw(key, to_raw_value(value));
    }

    fn write_bool(&mut self, key: &str, value: bool) {
        self.write(key, Some(if value { "true" } else { "false" }));
    }

    /// Removes a key. No-op when the key does not exist.
    fn delete(&mut self, key: &str) {
        self.remove_raw(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct MapStore(BTreeMap<String, String>);

    impl PreferenceStore for MapStore {
        fn describe(&self) -> String {
            "test store".to_owned()
        }

        fn get_raw(&self, key: &str) -> Option<&str> {
            self.0.get(key).map(String::as_str)
        }

        fn set_raw(&mut self, key: &str, raw: String) {
            self.0.insert(key.to_owned(), raw);
        }

        fn remove_raw(&mut self, key: &str) {
            self.0.remove(key);
        }

        fn flush(&mut self) -> Result<(), PrefsError> {
            Ok(())
        }
    }

    #[test]
    fn null_sentinel_round_trips_to_absent_value() {
        let mut store = MapStore(BTreeMap::new());
        store.write("user.home", None);
        assert_eq!(store.read("user.home").unwrap(), None);
        assert_eq!(store.get_raw("user.home"), Some("null"));
    }

    #[test]
    fn missing_key_is_an_error_not_a_null() {
        let store = MapStore(BTreeMap::new());
        let err = store.read("anything").unwrap_err();
        assert!(matches!(err, PrefsError::KeyNotFound { .. }));
    }

    #[test]
    fn read_or_applies_sentinel_to_defaults() {
        let store = MapStore(BTreeMap::new());
        assert_eq!(store.read_or("k", Some("null")), None);
        assert_eq!(store.read_or("k", Some("v")), Some("v".to_owned()));
        assert_eq!(store.read_or("k", None), None);
    }

    #[test]
    fn booleans_follow_parse_boolean_semantics() {
        let mut store = MapStore(BTreeMap::new());
        assert!(store.read_bool("missing", true));
        store.write_bool("flag", true);
        assert!(store.read_bool("flag", false));
        store.set_raw("flag", "TRUE".to_owned());
        assert!(store.read_bool("flag", false));
        store.set_raw("flag", "yes".to_owned());
        assert!(!store.read_bool("flag", true));
    }

    #[test]
    fn delete_is_a_no_op_for_absent_keys() {
        let mut store = MapStore(BTreeMap::new());
        store.delete("ghost");
        store.write("k", Some("v"));
        store.delete("k");
        assert!(store.read("k").is_err());
    }
}
