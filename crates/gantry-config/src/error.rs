use std::io;
use std::path::PathBuf;

use thiserror::Error;

use gantry_prefs::PrefsError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("build root directory {path} does not exist")]
    DirectoryNotFound { path: PathBuf },

    #[error("invalid build configuration for {path}: workspace overrides are enabled but no Gradle distribution is set")]
    CorruptConfiguration { path: PathBuf },

    #[error("cannot read build root location for project `{project}`")]
    MissingRootPath { project: String },

    #[error("cannot parse legacy configuration {path}: {source}")]
    LegacyFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("legacy configuration {path} has no supported format version")]
    LegacyVersion { path: PathBuf },

    #[error("configuration I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Prefs(#[from] PrefsError),
}

impl ConfigError {
    /// Whether this failure means a structured store could not be opened,
    /// the only condition the flat-file fallback is allowed to mask.
    pub(crate) fn is_recoverable_open_failure(&self) -> bool {
        matches!(self, ConfigError::Prefs(err) if err.is_recoverable_open_failure())
    }
}

/// Runs `primary`, retrying with `fallback` only when the failure is a
/// recoverable store-open error (e.g. the project is mid-import and the
/// host's namespace is not available yet).
///
/// Every dual structured-store/flat-file code path goes through here so the
/// two branches stay equivalent.
pub(crate) fn with_fallback<T>(
    what: &str,
    primary: impl FnOnce() -> Result<T, ConfigError>,
    fallback: impl FnOnce() -> Result<T, ConfigError>,
) -> Result<T, ConfigError> {
    match primary() {
        Ok(value) => Ok(value),
        Err(err) if err.is_recoverable_open_failure() => {
            tracing::trace!(operation = what, error = %err, "structured store unavailable, using flat-file fallback");
            fallback()
        }
        Err(err) => Err(err),
    }
}
