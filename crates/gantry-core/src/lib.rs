//! Core shared abstractions for Gantry.
//!
//! This crate is intentionally small: it defines the narrow host-facing
//! seams the rest of Gantry is written against, plus the path arithmetic
//! used to persist build-root references portably.

use std::path::Path;
use std::sync::Arc;

pub mod paths;

/// A workspace project as the host sees it.
///
/// This is the only part of the host resource model Gantry depends on: a
/// project has a name, a location on disk, and may be temporarily
/// inaccessible (for example while it is still being imported/indexed).
pub trait ProjectHandle: Send + Sync {
    /// The project's directory on disk.
    fn location(&self) -> &Path;

    /// Whether the host has finished loading the project.
    ///
    /// Persistence falls back to raw file I/O for inaccessible projects.
    fn is_accessible(&self) -> bool;

    /// The host-visible project name, used in diagnostics.
    fn name(&self) -> &str;
}

/// Lookup of live project handles by directory.
pub trait ProjectRegistry: Send + Sync {
    /// Returns the project located exactly at `dir`, if the host knows one.
    fn project_at(&self, dir: &Path) -> Option<Arc<dyn ProjectHandle>>;
}
