//! Layered build and run configuration for Gantry.
//!
//! Configuration is resolved top-down through three layers:
//!
//! 1. the process-wide [`WorkspaceConfiguration`] defaults,
//! 2. a per-build-root [`BuildConfiguration`] that may override any
//!    workspace setting,
//! 3. a per-launch [`RunConfiguration`] that may override any build
//!    setting.
//!
//! Each layer stores an override flag next to its values; a disabled flag
//! means *every* field of that layer falls back to the layer below, never a
//! subset. The [`ConfigurationManager`] facade owns loading, saving and the
//! migration of historical on-disk formats.

mod build;
mod distribution;
mod error;
mod manager;
mod project;
mod run;
mod workspace;

pub use build::{BuildConfiguration, BuildConfigurationProperties};
pub use distribution::{DistributionParseError, GradleDistribution};
pub use error::ConfigError;
pub use manager::{BuildConfigurationOpts, ConfigurationManager};
pub use project::{ProjectConfiguration, ProjectConfigurationProperties, ProjectPath};
pub use run::{LaunchAttributes, RunConfiguration, RunConfigurationProperties};
pub use workspace::WorkspaceConfiguration;

/// The preference node (and `.prefs` file stem) holding Gantry's
/// configuration.
pub(crate) const PREF_NODE: &str = "gantry";
