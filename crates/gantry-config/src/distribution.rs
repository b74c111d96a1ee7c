use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use gantry_core::paths;

/// Selects which Gradle distribution the connector runs a build with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GradleDistribution {
    /// The distribution configured by the target build's wrapper.
    #[default]
    Wrapper,
    /// A Gradle installation on the local disk.
    LocalInstallation(PathBuf),
    /// A distribution archive downloaded from a URI.
    RemoteDistribution(String),
    /// A released Gradle version, downloaded on demand.
    Version(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid Gradle distribution descriptor `{0}`")]
pub struct DistributionParseError(pub String);

impl fmt::Display for GradleDistribution {
    /// Renders the stable descriptor format used in preference storage.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradleDistribution::Wrapper => write!(f, "GRADLE_DISTRIBUTION(WRAPPER)"),
            GradleDistribution::LocalInstallation(dir) => write!(
                f,
                "GRADLE_DISTRIBUTION(LOCAL_INSTALLATION({}))",
                paths::to_portable_string(dir)
            ),
            GradleDistribution::RemoteDistribution(uri) => {
                write!(f, "GRADLE_DISTRIBUTION(REMOTE_DISTRIBUTION({uri}))")
            }
            GradleDistribution::Version(version) => {
                write!(f, "GRADLE_DISTRIBUTION(VERSION({version}))")
            }
        }
    }
}

impl FromStr for GradleDistribution {
    type Err = DistributionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DistributionParseError(s.to_owned());

        let body = s
            .strip_prefix("GRADLE_DISTRIBUTION(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;

        if body == "WRAPPER" {
            return Ok(GradleDistribution::Wrapper);
        }
        if let Some(config) = argument_of(body, "LOCAL_INSTALLATION") {
            if config.is_empty() {
                return Err(invalid());
            }
            return Ok(GradleDistribution::LocalInstallation(
                paths::from_portable_string(config),
            ));
        }
        if let Some(config) = argument_of(body, "REMOTE_DISTRIBUTION") {
            if config.is_empty() {
                return Err(invalid());
            }
            return Ok(GradleDistribution::RemoteDistribution(config.to_owned()));
        }
        if let Some(config) = argument_of(body, "VERSION") {
            if config.is_empty() {
                return Err(invalid());
            }
            return Ok(GradleDistribution::Version(config.to_owned()));
        }
        Err(invalid())
    }
}

fn argument_of<'a>(body: &'a str, kind: &str) -> Option<&'a str> {
    body.strip_prefix(kind)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
}
