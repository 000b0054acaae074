//! OpenShift version handling.
//!
//! Full versions are plain [`semver::Version`]s; this module adds the
//! `major.minor` form customers use to request an upgrade target, and the
//! channel naming convention of the update-graph service.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0:?} is not a major.minor version")]
pub struct ParseMinorError(String);

/// A `major.minor` version pair, e.g. `4.19`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MinorVersion {
    pub major: u64,
    pub minor: u64,
}

impl MinorVersion {
    #[must_use]
    pub fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }

    /// The `major.minor` pair a full version belongs to.
    #[must_use]
    pub fn of(version: &Version) -> Self {
        Self {
            major: version.major,
            minor: version.minor,
        }
    }

    /// The `X.Y.0` baseline of this minor.
    #[must_use]
    pub fn baseline(self) -> Version {
        Version::new(self.major, self.minor, 0)
    }

    /// The next minor in the same major.
    #[must_use]
    pub fn successor(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }

    /// Whether `version` belongs to this minor.
    #[must_use]
    pub fn contains(self, version: &Version) -> bool {
        version.major == self.major && version.minor == self.minor
    }

    /// The update-graph channel for this minor in a channel group,
    /// e.g. `stable-4.19`.
    #[must_use]
    pub fn channel(self, group: &str) -> String {
        format!("{group}-{self}")
    }
}

impl Display for MinorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for MinorVersion {
    type Err = ParseMinorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.split_once('.').ok_or_else(|| ParseMinorError(s.to_owned()))?;
        let parse = |part: &str| {
            if part.is_empty() || part.chars().any(|c| !c.is_ascii_digit()) {
                return Err(ParseMinorError(s.to_owned()));
            }
            part.parse::<u64>().map_err(|_| ParseMinorError(s.to_owned()))
        };
        Ok(Self {
            major: parse(major)?,
            minor: parse(minor)?,
        })
    }
}

impl Serialize for MinorVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MinorVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
