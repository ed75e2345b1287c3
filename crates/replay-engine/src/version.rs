//! Engine versions and the package aliases they install under.

use std::fmt;
use std::str::FromStr;

/// Version of the rendering engine that produced a report.
///
/// Either `major.minor.patch` (with an optional pre-release or build suffix)
/// or a bare major version. The value ends up in package specifiers and
/// directory names, so only `[0-9A-Za-z.+-]` is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionIdentifier {
    raw: String,
    major: u64,
}

/// Error parsing a [`VersionIdentifier`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version is empty")]
    Empty,
    #[error("version {0:?} does not start with a numeric major component")]
    InvalidMajor(String),
    #[error("version {version:?} contains invalid character {ch:?}")]
    InvalidCharacter { version: String, ch: char },
}

impl VersionIdentifier {
    /// Parse a version string.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        if raw.is_empty() {
            return Err(VersionError::Empty);
        }

        if let Some(ch) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+')))
        {
            return Err(VersionError::InvalidCharacter {
                version: raw.to_owned(),
                ch,
            });
        }

        let major_part = raw.split(['.', '-', '+']).next().unwrap_or_default();
        let major = major_part
            .parse::<u64>()
            .map_err(|_| VersionError::InvalidMajor(raw.to_owned()))?;

        Ok(Self {
            raw: raw.to_owned(),
            major,
        })
    }

    /// The version string as written in the report.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Major version component.
    pub fn major(&self) -> u64 {
        self.major
    }

    /// True if the version names only a major release (e.g. `"10"`).
    pub fn is_bare_major(&self) -> bool {
        self.raw == self.major.to_string()
    }
}

impl FromStr for VersionIdentifier {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// What an alias pins.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AliasKind {
    /// `<package>-<version>`: one exact release.
    Exact(VersionIdentifier),
    /// `<package>-<major>`: some release of a major line.
    Major(u64),
    /// `<package>`: whatever release was installed as the default.
    Default,
}

/// Locally resolvable package name of an installed engine version.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageAlias {
    name: String,
    kind: AliasKind,
}

impl PackageAlias {
    /// Alias pinning an exact version.
    pub fn exact(package: &str, version: &VersionIdentifier) -> Self {
        Self {
            name: format!("{package}-{version}"),
            kind: AliasKind::Exact(version.clone()),
        }
    }

    /// Alias pinning a major version line.
    pub fn major(package: &str, major: u64) -> Self {
        Self {
            name: format!("{package}-{major}"),
            kind: AliasKind::Major(major),
        }
    }

    /// The unversioned default package.
    pub fn default_package(package: &str) -> Self {
        Self {
            name: package.to_owned(),
            kind: AliasKind::Default,
        }
    }

    /// Directory name under `node_modules`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &AliasKind {
        &self.kind
    }

    /// Major version this alias pins, if any.
    pub fn pinned_major(&self) -> Option<u64> {
        match &self.kind {
            AliasKind::Exact(version) => Some(version.major()),
            AliasKind::Major(major) => Some(*major),
            AliasKind::Default => None,
        }
    }

    pub fn is_default(&self) -> bool {
        self.kind == AliasKind::Default
    }
}

impl fmt::Display for PackageAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
