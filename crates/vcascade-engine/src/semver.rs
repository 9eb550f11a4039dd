//! Version number calculation utilities
//!
//! Strict `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]` parsing and increment
//! rules used by the cascade planner.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Which component a bump increments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    /// Increment major, reset minor and patch
    Major,
    /// Increment minor, reset patch
    Minor,
    Patch,
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BumpKind::Major => f.write_str("major"),
            BumpKind::Minor => f.write_str("minor"),
            BumpKind::Patch => f.write_str("patch"),
        }
    }
}

impl FromStr for BumpKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "major" => Ok(BumpKind::Major),
            "minor" => Ok(BumpKind::Minor),
            "patch" => Ok(BumpKind::Patch),
            other => Err(EngineError::InvalidRequest(format!(
                "unknown increment '{other}', expected major, minor or patch"
            ))),
        }
    }
}

/// Parsed semantic version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
            build: None,
        }
    }

    /// Parse a version string like "2.0.1", "1.4.0-rc.1" or "1.0.0+build.7"
    pub fn parse(version: &str) -> Result<Self> {
        let invalid = || EngineError::InvalidVersion(version.to_string());

        let (rest, build) = match version.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (version, None),
        };
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let mut parts = core.split('.');
        let major = parse_numeric(parts.next()).ok_or_else(invalid)?;
        let minor = parse_numeric(parts.next()).ok_or_else(invalid)?;
        let patch = parse_numeric(parts.next()).ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        if let Some(pre) = pre {
            if !valid_identifiers(pre) {
                return Err(invalid());
            }
        }
        if let Some(build) = build {
            if !valid_identifiers(build) {
                return Err(invalid());
            }
        }

        Ok(Self {
            major,
            minor,
            patch,
            pre: pre.map(str::to_string),
            build: build.map(str::to_string),
        })
    }

    /// Apply a bump to get the next version
    ///
    /// Pre-release and build metadata never survive an increment. A
    /// component already at `u64::MAX` is `InvalidVersion`.
    pub fn bump(&self, kind: BumpKind) -> Result<Self> {
        let overflow = || EngineError::InvalidVersion(format!("{self} cannot take a {kind} bump: {kind} overflows"));
        Ok(match kind {
            BumpKind::Major => Self::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
            BumpKind::Minor => Self::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0),
            BumpKind::Patch => Self::new(self.major, self.minor, self.patch.checked_add(1).ok_or_else(overflow)?),
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl FromStr for SemanticVersion {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Calculate the next version string for `current`
///
/// # Examples
/// ```
/// use vcascade_engine::semver::{calculate_next_version, BumpKind};
///
/// assert_eq!(calculate_next_version("1.5.2", BumpKind::Major).unwrap(), "2.0.0");
/// assert_eq!(calculate_next_version("1.5.2", BumpKind::Minor).unwrap(), "1.6.0");
/// assert_eq!(calculate_next_version("1.5.2", BumpKind::Patch).unwrap(), "1.5.3");
/// ```
pub fn calculate_next_version(current: &str, kind: BumpKind) -> Result<String> {
    Ok(SemanticVersion::parse(current)?.bump(kind)?.to_string())
}

fn parse_numeric(part: Option<&str>) -> Option<u64> {
    let part = part?;
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // no leading zeros
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse().ok()
}

fn valid_identifiers(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|ident| {
            !ident.is_empty() && ident.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}
