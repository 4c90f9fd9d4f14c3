//! Interpreter version utilities.
//!
//! Python reports its version as `Python 3.11.4` (or `3.12.0rc1` for
//! prereleases). This module parses those strings so the launcher can refuse
//! to provision an environment from an interpreter older than configured.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Error parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionParseError {
    /// The invalid version string.
    pub version: String,

    /// The reason for the error.
    pub reason: String,
}

impl fmt::Display for VersionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid version '{}': {}", self.version, self.reason)
    }
}

impl std::error::Error for VersionParseError {}

/// A Python interpreter version.
///
/// The micro component defaults to zero when omitted, so `3.10` and
/// `3.10.0` are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonVersion {
    /// Major version number.
    pub major: u32,

    /// Minor version number.
    pub minor: u32,

    /// Micro (patch) version number.
    pub micro: u32,

    /// Prerelease tag such as `a1`, `b2` or `rc1`.
    pub prerelease: Option<String>,
}

impl PythonVersion {
    /// Create a final-release version.
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            prerelease: None,
        }
    }

    /// Add a prerelease tag to this version.
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    /// Check if this version is a prerelease.
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// Parse the output of `python --version`.
    ///
    /// # Arguments
    ///
    /// * `output` - Interpreter output. Older interpreters print to stderr and
    ///   newer ones to stdout, so callers usually pass both concatenated.
    ///
    /// # Returns
    ///
    /// The version on the first line starting with `Python `, or an error if
    /// there is no such line.
    pub fn from_version_output(output: &str) -> Result<Self, VersionParseError> {
        output
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix("Python "))
            .ok_or_else(|| VersionParseError {
                version: output.trim().to_string(),
                reason: "No 'Python <version>' line in interpreter output".to_string(),
            })
            .and_then(|version| version.trim().parse())
    }

    /// Check if this version is at least `minimum`.
    ///
    /// # Arguments
    ///
    /// * `minimum` - The oldest acceptable version.
    ///
    /// # Returns
    ///
    /// `true` if this version is at least `minimum`. Prerelease tags are
    /// ignored, so `3.12.0rc1` satisfies a minimum of `3.12`.
    pub fn meets_minimum(&self, minimum: &PythonVersion) -> bool {
        (self.major, self.minor, self.micro) >= (minimum.major, minimum.minor, minimum.micro)
    }
}

fn split_prerelease(tag: &str) -> (&str, u64) {
    let digits_at = tag
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(tag.len());
    let (phase, number) = tag.split_at(digits_at);
    (phase, number.parse().unwrap_or(0))
}

impl PartialOrd for PythonVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PythonVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.major, self.minor, self.micro).cmp(&(other.major, other.minor, other.micro)) {
            Ordering::Equal => {}
            ordering => return ordering,
        }

        // A final release sorts after any of its prereleases
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => split_prerelease(a).cmp(&split_prerelease(b)),
        }
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;

        if let Some(prerelease) = &self.prerelease {
            write!(f, "{}", prerelease)?;
        }

        Ok(())
    }
}

impl FromStr for PythonVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |reason: &str| VersionParseError {
            version: s.to_string(),
            reason: reason.to_string(),
        };

        // Prerelease tags follow the last number directly, e.g. `0rc1`
        let mut parts = s.splitn(3, '.');

        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| error("Missing major version"))?
            .parse()
            .map_err(|_| error("Invalid major version"))?;

        let minor_part = parts.next().ok_or_else(|| error("Missing minor version"))?;
        let micro_part = parts.next();

        let (minor_digits, minor_tag) = split_number(minor_part);
        let minor = minor_digits
            .parse()
            .map_err(|_| error("Invalid minor version"))?;

        let (micro, prerelease) = match micro_part {
            Some(part) => {
                if !minor_tag.is_empty() {
                    return Err(error("Prerelease tag must follow the last component"));
                }
                let (digits, tag) = split_number(part);
                let micro = digits.parse().map_err(|_| error("Invalid micro version"))?;
                (micro, tag)
            }
            None => (0, minor_tag),
        };

        let prerelease = if prerelease.is_empty() {
            None
        } else {
            if !prerelease.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(error("Invalid prerelease tag"));
            }
            Some(prerelease.to_string())
        };

        Ok(Self {
            major,
            minor,
            micro,
            prerelease,
        })
    }
}

fn split_number(part: &str) -> (&str, &str) {
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    part.split_at(end)
}
