//! Version calculation and bumping logic.
//!
//! This module provides semantic versioning support including:
//! - Version parsing and formatting
//! - Bump selection from classified commits
//! - Next-version resolution against the last published release

use crate::conventional::{ChangeCategory, CommitEntry};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Type of version bump, ordered by impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    /// No version change.
    None,
    /// Patch version bump (0.0.X).
    Patch,
    /// Minor version bump (0.X.0).
    Minor,
    /// Major version bump (X.0.0).
    Major,
}

impl From<ChangeCategory> for BumpType {
    fn from(category: ChangeCategory) -> Self {
        match category {
            ChangeCategory::Breaking => Self::Major,
            ChangeCategory::Feature => Self::Minor,
            ChangeCategory::Fix => Self::Patch,
            ChangeCategory::None => Self::None,
        }
    }
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// A semantic version following the `SemVer` 2.0.0 specification.
///
/// Serialized as its string form (`"1.2.3-rc.1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    /// Major version number.
    pub major: u64,
    /// Minor version number.
    pub minor: u64,
    /// Patch version number.
    pub patch: u64,
    /// Pre-release identifier (e.g., "alpha", "beta.1").
    pub prerelease: Option<String>,
    /// Build metadata (e.g., "20230101", "commit.abc123").
    pub build: Option<String>,
}

impl Version {
    /// Create a new version.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Create a version with a pre-release identifier.
    #[must_use]
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    /// Create a version with build metadata.
    #[must_use]
    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = Some(build.into());
        self
    }

    /// Apply a bump type to this version.
    ///
    /// Any pre-release or build suffix is dropped by a real bump.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if the bumped component overflows.
    pub fn bump(&self, bump_type: BumpType) -> Result<Self> {
        let overflow = || Error::invalid_version(format!("{self} cannot be bumped ({bump_type})"));
        Ok(match bump_type {
            BumpType::Major => Self::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
            BumpType::Minor => {
                Self::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0)
            }
            BumpType::Patch => Self::new(
                self.major,
                self.minor,
                self.patch.checked_add(1).ok_or_else(overflow)?,
            ),
            BumpType::None => self.clone(),
        })
    }

    /// Check if this is a pre-release version.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        // Remove leading 'v' if present
        let s = s.strip_prefix('v').unwrap_or(s);

        let (version_pre, build) = match s.split_once('+') {
            Some((v, b)) => (v, Some(b.to_string())),
            None => (s, None),
        };

        let (version, prerelease) = match version_pre.split_once('-') {
            Some((v, p)) => (v, Some(p.to_string())),
            None => (version_pre, None),
        };

        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::invalid_version(s));
        }

        let major = parts[0]
            .parse()
            .map_err(|_| Error::invalid_version(format!("Invalid major version: {}", parts[0])))?;
        let minor = parts[1]
            .parse()
            .map_err(|_| Error::invalid_version(format!("Invalid minor version: {}", parts[1])))?;
        let patch = parts[2]
            .parse()
            .map_err(|_| Error::invalid_version(format!("Invalid patch version: {}", parts[2])))?;

        if prerelease.as_deref() == Some("") || build.as_deref() == Some("") {
            return Err(Error::invalid_version(s));
        }

        Ok(Self {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.major.cmp(&other.major) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.minor.cmp(&other.minor) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.patch.cmp(&other.patch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Pre-release versions have lower precedence
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        }
        // Build metadata is ignored in comparison
    }
}

/// Pre-release precedence: identifiers compared left to right, numeric ones
/// numerically and below alphanumeric ones, a shorter list lower on a tie.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        let ord = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match (x.parse::<u64>(), y.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => x.cmp(y),
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// Result of version resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A release is warranted.
    Release {
        /// The last published version, if any.
        previous: Option<Version>,
        /// The version to release.
        next: Version,
        /// The bump that produced `next` (`None` for an initial release).
        bump: BumpType,
    },
    /// No qualifying changes; nothing to release.
    Skip,
}

/// Computes the next version from classified commits.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    initial: Version,
}

impl VersionResolver {
    /// Create a resolver that starts first releases at `initial`.
    #[must_use]
    pub const fn new(initial: Version) -> Self {
        Self { initial }
    }

    /// The highest-impact bump among the commits.
    #[must_use]
    pub fn aggregate_bump(commits: &[CommitEntry]) -> BumpType {
        commits
            .iter()
            .map(|c| BumpType::from(c.category))
            .fold(BumpType::None, std::cmp::max)
    }

    /// Resolve the next version.
    ///
    /// Breaking beats feature beats fix regardless of count or order. Without a
    /// prior release the first qualifying release is the initial version. The
    /// result is always strictly greater than `last`, otherwise it is a skip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if `last` cannot be bumped.
    pub fn resolve(&self, last: Option<&Version>, commits: &[CommitEntry]) -> Result<Resolution> {
        let bump = Self::aggregate_bump(commits);
        if bump == BumpType::None {
            return Ok(Resolution::Skip);
        }

        let Some(last) = last else {
            return Ok(Resolution::Release {
                previous: None,
                next: self.initial.clone(),
                bump,
            });
        };

        let next = last.bump(bump)?;
        if next <= *last {
            return Ok(Resolution::Skip);
        }

        Ok(Resolution::Release {
            previous: Some(last.clone()),
            next,
            bump,
        })
    }
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self::new(Version::new(1, 0, 0))
    }
}
