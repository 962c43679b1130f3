//! Release configuration types.
//!
//! This module defines the Rust representation of `shipit.toml`. The file is
//! read once at start; every field has a default matching a conventional
//! single-binary Rust project released from `main`.

use crate::assets::AssetDeclaration;
use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up at the repository root.
pub const CONFIG_FILE_NAME: &str = "shipit.toml";

/// Whether the pipeline may perform side effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DryRun {
    /// Resolve and report only.
    Yes,
    /// Perform the release.
    #[default]
    No,
}

impl DryRun {
    /// Returns true for [`DryRun::Yes`].
    #[must_use]
    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl From<bool> for DryRun {
    fn from(value: bool) -> Self {
        if value { Self::Yes } else { Self::No }
    }
}

impl fmt::Display for DryRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "dry-run"),
            Self::No => write!(f, "live"),
        }
    }
}

/// Complete release configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// The only branch releases may be cut from.
    pub branch: String,
    /// Version of the first release when no release tag exists yet.
    pub initial_version: String,
    /// Git-related release settings.
    pub git: ReleaseGitConfig,
    /// Changelog generation configuration.
    pub changelog: ChangelogConfig,
    /// Version stamping configuration.
    pub stamp: StampConfig,
    /// Assets uploaded with the release.
    pub assets: Vec<AssetDeclaration>,
    /// GitHub Releases settings.
    pub github: GitHubConfig,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            initial_version: "1.0.0".to_string(),
            git: ReleaseGitConfig::default(),
            changelog: ChangelogConfig::default(),
            stamp: StampConfig::default(),
            assets: Vec::new(),
            github: GitHubConfig::default(),
        }
    }
}

impl ReleaseConfig {
    /// Parse a configuration from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration file at `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No release config found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                format!("Failed to read {}: {e}", path.display()),
                "Check that the configuration file is readable",
            )
        })?;
        Self::from_toml(&content)
    }

    /// The parsed initial version.
    ///
    /// # Errors
    ///
    /// Returns an error if `initial_version` is not a valid semantic version.
    pub fn initial_version(&self) -> Result<Version> {
        self.initial_version.parse()
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.branch.trim().is_empty() {
            return Err(Error::config(
                "`branch` must not be empty",
                "Set `branch = \"main\"` (or your release branch) in shipit.toml",
            ));
        }

        self.initial_version().map_err(|_| {
            Error::config(
                format!("`initial_version` is not a semantic version: {}", self.initial_version),
                "Use a version such as \"1.0.0\" or \"0.1.0\"",
            )
        })?;

        if self.changelog.path.as_os_str().is_empty() {
            return Err(Error::config(
                "`changelog.path` must not be empty",
                "Set `path = \"CHANGELOG.md\"` under [changelog]",
            ));
        }

        if !self.git.message.contains("${version}") {
            return Err(Error::config(
                "`git.message` must contain ${version}",
                "The release commit message template needs the version placeholder",
            ));
        }

        for declaration in &self.assets {
            declaration.validate()?;
        }

        Ok(())
    }
}

/// Git-related release configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseGitConfig {
    /// Tag prefix for version tags.
    pub tag_prefix: String,
    /// Remote to push the release commit and tag to.
    pub remote: String,
    /// Whether to push the release commit and tag.
    pub push: bool,
    /// Release commit message template (`${version}`, `${notes}`).
    pub message: String,
    /// Files committed with the release, besides the changelog.
    pub files: Vec<PathBuf>,
}

impl Default for ReleaseGitConfig {
    fn default() -> Self {
        Self {
            tag_prefix: "v".to_string(),
            remote: "origin".to_string(),
            push: true,
            message: "chore(release): ${version} [skip ci]\n\n${notes}".to_string(),
            files: vec![PathBuf::from("Cargo.toml")],
        }
    }
}

impl ReleaseGitConfig {
    /// Format a tag name from a version.
    #[must_use]
    pub fn format_tag(&self, version: &Version) -> String {
        format!("{}{}", self.tag_prefix, version)
    }

    /// Render the release commit message.
    #[must_use]
    pub fn render_message(&self, version: &Version, notes: &str) -> String {
        self.message
            .replace("${version}", &version.to_string())
            .replace("${notes}", notes.trim_end())
            .trim_end()
            .to_string()
    }
}

/// Changelog generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChangelogConfig {
    /// Path to the changelog file relative to the repository root.
    pub path: PathBuf,
    /// Title block written when the changelog does not exist yet.
    pub title: String,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("CHANGELOG.md"),
            title: "# Changelog".to_string(),
        }
    }
}

/// Version stamping configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StampConfig {
    /// Shell command run with the resolved version (`${version}`).
    pub command: Option<String>,
    /// Cargo manifests whose version is rewritten in place.
    pub manifests: Vec<PathBuf>,
}

impl StampConfig {
    /// Returns true when nothing is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.command.is_none() && self.manifests.is_empty()
    }
}

/// GitHub Releases configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubConfig {
    /// Repository owner; parsed from the remote URL when unset.
    pub owner: Option<String>,
    /// Repository name; parsed from the remote URL when unset.
    pub repo: Option<String>,
    /// Leave the release as a draft instead of publishing it.
    pub draft: bool,
}
