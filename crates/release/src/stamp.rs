//! Version stamping.
//!
//! A stamper writes the resolved version into repository files before the
//! release commit. The pipeline only knows the [`VersionStamper`] trait; it
//! never inspects which files changed.

use crate::config::StampConfig;
use crate::error::{Error, Result};
use crate::manifest::ManifestStamper;
use crate::version::Version;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Environment variable carrying the version to the stamp command.
pub const NEXT_VERSION_ENV: &str = "SHIPIT_NEXT_VERSION";

/// Writes a version into the working tree.
pub trait VersionStamper: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Stamp `version` into the working tree.
    ///
    /// # Errors
    ///
    /// Returns an error if stamping fails; the release is aborted.
    fn stamp(&self, version: &Version) -> Result<()>;
}

/// Runs one external shell command with the version substituted.
#[derive(Debug, Clone)]
pub struct CommandStamper {
    command: String,
    root: PathBuf,
}

impl CommandStamper {
    /// Create a stamper running `command` in `root`.
    #[must_use]
    pub fn new(command: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            root: root.into(),
        }
    }

    /// The command line with every version placeholder replaced.
    #[must_use]
    pub fn render(&self, version: &Version) -> String {
        let version = version.to_string();
        self.command
            .replace("${nextRelease.version}", &version)
            .replace("${version}", &version)
            .replace("{version}", &version)
    }
}

impl VersionStamper for CommandStamper {
    fn name(&self) -> &str {
        "command"
    }

    fn stamp(&self, version: &Version) -> Result<()> {
        let rendered = self.render(version);
        info!(command = %rendered, "Running version stamp command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&rendered)
            .current_dir(&self.root)
            .env(NEXT_VERSION_ENV, version.to_string())
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(stdout = %stdout.trim_end(), "Stamp command output");
        }

        if !output.status.success() {
            warn!(
                command = %rendered,
                stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
                "Version stamp command failed"
            );
            return Err(Error::stamp_failed(rendered, output.status.code()));
        }

        Ok(())
    }
}

/// Runs several stampers in order, stopping at the first failure.
#[derive(Default)]
pub struct StampChain {
    stampers: Vec<Box<dyn VersionStamper>>,
}

impl StampChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stamper.
    #[must_use]
    pub fn with(mut self, stamper: impl VersionStamper + 'static) -> Self {
        self.stampers.push(Box::new(stamper));
        self
    }

    /// Build the chain from configuration: manifests first, then the command.
    #[must_use]
    pub fn from_config(root: &Path, config: &StampConfig) -> Self {
        let mut chain = Self::new();
        if !config.manifests.is_empty() {
            chain = chain.with(ManifestStamper::new(root, config.manifests.clone()));
        }
        if let Some(command) = &config.command {
            chain = chain.with(CommandStamper::new(command.clone(), root));
        }
        chain
    }

    /// Number of stampers in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stampers.len()
    }

    /// Returns true if the chain does nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stampers.is_empty()
    }
}

impl VersionStamper for StampChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn stamp(&self, version: &Version) -> Result<()> {
        if self.stampers.is_empty() {
            debug!("No version stampers configured");
        }
        for stamper in &self.stampers {
            debug!(stamper = stamper.name(), %version, "Stamping version");
            stamper.stamp(version)?;
        }
        Ok(())
    }
}
