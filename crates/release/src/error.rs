//! Error types for release pipeline operations.
//!
//! Only fatal conditions live here. The two legitimate no-op terminations
//! (wrong branch, nothing to release) are [`crate::Outcome`] variants.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the release pipeline.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A declared release asset did not resolve to an existing file.
    #[error("Release asset not found: {declaration}")]
    #[diagnostic(
        code(shipit::release::asset_missing),
        help("Build the artifacts before releasing, or fix the [[assets]] declarations")
    )]
    AssetMissing {
        /// The unresolved declaration (path or pattern after template expansion)
        declaration: String,
        /// The path that was looked up
        path: Option<PathBuf>,
    },

    /// The external version-stamp command did not succeed.
    #[error("Version stamp command failed with {}", exit_status_text(.exit_code))]
    #[diagnostic(
        code(shipit::release::stamp_failed),
        help("Run the [stamp].command manually with the resolved version to see its output")
    )]
    StampCommandFailed {
        /// Exit code of the command, `None` if it was killed by a signal
        exit_code: Option<i32>,
        /// The command line that was executed
        command: String,
    },

    /// The remote release host rejected or failed the publish request.
    #[error("Publish failed: {reason}")]
    #[diagnostic(
        code(shipit::release::publish),
        help("Local changelog and manifest changes are uncommitted and safe to discard before retrying")
    )]
    PublishFailed {
        /// Why publishing failed
        reason: String,
    },

    /// A release for this version already exists.
    #[error("Release {version} already exists")]
    #[diagnostic(
        code(shipit::release::duplicate),
        help("A previous run already published this version; it will not be published or tagged again")
    )]
    DuplicateRelease {
        /// The version that was already released
        version: String,
    },

    /// Failed to parse or validate a version string.
    #[error("Invalid version: {version}")]
    #[diagnostic(
        code(shipit::release::invalid_version),
        help("Version must follow semantic versioning (e.g., 1.0.0, 2.1.0-beta.1)")
    )]
    InvalidVersion {
        /// The invalid version string
        version: String,
    },

    /// Configuration error.
    #[error("Release configuration error: {message}")]
    #[diagnostic(code(shipit::release::config), help("{help}"))]
    Config {
        /// The error message
        message: String,
        /// Help text for the user
        help: String,
    },

    /// Manifest file error (Cargo.toml, Cargo.lock).
    #[error("Manifest error: {message}")]
    #[diagnostic(
        code(shipit::release::manifest),
        help("Check that the manifest file exists and is properly formatted")
    )]
    Manifest {
        /// The error message
        message: String,
        /// The manifest file path
        path: Option<PathBuf>,
    },

    /// Failed to read or write the changelog file.
    #[error("Changelog error: {message}")]
    #[diagnostic(
        code(shipit::release::changelog),
        help("Check that the changelog path is writable")
    )]
    Changelog {
        /// The error message
        message: String,
        /// The path that caused the error
        path: Option<PathBuf>,
        /// The underlying source error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Git operation error.
    #[error("Git error: {message}")]
    #[diagnostic(
        code(shipit::release::git),
        help("Ensure you are in a git repository and have the necessary permissions")
    )]
    Git {
        /// The error message
        message: String,
    },

    /// Release host backend error (GitHub, ...).
    #[error("{backend} backend error: {message}")]
    #[diagnostic(code(shipit::release::backend))]
    Backend {
        /// The backend that failed
        backend: String,
        /// The error message
        message: String,
        /// Help text for the user
        help: Option<String>,
    },

    /// A pipeline stage ran without the output of the stage it depends on.
    #[error("Pipeline stage {stage} ran out of order: missing {missing}")]
    #[diagnostic(code(shipit::release::pipeline))]
    Pipeline {
        /// The stage that was running
        stage: String,
        /// The intermediate value that was not available
        missing: String,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(shipit::release::io))]
    Io(#[from] std::io::Error),

    /// Wrapped TOML parsing error.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(shipit::release::toml_parse))]
    TomlParse(#[from] toml::de::Error),
}

fn exit_status_text(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(
        || "no exit code (terminated by signal)".to_string(),
        |code| format!("exit code {code}"),
    )
}

impl Error {
    /// Create a new missing asset error.
    #[must_use]
    pub fn asset_missing(declaration: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::AssetMissing {
            declaration: declaration.into(),
            path,
        }
    }

    /// Create a new stamp command failure.
    #[must_use]
    pub fn stamp_failed(command: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::StampCommandFailed {
            exit_code,
            command: command.into(),
        }
    }

    /// Create a new publish failure.
    #[must_use]
    pub fn publish_failed(reason: impl Into<String>) -> Self {
        Self::PublishFailed {
            reason: reason.into(),
        }
    }

    /// Create a new duplicate release error.
    #[must_use]
    pub fn duplicate_release(version: impl Into<String>) -> Self {
        Self::DuplicateRelease {
            version: version.into(),
        }
    }

    /// Create a new invalid version error.
    #[must_use]
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a new manifest error.
    #[must_use]
    pub fn manifest(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Manifest {
            message: message.into(),
            path,
        }
    }

    /// Create a new changelog error with its I/O source.
    #[must_use]
    pub fn changelog_io(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Changelog {
            message: message.into(),
            path,
            source: Some(source),
        }
    }

    /// Create a new git error.
    #[must_use]
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Create a new backend error.
    #[must_use]
    pub fn backend(
        backend: impl Into<String>,
        message: impl Into<String>,
        help: Option<String>,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
            help,
        }
    }

    /// Create a new out-of-order pipeline error.
    #[must_use]
    pub fn pipeline(stage: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            missing: missing.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_missing_error() {
        let err = Error::asset_missing("b", Some(PathBuf::from("/repo/b")));
        assert!(err.to_string().contains("Release asset not found: b"));
    }

    #[test]
    fn test_stamp_failed_with_code() {
        let err = Error::stamp_failed("./update_version.sh 1.0.0", Some(3));
        assert!(err.to_string().contains("exit code 3"));
    }

    #[test]
    fn test_stamp_failed_by_signal() {
        let err = Error::stamp_failed("./update_version.sh 1.0.0", None);
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_publish_failed_error() {
        let err = Error::publish_failed("502 Bad Gateway");
        assert_eq!(err.to_string(), "Publish failed: 502 Bad Gateway");
    }

    #[test]
    fn test_duplicate_release_error() {
        let err = Error::duplicate_release("1.3.0");
        assert!(err.to_string().contains("1.3.0"));
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_invalid_version_error() {
        let err = Error::invalid_version("not-a-version");
        assert!(err.to_string().contains("not-a-version"));
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("bad config", "check your settings");
        assert!(err.to_string().contains("bad config"));
    }

    #[test]
    fn test_changelog_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::changelog_io("failed to write", Some(PathBuf::from("CHANGELOG.md")), io_err);
        assert!(err.to_string().contains("Changelog error"));
    }

    #[test]
    fn test_backend_error() {
        let err = Error::backend("GitHub", "rate limited", Some("wait 1 hour".to_string()));
        assert!(err.to_string().contains("GitHub"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn test_pipeline_error() {
        let err = Error::pipeline("Publish", "resolved version");
        assert!(err.to_string().contains("Publish"));
        assert!(err.to_string().contains("resolved version"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }
}
