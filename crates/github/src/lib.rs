//! GitHub provider implementations for shipit.
//!
//! This crate provides GitHub-specific implementations of:
//! - [`GitHubReleaseBackend`] for publishing to GitHub Releases (feature: `release`)
//!
//! # Features
//!
//! - `release` (default): GitHub Releases host with asset uploads

#![warn(missing_docs)]

#[cfg(feature = "release")]
pub mod release;

// Re-exports for convenience
#[cfg(feature = "release")]
pub use release::{GitHubReleaseBackend, GitHubReleaseConfig, parse_github_remote};
