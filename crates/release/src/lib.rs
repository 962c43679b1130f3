//! Native release pipeline for shipit.
//!
//! This crate turns a repository's commit history and a directory of freshly
//! built artifacts into a published, tagged, changelog-recorded release. It is
//! gated on a single release branch and only releases when qualifying changes
//! exist.
//!
//! # Features
//!
//! - **Commit Classification**: Conventional Commits by default, pluggable via [`CommitClassifier`]
//! - **Version Resolution**: Highest-impact change wins; nothing to release is not an error
//! - **Release Notes**: One structure renders both the release body and the changelog fragment
//! - **Asset Resolution**: All-or-nothing verification of declared build outputs
//! - **Publishing**: Pluggable release hosts via [`ReleaseHost`]
//!
//! # Architecture
//!
//! - [`conventional`] - Commit classification
//! - [`version`] - Version parsing, bumping and resolution
//! - [`notes`] - Release notes generation
//! - [`changelog`] - Changelog file maintenance
//! - [`assets`] - Release asset resolution
//! - [`stamp`] / [`manifest`] - Version stamping
//! - [`backends`] - Release host interface
//! - [`vcs`] - Git access, release commit and tag
//! - [`orchestrator`] - The pipeline state machine
//!
//! # Example
//!
//! ```rust,ignore
//! use shipit_release::{GitCli, ReleaseConfig, ReleasePipeline};
//!
//! let config = ReleaseConfig::load(Path::new("shipit.toml"))?;
//! let pipeline = ReleasePipeline::new(config, ".", Box::new(GitCli::new(".")), host);
//! let outcome = pipeline.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod assets;
pub mod backends;
pub mod changelog;
pub mod config;
pub mod conventional;
pub mod error;
pub mod manifest;
pub mod notes;
pub mod orchestrator;
pub mod stamp;
pub mod vcs;
pub mod version;

// Re-export main types
pub use assets::{AssetDeclaration, AssetResolver, ResolvedAsset};
pub use backends::{HostFuture, PublishedRelease, ReleaseHost, ReleaseRequest};
pub use changelog::{ChangelogUpdate, ChangelogWriter};
pub use config::{
    CONFIG_FILE_NAME, ChangelogConfig, DryRun, GitHubConfig, ReleaseConfig, ReleaseGitConfig,
    StampConfig,
};
pub use conventional::{ChangeCategory, CommitClassifier, CommitEntry, ConventionalClassifier, RawCommit};
pub use error::{Error, Result};
pub use manifest::ManifestStamper;
pub use notes::{NoteEntry, NotesGenerator, ReleaseNotes};
pub use orchestrator::{Outcome, PipelineRun, ReleasePipeline, ReleasePlan, ReleaseRecord, Stage};
pub use stamp::{CommandStamper, StampChain, VersionStamper};
pub use vcs::{CommitRequest, GitCli, Vcs};
pub use version::{BumpType, Resolution, Version, VersionResolver};
