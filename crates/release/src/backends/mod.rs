//! Remote release hosts.
//!
//! This module defines the [`ReleaseHost`] trait that provider crates
//! implement to publish a release and its assets.
//!
//! # Architecture
//!
//! The release crate provides:
//! - [`ReleaseHost`] trait - interface for publishing a release
//! - [`ReleaseRequest`] - everything the host needs for one release
//! - [`PublishedRelease`] - what the host reports back
//!
//! Provider crates implement `ReleaseHost`:
//! - `shipit-github` - GitHub Releases
//!
//! # Example
//!
//! ```rust,ignore
//! use shipit_release::backends::{HostFuture, PublishedRelease, ReleaseHost, ReleaseRequest};
//!
//! struct MyHost;
//!
//! impl ReleaseHost for MyHost {
//!     fn name(&self) -> &'static str { "my-host" }
//!
//!     fn find_release<'a>(&'a self, _tag: &'a str) -> HostFuture<'a, Option<PublishedRelease>> {
//!         Box::pin(async move { Ok(None) })
//!     }
//!
//!     fn create_release<'a>(
//!         &'a self,
//!         request: &'a ReleaseRequest,
//!     ) -> HostFuture<'a, PublishedRelease> {
//!         Box::pin(async move {
//!             // Create the release, upload request.assets...
//!             Ok(PublishedRelease::new("1", "https://example.com/1", &request.tag_name))
//!         })
//!     }
//!
//!     fn delete_release<'a>(&'a self, _release: &'a PublishedRelease) -> HostFuture<'a, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//! }
//! ```

use crate::assets::ResolvedAsset;
use crate::error::Result;
use crate::version::Version;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`ReleaseHost`] methods.
pub type HostFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A release to create on the host.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    /// Version being released.
    pub version: Version,
    /// Tag the release is bound to.
    pub tag_name: String,
    /// Commit the tag will point at.
    pub target_commitish: String,
    /// Release title.
    pub name: String,
    /// Release body (Markdown).
    pub body: String,
    /// Assets to upload.
    pub assets: Vec<ResolvedAsset>,
    /// Mark the release as a pre-release.
    pub prerelease: bool,
}

impl ReleaseRequest {
    /// Creates a request for `version` tagged `tag_name`.
    #[must_use]
    pub fn new(version: Version, tag_name: impl Into<String>) -> Self {
        let tag_name = tag_name.into();
        Self {
            prerelease: version.is_prerelease(),
            name: tag_name.clone(),
            version,
            tag_name,
            target_commitish: String::new(),
            body: String::new(),
            assets: Vec::new(),
        }
    }

    /// Sets the target commit.
    #[must_use]
    pub fn with_target(mut self, commitish: impl Into<String>) -> Self {
        self.target_commitish = commitish.into();
        self
    }

    /// Sets the release body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the assets to upload.
    #[must_use]
    pub fn with_assets(mut self, assets: Vec<ResolvedAsset>) -> Self {
        self.assets = assets;
        self
    }
}

/// A release as it exists on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedRelease {
    /// Host-specific identifier.
    pub id: String,
    /// Public URL of the release.
    pub url: String,
    /// Tag the release is bound to.
    pub tag_name: String,
    /// Still a draft, i.e. created but never finalized.
    pub draft: bool,
}

impl PublishedRelease {
    /// Creates a published release record.
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            tag_name: tag_name.into(),
            draft: false,
        }
    }

    /// Marks the record as a draft.
    #[must_use]
    pub fn with_draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }
}

/// Trait for remote release hosts.
///
/// The pipeline calls [`ReleaseHost::create_release`] at most once per
/// resolved version, and [`ReleaseHost::finalize`] only after the release
/// commit and tag have been pushed.
pub trait ReleaseHost: Send + Sync {
    /// Returns the name of this host (e.g., "github").
    fn name(&self) -> &'static str;

    /// Looks up an existing release by tag, drafts included.
    ///
    /// A draft left behind by an interrupted run must be reported with
    /// [`PublishedRelease::draft`] set so the pipeline can replace it.
    fn find_release<'a>(&'a self, tag: &'a str) -> HostFuture<'a, Option<PublishedRelease>>;

    /// Creates the release and uploads its assets.
    ///
    /// A host-side "already exists" rejection should map to
    /// [`crate::Error::DuplicateRelease`]; any other failure to
    /// [`crate::Error::PublishFailed`].
    fn create_release<'a>(&'a self, request: &'a ReleaseRequest)
    -> HostFuture<'a, PublishedRelease>;

    /// Deletes a release, along with its uploaded assets.
    fn delete_release<'a>(&'a self, release: &'a PublishedRelease) -> HostFuture<'a, ()>;

    /// Makes the release final once its tag exists. No-op by default.
    fn finalize<'a>(&'a self, release: &'a PublishedRelease) -> HostFuture<'a, ()> {
        let _ = release;
        Box::pin(async { Ok(()) })
    }
}
