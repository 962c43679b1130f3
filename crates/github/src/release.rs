//! GitHub Releases host for shipit.
//!
//! Implements the [`ReleaseHost`] trait on top of GitHub Releases. The
//! release is created as a draft bound to the release commit, assets are
//! uploaded with their labels, and the draft is published by
//! [`ReleaseHost::finalize`] once the tag has been pushed. GitHub therefore
//! never creates the tag itself.

use bytes::Bytes;
use octocrab::Octocrab;
use shipit_release::assets::ResolvedAsset;
use shipit_release::backends::{HostFuture, PublishedRelease, ReleaseHost, ReleaseRequest};
use shipit_release::config::GitHubConfig;
use shipit_release::error::{Error, Result};
use tracing::{debug, info};

const BACKEND: &str = "GitHub";

/// Environment variables searched for a token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Configuration for the GitHub Releases host.
#[derive(Debug, Clone)]
pub struct GitHubReleaseConfig {
    /// Repository owner (e.g., "acme")
    pub owner: String,
    /// Repository name (e.g., "zk_whitelist")
    pub repo: String,
    /// GitHub token for authentication
    pub token: String,
    /// Leave the release as a draft instead of publishing it
    pub draft: bool,
}

impl GitHubReleaseConfig {
    /// Creates a new GitHub release configuration.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            draft: false,
        }
    }

    /// Sets the draft flag.
    #[must_use]
    pub const fn with_draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }

    /// Creates configuration from the environment and a git remote URL.
    ///
    /// Reads the token from `GITHUB_TOKEN` (or `GH_TOKEN`) and parses
    /// owner/repo from the remote URL.
    #[must_use]
    pub fn from_env(remote_url: &str) -> Option<Self> {
        let token = token_from_env()?;
        let (owner, repo) = parse_github_remote(remote_url)?;
        Some(Self::new(owner, repo, token))
    }

    /// Creates configuration from `[github]` settings.
    ///
    /// Owner and repo not set explicitly are parsed from `remote_url`.
    ///
    /// # Errors
    ///
    /// Returns a backend error if no token is set or the repository cannot
    /// be determined.
    pub fn from_settings(settings: &GitHubConfig, remote_url: Option<&str>) -> Result<Self> {
        let token = token_from_env().ok_or_else(|| {
            Error::backend(
                BACKEND,
                "No GitHub token found",
                Some("Set GITHUB_TOKEN or GH_TOKEN".to_string()),
            )
        })?;

        let parsed = remote_url.and_then(parse_github_remote);
        let owner = settings
            .owner
            .clone()
            .or_else(|| parsed.as_ref().map(|(o, _)| o.clone()));
        let repo = settings
            .repo
            .clone()
            .or_else(|| parsed.as_ref().map(|(_, r)| r.clone()));

        match (owner, repo) {
            (Some(owner), Some(repo)) => {
                Ok(Self::new(owner, repo, token).with_draft(settings.draft))
            }
            _ => Err(Error::backend(
                BACKEND,
                format!(
                    "Could not determine the GitHub repository from remote {}",
                    remote_url.unwrap_or("<none>")
                ),
                Some("Set owner and repo under [github] in shipit.toml".to_string()),
            )),
        }
    }
}

fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|t| !t.trim().is_empty()))
}

/// Parse a GitHub remote URL into (owner, repo).
#[must_use]
pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
        .or_else(|| url.strip_prefix("https://github.com/"))?;

    let path = rest.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// True for GitHub's "already_exists" validation failure.
fn is_already_exists(error: &octocrab::Error) -> bool {
    match error {
        octocrab::Error::GitHub { source, .. } => source.errors.as_ref().is_some_and(|errors| {
            errors
                .iter()
                .any(|e| e.get("code").and_then(|c| c.as_str()) == Some("already_exists"))
        }),
        _ => false,
    }
}

fn to_published(release: &octocrab::models::repos::Release) -> PublishedRelease {
    PublishedRelease::new(
        release.id.0.to_string(),
        release.html_url.to_string(),
        &release.tag_name,
    )
    .with_draft(release.draft)
}

fn release_id(release: &PublishedRelease) -> Result<u64> {
    release
        .id
        .parse()
        .map_err(|_| Error::backend(BACKEND, format!("Invalid release id {}", release.id), None))
}

/// GitHub Releases host.
pub struct GitHubReleaseBackend {
    config: GitHubReleaseConfig,
}

impl GitHubReleaseBackend {
    /// Creates a new GitHub release backend.
    #[must_use]
    pub const fn new(config: GitHubReleaseConfig) -> Self {
        Self { config }
    }

    /// Repository in `owner/repo` form.
    #[must_use]
    pub fn repository(&self) -> String {
        format!("{}/{}", self.config.owner, self.config.repo)
    }

    /// Creates an authenticated Octocrab client.
    fn client(&self) -> Result<Octocrab> {
        Octocrab::builder()
            .personal_token(self.config.token.clone())
            .build()
            .map_err(|e| Error::backend(BACKEND, e.to_string(), None))
    }

    /// Uploads an asset to a release.
    async fn upload_asset(
        &self,
        client: &Octocrab,
        release_id: u64,
        asset: &ResolvedAsset,
    ) -> Result<String> {
        let data = tokio::fs::read(&asset.local_path).await.map_err(|e| {
            Error::asset_missing(
                format!("{} ({e})", asset.local_path.display()),
                Some(asset.local_path.clone()),
            )
        })?;

        let repos = client.repos(&self.config.owner, &self.config.repo);
        let releases = repos.releases();

        let uploaded = releases
            .upload_asset(release_id, &asset.name, Bytes::from(data))
            .label(&asset.label)
            .send()
            .await
            .map_err(|e| Error::publish_failed(format!("uploading {}: {e}", asset.name)))?;

        Ok(uploaded.browser_download_url.to_string())
    }
}

impl ReleaseHost for GitHubReleaseBackend {
    fn name(&self) -> &'static str {
        "github"
    }

    fn find_release<'a>(&'a self, tag: &'a str) -> HostFuture<'a, Option<PublishedRelease>> {
        Box::pin(async move {
            let client = self.client()?;
            let repos = client.repos(&self.config.owner, &self.config.repo);
            let releases = repos.releases();

            match releases.get_by_tag(tag).await {
                Ok(release) => return Ok(Some(to_published(&release))),
                Err(octocrab::Error::GitHub { source, .. })
                    if source.message.contains("Not Found") => {}
                Err(e) => return Err(Error::backend(BACKEND, e.to_string(), None)),
            }

            // Drafts have no tag yet, so only the listing shows them.
            let page = releases
                .list()
                .per_page(100)
                .send()
                .await
                .map_err(|e| Error::backend(BACKEND, e.to_string(), None))?;

            Ok(page
                .items
                .iter()
                .find(|release| release.draft && release.tag_name == tag)
                .map(to_published))
        })
    }

    fn create_release<'a>(
        &'a self,
        request: &'a ReleaseRequest,
    ) -> HostFuture<'a, PublishedRelease> {
        Box::pin(async move {
            let client = self.client()?;
            let repos = client.repos(&self.config.owner, &self.config.repo);
            let releases = repos.releases();

            info!(repo = %self.repository(), tag = %request.tag_name, "Creating draft release");
            let release = releases
                .create(&request.tag_name)
                .target_commitish(&request.target_commitish)
                .name(&request.name)
                .body(&request.body)
                .draft(true)
                .prerelease(request.prerelease)
                .send()
                .await
                .map_err(|e| {
                    if is_already_exists(&e) {
                        Error::duplicate_release(request.version.to_string())
                    } else {
                        Error::publish_failed(e.to_string())
                    }
                })?;

            let release_id = release.id.0;
            for asset in &request.assets {
                debug!(asset = %asset.name, label = %asset.label, size = asset.size_bytes, "Uploading asset");
                self.upload_asset(&client, release_id, asset).await?;
            }

            info!(
                release_id,
                uploaded_count = request.assets.len(),
                "Created GitHub release"
            );

            Ok(PublishedRelease::new(
                release_id.to_string(),
                release.html_url.to_string(),
                &request.tag_name,
            )
            .with_draft(true))
        })
    }

    fn delete_release<'a>(&'a self, release: &'a PublishedRelease) -> HostFuture<'a, ()> {
        Box::pin(async move {
            let release_id = release_id(release)?;

            let client = self.client()?;
            client
                .repos(&self.config.owner, &self.config.repo)
                .releases()
                .delete(release_id)
                .await
                .map_err(|e| {
                    Error::publish_failed(format!(
                        "could not delete release {}: {e}",
                        release.tag_name
                    ))
                })?;

            info!(url = %release.url, "Deleted GitHub release");
            Ok(())
        })
    }

    fn finalize<'a>(&'a self, release: &'a PublishedRelease) -> HostFuture<'a, ()> {
        Box::pin(async move {
            if self.config.draft {
                info!(url = %release.url, "Leaving GitHub release as draft");
                return Ok(());
            }

            let release_id = release_id(release)?;

            let client = self.client()?;
            client
                .repos(&self.config.owner, &self.config.repo)
                .releases()
                .update(release_id)
                .draft(false)
                .send()
                .await
                .map_err(|e| {
                    Error::publish_failed(format!(
                        "release {} was created but could not be published: {e}",
                        release.tag_name
                    ))
                })?;

            info!(url = %release.url, "Published GitHub release");
            Ok(())
        })
    }
}
