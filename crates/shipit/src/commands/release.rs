//! The `release` and `plan` commands.
//!
//! Wires the git CLI, the GitHub host and the on-disk configuration into a
//! [`ReleasePipeline`] and renders its [`Outcome`].

use shipit_github::{GitHubReleaseBackend, GitHubReleaseConfig};
use shipit_release::{
    CONFIG_FILE_NAME, DryRun, Error, GitCli, HostFuture, Outcome, PublishedRelease, ReleaseConfig,
    ReleaseHost, ReleasePipeline, ReleaseRequest, Result,
};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Inputs of one `release` invocation.
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
    pub branch: Option<String>,
    pub dry_run: DryRun,
}

impl ReleaseOptions {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.root.join(CONFIG_FILE_NAME))
    }
}

/// Stands in for a host that could not be configured.
///
/// Runs that end before publishing (wrong branch, nothing to release, dry
/// run) never touch the host, so a missing token only fails a run that
/// actually needs it.
struct UnavailableHost {
    message: String,
    help: Option<String>,
}

impl UnavailableHost {
    fn error(&self) -> Error {
        Error::backend("GitHub", self.message.clone(), self.help.clone())
    }
}

impl ReleaseHost for UnavailableHost {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn find_release<'a>(&'a self, _tag: &'a str) -> HostFuture<'a, Option<PublishedRelease>> {
        Box::pin(async move { Err(self.error()) })
    }

    fn create_release<'a>(
        &'a self,
        _request: &'a ReleaseRequest,
    ) -> HostFuture<'a, PublishedRelease> {
        Box::pin(async move { Err(self.error()) })
    }

    fn delete_release<'a>(&'a self, _release: &'a PublishedRelease) -> HostFuture<'a, ()> {
        Box::pin(async move { Err(self.error()) })
    }
}

fn build_host(config: &ReleaseConfig, git: &GitCli) -> Result<Box<dyn ReleaseHost>> {
    let remote_url = git.remote_url(&config.git.remote)?;

    match GitHubReleaseConfig::from_settings(&config.github, remote_url.as_deref()) {
        Ok(github) => {
            debug!(owner = %github.owner, repo = %github.repo, "Using GitHub Releases host");
            Ok(Box::new(GitHubReleaseBackend::new(github)))
        }
        Err(Error::Backend { message, help, .. }) => {
            debug!(reason = %message, "GitHub host unavailable");
            Ok(Box::new(UnavailableHost { message, help }))
        }
        Err(e) => Err(e),
    }
}

/// Git client for `root`; the remote is consulted for tags only when
/// releases are pushed to it.
fn git_client(config: &ReleaseConfig, root: &Path) -> GitCli {
    let git = GitCli::new(root);
    if config.git.push {
        git.with_remote(&config.git.remote)
    } else {
        git
    }
}

/// Load the configuration and build the pipeline for `options`.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or git cannot be
/// run.
pub fn build_pipeline(options: &ReleaseOptions) -> Result<ReleasePipeline> {
    let config = ReleaseConfig::load(&options.config_path())?;

    let git = git_client(&config, &options.root);
    let host = build_host(&config, &git)?;

    let mut pipeline = ReleasePipeline::new(config, &options.root, Box::new(git), host)
        .with_dry_run(options.dry_run);
    if let Some(branch) = &options.branch {
        pipeline = pipeline.with_branch(branch);
    }
    Ok(pipeline)
}

/// Execute the `release` command.
///
/// # Errors
///
/// Returns the error that stopped the pipeline.
#[instrument(skip_all, fields(root = %options.root.display(), mode = %options.dry_run))]
pub async fn execute_release(options: &ReleaseOptions) -> Result<Outcome> {
    let pipeline = build_pipeline(options)?;
    pipeline.run().await
}

/// Render an outcome as a JSON document.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(outcome: &Outcome) -> serde_json::Result<String> {
    serde_json::to_string_pretty(outcome)
}

fn previous_label(previous: Option<&shipit_release::Version>) -> String {
    previous.map_or_else(|| "none".to_string(), ToString::to_string)
}

/// Render an outcome for a terminal.
pub fn render_human(outcome: &Outcome, root: &Path) -> String {
    let mut output = String::new();

    match outcome {
        Outcome::Released(record) => {
            let _ = writeln!(output, "Released {} ({})", record.tag_name, record.release_url);
            let _ = writeln!(
                output,
                "  version: {} -> {}",
                previous_label(record.previous_version.as_ref()),
                record.version
            );
            let _ = writeln!(output, "  commit:  {}", record.commit_sha);
            let _ = writeln!(output, "  assets:  {}", record.assets.len());
        }
        Outcome::NothingToRelease { last } => {
            let _ = writeln!(
                output,
                "Nothing to release (last release: {})",
                previous_label(last.as_ref())
            );
        }
        Outcome::WrongBranch { current, expected } => {
            let _ = writeln!(
                output,
                "Skipping release: on branch '{current}', releases are cut from '{expected}'"
            );
        }
        Outcome::DryRun(plan) => {
            let _ = writeln!(
                output,
                "Dry run - would release {} ({} -> {})\n",
                plan.tag_name,
                previous_label(plan.previous_version.as_ref()),
                plan.version
            );
            output.push_str(&plan.notes.changelog_fragment());
            if !plan.assets.is_empty() {
                output.push_str("\nAssets:\n");
                for asset in &plan.assets {
                    let path = asset
                        .local_path
                        .strip_prefix(root)
                        .unwrap_or(&asset.local_path);
                    let _ = writeln!(
                        output,
                        "  {} [{}] {} ({} bytes, sha256 {})",
                        asset.name,
                        asset.label,
                        path.display(),
                        asset.size_bytes,
                        asset.sha256
                    );
                }
            }
        }
    }

    output
}
