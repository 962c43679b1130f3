//! Release orchestrator.
//!
//! Coordinates the full release pipeline as an explicit linear state
//! machine: gate on the branch, classify commits, resolve the version,
//! generate notes, resolve assets, stamp, publish, then commit and tag.
//! Every entered stage is recorded so callers (and tests) can see exactly
//! how far a run got.

use crate::assets::{AssetResolver, ResolvedAsset};
use crate::backends::{PublishedRelease, ReleaseHost, ReleaseRequest};
use crate::changelog::ChangelogWriter;
use crate::config::{DryRun, ReleaseConfig};
use crate::conventional::{CommitClassifier, CommitEntry, ConventionalClassifier};
use crate::error::{Error, Result};
use crate::notes::{NotesGenerator, ReleaseNotes};
use crate::stamp::{StampChain, VersionStamper};
use crate::vcs::{CommitRequest, Vcs};
use crate::version::{Resolution, Version, VersionResolver};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{Instrument, debug, info, info_span, warn};

/// A step of the release pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stage {
    /// Run created.
    Start,
    /// Check the current branch.
    GateBranch,
    /// Read and classify commits since the last release.
    Classify,
    /// Compute the next version.
    ResolveVersion,
    /// Build release notes.
    GenerateNotes,
    /// Verify every declared asset.
    ResolveAssets,
    /// Stamp the version and write the changelog.
    StampVersion,
    /// Create the remote release.
    Publish,
    /// Commit, tag and push.
    CommitAndTag,
    /// Run finished.
    End,
}

impl Stage {
    /// The stage that follows this one on the happy path.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::GateBranch),
            Self::GateBranch => Some(Self::Classify),
            Self::Classify => Some(Self::ResolveVersion),
            Self::ResolveVersion => Some(Self::GenerateNotes),
            Self::GenerateNotes => Some(Self::ResolveAssets),
            Self::ResolveAssets => Some(Self::StampVersion),
            Self::StampVersion => Some(Self::Publish),
            Self::Publish => Some(Self::CommitAndTag),
            Self::CommitAndTag => Some(Self::End),
            Self::End => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::GateBranch => "gate-branch",
            Self::Classify => "classify",
            Self::ResolveVersion => "resolve-version",
            Self::GenerateNotes => "generate-notes",
            Self::ResolveAssets => "resolve-assets",
            Self::StampVersion => "stamp-version",
            Self::Publish => "publish",
            Self::CommitAndTag => "commit-and-tag",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// The durable result of a successful release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseRecord {
    /// Released version.
    pub version: Version,
    /// Version released before this one, if any.
    pub previous_version: Option<Version>,
    /// Tag created for the release.
    pub tag_name: String,
    /// Hash of the release commit.
    pub commit_sha: String,
    /// Release notes.
    pub notes: ReleaseNotes,
    /// Uploaded assets.
    pub assets: Vec<ResolvedAsset>,
    /// URL of the remote release.
    pub release_url: String,
}

/// What a live run would do, reported by a dry run.
#[derive(Debug, Clone, Serialize)]
pub struct ReleasePlan {
    /// Version that would be released.
    pub version: Version,
    /// Version released before it, if any.
    pub previous_version: Option<Version>,
    /// Tag that would be created.
    pub tag_name: String,
    /// Release notes.
    pub notes: ReleaseNotes,
    /// Assets that would be uploaded.
    pub assets: Vec<ResolvedAsset>,
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A release was published and recorded.
    Released(ReleaseRecord),
    /// No commit since the last release warrants a new version.
    NothingToRelease {
        /// Last released version, if any.
        last: Option<Version>,
    },
    /// The run was started from a branch releases are not cut from.
    WrongBranch {
        /// Branch the run was started from.
        current: String,
        /// Configured release branch.
        expected: String,
    },
    /// Dry run: everything resolved, nothing written.
    DryRun(ReleasePlan),
}

impl Outcome {
    /// Returns true if a release was published.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        matches!(self, Self::Released(_))
    }
}

/// A finished run: the entered stages and the result.
#[derive(Debug)]
pub struct PipelineRun {
    /// Stages entered, in order.
    pub transitions: Vec<Stage>,
    /// Outcome or the fatal error that stopped the run.
    pub result: Result<Outcome>,
}

impl PipelineRun {
    /// Whether `stage` was entered.
    #[must_use]
    pub fn entered(&self, stage: Stage) -> bool {
        self.transitions.contains(&stage)
    }
}

enum Transition {
    Next,
    Finish(Outcome),
}

/// Intermediate values of one run, filled in stage by stage.
#[derive(Default)]
struct RunState {
    branch: Option<String>,
    last: Option<(String, Version)>,
    commits: Option<Vec<CommitEntry>>,
    previous: Option<Version>,
    next: Option<Version>,
    notes: Option<ReleaseNotes>,
    assets: Option<Vec<ResolvedAsset>>,
    tag_name: Option<String>,
    published: Option<PublishedRelease>,
}

fn require<'a, T>(value: Option<&'a T>, stage: Stage, what: &str) -> Result<&'a T> {
    value.ok_or_else(|| Error::pipeline(stage.to_string(), what))
}

/// The release pipeline.
pub struct ReleasePipeline {
    config: ReleaseConfig,
    root: PathBuf,
    vcs: Box<dyn Vcs>,
    host: Box<dyn ReleaseHost>,
    stamper: Box<dyn VersionStamper>,
    classifier: Box<dyn CommitClassifier>,
    dry_run: DryRun,
    branch_override: Option<String>,
    date: Option<NaiveDate>,
}

impl ReleasePipeline {
    /// Creates a pipeline for the repository at `root`.
    ///
    /// The stamper is built from `config.stamp` and commits are classified
    /// with [`ConventionalClassifier`].
    #[must_use]
    pub fn new(
        config: ReleaseConfig,
        root: impl Into<PathBuf>,
        vcs: Box<dyn Vcs>,
        host: Box<dyn ReleaseHost>,
    ) -> Self {
        let root = root.into();
        let stamper = StampChain::from_config(&root, &config.stamp);
        Self {
            config,
            root,
            vcs,
            host,
            stamper: Box::new(stamper),
            classifier: Box::new(ConventionalClassifier::new()),
            dry_run: DryRun::No,
            branch_override: None,
            date: None,
        }
    }

    /// Replaces the version stamper.
    #[must_use]
    pub fn with_stamper(mut self, stamper: Box<dyn VersionStamper>) -> Self {
        self.stamper = stamper;
        self
    }

    /// Replaces the commit classification policy.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Box<dyn CommitClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: DryRun) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Uses `branch` instead of asking the VCS.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch_override = Some(branch.into());
        self
    }

    /// Fixes the release date instead of using today's date.
    #[must_use]
    pub const fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs the pipeline and returns the outcome.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error; see [`Error`].
    pub async fn run(&self) -> Result<Outcome> {
        self.execute().await.result
    }

    /// Runs the pipeline and returns the outcome with the stage trace.
    pub async fn execute(&self) -> PipelineRun {
        let mut transitions = vec![Stage::Start];
        let mut state = RunState::default();
        let mut stage = Stage::GateBranch;

        info!(
            branch = %self.config.branch,
            host = self.host.name(),
            mode = %self.dry_run,
            "Starting release pipeline"
        );

        let result = loop {
            transitions.push(stage);
            let span = info_span!("release_stage", stage = %stage);

            match self.step(stage, &mut state).instrument(span).await {
                Ok(Transition::Next) => match stage.next() {
                    Some(next) => stage = next,
                    None => break Err(Error::pipeline(stage.to_string(), "a successor stage")),
                },
                Ok(Transition::Finish(outcome)) => {
                    transitions.push(Stage::End);
                    break Ok(outcome);
                }
                Err(e) => {
                    warn!(stage = %stage, error = %e, "Release pipeline failed");
                    break Err(e);
                }
            }
        };

        PipelineRun {
            transitions,
            result,
        }
    }

    async fn step(&self, stage: Stage, state: &mut RunState) -> Result<Transition> {
        match stage {
            Stage::GateBranch => self.gate_branch(state),
            Stage::Classify => self.classify(state),
            Stage::ResolveVersion => self.resolve_version(state),
            Stage::GenerateNotes => self.generate_notes(state),
            Stage::ResolveAssets => self.resolve_assets(state),
            Stage::StampVersion => self.stamp_version(state),
            Stage::Publish => self.publish(state).await,
            Stage::CommitAndTag => self.commit_and_tag(state).await,
            Stage::Start | Stage::End => Err(Error::pipeline(stage.to_string(), "an executable stage")),
        }
    }

    fn gate_branch(&self, state: &mut RunState) -> Result<Transition> {
        let current = match &self.branch_override {
            Some(branch) => branch.clone(),
            None => self.vcs.current_branch()?,
        };

        if current != self.config.branch {
            warn!(
                current = %current,
                expected = %self.config.branch,
                "Not on the release branch, skipping release"
            );
            return Ok(Transition::Finish(Outcome::WrongBranch {
                current,
                expected: self.config.branch.clone(),
            }));
        }

        debug!(branch = %current, "On release branch");
        state.branch = Some(current);
        Ok(Transition::Next)
    }

    fn classify(&self, state: &mut RunState) -> Result<Transition> {
        let last = self.vcs.latest_release(&self.config.git.tag_prefix)?;
        let raw = self
            .vcs
            .commits_since(last.as_ref().map(|(tag, _)| tag.as_str()))?;
        let commits = self.classifier.classify_all(&raw);

        info!(
            last_release = ?last.as_ref().map(|(tag, _)| tag),
            commits = commits.len(),
            "Classified commits since last release"
        );

        state.last = last;
        state.commits = Some(commits);
        Ok(Transition::Next)
    }

    fn resolve_version(&self, state: &mut RunState) -> Result<Transition> {
        let commits = require(state.commits.as_ref(), Stage::ResolveVersion, "classified commits")?;
        let last = state.last.as_ref().map(|(_, version)| version);
        let resolver = VersionResolver::new(self.config.initial_version()?);

        match resolver.resolve(last, commits)? {
            Resolution::Skip => {
                info!(last = ?last.map(ToString::to_string), "No qualifying changes, nothing to release");
                Ok(Transition::Finish(Outcome::NothingToRelease {
                    last: last.cloned(),
                }))
            }
            Resolution::Release {
                previous,
                next,
                bump,
            } => {
                info!(
                    previous = ?previous.as_ref().map(ToString::to_string),
                    next = %next,
                    bump = %bump,
                    "Resolved next version"
                );
                state.tag_name = Some(self.config.git.format_tag(&next));
                state.previous = previous;
                state.next = Some(next);
                Ok(Transition::Next)
            }
        }
    }

    fn generate_notes(&self, state: &mut RunState) -> Result<Transition> {
        let stage = Stage::GenerateNotes;
        let next = require(state.next.as_ref(), stage, "resolved version")?;
        let commits = require(state.commits.as_ref(), stage, "classified commits")?;
        let date = self.date.unwrap_or_else(|| Utc::now().date_naive());

        let notes = NotesGenerator::new().generate(next, state.previous.as_ref(), commits, date);
        debug!(entries = notes.len(), "Generated release notes");

        state.notes = Some(notes);
        Ok(Transition::Next)
    }

    fn resolve_assets(&self, state: &mut RunState) -> Result<Transition> {
        let stage = Stage::ResolveAssets;
        let next = require(state.next.as_ref(), stage, "resolved version")?;

        let assets = AssetResolver::new(&self.root).resolve(&self.config.assets, next)?;
        info!(count = assets.len(), "Resolved release assets");

        if self.dry_run.is_dry_run() {
            let plan = ReleasePlan {
                version: next.clone(),
                previous_version: state.previous.clone(),
                tag_name: require(state.tag_name.as_ref(), stage, "tag name")?.clone(),
                notes: require(state.notes.as_ref(), stage, "release notes")?.clone(),
                assets,
            };
            info!(version = %plan.version, "Dry run, stopping before any changes");
            return Ok(Transition::Finish(Outcome::DryRun(plan)));
        }

        state.assets = Some(assets);
        Ok(Transition::Next)
    }

    fn stamp_version(&self, state: &mut RunState) -> Result<Transition> {
        let stage = Stage::StampVersion;
        let next = require(state.next.as_ref(), stage, "resolved version")?;
        let notes = require(state.notes.as_ref(), stage, "release notes")?;

        self.stamper.stamp(next)?;

        let changelog = ChangelogWriter::from_config(&self.root, &self.config.changelog);
        let update = changelog.write(next, &notes.changelog_fragment())?;
        info!(path = %changelog.path().display(), ?update, "Updated changelog");

        Ok(Transition::Next)
    }

    async fn publish(&self, state: &mut RunState) -> Result<Transition> {
        let stage = Stage::Publish;
        let next = require(state.next.as_ref(), stage, "resolved version")?;
        let tag_name = require(state.tag_name.as_ref(), stage, "tag name")?;
        let notes = require(state.notes.as_ref(), stage, "release notes")?;
        let assets = require(state.assets.as_ref(), stage, "resolved assets")?;

        if self.vcs.tag_exists(tag_name)? {
            return Err(Error::duplicate_release(next.to_string()));
        }
        let existing = self
            .host
            .find_release(tag_name)
            .await
            .map_err(into_publish_error)?;
        match existing {
            Some(existing) if existing.draft => {
                warn!(
                    url = %existing.url,
                    "Replacing draft release left by an interrupted run"
                );
                self.host
                    .delete_release(&existing)
                    .await
                    .map_err(into_publish_error)?;
            }
            Some(existing) => {
                debug!(url = %existing.url, "Release already exists on host");
                return Err(Error::duplicate_release(next.to_string()));
            }
            None => {}
        }

        let request = ReleaseRequest::new(next.clone(), tag_name.clone())
            .with_target(self.vcs.head_sha()?)
            .with_body(notes.body())
            .with_assets(assets.clone());

        let published = self
            .host
            .create_release(&request)
            .await
            .map_err(into_publish_error)?;
        info!(host = self.host.name(), url = %published.url, "Published release");

        state.published = Some(published);
        Ok(Transition::Next)
    }

    async fn commit_and_tag(&self, state: &mut RunState) -> Result<Transition> {
        let stage = Stage::CommitAndTag;
        let next = require(state.next.as_ref(), stage, "resolved version")?;
        let tag_name = require(state.tag_name.as_ref(), stage, "tag name")?;
        let notes = require(state.notes.as_ref(), stage, "release notes")?;
        let published = require(state.published.as_ref(), stage, "published release")?;
        let branch = require(state.branch.as_ref(), stage, "release branch")?;

        let mut files = vec![self.config.changelog.path.clone()];
        for file in &self.config.git.files {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }

        let request = CommitRequest {
            message: self
                .config
                .git
                .render_message(next, &notes.changelog_fragment()),
            files,
            tag_name: tag_name.clone(),
            tag_message: format!("Release {next}"),
            branch: branch.clone(),
            remote: self
                .config
                .git
                .push
                .then(|| self.config.git.remote.clone()),
        };
        let commit_sha = self.vcs.commit_and_tag(&request)?;

        self.host
            .finalize(published)
            .await
            .map_err(into_publish_error)?;

        info!(version = %next, tag = %tag_name, sha = %commit_sha, "Release complete");

        Ok(Transition::Finish(Outcome::Released(ReleaseRecord {
            version: next.clone(),
            previous_version: state.previous.clone(),
            tag_name: tag_name.clone(),
            commit_sha,
            notes: notes.clone(),
            assets: state.assets.clone().unwrap_or_default(),
            release_url: published.url.clone(),
        })))
    }
}

/// Host failures surface as publish failures, except a detected duplicate.
fn into_publish_error(error: Error) -> Error {
    match error {
        Error::DuplicateRelease { .. } | Error::PublishFailed { .. } => error,
        other => Error::publish_failed(other.to_string()),
    }
}
