//! Pipeline behavior against in-memory VCS and release host fakes.

use chrono::NaiveDate;
use shipit_release::assets::PlatformAsset;
use shipit_release::{
    AssetDeclaration, ChangeCategory, CommandStamper, CommitRequest, Error, HostFuture, Outcome,
    PublishedRelease, RawCommit, ReleaseConfig, ReleaseHost, ReleasePipeline, ReleaseRequest,
    Result, Stage, Vcs, Version, VersionStamper,
};
use shipit_release::config::DryRun;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct VcsState {
    branch: String,
    tags: Vec<(String, Version)>,
    commits: Vec<RawCommit>,
    commit_requests: Vec<CommitRequest>,
    fail_commit: bool,
}

#[derive(Clone, Default)]
struct FakeVcs(Arc<Mutex<VcsState>>);

impl FakeVcs {
    fn new(branch: &str, last: Option<&str>, messages: &[&str]) -> Self {
        let state = VcsState {
            branch: branch.to_string(),
            tags: last
                .map(|v| vec![(format!("v{v}"), v.parse().unwrap())])
                .unwrap_or_default(),
            commits: messages
                .iter()
                .enumerate()
                .map(|(i, m)| RawCommit::new(format!("{i:07}aaaaaaaaaaaa"), *m))
                .collect(),
            ..Default::default()
        };
        Self(Arc::new(Mutex::new(state)))
    }

    fn commit_requests(&self) -> Vec<CommitRequest> {
        self.0.lock().unwrap().commit_requests.clone()
    }
}

impl Vcs for FakeVcs {
    fn current_branch(&self) -> Result<String> {
        Ok(self.0.lock().unwrap().branch.clone())
    }

    fn head_sha(&self) -> Result<String> {
        Ok("headsha0000".to_string())
    }

    fn latest_release(&self, prefix: &str) -> Result<Option<(String, Version)>> {
        let state = self.0.lock().unwrap();
        Ok(state
            .tags
            .iter()
            .filter(|(tag, _)| tag.starts_with(prefix))
            .max_by(|a, b| a.1.cmp(&b.1))
            .cloned())
    }

    fn commits_since(&self, _tag: Option<&str>) -> Result<Vec<RawCommit>> {
        Ok(self.0.lock().unwrap().commits.clone())
    }

    fn tag_exists(&self, tag: &str) -> Result<bool> {
        Ok(self.0.lock().unwrap().tags.iter().any(|(t, _)| t == tag))
    }

    fn commit_and_tag(&self, request: &CommitRequest) -> Result<String> {
        let mut state = self.0.lock().unwrap();
        if state.fail_commit {
            return Err(Error::git("push rejected"));
        }
        let version = request.tag_name.trim_start_matches('v').parse()?;
        state.tags.push((request.tag_name.clone(), version));
        state.commits = vec![RawCommit::new("releasesha00", request.message.clone())];
        state.commit_requests.push(request.clone());
        Ok("releasesha00".to_string())
    }
}

#[derive(Default)]
struct HostState {
    created: Vec<ReleaseRequest>,
    releases: Vec<PublishedRelease>,
    finalized: Vec<String>,
    deleted: Vec<String>,
    existing: Vec<String>,
    fail_create: Option<String>,
}

#[derive(Clone, Default)]
struct FakeHost(Arc<Mutex<HostState>>);

impl FakeHost {
    fn created(&self) -> Vec<ReleaseRequest> {
        self.0.lock().unwrap().created.clone()
    }

    fn finalized(&self) -> Vec<String> {
        self.0.lock().unwrap().finalized.clone()
    }

    fn releases(&self) -> Vec<PublishedRelease> {
        self.0.lock().unwrap().releases.clone()
    }

    fn deleted(&self) -> Vec<String> {
        self.0.lock().unwrap().deleted.clone()
    }
}

impl ReleaseHost for FakeHost {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn find_release<'a>(&'a self, tag: &'a str) -> HostFuture<'a, Option<PublishedRelease>> {
        Box::pin(async move {
            let state = self.0.lock().unwrap();
            if let Some(release) = state.releases.iter().find(|r| r.tag_name == tag) {
                return Ok(Some(release.clone()));
            }
            Ok(state
                .existing
                .iter()
                .find(|t| *t == tag)
                .map(|t| PublishedRelease::new("0", format!("https://host/{t}"), t)))
        })
    }

    fn create_release<'a>(
        &'a self,
        request: &'a ReleaseRequest,
    ) -> HostFuture<'a, PublishedRelease> {
        Box::pin(async move {
            let mut state = self.0.lock().unwrap();
            if let Some(reason) = &state.fail_create {
                return Err(Error::backend("fake", reason.clone(), None));
            }
            state.created.push(request.clone());
            let release = PublishedRelease::new(
                state.created.len().to_string(),
                format!("https://host/{}", request.tag_name),
                &request.tag_name,
            )
            .with_draft(true);
            state.releases.push(release.clone());
            Ok(release)
        })
    }

    fn delete_release<'a>(&'a self, release: &'a PublishedRelease) -> HostFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.0.lock().unwrap();
            state.releases.retain(|r| r.id != release.id);
            state.deleted.push(release.id.clone());
            Ok(())
        })
    }

    fn finalize<'a>(&'a self, release: &'a PublishedRelease) -> HostFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.0.lock().unwrap();
            for stored in state.releases.iter_mut().filter(|r| r.id == release.id) {
                stored.draft = false;
            }
            state.finalized.push(release.tag_name.clone());
            Ok(())
        })
    }
}

#[derive(Clone, Default)]
struct RecordingStamper(Arc<Mutex<Vec<Version>>>);

impl VersionStamper for RecordingStamper {
    fn name(&self) -> &str {
        "recording"
    }

    fn stamp(&self, version: &Version) -> Result<()> {
        self.0.lock().unwrap().push(version.clone());
        Ok(())
    }
}

struct Harness {
    temp: TempDir,
    vcs: FakeVcs,
    host: FakeHost,
    stamper: RecordingStamper,
    config: ReleaseConfig,
}

impl Harness {
    fn new(vcs: FakeVcs) -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            vcs,
            host: FakeHost::default(),
            stamper: RecordingStamper::default(),
            config: ReleaseConfig::default(),
        }
    }

    fn pipeline(&self) -> ReleasePipeline {
        ReleasePipeline::new(
            self.config.clone(),
            self.temp.path(),
            Box::new(self.vcs.clone()),
            Box::new(self.host.clone()),
        )
        .with_stamper(Box::new(self.stamper.clone()))
        .with_date(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
    }

    fn changelog(&self) -> Option<String> {
        fs::read_to_string(self.temp.path().join("CHANGELOG.md")).ok()
    }

    fn stamped(&self) -> Vec<Version> {
        self.stamper.0.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_feature_and_fix_release_minor() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["fix: x", "feat: y"]));

    let run = harness.pipeline().execute().await;
    assert_eq!(
        run.transitions,
        [
            Stage::Start,
            Stage::GateBranch,
            Stage::Classify,
            Stage::ResolveVersion,
            Stage::GenerateNotes,
            Stage::ResolveAssets,
            Stage::StampVersion,
            Stage::Publish,
            Stage::CommitAndTag,
            Stage::End,
        ]
    );

    let Outcome::Released(record) = run.result.unwrap() else {
        panic!("expected a release");
    };
    assert_eq!(record.version, Version::new(1, 3, 0));
    assert_eq!(record.previous_version, Some(Version::new(1, 2, 3)));
    assert_eq!(record.tag_name, "v1.3.0");
    assert_eq!(record.commit_sha, "releasesha00");
    assert_eq!(record.release_url, "https://host/v1.3.0");
    assert_eq!(record.notes.entries(ChangeCategory::Feature).len(), 1);
    assert_eq!(record.notes.entries(ChangeCategory::Fix).len(), 1);

    let created = harness.host.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].target_commitish, "headsha0000");
    assert!(created[0].body.contains("### Features"));
    assert_eq!(harness.host.finalized(), ["v1.3.0"]);

    let changelog = harness.changelog().unwrap();
    assert_eq!(changelog.matches("## [1.3.0] - 2026-10-18").count(), 1);
    assert_eq!(harness.stamped(), [Version::new(1, 3, 0)]);

    let commits = harness.vcs.commit_requests();
    assert_eq!(commits.len(), 1);
    assert!(commits[0].message.starts_with("chore(release): 1.3.0 [skip ci]\n\n## [1.3.0]"));
    assert_eq!(commits[0].files[0].to_str(), Some("CHANGELOG.md"));
    assert_eq!(commits[0].remote.as_deref(), Some("origin"));
}

#[tokio::test]
async fn test_rerun_after_release_is_noop() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["fix: x", "feat: y"]));
    assert!(harness.pipeline().run().await.unwrap().is_released());

    let outcome = harness.pipeline().run().await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::NothingToRelease { last: Some(ref v) } if *v == Version::new(1, 3, 0)
    ));
    assert_eq!(harness.host.created().len(), 1);
    assert_eq!(harness.vcs.commit_requests().len(), 1);
}

#[tokio::test]
async fn test_breaking_change_bumps_major() {
    let harness = Harness::new(FakeVcs::new(
        "main",
        Some("1.2.3"),
        &["fix: a", "feat(api)!: drop v1", "feat: b"],
    ));

    let Outcome::Released(record) = harness.pipeline().run().await.unwrap() else {
        panic!("expected a release");
    };
    assert_eq!(record.version, Version::new(2, 0, 0));
}

#[tokio::test]
async fn test_first_release_uses_initial_version() {
    let harness = Harness::new(FakeVcs::new("main", None, &["feat: first"]));

    let Outcome::Released(record) = harness.pipeline().run().await.unwrap() else {
        panic!("expected a release");
    };
    assert_eq!(record.version, Version::new(1, 0, 0));
    assert!(record.previous_version.is_none());
    assert!(harness.changelog().unwrap().starts_with("# Changelog\n\n## [1.0.0]"));
}

#[tokio::test]
async fn test_only_none_commits_release_nothing() {
    let harness = Harness::new(FakeVcs::new(
        "main",
        Some("1.2.3"),
        &["chore: deps", "docs: readme", "not conventional at all"],
    ));

    let run = harness.pipeline().execute().await;
    assert_eq!(
        run.transitions,
        [
            Stage::Start,
            Stage::GateBranch,
            Stage::Classify,
            Stage::ResolveVersion,
            Stage::End,
        ]
    );
    assert!(matches!(run.result, Ok(Outcome::NothingToRelease { .. })));
    assert!(harness.host.created().is_empty());
    assert!(harness.vcs.commit_requests().is_empty());
    assert!(harness.changelog().is_none());
    assert!(harness.stamped().is_empty());
}

#[tokio::test]
async fn test_wrong_branch_is_noop() {
    let harness = Harness::new(FakeVcs::new("feature/x", Some("1.2.3"), &["feat: y"]));

    let run = harness.pipeline().execute().await;
    assert_eq!(run.transitions, [Stage::Start, Stage::GateBranch, Stage::End]);
    let Ok(Outcome::WrongBranch { current, expected }) = run.result else {
        panic!("expected wrong branch");
    };
    assert_eq!(current, "feature/x");
    assert_eq!(expected, "main");
    assert!(harness.host.created().is_empty());
}

#[tokio::test]
async fn test_branch_override() {
    let harness = Harness::new(FakeVcs::new("detached", Some("1.2.3"), &["fix: y"]));
    let outcome = harness.pipeline().with_branch("main").run().await.unwrap();
    assert!(outcome.is_released());
}

#[tokio::test]
async fn test_missing_asset_aborts_before_any_write() {
    let mut harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["feat: y"]));
    fs::write(harness.temp.path().join("a"), b"linux").unwrap();
    harness.config.assets = vec![AssetDeclaration::Platforms {
        entries: vec![
            PlatformAsset {
                path: "a".to_string(),
                label: "Linux".to_string(),
            },
            PlatformAsset {
                path: "b".to_string(),
                label: "Windows".to_string(),
            },
        ],
    }];

    let run = harness.pipeline().execute().await;
    assert_eq!(run.transitions.last(), Some(&Stage::ResolveAssets));
    match run.result {
        Err(Error::AssetMissing { declaration, .. }) => assert_eq!(declaration, "b"),
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(harness.host.created().is_empty());
    assert!(harness.vcs.commit_requests().is_empty());
    assert!(harness.changelog().is_none());
    assert!(harness.stamped().is_empty());
}

#[tokio::test]
async fn test_assets_are_uploaded_with_labels() {
    let mut harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["feat: y"]));
    fs::create_dir_all(harness.temp.path().join("target/release")).unwrap();
    fs::write(harness.temp.path().join("target/release/zk_whitelist"), b"bin").unwrap();
    harness.config.assets = vec![AssetDeclaration::File {
        path: "target/release/zk_whitelist".to_string(),
        label: Some("zk_whitelist v{version}".to_string()),
    }];

    harness.pipeline().run().await.unwrap();

    let created = harness.host.created();
    assert_eq!(created[0].assets.len(), 1);
    assert_eq!(created[0].assets[0].name, "zk_whitelist");
    assert_eq!(created[0].assets[0].label, "zk_whitelist v1.3.0");
}

#[tokio::test]
async fn test_publish_failure_creates_no_commit_or_tag() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["feat: y"]));
    harness.host.0.lock().unwrap().fail_create = Some("502 Bad Gateway".to_string());

    let run = harness.pipeline().execute().await;
    assert!(!run.entered(Stage::CommitAndTag));
    assert_eq!(run.transitions.last(), Some(&Stage::Publish));
    match run.result {
        Err(Error::PublishFailed { reason }) => assert!(reason.contains("502")),
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(harness.vcs.commit_requests().is_empty());
    assert!(!harness.vcs.tag_exists("v1.3.0").unwrap());
    // Local changes stay behind uncommitted.
    assert!(harness.changelog().is_some());
}

#[tokio::test]
async fn test_retry_after_publish_failure_writes_changelog_once() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["feat: y"]));
    harness.host.0.lock().unwrap().fail_create = Some("timeout".to_string());
    assert!(harness.pipeline().run().await.is_err());

    harness.host.0.lock().unwrap().fail_create = None;
    assert!(harness.pipeline().run().await.unwrap().is_released());

    assert_eq!(harness.changelog().unwrap().matches("## [1.3.0]").count(), 1);
    assert_eq!(harness.host.created().len(), 1);
}

#[tokio::test]
async fn test_existing_host_release_is_duplicate() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["feat: y"]));
    harness.host.0.lock().unwrap().existing = vec!["v1.3.0".to_string()];

    let result = harness.pipeline().run().await;
    assert!(matches!(result, Err(Error::DuplicateRelease { ref version }) if version == "1.3.0"));
    assert!(harness.host.created().is_empty());
    assert!(harness.vcs.commit_requests().is_empty());
}

#[tokio::test]
async fn test_stamp_failure_stops_before_publish() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["fix: y"]));
    let pipeline = harness
        .pipeline()
        .with_stamper(Box::new(CommandStamper::new("exit 7", harness.temp.path())));

    let run = pipeline.execute().await;
    assert!(matches!(
        run.result,
        Err(Error::StampCommandFailed {
            exit_code: Some(7),
            ..
        })
    ));
    assert!(!run.entered(Stage::Publish));
    assert!(harness.host.created().is_empty());
    assert!(harness.changelog().is_none());
}

#[tokio::test]
async fn test_commit_failure_leaves_release_unfinalized() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["feat: y"]));
    harness.vcs.0.lock().unwrap().fail_commit = true;

    let result = harness.pipeline().run().await;
    assert!(matches!(result, Err(Error::Git { .. })));
    assert_eq!(harness.host.created().len(), 1);
    assert!(harness.host.finalized().is_empty());
}

#[tokio::test]
async fn test_retry_after_commit_failure_replaces_draft() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["feat: y"]));
    harness.vcs.0.lock().unwrap().fail_commit = true;
    assert!(harness.pipeline().run().await.is_err());
    assert!(harness.host.releases()[0].draft);

    harness.vcs.0.lock().unwrap().fail_commit = false;
    let outcome = harness.pipeline().run().await.unwrap();
    assert!(outcome.is_released());

    let releases = harness.host.releases();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].tag_name, "v1.3.0");
    assert_eq!(releases[0].id, "2");
    assert!(!releases[0].draft);
    assert_eq!(harness.host.deleted(), ["1"]);
    assert_eq!(harness.host.finalized(), ["v1.3.0"]);

    let changelog = harness.changelog().unwrap();
    assert_eq!(changelog.matches("## [1.3.0]").count(), 1);
}

#[tokio::test]
async fn test_finalized_release_on_host_is_duplicate() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["feat: y"]));
    harness.host.0.lock().unwrap().releases =
        vec![PublishedRelease::new("9", "https://host/v1.3.0", "v1.3.0")];

    let result = harness.pipeline().run().await;
    assert!(matches!(result, Err(Error::DuplicateRelease { .. })));
    assert!(harness.host.deleted().is_empty());
    assert!(harness.host.created().is_empty());
}

#[tokio::test]
async fn test_dry_run_has_no_side_effects() {
    let harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["fix: x", "feat: y"]));

    let run = harness.pipeline().with_dry_run(DryRun::Yes).execute().await;
    assert_eq!(run.transitions.last(), Some(&Stage::End));
    assert!(!run.entered(Stage::StampVersion));

    let Ok(Outcome::DryRun(plan)) = run.result else {
        panic!("expected a dry-run plan");
    };
    assert_eq!(plan.version, Version::new(1, 3, 0));
    assert_eq!(plan.tag_name, "v1.3.0");
    assert_eq!(plan.notes.len(), 2);

    assert!(harness.stamped().is_empty());
    assert!(harness.changelog().is_none());
    assert!(harness.host.created().is_empty());
    assert!(harness.vcs.commit_requests().is_empty());
}

#[tokio::test]
async fn test_push_disabled_keeps_commit_local() {
    let mut harness = Harness::new(FakeVcs::new("main", Some("1.2.3"), &["fix: y"]));
    harness.config.git.push = false;

    harness.pipeline().run().await.unwrap();
    assert!(harness.vcs.commit_requests()[0].remote.is_none());
}
