//! Version control access.
//!
//! The pipeline talks to the repository through the [`Vcs`] trait.
//! [`GitCli`] implements it over the system `git` binary, the same way the
//! rest of the release tooling shells out for history queries.

use crate::conventional::RawCommit;
use crate::error::{Error, Result};
use crate::version::Version;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// CI variables consulted when HEAD is detached, in order.
pub const BRANCH_ENV_FALLBACKS: [&str; 3] = ["GITHUB_REF_NAME", "CI_COMMIT_BRANCH", "BRANCH_NAME"];

// Emitted by `%x1e` and `%x00` in the log format.
const RECORD_SEPARATOR: char = '\u{1e}';
const FIELD_SEPARATOR: char = '\0';

/// Everything needed to record a release in history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    /// Release commit message.
    pub message: String,
    /// Files to stage, relative to the repository root.
    pub files: Vec<PathBuf>,
    /// Tag to create on the release commit.
    pub tag_name: String,
    /// Annotation message of the tag.
    pub tag_message: String,
    /// Branch the release commit is pushed to.
    pub branch: String,
    /// Remote to push to; `None` keeps everything local.
    pub remote: Option<String>,
}

/// Repository operations used by the release pipeline.
pub trait Vcs: Send + Sync {
    /// Name of the checked-out branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be determined.
    fn current_branch(&self) -> Result<String>;

    /// Full hash of HEAD.
    ///
    /// # Errors
    ///
    /// Returns an error if HEAD does not resolve.
    fn head_sha(&self) -> Result<String>;

    /// Highest release tag reachable from HEAD, with its parsed version.
    ///
    /// # Errors
    ///
    /// Returns an error if tags cannot be listed.
    fn latest_release(&self, prefix: &str) -> Result<Option<(String, Version)>>;

    /// Commits after `tag` up to HEAD, oldest first. `None` means the whole
    /// history.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<RawCommit>>;

    /// Whether `tag` exists locally or on the remote.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    fn tag_exists(&self, tag: &str) -> Result<bool>;

    /// Commit the release files, tag the commit and push both.
    ///
    /// Either everything lands or nothing does: a failure after the local
    /// commit removes the tag and the commit again, leaving the changes in
    /// the working tree. Returns the release commit hash.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    fn commit_and_tag(&self, request: &CommitRequest) -> Result<String>;
}

/// [`Vcs`] implementation over the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    remote: Option<String>,
}

impl GitCli {
    /// Create a client for the repository at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote: None,
        }
    }

    /// Also consult `remote` when checking for existing tags.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL of `remote`, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    pub fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        let output = self.command(&["remote", "get-url", remote])?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }

    fn command(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::git(format!("Failed to run git {}: {e}", args.join(" "))))
    }

    /// Run git and return trimmed stdout, failing on a non-zero exit.
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.command(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn has_commits(&self) -> Result<bool> {
        Ok(self
            .command(&["rev-parse", "--verify", "--quiet", "HEAD"])?
            .status
            .success())
    }

    fn rollback(&self, previous: &str, tag: Option<&str>) {
        if let Some(tag) = tag
            && let Err(e) = self.run(&["tag", "-d", tag])
        {
            warn!(error = %e, tag, "Failed to delete release tag during rollback");
        }
        if let Err(e) = self.run(&["reset", "--soft", previous]) {
            warn!(error = %e, "Failed to undo release commit during rollback");
        }
    }
}

impl Vcs for GitCli {
    fn current_branch(&self) -> Result<String> {
        let output = self.command(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        if output.status.success() {
            let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !branch.is_empty() {
                return Ok(branch);
            }
        }

        for var in BRANCH_ENV_FALLBACKS {
            if let Ok(value) = std::env::var(var)
                && !value.trim().is_empty()
            {
                debug!(var, branch = %value, "HEAD is detached, using branch from environment");
                return Ok(value.trim().to_string());
            }
        }

        Err(Error::git(
            "HEAD is detached and no branch name was found in GITHUB_REF_NAME, CI_COMMIT_BRANCH or BRANCH_NAME",
        ))
    }

    fn head_sha(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"])
    }

    fn latest_release(&self, prefix: &str) -> Result<Option<(String, Version)>> {
        if !self.has_commits()? {
            return Ok(None);
        }

        let pattern = format!("{prefix}*");
        let tags = self.run(&["tag", "--list", &pattern, "--merged", "HEAD"])?;

        let latest = tags
            .lines()
            .filter_map(|tag| {
                let version = tag.strip_prefix(prefix)?.parse::<Version>().ok()?;
                Some((tag.to_string(), version))
            })
            .max_by(|a, b| a.1.cmp(&b.1));

        debug!(prefix, latest = ?latest.as_ref().map(|(t, _)| t), "Resolved latest release tag");
        Ok(latest)
    }

    fn commits_since(&self, tag: Option<&str>) -> Result<Vec<RawCommit>> {
        if !self.has_commits()? {
            return Ok(Vec::new());
        }

        let range = tag.map_or_else(|| "HEAD".to_string(), |t| format!("{t}..HEAD"));
        let log = self.run(&["log", "--reverse", "--format=%H%x00%B%x1e", &range])?;

        let commits: Vec<RawCommit> = log
            .split(RECORD_SEPARATOR)
            .filter_map(|record| {
                let (hash, message) = record.trim_start().split_once(FIELD_SEPARATOR)?;
                Some(RawCommit::new(hash.trim(), message.trim()))
            })
            .collect();

        debug!(range = %range, count = commits.len(), "Read commit log");
        Ok(commits)
    }

    fn tag_exists(&self, tag: &str) -> Result<bool> {
        let reference = format!("refs/tags/{tag}");
        if self
            .command(&["rev-parse", "--verify", "--quiet", &reference])?
            .status
            .success()
        {
            return Ok(true);
        }

        let Some(remote) = &self.remote else {
            return Ok(false);
        };
        if self.remote_url(remote)?.is_none() {
            debug!(remote = %remote, "Remote not configured, checked local tags only");
            return Ok(false);
        }
        let listed = self.run(&["ls-remote", "--tags", remote, &reference])?;
        Ok(!listed.is_empty())
    }

    fn commit_and_tag(&self, request: &CommitRequest) -> Result<String> {
        let previous = self.head_sha()?;

        let files: Vec<String> = request
            .files
            .iter()
            .filter(|f| self.root.join(f).exists())
            .map(|f| f.to_string_lossy().into_owned())
            .collect();
        if !files.is_empty() {
            let mut args = vec!["add", "--"];
            args.extend(files.iter().map(String::as_str));
            self.run(&args)?;
        }

        self.run(&["commit", "--allow-empty", "-m", &request.message])?;
        let sha = self.head_sha()?;

        if let Err(e) = self.run(&["tag", "-a", &request.tag_name, "-m", &request.tag_message]) {
            self.rollback(&previous, None);
            return Err(e);
        }

        if let Some(remote) = &request.remote {
            let branch_ref = format!("HEAD:refs/heads/{}", request.branch);
            let tag_ref = format!("refs/tags/{}", request.tag_name);
            if let Err(e) = self.run(&["push", "--atomic", remote, &branch_ref, &tag_ref]) {
                self.rollback(&previous, Some(&request.tag_name));
                return Err(e);
            }
        }

        info!(sha = %sha, tag = %request.tag_name, "Recorded release commit and tag");
        Ok(sha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git(path: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(path)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn init_git_repo(path: &Path) {
        git(path, &["init", "-q"]);
        git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(path, &["config", "user.name", "Test User"]);
        git(path, &["config", "user.email", "test@example.com"]);
        git(path, &["config", "commit.gpgsign", "false"]);
        git(path, &["config", "tag.gpgsign", "false"]);
    }

    fn create_commit(path: &Path, file: &str, message: &str) -> String {
        fs::write(path.join(file), message).unwrap();
        git(path, &["add", "."]);
        git(path, &["commit", "-q", "-m", message]);
        git(path, &["rev-parse", "HEAD"])
    }

    fn request(remote: Option<&str>) -> CommitRequest {
        CommitRequest {
            message: "chore(release): 1.3.0 [skip ci]".to_string(),
            files: vec![PathBuf::from("CHANGELOG.md"), PathBuf::from("Cargo.toml")],
            tag_name: "v1.3.0".to_string(),
            tag_message: "Release 1.3.0".to_string(),
            branch: "main".to_string(),
            remote: remote.map(String::from),
        }
    }

    #[test]
    fn test_current_branch() {
        let temp = TempDir::new().unwrap();
        init_git_repo(temp.path());
        create_commit(temp.path(), "a.txt", "feat: a");

        assert_eq!(GitCli::new(temp.path()).current_branch().unwrap(), "main");
    }

    #[test]
    fn test_current_branch_detached_uses_environment() {
        let temp = TempDir::new().unwrap();
        init_git_repo(temp.path());
        create_commit(temp.path(), "a.txt", "feat: a");
        git(temp.path(), &["checkout", "-q", "--detach"]);

        let vcs = GitCli::new(temp.path());
        temp_env::with_vars(
            [
                ("GITHUB_REF_NAME", None),
                ("CI_COMMIT_BRANCH", Some("main")),
                ("BRANCH_NAME", Some("other")),
            ],
            || assert_eq!(vcs.current_branch().unwrap(), "main"),
        );
        temp_env::with_vars_unset(BRANCH_ENV_FALLBACKS, || {
            assert!(vcs.current_branch().is_err());
        });
    }

    #[test]
    fn test_empty_repository() {
        let temp = TempDir::new().unwrap();
        init_git_repo(temp.path());

        let vcs = GitCli::new(temp.path());
        assert!(vcs.latest_release("v").unwrap().is_none());
        assert!(vcs.commits_since(None).unwrap().is_empty());
    }

    #[test]
    fn test_latest_release_highest_merged_tag() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        init_git_repo(root);

        create_commit(root, "a.txt", "feat: a");
        git(root, &["tag", "v1.0.0"]);
        create_commit(root, "b.txt", "fix: b");
        git(root, &["tag", "v1.2.3"]);
        git(root, &["tag", "vnext"]);

        git(root, &["checkout", "-q", "-b", "side"]);
        create_commit(root, "c.txt", "feat: c");
        git(root, &["tag", "v9.0.0"]);
        git(root, &["checkout", "-q", "main"]);

        let latest = GitCli::new(root).latest_release("v").unwrap().unwrap();
        assert_eq!(latest, ("v1.2.3".to_string(), Version::new(1, 2, 3)));
    }

    #[test]
    fn test_latest_release_orders_prereleases_numerically() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        init_git_repo(root);

        create_commit(root, "a.txt", "feat: a");
        git(root, &["tag", "v1.0.0-rc.2"]);
        create_commit(root, "b.txt", "fix: b");
        git(root, &["tag", "v1.0.0-rc.10"]);

        let (tag, _) = GitCli::new(root).latest_release("v").unwrap().unwrap();
        assert_eq!(tag, "v1.0.0-rc.10");
    }

    #[test]
    fn test_tag_exists_without_configured_remote() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        init_git_repo(root);
        create_commit(root, "a.txt", "feat: a");

        let vcs = GitCli::new(root).with_remote("origin");
        assert!(!vcs.tag_exists("v1.0.0").unwrap());

        git(root, &["tag", "v1.0.0"]);
        assert!(vcs.tag_exists("v1.0.0").unwrap());
    }

    #[test]
    fn test_commits_since_tag_oldest_first() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        init_git_repo(root);

        create_commit(root, "a.txt", "feat: a");
        git(root, &["tag", "v1.2.3"]);
        let first = create_commit(root, "b.txt", "fix: x\n\nlonger body");
        let second = create_commit(root, "c.txt", "feat: y");

        let commits = GitCli::new(root).commits_since(Some("v1.2.3")).unwrap();
        assert_eq!(
            commits,
            vec![
                RawCommit::new(first, "fix: x\n\nlonger body"),
                RawCommit::new(second, "feat: y"),
            ]
        );

        assert_eq!(GitCli::new(root).commits_since(None).unwrap().len(), 3);
    }

    #[test]
    fn test_commit_and_tag_pushes_atomically() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("work");
        let remote = temp.path().join("remote.git");
        fs::create_dir_all(&root).unwrap();
        git(temp.path(), &["init", "-q", "--bare", "remote.git"]);

        init_git_repo(&root);
        create_commit(&root, "Cargo.toml", "feat: y");
        git(&root, &["remote", "add", "origin", remote.to_str().unwrap()]);

        fs::write(root.join("CHANGELOG.md"), "# Changelog\n").unwrap();
        fs::write(root.join("Cargo.toml"), "version = \"1.3.0\"\n").unwrap();

        let vcs = GitCli::new(&root).with_remote("origin");
        let sha = vcs.commit_and_tag(&request(Some("origin"))).unwrap();

        assert_eq!(git(&root, &["rev-parse", "HEAD"]), sha);
        assert_eq!(git(&root, &["status", "--porcelain"]), "");
        assert_eq!(git(&remote, &["rev-parse", "refs/heads/main"]), sha);
        assert_eq!(git(&remote, &["rev-parse", "v1.3.0^{commit}"]), sha);
        assert!(vcs.tag_exists("v1.3.0").unwrap());
        assert!(!vcs.tag_exists("v9.9.9").unwrap());
    }

    #[test]
    fn test_commit_and_tag_rolls_back_on_push_failure() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        init_git_repo(root);
        let before = create_commit(root, "Cargo.toml", "feat: y");
        git(root, &["remote", "add", "origin", "/nonexistent/remote.git"]);

        fs::write(root.join("CHANGELOG.md"), "# Changelog\n").unwrap();

        let vcs = GitCli::new(root);
        assert!(vcs.commit_and_tag(&request(Some("origin"))).is_err());

        assert_eq!(git(root, &["rev-parse", "HEAD"]), before);
        assert!(!vcs.tag_exists("v1.3.0").unwrap());
        assert_eq!(
            fs::read_to_string(root.join("CHANGELOG.md")).unwrap(),
            "# Changelog\n"
        );
    }

    #[test]
    fn test_commit_and_tag_local_only() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        init_git_repo(root);
        create_commit(root, "a.txt", "feat: y");
        fs::write(root.join("CHANGELOG.md"), "# Changelog\n").unwrap();

        let vcs = GitCli::new(root);
        let sha = vcs.commit_and_tag(&request(None)).unwrap();

        assert_eq!(git(root, &["log", "-1", "--format=%s"]), "chore(release): 1.3.0 [skip ci]");
        assert_eq!(git(root, &["rev-parse", "v1.3.0^{commit}"]), sha);
        assert!(vcs.latest_release("v").unwrap().is_some());
    }
}
