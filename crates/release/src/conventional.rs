//! Commit classification.
//!
//! Turns raw commit messages into [`CommitEntry`] values carrying a
//! [`ChangeCategory`]. The default policy uses the `git-conventional` crate to
//! parse messages following the Conventional Commits specification. Messages
//! that do not parse are classified as [`ChangeCategory::None`]; classification
//! never fails.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A commit as read from the VCS log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    /// The full commit hash.
    pub hash: String,
    /// The full commit message (subject, body and footers).
    pub message: String,
}

impl RawCommit {
    /// Create a new raw commit.
    #[must_use]
    pub fn new(hash: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            message: message.into(),
        }
    }
}

/// Coarse classification of a commit's intent.
///
/// The declaration order is the display order of release notes, so the
/// derived `Ord` sorts breaking changes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCategory {
    /// Incompatible API change.
    Breaking,
    /// New functionality.
    Feature,
    /// Bug fix or performance improvement.
    Fix,
    /// Anything that does not warrant a release on its own.
    None,
}

impl ChangeCategory {
    /// Heading used for this category in release notes.
    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::Breaking => "Breaking Changes",
            Self::Feature => "Features",
            Self::Fix => "Bug Fixes",
            Self::None => "Other Changes",
        }
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Breaking => write!(f, "breaking"),
            Self::Feature => write!(f, "feature"),
            Self::Fix => write!(f, "fix"),
            Self::None => write!(f, "none"),
        }
    }
}

/// A classified commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    /// The full commit hash.
    pub hash: String,
    /// The commit description (first line, without the type prefix).
    pub subject: String,
    /// Optional commit body.
    pub body: Option<String>,
    /// The change category driving the version bump.
    pub category: ChangeCategory,
    /// Optional conventional-commit scope.
    pub scope: Option<String>,
}

impl CommitEntry {
    /// Abbreviated commit hash for display.
    #[must_use]
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }
}

/// Policy that maps raw commits to categories.
pub trait CommitClassifier: Send + Sync {
    /// Classify a single commit. Must not fail: unrecognized messages map to
    /// [`ChangeCategory::None`].
    fn classify(&self, commit: &RawCommit) -> CommitEntry;

    /// Classify a sequence of commits, preserving order.
    fn classify_all(&self, commits: &[RawCommit]) -> Vec<CommitEntry> {
        commits.iter().map(|c| self.classify(c)).collect()
    }
}

/// Conventional Commits classifier (the default policy).
///
/// - `!` after the type or a `BREAKING CHANGE` footer: breaking
/// - `feat`: feature
/// - `fix`, `perf`, `revert`: fix
/// - anything else, including unparseable messages: none
#[derive(Debug, Clone, Copy, Default)]
pub struct ConventionalClassifier;

impl ConventionalClassifier {
    /// Create a new conventional classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn category_for(commit_type: &str, breaking: bool) -> ChangeCategory {
        if breaking {
            return ChangeCategory::Breaking;
        }

        match commit_type {
            "feat" => ChangeCategory::Feature,
            "fix" | "perf" | "revert" => ChangeCategory::Fix,
            _ => ChangeCategory::None,
        }
    }
}

impl CommitClassifier for ConventionalClassifier {
    fn classify(&self, commit: &RawCommit) -> CommitEntry {
        let message = commit.message.trim();

        match git_conventional::Commit::parse(message) {
            Ok(parsed) => {
                let commit_type = parsed.type_().to_string().to_lowercase();
                CommitEntry {
                    hash: commit.hash.clone(),
                    subject: parsed.description().to_string(),
                    body: parsed.body().map(|b| b.to_string()),
                    category: Self::category_for(&commit_type, parsed.breaking()),
                    scope: parsed.scope().map(|s| s.to_string()),
                }
            }
            Err(_) => {
                let (subject, body) = split_message(message);
                CommitEntry {
                    hash: commit.hash.clone(),
                    subject,
                    body,
                    category: ChangeCategory::None,
                    scope: None,
                }
            }
        }
    }
}

/// Split a free-form message into its first line and the remaining body.
fn split_message(message: &str) -> (String, Option<String>) {
    let mut parts = message.splitn(2, '\n');
    let subject = parts.next().unwrap_or_default().trim().to_string();
    let body = parts
        .next()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(String::from);
    (subject, body)
}
