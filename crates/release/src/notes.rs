//! Release notes generation.
//!
//! Notes are a category-ordered grouping of classified commits. The same
//! structure renders both the remote release body and the changelog
//! fragment, so the two never drift apart.

use crate::conventional::{ChangeCategory, CommitEntry};
use crate::version::Version;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// One line of the release notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteEntry {
    /// Optional scope, rendered in bold.
    pub scope: Option<String>,
    /// Change description.
    pub subject: String,
    /// Abbreviated commit hash.
    pub short_hash: String,
}

impl NoteEntry {
    fn from_commit(commit: &CommitEntry) -> Self {
        Self {
            scope: commit.scope.clone(),
            subject: commit.subject.clone(),
            short_hash: commit.short_hash().to_string(),
        }
    }

    fn to_markdown(&self) -> String {
        match &self.scope {
            Some(scope) => format!("- **{scope}**: {} ({})", self.subject, self.short_hash),
            None => format!("- {} ({})", self.subject, self.short_hash),
        }
    }
}

/// Structured release notes for one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseNotes {
    /// Version being released.
    pub version: Version,
    /// Previously released version, if any.
    pub previous: Option<Version>,
    /// Release date.
    pub date: NaiveDate,
    /// Entries grouped by category, in display order.
    pub sections: BTreeMap<ChangeCategory, Vec<NoteEntry>>,
}

impl ReleaseNotes {
    /// Total number of entries across all sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries of a single category.
    #[must_use]
    pub fn entries(&self, category: ChangeCategory) -> &[NoteEntry] {
        self.sections.get(&category).map_or(&[], Vec::as_slice)
    }

    /// The version heading line.
    #[must_use]
    pub fn heading(&self) -> String {
        format!("## [{}] - {}", self.version, self.date.format("%Y-%m-%d"))
    }

    /// Markdown body without the version heading (the remote release body).
    #[must_use]
    pub fn body(&self) -> String {
        let mut output = String::new();

        for (category, entries) in &self.sections {
            if entries.is_empty() {
                continue;
            }
            if !output.is_empty() {
                output.push('\n');
            }
            let _ = writeln!(output, "### {}\n", category.heading());
            for entry in entries {
                let _ = writeln!(output, "{}", entry.to_markdown());
            }
        }

        output
    }

    /// Changelog fragment: heading, body and a trailing blank line.
    #[must_use]
    pub fn changelog_fragment(&self) -> String {
        let body = self.body();
        if body.is_empty() {
            format!("{}\n\n", self.heading())
        } else {
            format!("{}\n\n{body}\n", self.heading())
        }
    }
}

/// Builds [`ReleaseNotes`] from classified commits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotesGenerator;

impl NotesGenerator {
    /// Create a new generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Group `commits` (oldest first) by category.
    ///
    /// Commits classified as [`ChangeCategory::None`] are left out.
    #[must_use]
    pub fn generate(
        &self,
        version: &Version,
        previous: Option<&Version>,
        commits: &[CommitEntry],
        date: NaiveDate,
    ) -> ReleaseNotes {
        let mut sections: BTreeMap<ChangeCategory, Vec<NoteEntry>> = BTreeMap::new();

        for commit in commits
            .iter()
            .filter(|c| c.category != ChangeCategory::None)
        {
            sections
                .entry(commit.category)
                .or_default()
                .push(NoteEntry::from_commit(commit));
        }

        ReleaseNotes {
            version: version.clone(),
            previous: previous.cloned(),
            date,
            sections,
        }
    }
}
