//! Changelog file maintenance.
//!
//! The changelog is newest first: a release fragment goes immediately before
//! the first existing `## ` release heading, skipping an `## [Unreleased]`
//! section. A file without release headings gets the fragment appended.
//! Everything else in the file is left untouched byte for byte.

use crate::config::ChangelogConfig;
use crate::error::{Error, Result};
use crate::version::Version;
use std::fs;
use std::path::{Path, PathBuf};

/// What [`ChangelogWriter::write`] did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangelogUpdate {
    /// The file did not exist and was created with the title block.
    Created,
    /// The fragment was inserted into existing content.
    Inserted,
    /// A section for the same version was already present and was replaced.
    Replaced,
}

/// Writes release fragments into the changelog file.
#[derive(Debug, Clone)]
pub struct ChangelogWriter {
    path: PathBuf,
    title: String,
}

impl ChangelogWriter {
    /// Create a writer for the changelog at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
        }
    }

    /// Create a writer from configuration, resolving the path against `root`.
    #[must_use]
    pub fn from_config(root: &Path, config: &ChangelogConfig) -> Self {
        Self::new(root.join(&config.path), config.title.clone())
    }

    /// Path of the changelog file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert the fragment for `version`.
    ///
    /// A section already headed with the same version is replaced instead of
    /// duplicated, so re-running after a failed publish stays idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written.
    pub fn write(&self, version: &Version, fragment: &str) -> Result<ChangelogUpdate> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::changelog_io(
                        format!("Failed to create directory {}", parent.display()),
                        Some(parent.to_path_buf()),
                        e,
                    )
                })?;
            }
            self.persist(&format!("{}\n\n{fragment}", self.title.trim_end()))?;
            return Ok(ChangelogUpdate::Created);
        }

        let existing = fs::read_to_string(&self.path).map_err(|e| {
            Error::changelog_io(
                format!("Failed to read {}", self.path.display()),
                Some(self.path.clone()),
                e,
            )
        })?;

        let (content, update) = splice(&existing, version, fragment);
        self.persist(&content)?;
        Ok(update)
    }

    fn persist(&self, content: &str) -> Result<()> {
        fs::write(&self.path, content).map_err(|e| {
            Error::changelog_io(
                format!("Failed to write {}", self.path.display()),
                Some(self.path.clone()),
                e,
            )
        })
    }
}

/// Byte offsets of lines starting with `## `.
fn release_headings(content: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    content.split_inclusive('\n').filter_map(move |line| {
        let start = offset;
        offset += line.len();
        line.starts_with("## ").then_some((start, line))
    })
}

/// `## [Unreleased]` (or `## Unreleased`) collects pending notes and stays on top.
fn is_unreleased(heading: &str) -> bool {
    let title = heading[3..].trim();
    let title = title
        .strip_prefix('[')
        .and_then(|t| t.split_once(']'))
        .map_or(title, |(inner, _)| inner);
    title.eq_ignore_ascii_case("unreleased")
}

fn splice(existing: &str, version: &Version, fragment: &str) -> (String, ChangelogUpdate) {
    let marker = format!("## [{version}]");
    let mut first = None;
    for (start, line) in release_headings(existing) {
        if line.starts_with(&marker) {
            let end = release_headings(existing)
                .map(|(offset, _)| offset)
                .find(|offset| *offset > start)
                .unwrap_or(existing.len());
            let content = format!("{}{fragment}{}", &existing[..start], &existing[end..]);
            return (content, ChangelogUpdate::Replaced);
        }
        if first.is_none() && !is_unreleased(line) {
            first = Some(start);
        }
    }

    match first {
        Some(at) => (
            format!("{}{fragment}{}", &existing[..at], &existing[at..]),
            ChangelogUpdate::Inserted,
        ),
        None => {
            // The heading must start its own line.
            let separator = if existing.is_empty() || existing.ends_with('\n') {
                ""
            } else {
                "\n"
            };
            (
                format!("{existing}{separator}{fragment}"),
                ChangelogUpdate::Inserted,
            )
        }
    }
}
