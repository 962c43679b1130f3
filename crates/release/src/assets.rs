//! Release asset resolution.
//!
//! Asset declarations come in several shapes that grew over time: a bare
//! path, platform-labeled paths, a template instantiated per target triple,
//! and pre-built archive bundles. They are one closed sum type. Each variant
//! expands into uniform [`AssetCandidate`]s and a single verification pass
//! turns those into [`ResolvedAsset`]s. Resolution is all-or-nothing.

use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A path with a human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAsset {
    /// Path template (`{version}` is expanded).
    pub path: String,
    /// Label shown on the release page.
    pub label: String,
}

/// A target triple with its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAsset {
    /// Rust target triple substituted for `{target}`.
    pub triple: String,
    /// Label shown on the release page (`{target}` and `{version}` are expanded).
    pub label: String,
}

/// Declarative description of release assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AssetDeclaration {
    /// A single fixed path.
    File {
        /// Path template.
        path: String,
        /// Optional label; defaults to the file name.
        #[serde(default)]
        label: Option<String>,
    },
    /// Platform-labeled paths.
    Platforms {
        /// One entry per platform.
        entries: Vec<PlatformAsset>,
    },
    /// One path template instantiated per target triple.
    ///
    /// Cargo's per-triple layout gives every binary the same file name, so
    /// uploads are named `<file>-<triple>` (`<file>-<triple>.exe` for Windows
    /// executables) unless a `name` template is given.
    Targets {
        /// Path template containing `{target}`.
        path: String,
        /// Target triples to instantiate.
        targets: Vec<TargetAsset>,
        /// Upload name template (`{target}` and `{version}` are expanded).
        #[serde(default)]
        name: Option<String>,
    },
    /// Externally produced archive bundles; paths may be glob patterns.
    Archives {
        /// Paths or glob patterns.
        paths: Vec<String>,
        /// Optional label applied to every archive; defaults to the file name.
        #[serde(default)]
        label: Option<String>,
    },
}

impl AssetDeclaration {
    /// Check the declaration for structural problems.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required field is empty.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(Error::config(
                format!("Invalid asset declaration: {message}"),
                "See the [[assets]] section of shipit.toml",
            ))
        };

        match self {
            Self::File { path, .. } if path.trim().is_empty() => invalid("`path` is empty"),
            Self::Platforms { entries } if entries.is_empty() => invalid("`entries` is empty"),
            Self::Platforms { entries }
                if entries
                    .iter()
                    .any(|e| e.path.trim().is_empty() || e.label.trim().is_empty()) =>
            {
                invalid("every platform entry needs a path and a label")
            }
            Self::Targets { targets, .. } if targets.is_empty() => invalid("`targets` is empty"),
            Self::Targets { path, .. } if !path.contains("{target}") => {
                invalid("`path` of a targets declaration must contain {target}")
            }
            Self::Archives { paths, .. } if paths.is_empty() => invalid("`paths` is empty"),
            _ => Ok(()),
        }
    }

    /// Expand this declaration into candidates.
    #[must_use]
    pub fn expand(&self, version: &Version) -> Vec<AssetCandidate> {
        let version = version.to_string();
        let render = |template: &str, target: Option<&str>| {
            let rendered = template.replace("{version}", &version);
            match target {
                Some(triple) => rendered.replace("{target}", triple),
                None => rendered,
            }
        };

        match self {
            Self::File { path, label } => vec![AssetCandidate::new(
                render(path, None),
                label.as_deref().map(|l| render(l, None)),
            )],
            Self::Platforms { entries } => entries
                .iter()
                .map(|e| AssetCandidate::new(render(&e.path, None), Some(render(&e.label, None))))
                .collect(),
            Self::Targets {
                path,
                targets,
                name,
            } => targets
                .iter()
                .map(|t| AssetCandidate {
                    pattern: render(path, Some(&t.triple)),
                    label: Some(render(&t.label, Some(&t.triple))),
                    name: name.as_deref().map(|n| render(n, Some(&t.triple))),
                    target: Some(t.triple.clone()),
                })
                .collect(),
            Self::Archives { paths, label } => paths
                .iter()
                .map(|p| {
                    AssetCandidate::new(render(p, None), label.as_deref().map(|l| render(l, None)))
                })
                .collect(),
        }
    }
}

/// One expanded, not yet verified asset path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCandidate {
    /// Literal path or glob pattern, relative to the repository root.
    pub pattern: String,
    /// Label, if the declaration provides one.
    pub label: Option<String>,
    /// Upload name, if the declaration sets one explicitly.
    pub name: Option<String>,
    /// Target triple the candidate was instantiated for.
    pub target: Option<String>,
}

impl AssetCandidate {
    fn new(pattern: String, label: Option<String>) -> Self {
        Self {
            pattern,
            label,
            name: None,
            target: None,
        }
    }

    fn is_glob(&self) -> bool {
        self.pattern.contains(['*', '?', '['])
    }

    /// Upload name for a matched file called `file_name`.
    fn upload_name(&self, file_name: &str) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.target {
            Some(triple) if !file_name.contains(triple.as_str()) => {
                match file_name.strip_suffix(".exe") {
                    Some(stem) => format!("{stem}-{triple}.exe"),
                    None => format!("{file_name}-{triple}"),
                }
            }
            _ => file_name.to_string(),
        }
    }
}

/// A verified, existing build artifact paired with its publish-time label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAsset {
    /// Absolute (or root-joined) local path.
    pub local_path: PathBuf,
    /// Upload file name.
    pub name: String,
    /// Label shown on the release page.
    pub label: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// SHA256 checksum hex string.
    pub sha256: String,
}

impl ResolvedAsset {
    fn from_existing(path: PathBuf, candidate: &AssetCandidate) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| candidate.upload_name(&n.to_string_lossy()))
            .ok_or_else(|| Error::asset_missing(path.display().to_string(), Some(path.clone())))?;
        let label = candidate.label.clone();
        let size_bytes = std::fs::metadata(&path)?.len();
        let sha256 = compute_sha256(&path)?;

        Ok(Self {
            label: label.unwrap_or_else(|| name.clone()),
            local_path: path,
            name,
            size_bytes,
            sha256,
        })
    }
}

/// Resolves asset declarations against the filesystem.
pub struct AssetResolver {
    root: PathBuf,
}

impl AssetResolver {
    /// Create a resolver for paths relative to `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve every declaration for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetMissing`] naming the first unresolved candidate;
    /// no assets are returned in that case. Returns a configuration error if
    /// two assets would upload under the same name.
    pub fn resolve(
        &self,
        declarations: &[AssetDeclaration],
        version: &Version,
    ) -> Result<Vec<ResolvedAsset>> {
        let candidates: Vec<AssetCandidate> = declarations
            .iter()
            .flat_map(|d| d.expand(version))
            .collect();

        let mut resolved = Vec::new();
        for candidate in &candidates {
            resolved.extend(self.verify(candidate)?);
        }

        let mut names = HashSet::new();
        for asset in &resolved {
            if !names.insert(asset.name.as_str()) {
                return Err(Error::config(
                    format!("Two release assets share the upload name {}", asset.name),
                    "Asset file names must be unique within a release",
                ));
            }
        }

        Ok(resolved)
    }

    /// Shared verification pass for one candidate.
    fn verify(&self, candidate: &AssetCandidate) -> Result<Vec<ResolvedAsset>> {
        let full = self.root.join(&candidate.pattern);

        if !candidate.is_glob() {
            if !full.is_file() {
                return Err(Error::asset_missing(&candidate.pattern, Some(full)));
            }
            debug!(path = %full.display(), "Resolved asset");
            return Ok(vec![ResolvedAsset::from_existing(full, candidate)?]);
        }

        let pattern = full.to_str().ok_or_else(|| {
            Error::config(
                format!("Asset pattern contains invalid UTF-8: {}", full.display()),
                "Use UTF-8 asset paths",
            )
        })?;
        let matches = glob::glob(pattern).map_err(|e| {
            Error::config(
                format!("Invalid asset glob pattern {}: {e}", candidate.pattern),
                "Check the glob syntax of the asset path",
            )
        })?;

        let mut paths: Vec<PathBuf> = matches.flatten().filter(|p| p.is_file()).collect();
        if paths.is_empty() {
            return Err(Error::asset_missing(&candidate.pattern, Some(full)));
        }
        paths.sort();

        debug!(pattern = %candidate.pattern, count = paths.len(), "Resolved asset pattern");
        paths
            .into_iter()
            .map(|p| ResolvedAsset::from_existing(p, candidate))
            .collect()
    }
}

/// Computes the SHA256 checksum of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_sha256(path: &Path) -> Result<String> {
    let file = File::open(path)
        .map_err(|_| Error::asset_missing(path.display().to_string(), Some(path.to_path_buf())))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let hash = hasher.finalize();
    Ok(format!("{hash:x}"))
}
