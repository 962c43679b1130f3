//! Cargo manifest version stamping.
//!
//! Rewrites the version of listed Cargo manifests with `toml_edit`, so
//! comments and formatting survive. Handles both a plain `[package]` and the
//! workspace inheritance pattern (`[workspace.package].version` plus members
//! with `version.workspace = true`), then updates the sibling `Cargo.lock`.

use crate::error::{Error, Result};
use crate::stamp::VersionStamper;
use crate::version::Version;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, Value};
use tracing::{debug, info};

/// Stamps versions into Cargo manifests and their lock files.
#[derive(Debug, Clone)]
pub struct ManifestStamper {
    root: PathBuf,
    manifests: Vec<PathBuf>,
}

impl ManifestStamper {
    /// Create a stamper for `manifests`, relative to `root`.
    #[must_use]
    pub fn new(root: &Path, manifests: Vec<PathBuf>) -> Self {
        Self {
            root: root.to_path_buf(),
            manifests,
        }
    }

    /// Update one manifest and return the names of packages now at `version`.
    fn stamp_manifest(&self, path: &Path, version: &Version) -> Result<HashSet<String>> {
        let mut doc = read_document(path)?;
        let mut stamped = HashSet::new();
        let mut touched = false;

        if let Some(Item::Table(package)) = doc.get_mut("package") {
            let name = package
                .get("name")
                .and_then(|n| n.as_str())
                .map(String::from);
            if package.get("version").is_some_and(Item::is_str) {
                package["version"] = toml_edit::value(version.to_string());
                touched = true;
                stamped.extend(name);
            }
        }

        if let Some(workspace) = doc.get_mut("workspace")
            && let Some(Item::Table(package)) = workspace.get_mut("package")
        {
            package["version"] = toml_edit::value(version.to_string());
            touched = true;

            let internal = update_internal_dependencies(workspace, version);
            stamped.extend(internal);
        }

        if !touched {
            return Err(Error::manifest(
                "Manifest has neither [package].version nor [workspace.package]",
                Some(path.to_path_buf()),
            ));
        }

        if doc.get("workspace").is_some() {
            let dir = path.parent().unwrap_or(&self.root);
            stamped.extend(inheriting_members(dir, &doc)?);
        }

        write_document(path, &doc)?;
        debug!(path = %path.display(), packages = ?stamped, "Stamped manifest");
        Ok(stamped)
    }
}

impl VersionStamper for ManifestStamper {
    fn name(&self) -> &str {
        "cargo-manifest"
    }

    fn stamp(&self, version: &Version) -> Result<()> {
        for manifest in &self.manifests {
            let path = self.root.join(manifest);
            let packages = self.stamp_manifest(&path, version)?;

            let lock = path.with_file_name("Cargo.lock");
            if lock.exists() {
                update_lockfile(&lock, &packages, version)?;
            }
            info!(manifest = %path.display(), %version, "Updated manifest version");
        }
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<DocumentMut> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::manifest(
            format!("Failed to read {}: {e}", path.display()),
            Some(path.to_path_buf()),
        )
    })?;
    content.parse::<DocumentMut>().map_err(|e| {
        Error::manifest(
            format!("Failed to parse {}: {e}", path.display()),
            Some(path.to_path_buf()),
        )
    })
}

fn write_document(path: &Path, doc: &DocumentMut) -> Result<()> {
    fs::write(path, doc.to_string()).map_err(|e| {
        Error::manifest(
            format!("Failed to write {}: {e}", path.display()),
            Some(path.to_path_buf()),
        )
    })
}

/// Bump `version` of `[workspace.dependencies]` entries that point at a path.
fn update_internal_dependencies(workspace: &mut Item, version: &Version) -> Vec<String> {
    let mut names = Vec::new();
    let Some(Item::Table(deps)) = workspace.get_mut("dependencies") else {
        return names;
    };

    for (name, dep) in deps.iter_mut() {
        match dep {
            Item::Value(Value::InlineTable(table))
                if table.contains_key("path") && table.contains_key("version") =>
            {
                table.insert("version", Value::from(version.to_string()));
                names.push(name.get().to_string());
            }
            Item::Table(table) if table.contains_key("path") && table.contains_key("version") => {
                table["version"] = toml_edit::value(version.to_string());
                names.push(name.get().to_string());
            }
            _ => {}
        }
    }

    names
}

/// Names of workspace members declaring `version.workspace = true`.
fn inheriting_members(root: &Path, doc: &DocumentMut) -> Result<Vec<String>> {
    let Some(members) = doc
        .get("workspace")
        .and_then(|w| w.get("members"))
        .and_then(|m| m.as_array())
    else {
        return Ok(Vec::new());
    };

    let mut dirs = Vec::new();
    for pattern in members.iter().filter_map(|m| m.as_str()) {
        if pattern.contains('*') {
            let full = root.join(pattern);
            let Some(pattern_str) = full.to_str() else {
                continue;
            };
            let matches = glob::glob(pattern_str).map_err(|e| {
                Error::manifest(format!("Invalid glob pattern: {e}"), Some(full.clone()))
            })?;
            dirs.extend(matches.flatten().filter(|p| p.is_dir()));
        } else {
            dirs.push(root.join(pattern));
        }
    }

    let mut names = Vec::new();
    for dir in dirs {
        let manifest = dir.join("Cargo.toml");
        if !manifest.exists() {
            continue;
        }
        let content = fs::read_to_string(&manifest)?;
        let parsed: toml::Value = toml::from_str(&content).map_err(|e| {
            Error::manifest(
                format!("Failed to parse {}: {e}", manifest.display()),
                Some(manifest.clone()),
            )
        })?;

        let Some(package) = parsed.get("package") else {
            continue;
        };
        let inherits = package
            .get("version")
            .and_then(|v| v.get("workspace"))
            .and_then(toml::Value::as_bool)
            == Some(true);
        if inherits && let Some(name) = package.get("name").and_then(|n| n.as_str()) {
            names.push(name.to_string());
        }
    }

    Ok(names)
}

/// Update local `[[package]]` entries of a lock file.
fn update_lockfile(path: &Path, packages: &HashSet<String>, version: &Version) -> Result<()> {
    let mut doc = read_document(path)?;

    let Some(entries) = doc
        .get_mut("package")
        .and_then(Item::as_array_of_tables_mut)
    else {
        return Ok(());
    };

    let mut updated = 0usize;
    for entry in entries.iter_mut() {
        // Registry and git packages carry a `source`; only local ones are stamped.
        if entry.contains_key("source") {
            continue;
        }
        let matches = entry
            .get("name")
            .and_then(|n| n.as_str())
            .is_some_and(|n| packages.contains(n));
        if matches {
            entry["version"] = toml_edit::value(version.to_string());
            updated += 1;
        }
    }

    write_document(path, &doc)?;
    debug!(path = %path.display(), updated, "Updated lock file");
    Ok(())
}
