//! `Cargo.toml` reading.
//!
//! Only the fields the loader needs are read: the crate name and version,
//! workspace members, and the names of declared dependencies.

use crate::error::FatalError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MANIFEST_FILE: &str = "Cargo.toml";

/// Crates every Rust program can name without declaring them.
pub const BUILTIN_CRATES: &[&str] = &["std", "core", "alloc"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Directory holding the manifest.
    pub dir: PathBuf,
    /// Crate name as written in paths (hyphens become underscores).
    pub crate_name: Option<String>,
    pub version: Option<String>,
    /// Workspace member directories, expanded and existing.
    pub members: Vec<PathBuf>,
    /// Dependency name as written in paths -> registry package name.
    pub dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    package: Option<RawPackage>,
    lib: Option<RawLib>,
    workspace: Option<RawWorkspace>,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
    #[serde(default, rename = "dev-dependencies")]
    dev_dependencies: BTreeMap<String, toml::Value>,
    #[serde(default, rename = "build-dependencies")]
    build_dependencies: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: Option<String>,
    version: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawLib {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWorkspace {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
}

/// Read `dir/Cargo.toml`.
pub fn read_manifest(dir: &Path) -> Result<Manifest, FatalError> {
    let path = dir.join(MANIFEST_FILE);
    let text = fs::read_to_string(&path).map_err(|e| FatalError::ManifestUnreadable {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let raw: RawManifest = toml::from_str(&text).map_err(|e| FatalError::ManifestUnreadable {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let crate_name = raw
        .lib
        .as_ref()
        .and_then(|l| l.name.clone())
        .or_else(|| raw.package.as_ref().and_then(|p| p.name.clone()))
        .map(|n| n.replace('-', "_"));
    let version = raw
        .package
        .as_ref()
        .and_then(|p| p.version.as_ref())
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let mut dependencies = BTreeMap::new();
    let workspace = raw.workspace.unwrap_or_default();
    for (key, value) in raw
        .dependencies
        .iter()
        .chain(raw.dev_dependencies.iter())
        .chain(raw.build_dependencies.iter())
        .chain(workspace.dependencies.iter())
    {
        let package = value
            .get("package")
            .and_then(|p| p.as_str())
            .unwrap_or(key)
            .to_string();
        dependencies.insert(key.replace('-', "_"), package);
    }

    let members = expand_members(dir, &workspace.members);
    debug!(
        manifest = %path.display(),
        crate_name = ?crate_name,
        members = members.len(),
        dependencies = dependencies.len(),
        "read manifest"
    );

    Ok(Manifest {
        dir: dir.to_path_buf(),
        crate_name,
        version,
        members,
        dependencies,
    })
}

/// Expand workspace member patterns: literal paths and a trailing `/*`.
fn expand_members(dir: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for pattern in patterns {
        if let Some(prefix) = pattern.strip_suffix("/*") {
            let Ok(entries) = fs::read_dir(dir.join(prefix)) else {
                continue;
            };
            let mut found: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.join(MANIFEST_FILE).is_file())
                .collect();
            found.sort();
            out.extend(found);
        } else {
            let member = dir.join(pattern);
            if member.join(MANIFEST_FILE).is_file() {
                out.push(member);
            }
        }
    }
    out.dedup();
    out
}
