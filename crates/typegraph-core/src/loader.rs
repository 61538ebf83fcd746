//! # Package Loader
//!
//! Loads Rust sources into [`Package`]s (one per module) and keeps them in a
//! thread-safe [`PackageCache`].
//!
//! ## Loading model
//!
//! | Phase     | What is loaded                                                  |
//! |-----------|-----------------------------------------------------------------|
//! | Startup   | Every `.rs` file of the root crate and its workspace members, parsed in parallel |
//! | On demand | A module of a loaded crate or of a dependency crate found under a dependency root |
//!
//! ```text
//! get_package("chrono::naive")
//!        │
//!        ▼
//!  ┌──────────────┐  hit   ┌──────────────┐
//!  │  read lock   │ ─────► │ Arc<Package> │
//!  └──────┬───────┘        └──────────────┘
//!         │ miss
//!         ▼
//!  ┌──────────────┐ re-check, then locate the crate, find
//!  │  write lock  │ src/naive.rs, src/naive/mod.rs, or an inline
//!  └──────────────┘ module in the parent file; cache None on failure
//! ```
//!
//! Module paths are absolute and start with the crate name as written in
//! code (`shop::model`, `serde_json::value`).

use crate::config::LoaderConfig;
use crate::error::FatalError;
use crate::manifest::{read_manifest, BUILTIN_CRATES};
use crate::syntax::lower::is_generated_source;
use crate::syntax::{lower_file, parse_source, ItemRef, SourceModule, StructDecl, TraitDecl};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use typegraph_model::{parse_doc_lines, Tags};
use walkdir::WalkDir;

// =============================================================================
// Package
// =============================================================================

/// One loaded module with its imports made absolute.
#[derive(Debug, Clone)]
pub struct Package {
    /// Absolute module path, e.g. `shop::model`.
    pub path: String,
    pub crate_name: String,
    /// File declaring the module (the parent file for inline modules).
    pub file: PathBuf,
    /// Belongs to a dependency crate rather than the project.
    pub external: bool,
    pub docs: Vec<String>,
    pub annotations: Tags,
    /// Local name -> absolute path.
    pub imports: BTreeMap<String, String>,
    /// Absolute paths of glob-imported modules.
    pub globs: Vec<String>,
    /// `pub use` names: local name -> absolute path.
    pub reexports: BTreeMap<String, String>,
    /// Absolute paths of `pub use x::*` modules.
    pub reexport_globs: Vec<String>,
    pub module: SourceModule,
}

impl Package {
    pub fn new(crate_name: &str, file: &Path, module: SourceModule, external: bool) -> Self {
        let path = if module.path.is_empty() {
            crate_name.to_string()
        } else {
            format!("{}::{}", crate_name, module.path)
        };
        let parsed = parse_doc_lines(&module.docs);

        let mut imports = BTreeMap::new();
        let mut globs = Vec::new();
        let mut reexports = BTreeMap::new();
        let mut reexport_globs = Vec::new();
        for (i, decl) in module.uses.iter().enumerate() {
            let sibling = |name: &str| {
                module
                    .uses
                    .iter()
                    .enumerate()
                    .find(|(j, u)| *j != i && u.alias.as_deref() == Some(name))
                    .and_then(|(_, u)| anchor(&path, crate_name, &module, &u.path, &|_| None))
            };
            let Some(abs) = anchor(&path, crate_name, &module, &decl.path, &sibling) else {
                continue;
            };
            match &decl.alias {
                Some(alias) => {
                    if decl.public {
                        reexports.insert(alias.clone(), abs.clone());
                    }
                    imports.insert(alias.clone(), abs);
                }
                None => {
                    if decl.public {
                        reexport_globs.push(abs.clone());
                    }
                    globs.push(abs);
                }
            }
        }

        Self {
            path,
            crate_name: crate_name.to_string(),
            file: file.to_path_buf(),
            external,
            docs: parsed.docs,
            annotations: parsed.tags,
            imports,
            globs,
            reexports,
            reexport_globs,
            module,
        }
    }

    /// Make a path written in this module absolute.
    ///
    /// Handles `crate`, `self` and `super` prefixes, child modules and items
    /// declared here, imported names, and external crate names.
    pub fn absolute_path(&self, segments: &[String]) -> Option<String> {
        anchor(
            &self.path,
            &self.crate_name,
            &self.module,
            segments,
            &|name| self.imports.get(name).cloned(),
        )
    }

    pub fn find_item(&self, name: &str) -> Option<ItemRef<'_>> {
        self.module.find_item(name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.module.declares(name)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.module.has_child(name)
    }

    pub fn is_generated(&self) -> bool {
        self.module.generated
    }

    pub fn structs(&self) -> &[StructDecl] {
        &self.module.structs
    }

    pub fn traits(&self) -> &[TraitDecl] {
        &self.module.traits
    }
}

fn anchor(
    package: &str,
    crate_name: &str,
    module: &SourceModule,
    segments: &[String],
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Option<String> {
    let (first, mut rest) = segments.split_first()?;
    let own = || package.split("::").map(str::to_string).collect::<Vec<_>>();
    let mut base: Vec<String> = Vec::new();
    match first.as_str() {
        "crate" => base.push(crate_name.to_string()),
        "self" => base = own(),
        "super" => {
            base = own();
            base.pop();
            while rest.first().is_some_and(|s| s == "super") {
                base.pop();
                rest = &rest[1..];
            }
        }
        "Self" => return None,
        _ if module.has_child(first) || module.declares(first) => {
            base = own();
            rest = segments;
        }
        _ => match lookup(first) {
            Some(abs) => base.extend(abs.split("::").map(str::to_string)),
            None => base.push(first.clone()),
        },
    }
    base.extend(rest.iter().cloned());
    if base.is_empty() {
        None
    } else {
        Some(base.join("::"))
    }
}

// =============================================================================
// Crates
// =============================================================================

/// A crate whose sources are on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrateSource {
    pub name: String,
    pub src_dir: PathBuf,
    pub external: bool,
}

/// File-relative module path: `lib.rs`/`main.rs` -> `""`, `a/mod.rs` and
/// `a.rs` -> `a`, `a/b.rs` -> `a::b`.
pub fn module_path_for_file(src_dir: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(src_dir).ok()?;
    let mut parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str().map(str::to_string),
            _ => None,
        })
        .collect();
    let file_name = parts.pop()?;
    let stem = file_name.strip_suffix(".rs")?;
    match (parts.is_empty(), stem) {
        (true, "lib" | "main") => {}
        (_, "mod") => {}
        _ => parts.push(stem.to_string()),
    }
    Some(parts.join("::"))
}

/// Drop `.` components so paths built from the same root compare equal.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn parse_packages(
    crate_name: &str,
    file: &Path,
    module_path: &str,
    src: &str,
    external: bool,
) -> syn::Result<Vec<Package>> {
    let parsed = parse_source(src)?;
    let generated = is_generated_source(src);
    Ok(lower_file(&parsed, module_path, generated)
        .into_iter()
        .map(|m| Package::new(crate_name, file, m, external))
        .collect())
}

fn load_file(crate_src: &CrateSource, file: &Path) -> Option<Vec<Package>> {
    let module_path = module_path_for_file(&crate_src.src_dir, file)?;
    let src = match fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            warn!(file = %file.display(), error = %e, "cannot read source file");
            return None;
        }
    };
    match parse_packages(&crate_src.name, file, &module_path, &src, crate_src.external) {
        Ok(packages) => Some(packages),
        Err(e) => {
            warn!(file = %file.display(), error = %e, "skipping file that failed to parse");
            None
        }
    }
}

// =============================================================================
// PackageCache
// =============================================================================

type Slot = Option<Arc<Package>>;

/// Shared, lazily-extended index of loaded modules.
pub struct PackageCache {
    root: PathBuf,
    module: String,
    version: Option<String>,
    config: LoaderConfig,
    /// Dependency name as written in paths -> registry package name.
    known_external: BTreeMap<String, String>,
    crates: RwLock<HashMap<String, Option<CrateSource>>>,
    packages: RwLock<HashMap<String, Slot>>,
    files: RwLock<HashMap<PathBuf, Vec<String>>>,
}

impl std::fmt::Debug for PackageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageCache")
            .field("root", &self.root)
            .field("module", &self.module)
            .field("packages", &self.packages.read().len())
            .finish()
    }
}

impl PackageCache {
    /// Load the project at `root`.
    pub fn load(root: &Path, config: &LoaderConfig) -> Result<Self, FatalError> {
        if !root.is_dir() {
            return Err(FatalError::ProjectRootNotFound(root.to_path_buf()));
        }
        let root = normalize_path(root);
        let manifest = read_manifest(&root)?;
        let module = config
            .module_name
            .clone()
            .or_else(|| manifest.crate_name.clone())
            .ok_or_else(|| FatalError::ModuleIdentityUnknown(root.clone()))?;

        let mut known_external = manifest.dependencies.clone();
        let mut crates = Vec::new();
        if root.join("src").is_dir() {
            crates.push(CrateSource {
                name: module.clone(),
                src_dir: root.join("src"),
                external: false,
            });
        }
        for member in &manifest.members {
            match read_manifest(member) {
                Ok(m) => {
                    known_external.extend(m.dependencies.clone());
                    match m.crate_name {
                        Some(name) if member.join("src").is_dir() => crates.push(CrateSource {
                            name,
                            src_dir: member.join("src"),
                            external: false,
                        }),
                        _ => debug!(member = %member.display(), "workspace member has no sources"),
                    }
                }
                Err(e) => warn!(member = %member.display(), error = %e, "skipping workspace member"),
            }
        }
        for c in &crates {
            known_external.remove(&c.name);
        }

        let cache = Self {
            root: root.clone(),
            module,
            version: manifest.version.clone(),
            config: config.clone(),
            known_external,
            crates: RwLock::new(
                crates
                    .iter()
                    .map(|c| (c.name.clone(), Some(c.clone())))
                    .collect(),
            ),
            packages: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
        };

        let files: Vec<(CrateSource, PathBuf)> = crates
            .iter()
            .flat_map(|c| {
                cache
                    .source_files(&c.src_dir)
                    .into_iter()
                    .map(move |f| (c.clone(), f))
            })
            .collect();
        let loaded: Vec<Vec<Package>> = files
            .par_iter()
            .filter_map(|(c, f)| load_file(c, f))
            .collect();
        let count = loaded.iter().map(Vec::len).sum::<usize>();
        for packages in loaded {
            cache.insert_all(packages);
        }

        info!(
            module = %cache.module,
            crates = crates.len(),
            files = files.len(),
            packages = count,
            "loaded project sources"
        );

        if config.preload_dependencies {
            let names: Vec<String> = cache.known_external.keys().cloned().collect();
            let preloaded = names
                .iter()
                .filter(|n| cache.get_package(n).is_some())
                .count();
            debug!(preloaded, "preloaded dependency root modules");
        }

        Ok(cache)
    }

    /// Build a cache from in-memory sources: `(module path inside the crate, source)`.
    ///
    /// Every source is treated as a file of the `module` crate under a
    /// synthetic `src/` directory.
    pub fn from_sources(module: &str, sources: &[(&str, &str)]) -> anyhow::Result<Self> {
        let src_dir = PathBuf::from("src");
        let cache = Self {
            root: PathBuf::new(),
            module: module.to_string(),
            version: None,
            config: LoaderConfig::default(),
            known_external: BTreeMap::new(),
            crates: RwLock::new(HashMap::from([(
                module.to_string(),
                Some(CrateSource {
                    name: module.to_string(),
                    src_dir: src_dir.clone(),
                    external: false,
                }),
            )])),
            packages: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
        };
        for (module_path, src) in sources {
            let file = if module_path.is_empty() {
                src_dir.join("lib.rs")
            } else {
                src_dir.join(format!("{}.rs", module_path.replace("::", "/")))
            };
            let packages = parse_packages(module, &file, module_path, src, false)
                .map_err(|e| anyhow::anyhow!("{}: {}", file.display(), e))?;
            cache.insert_all(packages);
        }
        Ok(cache)
    }

    /// Treat `names` as declared dependencies without sources.
    pub fn with_known_crates(mut self, names: &[&str]) -> Self {
        for name in names {
            self.known_external
                .insert(name.to_string(), name.replace('_', "-"));
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root crate name (module identity).
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// True for `std`/`core`/`alloc`, declared dependencies, and loaded crates.
    pub fn is_known_crate(&self, name: &str) -> bool {
        BUILTIN_CRATES.contains(&name)
            || self.known_external.contains_key(name)
            || self.crates.read().get(name).is_some_and(Option::is_some)
    }

    pub fn is_project_crate(&self, name: &str) -> bool {
        matches!(self.crates.read().get(name), Some(Some(c)) if !c.external)
    }

    /// Look up a module by absolute path, loading it on a miss.
    pub fn get_package(&self, path: &str) -> Option<Arc<Package>> {
        if let Some(slot) = self.packages.read().get(path) {
            return slot.clone();
        }

        let mut packages = self.packages.write();
        if let Some(slot) = packages.get(path) {
            return slot.clone();
        }
        let loaded = self.load_on_demand(path);
        let mut files = self.files.write();
        for package in loaded {
            files
                .entry(package.file.clone())
                .or_default()
                .push(package.path.clone());
            packages
                .entry(package.path.clone())
                .or_insert_with(|| Some(Arc::new(package)));
        }
        let slot = packages.entry(path.to_string()).or_insert(None).clone();
        if slot.is_none() {
            debug!(package = %path, "package not found");
        }
        slot
    }

    /// Packages declared in `file` (the file module and its inline modules).
    pub fn packages_in_file(&self, file: &Path) -> Vec<Arc<Package>> {
        let file = normalize_path(file);
        let paths = self.files.read().get(&file).cloned().unwrap_or_default();
        paths.iter().filter_map(|p| self.get_package(p)).collect()
    }

    /// Snapshot of every loaded package, sorted by path.
    pub fn packages(&self) -> Vec<Arc<Package>> {
        let mut out: Vec<Arc<Package>> = self
            .packages
            .read()
            .values()
            .filter_map(|slot| slot.clone())
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out
    }

    /// Number of loaded packages. Never shrinks.
    pub fn package_count(&self) -> usize {
        self.packages.read().values().filter(|s| s.is_some()).count()
    }

    /// Project packages eligible for implementation matching: not from a
    /// dependency and not generated.
    pub fn project_packages(&self) -> Vec<Arc<Package>> {
        self.packages()
            .into_iter()
            .filter(|p| !p.external && !p.is_generated())
            .collect()
    }

    fn insert_all(&self, loaded: Vec<Package>) {
        let mut packages = self.packages.write();
        let mut files = self.files.write();
        for package in loaded {
            files
                .entry(package.file.clone())
                .or_default()
                .push(package.path.clone());
            packages.insert(package.path.clone(), Some(Arc::new(package)));
        }
    }

    fn source_files(&self, src_dir: &Path) -> Vec<PathBuf> {
        let excluded = &self.config.excluded_dirs;
        let bin_dir = src_dir.join("bin");
        WalkDir::new(src_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if !e.file_type().is_dir() || e.depth() == 0 {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                e.path() != bin_dir && name != "target" && !excluded.iter().any(|x| *x == name)
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|x| x == "rs"))
            .filter(|p| {
                // main.rs is the crate root only when lib.rs is absent
                !(p.parent() == Some(src_dir)
                    && p.file_name().is_some_and(|n| n == "main.rs")
                    && src_dir.join("lib.rs").is_file())
            })
            .collect()
    }

    fn is_excluded(&self, crate_src: &CrateSource, file: &Path) -> bool {
        let Ok(rel) = file.strip_prefix(&crate_src.src_dir) else {
            return true;
        };
        let mut dirs = rel.components().rev().skip(1).filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        });
        rel.starts_with("bin")
            || dirs.any(|d| d == "target" || self.config.excluded_dirs.iter().any(|x| x == d))
    }

    fn locate_crate(&self, name: &str) -> Option<CrateSource> {
        if let Some(slot) = self.crates.read().get(name) {
            return slot.clone();
        }
        let found = self.search_dependency_roots(name);
        match &found {
            Some(c) => debug!(krate = %name, src = %c.src_dir.display(), "located dependency sources"),
            None => debug!(krate = %name, "no dependency sources"),
        }
        self.crates.write().insert(name.to_string(), found.clone());
        found
    }

    fn search_dependency_roots(&self, name: &str) -> Option<CrateSource> {
        let package = self
            .known_external
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string());
        let candidates = [package.clone(), package.replace('_', "-"), name.to_string()];

        for dep_root in &self.config.dependency_roots {
            let Ok(entries) = fs::read_dir(dep_root) else {
                continue;
            };
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    let Some(file_name) = p.file_name().and_then(|n| n.to_str()) else {
                        return false;
                    };
                    candidates.iter().any(|c| {
                        file_name == c
                            || file_name
                                .strip_prefix(c.as_str())
                                .and_then(|rest| rest.strip_prefix('-'))
                                .is_some_and(|v| v.starts_with(|ch: char| ch.is_ascii_digit()))
                    })
                })
                .filter(|p| p.join("src/lib.rs").is_file())
                .collect();
            dirs.sort();
            if let Some(dir) = dirs.pop() {
                return Some(CrateSource {
                    name: name.to_string(),
                    src_dir: dir.join("src"),
                    external: true,
                });
            }
        }
        None
    }

    /// Locate and parse the file declaring `path`. Returns every module of
    /// that file.
    fn load_on_demand(&self, path: &str) -> Vec<Package> {
        let segments: Vec<&str> = path.split("::").collect();
        let Some((crate_name, rest)) = segments.split_first() else {
            return Vec::new();
        };
        let Some(crate_src) = self.locate_crate(crate_name) else {
            return Vec::new();
        };

        for depth in (0..=rest.len()).rev() {
            let prefix = &rest[..depth];
            let candidates = if prefix.is_empty() {
                vec![
                    crate_src.src_dir.join("lib.rs"),
                    crate_src.src_dir.join("main.rs"),
                ]
            } else {
                let joined = prefix.join("/");
                vec![
                    crate_src.src_dir.join(format!("{}.rs", joined)),
                    crate_src.src_dir.join(joined).join("mod.rs"),
                ]
            };
            let Some(file) = candidates.into_iter().find(|f| f.is_file()) else {
                continue;
            };
            if self.is_excluded(&crate_src, &file) {
                return Vec::new();
            }
            if self.files.read().contains_key(&file) {
                // Already loaded; the requested module is not declared there.
                return Vec::new();
            }
            let packages = load_file(&crate_src, &file).unwrap_or_default();
            debug!(
                package = %path,
                file = %file.display(),
                modules = packages.len(),
                "loaded package on demand"
            );
            return packages;
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_path_for_file() {
        let src = Path::new("/p/src");
        assert_eq!(
            module_path_for_file(src, Path::new("/p/src/lib.rs")).as_deref(),
            Some("")
        );
        assert_eq!(
            module_path_for_file(src, Path::new("/p/src/api/mod.rs")).as_deref(),
            Some("api")
        );
        assert_eq!(
            module_path_for_file(src, Path::new("/p/src/api/v1.rs")).as_deref(),
            Some("api::v1")
        );
        assert_eq!(
            module_path_for_file(src, Path::new("/p/src/model.rs")).as_deref(),
            Some("model")
        );
        assert_eq!(module_path_for_file(src, Path::new("/p/src/notes.txt")), None);
    }

    #[test]
    fn test_imports_are_absolute() {
        let cache = PackageCache::from_sources(
            "shop",
            &[
                (
                    "api",
                    r#"
                    use crate::model::{self, Item as Thing};
                    use super::errors::*;
                    use model::Tag;
                    use chrono::DateTime;
                    pub use self::inner::Deep;
                    mod inner { pub struct Deep; }
                    "#,
                ),
                ("model", "pub struct Item; pub struct Tag;"),
            ],
        )
        .unwrap();
        let api = cache.get_package("shop::api").unwrap();
        assert_eq!(api.imports["model"], "shop::model");
        assert_eq!(api.imports["Thing"], "shop::model::Item");
        assert_eq!(api.imports["Tag"], "shop::model::Tag");
        assert_eq!(api.imports["DateTime"], "chrono::DateTime");
        assert_eq!(api.globs, vec!["shop::errors".to_string()]);
        assert_eq!(api.reexports["Deep"], "shop::api::inner::Deep");
        assert!(cache.get_package("shop::api::inner").is_some());
        assert_eq!(
            api.absolute_path(&["Thing".to_string()]).as_deref(),
            Some("shop::model::Item")
        );
    }

    #[test]
    fn test_negative_lookups_are_cached() {
        let cache = PackageCache::from_sources("shop", &[("", "pub mod api;")]).unwrap();
        assert!(cache.get_package("shop::missing").is_none());
        assert!(cache.packages.read().contains_key("shop::missing"));
        assert!(cache.get_package("nonexistent_crate").is_none());
    }

    #[test]
    fn test_load_project_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("Cargo.toml"),
            "[package]\nname = \"shop\"\nversion = \"0.1.0\"\n[dependencies]\nchrono = \"0.4\"\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("src/api")).unwrap();
        fs::create_dir_all(root.join("src/bin")).unwrap();
        fs::write(root.join("src/lib.rs"), "//! Shop.\n//! @tg title=Shop\npub mod api;\n").unwrap();
        fs::write(root.join("src/api/mod.rs"), "pub struct Store;\n").unwrap();
        fs::write(root.join("src/broken.rs"), "pub struct {\n").unwrap();
        fs::write(root.join("src/bin/tool.rs"), "fn main() {}\n").unwrap();

        let cache = PackageCache::load(root, &LoaderConfig::default()).unwrap();
        assert_eq!(cache.module(), "shop");
        assert_eq!(cache.version(), Some("0.1.0"));
        assert!(cache.is_known_crate("chrono"));
        assert!(cache.is_known_crate("std"));
        assert!(!cache.is_known_crate("tokio"));

        let lib = cache.get_package("shop").unwrap();
        assert_eq!(lib.annotations.get("title"), Some("Shop"));
        assert!(cache.get_package("shop::api").unwrap().declares("Store"));
        assert!(cache.get_package("shop::broken").is_none());
        assert!(cache.get_package("shop::bin::tool").is_none());
        assert_eq!(
            cache.packages_in_file(&root.join("src/api/mod.rs")).len(),
            1
        );
    }

    #[test]
    fn test_dependency_sources_loaded_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        let deps = dir.path().join("registry");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join("Cargo.toml"),
            "[package]\nname = \"shop\"\n[dependencies]\nmoney-types = \"1\"\n",
        )
        .unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
        let dep = deps.join("money-types-1.2.0/src");
        fs::create_dir_all(&dep).unwrap();
        fs::write(dep.join("lib.rs"), "pub mod amount;\n").unwrap();
        fs::write(dep.join("amount.rs"), "pub struct Amount(pub i64);\n").unwrap();

        let config = LoaderConfig {
            dependency_roots: vec![deps],
            ..Default::default()
        };
        let cache = PackageCache::load(&root, &config).unwrap();
        let amount = cache.get_package("money_types::amount").unwrap();
        assert!(amount.external);
        assert!(amount.declares("Amount"));
        assert!(cache.project_packages().iter().all(|p| !p.external));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(matches!(
            PackageCache::load(Path::new("/definitely/not/here"), &LoaderConfig::default()),
            Err(FatalError::ProjectRootNotFound(_))
        ));
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[workspace]\nmembers = []\n").unwrap();
        assert!(matches!(
            PackageCache::load(dir.path(), &LoaderConfig::default()),
            Err(FatalError::ModuleIdentityUnknown(_))
        ));
    }
}
