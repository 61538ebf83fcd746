//! # Declaration Collector
//!
//! Enumerates the source files of the contract directory and turns every
//! trait whose docs carry the `@tg` marker into a [`Contract`].
//!
//! ```text
//! /// Item storage.                         Contract "Store"
//! /// @tg http-prefix=items       ──────►     annotations {http-prefix: items}
//! pub trait Store {                           methods:
//!     /// @tg 404=shop::errors:NotFound         fetch(ctx, id) -> (*Item, Error)
//!     async fn fetch(&self, ctx: Context,         errors: [NotFound 404]
//!         id: String) -> Result<Box<Item>, Error>;
//! }
//! ```
//!
//! Method slots are converted through the [`Resolver`], so collecting a
//! contract also materializes the types it names. A method with any
//! unresolvable slot is dropped; the rest of the contract survives.

use crate::config::CollectorConfig;
use crate::error::{FatalError, Outcome};
use crate::loader::Package;
use crate::resolver::Resolver;
use crate::symbols::resolve_path;
use crate::syntax::lower::lower_path;
use crate::syntax::{FnDecl, TraitDecl};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use typegraph_model::{
    has_marker, make_type_id, parse_doc_lines, parse_error_code, split_type_id, Contract,
    ErrorInfo, ErrorSource, HandlerRef, Method, Receiver, Tags,
};
use walkdir::WalkDir;

/// Files whose inner docs carry project-wide annotations.
const DIRECTORY_MODULE_FILES: &[&str] = &["mod.rs", "lib.rs", "main.rs"];

/// Output of [`collect`].
#[derive(Debug, Default)]
pub struct Collected {
    pub contracts: Vec<Contract>,
    /// Project-wide annotations from the directory's module docs.
    pub annotations: Tags,
    /// Files under the directory that carry the marker but are not part of
    /// the loaded module tree; their contracts are not collected.
    pub unloaded: Vec<PathBuf>,
}

/// Collect the contracts declared under `dir` (relative to the project root).
pub fn collect(
    resolver: &mut Resolver<'_>,
    dir: &Path,
    config: &CollectorConfig,
) -> Result<Collected, FatalError> {
    config.validate()?;
    let cache = resolver.cache();
    let abs = cache.root().join(dir);
    if let Err(e) = fs::read_dir(&abs) {
        return Err(FatalError::ContractDirUnreadable {
            path: abs,
            reason: e.to_string(),
        });
    }

    let files: Vec<_> = WalkDir::new(&abs)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|x| x == "rs"))
        .collect();

    let mut collected = Collected::default();
    for file in &files {
        let packages = cache.packages_in_file(file);
        if packages.is_empty() {
            if carries_marker(file) {
                warn!(
                    file = %file.display(),
                    "file with @tg contracts is not part of the module tree"
                );
                collected.unloaded.push(file.clone());
            } else {
                debug!(file = %file.display(), "no package loaded for file");
            }
            continue;
        }
        let is_directory_module = file.parent() == Some(abs.as_path())
            && file
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| DIRECTORY_MODULE_FILES.contains(&n));
        if is_directory_module {
            collected.annotations.merge(&packages[0].annotations);
        }

        let relative = file.strip_prefix(cache.root()).unwrap_or(file);
        for package in &packages {
            let contracts = collect_package(resolver, package, &relative.to_string_lossy(), config)?;
            collected.contracts.extend(contracts);
        }
    }

    info!(
        dir = %abs.display(),
        files = files.len(),
        contracts = collected.contracts.len(),
        "collected contracts"
    );
    Ok(collected)
}

/// True when a doc comment line of the unparsed file carries the marker.
fn carries_marker(file: &Path) -> bool {
    let Ok(source) = fs::read_to_string(file) else {
        return false;
    };
    let docs: Vec<&str> = source
        .lines()
        .filter_map(|l| {
            let l = l.trim_start();
            l.strip_prefix("///").or_else(|| l.strip_prefix("//!"))
        })
        .collect();
    has_marker(&docs)
}

/// Contracts declared directly in `package`.
pub fn collect_package(
    resolver: &mut Resolver<'_>,
    package: &Package,
    file: &str,
    config: &CollectorConfig,
) -> Result<Vec<Contract>, FatalError> {
    let mut out = Vec::new();
    for decl in package.traits() {
        if !has_marker(&decl.docs) || !config.accepts(&decl.name) {
            continue;
        }
        match build_contract(resolver, package, decl, file) {
            Outcome::Ok(contract) => out.push(contract),
            Outcome::Skip(reason) => warn!(
                file = %file,
                package = %package.path,
                contract = %decl.name,
                reason = %reason,
                "skipping contract"
            ),
            Outcome::Fatal(e) => return Err(e),
        }
    }
    Ok(out)
}

fn build_contract(
    resolver: &mut Resolver<'_>,
    package: &Package,
    decl: &TraitDecl,
    file: &str,
) -> Outcome<Contract> {
    if !decl.generics.is_empty() {
        return Outcome::Skip("generic contracts are not supported".to_string());
    }
    for supertrait in &decl.supertraits {
        debug!(contract = %decl.name, supertrait = %supertrait, "supertrait ignored");
    }

    let parsed = parse_doc_lines(&decl.docs);
    let mut contract = Contract {
        id: make_type_id(&package.path, &decl.name),
        name: decl.name.clone(),
        package: package.path.clone(),
        file: file.to_string(),
        docs: parsed.docs,
        annotations: parsed.tags,
        ..Default::default()
    };

    for method in &decl.methods {
        if method.receiver == Receiver::None {
            debug!(contract = %decl.name, method = %method.name, "associated function ignored");
            continue;
        }
        match build_method(resolver, package, &contract, method) {
            Outcome::Ok(m) => contract.methods.push(m),
            Outcome::Skip(reason) => warn!(
                file = %file,
                contract = %decl.name,
                method = %method.name,
                reason = %reason,
                "dropping method"
            ),
            Outcome::Fatal(e) => return Outcome::Fatal(e),
        }
    }
    Outcome::Ok(contract)
}

fn build_method(
    resolver: &mut Resolver<'_>,
    package: &Package,
    contract: &Contract,
    decl: &FnDecl,
) -> Outcome<Method> {
    if !decl.generics.is_empty() {
        return Outcome::Skip("generic method".to_string());
    }
    let signature = match resolver.convert_signature(decl, package) {
        Ok(sig) => sig,
        Err(slot) => return Outcome::Skip(format!("unresolvable {}", slot)),
    };

    let parsed = parse_doc_lines(&decl.docs);
    let annotations = parsed.tags.layered_over(&contract.annotations);

    let handler = annotations.get("handler").and_then(|value| {
        let handler = HandlerRef::parse(value);
        if handler.is_none() {
            warn!(
                contract = %contract.name,
                method = %decl.name,
                value = %value,
                "handler must be package:Name"
            );
        }
        handler
    });

    let mut errors = Vec::new();
    for (key, value) in annotations.iter() {
        let Some(code) = parse_error_code(key) else {
            continue;
        };
        match resolve_error_type(resolver, package, value) {
            Some((type_id, pkg, name)) => errors.push(ErrorInfo {
                type_id,
                package: pkg,
                name,
                code: Some(code),
                source: ErrorSource::Annotation,
            }),
            None => warn!(
                contract = %contract.name,
                method = %decl.name,
                code,
                value = %value,
                "error type unresolvable"
            ),
        }
    }

    let mut method = Method {
        name: signature.name,
        contract_id: contract.id.clone(),
        receiver: signature.receiver,
        is_async: signature.is_async,
        args: signature.args,
        results: signature.results,
        docs: parsed.docs,
        annotations,
        errors: Vec::new(),
        handler,
    };
    for error in errors {
        method.push_error(error);
    }
    Outcome::Ok(method)
}

/// Resolve an error reference written as `package:Name` or as a path.
/// Returns `(type_id, package, name)`.
fn resolve_error_type(
    resolver: &mut Resolver<'_>,
    scope: &Package,
    value: &str,
) -> Option<(String, String, String)> {
    let value = value.trim();
    let id = if split_type_id(value).is_some() {
        resolver.resolve_id(value)?
    } else {
        let path = syn::parse_str::<syn::Path>(value).ok()?;
        let symbol = resolve_path(resolver.cache(), scope, &lower_path(&path))?;
        resolver.resolve_symbol(&symbol)?
    };
    let ty = resolver.types().get(&id)?;
    Some((id.clone(), ty.package.clone(), ty.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::ExclusionPolicy;
    use crate::loader::PackageCache;
    use pretty_assertions::assert_eq;

    fn cache() -> PackageCache {
        PackageCache::from_sources(
            "shop",
            &[
                (
                    "model",
                    r#"
                    pub struct Item { pub id: String, pub parent: Option<Box<Item>> }
                    pub struct Context;
                    pub struct Error;
                    "#,
                ),
                ("errors", "pub struct NotFound; pub struct Conflict;"),
                (
                    "api",
                    r#"
                    use crate::model::{Context, Error, Item};
                    use crate::errors;

                    /// Item storage.
                    /// @tg http-prefix=items log
                    pub trait Store {
                        /// Fetch one item.
                        /// @tg 404=shop::errors:NotFound 409=errors::Conflict
                        async fn fetch(&self, ctx: Context, id: String) -> Result<Box<Item>, Error>;
                        /// @tg handler=shop::http:Custom log=false
                        fn list(&self) -> Vec<Item>;
                        /// @tg handler=Custom
                        fn count(&self) -> usize;
                        fn broken(&self, x: Missing) -> u8;
                        fn generic<T>(&self, x: T);
                        fn new() -> Self;
                    }

                    /// @tg
                    pub trait Admin { fn purge(&mut self); }

                    /// @tg
                    pub trait Paged<T> { fn page(&self) -> Vec<T>; }

                    pub trait Plain { fn ignored(&self); }
                    "#,
                ),
            ],
        )
        .unwrap()
    }

    fn collect_api(config: &CollectorConfig) -> (Vec<Contract>, PackageCache) {
        let cache = cache();
        let contracts = {
            let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
            let api = cache.get_package("shop::api").unwrap();
            collect_package(&mut resolver, &api, "src/api.rs", config).unwrap()
        };
        (contracts, cache)
    }

    #[test]
    fn test_marked_traits_become_contracts() {
        let (contracts, _cache) = collect_api(&CollectorConfig::default());
        let names: Vec<_> = contracts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Store", "Admin"]);

        let store = &contracts[0];
        assert_eq!(store.id, "shop::api:Store");
        assert_eq!(store.file, "src/api.rs");
        assert_eq!(store.docs, vec!["Item storage.".to_string()]);
        assert_eq!(store.annotations.get("http-prefix"), Some("items"));
        let methods: Vec<_> = store.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["fetch", "list", "count"]);
    }

    #[test]
    fn test_method_slots_and_errors() {
        let (contracts, _cache) = collect_api(&CollectorConfig::default());
        let fetch = contracts[0].method("fetch").unwrap();
        assert!(fetch.is_async);
        assert_eq!(fetch.receiver, Receiver::Ref);
        assert_eq!(fetch.args.len(), 2);
        assert_eq!(fetch.args[0].name, "ctx");
        assert_eq!(fetch.args[0].type_id, "shop::model:Context");
        assert_eq!(fetch.results.len(), 2);
        assert_eq!(fetch.results[0].type_id, "shop::model:Item");
        assert_eq!(fetch.results[0].pointers, 1);
        assert!(fetch.results[1].is_error);
        assert_eq!(fetch.annotations.get("http-prefix"), Some("items"));

        let codes: Vec<_> = fetch.errors.iter().map(|e| (e.name.as_str(), e.code)).collect();
        assert_eq!(codes, vec![("NotFound", Some(404)), ("Conflict", Some(409))]);
        assert!(fetch.errors.iter().all(|e| e.source == ErrorSource::Annotation));
    }

    #[test]
    fn test_annotation_layering_and_handler() {
        let (contracts, _cache) = collect_api(&CollectorConfig::default());
        let list = contracts[0].method("list").unwrap();
        assert!(!list.annotations.is_set("log"));
        assert_eq!(list.annotations.get("http-prefix"), Some("items"));
        assert_eq!(list.handler.as_ref().unwrap().name, "Custom");
        assert!(list.results[0].is_slice);

        let count = contracts[0].method("count").unwrap();
        assert!(count.handler.is_none());
    }

    #[test]
    fn test_filters() {
        let include = CollectorConfig {
            include: vec!["Admin".into()],
            exclude: vec![],
        };
        let (contracts, _cache) = collect_api(&include);
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].name, "Admin");

        let exclude = CollectorConfig {
            include: vec![],
            exclude: vec!["Admin".into()],
        };
        let (contracts, _cache) = collect_api(&exclude);
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].name, "Store");
    }
}
