//! Symbol resolution: from a path written inside a module to the declared
//! identity `(package, name)` it names.
//!
//! Resolution order for a single-segment name: items declared in the scope,
//! imports, glob imports, then the standard prelude. Multi-segment paths are
//! made absolute by the scope package and then looked up module by module,
//! following `pub use` re-exports up to [`MAX_REEXPORT_DEPTH`] hops.

use crate::loader::{PackageCache, Package};
use crate::manifest::BUILTIN_CRATES;
use crate::syntax::PathType;
use tracing::warn;
use typegraph_model::{make_type_id, split_type_id};

pub const MAX_REEXPORT_DEPTH: usize = 8;

/// Prelude types that can be named without an import.
const PRELUDE: &[(&str, &str)] = &[
    ("Vec", "std::vec"),
    ("Box", "std::boxed"),
    ("Option", "std::option"),
    ("Result", "std::result"),
    ("String", "std::string"),
];

/// Where a resolved symbol's declaration lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Declared in a project crate.
    Project,
    /// Declared in a dependency crate whose sources are loaded.
    Dependency,
    /// Belongs to a known crate without sources.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub package: String,
    pub name: String,
    pub origin: Origin,
}

impl Symbol {
    fn external(package: &str, name: &str) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
            origin: Origin::External,
        }
    }

    pub fn id(&self) -> String {
        make_type_id(&self.package, &self.name)
    }

    /// Declared in `std`, `core` or `alloc`.
    pub fn is_std(&self) -> bool {
        let krate = self.package.split("::").next().unwrap_or_default();
        BUILTIN_CRATES.contains(&krate)
    }

    pub fn has_source(&self) -> bool {
        self.origin != Origin::External
    }
}

/// Resolve a path written in `scope`.
pub fn resolve_path(cache: &PackageCache, scope: &Package, path: &PathType) -> Option<Symbol> {
    let segments = path.idents();
    if let [name] = segments.as_slice() {
        if scope.declares(name) {
            return Some(declared(scope, name));
        }
        if let Some(abs) = scope.imports.get(name) {
            return resolve_absolute_at(cache, abs, 0);
        }
        for glob in &scope.globs {
            if let Some(symbol) = lookup_in_module(cache, glob, name, 0) {
                return Some(symbol);
            }
        }
        return PRELUDE
            .iter()
            .find(|(n, _)| n == name)
            .map(|(n, module)| Symbol::external(module, n));
    }

    let abs = scope.absolute_path(&segments)?;
    resolve_absolute_at(cache, &abs, 0)
}

/// Resolve an absolute path such as `shop::model::Item`.
pub fn resolve_absolute(cache: &PackageCache, abs: &str) -> Option<Symbol> {
    resolve_absolute_at(cache, abs, 0)
}

/// Resolve a `package:Name` Type ID.
pub fn resolve_id(cache: &PackageCache, id: &str) -> Option<Symbol> {
    let (package, name) = split_type_id(id)?;
    lookup_in_module(cache, package, name, 0)
}

fn resolve_absolute_at(cache: &PackageCache, abs: &str, depth: usize) -> Option<Symbol> {
    if depth > MAX_REEXPORT_DEPTH {
        warn!(path = %abs, "re-export chain too deep");
        return None;
    }
    let (module, name) = abs.rsplit_once("::")?;
    lookup_in_module(cache, module, name, depth).or_else(|| {
        // `Type::Variant` or `Type::function` names the type itself
        let (parent, ty) = module.rsplit_once("::")?;
        lookup_in_module(cache, parent, ty, depth)
    })
}

fn lookup_in_module(cache: &PackageCache, module: &str, name: &str, depth: usize) -> Option<Symbol> {
    if depth > MAX_REEXPORT_DEPTH {
        warn!(package = %module, name = %name, "re-export chain too deep");
        return None;
    }
    let krate = module.split("::").next().unwrap_or_default();

    let Some(package) = cache.get_package(module) else {
        if cache.is_known_crate(krate) && !cache.is_project_crate(krate) {
            return Some(Symbol::external(module, name));
        }
        return None;
    };

    if package.declares(name) {
        return Some(declared(&package, name));
    }
    if let Some(target) = package.imports.get(name) {
        if let Some(symbol) = resolve_absolute_at(cache, target, depth + 1) {
            return Some(symbol);
        }
    }
    for glob in &package.globs {
        if let Some(symbol) = lookup_in_module(cache, glob, name, depth + 1) {
            return Some(symbol);
        }
    }
    if package.external {
        return Some(Symbol::external(module, name));
    }
    None
}

fn declared(package: &Package, name: &str) -> Symbol {
    Symbol {
        package: package.path.clone(),
        name: name.to_string(),
        origin: if package.external {
            Origin::Dependency
        } else {
            Origin::Project
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::TypeExpr;

    fn cache() -> PackageCache {
        PackageCache::from_sources(
            "shop",
            &[
                ("", "pub mod model; pub mod api; pub use model::Item;"),
                (
                    "model",
                    "pub struct Item; pub enum Error { NotFound } pub mod tags { pub struct Tag; }",
                ),
                (
                    "api",
                    r#"
                    use crate::model::*;
                    use crate::Item as RootItem;
                    use std::collections::HashMap;
                    pub struct Local;
                    "#,
                ),
            ],
        )
        .unwrap()
    }

    fn path(src: &str) -> PathType {
        match TypeExpr::path(&src.split("::").collect::<Vec<_>>()) {
            TypeExpr::Path(p) => p,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_resolution_order() {
        let cache = cache();
        let api = cache.get_package("shop::api").unwrap();

        let local = resolve_path(&cache, &api, &path("Local")).unwrap();
        assert_eq!(local.id(), "shop::api:Local");
        assert_eq!(local.origin, Origin::Project);

        let via_glob = resolve_path(&cache, &api, &path("Item")).unwrap();
        assert_eq!(via_glob.id(), "shop::model:Item");

        let via_reexport = resolve_path(&cache, &api, &path("RootItem")).unwrap();
        assert_eq!(via_reexport.id(), "shop::model:Item");

        let nested = resolve_path(&cache, &api, &path("crate::model::tags::Tag")).unwrap();
        assert_eq!(nested.id(), "shop::model::tags:Tag");

        let std_map = resolve_path(&cache, &api, &path("HashMap")).unwrap();
        assert_eq!(std_map.id(), "std::collections:HashMap");
        assert!(std_map.is_std());
        assert!(!std_map.has_source());

        let prelude = resolve_path(&cache, &api, &path("Vec")).unwrap();
        assert_eq!(prelude.id(), "std::vec:Vec");
    }

    #[test]
    fn test_variant_path_names_the_enum() {
        let cache = cache();
        let sym = resolve_absolute(&cache, "shop::model::Error::NotFound").unwrap();
        assert_eq!(sym.id(), "shop::model:Error");
    }

    #[test]
    fn test_unresolvable() {
        let cache = cache();
        let api = cache.get_package("shop::api").unwrap();
        assert!(resolve_path(&cache, &api, &path("Missing")).is_none());
        assert!(resolve_path(&cache, &api, &path("crate::nowhere::Thing")).is_none());
        assert!(resolve_path(&cache, &api, &path("unknown_crate::Thing")).is_none());
        assert!(resolve_id(&cache, "shop::model:Item").is_some());
        assert!(resolve_id(&cache, "u64").is_none());
    }

    #[test]
    fn test_reexport_cycle_terminates() {
        let cache = PackageCache::from_sources(
            "shop",
            &[
                ("a", "pub use crate::b::Thing;"),
                ("b", "pub use crate::a::Thing;"),
            ],
        )
        .unwrap();
        assert!(resolve_absolute(&cache, "shop::a::Thing").is_none());
    }
}
