//! Per-type index of `impl` block methods and nominally implemented traits.
//!
//! Impl blocks can live in any module of a crate, so the index is built by
//! scanning every loaded package and resolving each block's self type. It is
//! refreshed incrementally when the cache grows (dependency modules loaded on
//! demand contribute their impls too).

use crate::loader::{Package, PackageCache};
use crate::symbols::resolve_path;
use crate::syntax::{FnDecl, TypeExpr};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;
use typegraph_model::Receiver;

/// One method reachable on a type.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub decl: FnDecl,
    /// Package whose imports resolve the method's signature.
    pub scope: Arc<Package>,
    /// Trait the method implements, if declared in a trait impl.
    pub trait_id: Option<String>,
}

impl MethodEntry {
    /// Callable on a value (`self` or `&self`) without a mutable borrow.
    pub fn in_value_set(&self) -> bool {
        matches!(self.decl.receiver, Receiver::Value | Receiver::Ref)
    }

    /// Callable through `&mut` (every receiver kind).
    pub fn in_pointer_set(&self) -> bool {
        self.decl.receiver != Receiver::None
    }
}

#[derive(Debug, Default)]
struct TypeMethods {
    methods: Vec<MethodEntry>,
    traits: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct MethodIndex {
    by_type: HashMap<String, TypeMethods>,
    indexed: HashSet<String>,
}

impl MethodIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every loaded package not seen yet. Returns the number indexed.
    pub fn refresh(&mut self, cache: &PackageCache) -> usize {
        let mut count = 0;
        for package in cache.packages() {
            if self.indexed.insert(package.path.clone()) {
                self.index_package(cache, &package);
                count += 1;
            }
        }
        count
    }

    pub fn index_package(&mut self, cache: &PackageCache, package: &Arc<Package>) {
        for block in &package.module.impls {
            if !block.generics.is_empty() && is_blanket(&block.self_ty, &block.generics) {
                continue;
            }
            let Some(self_path) = block.self_ty.as_path() else {
                continue;
            };
            let Some(symbol) = resolve_path(cache, package, self_path) else {
                trace!(package = %package.path, ty = %block.self_ty, "impl target not resolved");
                continue;
            };
            let type_id = symbol.id();
            let trait_id = block
                .trait_path
                .as_ref()
                .and_then(|p| resolve_path(cache, package, p))
                .map(|s| s.id());

            let entry = self.by_type.entry(type_id).or_default();
            if let Some(id) = &trait_id {
                entry.traits.insert(id.clone());
            }
            for decl in &block.methods {
                // inherent methods shadow trait methods of the same name
                if entry.methods.iter().any(|m| m.decl.name == decl.name)
                    && trait_id.is_some()
                {
                    continue;
                }
                entry.methods.retain(|m| m.decl.name != decl.name);
                entry.methods.push(MethodEntry {
                    decl: decl.clone(),
                    scope: Arc::clone(package),
                    trait_id: trait_id.clone(),
                });
            }
        }
    }

    pub fn methods_for(&self, type_id: &str) -> &[MethodEntry] {
        self.by_type
            .get(type_id)
            .map(|t| t.methods.as_slice())
            .unwrap_or(&[])
    }

    pub fn method(&self, type_id: &str, name: &str) -> Option<&MethodEntry> {
        self.methods_for(type_id).iter().find(|m| m.decl.name == name)
    }

    /// Traits named in `impl Trait for Type` blocks.
    pub fn traits_of(&self, type_id: &str) -> Vec<String> {
        self.by_type
            .get(type_id)
            .map(|t| t.traits.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// `impl<T> Trait for T` and friends.
fn is_blanket(self_ty: &TypeExpr, generics: &[String]) -> bool {
    let mut ty = self_ty;
    while let TypeExpr::Reference { inner, .. } = ty {
        ty = &**inner;
    }
    matches!(ty, TypeExpr::Path(p) if p.is_single() && generics.iter().any(|g| g == p.last_ident()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_inherent_and_trait_methods() {
        let cache = PackageCache::from_sources(
            "shop",
            &[
                ("model", "pub struct Item; pub trait Named { fn name(&self) -> String; }"),
                (
                    "impls",
                    r#"
                    use crate::model::{Item, Named};
                    impl Item {
                        pub fn id(&self) -> u64 { 1 }
                        pub fn touch(&mut self) {}
                        pub fn new() -> Self { Item }
                    }
                    impl Named for Item {
                        fn name(&self) -> String { String::new() }
                    }
                    impl<T> Named for Vec<T> {
                        fn name(&self) -> String { String::new() }
                    }
                    impl<T: Clone> Named for T {
                        fn name(&self) -> String { String::new() }
                    }
                    "#,
                ),
            ],
        )
        .unwrap();
        let mut index = MethodIndex::new();
        assert_eq!(index.refresh(&cache), 2);
        assert_eq!(index.refresh(&cache), 0);

        let methods = index.methods_for("shop::model:Item");
        assert_eq!(methods.len(), 4);
        assert!(index.method("shop::model:Item", "id").unwrap().in_value_set());
        let touch = index.method("shop::model:Item", "touch").unwrap();
        assert!(!touch.in_value_set());
        assert!(touch.in_pointer_set());
        assert!(!index.method("shop::model:Item", "new").unwrap().in_pointer_set());
        assert_eq!(
            index.method("shop::model:Item", "name").unwrap().trait_id.as_deref(),
            Some("shop::model:Named")
        );
        assert_eq!(index.traits_of("shop::model:Item"), vec!["shop::model:Named"]);
        assert_eq!(index.traits_of("std::vec:Vec"), vec!["shop::model:Named"]);
        assert!(index.methods_for("shop::model:Missing").is_empty());
    }
}
