//! # Interface-Implementation Matcher
//!
//! Finds the project structs that structurally satisfy each contract and
//! mines their method bodies for the error types they can produce.
//!
//! ```text
//! for contract
//!   for struct S in project packages (not dependency, not generated)
//!     every contract method m:
//!       S has a method named m with a receiver
//!       shape(trait m, Self = S) == shape(S::m)      pointer depth included
//!   ──► Implementation { S }
//!       for each matched method body:
//!         struct literals, Type::fn(..), Tuple(..), Err(..) payloads
//!           └─ qualified path? error-shaped type? ──► ErrorInfo (mined)
//! ```
//!
//! Shapes never touch the type table; only confirmed implementations and
//! confirmed error types are resolved into it.

use crate::config::ErrorShape;
use crate::loader::Package;
use crate::method_index::MethodEntry;
use crate::resolver::Resolver;
use crate::shape::{shape_of, signature_shape, ShapeKind};
use crate::symbols::resolve_path;
use crate::syntax::{FnDecl, ItemRef, StructDecl};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use typegraph_model::{
    make_type_id, Contract, ErrorInfo, ErrorSource, ErrorTypeReference, Implementation,
    Receiver, TypeKind, ERROR_CODE_RANGE,
};

pub use crate::shape::{compare_signatures, Mismatch};

/// Record implementations and mined errors on every contract. Returns the
/// number of implementations found.
pub fn match_implementations(
    resolver: &mut Resolver<'_>,
    contracts: &mut [Contract],
    shape: &ErrorShape,
) -> usize {
    let cache = resolver.cache();
    let candidates: Vec<Arc<Package>> = cache.project_packages();
    let mut found = 0;

    for contract in contracts.iter_mut() {
        if contract.methods.is_empty() {
            debug!(contract = %contract.name, "contract without methods is not matched");
            continue;
        }
        let Some(trait_scope) = cache.get_package(&contract.package) else {
            warn!(contract = %contract.name, package = %contract.package, "contract package missing");
            continue;
        };
        let Some(ItemRef::Trait(trait_decl)) = trait_scope.find_item(&contract.name) else {
            warn!(contract = %contract.name, "contract trait declaration missing");
            continue;
        };
        let required: Vec<&FnDecl> = contract
            .methods
            .iter()
            .filter_map(|m| trait_decl.methods.iter().find(|d| d.name == m.name))
            .collect();

        for package in &candidates {
            for decl in package.structs() {
                let matched = match check_candidate(resolver, &trait_scope, &required, package, decl) {
                    Ok(matched) => matched,
                    Err(reason) => {
                        trace!(
                            contract = %contract.name,
                            candidate = %decl.name,
                            reason = %reason,
                            "not an implementation"
                        );
                        continue;
                    }
                };
                let Some(type_id) = resolver.resolve_id(&make_type_id(&package.path, &decl.name))
                else {
                    continue;
                };
                debug!(contract = %contract.name, implementation = %type_id, "implementation found");
                let file = package
                    .file
                    .strip_prefix(cache.root())
                    .unwrap_or(&package.file)
                    .to_string_lossy()
                    .to_string();
                contract.implementations.push(Implementation {
                    type_id,
                    package: package.path.clone(),
                    name: decl.name.clone(),
                    file,
                });
                found += 1;

                for entry in &matched {
                    let errors = mine_errors(resolver, entry, &package.path, shape);
                    if let Some(method) = contract.method_mut(&entry.decl.name) {
                        for error in errors {
                            method.push_error(error);
                        }
                    }
                }
            }
        }
    }

    info!(implementations = found, "matched implementations");
    found
}

/// The candidate's methods matching every required method, in order, or the
/// reason it is not an implementation.
fn check_candidate(
    resolver: &mut Resolver<'_>,
    trait_scope: &Package,
    required: &[&FnDecl],
    package: &Package,
    decl: &StructDecl,
) -> Result<Vec<MethodEntry>, String> {
    if !decl.generics.is_empty() {
        return Err("generic struct".to_string());
    }
    let cache = resolver.cache();
    let candidate_id = make_type_id(&package.path, &decl.name);
    let methods = resolver.methods();

    let mut matched = Vec::with_capacity(required.len());
    for method in required {
        let Some(entry) = methods.method(&candidate_id, &method.name) else {
            return Err(format!("no method `{}`", method.name));
        };
        if entry.decl.receiver == Receiver::None {
            return Err(format!("`{}` has no receiver", method.name));
        }
        let expected = signature_shape(cache, trait_scope, method, Some(&candidate_id));
        let actual = signature_shape(cache, &entry.scope, &entry.decl, Some(&candidate_id));
        if let Err(mismatch) = compare_signatures(&expected, &actual) {
            return Err(format!("`{}`: {}", method.name, mismatch));
        }
        matched.push(entry.clone());
    }
    Ok(matched)
}

// =============================================================================
// Error mining
// =============================================================================

/// Error-shaped types constructed in a matched method body.
fn mine_errors(
    resolver: &mut Resolver<'_>,
    entry: &MethodEntry,
    impl_package: &str,
    shape: &ErrorShape,
) -> Vec<ErrorInfo> {
    let cache = resolver.cache();
    let mut references = BTreeSet::new();
    for constructed in &entry.decl.body.constructed {
        let Some(symbol) = resolve_path(cache, &entry.scope, &constructed.path) else {
            continue;
        };
        let qualified = !constructed.path.is_single() || symbol.package != impl_package;
        if !qualified || symbol.is_std() {
            continue;
        }
        references.insert(ErrorTypeReference {
            package: symbol.package,
            name: symbol.name,
        });
    }

    let mut out = Vec::new();
    for reference in references {
        let id = make_type_id(&reference.package, &reference.name);
        let Some(code) = error_shape(resolver, &id, shape) else {
            continue;
        };
        match resolver.resolve_id(&id) {
            Some(type_id) => out.push(ErrorInfo {
                type_id,
                package: reference.package,
                name: reference.name,
                code,
                source: ErrorSource::Mined,
            }),
            None => warn!(method = %entry.decl.name, type_id = %id, "mined error type unresolvable"),
        }
    }
    out
}

/// `Some(code)` when `id` is error-shaped; the code is set when the code
/// method returns a literal status.
fn error_shape(resolver: &mut Resolver<'_>, id: &str, shape: &ErrorShape) -> Option<Option<u16>> {
    let cache = resolver.cache();
    let methods = resolver.methods();
    let nullary = |names: &[String]| {
        methods
            .methods_for(id)
            .iter()
            .filter(|m| m.decl.receiver != Receiver::None && m.decl.inputs.is_empty())
            .find(|m| names.iter().any(|n| *n == m.decl.name))
            .cloned()
    };

    let message = nullary(&shape.message_methods)?;
    let returns_text = message.decl.output.as_ref().is_some_and(|out| {
        matches!(
            shape_of(cache, &message.scope, out, Some(id)).kind,
            ShapeKind::Primitive(ref name) if name == "String" || name == "str"
        )
    });
    if !returns_text {
        return None;
    }

    let code = nullary(&shape.code_methods)?;
    let returns_integer = code.decl.output.as_ref().is_some_and(|out| {
        let shape = shape_of(cache, &code.scope, out, Some(id));
        shape.pointers == 0
            && matches!(
                shape.kind,
                ShapeKind::Primitive(ref name)
                    if TypeKind::of_primitive(name).is_some_and(TypeKind::is_integer)
            )
    });
    if !returns_integer {
        return None;
    }

    let status = code
        .decl
        .body
        .int_literal
        .and_then(|n| u16::try_from(n).ok())
        .filter(|n| ERROR_CODE_RANGE.contains(n));
    Some(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::collect_package;
    use crate::config::CollectorConfig;
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
                    pub struct Item { pub parent: Option<Box<Item>> }
                    pub struct Context;
                    pub struct Error;
                    pub type ItemBox = Box<Item>;
                    "#,
                ),
                (
                    "errors",
                    r#"
                    pub struct NotFound { pub id: String }
                    impl NotFound {
                        pub fn message(&self) -> String { format!("{} not found", self.id) }
                        pub fn code(&self) -> u16 { 404 }
                    }
                    pub struct Plain;
                    "#,
                ),
                (
                    "api",
                    r#"
                    use crate::model::{Context, Error, Item};

                    /// @tg
                    pub trait Store {
                        fn fetch(&self, ctx: Context, id: String) -> Result<Box<Item>, Error>;
                    }
                    "#,
                ),
                (
                    "service",
                    r#"
                    use crate::errors::{NotFound, Plain};
                    use crate::model::{Context, Error, Item, ItemBox};

                    pub struct Good;
                    impl Good {
                        pub fn fetch(&self, _ctx: Context, id: String) -> Result<ItemBox, Error> {
                            if id.is_empty() {
                                let _ = NotFound { id: id.clone() };
                                let _ = Plain;
                            }
                            todo!()
                        }
                    }

                    pub struct Bad;
                    impl Bad {
                        pub fn fetch(&self, _ctx: Context, id: String) -> Result<Item, Error> {
                            todo!()
                        }
                    }

                    pub struct Missing;

                    pub struct Static;
                    impl Static {
                        pub fn fetch(ctx: Context, id: String) -> Result<Box<Item>, Error> {
                            todo!()
                        }
                    }
                    "#,
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_pointer_aware_matching_and_mining() {
        let cache = cache();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        let api = cache.get_package("shop::api").unwrap();
        let mut contracts =
            collect_package(&mut resolver, &api, "src/api.rs", &CollectorConfig::default())
                .unwrap();
        assert_eq!(contracts.len(), 1);

        let count = match_implementations(&mut resolver, &mut contracts, &ErrorShape::default());
        assert_eq!(count, 1);
        let store = &contracts[0];
        let names: Vec<_> = store.implementations.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Good"]);
        assert_eq!(store.implementations[0].type_id, "shop::service:Good");
        assert!(resolver.types().contains_key("shop::service:Good"));

        let errors = &store.method("fetch").unwrap().errors;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].type_id, "shop::errors:NotFound");
        assert_eq!(errors[0].code, Some(404));
        assert_eq!(errors[0].source, ErrorSource::Mined);
        assert!(resolver.types().contains_key("shop::errors:NotFound"));
    }

    #[test]
    fn test_rejected_candidates_carry_a_reason() {
        let cache = cache();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        let api = cache.get_package("shop::api").unwrap();
        let service = cache.get_package("shop::service").unwrap();
        let fetch = &api.traits()[0].methods[0];
        let required = vec![fetch];
        let reason = |resolver: &mut Resolver<'_>, name: &str| {
            let decl = service.structs().iter().find(|s| s.name == name).unwrap();
            check_candidate(resolver, &api, &required, &service, decl).unwrap_err()
        };

        assert_eq!(reason(&mut resolver, "Missing"), "no method `fetch`");
        assert_eq!(reason(&mut resolver, "Static"), "`fetch` has no receiver");
        assert!(reason(&mut resolver, "Bad").starts_with("`fetch`: result 0"));

        let good = service.structs().iter().find(|s| s.name == "Good").unwrap();
        let matched = check_candidate(&mut resolver, &api, &required, &service, good).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].decl.name, "fetch");
    }

    #[test]
    fn test_mismatch_detail() {
        let cache = cache();
        let service = cache.get_package("shop::service").unwrap();
        let api = cache.get_package("shop::api").unwrap();
        let contract = signature_shape(&cache, &api, &api.traits()[0].methods[0], None);
        let bad = signature_shape(&cache, &service, &service.module.impls[1].methods[0], None);
        let mismatch = compare_signatures(&contract, &bad).unwrap_err();
        assert_eq!(
            mismatch.to_string(),
            "result 0: expected *shop::model:Item, found shop::model:Item"
        );
    }
}
