//! Structural classification of written type expressions.
//!
//! [`peel`] strips pointer indirections and recognises the standard
//! containers, leaving one of the structural forms of [`Peeled`]. Both the
//! resolver (which materializes types) and the shape comparison (which never
//! touches the type table) start from here, so they agree on what counts as a
//! pointer level or a container.
//!
//! | Written                                   | Peeled                         |
//! |-------------------------------------------|--------------------------------|
//! | `&T`, `&mut T`, `*const T`, `*mut T`      | one pointer level, then `T`    |
//! | `Box`, `Rc`, `Arc`, `Weak`, `Cow`, `Option` | one pointer level, then `T`  |
//! | `Pin<T>`                                  | `T`                            |
//! | `Mutex`, `RwLock`, `Cell`, `RefCell`, `OnceLock` | `T`                     |
//! | `Vec`, `VecDeque`, `HashSet`, `BTreeSet`, `[T]` | [`Peeled::Sequence`]     |
//! | `[T; N]`                                  | [`Peeled::Array`]              |
//! | `HashMap`, `BTreeMap`, `IndexMap`         | [`Peeled::Map`]                |
//! | `Result<T, E>`                            | [`Peeled::Result`]             |
//!
//! Return types are flattened separately by [`flatten_results`], which
//! resolves `Result` (and aliases of it) before splitting it into slots.

use crate::loader::{Package, PackageCache};
use crate::shape::MAX_ALIAS_DEPTH;
use crate::symbols::{resolve_absolute, resolve_path, Symbol};
use crate::syntax::{unwrap_future, ItemRef, PathType, TypeExpr};
use std::sync::Arc;
use typegraph_model::is_primitive;

/// Structural form of a type expression after pointer stripping.
#[derive(Debug, Clone)]
pub enum Peeled<'a> {
    Primitive(String),
    Sequence(&'a TypeExpr),
    Array(&'a TypeExpr, Option<usize>),
    Map(&'a TypeExpr, &'a TypeExpr),
    /// `Result<T, E>` outside a return position.
    Result(&'a TypeExpr, &'a TypeExpr),
    Tuple(&'a [TypeExpr]),
    Function {
        inputs: &'a [TypeExpr],
        output: Option<&'a TypeExpr>,
    },
    Named(Symbol),
    SelfType,
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct PeeledType<'a> {
    pub pointers: usize,
    pub kind: Peeled<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StdKind {
    Pointer,
    Transparent,
    Sequence,
    Map,
    Result,
    Text,
}

fn std_kind(symbol: &Symbol) -> Option<StdKind> {
    let krate = symbol.package.split("::").next().unwrap_or_default();
    if symbol.is_std() {
        return match symbol.name.as_str() {
            "Box" | "Rc" | "Arc" | "Weak" | "Cow" | "Option" => Some(StdKind::Pointer),
            "Pin" | "Mutex" | "RwLock" | "Cell" | "RefCell" | "OnceCell" | "OnceLock" => {
                Some(StdKind::Transparent)
            }
            "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "LinkedList" | "BinaryHeap" => {
                Some(StdKind::Sequence)
            }
            "HashMap" | "BTreeMap" => Some(StdKind::Map),
            "Result" => Some(StdKind::Result),
            "String" => Some(StdKind::Text),
            _ => None,
        };
    }
    match (krate, symbol.name.as_str()) {
        ("indexmap", "IndexMap") => Some(StdKind::Map),
        ("indexmap", "IndexSet") => Some(StdKind::Sequence),
        ("parking_lot", "Mutex" | "RwLock") => Some(StdKind::Transparent),
        _ => None,
    }
}

/// Strip pointers and classify `ty` as written in `scope`.
pub fn peel<'a>(cache: &PackageCache, scope: &Package, ty: &'a TypeExpr) -> PeeledType<'a> {
    let mut pointers = 0;
    let mut current = ty;
    loop {
        let kind = match current {
            TypeExpr::Reference { inner, .. } | TypeExpr::RawPointer { inner, .. } => {
                pointers += 1;
                current = &**inner;
                continue;
            }
            TypeExpr::Slice(inner) => Peeled::Sequence(inner),
            TypeExpr::Array { elem, len } => Peeled::Array(elem, *len),
            TypeExpr::Tuple(items) if items.is_empty() => Peeled::Primitive("()".to_string()),
            TypeExpr::Tuple(items) => Peeled::Tuple(items),
            TypeExpr::Never => Peeled::Primitive("!".to_string()),
            TypeExpr::BareFn { inputs, output } => Peeled::Function {
                inputs,
                output: output.as_deref(),
            },
            TypeExpr::TraitObject(bounds) | TypeExpr::ImplTrait(bounds) => {
                peel_bounds(cache, scope, bounds)
            }
            TypeExpr::Path(path) => {
                if let Some(name) = primitive_name(scope, path) {
                    Peeled::Primitive(name)
                } else if current.is_self() {
                    Peeled::SelfType
                } else {
                    match resolve_path(cache, scope, path) {
                        Some(symbol) => {
                            let args = path.last().map(|s| s.args.as_slice()).unwrap_or(&[]);
                            match (std_kind(&symbol), args) {
                                (Some(StdKind::Pointer), [inner, ..]) => {
                                    pointers += 1;
                                    current = inner;
                                    continue;
                                }
                                (Some(StdKind::Transparent), [inner, ..]) => {
                                    current = inner;
                                    continue;
                                }
                                (Some(StdKind::Sequence), [elem, ..]) => Peeled::Sequence(elem),
                                (Some(StdKind::Map), [key, value, ..]) => Peeled::Map(key, value),
                                (Some(StdKind::Result), [ok, err]) => Peeled::Result(ok, err),
                                (Some(StdKind::Text), _) => Peeled::Primitive("String".to_string()),
                                _ => Peeled::Named(symbol),
                            }
                        }
                        None => Peeled::Unknown(current.to_string()),
                    }
                }
            }
            TypeExpr::Infer | TypeExpr::Unsupported(_) => Peeled::Unknown(current.to_string()),
        };
        return PeeledType { pointers, kind };
    }
}

fn peel_bounds<'a>(cache: &PackageCache, scope: &Package, bounds: &'a [PathType]) -> Peeled<'a> {
    for bound in bounds {
        if let Some(sugar) = bound.last().and_then(|s| s.fn_sugar.as_ref()) {
            if matches!(bound.last_ident(), "Fn" | "FnMut" | "FnOnce") {
                return Peeled::Function {
                    inputs: &sugar.inputs,
                    output: sugar.output.as_deref(),
                };
            }
        }
    }
    for bound in bounds {
        if matches!(bound.last_ident(), "Send" | "Sync" | "Unpin" | "Sized") {
            continue;
        }
        if let Some(symbol) = resolve_path(cache, scope, bound) {
            return Peeled::Named(symbol);
        }
    }
    let text = bounds
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(" + ");
    Peeled::Unknown(format!("dyn {}", text))
}

// =============================================================================
// Result flattening
// =============================================================================

/// Where the type of a flattened result slot was written.
#[derive(Debug, Clone)]
pub enum SlotType {
    /// In the scope of the signature being flattened.
    Written(TypeExpr),
    /// In another package, e.g. the target of a `Result` alias.
    Scoped(TypeExpr, Arc<Package>),
    /// Already resolved: the error type of a one-argument `Result`.
    Resolved(Symbol),
}

/// A result slot of a flattened return type.
#[derive(Debug, Clone)]
pub struct ResultSlot {
    pub ty: SlotType,
    pub is_error: bool,
}

impl ResultSlot {
    fn value(ty: SlotType) -> Self {
        Self {
            ty,
            is_error: false,
        }
    }
}

/// Flatten a return type written in `scope` into result slots.
///
/// `Result<T, E>` becomes `[T, E]`, a tuple `(A, B)` becomes `[A, B]`,
/// `Result<(A, B), E>` becomes `[A, B, E]` and `()` becomes `[]`.
///
/// `Result` is resolved first. An alias such as
/// `type Result<T> = std::result::Result<T, AppError>` is expanded with its
/// arguments substituted. A one-argument `Result` from a crate without
/// sources takes its error from that crate's `Error`, so `anyhow::Result<T>`
/// yields `anyhow:Error` however it was imported.
pub fn flatten_results(
    cache: &PackageCache,
    scope: &Package,
    output: Option<&TypeExpr>,
) -> Vec<ResultSlot> {
    let Some(output) = output else {
        return Vec::new();
    };
    let output = unwrap_future(output).unwrap_or(output);
    expand_result(cache, scope, output, 0).unwrap_or_else(|| split_values(output))
}

fn split_values(ty: &TypeExpr) -> Vec<ResultSlot> {
    match ty {
        TypeExpr::Tuple(items) => items
            .iter()
            .map(|t| ResultSlot::value(SlotType::Written(t.clone())))
            .collect(),
        other => vec![ResultSlot::value(SlotType::Written(other.clone()))],
    }
}

/// Slots of `ty` when it is a `Result` or an alias of one; `None` otherwise.
/// `Written` slots in the output are relative to `scope`.
fn expand_result(
    cache: &PackageCache,
    scope: &Package,
    ty: &TypeExpr,
    depth: usize,
) -> Option<Vec<ResultSlot>> {
    let TypeExpr::Path(path) = ty else {
        return None;
    };
    let args = path.last()?.args.as_slice();
    let symbol = resolve_path(cache, scope, path)?;

    if symbol.has_source() {
        if depth >= MAX_ALIAS_DEPTH {
            return None;
        }
        let package = cache.get_package(&symbol.package)?;
        let Some(ItemRef::Alias(alias)) = package.find_item(&symbol.name) else {
            return None;
        };
        if alias.generics.len() != args.len() {
            return None;
        }
        let inner = expand_result(cache, &package, &alias.target, depth + 1)?;
        return substitute(inner, &alias.generics, args, &package);
    }

    if symbol.name != "Result" {
        return None;
    }
    let (ok, error) = match args {
        [ok, err] => (ok, SlotType::Written(err.clone())),
        [ok] => {
            let error = match resolve_absolute(cache, &format!("{}::Error", symbol.package)) {
                Some(error) => SlotType::Resolved(error),
                None => SlotType::Written(TypeExpr::Path(path.with_last("Error"))),
            };
            (ok, error)
        }
        _ => return None,
    };
    let mut slots = split_values(ok);
    slots.push(ResultSlot {
        ty: error,
        is_error: true,
    });
    Some(slots)
}

/// Lift slots flattened inside an alias target into the alias user's scope.
/// Parameters become the written arguments; `None` when a slot uses a
/// parameter in a way that cannot be substituted.
fn substitute(
    slots: Vec<ResultSlot>,
    params: &[String],
    args: &[TypeExpr],
    alias_scope: &Arc<Package>,
) -> Option<Vec<ResultSlot>> {
    let mut out = Vec::with_capacity(slots.len());
    for slot in slots {
        let expr = match slot.ty {
            SlotType::Written(expr) => expr,
            ty => {
                out.push(ResultSlot {
                    ty,
                    is_error: slot.is_error,
                });
                continue;
            }
        };
        let param = match &expr {
            TypeExpr::Path(p) if p.is_single() && p.last().is_some_and(|s| s.args.is_empty()) => {
                params.iter().position(|g| g == p.last_ident())
            }
            _ => None,
        };
        match param {
            Some(i) if slot.is_error => out.push(ResultSlot {
                ty: SlotType::Written(args[i].clone()),
                is_error: true,
            }),
            Some(i) => out.extend(split_values(&args[i])),
            None if mentions_any(&expr, params) => return None,
            None => out.push(ResultSlot {
                ty: SlotType::Scoped(expr, Arc::clone(alias_scope)),
                is_error: slot.is_error,
            }),
        }
    }
    Some(out)
}

/// A primitive name not shadowed by a declaration or import in `scope`.
fn primitive_name(scope: &Package, path: &PathType) -> Option<String> {
    let last = path.last()?;
    if !last.args.is_empty() {
        return None;
    }
    let name = last.ident.as_str();
    if path.is_single() {
        if is_primitive(name) && !scope.declares(name) && !scope.imports.contains_key(name) {
            return Some(name.to_string());
        }
        return None;
    }
    // std::primitive::u8, core::primitive::str
    let idents = path.idents();
    if idents.len() == 3
        && matches!(idents[0].as_str(), "std" | "core")
        && idents[1] == "primitive"
        && is_primitive(name)
    {
        return Some(name.to_string());
    }
    None
}

/// True when `ty` names one of the type parameters in `params`.
pub fn mentions_any(ty: &TypeExpr, params: &[String]) -> bool {
    if params.is_empty() {
        return false;
    }
    let path_mentions = |p: &PathType| {
        (p.is_single() && params.iter().any(|g| g == p.last_ident()))
            || p.segments.iter().any(|s| {
                s.args.iter().any(|a| mentions_any(a, params))
                    || s.bindings.iter().any(|(_, b)| mentions_any(b, params))
                    || s.fn_sugar.as_ref().is_some_and(|f| {
                        f.inputs.iter().any(|i| mentions_any(i, params))
                            || f.output.as_deref().is_some_and(|o| mentions_any(o, params))
                    })
            })
    };
    match ty {
        TypeExpr::Path(p) => path_mentions(p),
        TypeExpr::Reference { inner, .. } | TypeExpr::RawPointer { inner, .. } => {
            mentions_any(inner, params)
        }
        TypeExpr::Slice(inner) => mentions_any(inner, params),
        TypeExpr::Array { elem, .. } => mentions_any(elem, params),
        TypeExpr::Tuple(items) => items.iter().any(|i| mentions_any(i, params)),
        TypeExpr::BareFn { inputs, output } => {
            inputs.iter().any(|i| mentions_any(i, params))
                || output.as_deref().is_some_and(|o| mentions_any(o, params))
        }
        TypeExpr::TraitObject(bounds) | TypeExpr::ImplTrait(bounds) => {
            bounds.iter().any(path_mentions)
        }
        TypeExpr::Never | TypeExpr::Infer | TypeExpr::Unsupported(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::lower::lower_type;

    fn ty(src: &str) -> TypeExpr {
        lower_type(&syn::parse_str::<syn::Type>(src).unwrap())
    }

    fn fixture() -> PackageCache {
        PackageCache::from_sources(
            "shop",
            &[(
                "model",
                r#"
                use std::collections::HashMap;
                use std::sync::Arc;
                use std::borrow::Cow;
                pub struct Item;
                pub struct u8;
                "#,
            )],
        )
        .unwrap()
    }

    #[test]
    fn test_pointer_levels() {
        let cache = fixture();
        let model = cache.get_package("shop::model").unwrap();
        let t = ty("Option<Box<Item>>");
        let p = peel(&cache, &model, &t);
        assert_eq!(p.pointers, 2);
        assert!(matches!(p.kind, Peeled::Named(ref s) if s.id() == "shop::model:Item"));

        let t = ty("&Arc<Item>");
        assert_eq!(peel(&cache, &model, &t).pointers, 2);

        let t = ty("Cow<'static, str>");
        let p = peel(&cache, &model, &t);
        assert_eq!(p.pointers, 1);
        assert!(matches!(p.kind, Peeled::Primitive(ref n) if n == "str"));
    }

    #[test]
    fn test_containers() {
        let cache = fixture();
        let model = cache.get_package("shop::model").unwrap();
        let t = ty("HashMap<String, Vec<Item>>");
        assert!(matches!(peel(&cache, &model, &t).kind, Peeled::Map(_, _)));
        let t = ty("&[Item]");
        let p = peel(&cache, &model, &t);
        assert_eq!(p.pointers, 1);
        assert!(matches!(p.kind, Peeled::Sequence(_)));
        let t = ty("[Item; 4]");
        assert!(matches!(peel(&cache, &model, &t).kind, Peeled::Array(_, Some(4))));
        let t = ty("Box<dyn Fn(u32) -> bool>");
        let p = peel(&cache, &model, &t);
        assert_eq!(p.pointers, 1);
        assert!(matches!(p.kind, Peeled::Function { .. }));
    }

    #[test]
    fn test_shadowed_primitive_resolves_to_declaration() {
        let cache = fixture();
        let model = cache.get_package("shop::model").unwrap();
        let t = ty("u8");
        assert!(matches!(peel(&cache, &model, &t).kind, Peeled::Named(_)));
        let t = ty("u16");
        assert!(matches!(peel(&cache, &model, &t).kind, Peeled::Primitive(_)));
        let t = ty("Missing");
        assert!(matches!(peel(&cache, &model, &t).kind, Peeled::Unknown(_)));
    }

    #[test]
    fn test_lock_and_cell_wrappers_are_transparent() {
        let cache = fixture();
        let model = cache.get_package("shop::model").unwrap();
        let t = ty("Arc<std::sync::Mutex<Item>>");
        let p = peel(&cache, &model, &t);
        assert_eq!(p.pointers, 1);
        assert!(matches!(p.kind, Peeled::Named(ref s) if s.id() == "shop::model:Item"));

        let t = ty("std::cell::RefCell<Vec<Item>>");
        assert!(matches!(peel(&cache, &model, &t).kind, Peeled::Sequence(_)));
    }

    #[test]
    fn test_result_outside_return_position() {
        let cache = fixture();
        let model = cache.get_package("shop::model").unwrap();
        let t = ty("Result<Item, String>");
        match peel(&cache, &model, &t).kind {
            Peeled::Result(ok, err) => {
                assert_eq!(ok.to_string(), "Item");
                assert_eq!(err.to_string(), "String");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    // -------------------------------------------------------------------------
    // Result flattening
    // -------------------------------------------------------------------------

    fn results_cache() -> PackageCache {
        PackageCache::from_sources(
            "shop",
            &[
                (
                    "model",
                    r#"
                    pub struct Item;
                    pub struct Error;
                    pub struct AppError;
                    pub type Result<T> = std::result::Result<T, AppError>;
                    pub type Pair<A, B> = Result<(A, B)>;
                    "#,
                ),
                ("plain", "use crate::model::{Error, Item};"),
                ("aliased", "use crate::model::{Item, Pair, Result};"),
                ("dynamic", "use anyhow::Result;\nuse crate::model::Item;"),
            ],
        )
        .unwrap()
        .with_known_crates(&["anyhow"])
    }

    fn flatten(cache: &PackageCache, package: &str, src: &str) -> Vec<(String, bool)> {
        let scope = cache.get_package(package).unwrap();
        let out = ty(src);
        flatten_results(cache, &scope, Some(&out))
            .into_iter()
            .map(|slot| {
                let text = match slot.ty {
                    SlotType::Written(t) => t.to_string(),
                    SlotType::Scoped(t, package) => format!("{}::{}", package.path, t),
                    SlotType::Resolved(symbol) => symbol.id(),
                };
                (text, slot.is_error)
            })
            .collect()
    }

    #[test]
    fn test_flatten_result_pair_and_tuple() {
        let cache = results_cache();
        assert_eq!(
            flatten(&cache, "shop::plain", "Result<Box<Item>, Error>"),
            vec![("Box<Item>".to_string(), false), ("Error".to_string(), true)]
        );
        let slots = flatten(&cache, "shop::plain", "Result<(Vec<Item>, u64), Error>");
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[1], ("u64".to_string(), false));
        assert!(slots[2].1);
        assert_eq!(flatten(&cache, "shop::plain", "(Item, u64)").len(), 2);
    }

    #[test]
    fn test_flatten_unit_none_and_future() {
        let cache = results_cache();
        let scope = cache.get_package("shop::plain").unwrap();
        assert!(flatten_results(&cache, &scope, None).is_empty());
        assert!(flatten(&cache, "shop::plain", "()").is_empty());
        let slots = flatten(
            &cache,
            "shop::plain",
            "Pin<Box<dyn Future<Output = Result<Item, Error>> + Send>>",
        );
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].0, "Item");
    }

    #[test]
    fn test_imported_external_result_takes_crate_error() {
        let cache = results_cache();
        assert_eq!(
            flatten(&cache, "shop::dynamic", "Result<Item>"),
            vec![("Item".to_string(), false), ("anyhow:Error".to_string(), true)]
        );
        assert_eq!(
            flatten(&cache, "shop::plain", "std::io::Result<Item>"),
            vec![("Item".to_string(), false), ("std::io:Error".to_string(), true)]
        );
    }

    #[test]
    fn test_result_alias_is_expanded() {
        let cache = results_cache();
        assert_eq!(
            flatten(&cache, "shop::aliased", "Result<Item>"),
            vec![
                ("Item".to_string(), false),
                ("shop::model::AppError".to_string(), true)
            ]
        );
        assert_eq!(
            flatten(&cache, "shop::aliased", "Pair<Item, u32>"),
            vec![
                ("Item".to_string(), false),
                ("u32".to_string(), false),
                ("shop::model::AppError".to_string(), true)
            ]
        );
    }

    #[test]
    fn test_mentions_any() {
        let params = vec!["T".to_string()];
        assert!(mentions_any(&ty("Vec<Option<T>>"), &params));
        assert!(mentions_any(&ty("&[T; 2]"), &params));
        assert!(!mentions_any(&ty("Vec<Item>"), &params));
        assert!(!mentions_any(&ty("T"), &[]));
    }
}
