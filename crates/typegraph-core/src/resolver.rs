//! # Type Graph Resolver
//!
//! Converts written type expressions into [`TypeConversionInfo`] and populates
//! the shared type table as a side effect.
//!
//! ## Algorithm
//!
//! ```text
//! convert(expr, scope)
//!   │
//!   ├─ strip pointers (&, *const, Box, Arc, Option, ...)  → pointers
//!   ├─ primitive?                 → return name, nothing materialized
//!   ├─ Vec / [T; N] / HashMap?    → flatten element, key, value into the info
//!   ├─ tuple / fn / Result?       → materialize an anonymous composite
//!   └─ named                      → resolve_symbol
//!                                     ├─ in progress or in table → id
//!                                     ├─ insert skeleton
//!                                     ├─ interface detection
//!                                     ├─ opaque? stop
//!                                     └─ fields / variants / alias target
//! ```
//!
//! The skeleton is inserted before any recursion, so self-referential and
//! mutually recursive types terminate: a second visit finds the entry and
//! returns its ID.

use crate::classify::{flatten_results, mentions_any, peel, Peeled, SlotType};
use crate::exclusion::ExclusionPolicy;
use crate::loader::{Package, PackageCache};
use crate::method_index::MethodIndex;
use crate::shape::{compare_signatures, signature_shape};
use crate::symbols::{self, Symbol};
use crate::syntax::{unwrap_future, FieldDecl, FnDecl, ItemRef, TypeExpr};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use typegraph_model::type_id::render_ref;
use typegraph_model::{
    is_primitive, make_type_id, parse_doc_lines, EnumVariant, FunctionSignature, Receiver,
    StructField, Type, TypeKind, Variable,
};

// =============================================================================
// TypeConversionInfo
// =============================================================================

/// Result of converting one type expression. Top-level containers are
/// flattened into the flags here rather than materialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeConversionInfo {
    /// Element type for sequences and arrays, value type for maps.
    pub type_id: String,
    pub pointers: usize,
    pub is_slice: bool,
    pub is_array: bool,
    pub array_len: usize,
    pub elem_pointers: usize,
    pub is_map: bool,
    pub map_key_id: String,
    pub map_key_pointers: usize,
}

impl TypeConversionInfo {
    pub fn is_container(&self) -> bool {
        self.is_slice || self.is_array || self.is_map
    }

    pub fn into_variable(self, name: &str, is_error: bool) -> Variable {
        Variable {
            name: name.to_string(),
            type_id: self.type_id,
            pointers: self.pointers,
            is_slice: self.is_slice,
            is_array: self.is_array,
            array_len: self.array_len,
            is_variadic: false,
            elem_pointers: self.elem_pointers,
            is_map: self.is_map,
            map_key_id: self.map_key_id,
            map_key_pointers: self.map_key_pointers,
            is_error,
        }
    }

    /// Canonical rendering without the outer pointers.
    fn canonical(&self) -> String {
        let elem = render_ref(&self.type_id, self.elem_pointers);
        if self.is_map {
            format!(
                "Map<{}, {}>",
                render_ref(&self.map_key_id, self.map_key_pointers),
                elem
            )
        } else if self.is_slice {
            format!("Vec<{}>", elem)
        } else if self.is_array {
            format!("[{}; {}]", elem, self.array_len)
        } else {
            self.type_id.clone()
        }
    }

    fn rendered(&self) -> String {
        render_ref(&self.canonical(), self.pointers)
    }
}

// =============================================================================
// Resolver
// =============================================================================

struct TraitEntry {
    id: String,
    scope: Arc<Package>,
    index: usize,
}

pub struct Resolver<'c> {
    cache: &'c PackageCache,
    policy: ExclusionPolicy,
    methods: MethodIndex,
    types: BTreeMap<String, Type>,
    /// Declared types whose resolution has started in the current pass.
    in_progress: HashSet<String>,
    catalog: Vec<TraitEntry>,
    catalog_packages: usize,
}

impl<'c> Resolver<'c> {
    pub fn new(cache: &'c PackageCache, policy: ExclusionPolicy) -> Self {
        Self {
            cache,
            policy,
            methods: MethodIndex::new(),
            types: BTreeMap::new(),
            in_progress: HashSet::new(),
            catalog: Vec::new(),
            catalog_packages: 0,
        }
    }

    pub fn cache(&self) -> &'c PackageCache {
        self.cache
    }

    pub fn policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    pub fn types(&self) -> &BTreeMap<String, Type> {
        &self.types
    }

    /// Method index, brought up to date with the cache.
    pub fn methods(&mut self) -> &MethodIndex {
        self.refresh_methods();
        &self.methods
    }

    /// Start a new pass; in-progress markers never leak between passes.
    pub fn begin_pass(&mut self) {
        self.in_progress.clear();
    }

    pub fn into_types(self) -> BTreeMap<String, Type> {
        self.types
    }

    /// Convert `ty` as written in `scope`. `None` when any part is unresolvable.
    pub fn convert(&mut self, ty: &TypeExpr, scope: &Package) -> Option<TypeConversionInfo> {
        let peeled = peel(self.cache, scope, ty);
        let mut info = TypeConversionInfo {
            pointers: peeled.pointers,
            ..Default::default()
        };
        match peeled.kind {
            Peeled::Primitive(name) => info.type_id = name,
            Peeled::Sequence(elem) => {
                let elem = self.convert(elem, scope)?;
                info.is_slice = true;
                info.elem_pointers = elem.pointers;
                info.type_id = self.slot_id(&elem);
            }
            Peeled::Array(elem, len) => {
                let elem = self.convert(elem, scope)?;
                info.is_array = true;
                info.array_len = len.unwrap_or(0);
                info.elem_pointers = elem.pointers;
                info.type_id = self.slot_id(&elem);
            }
            Peeled::Map(key, value) => {
                let key = self.convert(key, scope)?;
                let value = self.convert(value, scope)?;
                info.is_map = true;
                info.map_key_pointers = key.pointers;
                info.map_key_id = self.slot_id(&key);
                info.elem_pointers = value.pointers;
                info.type_id = self.slot_id(&value);
            }
            Peeled::Tuple(items) => {
                let mut converted = Vec::with_capacity(items.len());
                for item in items {
                    converted.push(self.convert(item, scope)?);
                }
                let id = if converted.len() == 1 {
                    format!("({},)", converted[0].rendered())
                } else {
                    format!("({})", render_all(&converted))
                };
                let mut tuple = Type::anonymous(&id, TypeKind::Tuple);
                tuple.fields = converted
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| StructField {
                        slot: c.into_variable(&i.to_string(), false),
                        ..Default::default()
                    })
                    .collect();
                info.type_id = self.materialize(tuple);
            }
            Peeled::Result(ok, err) => {
                let ok = self.convert(ok, scope)?;
                let err = self.convert(err, scope)?;
                let id = format!("Result<{}, {}>", ok.rendered(), err.rendered());
                let mut result = Type::anonymous(&id, TypeKind::Enum);
                result.variants = [("Ok", ok), ("Err", err)]
                    .into_iter()
                    .map(|(name, info)| EnumVariant {
                        name: name.to_string(),
                        fields: vec![StructField {
                            slot: info.into_variable("0", false),
                            ..Default::default()
                        }],
                        ..Default::default()
                    })
                    .collect();
                info.type_id = self.materialize(result);
            }
            Peeled::Function { inputs, output } => {
                let args = inputs.iter().map(|t| (String::new(), t));
                let signature = self
                    .signature_from(String::new(), Receiver::None, false, args, output, scope)
                    .ok()?;
                let id = function_id(&signature);
                let mut function = Type::anonymous(&id, TypeKind::Function);
                function.methods = vec![signature];
                info.type_id = self.materialize(function);
            }
            Peeled::Named(symbol) => info.type_id = self.resolve_symbol(&symbol)?,
            Peeled::SelfType => {
                warn!(package = %scope.path, "`Self` has no meaning outside an impl");
                return None;
            }
            Peeled::Unknown(text) => {
                warn!(package = %scope.path, ty = %text, "cannot resolve type");
                return None;
            }
        }
        Some(info)
    }

    /// ID to reference `info` from an element, key, or alias slot.
    /// Containers become anonymous composites.
    pub fn slot_id(&mut self, info: &TypeConversionInfo) -> String {
        if !info.is_container() {
            return info.type_id.clone();
        }
        let id = info.canonical();
        let ty = if info.is_map {
            Type {
                map_key_id: Some(info.map_key_id.clone()),
                map_key_pointers: info.map_key_pointers,
                map_value_id: Some(info.type_id.clone()),
                map_value_pointers: info.elem_pointers,
                ..Type::anonymous(&id, TypeKind::Map)
            }
        } else {
            Type {
                elem_type_id: Some(info.type_id.clone()),
                elem_pointers: info.elem_pointers,
                array_len: info.array_len,
                ..Type::anonymous(
                    &id,
                    if info.is_array {
                        TypeKind::Array
                    } else {
                        TypeKind::Sequence
                    },
                )
            }
        };
        self.materialize(ty)
    }

    fn materialize(&mut self, ty: Type) -> String {
        let id = ty.id.clone();
        self.types.entry(id.clone()).or_insert(ty);
        id
    }

    /// Resolve a `package:Name` ID into the table.
    pub fn resolve_id(&mut self, id: &str) -> Option<String> {
        if is_primitive(id) || self.types.contains_key(id) {
            return Some(id.to_string());
        }
        let Some(symbol) = symbols::resolve_id(self.cache, id) else {
            warn!(type_id = %id, "cannot resolve type id");
            return None;
        };
        self.resolve_symbol(&symbol)
    }

    /// Materialize a declared type and everything its structure references.
    pub fn resolve_symbol(&mut self, symbol: &Symbol) -> Option<String> {
        let id = symbol.id();
        if self.in_progress.contains(&id) || self.types.contains_key(&id) {
            return Some(id);
        }

        if !symbol.has_source() {
            let mut ty = Type::skeleton(&id, TypeKind::External, &symbol.package, &symbol.name);
            ty.opaque = self.policy.is_opaque(&ty);
            self.types.insert(id.clone(), ty);
            return Some(id);
        }

        let Some(package) = self.cache.get_package(&symbol.package) else {
            warn!(package = %symbol.package, type_id = %id, "declaring package not loaded");
            return None;
        };
        let Some(item) = package.find_item(&symbol.name) else {
            warn!(package = %symbol.package, type_id = %id, "declaration not found");
            return None;
        };
        let kind = match item {
            ItemRef::Struct(_) => TypeKind::Struct,
            ItemRef::Enum(_) => TypeKind::Enum,
            ItemRef::Trait(_) => TypeKind::Interface,
            ItemRef::Alias(_) => TypeKind::Alias,
        };

        self.in_progress.insert(id.clone());
        let mut ty = Type::skeleton(&id, kind, &package.path, &symbol.name);
        ty.docs = parse_doc_lines(item.docs()).docs;
        ty.generic = !item.generics().is_empty();
        self.types.insert(id.clone(), ty.clone());

        if kind != TypeKind::Interface {
            let (implements, pointer_implements) = self.detect_interfaces(&id);
            ty.implements = implements;
            ty.pointer_implements = pointer_implements;
        }
        ty.opaque = self.policy.is_opaque(&ty);

        if ty.opaque {
            debug!(type_id = %id, "opaque type kept as a skeleton");
        } else {
            let generics = item.generics().to_vec();
            match item {
                ItemRef::Struct(s) => {
                    ty.fields = self.convert_fields(&s.fields, &package, &generics, &id);
                }
                ItemRef::Enum(e) => {
                    let mut variants = Vec::with_capacity(e.variants.len());
                    for v in &e.variants {
                        variants.push(EnumVariant {
                            name: v.name.clone(),
                            fields: self.convert_fields(&v.fields, &package, &generics, &id),
                            tags: v.tags.clone(),
                            docs: v.docs.clone(),
                        });
                    }
                    ty.variants = variants;
                }
                ItemRef::Alias(a) => {
                    if mentions_any(&a.target, &generics) {
                        debug!(type_id = %id, "generic alias target not expanded");
                    } else if let Some(info) = self.convert(&a.target, &package) {
                        ty.alias_pointers = info.pointers;
                        ty.alias_of = Some(self.slot_id(&info));
                    } else {
                        warn!(type_id = %id, target = %a.target, "alias target unresolvable");
                    }
                }
                ItemRef::Trait(_) => {}
            }
        }

        self.types.insert(id.clone(), ty);
        self.in_progress.remove(&id);
        Some(id)
    }

    fn convert_fields(
        &mut self,
        fields: &[FieldDecl],
        package: &Package,
        generics: &[String],
        owner: &str,
    ) -> Vec<StructField> {
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            if mentions_any(&field.ty, generics) {
                debug!(type_id = %owner, field = %field.name, "field uses a type parameter");
                continue;
            }
            match self.convert(&field.ty, package) {
                Some(info) => out.push(StructField {
                    slot: info.into_variable(&field.name, false),
                    tags: field.tags.clone(),
                    docs: field.docs.clone(),
                }),
                None => warn!(
                    type_id = %owner,
                    field = %field.name,
                    ty = %field.ty,
                    "skipping field with unresolvable type"
                ),
            }
        }
        out
    }

    // =========================================================================
    // Signatures
    // =========================================================================

    /// Convert a method declaration. `Err` names the first unresolvable slot.
    pub fn convert_signature(
        &mut self,
        decl: &FnDecl,
        scope: &Package,
    ) -> Result<FunctionSignature, String> {
        let is_async = decl.is_async || decl.output.as_ref().and_then(unwrap_future).is_some();
        let args = decl.inputs.iter().map(|p| (p.name.clone(), &p.ty));
        self.signature_from(
            decl.name.clone(),
            decl.receiver,
            is_async,
            args,
            decl.output.as_ref(),
            scope,
        )
    }

    fn signature_from<'t>(
        &mut self,
        name: String,
        receiver: Receiver,
        is_async: bool,
        args: impl Iterator<Item = (String, &'t TypeExpr)>,
        output: Option<&TypeExpr>,
        scope: &Package,
    ) -> Result<FunctionSignature, String> {
        let mut signature = FunctionSignature {
            name,
            receiver,
            is_async,
            ..Default::default()
        };
        for (i, (arg_name, ty)) in args.enumerate() {
            let info = self.convert(ty, scope).ok_or_else(|| {
                if arg_name.is_empty() {
                    format!("argument {}", i)
                } else {
                    format!("argument `{}`", arg_name)
                }
            })?;
            signature.args.push(info.into_variable(&arg_name, false));
        }
        let cache = self.cache;
        for (i, slot) in flatten_results(cache, scope, output).into_iter().enumerate() {
            let info = match &slot.ty {
                SlotType::Written(ty) => self.convert(ty, scope),
                SlotType::Scoped(ty, package) => self.convert(ty, package),
                SlotType::Resolved(symbol) => self.resolve_symbol(symbol).map(|type_id| {
                    TypeConversionInfo {
                        type_id,
                        ..Default::default()
                    }
                }),
            }
            .ok_or_else(|| format!("result {}", i))?;
            signature.results.push(info.into_variable("", slot.is_error));
        }
        Ok(signature)
    }

    /// Fill `Type::methods` of an interface from its trait declaration.
    pub fn resolve_interface_methods(&mut self, id: &str) -> usize {
        let Some(ty) = self.types.get(id) else {
            return 0;
        };
        if ty.kind != TypeKind::Interface || !ty.methods.is_empty() {
            return 0;
        }
        let (package_path, name) = (ty.package.clone(), ty.name.clone());
        let Some(package) = self.cache.get_package(&package_path) else {
            return 0;
        };
        let Some(ItemRef::Trait(decl)) = package.find_item(&name) else {
            return 0;
        };

        let mut signatures = Vec::new();
        for method in &decl.methods {
            if !method.generics.is_empty() {
                debug!(type_id = %id, method = %method.name, "generic trait method skipped");
                continue;
            }
            match self.convert_signature(method, &package) {
                Ok(sig) => signatures.push(sig),
                Err(slot) => warn!(
                    type_id = %id,
                    method = %method.name,
                    slot = %slot,
                    "interface method dropped"
                ),
            }
        }
        let count = signatures.len();
        if let Some(ty) = self.types.get_mut(id) {
            ty.methods = signatures;
        }
        count
    }

    // =========================================================================
    // Interface detection
    // =========================================================================

    fn refresh_methods(&mut self) {
        let count = self.cache.package_count();
        if count == self.catalog_packages {
            return;
        }
        self.methods.refresh(self.cache);
        self.catalog = self
            .cache
            .packages()
            .into_iter()
            .flat_map(|package| {
                package
                    .traits()
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.generics.is_empty() && t.required_methods().next().is_some())
                    .map(|(index, t)| TraitEntry {
                        id: make_type_id(&package.path, &t.name),
                        scope: Arc::clone(&package),
                        index,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        self.catalog_packages = count;
    }

    /// `(implements, pointer_implements)` of a declared type: nominal impls
    /// plus every catalogued trait whose required methods the type provides.
    fn detect_interfaces(&mut self, id: &str) -> (Vec<String>, Vec<String>) {
        self.refresh_methods();
        let mut implements = self.methods.traits_of(id);
        let mut pointer_implements = Vec::new();
        if self.methods.methods_for(id).is_empty() {
            return (implements, pointer_implements);
        }

        for entry in &self.catalog {
            if implements.contains(&entry.id) {
                continue;
            }
            let Some(decl) = entry.scope.traits().get(entry.index) else {
                continue;
            };
            let mut by_value = true;
            let mut by_pointer = true;
            for required in decl.required_methods() {
                let Some(found) = self.methods.method(id, &required.name) else {
                    by_value = false;
                    by_pointer = false;
                    break;
                };
                let expected = signature_shape(self.cache, &entry.scope, required, Some(id));
                let actual = signature_shape(self.cache, &found.scope, &found.decl, Some(id));
                if compare_signatures(&expected, &actual).is_err() {
                    by_value = false;
                    by_pointer = false;
                    break;
                }
                if required.receiver == Receiver::None {
                    if found.decl.receiver != Receiver::None {
                        by_value = false;
                        by_pointer = false;
                        break;
                    }
                    continue;
                }
                by_value &= found.in_value_set();
                by_pointer &= found.in_pointer_set();
            }
            if by_value {
                implements.push(entry.id.clone());
            } else if by_pointer {
                pointer_implements.push(entry.id.clone());
            }
        }
        (implements, pointer_implements)
    }
}

fn render_all(infos: &[TypeConversionInfo]) -> String {
    infos
        .iter()
        .map(TypeConversionInfo::rendered)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_variable(v: &Variable) -> String {
    TypeConversionInfo {
        type_id: v.type_id.clone(),
        pointers: v.pointers,
        is_slice: v.is_slice,
        is_array: v.is_array,
        array_len: v.array_len,
        elem_pointers: v.elem_pointers,
        is_map: v.is_map,
        map_key_id: v.map_key_id.clone(),
        map_key_pointers: v.map_key_pointers,
    }
    .rendered()
}

fn function_id(signature: &FunctionSignature) -> String {
    let join = |vars: &[Variable]| {
        vars.iter()
            .map(render_variable)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "fn({}) -> ({})",
        join(&signature.args),
        join(&signature.results)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::lower::lower_type;
    use pretty_assertions::assert_eq;

    fn ty(src: &str) -> TypeExpr {
        lower_type(&syn::parse_str::<syn::Type>(src).unwrap())
    }

    fn cache() -> PackageCache {
        PackageCache::from_sources(
            "shop",
            &[(
                "model",
                r#"
                use std::collections::HashMap;

                /// An item.
                /// @tg internal
                pub struct Item {
                    pub id: u64,
                    pub parent: Option<Box<Item>>,
                    pub tags: HashMap<String, Vec<Tag>>,
                    pub pair: (u32, String),
                    pub hook: fn(u32) -> bool,
                    missing: Unknown,
                }
                pub struct Tag(pub String);
                pub enum State { Active, Moved { to: Box<Item> } }
                pub type Items = Vec<Item>;
                pub type Base = Item;
                pub type Middle = Base;
                pub struct A { pub b: Option<Box<B>> }
                pub struct B { pub a: Vec<A> }
                pub struct Page<T> { pub items: Vec<T>, pub total: u64 }
                pub struct OrderUuid([u8; 16]);
                pub struct Job {
                    pub outcome: Result<Child, String>,
                    pub guarded: std::sync::Mutex<Other>,
                }
                pub struct Child { pub id: u64 }
                pub struct Other { pub note: String }
                "#,
            )],
        )
        .unwrap()
    }

    #[test]
    fn test_self_reference_terminates() {
        let cache = cache();
        let model = cache.get_package("shop::model").unwrap();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        let info = resolver.convert(&ty("Box<Item>"), &model).unwrap();
        assert_eq!(info.type_id, "shop::model:Item");
        assert_eq!(info.pointers, 1);

        let item = &resolver.types()["shop::model:Item"];
        assert_eq!(item.docs, vec!["An item.".to_string()]);
        let names: Vec<_> = item.fields.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["id", "parent", "tags", "pair", "hook"]);
        let parent = &item.fields[1].slot;
        assert_eq!(parent.type_id, "shop::model:Item");
        assert_eq!(parent.pointers, 2);
        let tags = &item.fields[2].slot;
        assert!(tags.is_map);
        assert_eq!(tags.map_key_id, "String");
        assert_eq!(tags.type_id, "Vec<shop::model:Tag>");
        assert!(resolver.types().contains_key("Vec<shop::model:Tag>"));
        assert!(resolver.types().contains_key("(u32, String)"));
        assert!(resolver.types().contains_key("fn(u32) -> (bool)"));
    }

    #[test]
    fn test_result_and_lock_fields_reach_their_types() {
        let cache = cache();
        let model = cache.get_package("shop::model").unwrap();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        resolver.convert(&ty("Job"), &model).unwrap();
        let types = resolver.types();
        assert!(types.contains_key("shop::model:Child"));
        assert!(types.contains_key("shop::model:Other"));

        let job = &types["shop::model:Job"];
        assert_eq!(job.fields.len(), 2);
        assert_eq!(job.fields[0].slot.type_id, "Result<shop::model:Child, String>");
        assert_eq!(job.fields[1].slot.type_id, "shop::model:Other");
        assert_eq!(job.fields[1].slot.pointers, 0);

        let outcome = &types["Result<shop::model:Child, String>"];
        assert_eq!(outcome.kind, TypeKind::Enum);
        let variants: Vec<_> = outcome.variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(variants, vec!["Ok", "Err"]);
        assert_eq!(outcome.variants[0].fields[0].slot.type_id, "shop::model:Child");
        assert_eq!(outcome.variants[1].fields[0].slot.type_id, "String");
    }

    #[test]
    fn test_memoized_conversion_is_idempotent() {
        let cache = cache();
        let model = cache.get_package("shop::model").unwrap();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        let first = resolver.convert(&ty("Vec<Item>"), &model).unwrap();
        let snapshot = resolver.types().clone();
        let second = resolver.convert(&ty("Vec<Item>"), &model).unwrap();
        assert_eq!(first, second);
        assert_eq!(&snapshot, resolver.types());
        assert!(first.is_slice);
        assert_eq!(first.type_id, "shop::model:Item");
    }

    #[test]
    fn test_mutual_recursion_and_aliases() {
        let cache = cache();
        let model = cache.get_package("shop::model").unwrap();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        resolver.convert(&ty("A"), &model).unwrap();
        assert!(resolver.types().contains_key("shop::model:B"));

        let info = resolver.convert(&ty("Middle"), &model).unwrap();
        assert_eq!(info.type_id, "shop::model:Middle");
        let middle = &resolver.types()["shop::model:Middle"];
        assert_eq!(middle.kind, TypeKind::Alias);
        assert_eq!(middle.alias_of.as_deref(), Some("shop::model:Base"));
        let base = &resolver.types()["shop::model:Base"];
        assert_eq!(base.alias_of.as_deref(), Some("shop::model:Item"));

        resolver.convert(&ty("Items"), &model).unwrap();
        assert_eq!(
            resolver.types()["shop::model:Items"].alias_of.as_deref(),
            Some("Vec<shop::model:Item>")
        );
    }

    #[test]
    fn test_enum_generic_and_opaque() {
        let cache = cache();
        let model = cache.get_package("shop::model").unwrap();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        resolver.convert(&ty("State"), &model).unwrap();
        let state = &resolver.types()["shop::model:State"];
        assert_eq!(state.kind, TypeKind::Enum);
        assert_eq!(state.variants[1].fields[0].slot.pointers, 1);

        resolver.convert(&ty("Page<Item>"), &model).unwrap();
        let page = &resolver.types()["shop::model:Page"];
        assert!(page.generic);
        assert_eq!(page.fields.len(), 1);
        assert_eq!(page.fields[0].name(), "total");

        resolver.convert(&ty("OrderUuid"), &model).unwrap();
        let uuid = &resolver.types()["shop::model:OrderUuid"];
        assert!(uuid.opaque);
        assert!(uuid.fields.is_empty());
    }

    #[test]
    fn test_unresolvable_and_external() {
        let cache = cache();
        let model = cache.get_package("shop::model").unwrap();
        let mut resolver = Resolver::new(&cache, ExclusionPolicy::default());
        assert!(resolver.convert(&ty("Vec<Nope>"), &model).is_none());
        assert!(resolver.convert(&ty("Self"), &model).is_none());
        let info = resolver.convert(&ty("&HashMap<u64, &str>"), &model).unwrap();
        assert_eq!(info.pointers, 1);
        assert_eq!(info.map_key_id, "u64");
        assert_eq!(info.type_id, "str");
        assert_eq!(info.elem_pointers, 1);
        assert!(resolver.resolve_id("shop::model:Tag").is_some());
        assert!(resolver.resolve_id("shop::model:Ghost").is_none());
        assert_eq!(resolver.resolve_id("u64").as_deref(), Some("u64"));
    }
}
