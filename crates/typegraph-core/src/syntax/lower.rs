//! Lowering from `syn` syntax trees into the owned [`SourceModule`] model.

use super::{
    AliasDecl, BodySummary, ConstructKind, ConstructedPath, EnumDecl, FieldDecl, FnDecl, FnSugar,
    ImplDecl, Param, PathSegment, PathType, SourceModule, StructDecl, StructStyle, TraitDecl,
    TypeExpr, UseDecl, VariantDecl,
};
use quote::ToTokens;
use std::collections::BTreeMap;
use syn::ext::IdentExt;
use syn::visit::{self, Visit};
use syn::{
    Attribute, Block, Expr, ExprLit, Fields, FnArg, GenericArgument, GenericParam, Generics, Item,
    Lit, Meta, Pat, PathArguments, ReturnType, Stmt, Type, TypeParamBound, UseTree, Visibility,
};
use typegraph_model::Receiver;

/// Marker that flags machine-generated files.
const GENERATED_MARKER: &str = "@generated";

/// Parse Rust source text.
pub fn parse_source(src: &str) -> syn::Result<syn::File> {
    syn::parse_file(src)
}

/// True when one of the first lines of `src` carries the generated marker.
pub fn is_generated_source(src: &str) -> bool {
    src.lines()
        .take(5)
        .any(|l| l.trim_start().starts_with("//") && l.contains(GENERATED_MARKER))
}

/// Lower a parsed file into modules: the file module first, then every inline
/// `mod x { .. }` it contains.
///
/// `module_path` is the path of the file module inside its crate (`""` for
/// the crate root).
pub fn lower_file(file: &syn::File, module_path: &str, generated: bool) -> Vec<SourceModule> {
    let mut out = Vec::new();
    lower_module(module_path, &file.attrs, &file.items, generated, &mut out);
    out.rotate_right(1);
    out
}

fn lower_module(
    path: &str,
    attrs: &[Attribute],
    items: &[Item],
    generated: bool,
    out: &mut Vec<SourceModule>,
) {
    let mut module = SourceModule {
        path: path.to_string(),
        docs: doc_lines(attrs),
        generated,
        ..Default::default()
    };

    for item in items {
        match item {
            Item::Use(u) => {
                lower_use_tree(&u.tree, &mut Vec::new(), is_public(&u.vis), &mut module.uses)
            }
            Item::Struct(s) => module.structs.push(lower_struct(s)),
            Item::Enum(e) => module.enums.push(lower_enum(e)),
            Item::Trait(t) => module.traits.push(lower_trait(t)),
            Item::Type(t) => module.aliases.push(AliasDecl {
                name: t.ident.unraw().to_string(),
                docs: doc_lines(&t.attrs),
                generics: generic_names(&t.generics),
                target: lower_type(&t.ty),
            }),
            Item::Impl(i) => module.impls.push(lower_impl(i)),
            Item::Mod(m) => {
                if is_cfg_test(&m.attrs) {
                    continue;
                }
                let name = m.ident.unraw().to_string();
                module.children.push(name.clone());
                if let Some((_, content)) = &m.content {
                    let child_path = if path.is_empty() {
                        name
                    } else {
                        format!("{}::{}", path, name)
                    };
                    lower_module(&child_path, &m.attrs, content, generated, out);
                }
            }
            _ => {}
        }
    }

    out.push(module);
}

// =============================================================================
// Attributes
// =============================================================================

/// Doc comment lines, one leading space stripped.
pub fn doc_lines(attrs: &[Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Some(s.value()),
                _ => None,
            },
            _ => None,
        })
        .flat_map(|s| {
            s.lines()
                .map(|l| l.strip_prefix(' ').unwrap_or(l).to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Non-doc attributes as `path -> argument tokens`; repeated paths are joined.
fn attr_tags(attrs: &[Attribute]) -> BTreeMap<String, String> {
    let mut tags: BTreeMap<String, String> = BTreeMap::new();
    for attr in attrs.iter().filter(|a| !a.path().is_ident("doc")) {
        let key = attr.path().to_token_stream().to_string().replace(' ', "");
        let value = match &attr.meta {
            Meta::Path(_) => String::new(),
            Meta::List(list) => list.tokens.to_string(),
            Meta::NameValue(nv) => nv.value.to_token_stream().to_string(),
        };
        tags.entry(key)
            .and_modify(|existing| {
                if !existing.is_empty() && !value.is_empty() {
                    existing.push_str(", ");
                }
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    tags
}

fn is_cfg_test(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|a| {
        a.path().is_ident("cfg")
            && matches!(&a.meta, Meta::List(list) if list.tokens.to_string() == "test")
    })
}

fn is_public(vis: &Visibility) -> bool {
    matches!(vis, Visibility::Public(_))
}

fn generic_names(generics: &Generics) -> Vec<String> {
    generics
        .params
        .iter()
        .filter_map(|p| match p {
            GenericParam::Type(t) => Some(t.ident.to_string()),
            GenericParam::Const(c) => Some(c.ident.to_string()),
            GenericParam::Lifetime(_) => None,
        })
        .collect()
}

// =============================================================================
// Items
// =============================================================================

fn lower_use_tree(tree: &UseTree, prefix: &mut Vec<String>, public: bool, out: &mut Vec<UseDecl>) {
    match tree {
        UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            lower_use_tree(&p.tree, prefix, public, out);
            prefix.pop();
        }
        UseTree::Name(n) => {
            let ident = n.ident.to_string();
            if ident == "self" {
                if let Some(last) = prefix.last() {
                    out.push(UseDecl {
                        path: prefix.clone(),
                        alias: Some(last.clone()),
                        public,
                    });
                }
            } else {
                let mut path = prefix.clone();
                path.push(ident.clone());
                out.push(UseDecl {
                    path,
                    alias: Some(ident),
                    public,
                });
            }
        }
        UseTree::Rename(r) => {
            let alias = r.rename.to_string();
            if alias == "_" {
                return;
            }
            let ident = r.ident.to_string();
            let mut path = prefix.clone();
            if ident != "self" {
                path.push(ident);
            }
            out.push(UseDecl {
                path,
                alias: Some(alias),
                public,
            });
        }
        UseTree::Glob(_) => out.push(UseDecl {
            path: prefix.clone(),
            alias: None,
            public,
        }),
        UseTree::Group(g) => {
            for item in &g.items {
                lower_use_tree(item, prefix, public, out);
            }
        }
    }
}

fn lower_fields(fields: &Fields) -> (StructStyle, Vec<FieldDecl>) {
    match fields {
        Fields::Named(named) => (
            StructStyle::Named,
            named
                .named
                .iter()
                .map(|f| {
                    let name = f
                        .ident
                        .as_ref()
                        .map(|i| i.unraw().to_string())
                        .unwrap_or_default();
                    lower_field(name, f)
                })
                .collect(),
        ),
        Fields::Unnamed(unnamed) => (
            StructStyle::Tuple,
            unnamed
                .unnamed
                .iter()
                .enumerate()
                .map(|(i, f)| lower_field(i.to_string(), f))
                .collect(),
        ),
        Fields::Unit => (StructStyle::Unit, Vec::new()),
    }
}

fn lower_field(name: String, field: &syn::Field) -> FieldDecl {
    FieldDecl {
        name,
        ty: lower_type(&field.ty),
        docs: doc_lines(&field.attrs),
        tags: attr_tags(&field.attrs),
        public: is_public(&field.vis),
    }
}

fn lower_struct(s: &syn::ItemStruct) -> StructDecl {
    let (style, fields) = lower_fields(&s.fields);
    StructDecl {
        name: s.ident.unraw().to_string(),
        docs: doc_lines(&s.attrs),
        generics: generic_names(&s.generics),
        style,
        fields,
    }
}

fn lower_enum(e: &syn::ItemEnum) -> EnumDecl {
    EnumDecl {
        name: e.ident.unraw().to_string(),
        docs: doc_lines(&e.attrs),
        generics: generic_names(&e.generics),
        variants: e
            .variants
            .iter()
            .map(|v| VariantDecl {
                name: v.ident.unraw().to_string(),
                docs: doc_lines(&v.attrs),
                tags: attr_tags(&v.attrs),
                fields: lower_fields(&v.fields).1,
            })
            .collect(),
    }
}

fn lower_trait(t: &syn::ItemTrait) -> TraitDecl {
    TraitDecl {
        name: t.ident.unraw().to_string(),
        docs: doc_lines(&t.attrs),
        generics: generic_names(&t.generics),
        supertraits: t
            .supertraits
            .iter()
            .filter_map(|b| match b {
                TypeParamBound::Trait(tb) => Some(lower_path(&tb.path)),
                _ => None,
            })
            .collect(),
        methods: t
            .items
            .iter()
            .filter_map(|item| match item {
                syn::TraitItem::Fn(f) => Some(lower_fn(&f.sig, &f.attrs, f.default.as_ref())),
                _ => None,
            })
            .collect(),
    }
}

fn lower_impl(i: &syn::ItemImpl) -> ImplDecl {
    ImplDecl {
        self_ty: lower_type(&i.self_ty),
        trait_path: i
            .trait_
            .as_ref()
            .filter(|(negative, _, _)| negative.is_none())
            .map(|(_, path, _)| lower_path(path)),
        generics: generic_names(&i.generics),
        methods: i
            .items
            .iter()
            .filter_map(|item| match item {
                syn::ImplItem::Fn(f) => Some(lower_fn(&f.sig, &f.attrs, Some(&f.block))),
                _ => None,
            })
            .collect(),
    }
}

fn lower_fn(sig: &syn::Signature, attrs: &[Attribute], body: Option<&Block>) -> FnDecl {
    let mut receiver = Receiver::None;
    let mut inputs = Vec::new();
    for arg in &sig.inputs {
        match arg {
            FnArg::Receiver(r) => receiver = receiver_of(r),
            FnArg::Typed(pt) => inputs.push(Param {
                name: pat_name(&pt.pat),
                ty: lower_type(&pt.ty),
            }),
        }
    }

    FnDecl {
        name: sig.ident.unraw().to_string(),
        docs: doc_lines(attrs),
        receiver,
        is_async: sig.asyncness.is_some(),
        generics: generic_names(&sig.generics),
        inputs,
        output: return_type(&sig.output),
        has_body: body.is_some(),
        body: body.map(summarize_body).unwrap_or_default(),
    }
}

fn receiver_of(r: &syn::Receiver) -> Receiver {
    if r.reference.is_some() {
        return if r.mutability.is_some() {
            Receiver::MutRef
        } else {
            Receiver::Ref
        };
    }
    match &*r.ty {
        Type::Reference(tr) if tr.mutability.is_some() => Receiver::MutRef,
        Type::Reference(_) => Receiver::Ref,
        _ => Receiver::Value,
    }
}

fn pat_name(pat: &Pat) -> String {
    match pat {
        Pat::Ident(pi) => pi.ident.unraw().to_string(),
        _ => String::new(),
    }
}

fn return_type(output: &ReturnType) -> Option<TypeExpr> {
    match output {
        ReturnType::Default => None,
        ReturnType::Type(_, ty) => Some(lower_type(ty)),
    }
}

// =============================================================================
// Types
// =============================================================================

/// Lower a `syn` type into a [`TypeExpr`].
pub fn lower_type(ty: &Type) -> TypeExpr {
    match ty {
        Type::Path(tp) if tp.qself.is_none() => TypeExpr::Path(lower_path(&tp.path)),
        Type::Reference(r) => TypeExpr::Reference {
            mutable: r.mutability.is_some(),
            inner: Box::new(lower_type(&r.elem)),
        },
        Type::Ptr(p) => TypeExpr::RawPointer {
            mutable: p.mutability.is_some(),
            inner: Box::new(lower_type(&p.elem)),
        },
        Type::Slice(s) => TypeExpr::Slice(Box::new(lower_type(&s.elem))),
        Type::Array(a) => TypeExpr::Array {
            elem: Box::new(lower_type(&a.elem)),
            len: match &a.len {
                Expr::Lit(ExprLit {
                    lit: Lit::Int(n), ..
                }) => n.base10_parse::<usize>().ok(),
                _ => None,
            },
        },
        Type::Tuple(t) => TypeExpr::Tuple(t.elems.iter().map(lower_type).collect()),
        Type::BareFn(f) => TypeExpr::BareFn {
            inputs: f.inputs.iter().map(|a| lower_type(&a.ty)).collect(),
            output: return_type(&f.output).map(Box::new),
        },
        Type::TraitObject(t) => TypeExpr::TraitObject(trait_bounds(t.bounds.iter())),
        Type::ImplTrait(t) => TypeExpr::ImplTrait(trait_bounds(t.bounds.iter())),
        Type::Paren(p) => lower_type(&p.elem),
        Type::Group(g) => lower_type(&g.elem),
        Type::Never(_) => TypeExpr::Never,
        Type::Infer(_) => TypeExpr::Infer,
        other => TypeExpr::Unsupported(other.to_token_stream().to_string()),
    }
}

fn trait_bounds<'a>(bounds: impl Iterator<Item = &'a TypeParamBound>) -> Vec<PathType> {
    bounds
        .filter_map(|b| match b {
            TypeParamBound::Trait(tb) => Some(lower_path(&tb.path)),
            _ => None,
        })
        .collect()
}

/// Lower a `syn` path into a [`PathType`].
pub fn lower_path(path: &syn::Path) -> PathType {
    PathType {
        segments: path
            .segments
            .iter()
            .map(|seg| {
                let mut out = PathSegment {
                    ident: seg.ident.unraw().to_string(),
                    ..Default::default()
                };
                match &seg.arguments {
                    PathArguments::None => {}
                    PathArguments::AngleBracketed(a) => {
                        for arg in &a.args {
                            match arg {
                                GenericArgument::Type(t) => out.args.push(lower_type(t)),
                                GenericArgument::AssocType(b) => out
                                    .bindings
                                    .push((b.ident.to_string(), lower_type(&b.ty))),
                                _ => {}
                            }
                        }
                    }
                    PathArguments::Parenthesized(p) => {
                        out.fn_sugar = Some(FnSugar {
                            inputs: p.inputs.iter().map(lower_type).collect(),
                            output: return_type(&p.output).map(Box::new),
                        });
                    }
                }
                out
            })
            .collect(),
    }
}

// =============================================================================
// Bodies
// =============================================================================

fn summarize_body(block: &Block) -> BodySummary {
    let mut visitor = BodyVisitor::default();
    visitor.visit_block(block);
    BodySummary {
        constructed: visitor.constructed,
        int_literal: int_literal(block),
    }
}

#[derive(Default)]
struct BodyVisitor {
    constructed: Vec<ConstructedPath>,
}

impl BodyVisitor {
    fn push(&mut self, path: PathType, kind: ConstructKind) {
        let entry = ConstructedPath { path, kind };
        if !self.constructed.contains(&entry) {
            self.constructed.push(entry);
        }
    }
}

impl<'ast> Visit<'ast> for BodyVisitor {
    fn visit_expr_struct(&mut self, node: &'ast syn::ExprStruct) {
        if node.qself.is_none() {
            self.push(lower_path(&node.path), ConstructKind::StructLiteral);
        }
        visit::visit_expr_struct(self, node);
    }

    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        if let Expr::Path(p) = &*node.func {
            if p.qself.is_none() {
                let path = lower_path(&p.path);
                let last = path.last_ident().to_string();
                if last == "Err" && path.is_single() {
                    for arg in &node.args {
                        if let Some(payload) = payload_path(arg) {
                            self.push(payload, ConstructKind::ErrPayload);
                        }
                    }
                } else if starts_uppercase(&last) && !matches!(last.as_str(), "Ok" | "Some") {
                    self.push(path, ConstructKind::TupleConstructor);
                } else if path.segments.len() >= 2
                    && starts_uppercase(&path.segments[path.segments.len() - 2].ident)
                {
                    if let Some(parent) = path.parent() {
                        self.push(parent, ConstructKind::AssociatedCall);
                    }
                }
            }
        }
        visit::visit_expr_call(self, node);
    }
}

/// The type path of a value placed inside `Err(..)`.
fn payload_path(expr: &Expr) -> Option<PathType> {
    match expr {
        Expr::Path(p) if p.qself.is_none() => Some(lower_path(&p.path)),
        Expr::Struct(s) if s.qself.is_none() => Some(lower_path(&s.path)),
        Expr::Call(c) => match &*c.func {
            Expr::Path(p) if p.qself.is_none() => {
                let path = lower_path(&p.path);
                if starts_uppercase(path.last_ident()) {
                    Some(path)
                } else {
                    path.parent()
                }
            }
            _ => None,
        },
        Expr::MethodCall(m) => payload_path(&m.receiver),
        Expr::Paren(p) => payload_path(&p.expr),
        _ => None,
    }
}

fn int_literal(block: &Block) -> Option<i64> {
    match block.stmts.as_slice() {
        [Stmt::Expr(Expr::Return(r), _)] => r.expr.as_deref().and_then(literal_of),
        [Stmt::Expr(expr, None)] => literal_of(expr),
        _ => None,
    }
}

fn literal_of(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Int(n), ..
        }) => n.base10_parse().ok(),
        Expr::Cast(c) => literal_of(&c.expr),
        Expr::Paren(p) => literal_of(&p.expr),
        _ => None,
    }
}

fn starts_uppercase(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_uppercase())
}
