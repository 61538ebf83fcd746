//! # Source Model
//!
//! Owned, thread-safe rendering of one Rust module, lowered from a `syn`
//! syntax tree by [`lower`].
//!
//! `syn` trees hold `proc_macro2` token streams, which are neither `Send` nor
//! `Sync`. The package cache is shared behind a lock, so everything the later
//! passes need is copied out into the plain types below:
//!
//! | Type             | Description                                              |
//! |------------------|----------------------------------------------------------|
//! | [`SourceModule`] | One module: docs, `use` declarations, items, impls       |
//! | [`TypeExpr`]     | A type expression as written, before any resolution      |
//! | [`FnDecl`]       | A method signature plus a summary of its body            |
//! | [`BodySummary`]  | Paths constructed or returned inside a method body       |

pub mod lower;

pub use lower::{lower_file, parse_source};

use std::collections::BTreeMap;
use std::fmt;
use typegraph_model::Receiver;

// =============================================================================
// Type expressions
// =============================================================================

/// A type expression as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Path(PathType),
    Reference {
        mutable: bool,
        inner: Box<TypeExpr>,
    },
    RawPointer {
        mutable: bool,
        inner: Box<TypeExpr>,
    },
    Slice(Box<TypeExpr>),
    Array {
        elem: Box<TypeExpr>,
        len: Option<usize>,
    },
    Tuple(Vec<TypeExpr>),
    BareFn {
        inputs: Vec<TypeExpr>,
        output: Option<Box<TypeExpr>>,
    },
    TraitObject(Vec<PathType>),
    ImplTrait(Vec<PathType>),
    Never,
    Infer,
    Unsupported(String),
}

/// A path such as `crate::model::Item` or `HashMap<String, Item>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathType {
    pub segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathSegment {
    pub ident: String,
    /// Type arguments in angle brackets (lifetimes and consts dropped).
    pub args: Vec<TypeExpr>,
    /// Associated type bindings such as `Output = T`.
    pub bindings: Vec<(String, TypeExpr)>,
    /// Parenthesized sugar of the `Fn(A) -> B` traits.
    pub fn_sugar: Option<FnSugar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FnSugar {
    pub inputs: Vec<TypeExpr>,
    pub output: Option<Box<TypeExpr>>,
}

impl PathType {
    pub fn from_idents<S: AsRef<str>>(idents: &[S]) -> Self {
        Self {
            segments: idents
                .iter()
                .map(|s| PathSegment {
                    ident: s.as_ref().to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    pub fn idents(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.ident.clone()).collect()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    pub fn last_ident(&self) -> &str {
        self.segments.last().map(|s| s.ident.as_str()).unwrap_or("")
    }

    pub fn is_single(&self) -> bool {
        self.segments.len() == 1
    }

    /// The path without its last segment.
    pub fn parent(&self) -> Option<PathType> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(PathType {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The path with its last segment replaced by `ident` (arguments dropped).
    pub fn with_last(&self, ident: &str) -> PathType {
        let mut segments = self.segments.clone();
        if let Some(last) = segments.last_mut() {
            *last = PathSegment {
                ident: ident.to_string(),
                ..Default::default()
            };
        }
        PathType { segments }
    }
}

impl TypeExpr {
    pub fn path<S: AsRef<str>>(idents: &[S]) -> Self {
        TypeExpr::Path(PathType::from_idents(idents))
    }

    pub fn as_path(&self) -> Option<&PathType> {
        match self {
            TypeExpr::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Single-segment `Self`.
    pub fn is_self(&self) -> bool {
        matches!(self, TypeExpr::Path(p) if p.is_single() && p.last_ident() == "Self")
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Path(p) => write!(f, "{}", p),
            TypeExpr::Reference { mutable, inner } => {
                write!(f, "&{}{}", if *mutable { "mut " } else { "" }, inner)
            }
            TypeExpr::RawPointer { mutable, inner } => {
                write!(f, "*{} {}", if *mutable { "mut" } else { "const" }, inner)
            }
            TypeExpr::Slice(inner) => write!(f, "[{}]", inner),
            TypeExpr::Array { elem, len } => match len {
                Some(n) => write!(f, "[{}; {}]", elem, n),
                None => write!(f, "[{}; _]", elem),
            },
            TypeExpr::Tuple(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            TypeExpr::BareFn { inputs, output } => {
                write!(f, "fn(")?;
                write_list(f, inputs)?;
                write!(f, ")")?;
                if let Some(out) = output {
                    write!(f, " -> {}", out)?;
                }
                Ok(())
            }
            TypeExpr::TraitObject(bounds) => {
                write!(f, "dyn ")?;
                write_bounds(f, bounds)
            }
            TypeExpr::ImplTrait(bounds) => {
                write!(f, "impl ")?;
                write_bounds(f, bounds)
            }
            TypeExpr::Never => write!(f, "!"),
            TypeExpr::Infer => write!(f, "_"),
            TypeExpr::Unsupported(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "::")?;
            }
            write!(f, "{}", seg.ident)?;
            if let Some(sugar) = &seg.fn_sugar {
                write!(f, "(")?;
                write_list(f, &sugar.inputs)?;
                write!(f, ")")?;
                if let Some(out) = &sugar.output {
                    write!(f, " -> {}", out)?;
                }
            } else if !seg.args.is_empty() || !seg.bindings.is_empty() {
                write!(f, "<")?;
                write_list(f, &seg.args)?;
                for (i, (name, ty)) in seg.bindings.iter().enumerate() {
                    if i > 0 || !seg.args.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, ty)?;
                }
                write!(f, ">")?;
            }
        }
        Ok(())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeExpr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_bounds(f: &mut fmt::Formatter<'_>, bounds: &[PathType]) -> fmt::Result {
    for (i, b) in bounds.iter().enumerate() {
        if i > 0 {
            write!(f, " + ")?;
        }
        write!(f, "{}", b)?;
    }
    Ok(())
}

// =============================================================================
// Items
// =============================================================================

/// `use` declaration, one per imported name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseDecl {
    /// Full path as written, e.g. `["crate", "model", "Item"]`.
    pub path: Vec<String>,
    /// Local name; `None` for a glob import.
    pub alias: Option<String>,
    pub public: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructStyle {
    #[default]
    Named,
    Tuple,
    Unit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldDecl {
    /// Field name; tuple fields are numbered.
    pub name: String,
    pub ty: TypeExpr,
    pub docs: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub public: bool,
}

impl Default for TypeExpr {
    fn default() -> Self {
        TypeExpr::Tuple(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructDecl {
    pub name: String,
    pub docs: Vec<String>,
    pub generics: Vec<String>,
    pub style: StructStyle,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariantDecl {
    pub name: String,
    pub docs: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnumDecl {
    pub name: String,
    pub docs: Vec<String>,
    pub generics: Vec<String>,
    pub variants: Vec<VariantDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TraitDecl {
    pub name: String,
    pub docs: Vec<String>,
    pub generics: Vec<String>,
    pub supertraits: Vec<PathType>,
    pub methods: Vec<FnDecl>,
}

impl TraitDecl {
    /// Methods without a default body.
    pub fn required_methods(&self) -> impl Iterator<Item = &FnDecl> {
        self.methods.iter().filter(|m| !m.has_body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AliasDecl {
    pub name: String,
    pub docs: Vec<String>,
    pub generics: Vec<String>,
    pub target: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImplDecl {
    pub self_ty: TypeExpr,
    pub trait_path: Option<PathType>,
    pub generics: Vec<String>,
    pub methods: Vec<FnDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Param {
    /// Binding name; empty for `_` and destructuring patterns.
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FnDecl {
    pub name: String,
    pub docs: Vec<String>,
    pub receiver: Receiver,
    pub is_async: bool,
    pub generics: Vec<String>,
    pub inputs: Vec<Param>,
    pub output: Option<TypeExpr>,
    pub has_body: bool,
    pub body: BodySummary,
}

/// How a path showed up in a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructKind {
    /// `Path { .. }`
    StructLiteral,
    /// `Path(..)` where the last segment names a type or variant.
    TupleConstructor,
    /// `Type::function(..)`
    AssociatedCall,
    /// A value inside `Err(..)`.
    ErrPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructedPath {
    pub path: PathType,
    pub kind: ConstructKind,
}

/// What the error-mining pass needs from a method body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BodySummary {
    pub constructed: Vec<ConstructedPath>,
    /// Set when the body is a single integer literal.
    pub int_literal: Option<i64>,
}

/// One lowered module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceModule {
    /// Module path inside its crate, without the crate name (`""` for the root).
    pub path: String,
    /// Inner doc lines (`//!`).
    pub docs: Vec<String>,
    pub generated: bool,
    pub uses: Vec<UseDecl>,
    /// Names of child modules declared here (`mod x;` and `mod x { .. }`).
    pub children: Vec<String>,
    pub structs: Vec<StructDecl>,
    pub enums: Vec<EnumDecl>,
    pub traits: Vec<TraitDecl>,
    pub aliases: Vec<AliasDecl>,
    pub impls: Vec<ImplDecl>,
}

/// Borrowed view of a named item.
#[derive(Debug, Clone, Copy)]
pub enum ItemRef<'a> {
    Struct(&'a StructDecl),
    Enum(&'a EnumDecl),
    Trait(&'a TraitDecl),
    Alias(&'a AliasDecl),
}

impl ItemRef<'_> {
    pub fn generics(&self) -> &[String] {
        match self {
            ItemRef::Struct(s) => &s.generics,
            ItemRef::Enum(e) => &e.generics,
            ItemRef::Trait(t) => &t.generics,
            ItemRef::Alias(a) => &a.generics,
        }
    }

    pub fn docs(&self) -> &[String] {
        match self {
            ItemRef::Struct(s) => &s.docs,
            ItemRef::Enum(e) => &e.docs,
            ItemRef::Trait(t) => &t.docs,
            ItemRef::Alias(a) => &a.docs,
        }
    }
}

impl SourceModule {
    pub fn find_item(&self, name: &str) -> Option<ItemRef<'_>> {
        if let Some(s) = self.structs.iter().find(|s| s.name == name) {
            return Some(ItemRef::Struct(s));
        }
        if let Some(e) = self.enums.iter().find(|e| e.name == name) {
            return Some(ItemRef::Enum(e));
        }
        if let Some(t) = self.traits.iter().find(|t| t.name == name) {
            return Some(ItemRef::Trait(t));
        }
        self.aliases
            .iter()
            .find(|a| a.name == name)
            .map(ItemRef::Alias)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.find_item(name).is_some()
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.iter().any(|c| c == name)
    }
}

// =============================================================================
// Helpers on type expressions
// =============================================================================

/// Unwrap `impl Future<Output = T>`, `Pin<Box<dyn Future<Output = T>>>` and
/// friends to `T`.
pub fn unwrap_future(expr: &TypeExpr) -> Option<&TypeExpr> {
    match expr {
        TypeExpr::ImplTrait(bounds) | TypeExpr::TraitObject(bounds) => bounds
            .iter()
            .filter(|b| b.last_ident() == "Future")
            .find_map(|b| {
                b.last()?
                    .bindings
                    .iter()
                    .find(|(name, _)| name == "Output")
                    .map(|(_, ty)| ty)
            }),
        TypeExpr::Path(p) if matches!(p.last_ident(), "Pin" | "Box") => {
            let arg = p.last()?.args.first()?;
            unwrap_future(arg)
        }
        _ => None,
    }
}
