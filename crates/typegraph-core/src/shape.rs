//! Structural type shapes for signature comparison.
//!
//! A [`Shape`] is a pointer depth plus a structural form. Shapes are computed
//! from written type expressions and never touch the type table, so matching
//! a candidate against a contract has no side effects on the project graph.
//!
//! Two slots match when their shapes are equal: pointer depth must agree
//! exactly, named types compare by Type ID, containers compare element by
//! element. Aliases are flattened before comparison.

use crate::classify::{flatten_results, peel, Peeled, ResultSlot, SlotType};
use crate::loader::{Package, PackageCache};
use crate::syntax::{FnDecl, ItemRef, TypeExpr};
use std::fmt;
use typegraph_model::type_id::render_ref;

/// Alias chains longer than this are compared by name.
pub const MAX_ALIAS_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeKind {
    Primitive(String),
    Named(String),
    Sequence(Box<Shape>),
    Array(Option<usize>, Box<Shape>),
    Map(Box<Shape>, Box<Shape>),
    Result(Box<Shape>, Box<Shape>),
    Tuple(Vec<Shape>),
    Function(Vec<Shape>, Vec<Shape>),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub pointers: usize,
    pub kind: ShapeKind,
}

impl Shape {
    fn with_pointers(mut self, extra: usize) -> Self {
        self.pointers += extra;
        self
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = match &self.kind {
            ShapeKind::Primitive(n) | ShapeKind::Named(n) | ShapeKind::Unknown(n) => n.clone(),
            ShapeKind::Sequence(e) => format!("[{}]", e),
            ShapeKind::Array(Some(n), e) => format!("[{}; {}]", e, n),
            ShapeKind::Array(None, e) => format!("[{}; _]", e),
            ShapeKind::Map(k, v) => format!("map[{}]{}", k, v),
            ShapeKind::Result(ok, err) => format!("Result<{}, {}>", ok, err),
            ShapeKind::Tuple(items) => format!("({})", join(items)),
            ShapeKind::Function(args, results) => {
                format!("fn({}) -> ({})", join(args), join(results))
            }
        };
        write!(f, "{}", render_ref(&inner, self.pointers))
    }
}

fn join(shapes: &[Shape]) -> String {
    shapes
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shape of `ty` written in `scope`. `Self` becomes `self_id` when given.
pub fn shape_of(
    cache: &PackageCache,
    scope: &Package,
    ty: &TypeExpr,
    self_id: Option<&str>,
) -> Shape {
    shape_at(cache, scope, ty, self_id, 0)
}

fn shape_at(
    cache: &PackageCache,
    scope: &Package,
    ty: &TypeExpr,
    self_id: Option<&str>,
    depth: usize,
) -> Shape {
    let peeled = peel(cache, scope, ty);
    let sub = |t: &TypeExpr| Box::new(shape_at(cache, scope, t, self_id, depth));
    let kind = match peeled.kind {
        Peeled::Primitive(name) => ShapeKind::Primitive(name),
        Peeled::Sequence(elem) => ShapeKind::Sequence(sub(elem)),
        Peeled::Array(elem, len) => ShapeKind::Array(len, sub(elem)),
        Peeled::Map(key, value) => ShapeKind::Map(sub(key), sub(value)),
        Peeled::Result(ok, err) => ShapeKind::Result(sub(ok), sub(err)),
        Peeled::Tuple(items) => ShapeKind::Tuple(
            items
                .iter()
                .map(|t| shape_at(cache, scope, t, self_id, depth))
                .collect(),
        ),
        Peeled::Function { inputs, output } => ShapeKind::Function(
            inputs
                .iter()
                .map(|t| shape_at(cache, scope, t, self_id, depth))
                .collect(),
            flatten_results(cache, scope, output)
                .iter()
                .map(|slot| slot_shape(cache, scope, slot, self_id, depth))
                .collect(),
        ),
        Peeled::SelfType => match self_id {
            Some(id) => ShapeKind::Named(id.to_string()),
            None => ShapeKind::Unknown("Self".to_string()),
        },
        Peeled::Unknown(text) => ShapeKind::Unknown(text),
        Peeled::Named(symbol) => {
            if depth < MAX_ALIAS_DEPTH && symbol.has_source() {
                if let Some(package) = cache.get_package(&symbol.package) {
                    if let Some(ItemRef::Alias(alias)) = package.find_item(&symbol.name) {
                        if alias.generics.is_empty() {
                            return shape_at(cache, &package, &alias.target, self_id, depth + 1)
                                .with_pointers(peeled.pointers);
                        }
                    }
                }
            }
            ShapeKind::Named(symbol.id())
        }
    };
    Shape {
        pointers: peeled.pointers,
        kind,
    }
}

fn slot_shape(
    cache: &PackageCache,
    scope: &Package,
    slot: &ResultSlot,
    self_id: Option<&str>,
    depth: usize,
) -> Shape {
    match &slot.ty {
        SlotType::Written(ty) => shape_at(cache, scope, ty, self_id, depth),
        SlotType::Scoped(ty, package) => shape_at(cache, package, ty, self_id, depth),
        SlotType::Resolved(symbol) => Shape {
            pointers: 0,
            kind: ShapeKind::Named(symbol.id()),
        },
    }
}

// =============================================================================
// Signatures
// =============================================================================

/// Argument and result shapes of a method; results carry their error flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureShape {
    pub name: String,
    pub args: Vec<Shape>,
    pub results: Vec<(Shape, bool)>,
}

pub fn signature_shape(
    cache: &PackageCache,
    scope: &Package,
    decl: &FnDecl,
    self_id: Option<&str>,
) -> SignatureShape {
    SignatureShape {
        name: decl.name.clone(),
        args: decl
            .inputs
            .iter()
            .map(|p| shape_of(cache, scope, &p.ty, self_id))
            .collect(),
        results: flatten_results(cache, scope, decl.output.as_ref())
            .iter()
            .map(|slot| (slot_shape(cache, scope, slot, self_id, 0), slot.is_error))
            .collect(),
    }
}

/// Why two signatures are not compatible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    ArgCount {
        expected: usize,
        found: usize,
    },
    ResultCount {
        expected: usize,
        found: usize,
    },
    Arg {
        index: usize,
        expected: Shape,
        found: Shape,
    },
    Result {
        index: usize,
        expected: Shape,
        found: Shape,
    },
    ErrorSlot {
        index: usize,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::ArgCount { expected, found } => {
                write!(f, "expected {} arguments, found {}", expected, found)
            }
            Mismatch::ResultCount { expected, found } => {
                write!(f, "expected {} results, found {}", expected, found)
            }
            Mismatch::Arg {
                index,
                expected,
                found,
            } => write!(f, "argument {}: expected {}, found {}", index, expected, found),
            Mismatch::Result {
                index,
                expected,
                found,
            } => write!(f, "result {}: expected {}, found {}", index, expected, found),
            Mismatch::ErrorSlot { index } => {
                write!(f, "result {}: error slot disagrees", index)
            }
        }
    }
}

/// Compare a contract method with a candidate method. Receivers are not compared.
pub fn compare_signatures(
    contract_method: &SignatureShape,
    candidate_method: &SignatureShape,
) -> Result<(), Mismatch> {
    if contract_method.args.len() != candidate_method.args.len() {
        return Err(Mismatch::ArgCount {
            expected: contract_method.args.len(),
            found: candidate_method.args.len(),
        });
    }
    if contract_method.results.len() != candidate_method.results.len() {
        return Err(Mismatch::ResultCount {
            expected: contract_method.results.len(),
            found: candidate_method.results.len(),
        });
    }
    for (index, (expected, found)) in contract_method
        .args
        .iter()
        .zip(&candidate_method.args)
        .enumerate()
    {
        if expected != found {
            return Err(Mismatch::Arg {
                index,
                expected: expected.clone(),
                found: found.clone(),
            });
        }
    }
    for (index, ((expected, expected_err), (found, found_err))) in contract_method
        .results
        .iter()
        .zip(&candidate_method.results)
        .enumerate()
    {
        if expected != found {
            return Err(Mismatch::Result {
                index,
                expected: expected.clone(),
                found: found.clone(),
            });
        }
        if expected_err != found_err {
            return Err(Mismatch::ErrorSlot { index });
        }
    }
    Ok(())
}
