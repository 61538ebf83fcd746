//! Normalized type descriptors.
//!
//! Every entry of the project type table is a [`Type`]. Entries reference each
//! other only by Type ID, never by embedding, so the serialized graph has no
//! cyclic object references even when the source types are self-referential.

use crate::type_id::is_primitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Discriminant of a [`Type`].
///
/// The scalar kinds classify primitive names; primitives themselves are never
/// materialized in the type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Bool,
    Char,
    String,
    Str,
    Unit,
    Never,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    IntSize,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uint128,
    UintSize,
    Float32,
    Float64,
    Sequence,
    Array,
    Map,
    Struct,
    Enum,
    Tuple,
    Interface,
    Function,
    Alias,
    /// A type from a known dependency whose sources are not available.
    External,
}

impl TypeKind {
    /// Scalar kind of a primitive name.
    pub fn of_primitive(name: &str) -> Option<TypeKind> {
        let kind = match name {
            "bool" => TypeKind::Bool,
            "char" => TypeKind::Char,
            "String" => TypeKind::String,
            "str" => TypeKind::Str,
            "()" => TypeKind::Unit,
            "!" => TypeKind::Never,
            "i8" => TypeKind::Int8,
            "i16" => TypeKind::Int16,
            "i32" => TypeKind::Int32,
            "i64" => TypeKind::Int64,
            "i128" => TypeKind::Int128,
            "isize" => TypeKind::IntSize,
            "u8" => TypeKind::Uint8,
            "u16" => TypeKind::Uint16,
            "u32" => TypeKind::Uint32,
            "u64" => TypeKind::Uint64,
            "u128" => TypeKind::Uint128,
            "usize" => TypeKind::UintSize,
            "f32" => TypeKind::Float32,
            "f64" => TypeKind::Float64,
            _ => return None,
        };
        debug_assert!(is_primitive(name));
        Some(kind)
    }

    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            TypeKind::Bool
                | TypeKind::Char
                | TypeKind::String
                | TypeKind::Str
                | TypeKind::Unit
                | TypeKind::Never
                | TypeKind::Int8
                | TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
                | TypeKind::Int128
                | TypeKind::IntSize
                | TypeKind::Uint8
                | TypeKind::Uint16
                | TypeKind::Uint32
                | TypeKind::Uint64
                | TypeKind::Uint128
                | TypeKind::UintSize
                | TypeKind::Float32
                | TypeKind::Float64
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TypeKind::Int8
                | TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
                | TypeKind::Int128
                | TypeKind::IntSize
                | TypeKind::Uint8
                | TypeKind::Uint16
                | TypeKind::Uint32
                | TypeKind::Uint64
                | TypeKind::Uint128
                | TypeKind::UintSize
        )
    }
}

/// How a method takes `self`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Receiver {
    /// Associated function without `self`.
    #[default]
    None,
    Value,
    Ref,
    MutRef,
}

/// A typed slot: argument, result, or the shape part of a struct field.
///
/// For sequences and arrays `type_id` is the element type; for mappings it is
/// the value type and `map_key_id` holds the key type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variable {
    pub name: String,
    pub type_id: String,
    pub pointers: usize,
    pub is_slice: bool,
    pub is_array: bool,
    pub array_len: usize,
    pub is_variadic: bool,
    pub elem_pointers: usize,
    pub is_map: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub map_key_id: String,
    pub map_key_pointers: usize,
    /// The error half of a flattened `Result`.
    pub is_error: bool,
}

impl Variable {
    /// Every Type ID this slot references.
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.type_id.as_str())
            .chain((!self.map_key_id.is_empty()).then_some(self.map_key_id.as_str()))
    }
}

/// One field of a struct, tuple, or enum variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructField {
    #[serde(flatten)]
    pub slot: Variable,
    /// Attribute path to its argument tokens, e.g. `serde -> rename = "id"`.
    pub tags: BTreeMap<String, String>,
    pub docs: Vec<String>,
}

impl StructField {
    pub fn name(&self) -> &str {
        &self.slot.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumVariant {
    pub name: String,
    pub fields: Vec<StructField>,
    pub tags: BTreeMap<String, String>,
    pub docs: Vec<String>,
}

/// A resolved method or function signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionSignature {
    pub name: String,
    pub receiver: Receiver,
    pub is_async: bool,
    pub args: Vec<Variable>,
    pub results: Vec<Variable>,
}

impl FunctionSignature {
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .chain(self.results.iter())
            .flat_map(Variable::referenced_ids)
    }
}

/// Normalized descriptor of one host-language type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Type {
    pub id: String,
    pub kind: TypeKind,
    /// Declaring package; empty for anonymous composites.
    pub package: String,
    /// Declared name; empty for anonymous composites.
    pub name: String,
    pub docs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
    pub alias_pointers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elem_type_id: Option<String>,
    pub elem_pointers: usize,
    pub array_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_key_id: Option<String>,
    pub map_key_pointers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_value_id: Option<String>,
    pub map_value_pointers: usize,
    pub fields: Vec<StructField>,
    pub variants: Vec<EnumVariant>,
    /// Interface method set, or the single signature of a function type.
    pub methods: Vec<FunctionSignature>,
    /// Interfaces satisfied by a value of this type.
    pub implements: Vec<String>,
    /// Interfaces satisfied only through a mutable pointer to this type.
    pub pointer_implements: Vec<String>,
    /// Treated as a terminal by downstream consumers.
    pub opaque: bool,
    /// Declared with type parameters; fields using them are omitted.
    pub generic: bool,
}

impl Default for Type {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: TypeKind::Struct,
            package: String::new(),
            name: String::new(),
            docs: Vec::new(),
            alias_of: None,
            alias_pointers: 0,
            elem_type_id: None,
            elem_pointers: 0,
            array_len: 0,
            map_key_id: None,
            map_key_pointers: 0,
            map_value_id: None,
            map_value_pointers: 0,
            fields: Vec::new(),
            variants: Vec::new(),
            methods: Vec::new(),
            implements: Vec::new(),
            pointer_implements: Vec::new(),
            opaque: false,
            generic: false,
        }
    }
}

impl Type {
    /// Skeleton entry for a declared type, inserted before its structure is resolved.
    pub fn skeleton(id: impl Into<String>, kind: TypeKind, package: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            kind,
            package: package.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Entry for an anonymous composite (no package or name).
    pub fn anonymous(id: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Every Type ID this entry references: fields, elements, aliases,
    /// signatures and satisfied interfaces.
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for id in [
            &self.alias_of,
            &self.elem_type_id,
            &self.map_key_id,
            &self.map_value_id,
        ]
        .into_iter()
        .flatten()
        {
            out.push(id);
        }
        for field in self
            .fields
            .iter()
            .chain(self.variants.iter().flat_map(|v| v.fields.iter()))
        {
            out.extend(field.slot.referenced_ids());
        }
        for sig in &self.methods {
            out.extend(sig.referenced_ids());
        }
        out.extend(
            self.implements
                .iter()
                .chain(self.pointer_implements.iter())
                .map(String::as_str),
        );
        out
    }
}
