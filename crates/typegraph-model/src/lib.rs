//! Shared model for the typegraph workspace.
//!
//! This crate holds the plain, serializable records exchanged between the
//! extraction engine and the code-emission stage:
//!
//! - [`Project`] - contracts plus the shared type table keyed by Type ID
//! - [`Type`] - one normalized type descriptor
//! - [`Tags`] - annotation maps parsed from `@tg` doc comment lines
//!
//! Nothing here refers to another record by embedding; cycles in the source
//! type graph are expressed only through Type IDs.

pub mod project;
pub mod tags;
pub mod type_id;
pub mod types;

pub use project::{
    parse_error_code, Contract, ErrorInfo, ErrorSource, ErrorTypeReference, HandlerRef,
    Implementation, Method, Project, ERROR_CODE_RANGE, SCHEMA_VERSION,
};
pub use tags::{has_marker, parse_doc_lines, ParsedDocs, Tags, MARKER};
pub use type_id::{is_primitive, make_type_id, split_type_id};
pub use types::{
    EnumVariant, FunctionSignature, Receiver, StructField, Type, TypeKind, Variable,
};
