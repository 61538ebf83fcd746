//! Type ID construction and parsing utilities.
//!
//! A Type ID is the deterministic key of one entry in the project type table:
//!
//! - Declared types: `package:Name`, e.g. `shop::model:Item`
//! - Primitives: the bare name, e.g. `u64` or `String` (never materialized)
//! - Anonymous composites: a canonical rendering such as `Vec<shop::model:Item>`
//!
//! These helpers are shared by every crate in the workspace so that the
//! producer and the consumer of a [`Project`](crate::Project) agree on the format.

/// Primitive type names. These are identified by name alone and never
/// appear as keys in the type table.
pub const PRIMITIVE_NAMES: &[&str] = &[
    "bool", "char", "str", "String", "()", "!", "i8", "i16", "i32", "i64", "i128", "isize", "u8",
    "u16", "u32", "u64", "u128", "usize", "f32", "f64",
];

/// Returns true if `name` is a built-in primitive name.
pub fn is_primitive(name: &str) -> bool {
    PRIMITIVE_NAMES.contains(&name)
}

/// Build the Type ID of a declared type.
///
/// An empty package yields the bare name.
pub fn make_type_id(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{}:{}", package, name)
    }
}

/// Split a declared-type ID into `(package, name)`.
///
/// Returns `None` for primitives and anonymous composite IDs, which have no
/// declaring package.
///
/// ```
/// use typegraph_model::type_id::split_type_id;
///
/// assert_eq!(split_type_id("shop::model:Item"), Some(("shop::model", "Item")));
/// assert_eq!(split_type_id("u64"), None);
/// assert_eq!(split_type_id("Vec<shop::model:Item>"), None);
/// ```
pub fn split_type_id(id: &str) -> Option<(&str, &str)> {
    let pos = id.rfind(':')?;
    if pos == 0 {
        return None;
    }
    let (package, rest) = id.split_at(pos);
    let name = &rest[1..];
    // "a::b" has its last colon inside the package separator
    if package.ends_with(':') {
        return None;
    }
    if !is_identifier(name) || !package.split("::").all(is_identifier) {
        return None;
    }
    Some((package, name))
}

/// Returns true if `s` looks like a Rust identifier (raw identifiers included).
pub fn is_identifier(s: &str) -> bool {
    let s = s.strip_prefix("r#").unwrap_or(s);
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Render a type reference with its pointer depth, used inside canonical
/// anonymous IDs (`*` per indirection level).
pub fn render_ref(id: &str, pointers: usize) -> String {
    format!("{}{}", "*".repeat(pointers), id)
}
