//! Project aggregate: contracts, methods and the shared type table.

use crate::tags::Tags;
use crate::type_id::{is_primitive, split_type_id};
use crate::types::{Receiver, Type, Variable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root aggregate handed to the code-emission stage.
///
/// Owns the whole type graph in [`Project::types`]; every other entity refers
/// to types by ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub schema_version: u64,
    /// Root crate name (module identity).
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub root: String,
    /// Project-wide annotations from the contract directory's module docs.
    pub annotations: Tags,
    pub contracts: Vec<Contract>,
    pub types: BTreeMap<String, Type>,
}

pub const SCHEMA_VERSION: u64 = 1;

impl Project {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            module: module.into(),
            ..Default::default()
        }
    }

    pub fn contract(&self, name: &str) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.name == name)
    }

    pub fn type_of(&self, id: &str) -> Option<&Type> {
        self.types.get(id)
    }

    /// True if `id` is a key of the type table or a primitive name.
    pub fn is_known_id(&self, id: &str) -> bool {
        is_primitive(id) || self.types.contains_key(id)
    }

    /// Type IDs used directly by contracts: method slots, errors and implementations.
    pub fn root_type_ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        for contract in &self.contracts {
            for method in &contract.methods {
                for var in method.args.iter().chain(method.results.iter()) {
                    out.extend(var.referenced_ids().map(str::to_string));
                }
                out.extend(method.errors.iter().map(|e| e.type_id.clone()));
            }
            out.extend(contract.implementations.iter().map(|i| i.type_id.clone()));
        }
        out.sort();
        out.dedup();
        out
    }

    /// Every referenced Type ID that is neither in the table nor primitive.
    pub fn dangling_type_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .root_type_ids()
            .into_iter()
            .filter(|id| !self.is_known_id(id))
            .collect();
        for ty in self.types.values() {
            for id in ty.referenced_ids() {
                if !self.is_known_id(id) {
                    out.push(id.to_string());
                }
            }
        }
        out.sort();
        out.dedup();
        out
    }
}

/// An annotated trait whose methods define a service boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contract {
    /// `package:Name`
    pub id: String,
    pub name: String,
    pub package: String,
    pub file: String,
    pub docs: Vec<String>,
    pub annotations: Tags,
    pub methods: Vec<Method>,
    pub implementations: Vec<Implementation>,
}

impl Contract {
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn method_mut(&mut self, name: &str) -> Option<&mut Method> {
        self.methods.iter_mut().find(|m| m.name == name)
    }
}

/// A struct that structurally satisfies a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Implementation {
    pub type_id: String,
    pub package: String,
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Method {
    pub name: String,
    pub contract_id: String,
    pub receiver: Receiver,
    pub is_async: bool,
    pub args: Vec<Variable>,
    pub results: Vec<Variable>,
    pub docs: Vec<String>,
    pub annotations: Tags,
    pub errors: Vec<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<HandlerRef>,
}

impl Method {
    /// Add an error unless one with the same type is already present.
    pub fn push_error(&mut self, info: ErrorInfo) -> bool {
        if self.errors.iter().any(|e| e.type_id == info.type_id) {
            return false;
        }
        self.errors.push(info);
        true
    }
}

/// Where an [`ErrorInfo`] came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    #[default]
    Annotation,
    Mined,
}

/// A declared error-shaped type, optionally bound to a status code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorInfo {
    pub type_id: String,
    pub package: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub source: ErrorSource,
}

/// A candidate error type found in an implementation body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorTypeReference {
    pub package: String,
    pub name: String,
}

/// Custom handler override in `package:Name` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRef {
    pub package: String,
    pub name: String,
}

impl HandlerRef {
    /// Parse the two-token `package:Name` form.
    pub fn parse(s: &str) -> Option<HandlerRef> {
        let (package, name) = split_type_id(s.trim())?;
        Some(HandlerRef {
            package: package.to_string(),
            name: name.to_string(),
        })
    }
}

/// Status codes accepted for explicit error mappings.
pub const ERROR_CODE_RANGE: std::ops::RangeInclusive<u16> = 400..=599;

/// Parse an annotation key as an error status code.
pub fn parse_error_code(key: &str) -> Option<u16> {
    key.parse::<u16>()
        .ok()
        .filter(|c| ERROR_CODE_RANGE.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    #[test]
    fn test_handler_ref_parse() {
        let h = HandlerRef::parse("shop::http:Custom").unwrap();
        assert_eq!(h.package, "shop::http");
        assert_eq!(h.name, "Custom");
        assert!(HandlerRef::parse("Custom").is_none());
        assert!(HandlerRef::parse("a:b:c").is_none());
    }

    #[test]
    fn test_parse_error_code_range() {
        assert_eq!(parse_error_code("404"), Some(404));
        assert_eq!(parse_error_code("599"), Some(599));
        assert_eq!(parse_error_code("399"), None);
        assert_eq!(parse_error_code("600"), None);
        assert_eq!(parse_error_code("handler"), None);
    }

    #[test]
    fn test_dangling_type_ids() {
        let mut project = Project::new("shop");
        project.contracts.push(Contract {
            name: "Store".into(),
            methods: vec![Method {
                name: "get".into(),
                results: vec![Variable {
                    type_id: "shop:Item".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(project.dangling_type_ids(), vec!["shop:Item".to_string()]);

        let mut item = Type::skeleton("shop:Item", TypeKind::Struct, "shop", "Item");
        item.alias_of = Some("shop:Missing".into());
        project.types.insert(item.id.clone(), item);
        assert_eq!(project.dangling_type_ids(), vec!["shop:Missing".to_string()]);
    }

    #[test]
    fn test_push_error_dedups_by_type() {
        let mut m = Method::default();
        let e = ErrorInfo {
            type_id: "shop:NotFound".into(),
            ..Default::default()
        };
        assert!(m.push_error(e.clone()));
        assert!(!m.push_error(e));
        assert_eq!(m.errors.len(), 1);
    }
}
