//! # Exclusion Policy
//!
//! Decides which types are *opaque*: materialized in the type table but never
//! expanded, because downstream consumers treat them as terminals (timestamps,
//! identifiers, big numbers, self-marshaling types).
//!
//! The policy is a table of [`OpaqueRule`]s. The built-in table can be
//! extended or replaced through [`ExclusionConfig`].
//!
//! | Category     | Built-in entries                                                  |
//! |--------------|-------------------------------------------------------------------|
//! | `temporal`   | `chrono`, `std::time`, `time` date/time types                     |
//! | `identifier` | `uuid:Uuid`, `ulid:Ulid`, any name ending in `Uuid` / `UUID`      |
//! | `numeric`    | `rust_decimal:Decimal`, `bigdecimal:BigDecimal`, `num_bigint`     |
//! | `nullable`   | `Option`, `serde_json:Value`                                      |
//! | `marshaling` | hand-written `Serialize`/`Deserialize`, or `FromStr` + `Display`  |

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use typegraph_model::{split_type_id, Type};

/// Why a type is opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpaqueCategory {
    Temporal,
    Identifier,
    Numeric,
    Nullable,
    Marshaling,
}

/// How a rule's `name` is compared with a type name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatcher {
    #[default]
    Exact,
    Suffix,
    Contains,
}

/// One row of the exclusion table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueRule {
    /// Package the rule applies to, including its sub-modules. Empty matches
    /// every package.
    #[serde(default)]
    pub package: String,
    pub name: String,
    #[serde(default)]
    pub matcher: NameMatcher,
    pub category: OpaqueCategory,
}

impl OpaqueRule {
    pub fn exact(package: &str, name: &str, category: OpaqueCategory) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
            matcher: NameMatcher::Exact,
            category,
        }
    }

    pub fn suffix(package: &str, name: &str, category: OpaqueCategory) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
            matcher: NameMatcher::Suffix,
            category,
        }
    }

    pub fn matches(&self, package: &str, name: &str) -> bool {
        if !package_matches(&self.package, package) {
            return false;
        }
        match self.matcher {
            NameMatcher::Exact => name == self.name,
            NameMatcher::Suffix => name.ends_with(&self.name),
            NameMatcher::Contains => name.contains(&self.name),
        }
    }
}

fn package_matches(rule: &str, package: &str) -> bool {
    rule.is_empty()
        || package == rule
        || package
            .strip_prefix(rule)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// Configuration of the exclusion table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Start from the built-in table.
    pub use_defaults: bool,
    pub extra_rules: Vec<OpaqueRule>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            use_defaults: true,
            extra_rules: Vec::new(),
        }
    }
}

// =============================================================================
// Built-in table
// =============================================================================

/// Traits whose hand-written impl makes a type marshal itself, as
/// `(crate, name)`.
pub const SELF_MARSHALING_TRAITS: &[(&str, &str)] =
    &[("serde", "Serialize"), ("serde", "Deserialize")];

/// Traits that together make a type round-trip through a string.
pub const STRING_ROUND_TRIP_TRAITS: [(&str, &str); 2] =
    [("std", "FromStr"), ("std", "Display")];

/// `(crate, name)` of a trait Type ID, with `core` and `alloc` folded into `std`.
fn trait_key(id: &str) -> Option<(&str, &str)> {
    let (package, name) = split_type_id(id)?;
    let krate = match package.split("::").next().unwrap_or_default() {
        "core" | "alloc" => "std",
        other => other,
    };
    Some((krate, name))
}

pub static DEFAULT_RULES: LazyLock<Vec<OpaqueRule>> = LazyLock::new(|| {
    use OpaqueCategory::*;

    let mut rules = Vec::new();
    for name in [
        "DateTime",
        "NaiveDate",
        "NaiveDateTime",
        "NaiveTime",
        "Duration",
    ] {
        rules.push(OpaqueRule::exact("chrono", name, Temporal));
    }
    for name in ["Duration", "SystemTime", "Instant"] {
        rules.push(OpaqueRule::exact("std::time", name, Temporal));
        rules.push(OpaqueRule::exact("core::time", name, Temporal));
    }
    for name in [
        "OffsetDateTime",
        "PrimitiveDateTime",
        "Date",
        "Time",
        "Duration",
    ] {
        rules.push(OpaqueRule::exact("time", name, Temporal));
    }

    rules.push(OpaqueRule::exact("uuid", "Uuid", Identifier));
    rules.push(OpaqueRule::exact("ulid", "Ulid", Identifier));
    rules.push(OpaqueRule::suffix("", "Uuid", Identifier));
    rules.push(OpaqueRule::suffix("", "UUID", Identifier));

    rules.push(OpaqueRule::exact("rust_decimal", "Decimal", Numeric));
    rules.push(OpaqueRule::exact("bigdecimal", "BigDecimal", Numeric));
    rules.push(OpaqueRule::exact("num_bigint", "BigInt", Numeric));
    rules.push(OpaqueRule::exact("num_bigint", "BigUint", Numeric));

    rules.push(OpaqueRule::exact("std::option", "Option", Nullable));
    rules.push(OpaqueRule::exact("core::option", "Option", Nullable));
    rules.push(OpaqueRule::exact("serde_json", "Value", Nullable));
    rules
});

// =============================================================================
// Policy
// =============================================================================

#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    rules: Vec<OpaqueRule>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::from_config(&ExclusionConfig::default())
    }
}

impl ExclusionPolicy {
    pub fn from_config(config: &ExclusionConfig) -> Self {
        let mut rules = if config.use_defaults {
            DEFAULT_RULES.clone()
        } else {
            Vec::new()
        };
        rules.extend(config.extra_rules.iter().cloned());
        Self { rules }
    }

    pub fn rules(&self) -> &[OpaqueRule] {
        &self.rules
    }

    /// Category of the first matching rule, else the marshaling check on
    /// `implements`.
    pub fn classify(
        &self,
        package: &str,
        name: &str,
        implements: &[String],
    ) -> Option<OpaqueCategory> {
        if let Some(rule) = self.rules.iter().find(|r| r.matches(package, name)) {
            return Some(rule.category);
        }
        let keys: Vec<(&str, &str)> = implements.iter().filter_map(|i| trait_key(i)).collect();
        if SELF_MARSHALING_TRAITS.iter().any(|t| keys.contains(t))
            || STRING_ROUND_TRIP_TRAITS.iter().all(|t| keys.contains(t))
        {
            return Some(OpaqueCategory::Marshaling);
        }
        None
    }

    pub fn is_opaque(&self, ty: &Type) -> bool {
        if ty.is_anonymous() {
            return false;
        }
        let mut implements = ty.implements.clone();
        implements.extend(ty.pointer_implements.iter().cloned());
        self.classify(&ty.package, &ty.name, &implements).is_some()
    }
}
