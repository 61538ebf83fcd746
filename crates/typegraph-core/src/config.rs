//! Engine configuration.
//!
//! Every section deserializes with defaults, so an empty `typegraph.toml` is a
//! valid configuration:
//!
//! ```toml
//! contracts_dir = "src/api"
//! include = ["Store"]
//!
//! [loader]
//! dependency_roots = ["~/.cargo/registry/src/index.crates.io-6f17d22bba15001f"]
//!
//! [[exclusion.extra_rules]]
//! package = "shop::money"
//! name = "Money"
//! category = "numeric"
//! ```

use crate::error::FatalError;
use crate::exclusion::ExclusionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the contract traits, relative to the project root.
    pub contracts_dir: PathBuf,
    /// Contract names to keep. Mutually exclusive with `exclude`.
    pub include: Vec<String>,
    /// Contract names to drop.
    pub exclude: Vec<String>,
    pub loader: LoaderConfig,
    pub exclusion: ExclusionConfig,
    pub errors: ErrorShape,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            contracts_dir: PathBuf::from("src"),
            include: Vec::new(),
            exclude: Vec::new(),
            loader: LoaderConfig::default(),
            exclusion: ExclusionConfig::default(),
            errors: ErrorShape::default(),
        }
    }
}

impl EngineConfig {
    pub fn collector(&self) -> CollectorConfig {
        CollectorConfig {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Overrides the root crate name read from `Cargo.toml`.
    pub module_name: Option<String>,
    /// Directories searched for dependency sources (`<crate>` or `<crate>-<version>`).
    pub dependency_roots: Vec<PathBuf>,
    /// Directory names never descended into.
    pub excluded_dirs: Vec<String>,
    /// Load the root module of every known dependency up front.
    pub preload_dependencies: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            module_name: None,
            dependency_roots: Vec::new(),
            excluded_dirs: vec!["target".to_string(), "vendor".to_string()],
            preload_dependencies: false,
        }
    }
}

/// Contract name filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<(), FatalError> {
        if !self.include.is_empty() && !self.exclude.is_empty() {
            return Err(FatalError::ConflictingFilters);
        }
        Ok(())
    }

    pub fn accepts(&self, name: &str) -> bool {
        if !self.include.is_empty() {
            return self.include.iter().any(|n| n == name);
        }
        !self.exclude.iter().any(|n| n == name)
    }
}

/// Method names that make a type error-shaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorShape {
    pub message_methods: Vec<String>,
    pub code_methods: Vec<String>,
}

impl Default for ErrorShape {
    fn default() -> Self {
        Self {
            message_methods: vec!["message".to_string(), "error".to_string()],
            code_methods: vec!["code".to_string(), "status_code".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.contracts_dir, PathBuf::from("src"));
        assert!(config.exclusion.use_defaults);
        assert_eq!(config.loader.excluded_dirs, vec!["target", "vendor"]);
    }

    #[test]
    fn test_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            contracts_dir = "src/api"
            exclude = ["Admin"]

            [loader]
            module_name = "shop"

            [[exclusion.extra_rules]]
            package = "shop::money"
            name = "Money"
            category = "numeric"
            "#,
        )
        .unwrap();
        assert_eq!(config.contracts_dir, PathBuf::from("src/api"));
        assert_eq!(config.loader.module_name.as_deref(), Some("shop"));
        assert_eq!(config.exclusion.extra_rules.len(), 1);
        assert!(config.exclusion.use_defaults);
        assert!(!config.collector().accepts("Admin"));
        assert!(config.collector().accepts("Store"));
    }

    #[test]
    fn test_conflicting_filters() {
        let filters = CollectorConfig {
            include: vec!["A".into()],
            exclude: vec!["B".into()],
        };
        assert!(matches!(
            filters.validate(),
            Err(FatalError::ConflictingFilters)
        ));
    }
}
