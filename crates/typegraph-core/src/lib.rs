//! Type graph extraction for annotated Rust service contracts.
//!
//! Loads a Rust project, collects the traits marked with `@tg` as contracts,
//! finds the structs implementing them, and emits a closed, normalized type
//! graph for a code-emission stage:
//!
//! - **Loading**: [`loader`] parses every source file and caches modules
//! - **Resolution**: [`symbols`] and [`resolver`] turn written types into Type IDs
//! - **Collection**: [`collector`] builds contracts and method signatures
//! - **Matching**: [`matcher`] finds implementations and mines their errors
//! - **Expansion**: [`expander`] closes the table over every reachable ID
//!
//! See [`engine::Engine`] for the full pipeline.

#![allow(clippy::result_large_err)]
#![allow(clippy::too_many_arguments)]

pub mod classify;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod expander;
pub mod loader;
pub mod manifest;
pub mod matcher;
pub mod method_index;
pub mod resolver;
pub mod shape;
pub mod symbols;
pub mod syntax;

pub use config::{CollectorConfig, EngineConfig, ErrorShape, LoaderConfig};
pub use engine::Engine;
pub use error::{FatalError, Outcome};
pub use exclusion::{ExclusionConfig, ExclusionPolicy, OpaqueCategory, OpaqueRule};
pub use loader::{Package, PackageCache};
pub use resolver::{Resolver, TypeConversionInfo};
pub use typegraph_model as model;

use std::path::Path;

/// Run the whole pipeline with `config`.
pub fn extract(root: &Path, config: &EngineConfig) -> Result<model::Project, FatalError> {
    Engine::new(config.clone()).run(root)
}
