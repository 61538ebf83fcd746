//! typegraph
//!
//! Extracts a closed, normalized type graph from the `@tg`-annotated traits of
//! a Rust project, ready for a code-emission stage:
//!
//! - **Contracts**: traits marked with `@tg` and their method signatures
//! - **Implementations**: structs whose methods match a contract, with mined errors
//! - **Type table**: every type reachable from a contract, keyed by Type ID
//!
//! The engine lives in [`typegraph_core`]; this crate adds the host boundary
//! ([`describe`], [`execute`]) and configuration file loading.
//!
//! # Request format
//!
//! ```json
//! { "kind": "extract", "root": "/path/to/project", "config": { "include": ["Store"] } }
//! ```
//!
//! The response is `{ "project": { .. }, "dangling": [] }`.

#![allow(clippy::result_large_err)]

pub mod host;

pub use host::{HostCallbacks, LogLevel, NoopHost, TracingHost};
pub use typegraph_core::{extract, Engine, EngineConfig, FatalError};
pub use typegraph_model::Project;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "typegraph.toml";

// =============================================================================
// Capabilities
// =============================================================================

/// What this build of the extractor supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub name: String,
    pub version: String,
    pub request_kinds: Vec<String>,
}

pub fn describe() -> Capabilities {
    Capabilities {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        request_kinds: vec!["extract".to_string()],
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Request {
    /// Extract the project rooted at `root`.
    #[serde(rename = "extract")]
    Extract {
        root: PathBuf,
        /// Inline configuration. When absent, `typegraph.toml` in `root` is used.
        #[serde(default)]
        config: Option<EngineConfig>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub project: Project,
    /// Type IDs referenced but missing from the type table.
    pub dangling: Vec<String>,
}

/// Decode a JSON request, run it, and encode the JSON response.
pub fn execute(request: &[u8]) -> Result<Vec<u8>> {
    execute_with(request, &NoopHost)
}

/// Like [`execute`], forwarding the run summary to `host`.
pub fn execute_with(request: &[u8], host: &dyn HostCallbacks) -> Result<Vec<u8>> {
    let request: Request =
        serde_json::from_slice(request).context("failed to decode request")?;
    let response = handle(request, host)?;
    serde_json::to_vec(&response).context("failed to encode response")
}

/// Run a decoded request.
pub fn handle(request: Request, host: &dyn HostCallbacks) -> Result<Response> {
    match request {
        Request::Extract { root, config } => {
            let config = match config {
                Some(config) => config,
                None => load_config(&root, None)?,
            };
            let project = extract(&root, &config)
                .with_context(|| format!("extraction failed for {}", root.display()))?;
            let dangling = project.dangling_type_ids();

            host.log(LogLevel::Info, &summary(&project));
            if !dangling.is_empty() {
                host.log(
                    LogLevel::Warn,
                    &format!("dangling type references: {}", dangling.join(", ")),
                );
            }
            Ok(Response { project, dangling })
        }
    }
}

fn summary(project: &Project) -> String {
    let methods: usize = project.contracts.iter().map(|c| c.methods.len()).sum();
    let implementations: usize = project
        .contracts
        .iter()
        .map(|c| c.implementations.len())
        .sum();
    format!(
        "extracted {}: {} contracts, {} methods, {} implementations, {} types",
        project.module,
        project.contracts.len(),
        methods,
        implementations,
        project.types.len()
    )
}

// =============================================================================
// Configuration
// =============================================================================

/// Load the engine configuration.
///
/// An explicit file must exist. Without one, `typegraph.toml` in `root` is
/// used when present and the defaults otherwise.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<EngineConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = root.join(CONFIG_FILE_NAME);
            if !candidate.is_file() {
                return Ok(EngineConfig::default());
            }
            candidate
        }
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
}
