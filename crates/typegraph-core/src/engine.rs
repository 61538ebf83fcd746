//! Extraction pipeline.
//!
//! ```text
//! PackageCache::load ─► collect ─► match_implementations ─► expand ─► Project
//!        │                 │                 │                  │
//!   parse sources    contracts +       implementations,     closure over
//!   (rayon)          method slots      mined errors         referenced IDs
//! ```
//!
//! One [`Resolver`] carries the type table through every stage; each stage
//! starts a fresh pass so in-progress markers never leak between them.

use crate::collector::{collect, Collected};
use crate::config::EngineConfig;
use crate::error::FatalError;
use crate::exclusion::ExclusionPolicy;
use crate::expander::{check_closure, expand};
use crate::loader::PackageCache;
use crate::matcher::match_implementations;
use crate::resolver::Resolver;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use typegraph_model::Project;

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extract the project rooted at `root`.
    pub fn run(&self, root: &Path) -> Result<Project, FatalError> {
        let started = Instant::now();
        let collector = self.config.collector();
        collector.validate()?;

        let cache = PackageCache::load(root, &self.config.loader)?;
        let policy = ExclusionPolicy::from_config(&self.config.exclusion);
        let mut resolver = Resolver::new(&cache, policy);

        resolver.begin_pass();
        let Collected {
            mut contracts,
            annotations,
            ..
        } = collect(&mut resolver, &self.config.contracts_dir, &collector)?;

        resolver.begin_pass();
        let implementations =
            match_implementations(&mut resolver, &mut contracts, &self.config.errors);

        resolver.begin_pass();
        let expanded = expand(&mut resolver, &contracts);

        let mut project = Project::new(cache.module());
        project.version = cache.version().map(str::to_string);
        project.root = cache.root().display().to_string();
        project.annotations = annotations;
        project.contracts = contracts;
        project.types = resolver.into_types();

        let dangling = check_closure(&project);
        if !dangling.is_empty() {
            warn!(count = dangling.len(), ids = ?dangling, "type graph has dangling references");
        }

        info!(
            module = %project.module,
            contracts = project.contracts.len(),
            methods = project.contracts.iter().map(|c| c.methods.len()).sum::<usize>(),
            implementations,
            types = project.types.len(),
            expanded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction complete"
        );
        Ok(project)
    }
}
