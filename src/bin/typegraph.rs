//! typegraph: extract the type graph of annotated Rust service contracts
//!
//! ## Features
//!
//! - **extract**: Load a project, collect `@tg` contracts, match implementations
//!   and write the closed type graph as JSON
//! - **describe**: Print the capabilities of this build
//!
//! ## Example Usage
//!
//! ```bash
//! # Extract the project in the current directory to stdout
//! typegraph extract --root .
//!
//! # Only the Store contract, contracts under src/api, written to a file
//! typegraph extract --root ./shop --contracts src/api --include Store --out graph.json
//!
//! # Resolve dependency types from the cargo registry
//! typegraph extract --root . --dep-root ~/.cargo/registry/src/index.crates.io-6f17d22bba15001f
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use typegraph::{describe, handle, load_config, Request, TracingHost};

#[derive(Parser)]
#[command(
    name = "typegraph",
    author,
    version,
    about = "Type graph extraction for annotated Rust contracts",
    long_about = "Extracts a closed, normalized type graph from the @tg-annotated traits of a Rust project.\n\n\
                  The output is JSON consumed by code-emission tools."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (debug level unless RUST_LOG is set)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the type graph of a project
    Extract(ExtractCmd),

    /// Print supported request kinds and version
    Describe,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Extract(_) => "extract",
            Commands::Describe => "describe",
        }
    }
}

#[derive(Args)]
struct ExtractCmd {
    /// Project root containing Cargo.toml
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Directory holding the contract traits, relative to the root
    #[arg(long)]
    contracts: Option<PathBuf>,

    /// Config file (default: typegraph.toml in the root, if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the JSON here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Only keep these contracts
    #[arg(long, value_delimiter = ',')]
    include: Vec<String>,

    /// Drop these contracts
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Directory searched for dependency sources (repeatable)
    #[arg(long = "dep-root")]
    dep_roots: Vec<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

impl ExtractCmd {
    fn execute(self) -> Result<()> {
        let mut config = load_config(&self.root, self.config.as_deref())?;
        if let Some(contracts) = self.contracts {
            config.contracts_dir = contracts;
        }
        if !self.include.is_empty() {
            config.include = self.include;
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude;
        }
        config.loader.dependency_roots.extend(self.dep_roots);
        debug!(root = %self.root.display(), ?config, "resolved configuration");

        let response = handle(
            Request::Extract {
                root: self.root,
                config: Some(config),
            },
            &TracingHost,
        )?;

        let json = if self.pretty {
            serde_json::to_string_pretty(&response)?
        } else {
            serde_json::to_string(&response)?
        };
        match self.out {
            Some(path) => std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => println!("{}", json),
        }
        Ok(())
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let Cli { command, verbose } = Cli::parse();
    init_logging(verbose);
    debug!(command = command.name(), "starting");

    match command {
        Commands::Extract(cmd) => cmd.execute(),
        Commands::Describe => {
            println!("{}", serde_json::to_string_pretty(&describe())?);
            Ok(())
        }
    }
}
