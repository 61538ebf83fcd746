#![allow(dead_code)]
//! Shared test utilities for integration tests.
//!
//! Fixture projects are written on the fly into a temporary directory:
//!
//! ```ignore
//! let project = FixtureProject::new("shop")
//!     .file("src/lib.rs", "pub mod api;")
//!     .file("src/api.rs", "/// @tg\npub trait Store { fn ping(&self); }");
//! let result = project.extract(&EngineConfig::default());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use typegraph_core::{extract, EngineConfig, FatalError};
use typegraph_model::Project;

/// A throwaway Cargo project on disk.
pub struct FixtureProject {
    dir: TempDir,
}

impl FixtureProject {
    /// Create a project whose `Cargo.toml` names the package `name`.
    pub fn new(name: &str) -> Self {
        Self::with_manifest(&format!(
            "[package]\nname = \"{}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n",
            name
        ))
    }

    pub fn with_manifest(manifest: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("Cargo.toml"), manifest).expect("write Cargo.toml");
        Self { dir }
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn file(self, rel: &str, contents: &str) -> Self {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write fixture file");
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn extract(&self, config: &EngineConfig) -> Result<Project, FatalError> {
        extract(self.root(), config)
    }
}

/// Assert that a result is Ok and return the inner value.
pub fn assert_ok<T, E: std::fmt::Debug>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("{} failed: {:?}", context, e),
    }
}

/// The shop fixture used by most end-to-end tests.
///
/// `Store::fetch` returns `Result<Box<Item>, Error>`; `Item::parent` is
/// `Option<Box<Item>>`. `Warehouse` implements the contract, `Kiosk` returns
/// `Item` by value and does not.
pub fn shop_fixture() -> FixtureProject {
    FixtureProject::new("shop")
        .file(
            "src/lib.rs",
            "pub mod api;\npub mod errors;\npub mod model;\npub mod service;\n",
        )
        .file(
            "src/model.rs",
            r#"
use std::collections::HashMap;

/// A stored item.
pub struct Item {
    pub id: String,
    pub parent: Option<Box<Item>>,
    pub labels: HashMap<String, Label>,
    pub kind: Kind,
}

pub struct Label(pub String);

pub enum Kind {
    Simple,
    Bundle { members: Vec<Item> },
}

pub struct Context {
    pub request_id: u64,
}

pub struct Error {
    pub reason: String,
}
"#,
        )
        .file(
            "src/errors.rs",
            r#"
pub struct NotFound {
    pub id: String,
}

impl NotFound {
    pub fn message(&self) -> String {
        format!("{} not found", self.id)
    }

    pub fn code(&self) -> u16 {
        404
    }
}

pub struct Gone;
"#,
        )
        .file(
            "src/api/mod.rs",
            r#"//! Public API.
//! @tg title="Shop API"

pub mod store;
"#,
        )
        .file(
            "src/api/store.rs",
            r#"
use crate::model::{Context, Error, Item};

/// Item storage.
/// @tg http-prefix=items
pub trait Store {
    /// Fetch one item.
    /// @tg 410=shop::errors:Gone
    fn fetch(&self, ctx: Context, id: String) -> Result<Box<Item>, Error>;
}
"#,
        )
        .file(
            "src/service.rs",
            r#"
use crate::errors::NotFound;
use crate::model::{Context, Error, Item};

pub struct Warehouse;

impl Warehouse {
    pub fn fetch(&self, _ctx: Context, id: String) -> Result<Box<Item>, Error> {
        if id.is_empty() {
            let _ = NotFound { id: id.clone() };
        }
        todo!()
    }
}

pub struct Kiosk;

impl Kiosk {
    pub fn fetch(&self, _ctx: Context, id: String) -> Result<Item, Error> {
        todo!()
    }
}
"#,
        )
}
