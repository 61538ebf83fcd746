//! Error types for the extraction engine.
//!
//! Two levels of failure exist:
//!
//! | Level         | Type           | Effect                                        |
//! |---------------|----------------|-----------------------------------------------|
//! | Fatal         | [`FatalError`] | Aborts the run; no `Project` is produced      |
//! | Recoverable   | [`Outcome::Skip`] | The unit (file, method, field) is dropped and a warning is logged |

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("project root not found: {}", .0.display())]
    ProjectRootNotFound(PathBuf),

    #[error("cannot read manifest {}: {reason}", path.display())]
    ManifestUnreadable { path: PathBuf, reason: String },

    #[error("module identity unknown: {} has no package name", .0.display())]
    ModuleIdentityUnknown(PathBuf),

    #[error("cannot read contract directory {}: {reason}", path.display())]
    ContractDirUnreadable { path: PathBuf, reason: String },

    #[error("include and exclude filters are mutually exclusive")]
    ConflictingFilters,
}

/// Result of a pass over a unit that may be skipped without aborting the run.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    Skip(String),
    Fatal(FatalError),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(v) => Some(v),
            _ => None,
        }
    }

    /// Convert into a `Result`, folding a skip into `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, FatalError> {
        match self {
            Outcome::Ok(v) => Ok(Some(v)),
            Outcome::Skip(_) => Ok(None),
            Outcome::Fatal(e) => Err(e),
        }
    }
}

impl<T> From<FatalError> for Outcome<T> {
    fn from(e: FatalError) -> Self {
        Outcome::Fatal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_into_result() {
        assert_eq!(Outcome::Ok(3).into_result().unwrap(), Some(3));
        assert_eq!(
            Outcome::<u8>::Skip("bad".into()).into_result().unwrap(),
            None
        );
        assert!(Outcome::<u8>::from(FatalError::ConflictingFilters)
            .into_result()
            .is_err());
    }

    #[test]
    fn test_fatal_messages() {
        let e = FatalError::ManifestUnreadable {
            path: PathBuf::from("/p/Cargo.toml"),
            reason: "missing".into(),
        };
        assert_eq!(e.to_string(), "cannot read manifest /p/Cargo.toml: missing");
    }
}
