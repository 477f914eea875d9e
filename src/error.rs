//! Error types for the indexed buffer

use std::io;
use thiserror::Error;

/// Error produced by the catalog's underlying relational engine.
///
/// Carries the engine's own code and message rather than the `rusqlite`
/// error type directly, so callers outside this crate don't need to depend
/// on `rusqlite` themselves.
#[derive(Error, Debug, Clone)]
#[error("catalog error {code}: {message}")]
pub struct CatalogError {
    pub code: i32,
    pub message: String,
}

impl CatalogError {
    pub(crate) fn from_rusqlite(err: &rusqlite::Error) -> Self {
        let code = match err {
            rusqlite::Error::SqliteFailure(e, _) => e.extended_code,
            _ => -1,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }

    /// True if this error represents a `(time_value, device)` unique-key
    /// conflict rolled back by the catalog's `ON CONFLICT ROLLBACK` clause.
    pub(crate) fn is_conflict(&self) -> bool {
        self.code == rusqlite::ffi::SQLITE_CONSTRAINT
            || self.code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    }

    /// True if this error indicates the catalog table does not exist.
    pub(crate) fn is_no_table(&self) -> bool {
        self.message.contains("no such table")
    }
}

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("invalid buffer configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, BufferError>;
