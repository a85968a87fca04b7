//! Storage-layer errors for SQLite operations.

use super::error_code::{self, DocDriftErrorCode};

/// Database failures. Fatal to the current scan; rows already committed stay valid.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

impl StorageError {
    /// Shorthand used by every query module.
    pub fn sqlite(e: impl std::fmt::Display) -> Self {
        Self::SqliteError {
            message: e.to_string(),
        }
    }
}

impl DocDriftErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        error_code::STORAGE_ERROR
    }
}
