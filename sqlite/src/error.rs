//! Error types for the SQLite row store.
//!
//! [`SqliteError`] is what the store's own helpers return; it converts into
//! [`StoreError`] at the [`RowStore`](triplog_core::RowStore) boundary.

use thiserror::Error;
use triplog_core::StoreError;

/// Errors that can occur inside the SQLite row store.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Table or field name contains invalid characters.
    #[error("invalid identifier '{0}': must contain only alphanumeric characters and underscores")]
    InvalidIdentifier(String),

    /// The connection was already closed.
    #[error("connection is closed")]
    Closed,

    /// Script resource I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A script directory entry does not follow the naming convention.
    #[error("invalid script name: {0}")]
    InvalidScriptName(String),
}

impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Closed => StoreError::Closed,
            SqliteError::InvalidIdentifier(name) => StoreError::InvalidIdentifier(name),
            SqliteError::IoError(e) => StoreError::Io(e),
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
