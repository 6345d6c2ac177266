//! Error types shared by every row-store implementation.
//!
//! [`StoreError`] covers failures of the storage binding itself; a
//! [`RecordError`] is raised when a row exists but cannot be read as the
//! entity it is supposed to hold.

use thiserror::Error;

/// Errors a [`RowStore`](crate::RowStore) can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was closed, or never opened.
    #[error("row store is closed")]
    Closed,

    /// A table or field name contains characters that cannot be spliced into a statement.
    #[error("invalid identifier '{0}': must contain only alphanumeric characters and underscores")]
    InvalidIdentifier(String),

    /// File I/O failure (script resources, database files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the storage backend.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A row that could not be interpreted as its entity type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{table} row {}: field '{field}': {reason}", id.map_or_else(|| "?".to_string(), |id| id.to_string()))]
pub struct RecordError {
    /// Table the row came from.
    pub table: String,
    /// Primary key of the row, when it could be read.
    pub id: Option<i64>,
    /// Field that failed to convert.
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
