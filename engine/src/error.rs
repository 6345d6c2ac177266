//! Error types for migration and verification.
//!
//! Every variant is terminal for the operation that raised it; nothing in
//! this crate retries. Per-record inconsistencies are not errors: they are
//! collected as [`FailedItem`](triplog_core::FailedItem)s by the verifier.

use std::path::PathBuf;

use thiserror::Error;
use triplog_core::{RecordError, SchemaVersion, StoreError};

/// Errors raised by the schema engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source version is older than the oldest version the chain can upgrade.
    #[error("schema version {version} is too old to upgrade (oldest upgradable is {minimum})")]
    TooOld {
        version: SchemaVersion,
        minimum: SchemaVersion,
    },

    /// Source version is newer than this engine's current version.
    #[error("schema version {version} is newer than the current version {current}")]
    NewerThanCurrent {
        version: SchemaVersion,
        current: SchemaVersion,
    },

    /// Version lies inside the supported range but was never released.
    #[error("schema version {0} is not a known release")]
    UnknownVersion(SchemaVersion),

    /// Verification level ordinal outside the defined levels.
    #[error("invalid verification level: {0}")]
    InvalidLevel(i32),

    /// The verifier was released, or never had a store.
    #[error("verifier has been released")]
    Released,

    /// A statement from an upgrade script failed.
    #[error("failed executing script {script}: {source}")]
    Script {
        script: String,
        #[source]
        source: StoreError,
    },

    /// A chain step needs a script the store cannot locate.
    #[error("upgrade script {0} not found")]
    MissingScript(String),

    /// A copy failed its physical integrity check before upgrading.
    #[error("database copy {} failed validation: {diagnostic}", path.display())]
    Validation { path: PathBuf, diagnostic: String },

    /// Copy destination already exists.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// Migration steps do not form one unbroken chain.
    #[error("broken migration chain: {0}")]
    BrokenChain(String),

    /// Persisted version metadata is missing or unreadable.
    #[error("schema metadata error: {0}")]
    Metadata(String),

    /// Row store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A row could not be read as its entity type where that is fatal.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl EngineError {
    /// Whether the error is a rejected caller input (bad version or level)
    /// raised before anything was touched.
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            EngineError::TooOld { .. }
                | EngineError::NewerThanCurrent { .. }
                | EngineError::UnknownVersion(_)
                | EngineError::InvalidLevel(_)
        )
    }
}

/// Convenience alias for results with [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
