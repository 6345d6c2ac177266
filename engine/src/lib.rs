//! Schema versioning and integrity verification for trip logbook databases.
//!
//! This crate works against any [`RowStore`](triplog_core::RowStore) and
//! provides:
//!
//! - **Migration**: the [`MigrationChain`] of released schema versions and
//!   the [`MigrationEngine`] that walks a store (or a fresh copy of a
//!   database file) up to [`CURRENT_VERSION`]
//! - **Verification**: the [`Verifier`], running physical, master-data and
//!   transactional-data checks and reporting
//!   [`FailedItem`](triplog_core::FailedItem)s
//! - **Settings**: [`CurrentSettings`], the cached current vehicle, driver
//!   and area
//! - **Configuration**: YAML-backed [`EngineConfig`]
//!
//! # Quick start
//!
//! ```ignore
//! use triplog_engine::{MigrationEngine, VerificationLevel, Verifier, read_schema_version};
//!
//! let engine = MigrationEngine::standard()?;
//! let from = read_schema_version(&store)?;
//! engine.upgrade_to_current(&store, from, false)?;
//!
//! let mut verifier = Verifier::new(&store);
//! if let Some(level) = verifier.verify(VerificationLevel::TransactionalData)? {
//!     eprintln!("failed at {level}: {} problems", verifier.failed_items().len());
//! }
//! ```

pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod migration;
pub mod script;
pub mod settings;
pub mod verify;

#[cfg(test)]
mod testing;

pub use cache::{Cached, ObjectCache, ObjectCaches};
pub use chain::{CURRENT_VERSION, MIN_UPGRADABLE_VERSION, MigrationChain, MigrationStep};
pub use config::{EngineConfig, MigrationConfig, VerifyConfig};
pub use error::{EngineError, Result};
pub use migration::{
    HISTORY_TABLE, METADATA_TABLE, MigrationEngine, SCHEMA_VERSION_FIELD, SchemaStatus,
    UpgradeRecord, UpgradeReport, read_schema_version, upgrade_history,
};
pub use script::{ScriptStats, apply_script};
pub use settings::{CurrentSettings, SETTINGS_TABLE, SettingKey};
pub use verify::{VERIFY_OK, VerificationLevel, Verifier};
