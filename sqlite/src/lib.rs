//! SQLite storage backend for the trip logbook schema engine.
//!
//! This crate provides [`SqliteStore`], the `rusqlite`-backed implementation
//! of the [`RowStore`](triplog_core::RowStore) contract, together with the
//! upgrade-script resources for the built-in migration chain.
//!
//! # Architecture
//!
//! The crate is organized into four modules:
//!
//! - **`schema`**: statement generation with validated identifiers
//! - **`convert`**: `Value` to and from SQLite column conversion
//! - **`store`**: the [`SqliteStore`] row store
//! - **`scripts`**: bundled and on-disk upgrade scripts ([`ScriptSource`])
//!
//! # Quick start
//!
//! ```no_run
//! use triplog_core::RowStore;
//! use triplog_sqlite::{ScriptSource, SqliteStore};
//!
//! let store = SqliteStore::open("logbook.db")
//!     .unwrap()
//!     .with_scripts(ScriptSource::Bundled);
//! match store.physical_integrity_check().unwrap() {
//!     None => println!("file is physically sound"),
//!     Some(diagnostic) => println!("corrupt: {diagnostic}"),
//! }
//! ```

mod convert;
mod error;
mod schema;
mod scripts;
mod store;

pub use error::{Result, SqliteError};
pub use scripts::{SCRIPT_EXTENSION, SCRIPT_PREFIX, ScriptSource, parse_script_name, script_name};
pub use store::SqliteStore;
