//! Core types for the trip logbook schema engine.
//!
//! This crate holds everything the migration engine and the integrity
//! verifier share, without binding to any storage backend:
//!
//! - [`RowStore`]: the narrow storage contract (row get/query, insert,
//!   update, delete, raw statements, physical check, script locator).
//! - [`Value`] and [`Row`]: column values and result rows.
//! - Entity records ([`Vehicle`], [`Trip`], [`TripStop`], ...) implementing
//!   [`Entity`], plus the type-erased [`Record`].
//! - [`SchemaVersion`]: the integer schema stamp.
//! - [`FailedItem`] and [`FailureCollector`]: bounded inconsistency reports.
//!
//! # Example
//!
//! ```
//! use triplog_core::*;
//!
//! let row = Row::new("geoarea").with("_id", 1_i64).with("aname", "Home");
//! let area = GeoArea::from_row(&row).unwrap();
//! assert_eq!(area.name, "Home");
//!
//! let mut failures = FailureCollector::default();
//! failures.add(FailedItem::record(area.into_record(), None, "example"));
//! assert_eq!(failures.len(), 1);
//! ```

mod error;
mod failure;
mod records;
mod store;
mod value;
mod version;

pub use error::{RecordError, Result, StoreError};
pub use failure::{
    DEFAULT_MAX_FAILURE_ITEMS, DESCRIPTION_PLACEHOLDER, FailedItem, FailedSubject,
    FailureCollector,
};
pub use records::*;
pub use store::{RowQuery, RowStore, load_entity};
pub use value::{ID_FIELD, Row, Value};
pub use version::SchemaVersion;
