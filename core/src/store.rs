//! The narrow storage contract consumed by the schema engine.
//!
//! A [`RowStore`] is a dumb executor plus a script-resource locator: all
//! statement text is supplied by the engine, and the store only needs to run
//! it, fetch rows, and report physical corruption.

use std::io::BufRead;
use std::path::Path;

use crate::error::Result;
use crate::records::Entity;
use crate::value::{Row, Value};
use crate::version::SchemaVersion;

/// A row selection: table, columns, optional filter, ordering and limit.
///
/// # Examples
///
/// ```
/// use triplog_core::{RowQuery, TripStop, Value};
///
/// let query = RowQuery::for_entity::<TripStop>()
///     .filter("tripid = ?", vec![Value::Integer(12)])
///     .order_by("_id");
/// assert_eq!(query.table, "tstop");
/// assert_eq!(query.where_args.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RowQuery {
    pub table: &'static str,
    pub fields: &'static [&'static str],
    /// Filter with `?` placeholders, without the `WHERE` keyword.
    pub where_clause: Option<String>,
    pub where_args: Vec<Value>,
    /// Ordering expression, without the `ORDER BY` keywords.
    pub order_by: Option<&'static str>,
    pub limit: Option<usize>,
}

impl RowQuery {
    /// Selects `fields` from every row of `table`.
    pub fn new(table: &'static str, fields: &'static [&'static str]) -> Self {
        Self {
            table,
            fields,
            where_clause: None,
            where_args: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Selects the columns an [`Entity`] needs.
    pub fn for_entity<E: Entity>() -> Self {
        Self::new(E::TABLE, E::FIELDS)
    }

    pub fn filter(mut self, clause: impl Into<String>, args: Vec<Value>) -> Self {
        self.where_clause = Some(clause.into());
        self.where_args = args;
        self
    }

    pub fn order_by(mut self, order_by: &'static str) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Minimal storage capability required by the migration engine and verifier.
///
/// Implementations are used from one thread at a time; the engine never
/// holds two operations open against the same store.
pub trait RowStore {
    /// Loads one row by primary key. A missing row is `Ok(None)`, not an error.
    fn get_row(&self, table: &str, id: i64, fields: &[&str]) -> Result<Option<Row>>;

    /// Loads all rows matching `query`.
    fn get_rows(&self, query: &RowQuery) -> Result<Vec<Row>>;

    /// Inserts a row and returns its new primary key.
    fn insert(&self, table: &str, values: &[(&str, Value)]) -> Result<i64>;

    /// Updates the row with primary key `id`, returning the number of rows changed.
    fn update(&self, table: &str, id: i64, values: &[(&str, Value)]) -> Result<usize>;

    /// Deletes the row with primary key `id`, returning the number of rows removed.
    fn delete(&self, table: &str, id: i64) -> Result<usize>;

    /// Executes one engine-supplied statement.
    fn exec_raw(&self, sql: &str) -> Result<()>;

    /// Runs the storage engine's own physical consistency check.
    ///
    /// Returns `None` when the check passes, or the diagnostic text otherwise.
    fn physical_integrity_check(&self) -> Result<Option<String>>;

    /// Identity of the underlying file, when the store has one.
    fn owner(&self) -> Option<&Path>;

    /// Whether `other` is a connection to the same underlying file.
    ///
    /// Stores without an owner (in-memory databases) never match.
    fn has_same_owner(&self, other: &dyn RowStore) -> bool {
        match (self.owner(), other.owner()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }

    /// Resource name of the script that upgrades into `version`.
    fn script_name(&self, version: SchemaVersion) -> String;

    /// Opens the script that upgrades into `version`; version 0 is the
    /// full-create script. `Ok(None)` when no such script exists.
    fn upgrade_script(&self, version: SchemaVersion) -> Result<Option<Box<dyn BufRead + '_>>>;

    /// Closes the store. Every later call fails with
    /// [`StoreError::Closed`](crate::StoreError::Closed); closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Loads one entity by id.
///
/// The outer `Result` carries storage failures; the inner value separates
/// "no such row" (`Ok(None)`) from "row exists but is unreadable" (`Err`).
pub fn load_entity<E: Entity, S: RowStore + ?Sized>(
    store: &S,
    id: i64,
) -> Result<Option<std::result::Result<E, crate::RecordError>>> {
    Ok(store
        .get_row(E::TABLE, id, E::FIELDS)?
        .map(|row| E::from_row(&row)))
}
