//! [`RowStore`] implementation over a `rusqlite` connection.
//!
//! # Example
//!
//! ```no_run
//! use triplog_core::{RowStore, Value};
//! use triplog_sqlite::SqliteStore;
//!
//! let store = SqliteStore::open("logbook.db").unwrap();
//! assert!(store.physical_integrity_check().unwrap().is_none());
//! let id = store.insert("geoarea", &[("aname", Value::from("Home"))]).unwrap();
//! assert!(store.get_row("geoarea", id, &["_id", "aname"]).unwrap().is_some());
//! ```

use std::io::BufRead;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, params_from_iter};
use tracing::debug;
use triplog_core::{Row, RowQuery, RowStore, SchemaVersion, StoreError, Value};

use crate::convert::{read_row, to_sql};
use crate::error::{Result, SqliteError};
use crate::schema::{delete_sql, insert_sql, select_by_id_sql, select_sql, update_sql};
use crate::scripts::{ScriptSource, script_name};

/// A logbook database file (or in-memory database) behind the [`RowStore`] contract.
///
/// Opening performs no reads, so a damaged file can still be opened and then
/// diagnosed with [`RowStore::physical_integrity_check`].
pub struct SqliteStore {
    conn: Option<Connection>,
    owner: Option<PathBuf>,
    scripts: ScriptSource,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::DatabaseError`] if SQLite cannot open the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        // Canonicalize after opening: the file exists by now.
        let owner = std::fs::canonicalize(path).ok();
        debug!(path = %path.display(), "Opened logbook database");
        Ok(Self {
            conn: Some(conn),
            owner,
            scripts: ScriptSource::default(),
        })
    }

    /// Opens a private in-memory database. It has no owner.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Some(Connection::open_in_memory()?),
            owner: None,
            scripts: ScriptSource::default(),
        })
    }

    /// Replaces the script source (bundled by default).
    pub fn with_scripts(mut self, scripts: ScriptSource) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn scripts(&self) -> &ScriptSource {
        &self.scripts
    }

    /// Returns the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Closed`] after [`RowStore::close`].
    pub fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(SqliteError::Closed)
    }

    /// Reads the storage-native version stamp (`PRAGMA user_version`).
    pub fn native_version(&self) -> Result<SchemaVersion> {
        let version: i32 = self
            .connection()?
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(SchemaVersion::new(version))
    }

    fn query_one(&self, table: &str, id: i64, fields: &[&str]) -> Result<Option<Row>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&select_by_id_sql(table, fields)?)?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_row(table, fields, row)?)),
            None => Ok(None),
        }
    }

    fn query_many(&self, query: &RowQuery) -> Result<Vec<Row>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&select_sql(query)?)?;
        let mut rows = stmt.query(params_from_iter(query.where_args.iter().map(to_sql)))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_row(query.table, query.fields, row)?);
        }
        Ok(out)
    }

    fn insert_row(&self, table: &str, values: &[(&str, Value)]) -> Result<i64> {
        let conn = self.connection()?;
        let fields: Vec<&str> = values.iter().map(|(field, _)| *field).collect();
        let mut stmt = conn.prepare(&insert_sql(table, &fields)?)?;
        stmt.execute(params_from_iter(values.iter().map(|(_, v)| to_sql(v))))?;
        Ok(conn.last_insert_rowid())
    }

    fn update_row(&self, table: &str, id: i64, values: &[(&str, Value)]) -> Result<usize> {
        let conn = self.connection()?;
        let fields: Vec<&str> = values.iter().map(|(field, _)| *field).collect();
        let mut stmt = conn.prepare(&update_sql(table, &fields)?)?;
        let params = values
            .iter()
            .map(|(_, v)| to_sql(v))
            .chain(std::iter::once(rusqlite::types::Value::Integer(id)));
        Ok(stmt.execute(params_from_iter(params))?)
    }

    fn delete_row(&self, table: &str, id: i64) -> Result<usize> {
        let conn = self.connection()?;
        Ok(conn.execute(&delete_sql(table)?, [id])?)
    }

    fn integrity_check(&self) -> Result<Option<String>> {
        let conn = self.connection()?;
        match integrity_lines(conn) {
            Ok(lines) if lines.len() == 1 && lines[0] == "ok" => Ok(None),
            Ok(lines) if lines.is_empty() => Ok(Some("integrity check returned no rows".into())),
            Ok(lines) => Ok(Some(lines.join("\n"))),
            // A file that is not a database at all, or is corrupt past the
            // point of running the check, is a diagnostic, not a store failure.
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if matches!(err.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) =>
            {
                Ok(Some(msg.unwrap_or_else(|| err.to_string())))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn integrity_lines(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA integrity_check")?;
    let lines = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(lines)
}

impl RowStore for SqliteStore {
    fn get_row(
        &self,
        table: &str,
        id: i64,
        fields: &[&str],
    ) -> std::result::Result<Option<Row>, StoreError> {
        Ok(self.query_one(table, id, fields)?)
    }

    fn get_rows(&self, query: &RowQuery) -> std::result::Result<Vec<Row>, StoreError> {
        Ok(self.query_many(query)?)
    }

    fn insert(&self, table: &str, values: &[(&str, Value)]) -> std::result::Result<i64, StoreError> {
        Ok(self.insert_row(table, values)?)
    }

    fn update(
        &self,
        table: &str,
        id: i64,
        values: &[(&str, Value)],
    ) -> std::result::Result<usize, StoreError> {
        Ok(self.update_row(table, id, values)?)
    }

    fn delete(&self, table: &str, id: i64) -> std::result::Result<usize, StoreError> {
        Ok(self.delete_row(table, id)?)
    }

    fn exec_raw(&self, sql: &str) -> std::result::Result<(), StoreError> {
        let conn = self.connection()?;
        conn.execute_batch(sql).map_err(SqliteError::from)?;
        Ok(())
    }

    fn physical_integrity_check(&self) -> std::result::Result<Option<String>, StoreError> {
        Ok(self.integrity_check()?)
    }

    fn owner(&self) -> Option<&Path> {
        self.owner.as_deref()
    }

    fn script_name(&self, version: SchemaVersion) -> String {
        script_name(version)
    }

    fn upgrade_script(
        &self,
        version: SchemaVersion,
    ) -> std::result::Result<Option<Box<dyn BufRead + '_>>, StoreError> {
        self.connection()?;
        let script = self.scripts.open(version)?;
        Ok(script.map(|reader| reader as Box<dyn BufRead + '_>))
    }

    fn close(&mut self) -> std::result::Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| SqliteError::from(e))?;
            debug!("Closed logbook database");
        }
        Ok(())
    }
}
