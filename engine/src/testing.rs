//! In-memory recording [`RowStore`] used by the unit tests of this crate.
//!
//! Understands just enough of the statement shapes the engine produces:
//! `<field> = ?` filters, `_id` ordering, and `PRAGMA user_version = N`.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io::{BufRead, Cursor};
use std::path::{Path, PathBuf};

use triplog_core::{ID_FIELD, Row, RowQuery, RowStore, SchemaVersion, StoreError, Value};

#[derive(Default)]
pub(crate) struct FakeStore {
    tables: RefCell<BTreeMap<String, BTreeMap<i64, Row>>>,
    next_id: Cell<i64>,
    pub executed: RefCell<Vec<String>>,
    pub fail_on: RefCell<Option<String>>,
    pub physical_diagnostic: RefCell<Option<String>>,
    pub physical_checks: Cell<usize>,
    pub table_scans: RefCell<BTreeMap<String, usize>>,
    pub row_loads: RefCell<BTreeMap<String, usize>>,
    pub native_version: Cell<i32>,
    pub scripts: RefCell<BTreeMap<i32, String>>,
    pub owner: Option<PathBuf>,
    closed: Cell<bool>,
}

impl FakeStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.next_id.set(1000);
        store
    }

    pub fn with_owner(path: &str) -> Self {
        Self {
            owner: Some(PathBuf::from(path)),
            ..Self::new()
        }
    }

    /// Stores `row` under its `_id`.
    pub fn put(&self, row: Row) {
        let id = row.id().unwrap();
        self.put_at(id, row);
    }

    /// Stores `row` under `key` whatever its `_id` holds.
    pub fn put_at(&self, key: i64, row: Row) {
        self.tables
            .borrow_mut()
            .entry(row.table().to_string())
            .or_default()
            .insert(key, row);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .borrow()
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn scans(&self, table: &str) -> usize {
        self.table_scans.borrow().get(table).copied().unwrap_or(0)
    }

    pub fn loads(&self, table: &str) -> usize {
        self.row_loads.borrow().get(table).copied().unwrap_or(0)
    }

    pub fn add_script(&self, version: i32, text: &str) {
        self.scripts.borrow_mut().insert(version, text.to_string());
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.get() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn project(row: &Row, table: &str, fields: &[&str]) -> Row {
        let mut out = Row::new(table);
        for field in fields {
            out.push(*field, row.get(field).cloned().unwrap_or(Value::Null));
        }
        out
    }
}

fn simple_filter(clause: &str) -> &str {
    clause
        .strip_suffix(" = ?")
        .unwrap_or_else(|| panic!("unsupported filter in fake store: {clause}"))
}

impl RowStore for FakeStore {
    fn get_row(&self, table: &str, id: i64, fields: &[&str]) -> Result<Option<Row>, StoreError> {
        self.check_open()?;
        *self.row_loads.borrow_mut().entry(table.to_string()).or_default() += 1;
        Ok(self
            .tables
            .borrow()
            .get(table)
            .and_then(|t| t.get(&id))
            .map(|row| Self::project(row, table, fields)))
    }

    fn get_rows(&self, query: &RowQuery) -> Result<Vec<Row>, StoreError> {
        self.check_open()?;
        *self
            .table_scans
            .borrow_mut()
            .entry(query.table.to_string())
            .or_default() += 1;
        let filter = query
            .where_clause
            .as_deref()
            .map(|clause| (simple_filter(clause), &query.where_args[0]));
        let tables = self.tables.borrow();
        let mut out = Vec::new();
        if let Some(table) = tables.get(query.table) {
            for row in table.values() {
                if let Some((field, wanted)) = filter {
                    if row.get(field) != Some(wanted) {
                        continue;
                    }
                }
                out.push(Self::project(row, query.table, query.fields));
                if query.limit.is_some_and(|limit| out.len() >= limit) {
                    break;
                }
            }
        }
        Ok(out)
    }

    fn insert(&self, table: &str, values: &[(&str, Value)]) -> Result<i64, StoreError> {
        self.check_open()?;
        let mut row = Row::new(table);
        let id = match values.iter().find(|(f, _)| *f == ID_FIELD) {
            Some((_, Value::Integer(id))) => *id,
            _ => {
                let id = self.next_id.get();
                self.next_id.set(id + 1);
                id
            }
        };
        row.push(ID_FIELD, id);
        for (field, value) in values {
            row.push(*field, value.clone());
        }
        self.put(row);
        Ok(id)
    }

    fn update(&self, table: &str, id: i64, values: &[(&str, Value)]) -> Result<usize, StoreError> {
        self.check_open()?;
        let mut tables = self.tables.borrow_mut();
        match tables.get_mut(table).and_then(|t| t.get_mut(&id)) {
            Some(row) => {
                for (field, value) in values {
                    row.push(*field, value.clone());
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete(&self, table: &str, id: i64) -> Result<usize, StoreError> {
        self.check_open()?;
        let mut tables = self.tables.borrow_mut();
        Ok(tables
            .get_mut(table)
            .and_then(|t| t.remove(&id))
            .map_or(0, |_| 1))
    }

    fn exec_raw(&self, sql: &str) -> Result<(), StoreError> {
        self.check_open()?;
        if let Some(needle) = self.fail_on.borrow().as_deref() {
            if sql.contains(needle) {
                return Err(StoreError::Backend(format!("refused: {sql}").into()));
            }
        }
        if let Some(version) = sql.strip_prefix("PRAGMA user_version = ") {
            self.native_version.set(version.trim().parse().unwrap());
        }
        self.executed.borrow_mut().push(sql.to_string());
        Ok(())
    }

    fn physical_integrity_check(&self) -> Result<Option<String>, StoreError> {
        self.check_open()?;
        self.physical_checks.set(self.physical_checks.get() + 1);
        Ok(self.physical_diagnostic.borrow().clone())
    }

    fn owner(&self) -> Option<&Path> {
        self.owner.as_deref()
    }

    fn script_name(&self, version: SchemaVersion) -> String {
        format!("upg_v{}.sql", version.padded())
    }

    fn upgrade_script(
        &self,
        version: SchemaVersion,
    ) -> Result<Option<Box<dyn BufRead + '_>>, StoreError> {
        self.check_open()?;
        Ok(self
            .scripts
            .borrow()
            .get(&version.get())
            .map(|text| Box::new(Cursor::new(text.clone().into_bytes())) as Box<dyn BufRead>))
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed.set(true);
        Ok(())
    }
}
