//! Column values and rows as exchanged with a [`RowStore`](crate::RowStore).
//!
//! A [`Row`] keeps the field names it was queried with, in query order, so
//! entity records can pull columns by name without caring how the backing
//! store laid the result out.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Name of the integer primary key column present in every table.
pub const ID_FIELD: &str = "_id";

/// A single column value.
///
/// # Examples
///
/// ```
/// use triplog_core::Value;
///
/// assert_eq!(Value::from(7_i64), Value::Integer(7));
/// assert_eq!(Value::from("abc"), Value::Text("abc".into()));
/// assert!(Value::Null.is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// SQL `NULL` (the default).
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// Floating point number.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name used in conversion error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One result row: field names paired with their values, in query order.
///
/// The typed accessors report a [`RecordError`] naming the table, the row's
/// `_id` (when known) and the offending field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    table: String,
    fields: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row belonging to `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field append.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, value);
        self
    }

    /// Appends a field, replacing an earlier value with the same name.
    pub fn push(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Table this row was read from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Raw value lookup.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Iterates over `(field, value)` pairs in query order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// The `_id` primary key.
    pub fn id(&self) -> Result<i64, RecordError> {
        self.i64(ID_FIELD)
    }

    /// A required integer column.
    pub fn i64(&self, field: &str) -> Result<i64, RecordError> {
        match self.value(field)? {
            Value::Integer(i) => Ok(*i),
            Value::Null => Err(self.error(field, "required value is NULL")),
            other => Err(self.error(
                field,
                format!("expected integer, found {}", other.type_name()),
            )),
        }
    }

    /// An optional integer column; `NULL` maps to `None`.
    pub fn opt_i64(&self, field: &str) -> Result<Option<i64>, RecordError> {
        match self.value(field)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            other => Err(self.error(
                field,
                format!("expected integer, found {}", other.type_name()),
            )),
        }
    }

    /// An optional reference column. Both `NULL` and `0` mean "no reference".
    pub fn opt_id(&self, field: &str) -> Result<Option<i64>, RecordError> {
        Ok(self.opt_i64(field)?.filter(|id| *id != 0))
    }

    /// An integer flag column; `NULL` reads as `false`.
    pub fn flag(&self, field: &str) -> Result<bool, RecordError> {
        Ok(self.opt_i64(field)?.is_some_and(|v| v != 0))
    }

    /// A required text column.
    pub fn text(&self, field: &str) -> Result<String, RecordError> {
        self.opt_text(field)?
            .ok_or_else(|| self.error(field, "required value is NULL"))
    }

    /// An optional text column; `NULL` maps to `None`.
    pub fn opt_text(&self, field: &str) -> Result<Option<String>, RecordError> {
        match self.value(field)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            // Numeric affinity columns occasionally hold text-shaped numbers.
            Value::Integer(i) => Ok(Some(i.to_string())),
            other => Err(self.error(
                field,
                format!("expected text, found {}", other.type_name()),
            )),
        }
    }

    fn value(&self, field: &str) -> Result<&Value, RecordError> {
        self.get(field)
            .ok_or_else(|| self.error(field, "field not present in row"))
    }

    fn error(&self, field: &str, reason: impl Into<String>) -> RecordError {
        let id = match self.get(ID_FIELD) {
            Some(Value::Integer(id)) => Some(*id),
            _ => None,
        };
        RecordError {
            table: self.table.clone(),
            id,
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new("vehicle")
            .with("_id", 4_i64)
            .with("makeid", 2_i64)
            .with("driverid", 0_i64)
            .with("last_tripid", Value::Null)
            .with("nickname", "blue car")
    }

    #[test]
    fn test_required_integer() {
        let row = sample();
        assert_eq!(row.id().unwrap(), 4);
        assert_eq!(row.i64("makeid").unwrap(), 2);
    }

    #[test]
    fn test_opt_id_treats_zero_and_null_as_absent() {
        let row = sample();
        assert_eq!(row.opt_id("driverid").unwrap(), None);
        assert_eq!(row.opt_id("last_tripid").unwrap(), None);
        assert_eq!(row.opt_id("makeid").unwrap(), Some(2));
    }

    #[test]
    fn test_missing_field_names_table_id_and_field() {
        let err = sample().i64("odo_orig").unwrap_err();
        assert_eq!(err.table, "vehicle");
        assert_eq!(err.id, Some(4));
        assert_eq!(err.field, "odo_orig");
    }

    #[test]
    fn test_type_mismatch() {
        let err = sample().i64("nickname").unwrap_err();
        assert!(err.reason.contains("expected integer"));
    }

    #[test]
    fn test_push_replaces_existing_field() {
        let mut row = sample();
        row.push("makeid", 9_i64);
        assert_eq!(row.i64("makeid").unwrap(), 9);
        assert_eq!(row.iter().filter(|(f, _)| *f == "makeid").count(), 1);
    }
}
