//! Conversion between [`Value`]/[`Row`] and SQLite column data.

use rusqlite::types::{Value as SqlValue, ValueRef};
use triplog_core::{Row, Value};

use crate::error::Result;

/// Converts a core [`Value`] into an owned SQLite value for parameter binding.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

/// Converts a borrowed SQLite column into a core [`Value`].
///
/// Text that is not valid UTF-8 is decoded lossily rather than rejected;
/// the verifier should see the row, not a decoding error.
pub(crate) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Reads `fields.len()` leading columns of a result row into a [`Row`].
pub(crate) fn read_row(table: &str, fields: &[&str], row: &rusqlite::Row<'_>) -> Result<Row> {
    let mut out = Row::new(table);
    for (i, field) in fields.iter().enumerate() {
        out.push(*field, from_sql(row.get_ref(i)?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sql_covers_every_variant() {
        assert_eq!(to_sql(&Value::Null), SqlValue::Null);
        assert_eq!(to_sql(&Value::Integer(5)), SqlValue::Integer(5));
        assert_eq!(to_sql(&Value::Text("a".into())), SqlValue::Text("a".into()));
        assert_eq!(to_sql(&Value::Blob(vec![1, 2])), SqlValue::Blob(vec![1, 2]));
    }

    #[test]
    fn test_from_sql_lossy_text() {
        let value = from_sql(ValueRef::Text(&[0x66, 0xff]));
        assert!(matches!(value, Value::Text(ref s) if s.starts_with('f')));
    }

    #[test]
    fn test_read_row_from_query() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let row = conn
            .query_row("SELECT 7, 'x', NULL", [], |r| {
                Ok(read_row("t", &["a", "b", "c"], r).unwrap())
            })
            .unwrap();
        assert_eq!(row.get("a"), Some(&Value::Integer(7)));
        assert_eq!(row.get("b"), Some(&Value::Text("x".into())));
        assert_eq!(row.get("c"), Some(&Value::Null));
        assert_eq!(row.table(), "t");
    }
}
