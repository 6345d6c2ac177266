//! SQL statement generation with validated identifiers.
//!
//! Table and field names reach this module from engine constants, but they
//! are still spliced into statement text, so every identifier is checked to
//! contain only alphanumeric characters and underscores first. Values always
//! travel as bound `?` parameters.

use triplog_core::{ID_FIELD, RowQuery};

use crate::error::{Result, SqliteError};

/// Validates that an identifier contains only alphanumeric characters and underscores.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SqliteError::InvalidIdentifier(name.to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

fn field_list(fields: &[&str]) -> Result<String> {
    if fields.is_empty() {
        return Err(SqliteError::InvalidIdentifier(String::new()));
    }
    for field in fields {
        validate_identifier(field)?;
    }
    Ok(fields.join(", "))
}

/// `SELECT <fields> FROM <table> WHERE _id = ?1`
pub(crate) fn select_by_id_sql(table: &str, fields: &[&str]) -> Result<String> {
    validate_identifier(table)?;
    let fields = field_list(fields)?;
    Ok(format!("SELECT {fields} FROM {table} WHERE {ID_FIELD} = ?1"))
}

/// Full `SELECT` for a [`RowQuery`].
///
/// The where-clause and order-by text are engine-authored and passed through
/// as-is; only the table and field names are validated.
pub(crate) fn select_sql(query: &RowQuery) -> Result<String> {
    validate_identifier(query.table)?;
    let fields = field_list(query.fields)?;
    let mut sql = format!("SELECT {fields} FROM {}", query.table);
    if let Some(clause) = &query.where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    if let Some(order_by) = query.order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok(sql)
}

/// `INSERT INTO <table> (<fields>) VALUES (?1, ...)`
pub(crate) fn insert_sql(table: &str, fields: &[&str]) -> Result<String> {
    validate_identifier(table)?;
    let names = field_list(fields)?;
    let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{i}")).collect();
    Ok(format!(
        "INSERT INTO {table} ({names}) VALUES ({})",
        placeholders.join(", ")
    ))
}

/// `UPDATE <table> SET f1 = ?1, ... WHERE _id = ?N`; the id binds last.
pub(crate) fn update_sql(table: &str, fields: &[&str]) -> Result<String> {
    validate_identifier(table)?;
    if fields.is_empty() {
        return Err(SqliteError::InvalidIdentifier(String::new()));
    }
    let mut assignments = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        validate_identifier(field)?;
        assignments.push(format!("{field} = ?{}", i + 1));
    }
    Ok(format!(
        "UPDATE {table} SET {} WHERE {ID_FIELD} = ?{}",
        assignments.join(", "),
        fields.len() + 1
    ))
}

/// `DELETE FROM <table> WHERE _id = ?1`
pub(crate) fn delete_sql(table: &str) -> Result<String> {
    validate_identifier(table)?;
    Ok(format!("DELETE FROM {table} WHERE {ID_FIELD} = ?1"))
}
