//! The seam between the driver and a concrete database client.
//!
//! A [`Connector`] opens [`Connection`]s from a [`ConnectionConfig`]; a
//! connection runs one statement at a time and hands back a
//! [`StatementHandle`]. Handles are forward-only: rows are taken from the
//! front and never handed out twice.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use oxide_query::SqlValue;

use crate::config::ConnectionConfig;
use crate::error::DatabaseError;

/// An open database connection.
pub trait Connection: Send {
    /// Runs `sql` with positional parameters already in the dialect's
    /// placeholder style.
    fn execute(&mut self, sql: &str, params: &[SqlValue])
        -> Result<StatementHandle, DatabaseError>;
}

/// Opens connections. Kept by the driver to reconnect after a loss.
pub trait Connector: Send {
    /// Opens a new connection.
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>, DatabaseError>;
}

/// The outcome of one statement: its rows, if any, and its counters.
#[derive(Debug, Clone)]
pub struct StatementHandle {
    columns: Arc<[String]>,
    rows: VecDeque<Vec<SqlValue>>,
    row_count: u64,
    last_insert_id: Option<i64>,
}

impl StatementHandle {
    /// Creates a handle over a row-returning result.
    #[must_use]
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns: columns.into(),
            row_count: rows.len() as u64,
            rows: rows.into(),
            last_insert_id: None,
        }
    }

    /// Creates a handle for a statement that only reports affected rows.
    #[must_use]
    pub fn affected(row_count: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            columns: Arc::from(Vec::new()),
            rows: VecDeque::new(),
            row_count,
            last_insert_id,
        }
    }

    /// Sets the id generated by the statement.
    #[must_use]
    pub const fn with_last_insert_id(mut self, id: Option<i64>) -> Self {
        self.last_insert_id = id;
        self
    }

    /// Column names of the result.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows returned, or rows affected for statements without a result set.
    #[must_use]
    pub const fn row_count(&self) -> u64 {
        self.row_count
    }

    /// The id generated by an INSERT, when the backend reports one.
    #[must_use]
    pub const fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Takes the next row off the handle.
    pub fn next_row(&mut self) -> Option<Row> {
        self.rows.pop_front().map(|values| Row {
            columns: Arc::clone(&self.columns),
            values,
        })
    }
}

/// One result row with positional and named access.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row. `values` is matched positionally against `columns`.
    pub fn new(columns: impl Into<Arc<[String]>>, values: Vec<SqlValue>) -> Self {
        Self {
            columns: columns.into(),
            values,
        }
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Value at position `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Value of the column called `name`. With duplicate names the last
    /// one wins, as in a column-to-value map.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .rposition(|column| column == name)
            .and_then(|index| self.values.get(index))
    }

    /// Integer value of a column.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get_by_name(name).and_then(SqlValue::as_i64)
    }

    /// Text value of a column.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get_by_name(name).and_then(SqlValue::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Converts the row into a column-to-value map.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, SqlValue> {
        self.columns.iter().cloned().zip(self.values).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> StatementHandle {
        StatementHandle::with_rows(
            vec![String::from("id"), String::from("name")],
            vec![
                vec![SqlValue::Int(1), SqlValue::Text(String::from("ann"))],
                vec![SqlValue::Int(2), SqlValue::Text(String::from("bob"))],
            ],
        )
    }

    #[test]
    fn test_rows_are_taken_in_order() {
        let mut handle = handle();
        assert_eq!(handle.row_count(), 2);
        let first = handle.next_row().unwrap();
        assert_eq!(first.get_i64("id"), Some(1));
        assert_eq!(first.get_str("name"), Some("ann"));
        assert_eq!(handle.next_row().unwrap().get(0), Some(&SqlValue::Int(2)));
        assert!(handle.next_row().is_none());
        // the reported count does not shrink as rows are consumed
        assert_eq!(handle.row_count(), 2);
    }

    #[test]
    fn test_row_map_and_missing_column() {
        let row = handle().next_row().unwrap();
        assert!(row.get_by_name("missing").is_none());
        let map = row.into_map();
        assert_eq!(map.get("name"), Some(&SqlValue::Text(String::from("ann"))));
    }

    #[test]
    fn test_affected_handle_has_no_rows() {
        let mut handle = StatementHandle::affected(3, Some(10));
        assert_eq!(handle.row_count(), 3);
        assert_eq!(handle.last_insert_id(), Some(10));
        assert!(handle.columns().is_empty());
        assert!(handle.next_row().is_none());
    }
}
