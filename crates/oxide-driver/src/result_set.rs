//! Cursor over the result of one statement.
//!
//! The underlying [`StatementHandle`] is forward-only. The cursor keeps a
//! logical position on top of it: moving forward skips rows, moving back
//! re-executes the stored SQL with the stored parameters and skips from the
//! start. The cursor borrows the driver mutably, so no other statement can
//! run while it is alive.

use std::collections::BTreeMap;

use oxide_query::{Params, SqlValue};

use crate::connection::{Row, StatementHandle};
use crate::driver::Driver;
use crate::error::{DriverError, Result};

/// Builds a value from a result row.
pub trait FromRow: Sized {
    /// # Errors
    ///
    /// Returns an error when the row lacks a needed column or holds a value
    /// of the wrong kind.
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

impl FromRow for BTreeMap<String, SqlValue> {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone().into_map())
    }
}

/// A column picked by position or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::Name(String::from(name))
    }
}

impl ColumnRef {
    fn pick(&self, row: &Row) -> Result<SqlValue> {
        let value = match self {
            Self::Index(index) => row.get(*index),
            Self::Name(name) => row.get_by_name(name),
        };
        value.cloned().ok_or_else(|| DriverError::UnknownColumn(self.to_string()))
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// What [`ResultSet::fetch`] should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// The next row.
    Single,
    /// Every remaining row.
    All,
    /// Remaining rows grouped by the values of `columns`, nested one map
    /// level per column. The last row wins for a repeated key.
    KeyedBy {
        columns: Vec<String>,
        /// Keep only this column's value instead of the whole row.
        value_column: Option<String>,
        /// Prefix each key with `<column>_`.
        add_prefix: bool,
    },
    /// One column of the next row.
    Column(ColumnRef),
}

impl FetchRequest {
    /// Groups by a single column, keeping whole rows.
    pub fn keyed_by(column: impl Into<String>) -> Self {
        Self::KeyedBy {
            columns: vec![column.into()],
            value_column: None,
            add_prefix: false,
        }
    }
}

/// The answer to a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Row(Option<Row>),
    Rows(Vec<Row>),
    Keyed(BTreeMap<String, Grouped>),
    Value(Option<SqlValue>),
}

/// One entry of a keyed fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Grouped {
    Row(Row),
    Value(SqlValue),
    Nested(BTreeMap<String, Grouped>),
}

/// A cursor over a statement result.
#[derive(Debug)]
pub struct ResultSet<'d> {
    driver: &'d mut Driver,
    handle: StatementHandle,
    sql: String,
    params: Params,
    /// Rows already taken from the handle.
    consumed: u64,
    /// Logical position: index of the row `next()` returns.
    position: u64,
    /// Last row read, by index, so `current()` does not re-read.
    cached: Option<(u64, Row)>,
}

impl<'d> ResultSet<'d> {
    pub(crate) fn new(
        driver: &'d mut Driver,
        handle: StatementHandle,
        sql: String,
        params: Params,
    ) -> Self {
        Self {
            driver,
            handle,
            sql,
            params,
            consumed: 0,
            position: 0,
            cached: None,
        }
    }

    /// SQL text the result came from.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameters bound to the statement.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.handle.columns()
    }

    /// Rows reported by the handle: returned rows for a query, affected
    /// rows otherwise.
    #[must_use]
    pub const fn row_count(&self) -> u64 {
        self.handle.row_count()
    }

    /// True when row `index` exists. Statements that return no result set
    /// have no rows, whatever their affected-row count.
    #[must_use]
    pub fn exists(&self, index: u64) -> bool {
        !self.handle.columns().is_empty() && index < self.handle.row_count()
    }

    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Runs the stored statement again and rewinds to the first row.
    ///
    /// # Errors
    ///
    /// As [`Driver::query`].
    pub fn reexecute(&mut self) -> Result<()> {
        self.handle = self.driver.run_statement(&self.sql, &self.params)?;
        self.consumed = 0;
        self.position = 0;
        self.cached = None;
        Ok(())
    }

    /// Moves the position to `index`; nothing is read until the next fetch.
    pub fn seek(&mut self, index: u64) {
        self.position = index;
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Row at the current position, without advancing.
    ///
    /// # Errors
    ///
    /// Re-execution errors when the position lies behind the handle.
    pub fn current(&mut self) -> Result<Option<Row>> {
        self.read_at(self.position)
    }

    /// Row at the current position, then advances.
    ///
    /// # Errors
    ///
    /// Re-execution errors when the position lies behind the handle.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Row>> {
        let row = self.read_at(self.position)?;
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    /// Row at absolute offset `index`; the position does not move.
    /// Out-of-range offsets yield `None`.
    ///
    /// # Errors
    ///
    /// Re-execution errors when `index` lies behind the handle.
    pub fn row_at(&mut self, index: u64) -> Result<Option<Row>> {
        if !self.exists(index) {
            return Ok(None);
        }
        self.read_at(index)
    }

    /// First row; the position moves past it.
    ///
    /// # Errors
    ///
    /// Re-execution errors when the handle already moved past it.
    pub fn first(&mut self) -> Result<Option<Row>> {
        self.seek(0);
        self.next()
    }

    /// Last row; the position moves past it.
    ///
    /// # Errors
    ///
    /// Re-execution errors when the handle already moved past it.
    pub fn last(&mut self) -> Result<Option<Row>> {
        match self.handle.row_count() {
            0 => Ok(None),
            count => {
                self.seek(count - 1);
                self.next()
            }
        }
    }

    /// Every row from the position to the end.
    ///
    /// # Errors
    ///
    /// Re-execution errors when the position lies behind the handle.
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Every row as a column-to-value map, from the first row.
    ///
    /// # Errors
    ///
    /// Re-execution errors when the handle already moved.
    pub fn to_maps(&mut self) -> Result<Vec<BTreeMap<String, SqlValue>>> {
        self.rewind();
        Ok(self.fetch_all()?.into_iter().map(Row::into_map).collect())
    }

    /// Next row hydrated into `T`.
    ///
    /// # Errors
    ///
    /// Re-execution errors, or the error of [`FromRow::from_row`].
    pub fn fetch_into<T: FromRow>(&mut self) -> Result<Option<T>> {
        self.next()?.as_ref().map(T::from_row).transpose()
    }

    /// Remaining rows hydrated into `T`.
    ///
    /// # Errors
    ///
    /// Re-execution errors, or the error of [`FromRow::from_row`].
    pub fn fetch_all_into<T: FromRow>(&mut self) -> Result<Vec<T>> {
        self.fetch_all()?.iter().map(T::from_row).collect()
    }

    /// Answers a [`FetchRequest`].
    ///
    /// # Errors
    ///
    /// [`DriverError::UnknownColumn`] when a named column is absent,
    /// [`DriverError::InvalidFetch`] for a keyed fetch without columns,
    /// and re-execution errors.
    pub fn fetch(&mut self, request: FetchRequest) -> Result<Fetched> {
        match request {
            FetchRequest::Single => Ok(Fetched::Row(self.next()?)),
            FetchRequest::All => Ok(Fetched::Rows(self.fetch_all()?)),
            FetchRequest::Column(column) => {
                let value = self.next()?.map(|row| column.pick(&row)).transpose()?;
                Ok(Fetched::Value(value))
            }
            FetchRequest::KeyedBy {
                columns,
                value_column,
                add_prefix,
            } => {
                if columns.is_empty() {
                    return Err(DriverError::InvalidFetch(String::from(
                        "keyed fetch needs at least one column",
                    )));
                }
                let value_column = value_column.map(ColumnRef::Name);
                let mut grouped = BTreeMap::new();
                while let Some(row) = self.next()? {
                    let keys = columns
                        .iter()
                        .map(|column| {
                            let key = ColumnRef::Name(column.clone()).pick(&row)?.to_key();
                            Ok(if add_prefix {
                                format!("{column}_{key}")
                            } else {
                                key
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    let leaf = match &value_column {
                        Some(column) => Grouped::Value(column.pick(&row)?),
                        None => Grouped::Row(row),
                    };
                    insert_grouped(&mut grouped, &keys, leaf);
                }
                Ok(Fetched::Keyed(grouped))
            }
        }
    }

    /// Reads row `index` off the handle, re-executing when the handle is
    /// already past it.
    fn read_at(&mut self, index: u64) -> Result<Option<Row>> {
        if let Some((cached, row)) = &self.cached {
            if *cached == index {
                return Ok(Some(row.clone()));
            }
        }
        if index < self.consumed {
            let position = self.position;
            self.reexecute()?;
            self.position = position;
        }
        while self.consumed < index {
            if self.handle.next_row().is_none() {
                return Ok(None);
            }
            self.consumed += 1;
        }
        let row = self.handle.next_row();
        if let Some(row) = &row {
            self.consumed += 1;
            self.cached = Some((index, row.clone()));
        }
        Ok(row)
    }
}

fn insert_grouped(map: &mut BTreeMap<String, Grouped>, keys: &[String], leaf: Grouped) {
    let Some((key, rest)) = keys.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert(key.clone(), leaf);
        return;
    }
    let entry = map
        .entry(key.clone())
        .or_insert_with(|| Grouped::Nested(BTreeMap::new()));
    if !matches!(entry, Grouped::Nested(_)) {
        *entry = Grouped::Nested(BTreeMap::new());
    }
    if let Grouped::Nested(inner) = entry {
        insert_grouped(inner, rest, leaf);
    }
}
