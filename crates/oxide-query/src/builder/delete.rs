//! DELETE / TRUNCATE statement builder.

use super::condition::{Condition, Connective};
use super::value::{SqlValue, ToSqlValue, Value};
use super::{
    bind_value, check_write_order_limit, push_condition, push_joins, push_terms, render_sources,
    split_terms, statement_binds, Join, JoinType, Params, Statement,
};
use crate::dialect::Dialect;
use crate::error::{QueryError, Result};
use crate::ident::{protect_identifier, Identifier};

/// A DELETE statement builder.
///
/// With `truncate(true)` and no WHERE, ORDER BY, JOIN or LIMIT, the
/// statement compiles to `TRUNCATE` where the dialect has it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    dialect: Dialect,
    tables: Vec<Identifier>,
    truncate: bool,
    joins: Vec<Join>,
    condition: Condition,
    order_by: Vec<String>,
    limit: Option<u64>,
    binds: Vec<(String, SqlValue)>,
}

impl Delete {
    /// Creates an empty DELETE builder for `dialect`.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: Vec::new(),
            truncate: false,
            joins: Vec::new(),
            condition: Condition::default(),
            order_by: Vec::new(),
            limit: None,
            binds: Vec::new(),
        }
    }

    /// Adds a table to delete from.
    pub fn from(self, table: &str) -> Result<Self> {
        self.from_as(table, None)
    }

    /// Adds a table with an explicit alias.
    pub fn from_as(mut self, table: &str, alias: Option<&str>) -> Result<Self> {
        self.tables
            .push(protect_identifier(self.dialect, table, alias, true)?);
        Ok(self)
    }

    /// Requests TRUNCATE when nothing scopes the deletion.
    #[must_use]
    pub const fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Adds a join. Only MySQL accepts joins in DELETE.
    pub fn join(mut self, join_type: JoinType, table: &str, on: Condition) -> Result<Self> {
        check_write_order_limit(self.dialect, "DELETE with JOIN")?;
        self.joins
            .push(Join::new(self.dialect, join_type, table, on)?);
        Ok(self)
    }

    /// ANDs a condition into the WHERE clause.
    #[must_use]
    pub fn where_clause(mut self, condition: Condition) -> Self {
        self.condition.push(Connective::And, condition);
        self
    }

    /// ORs a condition into the WHERE clause.
    #[must_use]
    pub fn or_where(mut self, condition: Condition) -> Self {
        self.condition.push(Connective::Or, condition);
        self
    }

    /// Shorthand for `where_clause(Condition::eq(column, value))`.
    #[must_use]
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_clause(Condition::eq(column, value))
    }

    /// Sets ORDER BY. Only MySQL accepts it in DELETE.
    pub fn order_by(mut self, terms: &[&str]) -> Result<Self> {
        check_write_order_limit(self.dialect, "DELETE with ORDER BY")?;
        self.order_by = split_terms(terms);
        Ok(self)
    }

    /// Sets LIMIT. Only MySQL accepts it in DELETE.
    pub fn limit(mut self, limit: u64) -> Result<Self> {
        check_write_order_limit(self.dialect, "DELETE with LIMIT")?;
        self.limit = (limit > 0).then_some(limit);
        Ok(self)
    }

    /// Binds a named parameter.
    pub fn bind(mut self, name: &str, value: impl ToSqlValue) -> Result<Self> {
        bind_value(&mut self.binds, name, value.to_sql_value())?;
        Ok(self)
    }

    fn truncate_sql(&self) -> Option<String> {
        let dialect = self.dialect;
        let unscoped = self.condition.is_empty()
            && self.order_by.is_empty()
            && self.joins.is_empty()
            && self.limit.is_none();
        if !self.truncate || !unscoped || !dialect.supports_truncate() {
            return None;
        }
        if self.tables.len() > 1 && !dialect.truncates_many_tables() {
            return None;
        }
        // TRUNCATE takes bare table names
        let tables = self
            .tables
            .iter()
            .map(|table| table.to_sql_unaliased(dialect))
            .collect::<Vec<_>>()
            .join(", ");
        Some(match dialect {
            Dialect::Postgres => format!("TRUNCATE {tables} RESTART IDENTITY"),
            Dialect::MySql | Dialect::Sqlite => format!("TRUNCATE {tables}"),
        })
    }
}

impl Statement for Delete {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn to_sql(&self) -> Result<String> {
        let dialect = self.dialect;
        if self.tables.is_empty() {
            return Err(QueryError::missing("no table set by from()"));
        }
        statement_binds(&self.binds, &self.joins, &[&self.condition])?;
        if let Some(sql) = self.truncate_sql() {
            return Ok(sql);
        }
        let sources = render_sources(dialect, &self.tables);
        let mut sql = if self.joins.is_empty() {
            format!("DELETE FROM {sources}")
        } else {
            // MySQL multi-table form names the rows to delete before FROM
            let targets = self
                .tables
                .iter()
                .map(|table| match table.alias() {
                    Some(alias) => dialect.quote_identifier(alias),
                    None => table.to_sql_unaliased(dialect),
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("DELETE {targets} FROM {sources}")
        };
        push_joins(dialect, &self.joins, &mut sql)?;
        push_condition(dialect, "WHERE", &self.condition, &mut sql)?;
        push_terms(dialect, "ORDER BY", &self.order_by, &mut sql)?;
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(sql)
    }

    fn params(&self) -> Params {
        // conflicting sub-select parameters are reported by to_sql
        statement_binds(&self.binds, &self.joins, &[&self.condition])
            .map_or_else(|_| Params::from_binds(&self.binds), |binds| Params::from_binds(&binds))
    }

    fn returns_rows(&self) -> bool {
        false
    }
}
