//! SELECT statement builder.

use super::condition::{Condition, Connective};
use super::value::{SqlValue, ToSqlValue, Value};
use super::{
    bind_value, merge_binds, push_condition, push_joins, push_terms, split_terms,
    statement_binds, Join, JoinType, Params, Statement,
};
use crate::dialect::Dialect;
use crate::error::{ConfigErrorKind, QueryError, Result};
use crate::ident::{protect_identifier, Identifier};

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Table(Identifier),
    Subquery {
        select: Box<Select>,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lock {
    ForUpdate,
    Shared,
}

/// A SELECT statement builder.
///
/// ```text
/// SELECT [DISTINCT] <columns|*> FROM <sources> [joins] [WHERE ...]
///     [GROUP BY ...] [HAVING ...] [ORDER BY ...] [LIMIT n [OFFSET m]]
///     [FOR UPDATE | <shared lock>]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    dialect: Dialect,
    distinct: bool,
    inject_after_select: Option<String>,
    columns: Vec<String>,
    sources: Vec<Source>,
    joins: Vec<Join>,
    condition: Condition,
    group_by: Vec<String>,
    having: Condition,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    lock: Option<Lock>,
    binds: Vec<(String, SqlValue)>,
}

impl Select {
    /// Creates an empty SELECT builder for `dialect`.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            distinct: false,
            inject_after_select: None,
            columns: Vec::new(),
            sources: Vec::new(),
            joins: Vec::new(),
            condition: Condition::default(),
            group_by: Vec::new(),
            having: Condition::default(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            lock: None,
            binds: Vec::new(),
        }
    }

    /// Sets DISTINCT.
    #[must_use]
    pub const fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Inserts verbatim text right after `SELECT` (e.g. `SQL_CALC_FOUND_ROWS`).
    #[must_use]
    pub fn inject_after_select(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.inject_after_select = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }

    /// Replaces the selected columns. An empty list selects `*`.
    ///
    /// Entries may hold comma-separated lists. Plain names are protected;
    /// expressions containing `(` are kept verbatim.
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = split_terms(columns);
        self
    }

    /// Adds a source table. `table` may carry an alias (`users u`).
    pub fn from(self, table: &str) -> Result<Self> {
        self.from_as(table, None)
    }

    /// Adds a source table with an explicit alias.
    pub fn from_as(mut self, table: &str, alias: Option<&str>) -> Result<Self> {
        let ident = protect_identifier(self.dialect, table, alias, true)?;
        self.sources.push(Source::Table(ident));
        Ok(self)
    }

    /// Adds a nested SELECT as a source, compiled in parentheses.
    pub fn from_subquery(mut self, select: Self, alias: Option<&str>) -> Result<Self> {
        if select.dialect != self.dialect {
            return Err(QueryError::config(
                ConfigErrorKind::DialectMismatch,
                format!(
                    "subquery built for {} used in a {} statement",
                    select.dialect, self.dialect
                ),
            ));
        }
        self.sources.push(Source::Subquery {
            select: Box::new(select),
            alias: alias.filter(|a| !a.trim().is_empty()).map(String::from),
        });
        Ok(self)
    }

    /// Adds a join.
    pub fn join(mut self, join_type: JoinType, table: &str, on: Condition) -> Result<Self> {
        self.joins
            .push(Join::new(self.dialect, join_type, table, on)?);
        Ok(self)
    }

    /// Adds an INNER JOIN.
    pub fn inner_join(self, table: &str, on: Condition) -> Result<Self> {
        self.join(JoinType::Inner, table, on)
    }

    /// Adds a LEFT JOIN.
    pub fn left_join(self, table: &str, on: Condition) -> Result<Self> {
        self.join(JoinType::Left, table, on)
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

    /// Replaces the GROUP BY terms.
    #[must_use]
    pub fn group_by(mut self, terms: &[&str]) -> Self {
        self.group_by = split_terms(terms);
        self
    }

    /// ANDs a condition into the HAVING clause.
    #[must_use]
    pub fn having(mut self, condition: Condition) -> Self {
        self.having.push(Connective::And, condition);
        self
    }

    /// Replaces the ORDER BY terms (`"name"`, `"created_at DESC"`).
    #[must_use]
    pub fn order_by(mut self, terms: &[&str]) -> Self {
        self.order_by = split_terms(terms);
        self
    }

    /// Removes the ORDER BY clause.
    #[must_use]
    pub fn clear_order_by(mut self) -> Self {
        self.order_by.clear();
        self
    }

    /// Sets LIMIT and OFFSET. A zero limit removes the clause; a zero
    /// offset is omitted.
    #[must_use]
    pub const fn limit(mut self, limit: u64, offset: u64) -> Self {
        self.limit = if limit == 0 { None } else { Some(limit) };
        self.offset = if offset == 0 { None } else { Some(offset) };
        self
    }

    /// Removes LIMIT and OFFSET.
    #[must_use]
    pub const fn clear_limit(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    /// Appends `FOR UPDATE`.
    #[must_use]
    pub const fn for_update(mut self, for_update: bool) -> Self {
        self.lock = if for_update { Some(Lock::ForUpdate) } else { None };
        self
    }

    /// Appends the dialect's shared-lock clause.
    ///
    /// Fails on dialects without one.
    pub fn shared_lock(mut self, shared: bool) -> Result<Self> {
        if shared && self.dialect.shared_lock_clause().is_none() {
            return Err(QueryError::unsupported("shared lock", self.dialect));
        }
        if shared {
            self.lock = Some(Lock::Shared);
        } else if self.lock == Some(Lock::Shared) {
            self.lock = None;
        }
        Ok(self)
    }

    /// Binds a named parameter referenced as `:name` in the statement.
    pub fn bind(mut self, name: &str, value: impl ToSqlValue) -> Result<Self> {
        bind_value(&mut self.binds, name, value.to_sql_value())?;
        Ok(self)
    }

    /// Returns the selected column list.
    #[must_use]
    pub fn column_list(&self) -> &[String] {
        &self.columns
    }

    /// Returns the ORDER BY terms.
    #[must_use]
    pub fn order_terms(&self) -> &[String] {
        &self.order_by
    }

    /// Returns the LIMIT and OFFSET.
    #[must_use]
    pub const fn limit_offset(&self) -> (Option<u64>, Option<u64>) {
        (self.limit, self.offset)
    }

    /// Returns the named parameters.
    #[must_use]
    pub fn bindings(&self) -> &[(String, SqlValue)] {
        &self.binds
    }

    /// Adds the parameters of this statement and of its sub-selects.
    pub(crate) fn collect_binds(&self, binds: &mut Vec<(String, SqlValue)>) -> Result<()> {
        let mut own = statement_binds(&self.binds, &self.joins, &[&self.condition, &self.having])?;
        for source in &self.sources {
            if let Source::Subquery { select, .. } = source {
                select.collect_binds(&mut own)?;
            }
        }
        merge_binds(binds, &own)
    }

    fn push_columns(&self, sql: &mut String) -> Result<()> {
        if self.columns.is_empty() {
            sql.push('*');
            return Ok(());
        }
        let protected = self
            .columns
            .iter()
            .map(|column| {
                protect_identifier(self.dialect, column, None, false)
                    .map(|ident| ident.to_sql(self.dialect))
            })
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(&protected.join(", "));
        Ok(())
    }

    fn push_sources(&self, sql: &mut String) -> Result<()> {
        for (index, source) in self.sources.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            match source {
                Source::Table(ident) => sql.push_str(&ident.to_sql(self.dialect)),
                Source::Subquery { select, alias } => {
                    sql.push('(');
                    sql.push_str(&select.to_sql()?);
                    sql.push(')');
                    if let Some(alias) = alias {
                        sql.push_str(" AS ");
                        sql.push_str(&self.dialect.quote_identifier(alias));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Statement for Select {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn to_sql(&self) -> Result<String> {
        if self.sources.is_empty() {
            return Err(QueryError::missing("no source set by from()"));
        }
        self.collect_binds(&mut Vec::new())?;
        let dialect = self.dialect;
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if let Some(inject) = &self.inject_after_select {
            sql.push_str(inject.trim());
            sql.push(' ');
        }
        self.push_columns(&mut sql)?;
        sql.push_str(" FROM ");
        self.push_sources(&mut sql)?;
        push_joins(dialect, &self.joins, &mut sql)?;
        push_condition(dialect, "WHERE", &self.condition, &mut sql)?;
        push_terms(dialect, "GROUP BY", &self.group_by, &mut sql)?;
        push_condition(dialect, "HAVING", &self.having, &mut sql)?;
        push_terms(dialect, "ORDER BY", &self.order_by, &mut sql)?;
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        match self.lock {
            Some(Lock::ForUpdate) => sql.push_str(" FOR UPDATE"),
            Some(Lock::Shared) => {
                let clause = dialect
                    .shared_lock_clause()
                    .ok_or_else(|| QueryError::unsupported("shared lock", dialect))?;
                sql.push(' ');
                sql.push_str(clause);
            }
            None => {}
        }
        Ok(sql)
    }

    fn params(&self) -> Params {
        let mut binds = Vec::new();
        match self.collect_binds(&mut binds) {
            Ok(()) => Params::from_binds(&binds),
            // conflicting sub-select parameters are reported by to_sql
            Err(_) => Params::from_binds(&self.binds),
        }
    }

    fn returns_rows(&self) -> bool {
        true
    }
}
