//! UPDATE statement builder.

use super::condition::{Condition, Connective};
use super::value::{SqlValue, ToSqlValue, Value};
use super::{
    bind_value, check_write_order_limit, push_condition, push_joins, push_terms, render_sources,
    split_terms, statement_binds, Join, JoinType, Params, Statement,
};
use crate::dialect::Dialect;
use crate::error::{QueryError, Result};
use crate::ident::{protect_identifier, Identifier};

#[derive(Debug, Clone, PartialEq)]
enum Assignment {
    /// `column = <expression>` with the expression kept verbatim.
    Expression { column: String, expression: String },
    /// `column = :column`
    Param(String),
    /// `column = <value>`
    Value { column: String, value: Value },
}

impl Assignment {
    fn parse(spec: &str) -> Self {
        match spec.split_once('=') {
            Some((column, expression)) if !column.trim().is_empty() => Self::Expression {
                column: String::from(column.trim()),
                expression: String::from(expression.trim()),
            },
            _ => Self::Param(String::from(spec.trim())),
        }
    }

    fn column(&self) -> &str {
        match self {
            Self::Expression { column, .. } | Self::Value { column, .. } => column,
            Self::Param(column) => column,
        }
    }

    fn render(&self, dialect: Dialect) -> Result<String> {
        let column = protect_identifier(dialect, self.column(), None, false)?.to_sql(dialect);
        let rhs = match self {
            Self::Expression { expression, .. } => expression.clone(),
            Self::Param(name) => format!(":{name}"),
            Self::Value { value, .. } => value.serialize(dialect),
        };
        Ok(format!("{column} = {rhs}"))
    }
}

/// An UPDATE statement builder.
///
/// Assignments come from `columns` (`"a = a + 1"` keeps the right-hand
/// side verbatim, a bare `"a"` compiles to `a = :a`), from `set` /
/// `values`, or, when neither was used, from the bound parameter names.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    dialect: Dialect,
    tables: Vec<Identifier>,
    assignments: Vec<Assignment>,
    joins: Vec<Join>,
    condition: Condition,
    order_by: Vec<String>,
    limit: Option<u64>,
    binds: Vec<(String, SqlValue)>,
}

impl Update {
    /// Creates an empty UPDATE builder for `dialect`.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: Vec::new(),
            assignments: Vec::new(),
            joins: Vec::new(),
            condition: Condition::default(),
            order_by: Vec::new(),
            limit: None,
            binds: Vec::new(),
        }
    }

    /// Sets the target table. `table` may carry an alias.
    pub fn table(mut self, table: &str) -> Result<Self> {
        self.tables = vec![protect_identifier(self.dialect, table, None, true)?];
        Ok(self)
    }

    /// Adds `column = expression` assignments, split on the first `=`.
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.assignments
            .extend(columns.iter().map(|spec| Assignment::parse(spec)));
        self
    }

    /// Assigns a value to a column.
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self
            .assignments
            .iter_mut()
            .find(|assignment| assignment.column() == column)
        {
            Some(existing) => {
                *existing = Assignment::Value {
                    column: String::from(column),
                    value,
                };
            }
            None => self.assignments.push(Assignment::Value {
                column: String::from(column),
                value,
            }),
        }
        self
    }

    /// Assigns every entry of a column-to-value map.
    #[must_use]
    pub fn values<I, K, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        values
            .into_iter()
            .fold(self, |update, (column, value)| update.set(column.as_ref(), value))
    }

    /// Adds a join. Only MySQL accepts joins in UPDATE.
    pub fn join(mut self, join_type: JoinType, table: &str, on: Condition) -> Result<Self> {
        check_write_order_limit(self.dialect, "UPDATE with JOIN")?;
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

    /// Sets ORDER BY. Only MySQL accepts it in UPDATE.
    pub fn order_by(mut self, terms: &[&str]) -> Result<Self> {
        check_write_order_limit(self.dialect, "UPDATE with ORDER BY")?;
        self.order_by = split_terms(terms);
        Ok(self)
    }

    /// Sets LIMIT. Only MySQL accepts it in UPDATE.
    pub fn limit(mut self, limit: u64) -> Result<Self> {
        check_write_order_limit(self.dialect, "UPDATE with LIMIT")?;
        self.limit = (limit > 0).then_some(limit);
        Ok(self)
    }

    /// Binds a named parameter.
    pub fn bind(mut self, name: &str, value: impl ToSqlValue) -> Result<Self> {
        bind_value(&mut self.binds, name, value.to_sql_value())?;
        Ok(self)
    }
}

impl Statement for Update {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn to_sql(&self) -> Result<String> {
        let dialect = self.dialect;
        if self.tables.is_empty() {
            return Err(QueryError::missing("no table set"));
        }
        statement_binds(&self.binds, &self.joins, &[&self.condition])?;
        let inferred: Vec<Assignment>;
        let assignments = if self.assignments.is_empty() {
            if self.binds.is_empty() {
                return Err(QueryError::missing("no columns set"));
            }
            inferred = self
                .binds
                .iter()
                .map(|(name, _)| Assignment::Param(name.clone()))
                .collect();
            &inferred
        } else {
            &self.assignments
        };

        let mut sql = format!("UPDATE {}", render_sources(dialect, &self.tables));
        push_joins(dialect, &self.joins, &mut sql)?;
        let rendered = assignments
            .iter()
            .map(|assignment| assignment.render(dialect))
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(" SET ");
        sql.push_str(&rendered.join(", "));
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
