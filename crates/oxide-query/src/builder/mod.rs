//! Statement builders.
//!
//! Each builder is created for one [`Dialect`], accumulates its state
//! through fluent setters and compiles with [`Statement::to_sql`].
//! Compilation borrows the builder, so it may be repeated; a nested
//! sub-select is compiled once per containing statement.
//!
//! # Example
//!
//! ```rust
//! use oxide_query::{Condition, Dialect, Select, Statement};
//!
//! let select = Select::new(Dialect::Postgres)
//!     .columns(&["id", "name"])
//!     .from("users")
//!     .unwrap()
//!     .where_clause(Condition::eq("active", true));
//!
//! assert_eq!(
//!     select.to_sql().unwrap(),
//!     "SELECT \"id\", \"name\" FROM \"users\" WHERE \"active\" = TRUE"
//! );
//! ```

mod condition;
mod delete;
mod insert;
mod select;
mod update;
pub mod value;

pub use condition::{Condition, Connective, Operand, Operator};
pub use delete::Delete;
pub use insert::{ConflictTarget, Insert};
pub use select::Select;
pub use update::Update;
pub use value::{SqlValue, ToSqlValue, Value};

use crate::dialect::Dialect;
use crate::error::{QueryError, Result};
use crate::ident::{protect_identifier, protect_ordering, Identifier};

/// Parameters bound to a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    /// No parameters.
    #[default]
    None,
    /// Positional parameters for `?` / `$n` placeholders.
    Positional(Vec<SqlValue>),
    /// Named parameters for `:name` placeholders.
    Named(Vec<(String, SqlValue)>),
}

impl Params {
    /// Returns true when no parameter is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Positional(values) => values.len(),
            Self::Named(values) => values.len(),
        }
    }

    fn from_binds(binds: &[(String, SqlValue)]) -> Self {
        if binds.is_empty() {
            Self::None
        } else {
            Self::Named(binds.to_vec())
        }
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl From<Vec<SqlValue>> for Params {
    fn from(values: Vec<SqlValue>) -> Self {
        Self::Positional(values)
    }
}

impl From<Vec<(String, SqlValue)>> for Params {
    fn from(values: Vec<(String, SqlValue)>) -> Self {
        Self::Named(values)
    }
}

/// A compilable statement.
pub trait Statement {
    /// The dialect the statement is compiled for.
    fn dialect(&self) -> Dialect;

    /// Compiles the statement to SQL text.
    fn to_sql(&self) -> Result<String>;

    /// Returns the parameters bound with `bind`.
    fn params(&self) -> Params;

    /// Returns true when executing the statement yields rows.
    fn returns_rows(&self) -> bool;
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// Bare `JOIN`
    Plain,
}

impl JoinType {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Plain => "JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Join {
    join_type: JoinType,
    source: Identifier,
    condition: Condition,
}

impl Join {
    pub(crate) fn new(
        dialect: Dialect,
        join_type: JoinType,
        table: &str,
        condition: Condition,
    ) -> Result<Self> {
        Ok(Self {
            join_type,
            source: protect_identifier(dialect, table, None, true)?,
            condition,
        })
    }

    pub(crate) fn collect_binds(&self, binds: &mut Vec<(String, SqlValue)>) -> Result<()> {
        self.condition.collect_binds(binds)
    }

    fn render(&self, dialect: Dialect, sql: &mut String) -> Result<()> {
        sql.push(' ');
        sql.push_str(self.join_type.keyword());
        sql.push(' ');
        sql.push_str(&self.source.to_sql(dialect));
        let on = self.condition.compile(dialect)?;
        if !on.is_empty() {
            sql.push_str(" ON (");
            sql.push_str(&on);
            sql.push(')');
        }
        Ok(())
    }
}

pub(crate) fn push_joins(dialect: Dialect, joins: &[Join], sql: &mut String) -> Result<()> {
    for join in joins {
        join.render(dialect, sql)?;
    }
    Ok(())
}

/// Appends ` <keyword> <condition>` unless the condition is empty.
pub(crate) fn push_condition(
    dialect: Dialect,
    keyword: &str,
    condition: &Condition,
    sql: &mut String,
) -> Result<()> {
    let compiled = condition.compile(dialect)?;
    if !compiled.is_empty() {
        sql.push(' ');
        sql.push_str(keyword);
        sql.push(' ');
        sql.push_str(&compiled);
    }
    Ok(())
}

/// Appends ` <keyword> a, b` with each term protected as an ordering term.
pub(crate) fn push_terms(
    dialect: Dialect,
    keyword: &str,
    terms: &[String],
    sql: &mut String,
) -> Result<()> {
    if terms.is_empty() {
        return Ok(());
    }
    let protected = terms
        .iter()
        .map(|term| protect_ordering(dialect, term))
        .collect::<Result<Vec<_>>>()?;
    sql.push(' ');
    sql.push_str(keyword);
    sql.push(' ');
    sql.push_str(&protected.join(", "));
    Ok(())
}

pub(crate) fn render_sources(dialect: Dialect, sources: &[Identifier]) -> String {
    sources
        .iter()
        .map(|source| source.to_sql(dialect))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits `"a, b DESC"` style lists into trimmed, non-empty terms.
///
/// Terms containing `(` are expressions and are not split.
pub(crate) fn split_terms(terms: &[&str]) -> Vec<String> {
    terms
        .iter()
        .flat_map(|term| {
            if term.contains('(') {
                vec![*term]
            } else {
                term.split(',').collect()
            }
        })
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn bind_value(
    binds: &mut Vec<(String, SqlValue)>,
    name: &str,
    value: SqlValue,
) -> Result<()> {
    let name = name.trim_start_matches(':');
    if name.is_empty() {
        return Err(QueryError::Validation(String::from(
            "parameter name must not be empty",
        )));
    }
    match binds.iter_mut().find(|(existing, _)| existing == name) {
        Some(slot) => slot.1 = value,
        None => binds.push((String::from(name), value)),
    }
    Ok(())
}

/// Adds the parameters of a nested statement. A name bound on both sides
/// must carry the same value.
pub(crate) fn merge_binds(
    binds: &mut Vec<(String, SqlValue)>,
    nested: &[(String, SqlValue)],
) -> Result<()> {
    for (name, value) in nested {
        match binds.iter().find(|(existing, _)| existing == name) {
            Some((_, existing)) if existing == value => {}
            Some(_) => {
                return Err(QueryError::Validation(format!(
                    "parameter :{name} is bound to different values"
                )))
            }
            None => binds.push((name.clone(), value.clone())),
        }
    }
    Ok(())
}

/// Parameters of a statement together with those of every sub-select in
/// its joins and conditions.
pub(crate) fn statement_binds(
    own: &[(String, SqlValue)],
    joins: &[Join],
    conditions: &[&Condition],
) -> Result<Vec<(String, SqlValue)>> {
    let mut binds = own.to_vec();
    for join in joins {
        join.collect_binds(&mut binds)?;
    }
    for condition in conditions {
        condition.collect_binds(&mut binds)?;
    }
    Ok(binds)
}

pub(crate) fn check_write_order_limit(dialect: Dialect, feature: &'static str) -> Result<()> {
    if dialect.supports_write_order_limit() {
        Ok(())
    } else {
        Err(QueryError::unsupported(feature, dialect))
    }
}
