//! Condition trees for WHERE, HAVING and JOIN ... ON clauses.

use std::mem;

use super::select::Select;
use super::value::{SqlValue, ToSqlValue, Value};
use super::Statement;
use crate::dialect::Dialect;
use crate::error::{ConfigErrorKind, QueryError, Result};
use crate::ident::protect_identifier;

/// Comparison operator of a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    /// Returns the SQL spelling of the operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

/// How the children of a group are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl Connective {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// The right-hand side of a leaf condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand (`IS NULL`, `IS NOT NULL`).
    None,
    /// A single value.
    Value(Value),
    /// A value list for `IN` / `NOT IN`.
    List(Vec<Value>),
    /// Another column, protected like the left-hand side.
    Column(String),
    /// A nested SELECT, compiled in parentheses.
    Subquery(Box<Select>),
    /// A nested condition, compiled in parentheses.
    Nested(Box<Condition>),
}

/// A node of a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `<column> <operator> <operand>`.
    Leaf {
        /// Column name, protected at compile time.
        column: String,
        /// Comparison operator.
        operator: Operator,
        /// Right-hand side.
        operand: Operand,
    },
    /// Children joined by a connective.
    Group {
        /// `AND` or `OR`.
        connective: Connective,
        /// Ordered children.
        children: Vec<Condition>,
    },
    /// SQL text inlined verbatim.
    Raw(String),
}

impl Default for Condition {
    fn default() -> Self {
        Self::Group {
            connective: Connective::And,
            children: Vec::new(),
        }
    }
}

impl Condition {
    /// Creates a leaf condition.
    pub fn compare(column: impl Into<String>, operator: Operator, operand: Operand) -> Self {
        Self::Leaf {
            column: column.into(),
            operator,
            operand,
        }
    }

    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::Eq, Operand::Value(value.into()))
    }

    /// `column != value`
    pub fn not_eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::NotEq, Operand::Value(value.into()))
    }

    /// `column < value`
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::Lt, Operand::Value(value.into()))
    }

    /// `column <= value`
    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::Le, Operand::Value(value.into()))
    }

    /// `column > value`
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::Gt, Operand::Value(value.into()))
    }

    /// `column >= value`
    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::Ge, Operand::Value(value.into()))
    }

    /// `column LIKE pattern`
    pub fn like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::compare(column, Operator::Like, Operand::Value(pattern.into()))
    }

    /// `column NOT LIKE pattern`
    pub fn not_like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::compare(column, Operator::NotLike, Operand::Value(pattern.into()))
    }

    /// `column IN (values...)`
    pub fn in_list<I, T>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToSqlValue,
    {
        let list = values.into_iter().map(Value::from).collect();
        Self::compare(column, Operator::In, Operand::List(list))
    }

    /// `column NOT IN (values...)`
    pub fn not_in_list<I, T>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToSqlValue,
    {
        let list = values.into_iter().map(Value::from).collect();
        Self::compare(column, Operator::NotIn, Operand::List(list))
    }

    /// `column IN (SELECT ...)`
    pub fn in_select(column: impl Into<String>, select: Select) -> Self {
        Self::compare(column, Operator::In, Operand::Subquery(Box::new(select)))
    }

    /// `column IS NULL`
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::compare(column, Operator::IsNull, Operand::None)
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::compare(column, Operator::IsNotNull, Operand::None)
    }

    /// `left = right`, both sides protected as identifiers.
    pub fn columns_eq(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::compare(left, Operator::Eq, Operand::Column(right.into()))
    }

    /// Verbatim SQL.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Joins conditions with AND.
    pub fn all(children: impl IntoIterator<Item = Self>) -> Self {
        Self::Group {
            connective: Connective::And,
            children: children.into_iter().collect(),
        }
    }

    /// Joins conditions with OR.
    pub fn any(children: impl IntoIterator<Item = Self>) -> Self {
        Self::Group {
            connective: Connective::Or,
            children: children.into_iter().collect(),
        }
    }

    /// Combines with another condition using AND.
    #[must_use]
    pub fn and(mut self, other: Self) -> Self {
        self.push(Connective::And, other);
        self
    }

    /// Combines with another condition using OR.
    #[must_use]
    pub fn or(mut self, other: Self) -> Self {
        self.push(Connective::Or, other);
        self
    }

    /// Returns true when the condition compiles to nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Leaf { .. } => false,
            Self::Group { children, .. } => children.iter().all(Self::is_empty),
            Self::Raw(sql) => sql.trim().is_empty(),
        }
    }

    /// Appends `other` under `connective`, flattening into a matching group.
    pub(crate) fn push(&mut self, connective: Connective, other: Self) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }
        if let Self::Group {
            connective: current,
            children,
        } = self
        {
            if *current == connective {
                children.push(other);
                return;
            }
        }
        let previous = mem::take(self);
        *self = Self::Group {
            connective,
            children: vec![previous, other],
        };
    }

    /// Collects the parameters bound on sub-selects inside the tree.
    pub(crate) fn collect_binds(&self, binds: &mut Vec<(String, SqlValue)>) -> Result<()> {
        match self {
            Self::Raw(_) => Ok(()),
            Self::Group { children, .. } => children
                .iter()
                .try_for_each(|child| child.collect_binds(binds)),
            Self::Leaf { operand, .. } => match operand {
                Operand::Subquery(select) => select.collect_binds(binds),
                Operand::Nested(condition) => condition.collect_binds(binds),
                Operand::None | Operand::Value(_) | Operand::List(_) | Operand::Column(_) => Ok(()),
            },
        }
    }

    /// Compiles the condition for `dialect`.
    ///
    /// Groups with more than one non-empty child are parenthesised; empty
    /// groups compile to the empty string.
    pub fn compile(&self, dialect: Dialect) -> Result<String> {
        match self {
            Self::Raw(sql) => Ok(String::from(sql.trim())),
            Self::Group {
                connective,
                children,
            } => {
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    let sql = child.compile(dialect)?;
                    if !sql.is_empty() {
                        parts.push(sql);
                    }
                }
                Ok(match parts.len() {
                    0 => String::new(),
                    1 => parts.remove(0),
                    _ => format!("({})", parts.join(connective.as_sql())),
                })
            }
            Self::Leaf {
                column,
                operator,
                operand,
            } => compile_leaf(dialect, column, *operator, operand),
        }
    }
}

fn compile_leaf(
    dialect: Dialect,
    column: &str,
    operator: Operator,
    operand: &Operand,
) -> Result<String> {
    let lhs = protect_identifier(dialect, column, None, false)?.to_sql(dialect);
    let rhs = match operand {
        Operand::None => return Ok(format!("{lhs} {}", operator.as_sql())),
        Operand::Value(Value::Scalar(value)) if value.is_null() => {
            let null_op = match operator {
                Operator::Eq | Operator::IsNull => Operator::IsNull,
                Operator::NotEq | Operator::IsNotNull => Operator::IsNotNull,
                _ => {
                    return Err(QueryError::UnsupportedOperation(format!(
                        "cannot compare {column} {} NULL",
                        operator.as_sql()
                    )))
                }
            };
            return Ok(format!("{lhs} {}", null_op.as_sql()));
        }
        Operand::Value(value) => value.serialize(dialect),
        Operand::List(values) => {
            if values.is_empty() {
                return Err(QueryError::Validation(format!(
                    "empty value list for {column}"
                )));
            }
            let items: Vec<String> = values.iter().map(|v| v.serialize(dialect)).collect();
            format!("({})", items.join(", "))
        }
        Operand::Column(other) => protect_identifier(dialect, other, None, false)?.to_sql(dialect),
        Operand::Subquery(select) => {
            if select.dialect() != dialect {
                return Err(QueryError::config(
                    ConfigErrorKind::DialectMismatch,
                    format!(
                        "subquery built for {} used in a {dialect} statement",
                        select.dialect()
                    ),
                ));
            }
            format!("({})", select.to_sql()?)
        }
        Operand::Nested(condition) => format!("({})", condition.compile(dialect)?),
    };
    Ok(format!("{lhs} {} {rhs}", operator.as_sql()))
}
