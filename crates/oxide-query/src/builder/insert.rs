//! INSERT / REPLACE / upsert statement builder.

use super::value::{SqlValue, ToSqlValue, Value};
use super::{bind_value, Params, Statement};
use crate::dialect::{Dialect, IgnoreSyntax, UpsertSyntax};
use crate::error::{ConfigErrorKind, QueryError, Result};
use crate::ident::{protect_identifier, Identifier};

/// What an `ON CONFLICT` clause matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictTarget {
    /// A list of unique columns.
    Columns(Vec<String>),
    /// A named constraint (PostgreSQL).
    Constraint(String),
}

/// An INSERT statement builder.
///
/// Value sets are column-to-value maps; the column list is taken from the
/// first set unless given explicitly, and every later set must cover the
/// same columns. Without value sets the bound parameter names are used as
/// columns and compiled as `:name` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    dialect: Dialect,
    table: Option<Identifier>,
    replace: bool,
    ignore: bool,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    upsert: Option<Vec<(String, Value)>>,
    conflict: Option<ConflictTarget>,
    returning: Vec<String>,
    binds: Vec<(String, SqlValue)>,
}

impl Insert {
    /// Creates an empty INSERT builder for `dialect`.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            table: None,
            replace: false,
            ignore: false,
            columns: Vec::new(),
            rows: Vec::new(),
            upsert: None,
            conflict: None,
            returning: Vec::new(),
            binds: Vec::new(),
        }
    }

    /// Sets the target table.
    pub fn into_table(mut self, table: &str) -> Result<Self> {
        self.table = Some(protect_identifier(self.dialect, table, None, true)?);
        self.replace = false;
        Ok(self)
    }

    /// Sets the target table with REPLACE semantics.
    ///
    /// PostgreSQL has no REPLACE; the statement is compiled as an upsert
    /// and then needs a conflict target.
    pub fn replace(mut self, table: &str) -> Result<Self> {
        self.table = Some(protect_identifier(self.dialect, table, None, true)?);
        self.replace = true;
        Ok(self)
    }

    /// Sets the column list explicitly.
    ///
    /// Value sets already added are re-ordered to match; they must cover
    /// exactly these columns.
    pub fn columns(mut self, columns: &[&str]) -> Result<Self> {
        let columns: Vec<String> = columns.iter().map(|c| String::from(c.trim())).collect();
        if let Some(duplicate) = columns
            .iter()
            .enumerate()
            .find_map(|(i, column)| columns[..i].contains(column).then_some(column))
        {
            return Err(QueryError::Validation(format!(
                "duplicate column in column list: {duplicate}"
            )));
        }
        if !self.rows.is_empty() {
            let order = columns
                .iter()
                .map(|column| self.columns.iter().position(|c| c == column))
                .collect::<Option<Vec<_>>>()
                .filter(|order| order.len() == self.columns.len())
                .ok_or_else(|| {
                    QueryError::config(
                        ConfigErrorKind::HeterogeneousValueSets,
                        "column list does not match the existing value sets",
                    )
                })?;
            for row in &mut self.rows {
                *row = order.iter().map(|&i| row[i].clone()).collect();
            }
        }
        self.columns = columns;
        Ok(self)
    }

    /// Adds a value set.
    pub fn values<I, K, V>(mut self, row: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let row: Vec<(String, Value)> = row
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if row.is_empty() {
            return Err(QueryError::missing("empty value set"));
        }
        if self.columns.is_empty() {
            let mut columns: Vec<String> = Vec::with_capacity(row.len());
            for (column, _) in &row {
                if columns.contains(column) {
                    return Err(QueryError::Validation(format!(
                        "duplicate column in value set: {column}"
                    )));
                }
                columns.push(column.clone());
            }
            self.columns = columns;
            self.rows.push(row.into_iter().map(|(_, v)| v).collect());
            return Ok(self);
        }
        if row.len() != self.columns.len() {
            return Err(heterogeneous(self.rows.len()));
        }
        let mut aligned = Vec::with_capacity(row.len());
        for column in &self.columns {
            let value = row
                .iter()
                .find(|(k, _)| k == column)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| heterogeneous(self.rows.len()))?;
            aligned.push(value);
        }
        self.rows.push(aligned);
        Ok(self)
    }

    /// Requests an upsert whose update values are derived from the
    /// inserted values.
    #[must_use]
    pub fn upsert(mut self) -> Self {
        self.upsert = Some(Vec::new());
        self
    }

    /// Requests an upsert with an explicit update map.
    #[must_use]
    pub fn upsert_with<I, K, V>(mut self, updates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.upsert = Some(
            updates
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Skips rows that conflict with existing ones.
    #[must_use]
    pub const fn ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    /// Sets the conflict target to a list of columns.
    #[must_use]
    pub fn conflict_columns(mut self, columns: &[&str]) -> Self {
        self.conflict = Some(ConflictTarget::Columns(
            columns.iter().map(|c| String::from(*c)).collect(),
        ));
        self
    }

    /// Sets the conflict target to a named constraint.
    #[must_use]
    pub fn conflict_constraint(mut self, name: &str) -> Self {
        self.conflict = Some(ConflictTarget::Constraint(String::from(name)));
        self
    }

    /// Appends a RETURNING clause.
    ///
    /// Fails immediately on dialects without RETURNING.
    pub fn returning(mut self, columns: &[&str]) -> Result<Self> {
        if !self.dialect.supports_returning() {
            return Err(QueryError::unsupported("RETURNING", self.dialect));
        }
        self.returning = super::split_terms(columns);
        Ok(self)
    }

    /// Binds a named parameter.
    pub fn bind(mut self, name: &str, value: impl ToSqlValue) -> Result<Self> {
        bind_value(&mut self.binds, name, value.to_sql_value())?;
        Ok(self)
    }

    fn protect_columns(&self, columns: &[String]) -> Result<Vec<String>> {
        columns
            .iter()
            .map(|column| {
                protect_identifier(self.dialect, column, None, false)
                    .map(|ident| ident.to_sql(self.dialect))
            })
            .collect()
    }

    fn conflict_clause(&self) -> Result<String> {
        let dialect = self.dialect;
        match (dialect.upsert_syntax(), &self.conflict) {
            (UpsertSyntax::OnDuplicateKey, _) => Ok(String::from(" ON DUPLICATE KEY UPDATE ")),
            (UpsertSyntax::OnConflict { .. }, Some(ConflictTarget::Columns(columns)))
                if !columns.is_empty() =>
            {
                Ok(format!(
                    " ON CONFLICT ({}) DO UPDATE SET ",
                    self.protect_columns(columns)?.join(", ")
                ))
            }
            (UpsertSyntax::OnConflict { .. }, Some(ConflictTarget::Constraint(name)))
                if !name.trim().is_empty() =>
            {
                if dialect != Dialect::Postgres {
                    return Err(QueryError::unsupported("ON CONFLICT ON CONSTRAINT", dialect));
                }
                Ok(format!(
                    " ON CONFLICT ON CONSTRAINT {} DO UPDATE SET ",
                    dialect.quote_identifier(name.trim())
                ))
            }
            (UpsertSyntax::OnConflict { requires_target }, _) => {
                if requires_target {
                    Err(QueryError::config(
                        ConfigErrorKind::MissingConflictTarget,
                        format!("{dialect} requires a conflict target for upserts"),
                    ))
                } else {
                    Ok(String::from(" ON CONFLICT DO UPDATE SET "))
                }
            }
        }
    }

    fn update_assignments(&self, columns: &[String], from_binds: bool) -> Result<String> {
        let dialect = self.dialect;
        let explicit = self.upsert.as_deref().unwrap_or_default();
        let pairs: Vec<(String, String)> = if !explicit.is_empty() {
            explicit
                .iter()
                .map(|(column, value)| (column.clone(), value.serialize(dialect)))
                .collect()
        } else if from_binds {
            columns
                .iter()
                .map(|column| (column.clone(), format!(":{column}")))
                .collect()
        } else if self.rows.len() > 1 {
            return Err(QueryError::UnsupportedOperation(String::from(
                "upsert with multiple value sets needs explicit update values",
            )));
        } else {
            columns
                .iter()
                .zip(&self.rows[0])
                .map(|(column, value)| (column.clone(), value.serialize(dialect)))
                .collect()
        };
        let mut assignments = Vec::with_capacity(pairs.len());
        for (column, value) in pairs {
            let column = protect_identifier(dialect, &column, None, false)?.to_sql(dialect);
            assignments.push(format!("{column} = {value}"));
        }
        Ok(assignments.join(", "))
    }
}

impl Statement for Insert {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn to_sql(&self) -> Result<String> {
        let dialect = self.dialect;
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| QueryError::missing("no table set"))?;

        let from_binds = self.rows.is_empty();
        let columns: Vec<String> = if !from_binds {
            self.columns.clone()
        } else if self.binds.is_empty() {
            return Err(QueryError::missing("no values or bind parameters set"));
        } else if self.columns.is_empty() {
            self.binds.iter().map(|(name, _)| name.clone()).collect()
        } else {
            self.columns.clone()
        };

        let mut upsert = self.upsert.is_some();
        let mut ignore_clause = None;
        let prefix = if self.replace {
            match dialect.replace_prefix() {
                Some(prefix) => prefix,
                None => {
                    upsert = true;
                    "INSERT INTO"
                }
            }
        } else if self.ignore {
            match dialect.ignore_syntax() {
                IgnoreSyntax::Prefix(prefix) => prefix,
                IgnoreSyntax::Clause(clause) => {
                    ignore_clause = Some(clause);
                    "INSERT INTO"
                }
            }
        } else {
            "INSERT INTO"
        };

        let mut sql = format!(
            "{prefix} {} ({}) VALUES ",
            table.to_sql(dialect),
            self.protect_columns(&columns)?.join(", ")
        );
        if from_binds {
            let placeholders: Vec<String> = columns.iter().map(|c| format!(":{c}")).collect();
            sql.push_str(&format!("({})", placeholders.join(", ")));
        } else {
            let rows: Vec<String> = self
                .rows
                .iter()
                .map(|row| {
                    let values: Vec<String> = row.iter().map(|v| v.serialize(dialect)).collect();
                    format!("({})", values.join(", "))
                })
                .collect();
            sql.push_str(&rows.join(", "));
        }

        if upsert {
            sql.push_str(&self.conflict_clause()?);
            sql.push_str(&self.update_assignments(&columns, from_binds)?);
        } else if let Some(clause) = ignore_clause {
            match &self.conflict {
                Some(ConflictTarget::Columns(target)) if !target.is_empty() => {
                    sql.push_str(&format!(
                        " ON CONFLICT ({}) DO NOTHING",
                        self.protect_columns(target)?.join(", ")
                    ));
                }
                _ => {
                    sql.push(' ');
                    sql.push_str(clause);
                }
            }
        }

        if !self.returning.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.protect_columns(&self.returning)?.join(", "));
        }
        Ok(sql)
    }

    fn params(&self) -> Params {
        Params::from_binds(&self.binds)
    }

    fn returns_rows(&self) -> bool {
        !self.returning.is_empty()
    }
}

fn heterogeneous(index: usize) -> QueryError {
    QueryError::config(
        ConfigErrorKind::HeterogeneousValueSets,
        format!("value set #{} does not match the column list", index + 1),
    )
}
