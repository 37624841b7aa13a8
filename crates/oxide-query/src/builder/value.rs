//! SQL values and their literal rendering.
//!
//! A value position in a statement holds either a [`Value::Scalar`], which
//! is escaped through the dialect when the statement is compiled, or a
//! [`Value::Literal`], which is SQL text inlined verbatim (`NOW()`, a column
//! reference, a `:name` placeholder). Builders store values unrendered and
//! serialize them exactly once, at compile time.

use crate::dialect::Dialect;

/// A scalar SQL value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the escaped literal for inline use in `dialect`.
    #[must_use]
    pub fn escape(&self, dialect: Dialect) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => String::from(dialect.bool_literal(*b)),
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Text(s) => format!("'{}'", dialect.escape_string(s)),
            Self::Blob(b) => dialect.blob_literal(b),
        }
    }

    /// Returns true for NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as an integer, converting text and booleans.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null | Self::Blob(_) => None,
        }
    }

    /// Returns the value as text, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as a plain string key, as used by keyed fetches.
    ///
    /// NULL renders as the empty string.
    #[must_use]
    pub fn to_key(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

/// A value position: literal SQL, or a scalar that must be escaped.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL text that is never escaped.
    Literal(String),
    /// A scalar escaped through the dialect.
    Scalar(SqlValue),
}

impl Value {
    /// Creates a literal SQL value.
    pub fn literal(sql: impl Into<String>) -> Self {
        Self::Literal(sql.into())
    }

    /// Creates a named placeholder literal, e.g. `:id`.
    #[must_use]
    pub fn param(name: &str) -> Self {
        Self::Literal(format!(":{name}"))
    }

    /// Renders the value for `dialect`; literals pass through untouched.
    #[must_use]
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            Self::Literal(sql) => sql.clone(),
            Self::Scalar(value) => value.escape(dialect),
        }
    }
}

impl<T: ToSqlValue> From<T> for Value {
    fn from(value: T) -> Self {
        Self::Scalar(value.to_sql_value())
    }
}

/// Escapes a scalar into a literal for `dialect`.
#[must_use]
pub fn escape_value(dialect: Dialect, value: &SqlValue) -> String {
    value.escape(dialect)
}

/// Renders a value position for `dialect`, honouring literal passthrough.
#[must_use]
pub fn serialize_scalar(dialect: Dialect, value: &Value) -> String {
    value.serialize(dialect)
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for &SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self.clone()
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! int_to_sql_value {
    ($($ty:ty),*) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )*
    };
}

int_to_sql_value!(i64, i32, i16, i8, u32, u16, u8);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for &String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_null_and_numbers() {
        assert_eq!(SqlValue::Null.escape(Dialect::MySql), "NULL");
        assert_eq!(SqlValue::Int(-100).escape(Dialect::Postgres), "-100");
        assert_eq!(SqlValue::Float(2.5).escape(Dialect::Sqlite), "2.5");
    }

    #[test]
    fn test_escape_bool_per_dialect() {
        assert_eq!(SqlValue::Bool(true).escape(Dialect::Postgres), "TRUE");
        assert_eq!(SqlValue::Bool(true).escape(Dialect::MySql), "1");
        assert_eq!(SqlValue::Bool(false).escape(Dialect::Sqlite), "0");
    }

    #[test]
    fn test_escape_text_per_dialect() {
        let value = SqlValue::Text(String::from("O'Brien"));
        assert_eq!(value.escape(Dialect::Postgres), "'O''Brien'");
        assert_eq!(value.escape(Dialect::MySql), "'O\\'Brien'");
    }

    #[test]
    fn test_sql_injection_is_escaped() {
        let value = SqlValue::Text(String::from("'; DROP TABLE users; --"));
        assert_eq!(value.escape(Dialect::Sqlite), "'''; DROP TABLE users; --'");
    }

    #[test]
    fn test_escape_blob() {
        let value = SqlValue::Blob(vec![0x48, 0x49]);
        assert_eq!(value.escape(Dialect::Sqlite), "X'4849'");
        assert_eq!(value.escape(Dialect::Postgres), "'\\x4849'::bytea");
    }

    #[test]
    fn test_literal_is_never_escaped() {
        let now = Value::literal("NOW()");
        assert_eq!(serialize_scalar(Dialect::MySql, &now), "NOW()");
        let quoted = Value::from("NOW()");
        assert_eq!(serialize_scalar(Dialect::MySql, &quoted), "'NOW()'");
        assert_eq!(Value::param("id").serialize(Dialect::Postgres), ":id");
    }

    #[test]
    fn test_to_sql_value_conversions() {
        assert_eq!(true.to_sql_value(), SqlValue::Bool(true));
        assert_eq!(42_i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!(2.5_f64.to_sql_value(), SqlValue::Float(2.5));
        assert_eq!("hello".to_sql_value(), SqlValue::Text(String::from("hello")));
        assert_eq!(None::<i32>.to_sql_value(), SqlValue::Null);
        assert_eq!(Some(42_i32).to_sql_value(), SqlValue::Int(42));
    }

    #[test]
    fn test_as_i64_and_key() {
        assert_eq!(SqlValue::Text(String::from(" 12 ")).as_i64(), Some(12));
        assert_eq!(SqlValue::Int(7).to_key(), "7");
        assert_eq!(SqlValue::Null.to_key(), "");
    }
}
