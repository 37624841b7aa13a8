//! # oxide-query
//!
//! Dialect-aware SQL statement builders for MySQL, PostgreSQL and SQLite.
//!
//! This crate provides:
//! - [`Dialect`], the single record of per-backend syntax differences
//! - Identifier protection with per-dialect quoting ([`protect_identifier`])
//! - Condition trees with nested AND/OR groups ([`Condition`])
//! - SELECT, INSERT, UPDATE and DELETE builders compiling to dialect-correct
//!   SQL text
//!
//! Values are kept unrendered until compilation: a [`Value::Scalar`] is
//! escaped through the dialect exactly once, a [`Value::Literal`] is inlined
//! verbatim.
//!
//! ```rust
//! use oxide_query::{Condition, Dialect, Delete, Statement};
//!
//! let delete = Delete::new(Dialect::Postgres)
//!     .from("sessions")
//!     .unwrap()
//!     .truncate(true);
//! assert_eq!(
//!     delete.to_sql().unwrap(),
//!     "TRUNCATE \"sessions\" RESTART IDENTITY"
//! );
//!
//! // Any filter disables the TRUNCATE shortcut.
//! let delete = delete.where_clause(Condition::lt("expires_at", 1_700_000_000));
//! assert_eq!(
//!     delete.to_sql().unwrap(),
//!     "DELETE FROM \"sessions\" WHERE \"expires_at\" < 1700000000"
//! );
//! ```

pub mod builder;
pub mod dialect;
pub mod error;
pub mod ident;

pub use builder::{
    Condition, ConflictTarget, Connective, Delete, Insert, JoinType, Operand, Operator, Params,
    Select, SqlValue, Statement, ToSqlValue, Update, Value,
};
pub use builder::value::{escape_value, serialize_scalar};
pub use dialect::Dialect;
pub use error::{ConfigErrorKind, QueryError, Result};
pub use ident::{protect_identifier, Identifier};
