#![allow(dead_code)]

use oxide_query::{Dialect, QueryError, Statement};

pub const DIALECTS: [Dialect; 3] = [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite];

pub fn sql<S: Statement>(statement: &S) -> String {
    statement
        .to_sql()
        .unwrap_or_else(|e| panic!("Failed to compile for {}: {e}", statement.dialect()))
}

pub fn sql_err<S: Statement>(statement: &S) -> QueryError {
    match statement.to_sql() {
        Ok(sql) => panic!("Expected compile error, got: {sql}"),
        Err(e) => e,
    }
}

/// Compiles the statement twice and checks both runs agree.
pub fn stable_sql<S: Statement>(statement: &S) -> String {
    let first = sql(statement);
    assert_eq!(first, sql(statement), "compilation is not repeatable");
    first
}
