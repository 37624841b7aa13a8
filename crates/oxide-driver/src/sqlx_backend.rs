//! Connections backed by `sqlx::AnyConnection`.
//!
//! Each connection owns a current-thread tokio runtime and blocks on it, so
//! the driver stays synchronous. Must not be used from inside another tokio
//! runtime.

use futures::TryStreamExt;
use oxide_query::SqlValue;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::mysql::MySqlDatabaseError;
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, Column, Either, Executor, Row as _};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::connection::{Connection, Connector, StatementHandle};
use crate::driver::Driver;
use crate::error::{DatabaseError, Result};

/// Opens sqlx connections for MySQL, Postgres and SQLite URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

impl SqlxConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for SqlxConnector {
    fn connect(&self, config: &ConnectionConfig) -> std::result::Result<Box<dyn Connection>, DatabaseError> {
        let url = config
            .to_url()
            .map_err(|e| DatabaseError::message(e.to_string()))?;
        sqlx::any::install_default_drivers();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DatabaseError::transport(e.to_string()))?;
        let conn = runtime
            .block_on(<AnyConnection as sqlx::Connection>::connect(&url))
            .map_err(map_error)?;
        debug!(driver = %config.driver, "sqlx connection open");
        Ok(Box::new(SqlxConnection { runtime, conn }))
    }
}

struct SqlxConnection {
    runtime: Runtime,
    conn: AnyConnection,
}

impl Connection for SqlxConnection {
    fn execute(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> std::result::Result<StatementHandle, DatabaseError> {
        let Self { runtime, conn } = self;
        runtime.block_on(async move {
            let query = params.iter().fold(sqlx::query(sql), bind_value);
            let mut stream = conn.fetch_many(query);

            let mut columns: Option<Vec<String>> = None;
            let mut rows = Vec::new();
            let mut affected = 0;
            let mut last_insert_id = None;
            while let Some(item) = stream.try_next().await.map_err(map_error)? {
                match item {
                    Either::Left(done) => {
                        affected += done.rows_affected();
                        if let Some(id) = done.last_insert_id() {
                            last_insert_id = Some(id);
                        }
                    }
                    Either::Right(row) => {
                        if columns.is_none() {
                            columns = Some(
                                row.columns()
                                    .iter()
                                    .map(|column| String::from(column.name()))
                                    .collect(),
                            );
                        }
                        rows.push(decode_row(&row));
                    }
                }
            }

            let handle = match columns {
                Some(columns) => StatementHandle::with_rows(columns, rows),
                None => StatementHandle::affected(affected, None),
            };
            Ok(handle.with_last_insert_id(last_insert_id))
        })
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(n) => query.bind(*n),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Blob(bytes) => query.bind(bytes.clone()),
    }
}

/// Decodes each column with the first Rust type that accepts it.
fn decode_row(row: &AnyRow) -> Vec<SqlValue> {
    (0..row.len()).map(|index| decode_column(row, index)).collect()
}

fn decode_column(row: &AnyRow, index: usize) -> SqlValue {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Int);
    }
    if let Ok(value) = row.try_get::<Option<i32>, _>(index) {
        return value.map_or(SqlValue::Null, |n| SqlValue::Int(i64::from(n)));
    }
    if let Ok(value) = row.try_get::<Option<i16>, _>(index) {
        return value.map_or(SqlValue::Null, |n| SqlValue::Int(i64::from(n)));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Float);
    }
    if let Ok(value) = row.try_get::<Option<f32>, _>(index) {
        return value.map_or(SqlValue::Null, |f| SqlValue::Float(f64::from(f)));
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Bool);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Text);
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Blob);
    }
    debug!(index, "column type not decodable, reading as NULL");
    SqlValue::Null
}

/// Maps a sqlx error to the vendor code the retry loop classifies.
fn map_error(err: sqlx::Error) -> DatabaseError {
    match err {
        sqlx::Error::Database(db) => {
            // MySQL codes are classified by error number, not SQLSTATE
            let code = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|mysql| mysql.number().to_string())
                .or_else(|| db.code().map(std::borrow::Cow::into_owned));
            DatabaseError {
                code,
                message: String::from(db.message()),
                transport: false,
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => DatabaseError::transport(err.to_string()),
        other => DatabaseError::message(other.to_string()),
    }
}

impl Driver {
    /// Connects through sqlx.
    ///
    /// # Errors
    ///
    /// As [`Driver::connect`].
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        Self::connect(config, SqlxConnector::new())
    }
}
