//! The connection driver.
//!
//! [`Driver`] owns one connection and runs statements on it one at a time.
//! Every statement goes through a single retry loop that classifies
//! failures by vendor code:
//!
//! - lock contention outside a transaction retries the statement, inside a
//!   transaction it ends the transaction with
//!   [`DriverError::TransactionLost`];
//! - connection loss either propagates or, under
//!   [`ReconnectPolicy::Unbounded`], reconnects and retries (or reports the
//!   transaction lost when one was open);
//! - anything else propagates unchanged.
//!
//! Transactions nest through savepoints named `trans<depth>`.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use oxide_query::{
    ConfigErrorKind, Delete, Dialect, Insert, Params, QueryError, Select, SqlValue, Statement,
    Update,
};
use tracing::{debug, error, info, warn};

use crate::config::{ConnectionConfig, ReconnectPolicy};
use crate::connection::{Connection, Connector, Row, StatementHandle};
use crate::error::{DatabaseError, DriverError, Failure, Result};
use crate::monitor::{QueryEvent, QueryMonitor, QueryOutcome};
use crate::params::bind_params;
use crate::result_set::ResultSet;

/// A database connection with transaction nesting and failure recovery.
pub struct Driver {
    config: ConnectionConfig,
    connector: Box<dyn Connector>,
    connection: Box<dyn Connection>,
    dialect: Dialect,
    depth: u32,
    reconnect: ReconnectPolicy,
    monitor: Option<Arc<dyn QueryMonitor>>,
    last_insert_id: Option<i64>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("dialect", &self.dialect)
            .field("depth", &self.depth)
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Opens a connection through `connector`.
    ///
    /// # Errors
    ///
    /// Fails with an `InvalidConfig` error for an unknown driver name, or
    /// with the connector's error when the server cannot be reached.
    pub fn connect(config: ConnectionConfig, connector: impl Connector + 'static) -> Result<Self> {
        let dialect = config.dialect()?;
        let connection = connector.connect(&config)?;
        info!(driver = dialect.name(), "connected");
        Ok(Self {
            config,
            connector: Box::new(connector),
            connection,
            dialect,
            depth: 0,
            reconnect: ReconnectPolicy::default(),
            monitor: None,
            last_insert_id: None,
        })
    }

    /// Sets the reconnect policy.
    #[must_use]
    pub const fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn set_reconnect_policy(&mut self, policy: ReconnectPolicy) {
        self.reconnect = policy;
    }

    /// Installs a monitor that sees every statement attempt.
    pub fn set_monitor(&mut self, monitor: Arc<dyn QueryMonitor>) {
        self.monitor = Some(monitor);
    }

    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current transaction nesting depth; 0 outside a transaction.
    #[must_use]
    pub const fn transaction_depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// Replaces the connection with a fresh one. Any open transaction is
    /// gone with the old connection.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when the server cannot be reached.
    pub fn reconnect(&mut self) -> Result<()> {
        self.connection = self.connector.connect(&self.config)?;
        self.depth = 0;
        info!(driver = self.dialect.name(), "reconnected");
        Ok(())
    }

    // ===================================================================
    // Statements
    // ===================================================================

    /// Runs a statement and returns a cursor over its result.
    ///
    /// `params` may be positional (`?` placeholders, rewritten to `$n` on
    /// Postgres) or named (`:name` placeholders).
    ///
    /// # Errors
    ///
    /// Returns the database error when it is not recovered, or
    /// [`DriverError::TransactionLost`] when recovery would need to replay
    /// an open transaction.
    pub fn query(&mut self, sql: &str, params: impl Into<Params>) -> Result<ResultSet<'_>> {
        let params = params.into();
        let handle = self.run_statement(sql, &params)?;
        Ok(ResultSet::new(self, handle, String::from(sql), params))
    }

    /// Compiles and runs a built statement.
    ///
    /// # Errors
    ///
    /// Fails with a `DialectMismatch` configuration error when the
    /// statement was built for another dialect, with the compilation error,
    /// or as [`Driver::query`] does.
    pub fn execute<S: Statement + ?Sized>(&mut self, statement: &S) -> Result<ResultSet<'_>> {
        if statement.dialect() != self.dialect {
            return Err(QueryError::config(
                ConfigErrorKind::DialectMismatch,
                format!(
                    "statement built for {} executed on {}",
                    statement.dialect(),
                    self.dialect
                ),
            )
            .into());
        }
        let sql = statement.to_sql()?;
        self.query(&sql, statement.params())
    }

    /// Runs a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// As [`Driver::query`].
    pub fn exec(&mut self, sql: &str, params: impl Into<Params>) -> Result<u64> {
        let params = params.into();
        Ok(self.run_statement(sql, &params)?.row_count())
    }

    /// Runs a query and returns its first row.
    ///
    /// # Errors
    ///
    /// As [`Driver::query`].
    pub fn select_row(&mut self, sql: &str, params: impl Into<Params>) -> Result<Option<Row>> {
        self.query(sql, params)?.next()
    }

    /// Runs a query and returns all its rows.
    ///
    /// # Errors
    ///
    /// As [`Driver::query`].
    pub fn select_all(&mut self, sql: &str, params: impl Into<Params>) -> Result<Vec<Row>> {
        self.query(sql, params)?.fetch_all()
    }

    /// Id generated by the last INSERT.
    ///
    /// On Postgres, passing both `table` and `column` reads the current
    /// value of the column's serial sequence instead. On SQLite the id is
    /// read with `last_insert_rowid()` on the live connection.
    ///
    /// # Errors
    ///
    /// As [`Driver::query`] for the lookups that run a statement.
    pub fn last_insert_id(&mut self, table: Option<&str>, column: Option<&str>) -> Result<Option<i64>> {
        let row = match (self.dialect, table, column) {
            (Dialect::Postgres, Some(table), Some(column)) => self.select_row(
                "SELECT currval(pg_catalog.pg_get_serial_sequence(?, ?))",
                vec![
                    SqlValue::Text(String::from(table)),
                    SqlValue::Text(String::from(column)),
                ],
            )?,
            // sqlx's generic SQLite results carry no row id
            (Dialect::Sqlite, _, _) => self.select_row("SELECT last_insert_rowid()", ())?,
            _ => return Ok(self.last_insert_id),
        };
        Ok(row.and_then(|row| row.get(0).and_then(SqlValue::as_i64)))
    }

    /// Quotes identifier parts and joins them with `.`; absent parts are
    /// skipped.
    #[must_use]
    pub fn quote_identifier(&self, parts: &[Option<&str>]) -> String {
        self.dialect.quote_parts(parts)
    }

    /// Renders a value as an inline literal; NULL renders as `NULL`.
    #[must_use]
    pub fn escape_value(&self, value: &SqlValue) -> String {
        value.escape(self.dialect)
    }

    /// Escapes a string for use inside single quotes, without the quotes.
    #[must_use]
    pub fn escape_string(&self, text: &str) -> String {
        self.dialect.escape_string(text)
    }

    // ===================================================================
    // Builders
    // ===================================================================

    #[must_use]
    pub fn select(&self) -> Select {
        Select::new(self.dialect)
    }

    #[must_use]
    pub fn insert(&self) -> Insert {
        Insert::new(self.dialect)
    }

    #[must_use]
    pub fn update(&self) -> Update {
        Update::new(self.dialect)
    }

    #[must_use]
    pub fn delete(&self) -> Delete {
        Delete::new(self.dialect)
    }

    // ===================================================================
    // Transactions
    // ===================================================================

    /// Opens a transaction, or a savepoint when one is already open.
    ///
    /// With `nesting` false, a nested begin only counts the level and
    /// returns `false`.
    ///
    /// # Errors
    ///
    /// As [`Driver::query`].
    pub fn begin(&mut self, nesting: bool) -> Result<bool> {
        let level = self.depth + 1;
        let issued = if level == 1 {
            self.run(self.dialect.begin_sql(), &Params::None, false)?;
            true
        } else if nesting {
            self.run(&format!("SAVEPOINT trans{level}"), &Params::None, true)?;
            true
        } else {
            false
        };
        self.depth = level;
        if issued {
            info!(level, "begin transaction");
        }
        Ok(issued)
    }

    /// Commits the innermost level: the transaction itself at depth 1, the
    /// savepoint above it otherwise.
    ///
    /// # Errors
    ///
    /// Fails with [`DriverError::NoActiveTransaction`] at depth 0, otherwise
    /// as [`Driver::query`].
    pub fn commit(&mut self, nesting: bool) -> Result<bool> {
        self.finish(nesting, "COMMIT", "RELEASE SAVEPOINT", "commit")
    }

    /// Rolls back the innermost level.
    ///
    /// # Errors
    ///
    /// Fails with [`DriverError::NoActiveTransaction`] at depth 0, otherwise
    /// as [`Driver::query`].
    pub fn rollback(&mut self, nesting: bool) -> Result<bool> {
        self.finish(nesting, "ROLLBACK", "ROLLBACK TO SAVEPOINT", "rollback")
    }

    fn finish(&mut self, nesting: bool, outer: &str, savepoint: &str, action: &str) -> Result<bool> {
        let level = self.depth;
        if level == 0 {
            return Err(DriverError::NoActiveTransaction);
        }
        self.depth = level - 1;
        let issued = if level == 1 {
            self.run(outer, &Params::None, true)?;
            true
        } else if nesting {
            self.run(&format!("{savepoint} trans{level}"), &Params::None, true)?;
            true
        } else {
            false
        };
        if issued {
            info!(level, "{action} transaction");
        }
        Ok(issued)
    }

    /// Runs `f` inside a transaction level: commits when it returns `Ok`,
    /// rolls back when it returns an error.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or the error of begin/commit.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.begin(true)?;
        match f(self) {
            Ok(value) => {
                self.commit(true)?;
                Ok(value)
            }
            Err(err) => {
                // a lost transaction already reset the depth
                if self.depth > 0 && !matches!(err, DriverError::TransactionLost { .. }) {
                    if let Err(rollback) = self.rollback(true) {
                        warn!(error = %rollback, "rollback after failed transaction body failed");
                    }
                }
                Err(err)
            }
        }
    }

    // ===================================================================
    // Retry loop
    // ===================================================================

    /// Runs a statement with the transaction state taken from the depth.
    pub(crate) fn run_statement(&mut self, sql: &str, params: &Params) -> Result<StatementHandle> {
        let in_transaction = self.depth > 0;
        self.run(sql, params, in_transaction)
    }

    /// Runs a statement until it succeeds or fails for good.
    ///
    /// `in_transaction` tells whether a failure would lose an open
    /// transaction. Commit and rollback pass the state from before they
    /// lowered the depth.
    fn run(&mut self, sql: &str, params: &Params, in_transaction: bool) -> Result<StatementHandle> {
        let (sql, values) = bind_params(self.dialect, sql, params)?;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let result = self.connection.execute(&sql, &values);
            self.observe(&sql, &values, started.elapsed(), &result);

            let err = match result {
                Ok(handle) => {
                    if handle.last_insert_id().is_some() {
                        self.last_insert_id = handle.last_insert_id();
                    }
                    return Ok(handle);
                }
                Err(err) => err,
            };
            error!(code = err.code.as_deref(), attempt, "{}", err.message);

            match err.failure(self.dialect) {
                Failure::LockContention if in_transaction => {
                    self.abandon_transaction();
                    return Err(DriverError::TransactionLost {
                        reason: format!("lock contention inside a transaction: {}", err.message),
                        source: err,
                    });
                }
                Failure::LockContention => {
                    warn!(attempt, "lock contention, retrying statement");
                }
                Failure::ConnectionLost => {
                    let ReconnectPolicy::Unbounded { interval } = self.reconnect else {
                        return Err(err.into());
                    };
                    self.reconnect_until_connected(interval);
                    if in_transaction {
                        return Err(DriverError::TransactionLost {
                            reason: String::from("Lost transaction during reconnect"),
                            source: err,
                        });
                    }
                }
                Failure::Other => return Err(err.into()),
            }
        }
    }

    /// Reconnects until the connector succeeds, pausing `interval` between
    /// attempts.
    fn reconnect_until_connected(&mut self, interval: Duration) {
        let mut attempt: u64 = 1;
        loop {
            info!(attempt, "Reconnecting db try #{attempt}");
            match self.connector.connect(&self.config) {
                Ok(connection) => {
                    self.connection = connection;
                    self.depth = 0;
                    return;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "reconnect failed");
                    attempt += 1;
                    thread::sleep(interval);
                }
            }
        }
    }

    /// Rolls back whatever the server still holds of a failed transaction
    /// and resets the depth.
    fn abandon_transaction(&mut self) {
        self.depth = 0;
        let started = Instant::now();
        let result = self.connection.execute("ROLLBACK", &[]);
        self.observe("ROLLBACK", &[], started.elapsed(), &result);
        if let Err(err) = result {
            debug!(error = %err, "rollback of lost transaction failed");
        }
    }

    fn observe(
        &self,
        sql: &str,
        params: &[SqlValue],
        elapsed: Duration,
        result: &std::result::Result<StatementHandle, DatabaseError>,
    ) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        debug!(sql, elapsed_ms, params = ?params, "query");
        let Some(monitor) = &self.monitor else {
            return;
        };
        let outcome = match result {
            Ok(handle) if handle.columns().is_empty() => QueryOutcome::Affected(handle.row_count()),
            Ok(handle) => QueryOutcome::Rows(handle.row_count()),
            Err(err) => QueryOutcome::Error(err.to_string()),
        };
        monitor.on_query(&QueryEvent {
            sql,
            params,
            elapsed,
            outcome: &outcome,
        });
    }
}
