//! Error types for the driver.

use std::fmt;

use oxide_query::{ConfigErrorKind, Dialect, QueryError};

/// A failure reported by the database server or the transport below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    /// Vendor error code: the MySQL error number, the Postgres SQLSTATE,
    /// or the SQLite extended result code.
    pub code: Option<String>,
    /// Server or transport message.
    pub message: String,
    /// True when the failure happened below the SQL layer (socket, TLS,
    /// protocol) and the connection must be considered gone.
    pub transport: bool,
}

impl DatabaseError {
    /// Creates an error carrying a vendor code.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            transport: false,
        }
    }

    /// Creates an error without a vendor code.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            transport: false,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            transport: true,
        }
    }

    /// Classifies the error for the driver's retry loop.
    #[must_use]
    pub fn failure(&self, dialect: Dialect) -> Failure {
        if self.transport {
            return Failure::ConnectionLost;
        }
        let Some(code) = self.code.as_deref() else {
            return Failure::Other;
        };
        match dialect {
            Dialect::MySql => match code {
                "1213" | "1205" | "40001" => Failure::LockContention,
                "2006" | "2013" | "08S01" => Failure::ConnectionLost,
                _ => Failure::Other,
            },
            Dialect::Postgres => match code {
                "40P01" | "40001" | "55P03" => Failure::LockContention,
                "57P01" => Failure::ConnectionLost,
                _ if code.starts_with("08") => Failure::ConnectionLost,
                _ => Failure::Other,
            },
            // extended codes carry the primary code in the low byte
            Dialect::Sqlite => match code.parse::<i64>().map(|code| code & 0xff) {
                Ok(5 | 6) => Failure::LockContention,
                _ => Failure::Other,
            },
        }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DatabaseError {}

/// How the driver reacts to a failed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Deadlock, lock wait timeout or a busy database file.
    LockContention,
    /// The connection to the server is gone.
    ConnectionLost,
    /// Anything else; propagated unchanged.
    Other,
}

/// Errors returned by the driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Statement building or compilation failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The open transaction could not survive a failure; the caller has to
    /// restart it from `begin()`.
    #[error("transaction lost: {reason}")]
    TransactionLost {
        /// Why the transaction was abandoned.
        reason: String,
        /// The failure that ended it.
        #[source]
        source: DatabaseError,
    },

    /// `commit` or `rollback` was called with no open transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// A database failure that the driver did not recover from.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A named placeholder has no bound value.
    #[error("missing value for parameter :{0}")]
    MissingParameter(String),

    /// A fetch referenced a column the result does not have.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A fetch request cannot be answered.
    #[error("invalid fetch: {0}")]
    InvalidFetch(String),

    /// Reading the connection configuration failed.
    #[error("invalid connection configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl DriverError {
    /// Creates an `InvalidConfig` configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::Query(QueryError::config(ConfigErrorKind::InvalidConfig, message))
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
