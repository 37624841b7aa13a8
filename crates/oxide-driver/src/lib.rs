//! # oxide-driver
//!
//! A blocking database driver for the statements built with `oxide-query`.
//!
//! The driver keeps one connection, nests transactions through savepoints
//! and recovers from the failures it can recover from:
//!
//! - deadlocks and lock timeouts outside a transaction are retried;
//! - a dropped connection is re-established under
//!   [`ReconnectPolicy::Unbounded`];
//! - either failure inside a transaction ends it with
//!   [`DriverError::TransactionLost`] so the caller can start over.
//!
//! ```no_run
//! use oxide_driver::{ConnectionConfig, Driver, ExecuteExt, FetchRequest, Fetched};
//! use oxide_query::Condition;
//!
//! let config = ConnectionConfig::from_json(r#"{"driver": "sqlite", "path": "app.db"}"#)?;
//! let mut driver = Driver::open(config)?;
//!
//! driver.transaction(|db| {
//!     db.insert()
//!         .into_table("users")?
//!         .values([("name", "ann"), ("role", "admin")])?
//!         .execute(db)?;
//!     Ok(())
//! })?;
//!
//! let admins = driver
//!     .select()
//!     .from("users")?
//!     .where_clause(Condition::eq("role", "admin"));
//! if let Fetched::Keyed(by_name) = admins.execute(&mut driver)?.fetch(FetchRequest::keyed_by("name"))? {
//!     println!("{} admins", by_name.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod execute;
pub mod monitor;
pub mod paginate;
pub mod params;
pub mod result_set;
pub mod sqlx_backend;

pub use config::{ConnectionConfig, ReconnectPolicy};
pub use connection::{Connection, Connector, Row, StatementHandle};
pub use driver::Driver;
pub use error::{DatabaseError, DriverError, Failure, Result};
pub use execute::ExecuteExt;
pub use monitor::{QueryEvent, QueryMonitor, QueryOutcome, TracingMonitor};
pub use paginate::{Page, Paginator};
pub use result_set::{ColumnRef, FetchRequest, Fetched, FromRow, Grouped, ResultSet};
pub use sqlx_backend::SqlxConnector;
