//! Running built statements directly.

use oxide_query::Statement;

use crate::driver::Driver;
use crate::error::Result;
use crate::result_set::ResultSet;

/// Adds `execute(&mut driver)` to every statement builder.
///
/// ```no_run
/// use oxide_driver::{ConnectionConfig, Driver, ExecuteExt, SqlxConnector};
///
/// let mut driver = Driver::connect(ConnectionConfig::new("sqlite"), SqlxConnector::new())?;
/// let select = driver.select().from("users")?.where_eq("active", true);
/// let users = select.execute(&mut driver)?.fetch_all()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait ExecuteExt: Statement {
    /// Compiles the statement and runs it on `driver`.
    ///
    /// # Errors
    ///
    /// Fails with a `DialectMismatch` configuration error when the statement
    /// was built for another dialect than the driver's.
    fn execute<'d>(&self, driver: &'d mut Driver) -> Result<ResultSet<'d>> {
        driver.execute(self)
    }
}

impl<S: Statement + ?Sized> ExecuteExt for S {}
