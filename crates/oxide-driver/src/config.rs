//! Connection configuration.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use oxide_query::Dialect;
use serde::Deserialize;

use crate::error::{DriverError, Result};

/// Keys that name the server location rather than a connection parameter.
const LOCATION_KEYS: [&str; 5] = ["host", "port", "dbname", "database", "path"];

/// How to connect: driver name, credentials, driver options and free-form
/// connection parameters.
///
/// ```
/// use oxide_driver::ConnectionConfig;
///
/// let config = ConnectionConfig::from_json(
///     r#"{"driver": "pgsql", "host": "db", "dbname": "app", "user": "svc", "auth": "s3cret"}"#,
/// )
/// .unwrap();
/// assert_eq!(config.to_url().unwrap(), "postgres://svc:s3cret@db/app");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// `mysql`, `pgsql` or `sqlite` (aliases `postgres`, `postgresql`).
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default, alias = "username")]
    pub user: Option<String>,
    #[serde(default, alias = "auth")]
    pub password: Option<String>,
    /// Driver option overrides, appended to the connection URL.
    #[serde(default, deserialize_with = "deserialize_params")]
    pub options: BTreeMap<String, String>,
    /// Every other key, passed through as a connection parameter.
    #[serde(flatten, deserialize_with = "deserialize_params")]
    pub params: BTreeMap<String, String>,
}

fn default_driver() -> String {
    String::from("mysql")
}

/// Accepts numbers and booleans as values (`"port": 5432`).
fn deserialize_params<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

impl ConnectionConfig {
    /// Creates a configuration for `driver` with no parameters.
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            user: None,
            password: None,
            options: BTreeMap::new(),
            params: BTreeMap::new(),
        }
    }

    /// Parses a configuration from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when the text is not a valid object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfig` error when the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DriverError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Sets a connection parameter.
    #[must_use]
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.insert(String::from(key), value.to_string());
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, user: &str, password: Option<&str>) -> Self {
        self.user = Some(String::from(user));
        self.password = password.map(String::from);
        self
    }

    /// Resolves the dialect from the driver name.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfig` error for unknown driver names.
    pub fn dialect(&self) -> Result<Dialect> {
        Dialect::from_driver_name(&self.driver).ok_or_else(|| {
            DriverError::invalid_config(format!("unknown driver: {}", self.driver))
        })
    }

    /// Builds the connection URL understood by sqlx.
    ///
    /// SQLite takes `path` (or `dbname`) and defaults to an in-memory
    /// database. Parameters other than the location keys and every driver
    /// option become query-string pairs.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfig` error for unknown driver names.
    pub fn to_url(&self) -> Result<String> {
        let dialect = self.dialect()?;
        let mut url = match dialect {
            Dialect::Sqlite => {
                match self.params.get("path").or_else(|| self.params.get("dbname")) {
                    Some(path) if path != ":memory:" => format!("sqlite://{path}"),
                    _ => String::from("sqlite::memory:"),
                }
            }
            Dialect::MySql | Dialect::Postgres => {
                let scheme = if dialect == Dialect::MySql {
                    "mysql"
                } else {
                    "postgres"
                };
                let mut url = format!("{scheme}://");
                if let Some(user) = &self.user {
                    url.push_str(&percent_encode(user));
                    if let Some(password) = &self.password {
                        url.push(':');
                        url.push_str(&percent_encode(password));
                    }
                    url.push('@');
                }
                url.push_str(self.params.get("host").map_or("localhost", String::as_str));
                if let Some(port) = self.params.get("port") {
                    let _ = write!(url, ":{port}");
                }
                if let Some(db) = self.params.get("dbname").or_else(|| self.params.get("database")) {
                    url.push('/');
                    url.push_str(&percent_encode(db));
                }
                url
            }
        };

        let query = self
            .params
            .iter()
            .filter(|(key, _)| !LOCATION_KEYS.contains(&key.as_str()))
            .chain(&self.options)
            .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
            .collect::<Vec<_>>();
        if !query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query.join("&"));
        }
        Ok(url)
    }
}

fn percent_encode(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

/// What the driver does when the connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Connection loss is returned to the caller.
    #[default]
    Disabled,
    /// Reconnect until it succeeds, waiting `interval` between attempts.
    /// Blocks the caller for as long as the server stays away.
    Unbounded {
        /// Pause between reconnect attempts.
        interval: Duration,
    },
}

impl ReconnectPolicy {
    /// Unbounded reconnection with a one-second pause.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::Unbounded {
            interval: Duration::from_secs(1),
        }
    }
}
