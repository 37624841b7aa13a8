//! SQL Dialect support.
//!
//! MySQL, PostgreSQL and SQLite disagree on identifier quoting, string
//! escaping, upsert syntax, locking clauses and a handful of other details.
//! [`Dialect`] is the single place those differences are recorded; builders
//! branch on it when compiling.

use std::fmt;

/// How a dialect spells "insert, or update on conflict".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertSyntax {
    /// `ON DUPLICATE KEY UPDATE` (MySQL).
    OnDuplicateKey,
    /// `ON CONFLICT [(target)] DO UPDATE SET`.
    OnConflict {
        /// Whether a conflict target must be given.
        requires_target: bool,
    },
}

/// How a dialect spells "insert, skipping conflicting rows".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreSyntax {
    /// A statement prefix replacing `INSERT INTO`.
    Prefix(&'static str),
    /// A trailing clause after the VALUES list.
    Clause(&'static str),
}

/// The SQL syntax variant a statement is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// MySQL and MariaDB.
    MySql,
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Resolves a configuration driver name (`mysql`, `pgsql`, `sqlite`, ...).
    #[must_use]
    pub fn from_driver_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "pgsql" | "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the driver name of the dialect.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "pgsql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns the identifier quote character.
    #[must_use]
    pub const fn identifier_quote(self) -> char {
        match self {
            Self::MySql => '`',
            Self::Postgres | Self::Sqlite => '"',
        }
    }

    /// Returns whether the dialect supports a RETURNING clause.
    #[must_use]
    pub const fn supports_returning(self) -> bool {
        // SQLite 3.35.0+
        matches!(self, Self::Postgres | Self::Sqlite)
    }

    /// Returns the shared-lock clause, if the dialect has one.
    #[must_use]
    pub const fn shared_lock_clause(self) -> Option<&'static str> {
        match self {
            Self::MySql => Some("LOCK IN SHARE MODE"),
            Self::Postgres => Some("FOR SHARE"),
            Self::Sqlite => None,
        }
    }

    /// Returns whether `TRUNCATE` exists and may replace an unfiltered DELETE.
    #[must_use]
    pub const fn supports_truncate(self) -> bool {
        matches!(self, Self::MySql | Self::Postgres)
    }

    /// Returns whether TRUNCATE accepts more than one table.
    #[must_use]
    pub const fn truncates_many_tables(self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Returns the upsert syntax of the dialect.
    #[must_use]
    pub const fn upsert_syntax(self) -> UpsertSyntax {
        match self {
            Self::MySql => UpsertSyntax::OnDuplicateKey,
            Self::Postgres => UpsertSyntax::OnConflict {
                requires_target: true,
            },
            // The conflict target is optional on the last ON CONFLICT clause
            // since SQLite 3.35.0.
            Self::Sqlite => UpsertSyntax::OnConflict {
                requires_target: false,
            },
        }
    }

    /// Returns the REPLACE statement prefix, if the dialect has one.
    ///
    /// PostgreSQL has none; replace requests are routed through upsert.
    #[must_use]
    pub const fn replace_prefix(self) -> Option<&'static str> {
        match self {
            Self::MySql => Some("REPLACE INTO"),
            Self::Sqlite => Some("INSERT OR REPLACE INTO"),
            Self::Postgres => None,
        }
    }

    /// Returns how conflicting rows are skipped.
    #[must_use]
    pub const fn ignore_syntax(self) -> IgnoreSyntax {
        match self {
            Self::MySql => IgnoreSyntax::Prefix("INSERT IGNORE INTO"),
            Self::Sqlite => IgnoreSyntax::Prefix("INSERT OR IGNORE INTO"),
            Self::Postgres => IgnoreSyntax::Clause("ON CONFLICT DO NOTHING"),
        }
    }

    /// Returns whether UPDATE and DELETE accept ORDER BY and LIMIT.
    #[must_use]
    pub const fn supports_write_order_limit(self) -> bool {
        matches!(self, Self::MySql)
    }

    /// Returns the statement that opens a transaction.
    #[must_use]
    pub const fn begin_sql(self) -> &'static str {
        match self {
            Self::MySql => "START TRANSACTION",
            Self::Postgres | Self::Sqlite => "BEGIN",
        }
    }

    /// Returns the positional placeholder for the `n`th parameter (1-based).
    #[must_use]
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::MySql | Self::Sqlite => String::from("?"),
        }
    }

    /// Quotes a single identifier part, doubling embedded quote characters.
    ///
    /// `*` is passed through unquoted.
    #[must_use]
    pub fn quote_identifier(self, name: &str) -> String {
        if name == "*" {
            return String::from("*");
        }
        let quote = self.identifier_quote();
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(quote);
        for c in name.chars() {
            if c == quote {
                quoted.push(quote);
            }
            quoted.push(c);
        }
        quoted.push(quote);
        quoted
    }

    /// Quotes each present part and joins them with `.`.
    ///
    /// Absent parts are skipped, so `[None, Some("users"), Some("id")]`
    /// quotes to a two-part name.
    #[must_use]
    pub fn quote_parts(self, parts: &[Option<&str>]) -> String {
        parts
            .iter()
            .flatten()
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Escapes a string for use inside a single-quoted literal.
    ///
    /// The surrounding quotes are not added.
    #[must_use]
    pub fn escape_string(self, s: &str) -> String {
        let mut escaped = String::with_capacity(s.len());
        match self {
            // MySQL treats backslash as an escape character by default.
            Self::MySql => {
                for c in s.chars() {
                    match c {
                        '\0' => escaped.push_str("\\0"),
                        '\n' => escaped.push_str("\\n"),
                        '\r' => escaped.push_str("\\r"),
                        '\\' => escaped.push_str("\\\\"),
                        '\'' => escaped.push_str("\\'"),
                        '"' => escaped.push_str("\\\""),
                        '\x1a' => escaped.push_str("\\Z"),
                        _ => escaped.push(c),
                    }
                }
            }
            Self::Postgres | Self::Sqlite => {
                for c in s.chars() {
                    if c == '\'' {
                        escaped.push('\'');
                    }
                    escaped.push(c);
                }
            }
        }
        escaped
    }

    /// Returns the literal spelling of a boolean.
    #[must_use]
    pub const fn bool_literal(self, value: bool) -> &'static str {
        match (self, value) {
            (Self::Postgres, true) => "TRUE",
            (Self::Postgres, false) => "FALSE",
            (Self::MySql | Self::Sqlite, true) => "1",
            (Self::MySql | Self::Sqlite, false) => "0",
        }
    }

    /// Returns the literal spelling of a binary blob.
    #[must_use]
    pub fn blob_literal(self, bytes: &[u8]) -> String {
        let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
        match self {
            Self::Postgres => format!("'\\x{hex}'::bytea"),
            Self::MySql | Self::Sqlite => format!("X'{hex}'"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
