//! Error types for statement building and compilation.

use std::fmt;

use crate::dialect::Dialect;

/// The reason a builder's configuration was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// A target table, source, or value set is missing.
    MissingRequiredState,
    /// PostgreSQL upserts need an explicit conflict target.
    MissingConflictTarget,
    /// Insert value sets do not share the same columns.
    HeterogeneousValueSets,
    /// A statement was built for one dialect and executed on another.
    DialectMismatch,
    /// A connection configuration entry is invalid.
    InvalidConfig,
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingRequiredState => "missing required state",
            Self::MissingConflictTarget => "missing conflict target",
            Self::HeterogeneousValueSets => "heterogeneous value sets",
            Self::DialectMismatch => "dialect mismatch",
            Self::InvalidConfig => "invalid configuration",
        };
        f.write_str(name)
    }
}

/// Errors raised while configuring or compiling a statement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// A malformed identifier, e.g. an empty name.
    #[error("invalid identifier: {0}")]
    Validation(String),

    /// Required builder state is missing or inconsistent.
    #[error("configuration error ({kind}): {message}")]
    Configuration {
        /// What kind of configuration problem this is.
        kind: ConfigErrorKind,
        /// Human-readable detail.
        message: String,
    },

    /// The dialect has no syntax for the requested feature.
    #[error("{feature} is not supported by the {dialect} dialect")]
    UnsupportedFeature {
        /// The feature that was requested.
        feature: &'static str,
        /// The dialect that lacks it.
        dialect: Dialect,
    },

    /// The requested operation is ambiguous or cannot be expressed.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl QueryError {
    /// Creates a configuration error.
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self::Configuration {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `MissingRequiredState` configuration error.
    pub fn missing(message: impl Into<String>) -> Self {
        Self::config(ConfigErrorKind::MissingRequiredState, message)
    }

    /// Creates an unsupported-feature error.
    #[must_use]
    pub const fn unsupported(feature: &'static str, dialect: Dialect) -> Self {
        Self::UnsupportedFeature { feature, dialect }
    }

    /// Returns the configuration error kind, if this is one.
    #[must_use]
    pub const fn config_kind(&self) -> Option<ConfigErrorKind> {
        match self {
            Self::Configuration { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for building and compiling statements.
pub type Result<T> = std::result::Result<T, QueryError>;
