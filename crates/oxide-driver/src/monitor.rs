//! Statement monitoring.
//!
//! A [`QueryMonitor`] sees every attempt the driver makes, including the
//! transaction statements and the attempts that a retry replaces. Monitors
//! only observe; nothing they do changes how a statement is handled.

use std::time::Duration;

use oxide_query::SqlValue;
use tracing::Level;

/// How a statement attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The statement returned rows.
    Rows(u64),
    /// The statement affected rows.
    Affected(u64),
    /// The statement failed.
    Error(String),
}

/// One statement attempt.
#[derive(Debug, Clone, Copy)]
pub struct QueryEvent<'a> {
    /// SQL text as sent to the connection.
    pub sql: &'a str,
    /// Positional parameters bound to it.
    pub params: &'a [SqlValue],
    pub elapsed: Duration,
    pub outcome: &'a QueryOutcome,
}

/// Receives an event for every statement attempt.
pub trait QueryMonitor: Send + Sync {
    fn on_query(&self, event: &QueryEvent<'_>);
}

impl<F> QueryMonitor for F
where
    F: Fn(&QueryEvent<'_>) + Send + Sync,
{
    fn on_query(&self, event: &QueryEvent<'_>) {
        self(event);
    }
}

/// Forwards monitor events to `tracing`.
///
/// Statements slower than `slow_threshold` are reported at WARN regardless
/// of the configured level.
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in chars). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    pub slow_threshold: Option<Duration>,
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            max_sql_length: Some(200),
            slow_threshold: None,
        }
    }
}

impl TracingMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    #[must_use]
    pub const fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Report statements slower than `threshold` at WARN.
    #[must_use]
    pub const fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.chars().count() > max => {
                format!("{}...", sql.chars().take(max).collect::<String>())
            }
            _ => String::from(sql),
        }
    }
}

impl QueryMonitor for TracingMonitor {
    fn on_query(&self, event: &QueryEvent<'_>) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN => tracing::warn!($($field)*),
                    Level::INFO => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let slow = self
            .slow_threshold
            .is_some_and(|threshold| event.elapsed >= threshold);
        let level = if slow { Level::WARN } else { self.level };
        let sql = self.truncate_sql(event.sql);
        let elapsed_ms = u64::try_from(event.elapsed.as_millis()).unwrap_or(u64::MAX);
        match event.outcome {
            QueryOutcome::Rows(rows) => emit_at_level!(
                level,
                target: "oxide_driver.sql",
                sql = %sql,
                param_count = event.params.len(),
                elapsed_ms,
                rows,
                slow,
            ),
            QueryOutcome::Affected(affected) => emit_at_level!(
                level,
                target: "oxide_driver.sql",
                sql = %sql,
                param_count = event.params.len(),
                elapsed_ms,
                affected,
                slow,
            ),
            QueryOutcome::Error(error) => emit_at_level!(
                level,
                target: "oxide_driver.sql",
                sql = %sql,
                param_count = event.params.len(),
                elapsed_ms,
                error = %error,
                slow,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_truncate_sql() {
        let monitor = TracingMonitor::new().max_sql_length(6);
        assert_eq!(monitor.truncate_sql("SELECT 1"), "SELECT...");
        assert_eq!(monitor.truncate_sql("SELECT"), "SELECT");
    }

    #[test]
    fn test_closure_monitor() {
        let seen = AtomicUsize::new(0);
        let monitor = |event: &QueryEvent<'_>| {
            assert_eq!(event.sql, "SELECT 1");
            seen.fetch_add(1, Ordering::SeqCst);
        };
        let outcome = QueryOutcome::Rows(1);
        monitor.on_query(&QueryEvent {
            sql: "SELECT 1",
            params: &[],
            elapsed: Duration::ZERO,
            outcome: &outcome,
        });
        TracingMonitor::new().on_query(&QueryEvent {
            sql: "SELECT 1",
            params: &[],
            elapsed: Duration::ZERO,
            outcome: &outcome,
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
