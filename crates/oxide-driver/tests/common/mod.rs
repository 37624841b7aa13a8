//! A scripted in-memory connector for driver tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use oxide_driver::{
    Connection, ConnectionConfig, Connector, DatabaseError, Driver, QueryEvent, QueryOutcome,
    StatementHandle,
};
use oxide_query::SqlValue;

#[derive(Default)]
struct Script {
    log: Vec<(String, Vec<SqlValue>)>,
    /// Row responses by SQL fragment; the latest match wins.
    responses: Vec<(String, Vec<String>, Vec<Vec<SqlValue>>)>,
    /// One-shot failures by SQL fragment.
    failures: VecDeque<(String, DatabaseError)>,
    connect_failures: u32,
    connects: u32,
    next_insert_id: Option<i64>,
}

/// Shared state behind every connection the mock connector opens.
#[derive(Clone, Default)]
pub struct MockDb {
    script: Arc<Mutex<Script>>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements containing `fragment` return these rows.
    pub fn respond(&self, fragment: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) {
        self.script.lock().unwrap().responses.push((
            fragment.to_string(),
            columns.iter().map(ToString::to_string).collect(),
            rows,
        ));
    }

    /// The next statement containing `fragment` fails with `err`.
    pub fn fail_once(&self, fragment: &str, err: DatabaseError) {
        self.script
            .lock()
            .unwrap()
            .failures
            .push_back((fragment.to_string(), err));
    }

    /// The next `count` connection attempts are refused.
    pub fn refuse_connects(&self, count: u32) {
        self.script.lock().unwrap().connect_failures = count;
    }

    pub fn set_insert_id(&self, id: i64) {
        self.script.lock().unwrap().next_insert_id = Some(id);
    }

    /// SQL text of every statement attempt, in order.
    pub fn log(&self) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .log
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    /// Parameters of the last statement attempt.
    pub fn last_params(&self) -> Vec<SqlValue> {
        self.script
            .lock()
            .unwrap()
            .log
            .last()
            .map(|(_, params)| params.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, sql: &str) -> usize {
        self.log().iter().filter(|logged| logged.as_str() == sql).count()
    }

    pub fn clear_log(&self) {
        self.script.lock().unwrap().log.clear();
    }

    pub fn connects(&self) -> u32 {
        self.script.lock().unwrap().connects
    }

    /// Opens a driver for `driver_name` on this database.
    pub fn driver(&self, driver_name: &str) -> Driver {
        Driver::connect(
            ConnectionConfig::new(driver_name),
            MockConnector { db: self.clone() },
        )
        .unwrap()
    }
}

struct MockConnector {
    db: MockDb,
}

impl Connector for MockConnector {
    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>, DatabaseError> {
        let mut script = self.db.script.lock().unwrap();
        script.connects += 1;
        if script.connect_failures > 0 {
            script.connect_failures -= 1;
            return Err(DatabaseError::transport("connection refused"));
        }
        Ok(Box::new(MockConnection {
            db: self.db.clone(),
        }))
    }
}

struct MockConnection {
    db: MockDb,
}

impl Connection for MockConnection {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<StatementHandle, DatabaseError> {
        let mut script = self.db.script.lock().unwrap();
        script.log.push((sql.to_string(), params.to_vec()));
        if let Some(index) = script
            .failures
            .iter()
            .position(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            let (_, err) = script.failures.remove(index).unwrap();
            return Err(err);
        }
        let response = script
            .responses
            .iter()
            .rev()
            .find(|(fragment, _, _)| sql.contains(fragment.as_str()))
            .map(|(_, columns, rows)| StatementHandle::with_rows(columns.clone(), rows.clone()));
        if let Some(handle) = response {
            return Ok(handle);
        }
        let insert_id = if sql.starts_with("INSERT") {
            script.next_insert_id.take()
        } else {
            None
        };
        Ok(StatementHandle::affected(1, insert_id))
    }
}

/// Records monitor events as `(sql, failed)`.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<(String, bool)>>>,
}

impl Recorder {
    pub fn monitor(&self) -> Arc<dyn oxide_driver::QueryMonitor> {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &QueryEvent<'_>| {
            let failed = matches!(event.outcome, QueryOutcome::Error(_));
            events.lock().unwrap().push((event.sql.to_string(), failed));
        })
    }

    pub fn events(&self) -> Vec<(String, bool)> {
        self.events.lock().unwrap().clone()
    }
}

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

pub fn named(pairs: &[(&str, SqlValue)]) -> Vec<(String, SqlValue)> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}
