//! Failure classification, retry and reconnect.

mod common;
use common::*;

use std::time::Duration;

use oxide_driver::{DatabaseError, DriverError, ReconnectPolicy};

fn unbounded() -> ReconnectPolicy {
    ReconnectPolicy::Unbounded {
        interval: Duration::ZERO,
    }
}

// ===================================================================
// Lock contention
// ===================================================================

#[test]
fn deadlock_outside_transaction_is_retried() {
    let db = MockDb::new();
    let recorder = Recorder::default();
    let mut driver = db.driver("mysql").with_monitor(recorder.monitor());
    db.fail_once("UPDATE", DatabaseError::new("1213", "Deadlock found"));

    let affected = driver.exec("UPDATE stock SET qty = qty - 1", ()).unwrap();

    assert_eq!(affected, 1);
    assert_eq!(db.count("UPDATE stock SET qty = qty - 1"), 2);
    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert!(events[0].1, "first attempt fails");
    assert!(!events[1].1, "second attempt succeeds");
}

#[test]
fn deadlock_inside_transaction_loses_it() {
    let db = MockDb::new();
    let mut driver = db.driver("mysql");
    driver.begin(true).unwrap();
    driver.begin(true).unwrap();
    db.fail_once("UPDATE", DatabaseError::new("1213", "Deadlock found"));

    let err = driver
        .exec("UPDATE stock SET qty = qty - 1", ())
        .unwrap_err();

    assert!(matches!(err, DriverError::TransactionLost { .. }));
    assert_eq!(db.count("UPDATE stock SET qty = qty - 1"), 1);
    assert_eq!(driver.transaction_depth(), 0);
    assert_eq!(db.log().last().map(String::as_str), Some("ROLLBACK"));
    // the caller restarts from begin()
    assert!(matches!(
        driver.commit(true),
        Err(DriverError::NoActiveTransaction)
    ));
}

#[test]
fn lock_wait_timeout_reason_carries_the_server_message() {
    let db = MockDb::new();
    let mut driver = db.driver("mysql");
    driver.begin(true).unwrap();
    db.fail_once("UPDATE", DatabaseError::new("1205", "Lock wait timeout exceeded"));

    let err = driver.exec("UPDATE stock SET qty = 0", ()).unwrap_err();

    let DriverError::TransactionLost { reason, .. } = err else {
        panic!("expected a lost transaction");
    };
    assert!(reason.contains("Lock wait timeout exceeded"));
    assert!(!reason.contains("Deadlock"));
}

#[test]
fn postgres_serialization_failure_inside_transaction() {
    let db = MockDb::new();
    let mut driver = db.driver("pgsql");
    driver.begin(true).unwrap();
    db.fail_once("SELECT", DatabaseError::new("40001", "could not serialize access"));
    let err = driver.select_row("SELECT 1", ()).unwrap_err();
    assert!(matches!(
        err,
        DriverError::TransactionLost { source, .. } if source.code.as_deref() == Some("40001")
    ));
}

#[test]
fn failed_commit_is_not_replayed() {
    let db = MockDb::new();
    let mut driver = db.driver("pgsql");
    driver.begin(true).unwrap();
    db.fail_once("COMMIT", DatabaseError::new("40P01", "deadlock detected"));
    assert!(matches!(
        driver.commit(true),
        Err(DriverError::TransactionLost { .. })
    ));
    assert_eq!(db.count("COMMIT"), 1);
    assert_eq!(driver.transaction_depth(), 0);
}

#[test]
fn sqlite_busy_is_retried() {
    let db = MockDb::new();
    let mut driver = db.driver("sqlite");
    db.fail_once("INSERT", DatabaseError::new("517", "database is locked"));
    driver.exec("INSERT INTO t (a) VALUES (1)", ()).unwrap();
    assert_eq!(db.count("INSERT INTO t (a) VALUES (1)"), 2);
}

// ===================================================================
// Connection loss
// ===================================================================

#[test]
fn connection_loss_propagates_without_reconnect() {
    let db = MockDb::new();
    let mut driver = db.driver("mysql");
    db.fail_once("SELECT", DatabaseError::new("2006", "MySQL server has gone away"));

    let err = driver.select_all("SELECT * FROM t", ()).unwrap_err();

    assert!(matches!(
        err,
        DriverError::Database(DatabaseError { code: Some(code), .. }) if code == "2006"
    ));
    assert_eq!(db.connects(), 1);
}

#[test]
fn reconnect_then_retry_outside_transaction() {
    let db = MockDb::new();
    let mut driver = db.driver("pgsql").with_reconnect(unbounded());
    db.fail_once("SELECT", DatabaseError::transport("broken pipe"));
    db.refuse_connects(2);

    let rows = driver.select_all("SELECT * FROM t", ()).unwrap();

    assert!(rows.is_empty());
    // initial connect, two refusals, one success
    assert_eq!(db.connects(), 4);
    assert_eq!(db.count("SELECT * FROM t"), 2);
}

#[test]
fn reconnect_inside_transaction_loses_it() {
    let db = MockDb::new();
    let mut driver = db.driver("pgsql").with_reconnect(unbounded());
    driver.begin(true).unwrap();
    db.fail_once("UPDATE", DatabaseError::new("57P01", "terminating connection"));

    let err = driver.exec("UPDATE t SET a = 1", ()).unwrap_err();

    assert!(matches!(err, DriverError::TransactionLost { .. }));
    assert_eq!(db.connects(), 2);
    assert_eq!(db.count("UPDATE t SET a = 1"), 1);
    assert_eq!(driver.transaction_depth(), 0);
}

#[test]
fn explicit_reconnect_resets_depth() {
    let db = MockDb::new();
    let mut driver = db.driver("mysql");
    driver.begin(true).unwrap();
    driver.reconnect().unwrap();
    assert_eq!(driver.transaction_depth(), 0);
    assert_eq!(db.connects(), 2);
}

// ===================================================================
// Everything else
// ===================================================================

#[test]
fn other_errors_propagate_unchanged() {
    let db = MockDb::new();
    let mut driver = db.driver("mysql").with_reconnect(unbounded());
    db.fail_once("INSERT", DatabaseError::new("1062", "Duplicate entry"));

    let err = driver.exec("INSERT INTO u (email) VALUES ('a')", ()).unwrap_err();

    assert!(matches!(err, DriverError::Database(_)));
    assert_eq!(db.count("INSERT INTO u (email) VALUES ('a')"), 1);
    assert_eq!(db.connects(), 1);
}
