//! End-to-end against an in-memory SQLite database through sqlx.

use oxide_driver::{
    ConnectionConfig, Driver, ExecuteExt, FetchRequest, Fetched, Grouped, Paginator,
};
use oxide_query::{Condition, Dialect, Statement, SqlValue, Value};

fn open() -> Driver {
    let mut driver = Driver::open(ConnectionConfig::new("sqlite")).unwrap();
    assert_eq!(driver.dialect(), Dialect::Sqlite);
    driver
        .exec(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, team TEXT)",
            (),
        )
        .unwrap();
    driver
}

fn add_user(driver: &mut Driver, name: &str, team: &str) -> i64 {
    let insert = driver
        .insert()
        .into_table("users")
        .unwrap()
        .values([("name", Value::from(name)), ("team", Value::from(team))])
        .unwrap();
    driver.execute(&insert).unwrap();
    driver.last_insert_id(None, None).unwrap().unwrap()
}

fn count(driver: &mut Driver) -> i64 {
    driver
        .select_row("SELECT COUNT(*) AS n FROM users", ())
        .unwrap()
        .unwrap()
        .get_i64("n")
        .unwrap()
}

// ===================================================================
// Statements
// ===================================================================

#[test]
fn insert_and_select() {
    let mut driver = open();
    assert_eq!(add_user(&mut driver, "ann", "red"), 1);
    assert_eq!(add_user(&mut driver, "bob", "blue"), 2);

    let select = driver
        .select()
        .from("users")
        .unwrap()
        .where_clause(Condition::eq("team", "blue"));
    let rows = driver.execute(&select).unwrap().fetch_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("name"), Some("bob"));
    assert_eq!(rows[0].get_i64("id"), Some(2));
}

#[test]
fn named_parameters_bind() {
    let mut driver = open();
    add_user(&mut driver, "ann", "red");

    let row = driver
        .select_row(
            "SELECT name FROM users WHERE id = :id AND name <> ':id'",
            vec![(String::from("id"), SqlValue::Int(1))],
        )
        .unwrap()
        .unwrap();
    assert_eq!(row.get_str("name"), Some("ann"));

    let updated = driver
        .exec(
            "UPDATE users SET team = ? WHERE name = ?",
            vec![
                SqlValue::Null,
                SqlValue::Text(String::from("ann")),
            ],
        )
        .unwrap();
    assert_eq!(updated, 1);
    let team = driver
        .query("SELECT team FROM users", ())
        .unwrap()
        .fetch(FetchRequest::Column("team".into()))
        .unwrap();
    assert_eq!(team, Fetched::Value(Some(SqlValue::Null)));
}

#[test]
fn delete_with_truncate_falls_back_to_delete() {
    let mut driver = open();
    add_user(&mut driver, "ann", "red");
    add_user(&mut driver, "bob", "red");

    let delete = driver.delete().from("users").unwrap().truncate(true);
    assert_eq!(delete.to_sql().unwrap(), "DELETE FROM \"users\"");
    driver.execute(&delete).unwrap();
    assert_eq!(count(&mut driver), 0);
}

#[test]
fn errors_carry_the_vendor_message() {
    let mut driver = open();
    let err = driver.exec("SELECT * FROM missing", ()).unwrap_err();
    assert!(err.to_string().contains("missing"));
    assert_eq!(driver.transaction_depth(), 0);
}

// ===================================================================
// Transactions
// ===================================================================

#[test]
fn savepoint_rollback_keeps_outer_work() {
    let mut driver = open();

    driver
        .transaction(|db| {
            add_user(db, "outer", "red");
            let inner: oxide_driver::Result<()> = db.transaction(|db| {
                add_user(db, "inner", "red");
                Err(oxide_driver::DriverError::InvalidFetch(String::from("abort")))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

    let names = driver
        .select_all("SELECT name FROM users", ())
        .unwrap()
        .iter()
        .map(|row| row.get_str("name").unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, ["outer"]);
}

#[test]
fn rollback_discards_everything() {
    let mut driver = open();
    driver.begin(true).unwrap();
    add_user(&mut driver, "ann", "red");
    driver.begin(true).unwrap();
    add_user(&mut driver, "bob", "red");
    driver.commit(true).unwrap();
    driver.rollback(true).unwrap();
    assert_eq!(count(&mut driver), 0);
}

// ===================================================================
// Results
// ===================================================================

#[test]
fn keyed_fetch_and_pagination() {
    let mut driver = open();
    for (name, team) in [("ann", "red"), ("bob", "blue"), ("cid", "red"), ("dan", "red")] {
        add_user(&mut driver, name, team);
    }

    let keyed = driver
        .query("SELECT team, name FROM users ORDER BY id", ())
        .unwrap()
        .fetch(FetchRequest::keyed_by("team"))
        .unwrap();
    let Fetched::Keyed(map) = keyed else {
        panic!("expected keyed result");
    };
    let Some(Grouped::Row(red)) = map.get("red") else {
        panic!("expected a row for red");
    };
    assert_eq!(red.get_str("name"), Some("dan"));

    let select = driver.select().from("users").unwrap().order_by(&["id"]);
    let page = Paginator::new(select.clone())
        .limit(3)
        .page(2)
        .paginate(&mut driver)
        .unwrap();
    assert_eq!(page.total_items, 4);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].get_str("name"), Some("dan"));

    let mut result = select.execute(&mut driver).unwrap();
    assert_eq!(result.last().unwrap().unwrap().get_str("name"), Some("dan"));
    assert_eq!(result.first().unwrap().unwrap().get_str("name"), Some("ann"));
}
