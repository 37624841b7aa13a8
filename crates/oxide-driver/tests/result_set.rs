//! Cursor navigation and fetch modes.

mod common;
use common::*;

use std::collections::BTreeMap;

use oxide_driver::{
    ColumnRef, DriverError, FetchRequest, Fetched, FromRow, Grouped, Row,
};
use oxide_query::{
    Condition, ConfigErrorKind, Dialect, Params, QueryError, Select, SqlValue, Value,
};

const USERS: &str = "SELECT * FROM users";

fn users_db() -> MockDb {
    let db = MockDb::new();
    db.respond(
        USERS,
        &["id", "team", "role", "name"],
        vec![
            vec![SqlValue::Int(1), text("red"), text("dev"), text("ann")],
            vec![SqlValue::Int(2), text("red"), text("ops"), text("bob")],
            vec![SqlValue::Int(3), text("blue"), text("dev"), text("cid")],
            vec![SqlValue::Int(4), text("red"), text("dev"), text("dan")],
        ],
    );
    db
}

fn name(row: &Row) -> &str {
    row.get_str("name").unwrap()
}

// ===================================================================
// Navigation
// ===================================================================

#[test]
fn next_walks_forward_without_reexecuting() {
    let db = users_db();
    let mut driver = db.driver("mysql");
    let mut result = driver.query(USERS, ()).unwrap();

    assert_eq!(result.row_count(), 4);
    assert_eq!(name(&result.next().unwrap().unwrap()), "ann");
    assert_eq!(name(&result.current().unwrap().unwrap()), "bob");
    assert_eq!(name(&result.current().unwrap().unwrap()), "bob");
    assert_eq!(name(&result.next().unwrap().unwrap()), "bob");
    result.seek(3);
    assert_eq!(name(&result.next().unwrap().unwrap()), "dan");
    assert!(result.next().unwrap().is_none());
    drop(result);

    assert_eq!(db.count(USERS), 1);
}

#[test]
fn seeking_backwards_reexecutes() {
    let db = users_db();
    let mut driver = db.driver("mysql");
    let mut result = driver.query(USERS, ()).unwrap();

    result.seek(2);
    assert_eq!(name(&result.current().unwrap().unwrap()), "cid");
    result.seek(0);
    assert_eq!(name(&result.current().unwrap().unwrap()), "ann");
    assert_eq!(result.position(), 0);
    drop(result);

    assert_eq!(db.count(USERS), 2);
}

#[test]
fn positional_access_out_of_range_is_none() {
    let db = users_db();
    let mut driver = db.driver("pgsql");
    let mut result = driver.query(USERS, ()).unwrap();

    assert!(result.exists(3));
    assert!(!result.exists(4));
    assert!(result.row_at(4).unwrap().is_none());
    assert!(result.row_at(100).unwrap().is_none());
    assert_eq!(name(&result.row_at(1).unwrap().unwrap()), "bob");
    // positional access leaves the cursor where it was
    assert_eq!(result.position(), 0);
}

#[test]
fn statements_without_rows_have_no_positions() {
    let db = MockDb::new();
    let mut driver = db.driver("mysql");
    let mut result = driver.query("UPDATE users SET team = 'red'", ()).unwrap();

    assert_eq!(result.row_count(), 1);
    assert!(!result.exists(0));
    assert!(result.row_at(0).unwrap().is_none());
    assert!(result.next().unwrap().is_none());
}

#[test]
fn first_last_and_maps() {
    let db = users_db();
    let mut driver = db.driver("sqlite");
    let mut result = driver.query(USERS, ()).unwrap();

    assert_eq!(name(&result.last().unwrap().unwrap()), "dan");
    assert_eq!(name(&result.first().unwrap().unwrap()), "ann");
    let maps = result.to_maps().unwrap();
    assert_eq!(maps.len(), 4);
    assert_eq!(maps[2].get("team"), Some(&text("blue")));
}

#[test]
fn reexecute_resets_position() {
    let db = users_db();
    let mut driver = db.driver("mysql");
    let mut result = driver.query(USERS, ()).unwrap();
    result.fetch_all().unwrap();
    assert_eq!(result.sql(), USERS);
    assert_eq!(result.params(), &Params::None);

    result.reexecute().unwrap();
    assert_eq!(result.position(), 0);
    assert_eq!(result.fetch_all().unwrap().len(), 4);
    drop(result);
    assert_eq!(db.count(USERS), 2);
}

// ===================================================================
// Fetch modes
// ===================================================================

#[test]
fn keyed_fetch_last_row_wins() {
    let db = users_db();
    let mut driver = db.driver("mysql");
    let fetched = driver
        .query(USERS, ())
        .unwrap()
        .fetch(FetchRequest::KeyedBy {
            columns: vec![String::from("team")],
            value_column: Some(String::from("name")),
            add_prefix: true,
        })
        .unwrap();

    let Fetched::Keyed(map) = fetched else {
        panic!("expected keyed result");
    };
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("team_red"), Some(&Grouped::Value(text("dan"))));
    assert_eq!(map.get("team_blue"), Some(&Grouped::Value(text("cid"))));
}

#[test]
fn keyed_fetch_nests_composite_keys() {
    let db = users_db();
    let mut driver = db.driver("mysql");
    let fetched = driver
        .query(USERS, ())
        .unwrap()
        .fetch(FetchRequest::KeyedBy {
            columns: vec![String::from("team"), String::from("role")],
            value_column: None,
            add_prefix: false,
        })
        .unwrap();

    let Fetched::Keyed(map) = fetched else {
        panic!("expected keyed result");
    };
    let Some(Grouped::Nested(red)) = map.get("red") else {
        panic!("expected nested group for red");
    };
    assert_eq!(red.len(), 2);
    let Some(Grouped::Row(dev)) = red.get("dev") else {
        panic!("expected row for red/dev");
    };
    assert_eq!(name(dev), "dan");
}

#[test]
fn keyed_fetch_rejects_unknown_column() {
    let db = users_db();
    let mut driver = db.driver("mysql");
    let err = driver
        .query(USERS, ())
        .unwrap()
        .fetch(FetchRequest::keyed_by("nope"))
        .unwrap_err();
    assert!(matches!(err, DriverError::UnknownColumn(column) if column == "nope"));
}

#[test]
fn column_fetch_reads_one_value() {
    let db = users_db();
    let mut driver = db.driver("mysql");
    let mut result = driver.query(USERS, ()).unwrap();
    assert_eq!(
        result.fetch(FetchRequest::Column(ColumnRef::from(0))).unwrap(),
        Fetched::Value(Some(SqlValue::Int(1)))
    );
    assert_eq!(
        result.fetch(FetchRequest::Column(ColumnRef::from("name"))).unwrap(),
        Fetched::Value(Some(text("bob")))
    );
    let Fetched::Rows(rest) = result.fetch(FetchRequest::All).unwrap() else {
        panic!("expected rows");
    };
    assert_eq!(rest.len(), 2);
    assert_eq!(
        result.fetch(FetchRequest::Single).unwrap(),
        Fetched::Row(None)
    );
}

#[derive(Debug, PartialEq)]
struct User {
    id: i64,
    name: String,
}

impl FromRow for User {
    fn from_row(row: &Row) -> oxide_driver::Result<Self> {
        Ok(Self {
            id: row
                .get_i64("id")
                .ok_or_else(|| DriverError::UnknownColumn(String::from("id")))?,
            name: row
                .get_str("name")
                .ok_or_else(|| DriverError::UnknownColumn(String::from("name")))?
                .to_string(),
        })
    }
}

#[test]
fn rows_hydrate_into_caller_types() {
    let db = users_db();
    let mut driver = db.driver("pgsql");
    let mut result = driver.query(USERS, ()).unwrap();
    assert_eq!(
        result.fetch_into::<User>().unwrap(),
        Some(User {
            id: 1,
            name: String::from("ann")
        })
    );
    let rest: Vec<User> = result.fetch_all_into().unwrap();
    assert_eq!(rest.len(), 3);
    let maps: Vec<BTreeMap<String, SqlValue>> = {
        result.rewind();
        result.fetch_all_into().unwrap()
    };
    assert_eq!(maps[0].get("id"), Some(&SqlValue::Int(1)));
}

// ===================================================================
// Parameters and statements
// ===================================================================

#[test]
fn named_parameters_reach_the_connection_positionally() {
    let db = MockDb::new();
    let mut driver = db.driver("pgsql");
    driver
        .exec(
            "UPDATE users SET name = :name WHERE id = :id",
            named(&[("id", SqlValue::Int(3)), ("name", text("eve"))]),
        )
        .unwrap();
    assert_eq!(db.log(), ["UPDATE users SET name = $1 WHERE id = $2"]);
    assert_eq!(db.last_params(), vec![text("eve"), SqlValue::Int(3)]);
}

#[test]
fn built_statements_run_with_their_binds() {
    let db = MockDb::new();
    let mut driver = db.driver("mysql");
    let update = driver
        .update()
        .table("users")
        .unwrap()
        .bind("name", "eve")
        .unwrap()
        .where_eq("id", 3);
    driver.execute(&update).unwrap();
    assert_eq!(db.log(), ["UPDATE `users` SET `name` = ? WHERE `id` = 3"]);
    assert_eq!(db.last_params(), vec![text("eve")]);
}

#[test]
fn sub_select_parameters_are_bound() {
    let db = MockDb::new();
    let mut driver = db.driver("pgsql");
    let adults = driver
        .select()
        .columns(&["id"])
        .from("users")
        .unwrap()
        .where_clause(Condition::gt("age", Value::param("min")))
        .bind("min", 18)
        .unwrap();
    let orders = driver
        .select()
        .from("orders")
        .unwrap()
        .where_clause(Condition::in_select("user_id", adults));

    driver.execute(&orders).unwrap();

    assert_eq!(
        db.log(),
        ["SELECT * FROM \"orders\" WHERE \"user_id\" IN (SELECT \"id\" FROM \"users\" WHERE \"age\" > $1)"]
    );
    assert_eq!(db.last_params(), vec![SqlValue::Int(18)]);
}

#[test]
fn statement_from_another_dialect_is_rejected() {
    let db = MockDb::new();
    let mut driver = db.driver("pgsql");
    let select = Select::new(Dialect::MySql).from("t").unwrap();
    let err = driver.execute(&select).unwrap_err();
    assert!(matches!(
        err,
        DriverError::Query(QueryError::Configuration {
            kind: ConfigErrorKind::DialectMismatch,
            ..
        })
    ));
    assert!(db.log().is_empty());
}

#[test]
fn last_insert_id_per_dialect() {
    let db = MockDb::new();
    let mut driver = db.driver("mysql");
    db.set_insert_id(42);
    driver.exec("INSERT INTO t (a) VALUES (1)", ()).unwrap();
    assert_eq!(driver.last_insert_id(None, None).unwrap(), Some(42));

    let pg = MockDb::new();
    pg.respond("currval", &["currval"], vec![vec![SqlValue::Int(7)]]);
    let mut driver = pg.driver("pgsql");
    assert_eq!(
        driver.last_insert_id(Some("orders"), Some("id")).unwrap(),
        Some(7)
    );
    assert_eq!(
        pg.log(),
        ["SELECT currval(pg_catalog.pg_get_serial_sequence($1, $2))"]
    );
    assert_eq!(pg.last_params(), vec![text("orders"), text("id")]);

    let lite = MockDb::new();
    lite.respond("last_insert_rowid", &["id"], vec![vec![SqlValue::Int(9)]]);
    let mut driver = lite.driver("sqlite");
    driver.exec("INSERT INTO t (a) VALUES (1)", ()).unwrap();
    assert_eq!(driver.last_insert_id(None, None).unwrap(), Some(9));
    assert_eq!(lite.log().last().map(String::as_str), Some("SELECT last_insert_rowid()"));
}

#[test]
fn quoting_helpers_follow_the_dialect() {
    let db = MockDb::new();
    let mysql = db.driver("mysql");
    assert_eq!(
        mysql.quote_identifier(&[Some("shop"), None, Some("or`ders")]),
        "`shop`.`or``ders`"
    );
    assert_eq!(mysql.escape_string("it's"), "it\\'s");
    let pg = db.driver("pgsql");
    assert_eq!(pg.quote_identifier(&[Some("t"), Some("*")]), "\"t\".*");
    assert_eq!(pg.escape_value(&text("it's")), "'it''s'");
    assert_eq!(pg.escape_value(&SqlValue::Null), "NULL");
}
