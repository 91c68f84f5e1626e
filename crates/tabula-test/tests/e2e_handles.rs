//! End-to-end tests over a workspace.
//!
//! These walk the full path a client takes: load seed tables, derive new
//! handles, run scripts, and materialize results.

use std::collections::{BTreeMap, HashSet};

use tabula_common::{ErrorCode, Handle, TabulaError, Value};
use tabula_server::materialize::{parse_json_records, MaterializeFormat};
use tabula_server::ops::{Aggregation, JoinHow};
use tabula_server::{ServerConfig, Workspace};

fn workspace() -> Workspace {
    Workspace::in_memory().expect("workspace")
}

#[test]
fn test_seed_shapes() {
    let ws = workspace();
    let users = ws.load_table("users").unwrap();
    let orders = ws.load_table("orders").unwrap();
    assert_eq!(ws.shape(&users).unwrap(), (5, 3));
    assert_eq!(ws.shape(&orders).unwrap(), (6, 4));
    assert_ne!(users, orders);

    let err = ws.load_table("products").unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownTable);
    assert!(err.to_string().contains("orders, users"));
}

#[test]
fn test_store_round_trip_many_handles() {
    let ws = workspace();
    let users = ws.load_table("users").unwrap();
    let expected = ws.store().get(&users).unwrap();

    let mut seen = HashSet::new();
    for _ in 0..10_000 {
        assert!(seen.insert(ws.store().put(expected.clone())));
    }
    assert_eq!(ws.store().get(&users).unwrap(), expected);
    assert_eq!(ws.stats().handles, 10_001);
}

#[test]
fn test_combine_preserves_rows() {
    let ws = workspace();
    let orders = ws.load_table("orders").unwrap();
    let h = ws
        .combine_columns(&orders, "product", "amount", "label", ": ")
        .unwrap();
    assert_eq!(h, orders);

    let t = ws.store().get(&h).unwrap();
    assert_eq!(t.shape(), (6, 5));
    assert_eq!(t.column("label").unwrap().get(0), &Value::text("Laptop: 1200.0"));
    assert_eq!(t.column("product").unwrap().get(0), &Value::text("Laptop"));
}

#[test]
fn test_join_users_orders() {
    let ws = workspace();
    let users = ws.load_table("users").unwrap();
    let orders = ws.load_table("orders").unwrap();

    let inner = ws.join(&users, &orders, "user_id", JoinHow::Inner).unwrap();
    assert_eq!(ws.shape(&inner).unwrap(), (6, 6));

    let left = ws.join(&orders, &users, "user_id", JoinHow::Left).unwrap();
    let t = ws.store().get(&left).unwrap();
    assert_eq!(t.num_rows(), 6);
    assert!(t.columns().iter().all(|c| c.values().iter().all(|v| !v.is_null())));

    let with_david = ws.join(&users, &orders, "user_id", JoinHow::Left).unwrap();
    assert_eq!(ws.shape(&with_david).unwrap(), (7, 6));

    assert_eq!(ws.shape(&users).unwrap(), (5, 3));
    assert_eq!(ws.shape(&orders).unwrap(), (6, 4));
}

#[test]
fn test_top_n_caps_at_row_count() {
    let ws = workspace();
    let users = ws.load_table("users").unwrap();
    let text = ws.top_n(&users, 1000).unwrap();
    for name in ["Alice", "Bob", "Charlie", "David", "Eve"] {
        assert!(text.contains(name));
    }
}

#[test]
fn test_json_records_round_trip() {
    let ws = workspace();
    let orders = ws.load_table("orders").unwrap();
    let json = ws
        .materialize(&orders, MaterializeFormat::JsonRecords, 5)
        .unwrap();
    let parsed = parse_json_records(&json).unwrap();
    assert_eq!(parsed, ws.store().get(&orders).unwrap());
}

#[test]
fn test_execute_adds_row_without_touching_input() {
    let ws = workspace();
    let h = ws.load_table("users").unwrap();
    let inputs = BTreeMap::from([("df".to_string(), h.clone())]);

    let out = ws
        .execute(
            "CREATE TABLE out AS SELECT * FROM df; \
             INSERT INTO out VALUES (6, 'Frank', 'Berlin')",
            &inputs,
            &["out".to_string()],
        )
        .unwrap();

    assert_eq!(out.len(), 1);
    let (name, new_handle) = &out[0];
    assert_eq!(name, "out");
    assert_eq!(ws.shape(new_handle).unwrap(), (6, 3));
    assert_eq!(ws.shape(&h).unwrap(), (5, 3));
}

#[test]
fn test_execute_failures_leave_store_alone() {
    let ws = workspace();
    let h = ws.load_table("users").unwrap();
    let before = ws.stats().handles;
    let inputs = BTreeMap::from([("df".to_string(), h)]);

    let err = ws
        .execute("SELEC * FROM df", &inputs, &["out".to_string()])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ExecutionFailed);

    let err = ws
        .execute(
            "CREATE TABLE a AS SELECT * FROM df",
            &inputs,
            &["a".to_string(), "b".to_string()],
        )
        .unwrap_err();
    assert_eq!(
        err,
        TabulaError::OutputNotProduced {
            name: "b".to_string()
        }
    );

    let missing = BTreeMap::from([("df".to_string(), Handle::from("gone"))]);
    let err = ws.execute("SELECT 1", &missing, &[]).unwrap_err();
    assert_eq!(err, TabulaError::handle_not_found("gone"));

    assert_eq!(ws.stats().handles, before);
}

#[test]
fn test_unknown_handle_fails_everywhere() {
    let ws = workspace();
    let users = ws.load_table("users").unwrap();
    let missing = Handle::from("00000000-0000-0000-0000-000000000000");
    let before = ws.stats().handles;
    let is_missing = |e: TabulaError| e.code() == ErrorCode::HandleNotFound;

    assert!(is_missing(ws.shape(&missing).unwrap_err()));
    assert!(is_missing(ws.head(&missing).unwrap_err()));
    assert!(is_missing(ws.top_n(&missing, 3).unwrap_err()));
    assert!(is_missing(
        ws.combine_columns(&missing, "a", "b", "c", " ").unwrap_err()
    ));
    assert!(is_missing(
        ws.join(&missing, &users, "user_id", JoinHow::Inner).unwrap_err()
    ));
    assert!(is_missing(
        ws.join(&users, &missing, "user_id", JoinHow::Inner).unwrap_err()
    ));
    assert!(is_missing(ws.get_schema(&missing).unwrap_err()));
    assert!(is_missing(
        ws.materialize(&missing, MaterializeFormat::Csv, 5).unwrap_err()
    ));

    assert_eq!(ws.stats().handles, before);
}

#[test]
fn test_group_by_then_script() {
    let ws = workspace();
    let orders = ws.load_table("orders").unwrap();
    let totals = ws
        .group_by(
            &orders,
            &["user_id".to_string()],
            &[Aggregation::new("amount", "sum")],
        )
        .unwrap();

    let out = ws
        .execute(
            "SELECT user_id FROM totals WHERE amount > 300 ORDER BY user_id",
            &BTreeMap::from([("totals".to_string(), totals)]),
            &["result".to_string()],
        )
        .unwrap();
    let t = ws.store().get(&out[0].1).unwrap();
    assert_eq!(t.column("user_id").unwrap().values(), &[Value::Int(1), Value::Int(2)]);
}

#[test]
fn test_config_limits_apply() {
    let ws = Workspace::new(ServerConfig::builder().max_script_rows(3).build()).unwrap();
    let users = ws.load_table("users").unwrap();
    let err = ws
        .execute(
            "CREATE TABLE copy AS SELECT * FROM u",
            &BTreeMap::from([("u".to_string(), users)]),
            &["copy".to_string()],
        )
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ExecutionFailed);
}
