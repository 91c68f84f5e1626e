//! Protocol tests: JSON request lines in, JSON response lines out.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tabula_server::{protocol, Workspace};
use tabula_test::{call, error_kind, handle_of};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[test]
fn test_tool_session() {
    let ws = Workspace::in_memory().unwrap();

    let users = handle_of(&call(&ws, &json!({"op": "load_table", "table_name": "users"})));
    let orders = handle_of(&call(&ws, &json!({"op": "load_table", "table_name": "orders"})));

    let joined = handle_of(&call(
        &ws,
        &json!({"op": "join", "handle1": users, "handle2": orders, "on_column": "user_id"}),
    ));
    let shape = call(&ws, &json!({"op": "shape", "handle": joined}));
    assert_eq!(shape["result"]["rows"], 6);
    assert_eq!(shape["result"]["columns"], 6);

    let combined = handle_of(&call(
        &ws,
        &json!({"op": "combine_columns", "handle": users, "col1": "name", "col2": "city", "new_col": "who"}),
    ));
    assert_eq!(combined, users);

    let csv = call(
        &ws,
        &json!({"op": "materialize", "handle": users, "format": "csv"}),
    );
    let text = csv["result"]["text"].as_str().unwrap();
    assert!(text.starts_with("user_id,name,city,who\n1,Alice,New York,Alice New York\n"));

    let distinct = handle_of(&call(
        &ws,
        &json!({"op": "distinct_rows", "handle": users, "columns": ["city"]}),
    ));
    assert_eq!(
        call(&ws, &json!({"op": "shape", "handle": distinct}))["result"]["text"],
        "(4, 1)"
    );

    let grouped = handle_of(&call(
        &ws,
        &json!({
            "op": "group_by",
            "handle": orders,
            "group_columns": ["user_id"],
            "aggregations": [{"column": "amount", "function": "mean"}]
        }),
    ));
    let records = call(
        &ws,
        &json!({"op": "materialize", "handle": grouped, "format": "json_records"}),
    );
    let rows: serde_json::Value =
        serde_json::from_str(records["result"]["text"].as_str().unwrap()).unwrap();
    assert_eq!(rows[0], json!({"user_id": 1, "amount": 612.5}));

    let stats = call(&ws, &json!({"op": "stats"}));
    assert_eq!(stats["result"]["handles"], 5);
}

#[test]
fn test_failures_are_reported() {
    let ws = Workspace::in_memory().unwrap();
    let users = handle_of(&call(&ws, &json!({"op": "load_table", "table_name": "users"})));

    let r = call(&ws, &json!({"id": 9, "op": "top_n", "handle": users, "n": 0}));
    assert_eq!(r["id"], 9);
    assert_eq!(error_kind(&r), "InvalidArgument");

    let r = call(
        &ws,
        &json!({"op": "combine_columns", "handle": users, "col1": "name", "col2": "zip", "new_col": "x"}),
    );
    assert_eq!(error_kind(&r), "ColumnNotFound");

    let r = call(
        &ws,
        &json!({"op": "execute", "source": "SELECT * FROM nowhere", "outputs": ["result"]}),
    );
    assert_eq!(error_kind(&r), "ExecutionFailed");

    let r = call(&ws, &json!({"op": "load_table"}));
    assert_eq!(error_kind(&r), "InvalidArgument");
}

#[tokio::test]
async fn test_stdio_loop_over_pipe() {
    let ws = Arc::new(Workspace::in_memory().unwrap());
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let worker = tokio::spawn(protocol::serve(
        Arc::clone(&ws),
        BufReader::new(server_read),
        server_write,
    ));

    let (client_read, mut client_write) = tokio::io::split(client);
    client_write
        .write_all(b"{\"id\": 1, \"op\": \"list_tables\"}\n\n{\"id\": 2, \"op\": \"bogus\"}\n")
        .await
        .unwrap();
    client_write.shutdown().await.unwrap();

    let mut responses = BufReader::new(client_read).lines();
    let first: serde_json::Value =
        serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
    let second: serde_json::Value =
        serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();

    assert_eq!(first["id"], 1);
    assert_eq!(first["result"]["tables"], json!(["orders", "users"]));
    assert_eq!(second["id"], 2);
    assert_eq!(second["ok"], false);

    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_serve_yields_while_a_request_runs() {
    let ws = Arc::new(Workspace::in_memory().unwrap());
    let users = ws.load_table("users").unwrap();
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let worker = tokio::spawn(protocol::serve(
        Arc::clone(&ws),
        BufReader::new(server_read),
        server_write,
    ));

    // 5^7 rows through nested-loop joins.
    let request = json!({
        "id": 1,
        "op": "execute",
        "source": "SELECT COUNT(*) AS n FROM u a, u b, u c, u d, u e, u f, u g",
        "inputs": {"u": users},
    });
    let (client_read, mut client_write) = tokio::io::split(client);
    client_write
        .write_all(format!("{}\n", request).as_bytes())
        .await
        .unwrap();

    let mut responses = BufReader::new(client_read).lines();
    tokio::select! {
        biased;
        _ = responses.next_line() => panic!("serve blocked the runtime until the script finished"),
        _ = tokio::time::sleep(Duration::from_millis(1)) => {}
    }

    client_write.shutdown().await.unwrap();
    let line = responses.next_line().await.unwrap().unwrap();
    let response: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], 1);
    assert_eq!(response["ok"], true);

    worker.await.unwrap().unwrap();
}
