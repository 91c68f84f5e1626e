//! # tabula-test
//!
//! End-to-end tests for Tabula.
//!
//! The tests under `tests/` drive a [`Workspace`] either directly or through
//! the JSON-lines protocol. The helpers here keep those tests short.

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde_json::Value as JsonValue;
use tabula_common::Handle;
use tabula_server::{protocol, Workspace};

/// Sends one request line and parses the response.
///
/// Panics if the workspace produces no response or invalid JSON.
pub fn call(ws: &Workspace, request: &JsonValue) -> JsonValue {
    let line = protocol::handle_line(ws, &request.to_string()).expect("response line");
    serde_json::from_str(&line).expect("response is JSON")
}

/// Extracts `result.handle` from a successful response.
pub fn handle_of(response: &JsonValue) -> Handle {
    assert_eq!(response["ok"], true, "request failed: {}", response);
    Handle::from(
        response["result"]["handle"]
            .as_str()
            .expect("handle in response"),
    )
}

/// Extracts `error.kind` from a failed response.
pub fn error_kind(response: &JsonValue) -> &str {
    assert_eq!(response["ok"], false, "request succeeded: {}", response);
    response["error"]["kind"].as_str().unwrap_or_default()
}
