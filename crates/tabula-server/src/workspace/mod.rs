//! # Workspace
//!
//! The facade that wires the handle store, seed catalog, structured
//! operations, executor and materializer together. Every tool the server
//! exposes is one method here.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Workspace                       │
//! │                                                      │
//! │  ┌─────────────┐  ┌──────────┐  ┌────────────────┐  │
//! │  │ SeedCatalog │  │   ops    │  │    Executor    │  │
//! │  └──────┬──────┘  └────┬─────┘  └───────┬────────┘  │
//! │         └──────────────┼────────────────┘           │
//! │                        ▼                             │
//! │                  HandleStore  ──►  materialize       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use tabula_server::workspace::Workspace;
//!
//! let ws = Workspace::in_memory().unwrap();
//! let users = ws.load_table("users").unwrap();
//! assert_eq!(ws.shape(&users).unwrap(), (5, 3));
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tabula_common::{Handle, Table, TabulaError, TabulaResult};

use crate::catalog::SeedCatalog;
use crate::config::ServerConfig;
use crate::exec::{ExecOutputs, Executor};
use crate::materialize::{self, MaterializeFormat, MaterializeOptions};
use crate::ops::{self, Aggregation, JoinHow};
use crate::store::HandleStore;

/// Workspace statistics.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStats {
    /// Handles currently stored.
    pub handles: usize,
    /// Operations served, including failed ones.
    pub operations: u64,
    /// Operations that returned an error.
    pub failed_operations: u64,
    /// Scripts executed.
    pub executions: u64,
    /// Uptime.
    #[serde(serialize_with = "serialize_secs")]
    pub uptime: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Handle-indexed table workspace.
pub struct Workspace {
    config: ServerConfig,
    store: HandleStore,
    catalog: SeedCatalog,
    executor: Executor,
    operations: AtomicU64,
    failed_operations: AtomicU64,
    executions: AtomicU64,
    started_at: Instant,
}

impl Workspace {
    /// Creates a workspace with the given configuration.
    pub fn new(config: ServerConfig) -> TabulaResult<Self> {
        let executor = Executor::new(
            config.script_limits(),
            Duration::from_millis(config.slow_execution_threshold_ms),
        );
        Ok(Self {
            store: HandleStore::new(),
            catalog: SeedCatalog::new()?,
            executor,
            config,
            operations: AtomicU64::new(0),
            failed_operations: AtomicU64::new(0),
            executions: AtomicU64::new(0),
            started_at: Instant::now(),
        })
    }

    /// Creates a workspace with the default configuration.
    pub fn in_memory() -> TabulaResult<Self> {
        Self::new(ServerConfig::default())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the handle store.
    pub fn store(&self) -> &HandleStore {
        &self.store
    }

    fn track<T>(&self, op: &'static str, result: TabulaResult<T>) -> TabulaResult<T> {
        self.operations.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = &result {
            self.failed_operations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(op, error = %e, "operation failed");
        } else {
            tracing::debug!(op, "operation ok");
        }
        result
    }

    /// Records `op` as failed before it reached the workspace, such as a
    /// request argument that did not parse.
    pub(crate) fn reject<T>(&self, op: &'static str, error: TabulaError) -> TabulaResult<T> {
        self.track(op, Err(error))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Loads a seed table into a new handle.
    pub fn load_table(&self, name: &str) -> TabulaResult<Handle> {
        let result = self.catalog.load(name).map(|t| self.store.put(t));
        self.track("load_table", result)
    }

    /// Lists the seed tables.
    pub fn list_tables(&self) -> Vec<String> {
        self.operations.fetch_add(1, Ordering::Relaxed);
        self.catalog.table_names()
    }

    // =========================================================================
    // Structured operations
    // =========================================================================

    /// Adds `new_col = col1 + sep + col2` to the table in place and returns
    /// the same handle.
    pub fn combine_columns(
        &self,
        handle: &Handle,
        col1: &str,
        col2: &str,
        new_col: &str,
        sep: &str,
    ) -> TabulaResult<Handle> {
        let result = self
            .store
            .update(handle, |t| ops::combine_columns(t, col1, col2, new_col, sep))
            .map(|()| handle.clone());
        self.track("combine_columns", result)
    }

    /// Joins two tables on `on` into a new handle.
    pub fn join(
        &self,
        left: &Handle,
        right: &Handle,
        on: &str,
        how: JoinHow,
    ) -> TabulaResult<Handle> {
        let result = self.store.get_many(&[left, right]).and_then(|tables| {
            let joined = ops::join(&tables[0], &tables[1], on, how)?;
            Ok(self.store.put(joined))
        });
        self.track("join", result)
    }

    /// Returns `(rows, columns)`.
    pub fn shape(&self, handle: &Handle) -> TabulaResult<(usize, usize)> {
        let result = self.store.get(handle).map(|t| ops::shape(&t));
        self.track("shape", result)
    }

    /// Renders the first preview rows.
    pub fn head(&self, handle: &Handle) -> TabulaResult<String> {
        let result = self.store.get(handle).map(|t| {
            let rows = ops::head(&t, self.config.preview_rows);
            materialize::render_rows(&rows, &(0..rows.num_rows()).collect::<Vec<_>>())
        });
        self.track("head", result)
    }

    /// Renders the first `n` rows.
    pub fn top_n(&self, handle: &Handle, n: i64) -> TabulaResult<String> {
        let result = self.store.get(handle).and_then(|t| {
            let rows = ops::top_n(&t, n, self.config.max_rows)?;
            Ok(materialize::render_rows(
                &rows,
                &(0..rows.num_rows()).collect::<Vec<_>>(),
            ))
        });
        self.track("top_n", result)
    }

    /// Projects columns into a new handle.
    pub fn select_columns(&self, handle: &Handle, columns: &[String]) -> TabulaResult<Handle> {
        let result = self.derive(handle, |t| ops::select_columns(t, columns));
        self.track("select_columns", result)
    }

    /// Filters rows into a new handle.
    pub fn filter_rows(&self, handle: &Handle, expression: &str) -> TabulaResult<Handle> {
        let result = self.derive(handle, |t| ops::filter_rows(t, expression));
        self.track("filter_rows", result)
    }

    /// Drops columns into a new handle.
    pub fn drop_columns(&self, handle: &Handle, columns: &[String]) -> TabulaResult<Handle> {
        let result = self.derive(handle, |t| Ok(ops::drop_columns(t, columns)));
        self.track("drop_columns", result)
    }

    /// Removes duplicate rows into a new handle.
    pub fn remove_duplicates(&self, handle: &Handle) -> TabulaResult<Handle> {
        let result = self.derive(handle, |t| Ok(ops::remove_duplicates(t)));
        self.track("remove_duplicates", result)
    }

    /// Distinct rows, optionally of some columns, into a new handle.
    pub fn distinct_rows(
        &self,
        handle: &Handle,
        columns: Option<&[String]>,
    ) -> TabulaResult<Handle> {
        let result = self.derive(handle, |t| ops::distinct_rows(t, columns));
        self.track("distinct_rows", result)
    }

    /// Describes the columns into a new handle.
    pub fn get_schema(&self, handle: &Handle) -> TabulaResult<Handle> {
        let result = self.derive(handle, ops::get_schema);
        self.track("get_schema", result)
    }

    /// Groups and aggregates into a new handle.
    pub fn group_by(
        &self,
        handle: &Handle,
        group_columns: &[String],
        aggregations: &[Aggregation],
    ) -> TabulaResult<Handle> {
        let result = self.derive(handle, |t| ops::group_by(t, group_columns, aggregations));
        self.track("group_by", result)
    }

    fn derive<F>(&self, handle: &Handle, f: F) -> TabulaResult<Handle>
    where
        F: FnOnce(&Table) -> TabulaResult<Table>,
    {
        let table = self.store.get(handle)?;
        Ok(self.store.put(f(&table)?))
    }

    // =========================================================================
    // Execution and materialization
    // =========================================================================

    /// Runs a script over bound inputs and stores its outputs.
    pub fn execute(
        &self,
        source: &str,
        inputs: &BTreeMap<String, Handle>,
        outputs: &[String],
    ) -> TabulaResult<ExecOutputs> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let result = self.executor.execute(&self.store, source, inputs, outputs);
        self.track("execute", result)
    }

    /// Renders a stored table as text.
    pub fn materialize(
        &self,
        handle: &Handle,
        format: MaterializeFormat,
        n: i64,
    ) -> TabulaResult<String> {
        let options = MaterializeOptions {
            default_rows: self.config.preview_rows,
            max_rows: self.config.max_rows,
            sample_seed: self.config.sample_seed,
        };
        let result = self
            .store
            .get(handle)
            .and_then(|t| materialize::materialize(&t, format, n, &options));
        self.track("materialize", result)
    }

    /// Returns statistics.
    pub fn stats(&self) -> WorkspaceStats {
        WorkspaceStats {
            handles: self.store.len(),
            operations: self.operations.load(Ordering::Relaxed),
            failed_operations: self.failed_operations.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_common::{ErrorCode, TabulaError, Value};

    fn ws() -> Workspace {
        Workspace::in_memory().unwrap()
    }

    #[test]
    fn test_workspace_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Workspace>();
    }

    #[test]
    fn test_combine_mutates_in_place() {
        let ws = ws();
        let h = ws.load_table("users").unwrap();
        let same = ws.combine_columns(&h, "name", "city", "label", " - ").unwrap();
        assert_eq!(same, h);
        assert_eq!(ws.shape(&h).unwrap(), (5, 4));
        assert_eq!(ws.store().len(), 1);

        let err = ws.combine_columns(&h, "name", "city", "label", " ").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ColumnExists);
        assert_eq!(ws.shape(&h).unwrap(), (5, 4));
    }

    #[test]
    fn test_derived_handles_are_new() {
        let ws = ws();
        let orders = ws.load_table("orders").unwrap();
        let big = ws.filter_rows(&orders, "amount >= 250").unwrap();
        assert_ne!(big, orders);
        assert_eq!(ws.shape(&big).unwrap(), (3, 4));
        assert_eq!(ws.shape(&orders).unwrap(), (6, 4));

        let schema = ws.get_schema(&orders).unwrap();
        assert_eq!(ws.shape(&schema).unwrap(), (4, 3));

        let per_user = ws
            .group_by(&orders, &["user_id".to_string()], &[Aggregation::new("amount", "sum")])
            .unwrap();
        assert_eq!(ws.shape(&per_user).unwrap(), (4, 2));
    }

    #[test]
    fn test_head_and_top_n() {
        let ws = ws();
        let orders = ws.load_table("orders").unwrap();
        let head = ws.head(&orders).unwrap();
        assert!(head.contains("Webcam"));
        assert!(!head.contains("Desk"));
        assert!(ws.top_n(&orders, 1000).unwrap().contains("Desk"));
        assert!(ws.top_n(&orders, 0).unwrap_err().is_argument_error());
    }

    #[test]
    fn test_unknown_handle_everywhere() {
        let ws = ws();
        let h = ws.load_table("users").unwrap();
        let missing = Handle::from("missing");
        let expected = TabulaError::handle_not_found("missing");

        assert_eq!(ws.shape(&missing).unwrap_err(), expected);
        assert_eq!(ws.join(&h, &missing, "user_id", JoinHow::Inner).unwrap_err(), expected);
        assert_eq!(
            ws.materialize(&missing, MaterializeFormat::Csv, 5).unwrap_err(),
            expected
        );
        assert_eq!(ws.store().len(), 1);
        assert_eq!(ws.stats().failed_operations, 3);
    }

    #[test]
    fn test_materialize_uses_config() {
        let ws = Workspace::new(ServerConfig::builder().max_rows(2).build()).unwrap();
        let users = ws.load_table("users").unwrap();
        let full = ws.materialize(&users, MaterializeFormat::FullString, 5).unwrap();
        assert!(full.ends_with("... (truncated to 2 rows)"));

        let back = materialize::parse_json_records(
            &ws.materialize(&users, MaterializeFormat::JsonRecords, 5).unwrap(),
        )
        .unwrap();
        assert_eq!(back.column("name").unwrap().get(4), &Value::text("Eve"));
    }

    #[test]
    fn test_stats() {
        let ws = ws();
        let users = ws.load_table("users").unwrap();
        ws.execute(
            "CREATE TABLE out AS SELECT * FROM u",
            &BTreeMap::from([("u".to_string(), users)]),
            &["out".to_string()],
        )
        .unwrap();
        let stats = ws.stats();
        assert_eq!(stats.handles, 2);
        assert_eq!(stats.operations, 2);
        assert_eq!(stats.executions, 1);
        assert_eq!(stats.failed_operations, 0);
    }
}
