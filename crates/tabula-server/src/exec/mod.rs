//! Generic execution layer.
//!
//! Runs a script against copies of stored tables and registers the tables
//! it names as outputs under fresh handles. Scripts see only the tables
//! bound to them; see `tabula_script` for the language.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tabula_common::{Handle, TabulaError, TabulaResult};
use tabula_script::{ScriptEngine, ScriptLimits, Scope};

use crate::store::HandleStore;

/// Output name and the handle it was stored under, in request order.
pub type ExecOutputs = Vec<(String, Handle)>;

/// Runs scripts against a [`HandleStore`].
#[derive(Debug, Clone)]
pub struct Executor {
    engine: ScriptEngine,
    slow_threshold: Duration,
}

impl Executor {
    /// Creates an executor.
    pub fn new(limits: ScriptLimits, slow_threshold: Duration) -> Self {
        Self {
            engine: ScriptEngine::new(limits),
            slow_threshold,
        }
    }

    /// Runs `source` with `inputs` bound by local name, then stores every
    /// table named in `outputs`.
    ///
    /// Nothing is stored unless every output was produced. Script failures
    /// surface as `ExecutionFailed`.
    pub fn execute(
        &self,
        store: &HandleStore,
        source: &str,
        inputs: &BTreeMap<String, Handle>,
        outputs: &[String],
    ) -> TabulaResult<ExecOutputs> {
        let handles: Vec<&Handle> = inputs.values().collect();
        let tables = store.get_many(&handles)?;
        let mut scope: Scope = inputs.keys().cloned().zip(tables).collect();

        let start = Instant::now();
        let result = self.engine.run(source, &mut scope);
        let elapsed = start.elapsed();

        if elapsed >= self.slow_threshold {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "slow script execution"
            );
        }

        let statements =
            result.map_err(|e| TabulaError::execution_failed(e.to_string()))?;
        tracing::debug!(statements, inputs = inputs.len(), "script finished");

        let mut produced = Vec::with_capacity(outputs.len());
        for name in outputs {
            let table = scope
                .get(name)
                .ok_or_else(|| TabulaError::OutputNotProduced { name: name.clone() })?;
            produced.push((name, table));
        }

        Ok(produced
            .into_iter()
            .map(|(name, table)| (name.clone(), store.put(table.clone())))
            .collect())
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ScriptLimits::default(), Duration::from_millis(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_common::{Column, ErrorCode, Table, Value};

    fn setup() -> (HandleStore, Handle) {
        let store = HandleStore::new();
        let t = Table::new(vec![
            Column::from_values("a", vec![Value::Int(1), Value::Int(2)]),
            Column::from_values("b", vec![Value::text("x"), Value::text("y")]),
        ])
        .unwrap();
        let h = store.put(t);
        (store, h)
    }

    fn inputs(h: &Handle) -> BTreeMap<String, Handle> {
        BTreeMap::from([("t".to_string(), h.clone())])
    }

    #[test]
    fn test_execute_stores_outputs() {
        let (store, h) = setup();
        let exec = Executor::default();
        let out = exec
            .execute(
                &store,
                "CREATE TABLE out AS SELECT * FROM t; INSERT INTO out VALUES (3, 'z')",
                &inputs(&h),
                &["out".to_string()],
            )
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "out");
        assert_ne!(out[0].1, h);
        assert_eq!(store.get(&out[0].1).unwrap().num_rows(), 3);
        assert_eq!(store.get(&h).unwrap().num_rows(), 2);
    }

    #[test]
    fn test_inputs_are_copies() {
        let (store, h) = setup();
        let exec = Executor::default();
        let out = exec
            .execute(&store, "DELETE FROM t", &inputs(&h), &["t".to_string()])
            .unwrap();
        assert_eq!(store.get(&out[0].1).unwrap().num_rows(), 0);
        assert_eq!(store.get(&h).unwrap().num_rows(), 2);
    }

    #[test]
    fn test_missing_output_stores_nothing() {
        let (store, h) = setup();
        let exec = Executor::default();
        let err = exec
            .execute(
                &store,
                "CREATE TABLE a2 AS SELECT a FROM t",
                &inputs(&h),
                &["a2".to_string(), "missing".to_string()],
            )
            .unwrap_err();
        assert_eq!(
            err,
            TabulaError::OutputNotProduced {
                name: "missing".to_string()
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_script_errors() {
        let (store, h) = setup();
        let exec = Executor::default();
        for source in ["SELEC nonsense", "SELECT zzz FROM t", "SELECT a / 0 FROM t"] {
            let err = exec.execute(&store, source, &inputs(&h), &[]).unwrap_err();
            assert_eq!(err.code(), ErrorCode::ExecutionFailed, "{}", source);
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_deep_expression_fails_cleanly() {
        let (store, h) = setup();
        let exec = Executor::default();
        let source = format!("CREATE TABLE out AS SELECT {}a FROM t", "a + ".repeat(5000));
        let err = exec
            .execute(&store, &source, &inputs(&h), &["out".to_string()])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExecutionFailed);
        assert!(err.to_string().contains("nested deeper"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_input_handle() {
        let (store, _) = setup();
        let exec = Executor::default();
        let missing = Handle::from("nope");
        let err = exec
            .execute(&store, "SELECT 1", &inputs(&missing), &[])
            .unwrap_err();
        assert_eq!(err, TabulaError::handle_not_found("nope"));
    }

    #[test]
    fn test_limits_apply() {
        let (store, h) = setup();
        let exec = Executor::new(
            ScriptLimits {
                max_statements: 1,
                max_rows: 10,
            },
            Duration::from_secs(1),
        );
        let err = exec
            .execute(&store, "SELECT 1; SELECT 2", &inputs(&h), &[])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExecutionFailed);
    }
}
