//! Handle store.
//!
//! Maps opaque handles to the tables they name. The store owns every table;
//! callers only ever see handles and copies.

use std::collections::HashMap;

use parking_lot::RwLock;
use tabula_common::{Handle, Table, TabulaError, TabulaResult};

/// Thread-safe map from [`Handle`] to [`Table`].
///
/// Handles are never removed. One lock guards the whole map, so a reader
/// never observes a half-written table.
#[derive(Debug, Default)]
pub struct HandleStore {
    tables: RwLock<HashMap<Handle, Table>>,
}

impl HandleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a table under a fresh handle.
    pub fn put(&self, table: Table) -> Handle {
        let mut tables = self.tables.write();
        let mut handle = Handle::generate();
        while tables.contains_key(&handle) {
            handle = Handle::generate();
        }
        tables.insert(handle.clone(), table);
        handle
    }

    /// Returns a copy of the table behind `handle`.
    pub fn get(&self, handle: &Handle) -> TabulaResult<Table> {
        self.tables
            .read()
            .get(handle)
            .cloned()
            .ok_or_else(|| TabulaError::handle_not_found(handle.as_str()))
    }

    /// Returns copies of several tables, in request order.
    ///
    /// Fails on the first unknown handle.
    pub fn get_many(&self, handles: &[&Handle]) -> TabulaResult<Vec<Table>> {
        let tables = self.tables.read();
        handles
            .iter()
            .map(|h| {
                tables
                    .get(*h)
                    .cloned()
                    .ok_or_else(|| TabulaError::handle_not_found(h.as_str()))
            })
            .collect()
    }

    /// Replaces the table behind an existing handle.
    pub fn replace(&self, handle: &Handle, table: Table) -> TabulaResult<()> {
        match self.tables.write().get_mut(handle) {
            Some(slot) => {
                *slot = table;
                Ok(())
            }
            None => Err(TabulaError::handle_not_found(handle.as_str())),
        }
    }

    /// Mutates the table behind `handle` under the write lock.
    ///
    /// `f` works on a copy; the stored table only changes if `f` succeeds.
    pub fn update<F>(&self, handle: &Handle, f: F) -> TabulaResult<()>
    where
        F: FnOnce(&mut Table) -> TabulaResult<()>,
    {
        let mut tables = self.tables.write();
        let slot = tables
            .get_mut(handle)
            .ok_or_else(|| TabulaError::handle_not_found(handle.as_str()))?;
        let mut working = slot.clone();
        f(&mut working)?;
        *slot = working;
        Ok(())
    }

    /// Returns true if `handle` is stored.
    pub fn contains(&self, handle: &Handle) -> bool {
        self.tables.read().contains_key(handle)
    }

    /// Returns the number of stored handles.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    /// Returns all handles, sorted.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.tables.read().keys().cloned().collect();
        handles.sort();
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use tabula_common::{Column, Value};

    fn table(n: i64) -> Table {
        Table::new(vec![Column::from_values("n", vec![Value::Int(n)])]).unwrap()
    }

    #[test]
    fn test_put_get_round_trip() {
        let store = HandleStore::new();
        let h = store.put(table(7));
        assert_eq!(store.get(&h).unwrap(), table(7));
        assert!(store.contains(&h));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_handle() {
        let store = HandleStore::new();
        let missing = Handle::from("nope");
        assert_eq!(
            store.get(&missing),
            Err(TabulaError::HandleNotFound {
                handle: "nope".to_string()
            })
        );
        assert!(store.replace(&missing, table(1)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_many_unique_handles() {
        let store = HandleStore::new();
        let handles: HashSet<Handle> = (0..10_000).map(|i| store.put(table(i))).collect();
        assert_eq!(handles.len(), 10_000);
        assert_eq!(store.len(), 10_000);
    }

    #[test]
    fn test_get_many_order_and_failure() {
        let store = HandleStore::new();
        let a = store.put(table(1));
        let b = store.put(table(2));

        let got = store.get_many(&[&b, &a]).unwrap();
        assert_eq!(got, vec![table(2), table(1)]);

        let missing = Handle::from("gone");
        let err = store.get_many(&[&a, &missing, &b]).unwrap_err();
        assert_eq!(err, TabulaError::handle_not_found(missing.as_str()));
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let store = HandleStore::new();
        let h = store.put(table(1));

        let err = store
            .update(&h, |t| {
                t.push_row(vec![Value::Int(2)])?;
                Err(TabulaError::invalid_argument("boom"))
            })
            .unwrap_err();
        assert!(err.is_argument_error());
        assert_eq!(store.get(&h).unwrap().num_rows(), 1);

        store.update(&h, |t| t.push_row(vec![Value::Int(2)])).unwrap();
        assert_eq!(store.get(&h).unwrap().num_rows(), 2);
    }

    #[test]
    fn test_returned_copies_are_independent() {
        let store = HandleStore::new();
        let h = store.put(table(1));
        let mut copy = store.get(&h).unwrap();
        copy.push_row(vec![Value::Int(5)]).unwrap();
        assert_eq!(store.get(&h).unwrap().num_rows(), 1);
    }

    #[test]
    fn test_concurrent_puts() {
        let store = Arc::new(HandleStore::new());
        let workers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..250 {
                        store.put(table(w * 1000 + i));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(store.len(), 1000);
        assert_eq!(store.handles().len(), 1000);
    }
}
