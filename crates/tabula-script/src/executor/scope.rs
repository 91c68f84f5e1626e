//! Named tables visible to a script.

use std::collections::HashMap;

use tabula_common::Table;

/// The set of tables a script reads and writes, keyed by binding name.
///
/// Each execution gets its own scope; nothing in it outlives the run
/// unless the caller takes it out afterwards.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    tables: HashMap<String, Table>,
}

impl Scope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `table` to `name`, returning the table previously bound there.
    pub fn bind(&mut self, name: impl Into<String>, table: Table) -> Option<Table> {
        self.tables.insert(name.into(), table)
    }

    /// Returns the table bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Returns mutable access to the table bound to `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Removes and returns the table bound to `name`.
    pub fn remove(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    /// Returns true if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns the bound names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of bindings.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<(String, Table)> for Scope {
    fn from_iter<I: IntoIterator<Item = (String, Table)>>(iter: I) -> Self {
        Self {
            tables: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_remove() {
        let mut scope = Scope::new();
        assert!(scope.is_empty());

        assert!(scope.bind("b", Table::default()).is_none());
        assert!(scope.bind("a", Table::default()).is_none());
        assert!(scope.bind("a", Table::default()).is_some());

        assert_eq!(scope.names(), vec!["a", "b"]);
        assert!(scope.contains("b"));
        assert!(scope.remove("b").is_some());
        assert_eq!(scope.len(), 1);
    }
}
