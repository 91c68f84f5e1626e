//! Seed catalog.
//!
//! The fixed set of named tables a session can start from.

use std::collections::BTreeMap;

use tabula_common::{DataType, Field, Table, TabulaError, TabulaResult, Value};

/// Named seed tables, built once at construction.
#[derive(Debug, Clone)]
pub struct SeedCatalog {
    tables: BTreeMap<String, Table>,
}

impl SeedCatalog {
    /// Builds the catalog with the `users` and `orders` tables.
    pub fn new() -> TabulaResult<Self> {
        let mut tables = BTreeMap::new();
        tables.insert("users".to_string(), users()?);
        tables.insert("orders".to_string(), orders()?);
        Ok(Self { tables })
    }

    /// Returns a fresh copy of the named table.
    pub fn load(&self, name: &str) -> TabulaResult<Table> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| TabulaError::UnknownTable {
                name: name.to_string(),
                available: self.table_names(),
            })
    }

    /// Returns the available table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

fn users() -> TabulaResult<Table> {
    let rows = [
        (1, "Alice", "New York"),
        (2, "Bob", "London"),
        (3, "Charlie", "Paris"),
        (4, "David", "London"),
        (5, "Eve", "Tokyo"),
    ];
    Table::from_rows(
        &[
            Field::new("user_id", DataType::Integer),
            Field::new("name", DataType::Text),
            Field::new("city", DataType::Text),
        ],
        rows.iter()
            .map(|(id, name, city)| vec![Value::Int(*id), Value::text(*name), Value::text(*city)])
            .collect(),
    )
}

fn orders() -> TabulaResult<Table> {
    let rows = [
        (101, 1, "Laptop", 1200.0),
        (102, 2, "Keyboard", 75.0),
        (103, 1, "Mouse", 25.0),
        (104, 3, "Monitor", 300.0),
        (105, 5, "Webcam", 50.0),
        (106, 2, "Desk", 250.0),
    ];
    Table::from_rows(
        &[
            Field::new("order_id", DataType::Integer),
            Field::new("user_id", DataType::Integer),
            Field::new("product", DataType::Text),
            Field::new("amount", DataType::Float),
        ],
        rows.iter()
            .map(|(id, user, product, amount)| {
                vec![
                    Value::Int(*id),
                    Value::Int(*user),
                    Value::text(*product),
                    Value::Float(*amount),
                ]
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_shapes() {
        let catalog = SeedCatalog::new().unwrap();
        assert_eq!(catalog.load("users").unwrap().shape(), (5, 3));
        assert_eq!(catalog.load("orders").unwrap().shape(), (6, 4));
    }

    #[test]
    fn test_seed_types() {
        let orders = SeedCatalog::new().unwrap().load("orders").unwrap();
        assert_eq!(orders.column("amount").unwrap().data_type(), DataType::Float);
        assert_eq!(orders.column("user_id").unwrap().data_type(), DataType::Integer);
        assert_eq!(orders.row(0).unwrap()[2], Value::text("Laptop"));
    }

    #[test]
    fn test_unknown_table_lists_names() {
        let catalog = SeedCatalog::new().unwrap();
        assert_eq!(
            catalog.load("products").unwrap_err(),
            TabulaError::UnknownTable {
                name: "products".to_string(),
                available: vec!["orders".to_string(), "users".to_string()],
            }
        );
    }

    #[test]
    fn test_load_returns_copies() {
        let catalog = SeedCatalog::new().unwrap();
        let mut users = catalog.load("users").unwrap();
        users.push_row(vec![Value::Int(6), Value::text("Fay"), Value::Null]).unwrap();
        assert_eq!(catalog.load("users").unwrap().num_rows(), 5);
    }
}
