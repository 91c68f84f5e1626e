//! Benchmark data generators.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tabula_common::{DataType, Field, Table, Value};

/// Generates random string data for benchmarks.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates a `users`-shaped table with `count` rows.
pub fn generate_users(count: usize) -> Table {
    let mut rng = StdRng::seed_from_u64(42);
    let cities = ["New York", "London", "Paris", "Tokyo", "Berlin"];

    let rows = (0..count as i64)
        .map(|i| {
            vec![
                Value::Int(i + 1),
                Value::text(random_string(&mut rng, 8)),
                Value::text(cities[rng.gen_range(0..cities.len())]),
            ]
        })
        .collect();

    Table::from_rows(
        &[
            Field::new("user_id", DataType::Integer),
            Field::new("name", DataType::Text),
            Field::new("city", DataType::Text),
        ],
        rows,
    )
    .unwrap_or_default()
}

/// Generates an `orders`-shaped table with `count` rows referencing
/// `users` user ids.
pub fn generate_orders(count: usize, users: usize) -> Table {
    let mut rng = StdRng::seed_from_u64(7);
    let products = ["Laptop", "Keyboard", "Mouse", "Monitor", "Webcam", "Desk"];

    let rows = (0..count as i64)
        .map(|i| {
            vec![
                Value::Int(1000 + i),
                Value::Int(rng.gen_range(1..=users.max(1) as i64)),
                Value::text(products[rng.gen_range(0..products.len())]),
                Value::Float((rng.gen_range(500..200_000) as f64) / 100.0),
            ]
        })
        .collect();

    Table::from_rows(
        &[
            Field::new("order_id", DataType::Integer),
            Field::new("user_id", DataType::Integer),
            Field::new("product", DataType::Text),
            Field::new("amount", DataType::Float),
        ],
        rows,
    )
    .unwrap_or_default()
}
