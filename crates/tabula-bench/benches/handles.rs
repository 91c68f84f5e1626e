//! Handle store, operation and materialization benchmarks.

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tabula_bench::utils::{generate_orders, generate_users};
use tabula_server::materialize::{materialize, MaterializeFormat, MaterializeOptions};
use tabula_server::ops::{self, Aggregation, JoinHow};
use tabula_server::{HandleStore, Workspace};

/// Benchmark raw store puts and gets.
fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    let table = generate_orders(100, 10);

    group.bench_function("put", |b| {
        let store = HandleStore::new();
        b.iter(|| black_box(store.put(table.clone())));
    });

    group.bench_function("get", |b| {
        let store = HandleStore::new();
        let handle = store.put(table.clone());
        b.iter(|| black_box(store.get(&handle)));
    });

    group.finish();
}

/// Benchmark joins and group-bys at growing sizes.
fn bench_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("ops");

    for size in [100, 1000, 10_000].iter() {
        let users = generate_users(size / 10);
        let orders = generate_orders(*size, size / 10);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("join_inner", size), size, |b, _| {
            b.iter(|| black_box(ops::join(&orders, &users, "user_id", JoinHow::Inner)));
        });

        group.bench_with_input(BenchmarkId::new("group_by_sum", size), size, |b, _| {
            let aggs = [Aggregation::new("amount", "sum")];
            b.iter(|| black_box(ops::group_by(&orders, &["user_id"], &aggs)));
        });

        group.bench_with_input(BenchmarkId::new("filter_rows", size), size, |b, _| {
            b.iter(|| black_box(ops::filter_rows(&orders, "amount > 100 AND product <> 'Desk'")));
        });
    }

    group.finish();
}

/// Benchmark script execution through the workspace.
fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");
    let ws = Workspace::in_memory().expect("workspace");
    let orders = ws.store().put(generate_orders(5000, 100));
    let inputs = BTreeMap::from([("orders".to_string(), orders)]);
    let outputs = vec!["per_product".to_string()];

    group.bench_function("group_by_script", |b| {
        b.iter(|| {
            black_box(ws.execute(
                "CREATE TABLE per_product AS \
                 SELECT product, COUNT(*) AS n, SUM(amount) AS total \
                 FROM orders GROUP BY product ORDER BY total DESC",
                &inputs,
                &outputs,
            ))
        });
    });

    group.finish();
}

/// Benchmark materialization formats.
fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    let table = generate_orders(1000, 100);
    let options = MaterializeOptions::default();

    for format in MaterializeFormat::ALL {
        group.bench_function(format.as_str(), |b| {
            b.iter(|| black_box(materialize(&table, format, 5, &options)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_store, bench_ops, bench_execute, bench_materialize);
criterion_main!(benches);
