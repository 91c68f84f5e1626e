//! Tabula Performance Benchmarks
//!
//! Benchmarks for the handle store, structured operations, the script
//! interpreter and materialization.
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p tabula-bench
//! ```

pub mod utils;
