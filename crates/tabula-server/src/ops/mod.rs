//! Structured table operations.
//!
//! Every operation here is a pure function over tables. Resolving handles
//! and storing results is the workspace's job, so these functions can be
//! tested and benchmarked without a store.

mod columns;
mod group;
mod join;
mod rows;

pub use columns::{combine_columns, drop_columns, get_schema, select_columns};
pub use group::{group_by, Aggregation};
pub use join::{join, JoinHow};
pub use rows::{distinct_rows, filter_rows, head, remove_duplicates, shape, top_n};
