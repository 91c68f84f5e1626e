//! # tabula-script
//!
//! A restricted SQL interpreter over in-memory [`Table`]s.
//!
//! Scripts are plain SQL. They can only read and write the tables bound in
//! the [`Scope`] they run against: there is no file, network or process
//! access, so running a script is as safe as running a query.
//!
//! - **Parser**: converts `sqlparser` output into a small internal AST
//! - **Executor**: evaluates queries and applies DDL/DML to the scope
//!
//! ## Example
//!
//! ```rust
//! use tabula_common::{Column, Table, Value};
//! use tabula_script::{ScriptEngine, Scope};
//!
//! let orders = Table::new(vec![Column::from_values(
//!     "amount",
//!     vec![Value::Float(1200.0), Value::Float(75.0)],
//! )])
//! .unwrap();
//!
//! let mut scope = Scope::new();
//! scope.bind("orders", orders);
//!
//! let engine = ScriptEngine::default();
//! engine
//!     .run("CREATE TABLE big AS SELECT * FROM orders WHERE amount > 100", &mut scope)
//!     .unwrap();
//! assert_eq!(scope.get("big").unwrap().num_rows(), 1);
//! ```
//!
//! [`Table`]: tabula_common::Table

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod executor;
pub mod parser;

pub use error::{ScriptError, ScriptResult};
pub use executor::{filter_table, Accumulator, AggregateFunc, ScriptEngine, ScriptLimits, Scope};
pub use parser::{Expr, Parser, Statement};
